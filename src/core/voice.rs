use std::sync::Arc;

use crate::core::synth::RenderedTone;

/// Playback cursor over one rendered tone, owned by the mixer.
pub struct Voice {
    tone: Arc<RenderedTone>,
    position: usize,
}

impl Voice {
    pub fn new(tone: Arc<RenderedTone>) -> Self {
        Self { tone, position: 0 }
    }

    pub fn note(&self) -> &str {
        &self.tone.note
    }

    pub fn is_active(&self) -> bool {
        self.position < self.tone.frames.len()
    }

    /// Next stereo frame, silence once the tone has run out.
    pub fn next_frame(&mut self) -> [f32; 2] {
        match self.tone.frames.get(self.position) {
            Some(frame) => {
                self.position += 1;
                *frame
            }
            None => [0.0, 0.0],
        }
    }
}
