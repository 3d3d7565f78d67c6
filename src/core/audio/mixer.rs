use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;

use crate::core::synth::RenderedTone;
use crate::core::voice::Voice;

pub const DEFAULT_MAX_VOICES: usize = 32;
/// Room in the channel that carries finished voices off the audio thread.
pub const SPENT_CAPACITY: usize = 256;

/// Commands from control threads to the audio callback.
#[derive(Debug, Clone)]
pub enum MixerCommand {
    Play(Arc<RenderedTone>),
    StopAll,
}

/// Sums active voices on the audio thread.
///
/// Only talks to the outside through its channels; nothing here takes a
/// lock. Finished voices go back out over `spent` so their buffers are
/// freed by whoever drains it, not by the audio callback.
pub struct Mixer {
    receiver: Receiver<MixerCommand>,
    spent: Sender<Voice>,
    voices: Vec<Voice>,
    max_voices: usize,
    gain: f32,
}

impl Mixer {
    /// `spent` should be bounded so handing a voice back never allocates.
    pub fn new(
        receiver: Receiver<MixerCommand>,
        spent: Sender<Voice>,
        max_voices: usize,
        gain: f32,
    ) -> Self {
        let max_voices = max_voices.max(1);
        Self {
            receiver,
            spent,
            voices: Vec::with_capacity(max_voices),
            max_voices,
            gain,
        }
    }

    fn retire(&self, voice: Voice) {
        // a full or closed channel leaves no choice but to free it here
        let _ = self.spent.try_send(voice);
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Apply pending commands. Called once per output block.
    pub fn drain_commands(&mut self) {
        while let Ok(command) = self.receiver.try_recv() {
            match command {
                MixerCommand::Play(tone) => {
                    if self.voices.len() >= self.max_voices {
                        // oldest voice goes first
                        let oldest = self.voices.remove(0);
                        self.retire(oldest);
                    }
                    self.voices.push(Voice::new(tone));
                }
                MixerCommand::StopAll => {
                    while let Some(voice) = self.voices.pop() {
                        self.retire(voice);
                    }
                }
            }
        }
    }

    pub fn next_frame(&mut self) -> [f32; 2] {
        let mut left = 0.0;
        let mut right = 0.0;
        for voice in &mut self.voices {
            let [l, r] = voice.next_frame();
            left += l;
            right += r;
        }
        let mut i = 0;
        while i < self.voices.len() {
            if self.voices[i].is_active() {
                i += 1;
            } else {
                let done = self.voices.remove(i);
                self.retire(done);
            }
        }

        [
            (left * self.gain).clamp(-1.0, 1.0),
            (right * self.gain).clamp(-1.0, 1.0),
        ]
    }

    /// Fill an interleaved buffer with `channels` samples per frame. Mono
    /// devices get the average of both sides; extra channels stay silent.
    pub fn fill(&mut self, data: &mut [f32], channels: usize) {
        self.drain_commands();
        for frame in data.chunks_mut(channels.max(1)) {
            let [l, r] = self.next_frame();
            match frame {
                [mono] => *mono = (l + r) * 0.5,
                [first, second, rest @ ..] => {
                    *first = l;
                    *second = r;
                    rest.iter_mut().for_each(|s| *s = 0.0);
                }
                [] => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, unbounded};

    fn mixer(max_voices: usize, gain: f32) -> (Sender<MixerCommand>, Receiver<Voice>, Mixer) {
        let (tx, rx) = unbounded();
        let (spent_tx, spent_rx) = bounded(SPENT_CAPACITY);
        (tx, spent_rx, Mixer::new(rx, spent_tx, max_voices, gain))
    }

    fn tone(note: &str, frames: Vec<[f32; 2]>) -> Arc<RenderedTone> {
        Arc::new(RenderedTone {
            note: note.to_string(),
            sample_rate: 44100,
            frames,
        })
    }

    #[test]
    fn mixes_and_retires_voices() {
        let (tx, _spent, mut mixer) = mixer(4, 1.0);
        tx.send(MixerCommand::Play(tone("C4", vec![[0.1, 0.1], [0.1, 0.1]])))
            .unwrap();
        tx.send(MixerCommand::Play(tone("E4", vec![[0.2, -0.2]]))).unwrap();

        let mut out = [0.0f32; 6];
        mixer.fill(&mut out, 2);
        assert!((out[0] - 0.3).abs() < 1e-6);
        assert!((out[1] + 0.1).abs() < 1e-6);
        assert!((out[2] - 0.1).abs() < 1e-6);
        assert_eq!(out[4], 0.0);
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn caps_voices_dropping_the_oldest() {
        let (tx, spent, mut mixer) = mixer(2, 1.0);
        for note in ["C4", "D4", "E4"] {
            tx.send(MixerCommand::Play(tone(note, vec![[0.0, 0.0]; 8])))
                .unwrap();
        }
        mixer.drain_commands();
        assert_eq!(mixer.active_voices(), 2);
        assert_eq!(mixer.voices[0].note(), "D4");
        assert_eq!(spent.try_recv().unwrap().note(), "C4");
    }

    #[test]
    fn stop_all_silences_immediately() {
        let (tx, _spent, mut mixer) = mixer(4, 1.0);
        tx.send(MixerCommand::Play(tone("C4", vec![[0.5, 0.5]; 16])))
            .unwrap();
        let mut out = [0.0f32; 2];
        mixer.fill(&mut out, 2);
        assert_eq!(out, [0.5, 0.5]);

        tx.send(MixerCommand::StopAll).unwrap();
        mixer.fill(&mut out, 2);
        assert_eq!(out, [0.0, 0.0]);
    }

    #[test]
    fn mono_output_averages_and_output_is_clamped() {
        let (tx, _spent, mut mixer) = mixer(4, 2.0);
        tx.send(MixerCommand::Play(tone("C4", vec![[0.9, 0.1]]))).unwrap();
        let mut out = [0.0f32; 1];
        mixer.fill(&mut out, 1);
        // left clamps to 1.0, right is 0.2
        assert!((out[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn finished_and_stopped_tones_are_freed_elsewhere() {
        let (tx, spent, mut mixer) = mixer(4, 1.0);
        let short = tone("C4", vec![[0.1, 0.1]]);
        let long = tone("E4", vec![[0.1, 0.1]; 64]);
        tx.send(MixerCommand::Play(Arc::clone(&short))).unwrap();
        tx.send(MixerCommand::Play(Arc::clone(&long))).unwrap();

        let mut out = [0.0f32; 4];
        mixer.fill(&mut out, 2);
        // the mixer let go of the short tone but did not free it
        assert_eq!(mixer.active_voices(), 1);
        assert_eq!(Arc::strong_count(&short), 2);

        tx.send(MixerCommand::StopAll).unwrap();
        mixer.drain_commands();
        assert_eq!(Arc::strong_count(&long), 2);

        let returned: Vec<String> = spent.try_iter().map(|v| v.note().to_string()).collect();
        assert_eq!(returned, vec!["C4", "E4"]);
        assert_eq!(Arc::strong_count(&short), 1);
        assert_eq!(Arc::strong_count(&long), 1);
    }
}
