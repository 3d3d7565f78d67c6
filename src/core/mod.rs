pub mod audio;
pub mod midi;
pub mod oscillator;
pub mod sequencer;
pub mod synth;
pub mod voice;

pub use synth::{PianoSynth, PlaybackRequest, RenderedTone};
