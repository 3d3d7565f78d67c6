mod input;

pub use input::{MidiError, MidiInputHandler};
