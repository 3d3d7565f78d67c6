use crate::note::Note;

/// Message types for communication between input threads and the app loop
#[derive(Debug, Clone, PartialEq)]
pub enum AppMessage {
    /// A full line typed at the terminal
    Line(String),
    NoteOn(Note, u8), // (note, velocity)
    NoteOff(Note),
    /// Input source closed (stdin EOF)
    InputClosed,
}
