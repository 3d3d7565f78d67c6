//! Quiz state machines.
//!
//! Controllers never touch audio or the clock themselves: time comes in as
//! an `Instant`, randomness from an injected RNG, and anything that should
//! sound comes back as a [`PlayCue`] for the caller to play.

pub mod debounce;
pub mod keyboard;
pub mod scale;
pub mod score;
pub mod settings;
pub mod sheet;

use std::fmt;

use crate::note::Note;

pub use debounce::Debouncer;
pub use keyboard::{HandRegion, KeyboardView, PianoKey};
pub use scale::ScaleQuiz;
pub use score::Score;
pub use settings::{NoteRange, QuizSettings};
pub use sheet::{Clef, KeyMode, Prompt, SheetQuiz};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Correct => write!(f, "correct"),
            Verdict::Incorrect => write!(f, "incorrect"),
        }
    }
}

/// A note the caller should play in response to a quiz event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayCue {
    pub note: Note,
    pub duration: f32,
    pub velocity: f32,
}

impl PlayCue {
    pub fn new(note: Note, duration: f32, velocity: f32) -> Self {
        Self {
            note,
            duration,
            velocity,
        }
    }
}

/// Why an input was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Debounced,
    NoQuestion,
    ResultPending,
    Playing,
    OutOfRange,
    Disabled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputOutcome {
    Rejected(Rejection),
    /// Input recorded. `echo` should be played; `verdict` is set once the
    /// answer is complete.
    Accepted {
        echo: PlayCue,
        verdict: Option<Verdict>,
    },
}

impl InputOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, InputOutcome::Accepted { .. })
    }

    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            InputOutcome::Accepted { verdict, .. } => *verdict,
            InputOutcome::Rejected(_) => None,
        }
    }
}
