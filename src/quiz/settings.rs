use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;
use crate::note::Hand;

pub const MIN_NOTES_RANGE: (u8, u8) = (1, 3);
pub const MAX_NOTES_RANGE: (u8, u8) = (1, 5);

/// Pool of notes the scale quiz draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteRange {
    /// Four notes from C.
    #[default]
    Basic4,
    /// Four notes from G.
    High4,
    /// One octave of the C major scale.
    Diatonic8,
    /// White keys of the hand's region.
    White12,
    /// Every key of the hand's region.
    All18,
}

impl NoteRange {
    pub const ALL: [NoteRange; 5] = [
        NoteRange::Basic4,
        NoteRange::High4,
        NoteRange::Diatonic8,
        NoteRange::White12,
        NoteRange::All18,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NoteRange::Basic4 => "basic4",
            NoteRange::High4 => "high4",
            NoteRange::Diatonic8 => "diatonic8",
            NoteRange::White12 => "white12",
            NoteRange::All18 => "all18",
        }
    }
}

impl fmt::Display for NoteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NoteRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NoteRange::ALL
            .iter()
            .find(|range| range.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown note range '{}'", s))
    }
}

/// Scale quiz settings. Always valid: `min_notes` in 1..=3, `max_notes` in
/// 1..=5 and `min_notes <= max_notes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawQuizSettings", into = "RawQuizSettings")]
pub struct QuizSettings {
    min_notes: u8,
    max_notes: u8,
    pub note_range: NoteRange,
    pub hand: Hand,
}

impl QuizSettings {
    pub fn new(
        min_notes: u8,
        max_notes: u8,
        note_range: NoteRange,
        hand: Hand,
    ) -> Result<Self, ConfigError> {
        let settings = Self {
            min_notes,
            max_notes,
            note_range,
            hand,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn min_notes(&self) -> u8 {
        self.min_notes
    }

    pub fn max_notes(&self) -> u8 {
        self.max_notes
    }

    /// Raises `max_notes` when it would fall below the new minimum.
    pub fn set_min_notes(&mut self, min_notes: u8) -> Result<(), ConfigError> {
        check_min(min_notes)?;
        self.min_notes = min_notes;
        if self.max_notes < min_notes {
            self.max_notes = min_notes;
        }
        Ok(())
    }

    /// Lowers `min_notes` when it would exceed the new maximum.
    pub fn set_max_notes(&mut self, max_notes: u8) -> Result<(), ConfigError> {
        check_max(max_notes)?;
        self.max_notes = max_notes;
        if self.min_notes > max_notes {
            self.min_notes = max_notes;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_min(self.min_notes)?;
        check_max(self.max_notes)?;
        if self.min_notes > self.max_notes {
            return Err(ConfigError::MinExceedsMax {
                min: self.min_notes,
                max: self.max_notes,
            });
        }
        Ok(())
    }
}

fn check_min(value: u8) -> Result<(), ConfigError> {
    let (low, high) = MIN_NOTES_RANGE;
    if (low..=high).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::MinNotesOutOfRange(value))
    }
}

fn check_max(value: u8) -> Result<(), ConfigError> {
    let (low, high) = MAX_NOTES_RANGE;
    if (low..=high).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::MaxNotesOutOfRange(value))
    }
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            min_notes: 1,
            max_notes: 3,
            note_range: NoteRange::Basic4,
            hand: Hand::Right,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(default)]
struct RawQuizSettings {
    min_notes: u8,
    max_notes: u8,
    note_range: NoteRange,
    hand: Hand,
}

impl Default for RawQuizSettings {
    fn default() -> Self {
        QuizSettings::default().into()
    }
}

impl TryFrom<RawQuizSettings> for QuizSettings {
    type Error = ConfigError;

    fn try_from(raw: RawQuizSettings) -> Result<Self, Self::Error> {
        QuizSettings::new(raw.min_notes, raw.max_notes, raw.note_range, raw.hand)
    }
}

impl From<QuizSettings> for RawQuizSettings {
    fn from(settings: QuizSettings) -> Self {
        Self {
            min_notes: settings.min_notes,
            max_notes: settings.max_notes,
            note_range: settings.note_range,
            hand: settings.hand,
        }
    }
}
