use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

// Semitone index of C2 (C0 = 0), the lowest entry of the frequency table
const TABLE_LOWEST: i16 = 24;

// Fixed piano frequency table, C2 through F6
const NOTE_FREQUENCIES: [f32; 54] = [
    // octave 2
    65.41, 69.30, 73.42, 77.78, 82.41, 87.31, 92.50, 98.00, 103.83, 110.00, 116.54, 123.47,
    // octave 3
    130.81, 138.59, 146.83, 155.56, 164.81, 174.61, 185.00, 196.00, 207.65, 220.00, 233.08, 246.94,
    // octave 4
    261.63, 277.18, 293.66, 311.13, 329.63, 349.23, 369.99, 392.00, 415.30, 440.00, 466.16, 493.88,
    // octave 5
    523.25, 554.37, 587.33, 622.25, 659.25, 698.46, 739.99, 783.99, 830.61, 880.00, 932.33, 987.77,
    // octave 6
    1046.50, 1108.73, 1174.66, 1244.51, 1318.51, 1396.91,
];

/// Lowest and highest frequency the table can resolve.
pub const PIANO_RANGE_HZ: (f32, f32) = (65.41, 1396.91);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteParseError {
    #[error("empty note name")]
    Empty,
    #[error("invalid note letter '{0}'")]
    InvalidLetter(char),
    #[error("invalid octave in note '{0}'")]
    InvalidOctave(String),
}

/// Colour of the piano key a note sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyColor {
    White,
    Black,
}

/// Which hand plays a part of the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Left,
    #[default]
    Right,
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hand::Left => write!(f, "left"),
            Hand::Right => write!(f, "right"),
        }
    }
}

impl FromStr for Hand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Hand::Left),
            "right" | "r" => Ok(Hand::Right),
            other => Err(format!("unknown hand '{}'", other)),
        }
    }
}

/// A pitch such as "C#4": pitch class plus octave.
///
/// Stored as a semitone index from C0 so enharmonic spellings compare equal
/// ("Db4" == "C#4"). Display always uses sharps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Note {
    index: i16,
}

impl Note {
    pub fn new(pitch_class: u8, octave: i8) -> Self {
        Self {
            index: octave as i16 * 12 + (pitch_class % 12) as i16,
        }
    }

    pub fn from_midi(midi_note: u8) -> Self {
        Self {
            index: midi_note as i16 - 12,
        }
    }

    /// MIDI note number, `None` when the note lies outside 0..=127.
    pub fn midi(&self) -> Option<u8> {
        u8::try_from(self.index + 12).ok().filter(|n| *n <= 127)
    }

    pub fn pitch_class(&self) -> u8 {
        self.index.rem_euclid(12) as u8
    }

    pub fn octave(&self) -> i8 {
        self.index.div_euclid(12) as i8
    }

    /// Note letter without accidental, e.g. 'C' for C#4.
    pub fn letter(&self) -> char {
        PITCH_CLASS_NAMES[self.pitch_class() as usize]
            .chars()
            .next()
            .unwrap_or('C')
    }

    pub fn color(&self) -> KeyColor {
        match self.pitch_class() {
            1 | 3 | 6 | 8 | 10 => KeyColor::Black,
            _ => KeyColor::White,
        }
    }

    pub fn transpose(&self, semitones: i16) -> Self {
        Self {
            index: self.index + semitones,
        }
    }

    /// Frequency from the fixed table, `None` outside C2..=F6.
    pub fn frequency(&self) -> Option<f32> {
        let offset = self.index - TABLE_LOWEST;
        if offset < 0 {
            return None;
        }
        NOTE_FREQUENCIES.get(offset as usize).copied()
    }

    /// Every note the frequency table resolves, lowest first.
    pub fn all_resolvable() -> impl Iterator<Item = Note> {
        (0..NOTE_FREQUENCIES.len() as i16).map(|offset| Note {
            index: TABLE_LOWEST + offset,
        })
    }
}

/// Resolve a note name straight to a frequency.
pub fn resolve_frequency(name: &str) -> Option<f32> {
    name.parse::<Note>().ok().and_then(|note| note.frequency())
}

impl FromStr for Note {
    type Err = NoteParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let letter = chars.next().ok_or(NoteParseError::Empty)?;

        let base: i16 = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            other => return Err(NoteParseError::InvalidLetter(other)),
        };

        let rest = chars.as_str();
        let (shift, octave_str) = if let Some(r) = rest.strip_prefix('#') {
            (1, r)
        } else if let Some(r) = rest.strip_prefix('b') {
            (-1, r)
        } else {
            (0, rest)
        };

        if octave_str.is_empty() || !octave_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(NoteParseError::InvalidOctave(s.to_string()));
        }
        let octave: i16 = octave_str
            .parse()
            .map_err(|_| NoteParseError::InvalidOctave(s.to_string()))?;
        if octave > 9 {
            return Err(NoteParseError::InvalidOctave(s.to_string()));
        }

        Ok(Note {
            index: octave * 12 + base + shift,
        })
    }
}

impl TryFrom<String> for Note {
    type Error = NoteParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Note> for String {
    fn from(note: Note) -> Self {
        note.to_string()
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            PITCH_CLASS_NAMES[self.pitch_class() as usize],
            self.octave()
        )
    }
}
