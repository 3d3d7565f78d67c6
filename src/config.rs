//! Settings loaded from JSON. Every section falls back to defaults when the
//! file or a field is missing; values are validated on load.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::quiz::{KeyMode, QuizSettings};

const APP_DIR: &str = "pianoquiz";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("min_notes must be between 1 and 3, got {0}")]
    MinNotesOutOfRange(u8),
    #[error("max_notes must be between 1 and 5, got {0}")]
    MaxNotesOutOfRange(u8),
    #[error("min_notes ({min}) must not exceed max_notes ({max})")]
    MinExceedsMax { min: u8, max: u8 },
    #[error("{field} must be between {low} and {high}, got {value}")]
    OutOfRange {
        field: &'static str,
        low: f32,
        high: f32,
        value: f32,
    },
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    fn check_range(field: &'static str, value: f32, low: f32, high: f32) -> Result<(), Self> {
        if (low..=high).contains(&value) {
            Ok(())
        } else {
            Err(ConfigError::OutOfRange {
                field,
                low,
                high,
                value,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub master_volume_db: f32,
    pub max_voices: usize,
    /// Render tones on a background thread instead of the caller's.
    pub render_worker: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            master_volume_db: -3.0,
            max_voices: crate::core::audio::mixer::DEFAULT_MAX_VOICES,
            render_worker: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerSettings {
    pub interval_ms: u64,
    pub note_duration: f32,
    pub note_velocity: f32,
    pub chord_duration: f32,
    pub chord_velocity: f32,
    pub chord_spread_ms: u64,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            note_duration: 0.8,
            note_velocity: 0.8,
            chord_duration: 1.0,
            chord_velocity: 0.7,
            chord_spread_ms: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetSettings {
    pub key_mode: KeyMode,
    pub auto_advance_ms: u64,
}

impl Default for SheetSettings {
    fn default() -> Self {
        Self {
            key_mode: KeyMode::All,
            auto_advance_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizConfig {
    pub debounce_ms: u64,
    pub button_lock_ms: u64,
    pub scale: QuizSettings,
    /// New scale question this long after a correct answer; off when unset.
    pub scale_auto_advance_ms: Option<u64>,
    pub sheet: SheetSettings,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            button_lock_ms: 300,
            scale: QuizSettings::default(),
            scale_auto_advance_ms: None,
            sheet: SheetSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    /// Ignore computer-keyboard presses while Ctrl, Alt or Meta is held.
    pub ignore_modifiers: bool,
    /// MIDI input port to connect at startup.
    pub midi_port: Option<String>,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            ignore_modifiers: true,
            midi_port: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub audio: AudioSettings,
    pub sequencer: SequencerSettings,
    pub quiz: QuizConfig,
    pub input: InputSettings,
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let settings: Settings = serde_json::from_reader(BufReader::new(file))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from `path` if given, else from the default location when a file
    /// exists there, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            log::info!("Loading settings from {}", path.display());
            return Self::load_from_file(path);
        }

        match Self::default_path() {
            Ok(path) if path.exists() => {
                log::info!("Loading settings from {}", path.display());
                Self::load_from_file(&path)
            }
            Ok(_) => Ok(Self::default()),
            Err(err) => {
                log::debug!("{}, using default settings", err);
                Ok(Self::default())
            }
        }
    }

    pub fn get_settings_dir() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        path.push(APP_DIR);
        Ok(path)
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::get_settings_dir()?.join(SETTINGS_FILE))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let volume = self.audio.master_volume_db;
        ConfigError::check_range("audio.master_volume_db", volume, -96.0, 12.0)?;
        if self.audio.max_voices == 0 {
            return Err(ConfigError::OutOfRange {
                field: "audio.max_voices",
                low: 1.0,
                high: f32::MAX,
                value: 0.0,
            });
        }

        let seq = &self.sequencer;
        ConfigError::check_range("sequencer.note_velocity", seq.note_velocity, 0.0, 1.0)?;
        ConfigError::check_range("sequencer.chord_velocity", seq.chord_velocity, 0.0, 1.0)?;
        ConfigError::check_range("sequencer.note_duration", seq.note_duration, 0.0, 10.0)?;
        ConfigError::check_range("sequencer.chord_duration", seq.chord_duration, 0.0, 10.0)?;

        // QuizSettings validates itself on deserialize; re-check values
        // built in code
        self.quiz.scale.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Hand;
    use crate::quiz::NoteRange;

    #[test]
    fn empty_object_gives_defaults() {
        let settings = Settings::from_json("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.sequencer.interval_ms, 1000);
        assert_eq!(settings.quiz.debounce_ms, 100);
        assert_eq!(settings.quiz.sheet.auto_advance_ms, 2000);
        assert_eq!(settings.quiz.scale.min_notes(), 1);
        assert_eq!(settings.quiz.scale.max_notes(), 3);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let json = r#"{
            "quiz": {
                "scale": {
                    "min_notes": 2,
                    "max_notes": 4,
                    "note_range": "diatonic8",
                    "hand": "left"
                }
            },
            "sequencer": { "interval_ms": 750 }
        }"#;
        let settings = Settings::from_json(json).unwrap();
        assert_eq!(settings.sequencer.interval_ms, 750);
        assert_eq!(settings.sequencer.note_velocity, 0.8);
        assert_eq!(settings.quiz.scale.note_range, NoteRange::Diatonic8);
        assert_eq!(settings.quiz.scale.hand, Hand::Left);
        assert_eq!(settings.quiz.scale.max_notes(), 4);
    }

    #[test]
    fn invalid_note_counts_are_rejected() {
        for scale in [
            r#"{ "min_notes": 0, "max_notes": 3 }"#,
            r#"{ "min_notes": 4, "max_notes": 5 }"#,
            r#"{ "min_notes": 1, "max_notes": 6 }"#,
            r#"{ "min_notes": 3, "max_notes": 2 }"#,
        ] {
            let json = format!(r#"{{ "quiz": {{ "scale": {} }} }}"#, scale);
            assert!(Settings::from_json(&json).is_err(), "accepted {}", scale);
        }
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        let json = r#"{ "quiz": { "scale": { "note_range": "all99" } } }"#;
        assert!(matches!(Settings::from_json(json), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn out_of_range_velocity_is_rejected() {
        let json = r#"{ "sequencer": { "note_velocity": 1.5 } }"#;
        assert!(matches!(
            Settings::from_json(json),
            Err(ConfigError::OutOfRange { field: "sequencer.note_velocity", .. })
        ));
    }

    #[test]
    fn loads_from_explicit_path() {
        let name = format!("pianoquiz-settings-{}.json", std::process::id());
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, r#"{ "audio": { "max_voices": 8 } }"#).unwrap();
        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.audio.max_voices, 8);
        std::fs::remove_file(&path).ok();

        assert!(matches!(Settings::load(Some(&path)), Err(ConfigError::Io(_))));
    }
}
