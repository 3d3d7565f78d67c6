use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pianoquiz::app::{self, Engine};
use pianoquiz::config::Settings;
use pianoquiz::core::synth::{PlaybackRequest, DEFAULT_DURATION, DEFAULT_VELOCITY, MAX_DURATION};
use pianoquiz::note::Hand;
use pianoquiz::quiz::{KeyMode, NoteRange};

#[derive(Parser)]
#[command(name = "pianoquiz", version, about = "Ear training with a synthesized piano")]
struct Cli {
    /// Settings file (defaults to <config dir>/pianoquiz/settings.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// MIDI input port to listen on during quizzes
    #[arg(long, global = true)]
    midi_port: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play notes one after another
    Play {
        #[arg(required = true)]
        notes: Vec<String>,
        /// Milliseconds between note starts
        #[arg(long)]
        interval_ms: Option<u64>,
        #[arg(long, value_parser = parse_duration)]
        duration: Option<f32>,
        #[arg(long, value_parser = parse_velocity)]
        velocity: Option<f32>,
    },
    /// Play notes together as a chord
    Chord {
        #[arg(required = true)]
        notes: Vec<String>,
        #[arg(long, value_parser = parse_duration)]
        duration: Option<f32>,
        #[arg(long, value_parser = parse_velocity)]
        velocity: Option<f32>,
    },
    /// Render one note to a WAV file
    Render {
        note: String,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value_t = DEFAULT_DURATION, value_parser = parse_duration)]
        duration: f32,
        #[arg(long, default_value_t = DEFAULT_VELOCITY, value_parser = parse_velocity)]
        velocity: f32,
        #[arg(
            long,
            default_value_t = 44100,
            value_parser = clap::value_parser!(u32).range(8000..=192_000)
        )]
        sample_rate: u32,
        /// Fix the noise so renders are reproducible
        #[arg(long)]
        seed: Option<u64>,
        /// Scale the peak to full scale before writing
        #[arg(long)]
        normalize: bool,
    },
    /// Hear a short run of notes and play it back
    ScaleQuiz {
        #[arg(long)]
        hand: Option<Hand>,
        #[arg(long)]
        range: Option<NoteRange>,
        #[arg(long)]
        min_notes: Option<u8>,
        #[arg(long)]
        max_notes: Option<u8>,
    },
    /// Name the note shown on the staff
    SheetQuiz {
        #[arg(long)]
        mode: Option<KeyMode>,
        #[arg(long)]
        hand: Option<Hand>,
    },
    /// List MIDI input ports
    MidiPorts,
}

fn parse_bounded(value: &str, low: f32, high: f32) -> Result<f32, String> {
    let parsed: f32 = value.parse().map_err(|_| format!("'{}' is not a number", value))?;
    if (low..=high).contains(&parsed) {
        Ok(parsed)
    } else {
        Err(format!("must be between {} and {}", low, high))
    }
}

fn parse_duration(value: &str) -> Result<f32, String> {
    parse_bounded(value, 0.0, MAX_DURATION)
}

fn parse_velocity(value: &str) -> Result<f32, String> {
    parse_bounded(value, 0.0, 1.0)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(port) = cli.midi_port {
        settings.input.midi_port = Some(port);
    }

    match cli.command {
        Commands::Play {
            notes,
            interval_ms,
            duration,
            velocity,
        } => {
            if let Some(interval_ms) = interval_ms {
                settings.sequencer.interval_ms = interval_ms;
            }
            if let Some(duration) = duration {
                settings.sequencer.note_duration = duration;
            }
            if let Some(velocity) = velocity {
                settings.sequencer.note_velocity = velocity;
            }
            settings.validate().context("Invalid playback options")?;
            let engine = Engine::start(&settings);
            engine.play_and_wait(&notes, false);
            engine.shutdown();
        }
        Commands::Chord {
            notes,
            duration,
            velocity,
        } => {
            if let Some(duration) = duration {
                settings.sequencer.chord_duration = duration;
            }
            if let Some(velocity) = velocity {
                settings.sequencer.chord_velocity = velocity;
            }
            settings.validate().context("Invalid playback options")?;
            let engine = Engine::start(&settings);
            engine.play_and_wait(&notes, true);
            engine.shutdown();
        }
        Commands::Render {
            note,
            output,
            duration,
            velocity,
            sample_rate,
            seed,
            normalize,
        } => {
            let mut request = PlaybackRequest::new(note).duration(duration).velocity(velocity);
            if let Some(seed) = seed {
                request = request.seed(seed);
            }
            app::render_note(&request, sample_rate, normalize, &output)?;
        }
        Commands::ScaleQuiz {
            hand,
            range,
            min_notes,
            max_notes,
        } => {
            let scale = &mut settings.quiz.scale;
            if let Some(hand) = hand {
                scale.hand = hand;
            }
            if let Some(range) = range {
                scale.note_range = range;
            }
            if let Some(max_notes) = max_notes {
                scale.set_max_notes(max_notes)?;
            }
            if let Some(min_notes) = min_notes {
                scale.set_min_notes(min_notes)?;
            }
            app::run_scale_quiz(&settings)?;
        }
        Commands::SheetQuiz { mode, hand } => {
            if let Some(mode) = mode {
                settings.quiz.sheet.key_mode = mode;
            }
            app::run_sheet_quiz(&settings, hand.unwrap_or(Hand::Right))?;
        }
        Commands::MidiPorts => {
            let ports = app::list_midi_ports()?;
            if ports.is_empty() {
                println!("No MIDI input ports found");
            }
            for (i, port) in ports.iter().enumerate() {
                println!("{}: {}", i, port);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("pianoquiz").chain(args.iter().copied()))
    }

    #[test]
    fn render_rejects_unusable_sample_rates() {
        assert!(parse(&["render", "C4", "-o", "c4.wav", "--sample-rate", "16"]).is_err());
        assert!(parse(&["render", "C4", "-o", "c4.wav", "--sample-rate", "22050"]).is_ok());
    }

    #[test]
    fn durations_and_velocities_are_bounded() {
        assert!(parse(&["play", "C4", "--duration", "1e6"]).is_err());
        assert!(parse(&["chord", "C4", "E4", "--velocity", "1.5"]).is_err());
        assert!(parse(&["render", "C4", "-o", "c4.wav", "--duration", "-1"]).is_err());
        assert!(parse(&["play", "C4", "--duration", "2.5", "--velocity", "0.4"]).is_ok());
    }

    #[test]
    fn overridden_settings_are_checked_again() {
        let mut settings = Settings::default();
        settings.sequencer.note_duration = 50.0;
        assert!(settings.validate().is_err());
    }
}
