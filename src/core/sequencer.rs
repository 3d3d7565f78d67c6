//! Scheduled, cancellable playback of note sequences and chords.
//!
//! Each playback runs on its own thread and sleeps on its cancel channel
//! between notes, so a cancel takes effect before the next note sounds.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::SequencerSettings;
use crate::core::audio::PianoPlayer;

/// One scheduled note, `offset` from the start of the playback.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEvent {
    pub offset: Duration,
    pub note: String,
    pub duration: f32,
    pub velocity: f32,
}

/// Notes one after another, `interval` apart.
pub fn sequence_events<S: AsRef<str>>(
    notes: &[S],
    interval: Duration,
    duration: f32,
    velocity: f32,
) -> Vec<NoteEvent> {
    notes
        .iter()
        .enumerate()
        .map(|(i, note)| NoteEvent {
            offset: interval * i as u32,
            note: note.as_ref().to_string(),
            duration,
            velocity,
        })
        .collect()
}

/// Notes struck together, `spread` apart, each with its velocity nudged by
/// a random factor in 0.8..1.2 and capped at 1.0.
pub fn chord_events<S: AsRef<str>, R: Rng>(
    notes: &[S],
    spread: Duration,
    duration: f32,
    velocity: f32,
    rng: &mut R,
) -> Vec<NoteEvent> {
    notes
        .iter()
        .enumerate()
        .map(|(i, note)| NoteEvent {
            offset: spread * i as u32,
            note: note.as_ref().to_string(),
            duration,
            velocity: (velocity * rng.random_range(0.8..1.2)).min(1.0),
        })
        .collect()
}

/// Handle to a running playback. Clones refer to the same playback;
/// dropping every clone cancels it.
#[derive(Clone)]
pub struct PlaybackHandle {
    cancel_tx: Sender<()>,
    done_rx: Receiver<()>,
    finished: Arc<AtomicBool>,
}

impl PlaybackHandle {
    /// Stop every note that has not sounded yet. Safe to call repeatedly.
    pub fn cancel(&self) {
        self.cancel_tx.try_send(()).ok();
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Block until the playback ends or `timeout` passes. Returns whether it
    /// ended.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.done_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => false,
            // the playback thread drops its sender when it exits
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        }
    }
}

/// Start playing `events` on a new thread.
pub fn spawn_playback(player: Arc<PianoPlayer>, events: Vec<NoteEvent>) -> PlaybackHandle {
    let (cancel_tx, cancel_rx) = bounded::<()>(1);
    let (done_tx, done_rx) = bounded::<()>(0);
    let finished = Arc::new(AtomicBool::new(false));
    let thread_finished = Arc::clone(&finished);

    let handle = PlaybackHandle {
        cancel_tx,
        done_rx,
        finished,
    };

    let body = move || {
        let _done = done_tx;
        run_events(&player, &events, &cancel_rx);
        thread_finished.store(true, Ordering::SeqCst);
    };

    if let Err(err) = thread::Builder::new()
        .name("sequencer".to_string())
        .spawn(body)
    {
        log::error!("failed to start playback thread: {}", err);
        handle.finished.store(true, Ordering::SeqCst);
    }

    handle
}

fn run_events(player: &PianoPlayer, events: &[NoteEvent], cancel_rx: &Receiver<()>) {
    let start = Instant::now();
    for event in events {
        let wait = (start + event.offset).saturating_duration_since(Instant::now());
        match cancel_rx.recv_timeout(wait) {
            Ok(()) => {
                log::debug!("playback cancelled before {}", event.note);
                return;
            }
            Err(RecvTimeoutError::Disconnected) => {
                log::debug!("playback cancel channel closed before {}", event.note);
                return;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
        player.play_note(&event.note, event.duration, event.velocity);
    }
}

/// Owns the current playback: starting a new one cancels the old.
pub struct Sequencer {
    player: Arc<PianoPlayer>,
    settings: SequencerSettings,
    current: Mutex<Option<PlaybackHandle>>,
    rng: Mutex<StdRng>,
}

impl Sequencer {
    pub fn new(player: Arc<PianoPlayer>, settings: SequencerSettings) -> Self {
        Self::with_rng(player, settings, StdRng::from_os_rng())
    }

    pub fn with_rng(player: Arc<PianoPlayer>, settings: SequencerSettings, rng: StdRng) -> Self {
        Self {
            player,
            settings,
            current: Mutex::new(None),
            rng: Mutex::new(rng),
        }
    }

    pub fn player(&self) -> &Arc<PianoPlayer> {
        &self.player
    }

    pub fn settings(&self) -> &SequencerSettings {
        &self.settings
    }

    /// Play notes in order with the configured interval, duration and
    /// velocity.
    pub fn play_sequence<S: AsRef<str>>(&self, notes: &[S]) -> PlaybackHandle {
        let events = sequence_events(
            notes,
            Duration::from_millis(self.settings.interval_ms),
            self.settings.note_duration,
            self.settings.note_velocity,
        );
        self.start(events)
    }

    pub fn play_chord<S: AsRef<str>>(&self, notes: &[S]) -> PlaybackHandle {
        let spread = Duration::from_millis(self.settings.chord_spread_ms);
        let events = match self.rng.lock() {
            Ok(mut rng) => chord_events(
                notes,
                spread,
                self.settings.chord_duration,
                self.settings.chord_velocity,
                &mut *rng,
            ),
            Err(_) => chord_events(
                notes,
                spread,
                self.settings.chord_duration,
                self.settings.chord_velocity,
                &mut rand::rng(),
            ),
        };
        self.start(events)
    }

    fn start(&self, events: Vec<NoteEvent>) -> PlaybackHandle {
        let mut current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = current.take() {
            previous.cancel();
        }
        let handle = spawn_playback(Arc::clone(&self.player), events);
        *current = Some(handle.clone());
        handle
    }

    /// Whether the most recent playback is still going.
    pub fn is_playing(&self) -> bool {
        self.current
            .lock()
            .map(|c| c.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Cancel pending notes and silence anything still sounding.
    pub fn cancel_all(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(handle) = current.take() {
                handle.cancel();
            }
        }
        self.player.stop_all();
    }
}
