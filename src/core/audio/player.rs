use crossbeam_channel::{unbounded, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use super::ToneSink;
use crate::core::synth::{PianoSynth, PlaybackRequest, RenderedTone};
use crate::note::resolve_frequency;

/// Where rendering happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dispatch {
    /// Render on the caller's thread before returning.
    Inline,
    /// Hand the request to a background render thread and return at once.
    #[default]
    Worker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UnknownNote,
    AudioUnavailable,
}

/// What `play_note` did. Informational only: playback never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Played,
    Skipped(SkipReason),
}

impl PlayOutcome {
    pub fn is_played(&self) -> bool {
        matches!(self, PlayOutcome::Played)
    }
}

/// Counts `stop_all` calls. A render only reaches the sink if no stop
/// happened since it was requested.
#[derive(Default)]
struct Generation(Mutex<u64>);

impl Generation {
    fn lock(&self) -> MutexGuard<'_, u64> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn current(&self) -> u64 {
        *self.lock()
    }

    fn submit_if_current(&self, sink: &dyn ToneSink, issued: u64, tone: RenderedTone) {
        // held across submit so a concurrent stop cannot slip in between
        let current = self.lock();
        if *current == issued {
            sink.submit(tone);
        } else {
            log::debug!("dropping {} rendered before stop", tone.note);
        }
    }
}

/// Fire-and-forget note playback on top of a [`ToneSink`].
pub struct PianoPlayer {
    sink: Arc<dyn ToneSink>,
    synth: PianoSynth,
    generation: Arc<Generation>,
    render_tx: Option<Sender<(PlaybackRequest, u64)>>,
    worker: Option<JoinHandle<()>>,
}

impl PianoPlayer {
    pub fn new(sink: Arc<dyn ToneSink>, dispatch: Dispatch) -> Self {
        let synth = PianoSynth::new(sink.sample_rate());
        let generation = Arc::new(Generation::default());

        let (render_tx, worker) = match dispatch {
            Dispatch::Inline => (None, None),
            Dispatch::Worker => {
                let (tx, rx) = unbounded::<(PlaybackRequest, u64)>();
                let worker_sink = Arc::clone(&sink);
                let worker_generation = Arc::clone(&generation);
                let spawned = thread::Builder::new()
                    .name("render-worker".to_string())
                    .spawn(move || {
                        for (request, issued) in rx.iter() {
                            if worker_generation.current() != issued {
                                log::debug!("skipping {}, stopped before render", request.note);
                                continue;
                            }
                            if let Some(tone) = synth.render(&request) {
                                worker_generation.submit_if_current(&*worker_sink, issued, tone);
                            }
                        }
                        log::debug!("render worker finished");
                    });
                match spawned {
                    Ok(handle) => (Some(tx), Some(handle)),
                    Err(err) => {
                        log::error!("failed to start render worker, rendering inline: {}", err);
                        (None, None)
                    }
                }
            }
        };

        Self {
            sink,
            synth,
            generation,
            render_tx,
            worker,
        }
    }

    pub fn sink(&self) -> &Arc<dyn ToneSink> {
        &self.sink
    }

    /// Play `note` for `duration` seconds at `velocity` (0..=1).
    pub fn play_note(&self, note: &str, duration: f32, velocity: f32) -> PlayOutcome {
        self.play(
            PlaybackRequest::new(note)
                .duration(duration)
                .velocity(velocity),
        )
    }

    pub fn play(&self, request: PlaybackRequest) -> PlayOutcome {
        if resolve_frequency(&request.note).is_none() {
            log::warn!("Note {} not found", request.note);
            return PlayOutcome::Skipped(SkipReason::UnknownNote);
        }

        if !self.sink.is_running() {
            log::debug!("audio unavailable, not playing {}", request.note);
            return PlayOutcome::Skipped(SkipReason::AudioUnavailable);
        }

        let issued = self.generation.current();
        match &self.render_tx {
            Some(tx) => {
                if let Err(err) = tx.send((request, issued)) {
                    let (request, issued) = err.0;
                    log::debug!("render worker gone, rendering {} inline", request.note);
                    self.render_inline(&request, issued);
                }
            }
            None => self.render_inline(&request, issued),
        }
        PlayOutcome::Played
    }

    fn render_inline(&self, request: &PlaybackRequest, issued: u64) {
        if let Some(tone) = self.synth.render(request) {
            self.generation
                .submit_if_current(&*self.sink, issued, tone);
        }
    }

    /// Silence sounding tones and drop every render requested before now,
    /// queued or in progress.
    pub fn stop_all(&self) {
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        self.sink.stop_all();
    }
}

impl Drop for PianoPlayer {
    fn drop(&mut self) {
        // closing the channel ends the worker loop
        self.render_tx = None;
        if let Some(worker) = self.worker.take() {
            worker.join().ok();
        }
    }
}
