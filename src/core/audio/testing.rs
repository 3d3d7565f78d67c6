use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use super::ToneSink;
use crate::core::synth::RenderedTone;

/// Entry `events` records for a `stop_all`.
pub const STOP_EVENT: &str = "STOP";

/// Stand-in for a device: records what would have been played.
pub struct RecordingSink {
    running: AtomicBool,
    sample_rate: f32,
    played: Mutex<Vec<(Instant, String)>>,
    events: Mutex<Vec<String>>,
    stops: AtomicUsize,
}

impl RecordingSink {
    pub fn running(sample_rate: f32) -> Self {
        Self {
            running: AtomicBool::new(true),
            sample_rate,
            played: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn suspended(sample_rate: f32) -> Self {
        let sink = Self::running(sample_rate);
        sink.running.store(false, Ordering::SeqCst);
        sink
    }

    pub fn played(&self) -> Vec<String> {
        self.played
            .lock()
            .unwrap()
            .iter()
            .map(|(_, note)| note.clone())
            .collect()
    }

    pub fn played_at(&self) -> Vec<(Instant, String)> {
        self.played.lock().unwrap().clone()
    }

    /// Submitted notes and stops, in the order they arrived.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl ToneSink for RecordingSink {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn submit(&self, tone: RenderedTone) {
        self.events.lock().unwrap().push(tone.note.clone());
        self.played.lock().unwrap().push((Instant::now(), tone.note));
    }

    fn stop_all(&self) {
        self.events.lock().unwrap().push(STOP_EVENT.to_string());
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}
