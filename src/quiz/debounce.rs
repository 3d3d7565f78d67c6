use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Drops inputs that arrive within `window` of the last accepted one.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Only accepted inputs restart the window.
    pub fn accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.window {
                return false;
            }
        }
        self.last = Some(now);
        true
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_inside_the_window_collapse() {
        let t0 = Instant::now();
        let mut debounce = Debouncer::default();
        assert!(debounce.accept(t0));
        assert!(!debounce.accept(t0 + Duration::from_millis(50)));
        assert!(!debounce.accept(t0 + Duration::from_millis(99)));
        assert!(debounce.accept(t0 + Duration::from_millis(100)));
    }

    #[test]
    fn rejected_inputs_do_not_extend_the_window() {
        let t0 = Instant::now();
        let mut debounce = Debouncer::new(Duration::from_millis(100));
        assert!(debounce.accept(t0));
        assert!(!debounce.accept(t0 + Duration::from_millis(90)));
        assert!(debounce.accept(t0 + Duration::from_millis(120)));
    }
}
