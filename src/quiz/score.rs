use serde::Serialize;
use std::fmt;

/// Running tally for one quiz session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Score {
    pub correct: u32,
    pub total: u32,
}

impl Score {
    pub fn record(&mut self, correct: bool) {
        if correct {
            self.correct += 1;
        }
        self.total += 1;
    }

    /// Rounded percentage, 0 before the first round.
    pub fn accuracy(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (self.correct as f64 / self.total as f64 * 100.0).round() as u32
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({}%)", self.correct, self.total, self.accuracy())
    }
}
