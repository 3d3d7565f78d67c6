#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ramp {
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy)]
struct Breakpoint {
    time: f32,
    value: f32,
    ramp: Ramp,
}

/// Gain automation built from ramps, in seconds from note onset.
///
/// Each ramp runs from the previous breakpoint to its own `(time, value)`.
/// After the last breakpoint the value holds. Exponential ramps need both
/// ends strictly positive and fall back to linear otherwise.
#[derive(Debug, Clone)]
pub struct Envelope {
    start_value: f32,
    points: Vec<Breakpoint>,
}

impl Envelope {
    pub fn starting_at(value: f32) -> Self {
        Self {
            start_value: value,
            points: Vec::new(),
        }
    }

    pub fn linear_to(mut self, value: f32, time: f32) -> Self {
        self.push(value, time, Ramp::Linear);
        self
    }

    pub fn exponential_to(mut self, value: f32, time: f32) -> Self {
        self.push(value, time, Ramp::Exponential);
        self
    }

    fn push(&mut self, value: f32, time: f32, ramp: Ramp) {
        // keep breakpoints ordered; a ramp ending earlier than the last one
        // collapses onto it
        let time = self.end_time().max(time);
        self.points.push(Breakpoint { time, value, ramp });
    }

    pub fn end_time(&self) -> f32 {
        self.points.last().map_or(0.0, |p| p.time)
    }

    pub fn value_at(&self, t: f32) -> f32 {
        let mut prev_time = 0.0;
        let mut prev_value = self.start_value;

        for point in &self.points {
            if t < point.time {
                let span = point.time - prev_time;
                if span <= 0.0 {
                    return point.value;
                }
                let frac = ((t - prev_time) / span).clamp(0.0, 1.0);
                return match point.ramp {
                    Ramp::Exponential if prev_value > 0.0 && point.value > 0.0 => {
                        prev_value * (point.value / prev_value).powf(frac)
                    }
                    _ => prev_value + (point.value - prev_value) * frac,
                };
            }
            prev_time = point.time;
            prev_value = point.value;
        }

        prev_value
    }
}
