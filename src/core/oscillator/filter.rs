use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterType {
    LowPass,
    BandPass,
}

/// Stateful biquad (Direct Form I) with Audio EQ Cookbook coefficients.
///
/// Each tone owns its filters; nothing here is shared between renders.
#[derive(Debug, Clone)]
pub struct FilterState {
    pub filter_type: FilterType,
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl FilterState {
    /// `frequency` is held between 10 Hz and just below Nyquist, Nyquist
    /// winning at very low rates; `q` is clamped to a small positive minimum.
    pub fn new(filter_type: FilterType, frequency: f32, q: f32, sample_rate: f32) -> Self {
        let frequency = frequency.max(10.0).min(sample_rate * 0.49);
        let q = q.max(0.1);
        let omega = 2.0 * PI * frequency / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * q);

        let (b0, b1, b2) = match filter_type {
            FilterType::LowPass => {
                let b1 = 1.0 - cos_omega;
                (b1 / 2.0, b1, b1 / 2.0)
            }
            // constant 0 dB peak gain
            FilterType::BandPass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_omega;
        let a2 = 1.0 - alpha;

        Self {
            filter_type,
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::oscillator::Waveform;

    const SAMPLE_RATE: f32 = 44100.0;

    fn rms_through(filter: &mut FilterState, freq: f32) -> f32 {
        let n = 8820;
        let mut sum = 0.0;
        for i in 0..n {
            let phase = (i as f32 * freq / SAMPLE_RATE).fract();
            let y = filter.process(Waveform::Sine.sample(phase));
            // skip the transient
            if i > n / 2 {
                sum += y * y;
            }
        }
        (sum / (n / 2) as f32).sqrt()
    }

    fn filter(filter_type: FilterType, frequency: f32, q: f32) -> FilterState {
        FilterState::new(filter_type, frequency, q, SAMPLE_RATE)
    }

    #[test]
    fn lowpass_passes_low_and_cuts_high() {
        let low = rms_through(&mut filter(FilterType::LowPass, 1000.0, 0.7), 100.0);
        let high = rms_through(&mut filter(FilterType::LowPass, 1000.0, 0.7), 10000.0);
        assert!(low > 0.6, "low {}", low);
        assert!(high < 0.05, "high {}", high);
    }

    #[test]
    fn bandpass_peaks_at_centre() {
        let centre = rms_through(&mut filter(FilterType::BandPass, 500.0, 2.0), 500.0);
        let off = rms_through(&mut filter(FilterType::BandPass, 500.0, 2.0), 5000.0);
        assert!(centre > 0.6, "centre {}", centre);
        assert!(off < centre * 0.3, "off {}", off);
    }

    #[test]
    fn cutoff_above_nyquist_stays_stable() {
        let mut filter = FilterState::new(FilterType::LowPass, 40000.0, 0.7, SAMPLE_RATE);
        let level = rms_through(&mut filter, 440.0);
        assert!(level.is_finite());
    }

    #[test]
    fn very_low_sample_rate_does_not_panic() {
        for sample_rate in [1.0, 16.0, 20.0] {
            let mut filter = FilterState::new(FilterType::LowPass, 2000.0, 0.7, sample_rate);
            for i in 0..64 {
                assert!(filter.process((i % 2) as f32).is_finite());
            }
        }
    }
}
