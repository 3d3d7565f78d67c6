mod envelope;
mod filter;
mod waveform;

pub use self::envelope::{Envelope, Ramp};
pub use self::filter::{FilterState, FilterType};
pub use self::waveform::Waveform;

/// A free-running oscillator. Each tone builds its own; phase never leaks
/// from one render to the next.
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: f32,
    pub detune: f32, // Detune in cents
    phase: f32,
    phase_increment: f32,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f32, detune: f32, sample_rate: f32) -> Self {
        let mut osc = Self {
            waveform,
            frequency,
            detune,
            phase: 0.0,
            phase_increment: 0.0,
        };
        osc.phase_increment = osc.detuned_frequency() / sample_rate;
        osc
    }

    pub fn detuned_frequency(&self) -> f32 {
        self.frequency * self.get_frequency_multiplier()
    }

    pub fn get_frequency_multiplier(&self) -> f32 {
        2.0f32.powf(self.detune / 1200.0)
    }

    pub fn next_sample(&mut self) -> f32 {
        let value = self.waveform.sample(self.phase);
        self.phase = (self.phase + self.phase_increment).fract();
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detune_is_in_cents() {
        let osc = Oscillator::new(Waveform::Sine, 440.0, 1200.0, 44100.0);
        assert!((osc.detuned_frequency() - 880.0).abs() < 1e-3);
        let osc = Oscillator::new(Waveform::Sine, 440.0, -2.0, 44100.0);
        assert!(osc.detuned_frequency() < 440.0);
    }

    #[test]
    fn sine_completes_a_cycle() {
        let mut osc = Oscillator::new(Waveform::Sine, 441.0, 0.0, 44100.0);
        let samples: Vec<f32> = (0..101).map(|_| osc.next_sample()).collect();
        assert!(samples[0].abs() < 1e-6);
        assert!((samples[25] - 1.0).abs() < 1e-3);
        assert!(samples[100].abs() < 1e-3);
    }
}
