use crate::core::oscillator::{Envelope, FilterState, FilterType, Oscillator, Waveform};

use super::timbre::{TimbreProfile, BASS_THRESHOLD_HZ};

pub struct PartialSpec {
    pub ratio: f32,
    pub bass_gain: f32,
    pub gain: f32,
    pub detune: f32, // cents
    pub waveform: Waveform,
}

impl PartialSpec {
    const fn new(ratio: f32, bass_gain: f32, gain: f32, detune: f32, waveform: Waveform) -> Self {
        Self {
            ratio,
            bass_gain,
            gain,
            detune,
            waveform,
        }
    }
}

/// Eight string harmonics followed by two slightly inharmonic partials that
/// stand in for string stiffness.
///
/// Columns: ratio, bass gain, gain, detune in cents, waveform.
pub const HARMONICS: [PartialSpec; 10] = [
    PartialSpec::new(1.0, 1.0, 1.0, 0.0, Waveform::Saw),
    PartialSpec::new(2.0, 0.7, 0.5, -2.0, Waveform::Saw),
    PartialSpec::new(3.0, 0.4, 0.25, 1.0, Waveform::Triangle),
    PartialSpec::new(4.0, 0.25, 0.15, -1.0, Waveform::Triangle),
    PartialSpec::new(5.0, 0.15, 0.1, 2.0, Waveform::Sine),
    PartialSpec::new(6.0, 0.12, 0.08, -1.5, Waveform::Sine),
    PartialSpec::new(7.0, 0.1, 0.06, 1.2, Waveform::Sine),
    PartialSpec::new(8.0, 0.08, 0.04, -0.8, Waveform::Sine),
    PartialSpec::new(2.1, 0.02, 0.02, 0.0, Waveform::Sine),
    PartialSpec::new(3.05, 0.015, 0.015, 0.0, Waveform::Sine),
];

/// One voice of the harmonic stack: oscillator, its own low-pass, its own
/// envelope.
pub struct Partial {
    osc: Oscillator,
    filter: FilterState,
    envelope: Envelope,
    stop_time: f32,
}

impl Partial {
    pub fn stop_time(&self) -> f32 {
        self.stop_time
    }

    pub fn next(&mut self, t: f32) -> f32 {
        let source = if t < self.stop_time {
            self.osc.next_sample()
        } else {
            0.0
        };
        self.filter.process(source) * self.envelope.value_at(t)
    }
}

/// Build the stack for one note. Partials at or above Nyquist are dropped.
pub fn build_stack(
    frequency: f32,
    profile: &TimbreProfile,
    effective: f32,
    velocity: f32,
    sample_rate: f32,
) -> Vec<Partial> {
    let bass = frequency < BASS_THRESHOLD_HZ;
    let nyquist = sample_rate / 2.0;

    HARMONICS
        .iter()
        .enumerate()
        .filter_map(|(index, spec)| {
            let partial_frequency = frequency * spec.ratio;
            let osc = Oscillator::new(spec.waveform, partial_frequency, spec.detune, sample_rate);
            if osc.detuned_frequency() >= nyquist {
                log::trace!("skipping partial {} at {:.1} Hz", index, osc.detuned_frequency());
                return None;
            }

            let i = index as f32;
            let cutoff = profile.filter_cutoff * (1.0 - i * 0.1);
            let filter = FilterState::new(FilterType::LowPass, cutoff, 0.7, sample_rate);

            let gain = if bass { spec.bass_gain } else { spec.gain };
            let peak = gain * profile.harmonic_strength * velocity;
            let attack = 0.008 + i * 0.002;
            let decay = effective * (0.8 + i * 0.05);

            let envelope = Envelope::starting_at(0.0)
                .linear_to(peak * 0.8, attack)
                .linear_to(peak * 0.6, 0.1)
                .exponential_to(peak * 0.2, decay * 0.3)
                .exponential_to(0.001, decay);

            Some(Partial {
                osc,
                filter,
                envelope,
                stop_time: decay + 0.1,
            })
        })
        .collect()
}
