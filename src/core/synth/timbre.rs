use serde::Serialize;

/// Notes below this frequency get the heavier bass treatment: stronger
/// overtones, slower hammer decay, narrower resonance and more reverb.
pub const BASS_THRESHOLD_HZ: f32 = 200.0;

/// Synthesis parameters derived from a note's frequency. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimbreProfile {
    pub brightness: f32,
    /// Multiplier applied to the requested duration.
    pub sustain: f32,
    pub harmonic_strength: f32,
    pub noise_level: f32,
    /// Base low-pass cutoff in Hz for the harmonic stack.
    pub filter_cutoff: f32,
}

impl TimbreProfile {
    pub fn for_frequency(frequency: f32) -> Self {
        if frequency < 150.0 {
            // deep bass: heavy, long tail
            Self {
                brightness: 0.4,
                sustain: 2.5,
                harmonic_strength: 0.9,
                noise_level: 0.2,
                filter_cutoff: frequency * 4.0,
            }
        } else if frequency < 300.0 {
            Self {
                brightness: 0.6,
                sustain: 1.8,
                harmonic_strength: 0.8,
                noise_level: 0.15,
                filter_cutoff: frequency * 6.0,
            }
        } else if frequency < 600.0 {
            Self {
                brightness: 0.8,
                sustain: 1.2,
                harmonic_strength: 1.0,
                noise_level: 0.12,
                filter_cutoff: frequency * 8.0,
            }
        } else {
            // treble: bright, short
            Self {
                brightness: 1.0,
                sustain: 0.8,
                harmonic_strength: 0.6,
                noise_level: 0.08,
                filter_cutoff: frequency * 12.0,
            }
        }
    }

    pub fn effective_duration(&self, duration: f32) -> f32 {
        duration * self.sustain
    }
}
