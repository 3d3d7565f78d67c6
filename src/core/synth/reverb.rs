//! Procedural convolution reverb.
//!
//! The impulse response is generated per tone (stochastic decay plus an
//! early-reflection component) and applied with FFT convolution.

use rand::Rng;
use rustfft::{num_complex::Complex, FftPlanner};

use super::timbre::BASS_THRESHOLD_HZ;

// Same calibration constants a Web Audio convolver uses to normalise its IR
const GAIN_CALIBRATION: f32 = 0.00125;
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44100.0;
const MIN_POWER: f32 = 0.000125;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbSettings {
    /// Impulse response length in seconds.
    pub length: f32,
    pub decay: f32,
    pub dry: f32,
    pub wet: f32,
}

impl ReverbSettings {
    /// Low notes get a longer room and a wetter mix.
    pub fn for_frequency(frequency: f32) -> Self {
        if frequency < BASS_THRESHOLD_HZ {
            Self {
                length: 3.0,
                decay: 3.0,
                dry: 0.6,
                wet: 0.4,
            }
        } else {
            Self {
                length: 2.0,
                decay: 3.0,
                dry: 0.7,
                wet: 0.3,
            }
        }
    }
}

/// Stereo impulse response.
pub struct ImpulseResponse {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl ImpulseResponse {
    pub fn generate<R: Rng>(settings: &ReverbSettings, sample_rate: f32, rng: &mut R) -> Self {
        let len = (settings.length * sample_rate) as usize;
        let mut left = Vec::with_capacity(len);
        let mut right = Vec::with_capacity(len);

        for i in 0..len {
            let t = i as f32 / sample_rate;
            let envelope = (1.0 - t / settings.length).powf(settings.decay);
            let noise = (rng.random::<f32>() * 2.0 - 1.0) * envelope;
            let early = early_reflection(t) * envelope * 0.3;

            left.push((noise + early) * 0.5);
            right.push((noise - early) * 0.5);
        }

        Self { left, right }
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Power normalisation scale, so wet level does not depend on the noise
    /// draw or the IR length.
    pub fn normalization_scale(&self, sample_rate: f32) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let energy: f32 = self
            .left
            .iter()
            .chain(self.right.iter())
            .map(|s| s * s)
            .sum();
        let mut power = (energy / (2 * self.len()) as f32).sqrt();
        if !power.is_finite() || power < MIN_POWER {
            power = MIN_POWER;
        }
        (1.0 / power) * GAIN_CALIBRATION * (GAIN_CALIBRATION_SAMPLE_RATE / sample_rate)
    }
}

/// Convolve a mono signal with a stereo IR. Output length is
/// `input.len() + ir.len() - 1` per channel.
pub fn convolve(input: &[f32], ir: &ImpulseResponse, scale: f32) -> (Vec<f32>, Vec<f32>) {
    if input.is_empty() || ir.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let out_len = input.len() + ir.len() - 1;
    let fft_len = out_len.next_power_of_two();

    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(fft_len);
    let inverse = planner.plan_fft_inverse(fft_len);

    let to_spectrum = |signal: &[f32]| {
        let mut buffer = vec![Complex::new(0.0, 0.0); fft_len];
        for (slot, &s) in buffer.iter_mut().zip(signal) {
            slot.re = s;
        }
        forward.process(&mut buffer);
        buffer
    };

    let input_spectrum = to_spectrum(input);
    // rustfft leaves the inverse unnormalised
    let gain = scale / fft_len as f32;

    let mut render_channel = |ir_channel: &[f32]| {
        let mut spectrum = to_spectrum(ir_channel);
        for (bin, x) in spectrum.iter_mut().zip(&input_spectrum) {
            *bin *= *x;
        }
        inverse.process(&mut spectrum);
        spectrum[..out_len].iter().map(|c| c.re * gain).collect::<Vec<f32>>()
    };

    let left = render_channel(&ir.left);
    let right = render_channel(&ir.right);
    (left, right)
}

/// Low-frequency early-reflection shape, before the decay envelope.
fn early_reflection(t: f32) -> f32 {
    (t * 50.0).sin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn bass_gets_longer_wetter_room() {
        let bass = ReverbSettings::for_frequency(110.0);
        let treble = ReverbSettings::for_frequency(880.0);
        assert!(bass.length > treble.length);
        assert!(bass.wet > treble.wet);
        assert!((bass.dry + bass.wet - 1.0).abs() < 1e-6);
    }

    #[test]
    fn impulse_response_decays_and_splits_channels() {
        let mut rng = StdRng::seed_from_u64(7);
        let settings = ReverbSettings::for_frequency(440.0);
        let ir = ImpulseResponse::generate(&settings, 8000.0, &mut rng);
        assert_eq!(ir.len(), 16000);

        let head: f32 = ir.left[..800].iter().map(|s| s.abs()).sum();
        let tail: f32 = ir.left[15200..].iter().map(|s| s.abs()).sum();
        assert!(head > tail * 10.0);

        // L + R carries the noise, L - R the early reflection
        let i = 400;
        let t = i as f32 / 8000.0;
        let envelope = (1.0 - t / settings.length).powf(settings.decay);
        let diff = ir.left[i] - ir.right[i];
        assert!((diff - early_reflection(t) * envelope * 0.3).abs() < 1e-5);
    }

    #[test]
    fn convolving_with_a_unit_impulse_is_identity() {
        let ir = ImpulseResponse {
            left: vec![1.0, 0.0, 0.0],
            right: vec![0.0, 0.5, 0.0],
        };
        let input = [0.25, -0.5, 1.0, 0.0, 0.75];
        let (left, right) = convolve(&input, &ir, 1.0);
        assert_eq!(left.len(), 7);
        for (i, &x) in input.iter().enumerate() {
            assert!((left[i] - x).abs() < 1e-5);
            assert!((right[i + 1] - x * 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn normalization_is_independent_of_seed() {
        let settings = ReverbSettings::for_frequency(440.0);
        let a = ImpulseResponse::generate(&settings, 22050.0, &mut StdRng::seed_from_u64(1));
        let b = ImpulseResponse::generate(&settings, 22050.0, &mut StdRng::seed_from_u64(2));
        let sa = a.normalization_scale(22050.0);
        let sb = b.normalization_scale(22050.0);
        assert!((sa / sb - 1.0).abs() < 0.05);
    }
}
