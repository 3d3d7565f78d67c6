pub mod export;
pub mod harmonics;
pub mod reverb;
pub mod timbre;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::oscillator::{Envelope, FilterState, FilterType, Oscillator, Waveform};
use crate::note::resolve_frequency;

use self::harmonics::build_stack;
use self::reverb::{convolve, ImpulseResponse, ReverbSettings};
use self::timbre::{TimbreProfile, BASS_THRESHOLD_HZ};

pub use self::export::render_to_wav;

pub const DEFAULT_DURATION: f32 = 0.8;
pub const DEFAULT_VELOCITY: f32 = 0.8;
/// Longest nominal duration a request may ask for, in seconds.
pub const MAX_DURATION: f32 = 10.0;

const HAMMER_LENGTH: f32 = 0.08;
const RESONANCE_START: f32 = 0.05;
// Frames below this level at the end of a render are dropped
const SILENCE_THRESHOLD: f32 = 1e-5;

/// One note to synthesize.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    pub note: String,
    /// Nominal length in seconds before the timbre's sustain multiplier.
    pub duration: f32,
    /// 0.0..=1.0
    pub velocity: f32,
    /// Fixes the hammer noise and reverb draw. `None` draws fresh entropy.
    pub seed: Option<u64>,
}

impl PlaybackRequest {
    pub fn new(note: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            duration: DEFAULT_DURATION,
            velocity: DEFAULT_VELOCITY,
            seed: None,
        }
    }

    pub fn duration(mut self, duration: f32) -> Self {
        self.duration = duration.clamp(0.0, MAX_DURATION);
        self
    }

    pub fn velocity(mut self, velocity: f32) -> Self {
        self.velocity = velocity.clamp(0.0, 1.0);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Stereo output of one render, ready for the mixer or a WAV file.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTone {
    pub note: String,
    pub sample_rate: u32,
    pub frames: Vec<[f32; 2]>,
}

impl RenderedTone {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        self.frames.len() as f32 / self.sample_rate as f32
    }
}

/// Piano tone synthesizer.
///
/// Holds nothing but the output rate: every render builds its own
/// oscillators, filters and RNG, so renders never influence each other.
#[derive(Debug, Clone, Copy)]
pub struct PianoSynth {
    pub sample_rate: f32,
}

impl PianoSynth {
    pub fn new(sample_rate: f32) -> Self {
        Self { sample_rate }
    }

    /// Render one note. Unknown or out-of-table notes log a warning and
    /// produce nothing.
    pub fn render(&self, request: &PlaybackRequest) -> Option<RenderedTone> {
        let Some(frequency) = resolve_frequency(&request.note) else {
            log::warn!("Note {} not found", request.note);
            return None;
        };

        let mut rng = match request.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let sr = self.sample_rate;
        let velocity = request.velocity.clamp(0.0, 1.0);
        let profile = TimbreProfile::for_frequency(frequency);
        let effective = profile.effective_duration(request.duration.clamp(0.0, MAX_DURATION));
        let bass = frequency < BASS_THRESHOLD_HZ;

        let mut partials = build_stack(frequency, &profile, effective, velocity, sr);
        let mut hammer = Hammer::new(frequency, &profile, velocity, bass, sr, &mut rng);
        let mut resonance = Resonance::new(frequency, effective, velocity, bass, sr);
        let master = master_envelope(effective, velocity);

        let end = partials
            .iter()
            .map(|p| p.stop_time())
            .fold(effective.max(HAMMER_LENGTH), f32::max)
            .max(resonance.stop_time);
        let dry_len = (end * sr).ceil() as usize;

        let mut mono = Vec::with_capacity(dry_len);
        for i in 0..dry_len {
            let t = i as f32 / sr;
            let mut sum: f32 = partials.iter_mut().map(|p| p.next(t)).sum();
            sum += hammer.next(t);
            sum += resonance.next(t);
            mono.push(sum * master.value_at(t));
        }

        let reverb = ReverbSettings::for_frequency(frequency);
        let ir = ImpulseResponse::generate(&reverb, sr, &mut rng);
        let scale = ir.normalization_scale(sr);
        let (wet_left, wet_right) = convolve(&mono, &ir, scale);

        let total = wet_left.len().max(mono.len());
        let mut frames: Vec<[f32; 2]> = (0..total)
            .map(|i| {
                let dry = mono.get(i).copied().unwrap_or(0.0) * reverb.dry;
                let l = wet_left.get(i).copied().unwrap_or(0.0) * reverb.wet;
                let r = wet_right.get(i).copied().unwrap_or(0.0) * reverb.wet;
                [dry + l, dry + r]
            })
            .collect();
        trim_silence(&mut frames);

        log::trace!(
            "rendered {} ({:.2} Hz): {} partials, {} frames, effective {:.2}s",
            request.note,
            frequency,
            partials.len(),
            frames.len(),
            effective
        );

        Some(RenderedTone {
            note: request.note.clone(),
            sample_rate: sr as u32,
            frames,
        })
    }
}

/// Overall amplitude shape applied to the summed voice.
pub fn master_envelope(effective: f32, velocity: f32) -> Envelope {
    Envelope::starting_at(0.0)
        .linear_to(0.8 * velocity, 0.01)
        .linear_to(0.6 * velocity, 0.05)
        .exponential_to(0.3 * velocity, effective * 0.2)
        .exponential_to(0.1 * velocity, effective * 0.6)
        .exponential_to(0.001, effective)
}

fn trim_silence(frames: &mut Vec<[f32; 2]>) {
    let keep = frames
        .iter()
        .rposition(|f| f[0].abs() > SILENCE_THRESHOLD || f[1].abs() > SILENCE_THRESHOLD)
        .map_or(0, |i| i + 1);
    frames.truncate(keep);
}

/// Short band-passed noise burst for the hammer strike.
struct Hammer {
    burst: Vec<f32>,
    filter: FilterState,
    gain: Envelope,
}

impl Hammer {
    fn new<R: Rng>(
        frequency: f32,
        profile: &TimbreProfile,
        velocity: f32,
        bass: bool,
        sample_rate: f32,
        rng: &mut R,
    ) -> Self {
        let len = (HAMMER_LENGTH * sample_rate) as usize;
        let falloff = if bass { 30.0 } else { 50.0 };
        let burst = (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate;
                let noise = rng.random::<f32>() * 2.0 - 1.0;
                (-t * falloff).exp() * noise * profile.noise_level * velocity
            })
            .collect();

        let centre = frequency * if bass { 6.0 } else { 8.0 };
        Self {
            burst,
            filter: FilterState::new(FilterType::BandPass, centre, 2.0, sample_rate),
            gain: Envelope::starting_at(0.5 * velocity).exponential_to(0.001, HAMMER_LENGTH),
        }
    }

    fn next(&mut self, t: f32) -> f32 {
        let i = self.burst_index(t);
        let input = self.burst.get(i).copied().unwrap_or(0.0);
        self.filter.process(input) * self.gain.value_at(t)
    }

    fn burst_index(&self, t: f32) -> usize {
        let rate = self.burst.len() as f32 / HAMMER_LENGTH;
        (t * rate).round() as usize
    }
}

/// Quiet sine an octave below the fundamental, through a narrow band-pass.
struct Resonance {
    osc: Oscillator,
    filter: FilterState,
    gain: Envelope,
    stop_time: f32,
}

impl Resonance {
    fn new(frequency: f32, effective: f32, velocity: f32, bass: bool, sample_rate: f32) -> Self {
        let sub = frequency * 0.5;
        let q = if bass { 30.0 } else { 20.0 };
        let strength = if bass { 0.15 } else { 0.1 };
        let stop_time = (effective * 1.5).max(RESONANCE_START);

        Self {
            osc: Oscillator::new(Waveform::Sine, sub, 0.0, sample_rate),
            filter: FilterState::new(FilterType::BandPass, sub, q, sample_rate),
            gain: Envelope::starting_at(0.0)
                .linear_to(strength * velocity, 0.1)
                .exponential_to(0.001, stop_time),
            stop_time,
        }
    }

    fn next(&mut self, t: f32) -> f32 {
        let source = if (RESONANCE_START..self.stop_time).contains(&t) {
            self.osc.next_sample()
        } else {
            0.0
        };
        self.filter.process(source) * self.gain.value_at(t)
    }
}
