//! Audio output: device lifecycle, the mixer that runs on the audio thread,
//! and the player that turns note names into sound.

pub mod mixer;
pub mod player;

#[cfg(test)]
pub mod testing;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat, Stream};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::config::AudioSettings;
use crate::core::synth::RenderedTone;
use crate::core::voice::Voice;
use crate::utils::helpers::db_to_amplitude;

pub use mixer::{Mixer, MixerCommand, SPENT_CAPACITY};
pub use player::{Dispatch, PianoPlayer, PlayOutcome, SkipReason};

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("unsupported sample format {0}")]
    UnsupportedFormat(String),
    #[error("failed to query output config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build output stream: {0}")]
    Build(#[from] cpal::BuildStreamError),
    #[error("failed to start output stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
    #[error("failed to pause output stream: {0}")]
    Pause(#[from] cpal::PauseStreamError),
    #[error("audio context is closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Created but not yet allowed to make sound.
    Suspended,
    Running,
    Closed,
}

/// Anything that can accept rendered tones for playback.
pub trait ToneSink: Send + Sync {
    fn is_running(&self) -> bool;
    fn sample_rate(&self) -> f32;
    fn submit(&self, tone: RenderedTone);
    /// Silence every tone that is still sounding.
    fn stop_all(&self);
}

/// Cloneable, thread-safe side of an [`AudioContext`].
#[derive(Clone)]
pub struct ContextHandle {
    state: Arc<RwLock<ContextState>>,
    sender: Sender<MixerCommand>,
    spent: Receiver<Voice>,
    sample_rate: f32,
}

impl ContextHandle {
    pub fn state(&self) -> ContextState {
        self.state
            .read()
            .map(|s| *s)
            .unwrap_or(ContextState::Closed)
    }

    /// Free voices the mixer has finished with. Returns how many.
    pub fn reclaim(&self) -> usize {
        let mut freed = 0;
        for voice in self.spent.try_iter() {
            log::trace!("freeing finished voice {}", voice.note());
            freed += 1;
        }
        freed
    }

    fn set_state(&self, state: ContextState) {
        if let Ok(mut guard) = self.state.write() {
            *guard = state;
        }
    }
}

impl ToneSink for ContextHandle {
    fn is_running(&self) -> bool {
        self.state() == ContextState::Running
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn submit(&self, tone: RenderedTone) {
        self.reclaim();
        if !self.is_running() {
            log::debug!("audio context not running, dropping {}", tone.note);
            return;
        }
        self.sender.send(MixerCommand::Play(Arc::new(tone))).ok();
    }

    fn stop_all(&self) {
        self.reclaim();
        self.sender.send(MixerCommand::StopAll).ok();
    }
}

/// Owns the output stream. Starts suspended; `resume` stands in for the
/// first user gesture that unlocks audio.
pub struct AudioContext {
    stream: Option<Stream>,
    handle: ContextHandle,
    device_name: String,
}

impl AudioContext {
    /// Open the default output device. The stream is built but kept paused.
    pub fn new(settings: &AudioSettings) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        log::info!("Using audio host: {}", host.id().name());

        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let config = device.default_output_config()?;
        let sample_format = config.sample_format();
        let config = cpal::StreamConfig::from(config);
        let sample_rate = config.sample_rate.0 as f32;
        log::info!("Using output device: {} @ {}Hz", device_name, sample_rate);

        let (handle, mixer) = Self::channel(settings, sample_rate);

        let stream = match sample_format {
            SampleFormat::F32 => create_stream::<f32>(&device, &config, mixer),
            SampleFormat::I16 => create_stream::<i16>(&device, &config, mixer),
            SampleFormat::U16 => create_stream::<u16>(&device, &config, mixer),
            other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
        }?;

        // some backends start streams as soon as they are built
        if let Err(err) = stream.pause() {
            log::debug!("could not pause new stream: {}", err);
        }

        Ok(Self {
            stream: Some(stream),
            handle,
            device_name,
        })
    }

    /// A context without a device. The caller drives the returned mixer.
    pub fn detached(settings: &AudioSettings, sample_rate: f32) -> (Self, Mixer) {
        let (handle, mixer) = Self::channel(settings, sample_rate);
        let context = Self {
            stream: None,
            handle,
            device_name: "detached".to_string(),
        };
        (context, mixer)
    }

    fn channel(settings: &AudioSettings, sample_rate: f32) -> (ContextHandle, Mixer) {
        let (sender, receiver) = unbounded();
        let (spent_tx, spent) = bounded(SPENT_CAPACITY);
        let mixer = Mixer::new(
            receiver,
            spent_tx,
            settings.max_voices,
            db_to_amplitude(settings.master_volume_db),
        );
        let handle = ContextHandle {
            state: Arc::new(RwLock::new(ContextState::Suspended)),
            sender,
            spent,
            sample_rate,
        };
        (handle, mixer)
    }

    pub fn handle(&self) -> ContextHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> ContextState {
        self.handle.state()
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> f32 {
        self.handle.sample_rate
    }

    pub fn resume(&mut self) -> Result<(), AudioError> {
        match self.state() {
            ContextState::Closed => Err(AudioError::Closed),
            ContextState::Running => Ok(()),
            ContextState::Suspended => {
                if let Some(stream) = &self.stream {
                    stream.play()?;
                }
                self.handle.set_state(ContextState::Running);
                log::info!("Audio context resumed");
                Ok(())
            }
        }
    }

    pub fn suspend(&mut self) -> Result<(), AudioError> {
        match self.state() {
            ContextState::Closed => Err(AudioError::Closed),
            ContextState::Suspended => Ok(()),
            ContextState::Running => {
                self.handle.set_state(ContextState::Suspended);
                if let Some(stream) = &self.stream {
                    stream.pause()?;
                }
                log::info!("Audio context suspended");
                Ok(())
            }
        }
    }

    /// Stop all sound and release the device. Idempotent.
    pub fn close(&mut self) {
        if self.state() == ContextState::Closed {
            return;
        }
        self.handle.set_state(ContextState::Closed);
        self.handle.stop_all();
        self.stream = None;
        self.handle.reclaim();
        log::info!("Audio context closed");
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        self.close();
    }
}

fn create_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut mixer: Mixer,
) -> Result<Stream, AudioError>
where
    T: Sample + Send + 'static + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let err_fn = |err| log::error!("an error occurred on the audio stream: {}", err);

    // scratch buffer so the mixer always works in f32
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            mixer.fill(&mut scratch, channels);
            for (out, &value) in data.iter_mut().zip(scratch.iter()) {
                *out = T::from_sample(value);
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
