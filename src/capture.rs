//! Microphone capture for push-to-talk recording.
//!
//! Captures at the device's native rate, downsamples to the configured
//! target (default 16kHz mono), and slices the take into fixed-interval
//! fragments. [`RecordingSession`] holds the pure accumulation state so it
//! can be tested without audio hardware; [`Recorder`] binds it to a cpal
//! input stream.

use crate::codec;
use crate::config::AudioConfig;
use crate::error::{ClientError, Result};
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Why microphone access could not be established.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PermissionError {
    /// Access to the device was denied.
    #[error("microphone access denied: {0}")]
    NotAllowed(String),
    /// No capture device exists.
    #[error("no microphone found: {0}")]
    NotFound(String),
    /// The device cannot satisfy any usable stream configuration.
    #[error("audio capture not supported: {0}")]
    NotSupported(String),
    /// Anything else.
    #[error("microphone error: {0}")]
    Other(String),
}

impl PermissionError {
    /// User-facing remediation text rendered into the conversation.
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::NotAllowed(_) => {
                "Microphone access was denied. Allow microphone access in your system's privacy or permission settings, then try again."
            }
            Self::NotFound(_) => {
                "No microphone was found. Connect a microphone and try again."
            }
            Self::NotSupported(_) => {
                "Audio capture is not supported on this device."
            }
            Self::Other(_) => {
                "The microphone could not be opened. Check your audio settings and try again."
            }
        }
    }
}

/// Verify microphone access by opening and immediately dropping an input
/// stream on the default device.
///
/// # Errors
///
/// Returns a categorized [`PermissionError`] when the probe fails.
pub fn request_permission() -> std::result::Result<(), PermissionError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| PermissionError::NotFound("no default input device".into()))?;

    let default_config = device
        .default_input_config()
        .map_err(|e| PermissionError::NotSupported(e.to_string()))?;

    let stream = device
        .build_input_stream(
            &default_config.into(),
            |_data: &[f32], _info: &cpal::InputCallbackInfo| {},
            |err| {
                debug!("permission probe stream error: {err}");
            },
            None,
        )
        .map_err(categorize_build_error)?;

    stream
        .play()
        .map_err(|e| PermissionError::Other(e.to_string()))?;

    drop(stream);
    info!("microphone permission verified");
    Ok(())
}

fn categorize_build_error(err: cpal::BuildStreamError) -> PermissionError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => {
            PermissionError::NotFound(err.to_string())
        }
        cpal::BuildStreamError::StreamConfigNotSupported => {
            PermissionError::NotSupported(err.to_string())
        }
        other => {
            // cpal has no first-class permission error; backends report
            // denied access through their message text.
            let text = other.to_string();
            let lowered = text.to_lowercase();
            if lowered.contains("permission") || lowered.contains("denied") || lowered.contains("access") {
                PermissionError::NotAllowed(text)
            } else {
                PermissionError::Other(text)
            }
        }
    }
}

/// Accumulation state for one push-to-talk take.
///
/// Samples arrive at the target rate and are sliced into fixed-length
/// fragments. At most one session is active; starting an active session is
/// a no-op.
#[derive(Debug)]
pub struct RecordingSession {
    fragments: Vec<Vec<f32>>,
    pending: Vec<f32>,
    fragment_len: usize,
    active: bool,
}

impl RecordingSession {
    /// Create an idle session slicing fragments of `fragment_len` samples.
    pub fn new(fragment_len: usize) -> Self {
        Self {
            fragments: Vec::new(),
            pending: Vec::new(),
            fragment_len: fragment_len.max(1),
            active: false,
        }
    }

    /// Begin a new take. Returns false (and changes nothing) if a take is
    /// already in progress.
    pub fn start(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.fragments.clear();
        self.pending.clear();
        self.active = true;
        true
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Feed captured samples, slicing completed fragments off the front.
    /// Ignored while idle (a stream callback may still fire briefly after
    /// stop).
    pub fn push_samples(&mut self, samples: &[f32]) {
        if !self.active {
            return;
        }
        self.pending.extend_from_slice(samples);
        while self.pending.len() >= self.fragment_len {
            let rest = self.pending.split_off(self.fragment_len);
            let fragment = std::mem::replace(&mut self.pending, rest);
            self.fragments.push(fragment);
        }
    }

    /// End the take and return all samples in capture order.
    ///
    /// The trailing partial fragment is flushed. Returns `None` when the
    /// session was idle or captured nothing.
    pub fn finalize(&mut self) -> Option<Vec<f32>> {
        if !self.active {
            return None;
        }
        self.active = false;
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            self.fragments.push(tail);
        }
        if self.fragments.is_empty() {
            return None;
        }
        let total: usize = self.fragments.iter().map(Vec::len).sum();
        let mut samples = Vec::with_capacity(total);
        for fragment in self.fragments.drain(..) {
            samples.extend(fragment);
        }
        Some(samples)
    }
}

/// Push-to-talk recorder bound to a cpal input stream.
pub struct Recorder {
    device: cpal::Device,
    stream_config: StreamConfig,
    target_sample_rate: u32,
    session: Arc<Mutex<RecordingSession>>,
    stream: Option<cpal::Stream>,
}

impl Recorder {
    /// Create a recorder for the configured input device.
    ///
    /// Uses the device's default configuration and downsamples in software,
    /// so it works regardless of what rates the hardware offers.
    ///
    /// # Errors
    ///
    /// Returns an error if no input device is available.
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let host = cpal::default_host();

        let device = if let Some(ref name) = config.input_device {
            host.input_devices()
                .map_err(|e| ClientError::Audio(format!("cannot enumerate devices: {e}")))?
                .find(|d| {
                    d.description()
                        .ok()
                        .map(|desc| desc.name() == name)
                        .unwrap_or(false)
                })
                .ok_or_else(|| ClientError::Audio(format!("input device '{name}' not found")))?
        } else {
            host.default_input_device()
                .ok_or_else(|| ClientError::Audio("no default input device".into()))?
        };

        let device_name = device
            .description()
            .map(|d| d.name().to_owned())
            .unwrap_or_else(|_| "<unknown>".into());
        info!("using input device: {device_name}");

        let default_config = device
            .default_input_config()
            .map_err(|e| ClientError::Audio(format!("no default input config: {e}")))?;

        let stream_config = StreamConfig {
            channels: default_config.channels(),
            sample_rate: default_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let fragment_len = (config.sample_rate as u64 * config.fragment_interval_ms / 1000) as usize;

        Ok(Self {
            device,
            stream_config,
            target_sample_rate: config.sample_rate,
            session: Arc::new(Mutex::new(RecordingSession::new(fragment_len))),
            stream: None,
        })
    }

    pub fn is_recording(&self) -> bool {
        self.stream.is_some()
    }

    /// Start a take. No-op when already recording.
    ///
    /// # Errors
    ///
    /// Returns an error if the input stream cannot be created.
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            debug!("recording already in progress, ignoring start");
            return Ok(());
        }

        {
            let mut session = self
                .session
                .lock()
                .map_err(|e| ClientError::Audio(format!("session lock poisoned: {e}")))?;
            session.start();
        }

        let native_rate = self.stream_config.sample_rate;
        let native_channels = self.stream_config.channels;
        let target_rate = self.target_sample_rate;
        let session = Arc::clone(&self.session);

        let built = self
            .device
            .build_input_stream(
                &self.stream_config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    let mono = if native_channels > 1 {
                        to_mono(data, native_channels)
                    } else {
                        data.to_vec()
                    };
                    let samples = if native_rate != target_rate {
                        downsample(&mono, native_rate, target_rate)
                    } else {
                        mono
                    };
                    if let Ok(mut session) = session.lock() {
                        session.push_samples(&samples);
                    }
                },
                move |err| {
                    error!("audio input stream error: {err}");
                },
                None,
            )
            .map_err(|e| ClientError::Audio(format!("failed to build input stream: {e}")))
            .and_then(|stream| {
                stream
                    .play()
                    .map_err(|e| ClientError::Audio(format!("failed to start input stream: {e}")))?;
                Ok(stream)
            });

        let stream = match built {
            Ok(stream) => stream,
            Err(e) => {
                // Abort the session so the failed take cannot leak into the
                // next one.
                if let Ok(mut session) = self.session.lock() {
                    let _ = session.finalize();
                }
                return Err(e);
            }
        };

        self.stream = Some(stream);
        info!(
            "recording started: native {}Hz -> target {}Hz",
            native_rate, target_rate
        );
        Ok(())
    }

    /// Stop the take and return the recording as base64-encoded WAV.
    ///
    /// No-op when idle. Returns `None` when nothing was captured.
    ///
    /// # Errors
    ///
    /// Returns an error if WAV framing fails.
    pub fn stop(&mut self) -> Result<Option<String>> {
        let Some(stream) = self.stream.take() else {
            return Ok(None);
        };
        drop(stream);

        let samples = {
            let mut session = self
                .session
                .lock()
                .map_err(|e| ClientError::Audio(format!("session lock poisoned: {e}")))?;
            session.finalize()
        };

        match samples {
            Some(samples) => {
                info!("recording stopped: {} samples", samples.len());
                let payload = codec::encode_audio_payload(&samples, self.target_sample_rate, 1)?;
                Ok(Some(payload))
            }
            None => {
                warn!("recording stopped with no audio captured");
                Ok(None)
            }
        }
    }

    /// List available input devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_input_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| ClientError::Audio(format!("cannot enumerate devices: {e}")))?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(desc) = device.description() {
                names.push(desc.name().to_owned());
            }
        }
        Ok(names)
    }
}

/// Convert interleaved multi-channel audio to mono by averaging channels.
fn to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    let ch = channels as usize;
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Linear-interpolation downsampler. Speech energy sits below 8kHz, so no
/// anti-alias filter is needed for 48kHz -> 16kHz.
fn downsample(samples: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = src_rate as f64 / dst_rate as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            samples[idx] as f64 * (1.0 - frac) + samples[idx + 1] as f64 * frac
        } else {
            samples[idx.min(samples.len() - 1)] as f64
        };

        output.push(sample as f32);
    }

    output
}
