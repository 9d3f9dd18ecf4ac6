//! Audio device output through `cpal`
//!
//! The stream runs for the host's whole lifetime, rendering silence when no
//! voice pair is installed, so the clock (frames rendered / sample rate)
//! keeps advancing between sessions. A newly started pair is scheduled a
//! fixed lookahead past the last rendered frame, which the callback cannot
//! have passed yet.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use tracing::{debug, error, info, warn};

use crate::engine::host::OutputHost;
use crate::engine::voice::VoicePair;
use crate::error::{LoopError, Result};

/// Frames between a start request and the first scheduled frame
pub const LOOKAHEAD_FRAMES: u64 = 2048;

type SharedPair = Arc<Mutex<Option<VoicePair>>>;

/// Output host backed by the default (or a named) audio device
pub struct DeviceHost {
    device_name: String,
    config: StreamConfig,
    pair: SharedPair,
    frames_rendered: Arc<AtomicU64>,
    error_flag: Arc<AtomicBool>,
    _stream: Stream,
}

impl DeviceHost {
    /// Open an output device and start its stream
    ///
    /// `preferred_rate` is used when the device supports it; otherwise the
    /// device default applies and [`OutputHost::start`] will reject tracks
    /// at a different rate.
    pub fn open(device_name: Option<&str>, preferred_rate: Option<u32>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(name) => {
                let mut devices = host
                    .output_devices()
                    .map_err(|e| host_error("enumerate devices", e))?;
                match devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                    Some(device) => device,
                    None => {
                        warn!("Output device '{}' not found, using default", name);
                        default_device(&host)?
                    }
                }
            }
            None => default_device(&host)?,
        };
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let (config, sample_format) = best_config(&device, preferred_rate)?;
        info!(
            "Opening output '{}': {} Hz, {} ch, {:?}",
            device_name, config.sample_rate.0, config.channels, sample_format
        );

        let pair: SharedPair = Arc::new(Mutex::new(None));
        let frames_rendered = Arc::new(AtomicU64::new(0));
        let error_flag = Arc::new(AtomicBool::new(false));

        let shared = CallbackShared {
            pair: Arc::clone(&pair),
            frames_rendered: Arc::clone(&frames_rendered),
            error_flag: Arc::clone(&error_flag),
        };
        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, shared)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, shared)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, shared)?,
            other => {
                return Err(LoopError::HostOutput {
                    reason: format!("Unsupported device sample format: {:?}", other),
                })
            }
        };
        stream.play().map_err(|e| host_error("start stream", e))?;

        Ok(Self {
            device_name,
            config,
            pair,
            frames_rendered,
            error_flag,
            _stream: stream,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn channels(&self) -> usize {
        self.config.channels as usize
    }

    /// Whether the stream has reported an error since opening
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }
}

impl OutputHost for DeviceHost {
    fn now(&self) -> f64 {
        self.frames_rendered.load(Ordering::Acquire) as f64 / self.config.sample_rate.0 as f64
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn start(&mut self, mut pair: VoicePair) -> Result<f64> {
        if self.has_error() {
            return Err(LoopError::HostOutput {
                reason: format!("output '{}' reported a stream error", self.device_name),
            });
        }
        if pair.sample_rate() != self.sample_rate() {
            return Err(LoopError::HostOutput {
                reason: format!(
                    "device runs at {} Hz but tracks are {} Hz",
                    self.sample_rate(),
                    pair.sample_rate()
                ),
            });
        }

        let start_frame = self.frames_rendered.load(Ordering::Acquire) + LOOKAHEAD_FRAMES;
        pair.schedule_at(start_frame);
        let mut slot = self.pair.lock().map_err(|_| LoopError::HostOutput {
            reason: "voice pair lock poisoned".to_string(),
        })?;
        *slot = Some(pair);
        debug!("Scheduled voice pair at frame {}", start_frame);
        Ok(start_frame as f64 / self.sample_rate() as f64)
    }

    fn stop(&mut self) {
        match self.pair.lock() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

impl std::fmt::Debug for DeviceHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHost")
            .field("device_name", &self.device_name)
            .field("sample_rate", &self.config.sample_rate.0)
            .field("channels", &self.config.channels)
            .finish()
    }
}

// ============================================================================
// Stream setup
// ============================================================================

struct CallbackShared {
    pair: SharedPair,
    frames_rendered: Arc<AtomicU64>,
    error_flag: Arc<AtomicBool>,
}

fn default_device(host: &cpal::Host) -> Result<Device> {
    host.default_output_device().ok_or_else(|| LoopError::HostOutput {
        reason: "No default output device found".to_string(),
    })
}

fn host_error(action: &str, e: impl std::fmt::Display) -> LoopError {
    LoopError::HostOutput {
        reason: format!("Failed to {}: {}", action, e),
    }
}

/// Prefer a stereo config at `preferred_rate`, else the device default
fn best_config(device: &Device, preferred_rate: Option<u32>) -> Result<(StreamConfig, SampleFormat)> {
    if let Some(rate) = preferred_rate {
        let mut supported = device
            .supported_output_configs()
            .map_err(|e| host_error("query device configs", e))?;
        let matching = supported.find(|config| {
            config.channels() == 2
                && config.min_sample_rate().0 <= rate
                && config.max_sample_rate().0 >= rate
        });
        if let Some(config) = matching {
            let format = config.sample_format();
            return Ok((config.with_sample_rate(cpal::SampleRate(rate)).config(), format));
        }
        debug!("No stereo config at {} Hz, using device default", rate);
    }

    let default = device
        .default_output_config()
        .map_err(|e| host_error("query default config", e))?;
    let format = default.sample_format();
    Ok((default.config(), format))
}

fn build_stream<T>(device: &Device, config: &StreamConfig, shared: CallbackShared) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let CallbackShared {
        pair,
        frames_rendered,
        error_flag,
    } = shared;
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.clear();
                scratch.resize(data.len(), 0.0);
                let first_frame = frames_rendered.load(Ordering::Acquire);

                // never block the audio thread; a contended block plays silence
                if let Ok(slot) = pair.try_lock() {
                    if let Some(pair) = slot.as_ref() {
                        pair.render(&mut scratch, channels, first_frame);
                    }
                }

                for (out, &sample) in data.iter_mut().zip(&scratch) {
                    *out = T::from_sample(sample.clamp(-1.0, 1.0));
                }
                frames_rendered.fetch_add((data.len() / channels) as u64, Ordering::Release);
            },
            move |err| {
                error!("Audio stream error: {}", err);
                error_flag.store(true, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| host_error("build stream", e))
}
