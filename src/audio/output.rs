// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio output via cpal.
//!
//! The output callback renders every scheduled voice that overlaps the
//! current buffer. The device clock is the number of frames rendered so far
//! divided by the sample rate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::{AudioBuffer, DeviceError, OutputDevice, VoiceId};

/// Audio output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz (None = device default)
    #[serde(default)]
    pub sample_rate: Option<u32>,
    /// Buffer size in frames
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u32,
    /// Number of output channels
    #[serde(default = "default_channels")]
    pub channels: u16,
}

fn default_buffer_size() -> u32 {
    512
}
fn default_channels() -> u16 {
    2
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: None,
            buffer_size: default_buffer_size(),
            channels: default_channels(),
        }
    }
}

struct Voice {
    id: VoiceId,
    buffer: Arc<AudioBuffer>,
    start_frame: u64,
}

impl Voice {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.buffer.frames() as u64
    }
}

/// State shared between the control thread and the output callback
struct Mixer {
    voices: Vec<Voice>,
}

impl Mixer {
    fn render(&mut self, data: &mut [f32], channels: usize, first_frame: u64) {
        let frames = data.len() / channels;
        let last_frame = first_frame + frames as u64;

        for voice in &self.voices {
            if voice.end_frame() <= first_frame || voice.start_frame >= last_frame {
                continue;
            }
            let source_channels = voice.buffer.channel_count();
            if source_channels == 0 {
                continue;
            }
            let from = voice.start_frame.max(first_frame);
            let to = voice.end_frame().min(last_frame);
            for frame in from..to {
                let out_idx = (frame - first_frame) as usize * channels;
                let src_idx = (frame - voice.start_frame) as usize;
                for ch in 0..channels {
                    data[out_idx + ch] += voice.buffer.channel(ch % source_channels)[src_idx];
                }
            }
        }

        self.voices.retain(|v| v.end_frame() > last_frame);
    }
}

/// Output device backed by the system's default cpal output
pub struct CpalDevice {
    /// cpal stream
    _stream: Stream,
    /// Output device
    _device: Device,
    mixer: Arc<Mutex<Mixer>>,
    frames_rendered: Arc<AtomicU64>,
    sample_rate: u32,
    channels: u16,
    next_voice: u64,
}

impl CpalDevice {
    /// Open the default output device and start the stream
    pub fn open(config: &AudioConfig) -> Result<Self, DeviceError> {
        let host = cpal::default_host();

        let device = host.default_output_device().ok_or(DeviceError::NoDevice)?;

        let supported_config = device
            .default_output_config()
            .map_err(|e| DeviceError::InitFailed(format!("Failed to get default config: {}", e)))?;

        let sample_rate = config
            .sample_rate
            .unwrap_or_else(|| supported_config.sample_rate().0);

        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Fixed(config.buffer_size),
        };

        let channels = config.channels as usize;
        let mixer = Arc::new(Mutex::new(Mixer { voices: Vec::new() }));
        let frames_rendered = Arc::new(AtomicU64::new(0));

        let callback_mixer = Arc::clone(&mixer);
        let callback_frames = Arc::clone(&frames_rendered);
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for sample in data.iter_mut() {
                        *sample = 0.0;
                    }
                    let first_frame = callback_frames.load(Ordering::Acquire);
                    if let Ok(mut mixer) = callback_mixer.lock() {
                        mixer.render(data, channels, first_frame);
                    }
                    callback_frames.fetch_add((data.len() / channels) as u64, Ordering::Release);
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| DeviceError::StreamFailed(format!("Failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| DeviceError::StreamFailed(format!("Failed to start stream: {}", e)))?;

        debug!(sample_rate, channels = config.channels, "Opened cpal output");

        Ok(Self {
            _stream: stream,
            _device: device,
            mixer,
            frames_rendered,
            sample_rate,
            channels: config.channels,
            next_voice: 0,
        })
    }

    /// Get sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get number of channels
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl OutputDevice for CpalDevice {
    fn now(&self) -> f64 {
        self.frames_rendered.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn schedule(&mut self, buffer: &Arc<AudioBuffer>, at: f64) -> Result<VoiceId, DeviceError> {
        if buffer.sample_rate() != self.sample_rate {
            warn!(
                buffer_rate = buffer.sample_rate(),
                device_rate = self.sample_rate,
                "Buffer was not converted to the device rate"
            );
        }
        let rendered = self.frames_rendered.load(Ordering::Acquire);
        let start_frame = ((at.max(0.0) * self.sample_rate as f64).round() as u64).max(rendered);

        self.next_voice += 1;
        let id = VoiceId(self.next_voice);
        let mut mixer = self.mixer.lock().map_err(|_| DeviceError::LockFailed)?;
        mixer.voices.push(Voice {
            id,
            buffer: Arc::clone(buffer),
            start_frame,
        });
        Ok(id)
    }

    fn cancel(&mut self, voice: VoiceId) {
        if let Ok(mut mixer) = self.mixer.lock() {
            mixer.voices.retain(|v| v.id != voice);
        }
    }

    fn output_rate(&self) -> Option<u32> {
        Some(self.sample_rate)
    }
}

/// List available audio output devices
pub fn list_devices() -> Vec<String> {
    let host = cpal::default_host();
    host.output_devices()
        .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
        .unwrap_or_default()
}

/// Get default device name
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_output_device().and_then(|d| d.name().ok())
}
