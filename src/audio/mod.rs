// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Output device abstraction.
//!
//! This module provides:
//! - The [`OutputDevice`] contract the scheduler plays through
//! - De-interleaved sample buffers ready for scheduling
//! - A cpal-backed device and an offline device without hardware

pub mod offline;
pub mod output;
pub mod resample;

pub use offline::OfflineDevice;
pub use output::{default_device_name, list_devices, AudioConfig, CpalDevice};
pub use resample::resample;

use std::sync::Arc;

pub use crate::error::DeviceError;

/// Opaque handle to a buffer scheduled on a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(pub u64);

/// Decoded audio, one sample vector per channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create an empty buffer
    pub fn new(channel_count: usize, sample_rate: u32) -> Self {
        Self {
            channels: vec![Vec::new(); channel_count],
            sample_rate,
        }
    }

    /// Wrap per-channel sample vectors
    ///
    /// Channels are truncated to the shortest one.
    pub fn from_channels(mut channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for channel in &mut channels {
            channel.truncate(frames);
        }
        Self {
            channels,
            sample_rate,
        }
    }

    /// Split interleaved samples across channels and append them
    ///
    /// A trailing partial frame is dropped.
    pub fn append_interleaved(&mut self, samples: &[f32]) {
        let channel_count = self.channels.len();
        if channel_count == 0 {
            return;
        }
        let frames = samples.len() / channel_count;
        for (channel_idx, channel) in self.channels.iter_mut().enumerate() {
            channel.reserve(frames);
            channel.extend(
                samples
                    .chunks_exact(channel_count)
                    .map(|frame| frame[channel_idx]),
            );
        }
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Samples of one channel
    pub fn channel(&self, idx: usize) -> &[f32] {
        &self.channels[idx]
    }

    /// Length in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// A device that can play buffers at future clock times
///
/// The clock is in seconds and never goes backwards.
pub trait OutputDevice {
    /// Current device clock in seconds
    fn now(&self) -> f64;

    /// Begin playing `buffer` at absolute device time `at`
    fn schedule(&mut self, buffer: &Arc<AudioBuffer>, at: f64) -> Result<VoiceId, DeviceError>;

    /// Stop and detach a scheduled buffer; unknown handles are ignored
    fn cancel(&mut self, voice: VoiceId);

    /// Rate buffers must have to play at the right speed, if fixed
    fn output_rate(&self) -> Option<u32> {
        None
    }
}
