// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Output device without audio hardware.
//!
//! Records every scheduled voice instead of rendering it. The clock either
//! follows wall time (dry runs) or is moved by hand (tests). A wall clock
//! device only keeps voices that are still pending or playing.

use std::sync::Arc;
use std::time::Instant;

use super::{AudioBuffer, DeviceError, OutputDevice, VoiceId};

#[derive(Debug, Clone, Copy)]
enum ClockSource {
    Manual(f64),
    Wall(Instant),
}

/// A buffer handed to the offline device
#[derive(Debug, Clone)]
pub struct ScheduledVoice {
    /// Handle returned to the caller
    pub id: VoiceId,
    /// Absolute start time in seconds
    pub at: f64,
    /// Buffer length in seconds
    pub duration: f64,
    /// Whether the voice was cancelled
    pub cancelled: bool,
}

/// Device that only keeps a log of what would have played
#[derive(Debug)]
pub struct OfflineDevice {
    clock: ClockSource,
    voices: Vec<ScheduledVoice>,
    next_voice: u64,
    sample_rate: Option<u32>,
}

impl OfflineDevice {
    /// Create a device whose clock only moves via [`set_time`](Self::set_time)
    /// and [`advance`](Self::advance)
    pub fn manual() -> Self {
        Self {
            clock: ClockSource::Manual(0.0),
            voices: Vec::new(),
            next_voice: 0,
            sample_rate: None,
        }
    }

    /// Create a device whose clock follows wall time from now
    pub fn wall_clock() -> Self {
        Self {
            clock: ClockSource::Wall(Instant::now()),
            voices: Vec::new(),
            next_voice: 0,
            sample_rate: None,
        }
    }

    /// Report a fixed output rate, like a hardware device would
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    /// Set the manual clock; ignored for wall clocks and never moves backwards
    pub fn set_time(&mut self, secs: f64) {
        if let ClockSource::Manual(current) = &mut self.clock {
            *current = current.max(secs);
        }
    }

    /// Move the manual clock forward
    pub fn advance(&mut self, secs: f64) {
        let now = self.now();
        self.set_time(now + secs.max(0.0));
    }

    /// Voices scheduled so far, in scheduling order
    ///
    /// Manual clocks keep the full log. Wall clocks drop finished and
    /// cancelled voices whenever a new one is scheduled.
    pub fn voices(&self) -> &[ScheduledVoice] {
        &self.voices
    }

    /// Voices that were not cancelled
    pub fn active_voices(&self) -> impl Iterator<Item = &ScheduledVoice> {
        self.voices.iter().filter(|v| !v.cancelled)
    }
}

impl OutputDevice for OfflineDevice {
    fn now(&self) -> f64 {
        match self.clock {
            ClockSource::Manual(t) => t,
            ClockSource::Wall(start) => start.elapsed().as_secs_f64(),
        }
    }

    fn schedule(&mut self, buffer: &Arc<AudioBuffer>, at: f64) -> Result<VoiceId, DeviceError> {
        if let ClockSource::Wall(start) = self.clock {
            let now = start.elapsed().as_secs_f64();
            self.voices.retain(|v| !v.cancelled && v.at + v.duration > now);
        }
        self.next_voice += 1;
        let id = VoiceId(self.next_voice);
        self.voices.push(ScheduledVoice {
            id,
            at,
            duration: buffer.duration_secs(),
            cancelled: false,
        });
        Ok(id)
    }

    fn cancel(&mut self, voice: VoiceId) {
        if let Some(v) = self.voices.iter_mut().find(|v| v.id == voice) {
            v.cancelled = true;
        }
    }

    fn output_rate(&self) -> Option<u32> {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_monotonic() {
        let mut device = OfflineDevice::manual();
        device.set_time(2.0);
        device.set_time(1.0);
        assert_eq!(device.now(), 2.0);
        device.advance(0.5);
        assert_eq!(device.now(), 2.5);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut device = OfflineDevice::manual();
        let buffer = Arc::new(AudioBuffer::new(1, 10));
        let id = device.schedule(&buffer, 0.0).unwrap();
        device.cancel(id);
        device.cancel(id);
        device.cancel(VoiceId(99));
        assert_eq!(device.voices().len(), 1);
        assert_eq!(device.active_voices().count(), 0);
    }

    #[test]
    fn test_wall_clock_drops_finished_voices() {
        let mut device = OfflineDevice::wall_clock();
        let ended = Arc::new(AudioBuffer::new(1, 10));
        for _ in 0..100 {
            device.schedule(&ended, -1.0).unwrap();
        }
        let mut long = AudioBuffer::new(1, 10);
        long.append_interleaved(&vec![0.0; 36_000]);
        let long = Arc::new(long);
        let playing = device.schedule(&long, 0.0).unwrap();
        let cancelled = device.schedule(&long, 0.0).unwrap();
        device.cancel(cancelled);
        device.schedule(&long, 0.0).unwrap();

        assert_eq!(device.voices().len(), 2);
        assert_eq!(device.voices()[0].id, playing);
    }

    #[test]
    fn test_manual_clock_keeps_full_log() {
        let mut device = OfflineDevice::manual();
        let ended = Arc::new(AudioBuffer::new(1, 10));
        for _ in 0..5 {
            device.schedule(&ended, 0.0).unwrap();
        }
        device.advance(10.0);
        device.schedule(&ended, 10.0).unwrap();
        assert_eq!(device.voices().len(), 6);
    }

    #[test]
    fn test_reported_rate() {
        assert_eq!(OfflineDevice::manual().output_rate(), None);
        assert_eq!(
            OfflineDevice::manual().with_sample_rate(48000).output_rate(),
            Some(48000)
        );
    }
}
