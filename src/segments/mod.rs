// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Segment store and decoder adapter.
//!
//! Segments are the pre-rendered audio units the scheduler strings together.
//! They arrive from a decode worker as protocol messages and are kept here
//! in load order until the session ends.

pub mod decoder;
pub mod ogg;
pub mod wav;

pub use decoder::{
    DecodeWorker, DecoderMessage, MemorySource, SegmentSource, SessionAssembler, SessionProgress,
};
pub use ogg::OggFileSource;
pub use wav::WavDirectorySource;

use std::sync::Arc;

use crate::audio::{AudioBuffer, OutputDevice, VoiceId};
use crate::error::{LoadError, PlaybackError};

/// One decoded audio segment
#[derive(Debug, Clone)]
pub struct Segment {
    /// Position in load order
    pub index: usize,
    /// Length in seconds
    pub duration: f64,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channel_count: usize,
    /// Start time within the original source (informational)
    pub offset: f64,
    audio: Arc<AudioBuffer>,
}

impl Segment {
    /// Create a segment from decoded audio
    pub fn new(index: usize, duration: f64, offset: f64, audio: AudioBuffer) -> Self {
        Self {
            index,
            duration,
            sample_rate: audio.sample_rate(),
            channel_count: audio.channel_count(),
            offset,
            audio: Arc::new(audio),
        }
    }

    /// Decoded samples
    pub fn audio(&self) -> &Arc<AudioBuffer> {
        &self.audio
    }

    /// End time within the original source
    pub fn end_offset(&self) -> f64 {
        self.offset + self.duration
    }
}

/// Whether `secs` can be used as a segment length
pub fn is_valid_duration(secs: f64) -> bool {
    secs.is_finite() && secs >= 0.0
}

/// Handle to a segment scheduled on the device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSegment {
    /// Segment index
    pub segment: usize,
    /// Device voice
    pub voice: VoiceId,
    /// Absolute device start time
    pub start_at: f64,
}

/// Holds the decoded segments of the current session
#[derive(Debug, Default)]
pub struct SegmentStore {
    segments: Vec<Segment>,
}

impl SegmentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment; indices must arrive in ascending order and
    /// durations must be finite and non-negative
    pub fn add(&mut self, segment: Segment) -> Result<(), LoadError> {
        let expected = self.segments.len();
        if segment.index != expected {
            return Err(LoadError::OutOfOrder {
                expected,
                got: segment.index,
            });
        }
        if !is_valid_duration(segment.duration) {
            return Err(LoadError::InvalidDuration {
                index: segment.index,
                duration: segment.duration,
            });
        }
        self.segments.push(segment);
        Ok(())
    }

    /// Look up a segment
    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// Look up a segment, failing for unknown indices
    pub fn require(&self, index: usize) -> Result<&Segment, PlaybackError> {
        self.get(index).ok_or(PlaybackError::UnknownSegment(index))
    }

    /// Number of loaded segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether no segments are loaded
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// All segments in load order
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    /// Total length of all segments in seconds
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Drop every segment (session teardown)
    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// Hand a segment to the device, starting `start_offset` seconds from now
    ///
    /// An offset of zero means as soon as possible.
    pub fn schedule<D: OutputDevice>(
        &self,
        device: &mut D,
        index: usize,
        start_offset: f64,
    ) -> Result<ScheduledSegment, PlaybackError> {
        let segment = self.require(index)?;
        let start_at = device.now() + start_offset.max(0.0);
        let voice = device.schedule(segment.audio(), start_at)?;
        Ok(ScheduledSegment {
            segment: index,
            voice,
            start_at,
        })
    }

    /// Stop a scheduled segment; safe to call more than once
    pub fn cancel<D: OutputDevice>(&self, device: &mut D, handle: &ScheduledSegment) {
        device.cancel(handle.voice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::OfflineDevice;

    fn segment(index: usize, duration: f64, offset: f64) -> Segment {
        let mut audio = AudioBuffer::new(1, 10);
        audio.append_interleaved(&vec![0.0; (duration * 10.0) as usize]);
        Segment::new(index, duration, offset, audio)
    }

    #[test]
    fn test_add_in_order() {
        let mut store = SegmentStore::new();
        store.add(segment(0, 1.0, 0.0)).unwrap();
        store.add(segment(1, 2.0, 1.0)).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.total_duration(), 3.0);
        assert_eq!(store.get(1).unwrap().end_offset(), 3.0);
    }

    #[test]
    fn test_add_out_of_order_rejected() {
        let mut store = SegmentStore::new();
        let err = store.add(segment(1, 1.0, 0.0)).unwrap_err();
        assert!(matches!(err, LoadError::OutOfOrder { expected: 0, got: 1 }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_schedule_relative_to_clock() {
        let mut store = SegmentStore::new();
        store.add(segment(0, 1.0, 0.0)).unwrap();
        let mut device = OfflineDevice::manual();
        device.set_time(5.0);

        let handle = store.schedule(&mut device, 0, 0.25).unwrap();
        assert_eq!(handle.start_at, 5.25);
        assert_eq!(device.voices()[0].at, 5.25);

        store.cancel(&mut device, &handle);
        store.cancel(&mut device, &handle);
        assert!(device.voices()[0].cancelled);
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let mut store = SegmentStore::new();
        for duration in [f64::INFINITY, f64::NAN, -1.0] {
            let segment = Segment::new(0, duration, 0.0, AudioBuffer::new(1, 10));
            assert!(matches!(
                store.add(segment),
                Err(LoadError::InvalidDuration { index: 0, .. })
            ));
        }
        assert!(store.is_empty());
        store.add(segment(0, 0.0, 0.0)).unwrap();
    }

    #[test]
    fn test_handles_compare_by_value() {
        let mut store = SegmentStore::new();
        store.add(segment(0, 1.0, 0.0)).unwrap();
        let mut device = OfflineDevice::manual();
        let first = store.schedule(&mut device, 0, 0.5).unwrap();
        let copy = first;
        let second = store.schedule(&mut device, 0, 0.5).unwrap();
        assert_eq!(first, copy);
        assert_ne!(first, second);
    }

    #[test]
    fn test_schedule_unknown_segment() {
        let store = SegmentStore::new();
        let mut device = OfflineDevice::manual();
        assert_eq!(
            store.schedule(&mut device, 3, 0.0).unwrap_err(),
            PlaybackError::UnknownSegment(3)
        );
    }
}
