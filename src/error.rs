// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error types for the player.
//!
//! Each concern has its own enum; they fold into [`Error`] so callers at the
//! edges can use a single `Result`.

use thiserror::Error;

/// A transition definition row that was skipped during parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// Row could not be turned into a part
    #[error("Malformed definition row {line}: {reason}")]
    MalformedRow { line: usize, reason: String },
}

/// A single constraint that a part edit failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditViolation {
    /// Another part in the same track already uses this index
    PartIndexTaken(usize),
    /// First segment is not below the segment count
    FirstSegmentOutOfRange(usize),
    /// Last segment is not below the segment count
    LastSegmentOutOfRange(usize),
    /// First segment comes after the last segment
    FirstAfterLast { first: usize, last: usize },
}

impl std::fmt::Display for EditViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditViolation::PartIndexTaken(i) => write!(f, "part index {} is already in use", i),
            EditViolation::FirstSegmentOutOfRange(i) => {
                write!(f, "first segment {} is out of range", i)
            }
            EditViolation::LastSegmentOutOfRange(i) => {
                write!(f, "last segment {} is out of range", i)
            }
            EditViolation::FirstAfterLast { first, last } => {
                write!(f, "first segment {} is after last segment {}", first, last)
            }
        }
    }
}

/// Structural edit errors on the transition graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    /// Edit rejected; prior state unchanged
    #[error("Invalid part edit: {}", format_violations(.0))]
    InvalidPartEdit(Vec<EditViolation>),
    /// Track index does not exist
    #[error("No such track: {0}")]
    NoSuchTrack(usize),
    /// Part position does not exist within the track
    #[error("No such part {part} in track {track}")]
    NoSuchPart { track: usize, part: usize },
    /// Graph mutations require edit mode
    #[error("Edit mode is not active")]
    EditModeInactive,
}

fn format_violations(violations: &[EditViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Output device errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// No audio device available
    #[error("No audio device available")]
    NoDevice,
    /// Failed to initialize audio
    #[error("Audio initialization failed: {0}")]
    InitFailed(String),
    /// Failed to start audio stream
    #[error("Audio stream failed: {0}")]
    StreamFailed(String),
    /// Failed to acquire lock
    #[error("Failed to acquire audio lock")]
    LockFailed,
}

/// Playback scheduling errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// Playback is refused while the graph is being edited
    #[error("Edit mode is active")]
    EditModeActive,
    /// Segment index has not been loaded
    #[error("Unknown segment: {0}")]
    UnknownSegment(usize),
    /// Track index does not exist
    #[error("No such track: {0}")]
    NoSuchTrack(usize),
    /// Part index does not exist within the track
    #[error("No such part {part} in track {track}")]
    NoSuchPart { track: usize, part: usize },
    /// A part's successor does not resolve at playback time
    #[error("Part {part} of track {track} points at missing next part {next}")]
    DanglingNextPart { track: usize, part: usize, next: usize },
    /// A part with no segments reached the head of the queue
    #[error("Part {part} of track {track} has no segments")]
    EmptyPart { track: usize, part: usize },
    /// Device refused the buffer
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Segment loading errors
#[derive(Error, Debug)]
pub enum LoadError {
    /// Another load is still in progress
    #[error("A load is already in progress")]
    ConcurrentLoadRejected,
    /// Decoder messages arrived out of order
    #[error("Decoder protocol violation: {0}")]
    Protocol(String),
    /// Decoder reported a failure
    #[error("Decode failed: {0}")]
    Decode(String),
    /// Segment arrived with an unexpected index
    #[error("Segment {got} arrived out of order, expected {expected}")]
    OutOfOrder { expected: usize, got: usize },
    /// Segment length is negative or not a number
    #[error("Segment {index} has invalid duration {duration}")]
    InvalidDuration { index: usize, duration: f64 },
    /// Source could not be read
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-level error
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// Control thread has shut down
    #[error("Engine is not running")]
    EngineStopped,
}

/// Convenience Result type using the crate Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_messages_joined() {
        let err = EditError::InvalidPartEdit(vec![
            EditViolation::PartIndexTaken(2),
            EditViolation::FirstAfterLast { first: 5, last: 3 },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("part index 2"));
        assert!(msg.contains("first segment 5 is after last segment 3"));
    }

    #[test]
    fn test_device_error_converts_to_playback() {
        let err: PlaybackError = DeviceError::NoDevice.into();
        assert_eq!(err, PlaybackError::Device(DeviceError::NoDevice));
    }
}
