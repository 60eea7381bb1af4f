// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Decoder adapter protocol.
//!
//! A decode session is a message sequence:
//!
//! 1. `StreamCount(n)`
//! 2. `n` times: `SegmentHeader { chunk_count, .. }` followed by exactly
//!    `chunk_count` `SegmentChunk` messages of interleaved samples
//!
//! The session completes once `n` segments have received all of their
//! chunks. Sources run on a worker thread and only communicate through
//! messages.

use std::thread;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, warn};

use super::{is_valid_duration, Segment};
use crate::audio::AudioBuffer;
use crate::error::LoadError;

/// A message from the decode worker
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderMessage {
    /// Total number of segments in this session
    StreamCount(usize),
    /// Start of a segment
    SegmentHeader {
        chunk_count: usize,
        channels: usize,
        sample_rate: u32,
        duration: f64,
    },
    /// Interleaved samples belonging to the current segment
    SegmentChunk(Vec<f32>),
    /// Decoding aborted
    Failed(String),
}

#[derive(Debug)]
enum AssemblerState {
    AwaitingCount,
    AwaitingHeader,
    ReceivingChunks {
        remaining: usize,
        duration: f64,
        audio: AudioBuffer,
    },
    Done,
}

/// Where a session stands after a message
#[derive(Debug)]
pub enum SessionProgress {
    /// More messages are needed for the current segment
    Pending,
    /// A segment finished; `finished` is set when it was the last one
    Segment { segment: Segment, finished: bool },
    /// The session finished without producing a segment
    Finished,
}

/// Turns a decoder message stream back into segments
#[derive(Debug)]
pub struct SessionAssembler {
    state: AssemblerState,
    expected: usize,
    completed: usize,
    next_offset: f64,
}

impl SessionAssembler {
    /// Create an assembler waiting for the stream count
    pub fn new() -> Self {
        Self {
            state: AssemblerState::AwaitingCount,
            expected: 0,
            completed: 0,
            next_offset: 0.0,
        }
    }

    /// Whether every announced segment has arrived
    pub fn is_finished(&self) -> bool {
        matches!(self.state, AssemblerState::Done)
    }

    /// Number of segments announced by the worker
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Number of segments completed so far
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Feed the next message
    pub fn feed(&mut self, message: DecoderMessage) -> Result<SessionProgress, LoadError> {
        if let DecoderMessage::Failed(reason) = message {
            self.state = AssemblerState::Done;
            return Err(LoadError::Decode(reason));
        }

        let state = std::mem::replace(&mut self.state, AssemblerState::Done);
        match (state, message) {
            (AssemblerState::AwaitingCount, DecoderMessage::StreamCount(n)) => {
                debug!(segments = n, "Decoder announced segment count");
                self.expected = n;
                if n == 0 {
                    return Ok(SessionProgress::Finished);
                }
                self.state = AssemblerState::AwaitingHeader;
                Ok(SessionProgress::Pending)
            }
            (
                AssemblerState::AwaitingHeader,
                DecoderMessage::SegmentHeader {
                    chunk_count,
                    channels,
                    sample_rate,
                    duration,
                },
            ) => {
                if !is_valid_duration(duration) {
                    return Err(LoadError::Protocol(format!(
                        "segment {} header has invalid duration {}",
                        self.completed, duration
                    )));
                }
                let audio = AudioBuffer::new(channels, sample_rate);
                if chunk_count == 0 {
                    return Ok(self.complete(duration, audio));
                }
                self.state = AssemblerState::ReceivingChunks {
                    remaining: chunk_count,
                    duration,
                    audio,
                };
                Ok(SessionProgress::Pending)
            }
            (
                AssemblerState::ReceivingChunks {
                    remaining,
                    duration,
                    mut audio,
                },
                DecoderMessage::SegmentChunk(samples),
            ) => {
                audio.append_interleaved(&samples);
                if remaining > 1 {
                    self.state = AssemblerState::ReceivingChunks {
                        remaining: remaining - 1,
                        duration,
                        audio,
                    };
                    return Ok(SessionProgress::Pending);
                }
                Ok(self.complete(duration, audio))
            }
            (state, message) => {
                let err = LoadError::Protocol(format!(
                    "unexpected {} while {}",
                    message_name(&message),
                    state_name(&state)
                ));
                Err(err)
            }
        }
    }

    fn complete(&mut self, duration: f64, audio: AudioBuffer) -> SessionProgress {
        let segment = Segment::new(self.completed, duration, self.next_offset, audio);
        self.next_offset += duration;
        self.completed += 1;
        let finished = self.completed >= self.expected;
        self.state = if finished {
            AssemblerState::Done
        } else {
            AssemblerState::AwaitingHeader
        };
        SessionProgress::Segment { segment, finished }
    }
}

impl Default for SessionAssembler {
    fn default() -> Self {
        Self::new()
    }
}

fn message_name(message: &DecoderMessage) -> &'static str {
    match message {
        DecoderMessage::StreamCount(_) => "stream count",
        DecoderMessage::SegmentHeader { .. } => "segment header",
        DecoderMessage::SegmentChunk(_) => "segment chunk",
        DecoderMessage::Failed(_) => "failure",
    }
}

fn state_name(state: &AssemblerState) -> &'static str {
    match state {
        AssemblerState::AwaitingCount => "awaiting stream count",
        AssemblerState::AwaitingHeader => "awaiting segment header",
        AssemblerState::ReceivingChunks { .. } => "receiving chunks",
        AssemblerState::Done => "done",
    }
}

/// Something that can be decoded into segment messages
pub trait SegmentSource: Send {
    /// Human readable name for logs
    fn name(&self) -> String;

    /// Emit the full message sequence, splitting segments into chunks of at
    /// most `chunk_frames` frames
    fn emit(
        &mut self,
        chunk_frames: usize,
        out: &mut dyn FnMut(DecoderMessage),
    ) -> Result<(), LoadError>;
}

/// Emit one segment's header and chunks from interleaved samples
pub(crate) fn emit_segment(
    out: &mut dyn FnMut(DecoderMessage),
    channels: usize,
    sample_rate: u32,
    samples: &[f32],
    chunk_frames: usize,
) {
    let chunk_len = chunk_frames.max(1) * channels.max(1);
    let frames = samples.len() / channels.max(1);
    let duration = if sample_rate == 0 {
        0.0
    } else {
        frames as f64 / sample_rate as f64
    };
    let chunks: Vec<&[f32]> = samples.chunks(chunk_len).collect();
    out(DecoderMessage::SegmentHeader {
        chunk_count: chunks.len(),
        channels,
        sample_rate,
        duration,
    });
    for chunk in chunks {
        out(DecoderMessage::SegmentChunk(chunk.to_vec()));
    }
}

/// Pre-rendered interleaved segments held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    segments: Vec<(usize, u32, Vec<f32>)>,
}

impl MemorySource {
    /// Create an empty source
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            segments: Vec::new(),
        }
    }

    /// Builder: add a segment of interleaved samples
    pub fn with_segment(mut self, channels: usize, sample_rate: u32, samples: Vec<f32>) -> Self {
        self.segments.push((channels, sample_rate, samples));
        self
    }

    /// Builder: add a silent segment of the given length
    pub fn with_silence(self, channels: usize, sample_rate: u32, secs: f64) -> Self {
        let frames = (secs * sample_rate as f64).round() as usize;
        self.with_segment(channels, sample_rate, vec![0.0; frames * channels])
    }
}

impl SegmentSource for MemorySource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn emit(
        &mut self,
        chunk_frames: usize,
        out: &mut dyn FnMut(DecoderMessage),
    ) -> Result<(), LoadError> {
        out(DecoderMessage::StreamCount(self.segments.len()));
        for (channels, sample_rate, samples) in &self.segments {
            emit_segment(out, *channels, *sample_rate, samples, chunk_frames);
        }
        Ok(())
    }
}

/// Runs a source on its own thread
pub struct DecodeWorker;

impl DecodeWorker {
    /// Start decoding; messages arrive on the returned receiver
    ///
    /// A source error is delivered as a final `Failed` message.
    pub fn spawn(
        mut source: Box<dyn SegmentSource>,
        chunk_frames: usize,
    ) -> Result<UnboundedReceiver<DecoderMessage>, LoadError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let name = source.name();
        thread::Builder::new()
            .name("slbgm-decode".to_string())
            .spawn(move || {
                debug!(source = %name, "Decode worker started");
                let mut send = |message: DecoderMessage| {
                    // Receiver gone means the load was abandoned
                    let _ = tx.send(message);
                };
                if let Err(e) = source.emit(chunk_frames, &mut send) {
                    warn!(source = %name, "Decode failed: {}", e);
                    send(DecoderMessage::Failed(e.to_string()));
                }
            })?;
        Ok(rx)
    }
}
