// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Segment source reading a chained Ogg Vorbis file.
//!
//! Each logical stream in the chain is one segment. A new segment begins
//! whenever the stream serial number changes.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use lewton::inside_ogg::OggStreamReader;
use tracing::debug;

use super::decoder::{emit_segment, DecoderMessage, SegmentSource};
use crate::error::LoadError;

/// One fully decoded logical stream
#[derive(Debug, Clone, PartialEq)]
struct DecodedStream {
    channels: usize,
    sample_rate: u32,
    samples: Vec<f32>,
}

/// Groups decoded packets into streams by serial number
#[derive(Debug, Default)]
struct StreamSplitter {
    serial: Option<u32>,
    streams: Vec<DecodedStream>,
}

impl StreamSplitter {
    fn push(&mut self, serial: u32, channels: usize, sample_rate: u32, packet: &[i16]) {
        if self.serial != Some(serial) {
            self.serial = Some(serial);
            self.streams.push(DecodedStream {
                channels,
                sample_rate,
                samples: Vec::new(),
            });
        }
        if let Some(stream) = self.streams.last_mut() {
            stream
                .samples
                .extend(packet.iter().map(|&s| s as f32 / 32768.0));
        }
    }

    fn finish(self) -> Vec<DecodedStream> {
        self.streams
    }
}

/// Reads every logical stream of a chained `.ogg` file as consecutive segments
#[derive(Debug, Clone)]
pub struct OggFileSource {
    path: PathBuf,
}

impl OggFileSource {
    /// Check that the file exists; decoding happens in [`SegmentSource::emit`]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref().to_path_buf();
        fs::metadata(&path)?;
        Ok(Self { path })
    }

    /// File being read
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decode(&self) -> Result<Vec<DecodedStream>, LoadError> {
        let decode_err = |e: lewton::VorbisError| {
            LoadError::Decode(format!("{}: {}", self.path.display(), e))
        };
        let file = File::open(&self.path)?;
        let mut reader = OggStreamReader::new(BufReader::new(file)).map_err(decode_err)?;

        let mut splitter = StreamSplitter::default();
        // Header of the first stream, so an empty chain still yields a segment
        splitter.push(
            reader.stream_serial(),
            reader.ident_hdr.audio_channels as usize,
            reader.ident_hdr.audio_sample_rate,
            &[],
        );
        while let Some(packet) = reader.read_dec_packet_itl().map_err(decode_err)? {
            splitter.push(
                reader.stream_serial(),
                reader.ident_hdr.audio_channels as usize,
                reader.ident_hdr.audio_sample_rate,
                &packet,
            );
        }
        Ok(splitter.finish())
    }
}

impl SegmentSource for OggFileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn emit(
        &mut self,
        chunk_frames: usize,
        out: &mut dyn FnMut(DecoderMessage),
    ) -> Result<(), LoadError> {
        let streams = self.decode()?;
        debug!("{} holds {} streams", self.path.display(), streams.len());
        out(DecoderMessage::StreamCount(streams.len()));
        for stream in &streams {
            emit_segment(
                out,
                stream.channels,
                stream.sample_rate,
                &stream.samples,
                chunk_frames,
            );
        }
        Ok(())
    }
}
