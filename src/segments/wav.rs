// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Segment source reading a directory of WAV files.
//!
//! Every `.wav` file is one segment; files are ordered by name.

use std::fs;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader};

use super::decoder::{emit_segment, DecoderMessage, SegmentSource};
use crate::error::LoadError;

/// Reads `*.wav` files from a directory as consecutive segments
#[derive(Debug, Clone)]
pub struct WavDirectorySource {
    dir: PathBuf,
    files: Vec<PathBuf>,
}

impl WavDirectorySource {
    /// Scan a directory for WAV files
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, LoadError> {
        let dir = dir.as_ref().to_path_buf();
        let mut files: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("wav"))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(Self { dir, files })
    }

    /// Directory being read
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Segment files in load order
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

fn read_samples(path: &Path) -> Result<(usize, u32, Vec<f32>), LoadError> {
    let reader = WavReader::open(path)
        .map_err(|e| LoadError::Decode(format!("{}: {}", path.display(), e)))?;
    let spec = reader.spec();
    let samples: Result<Vec<f32>, hound::Error> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect(),
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect()
        }
    };
    let samples = samples.map_err(|e| LoadError::Decode(format!("{}: {}", path.display(), e)))?;
    Ok((spec.channels as usize, spec.sample_rate, samples))
}

impl SegmentSource for WavDirectorySource {
    fn name(&self) -> String {
        self.dir.display().to_string()
    }

    fn emit(
        &mut self,
        chunk_frames: usize,
        out: &mut dyn FnMut(DecoderMessage),
    ) -> Result<(), LoadError> {
        out(DecoderMessage::StreamCount(self.files.len()));
        for path in &self.files {
            let (channels, sample_rate, samples) = read_samples(path)?;
            emit_segment(out, channels, sample_rate, &samples, chunk_frames);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use tempfile::tempdir;

    fn write_wav(path: &Path, frames: usize) {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            let value = if i % 2 == 0 { 16384i16 } else { -16384i16 };
            writer.write_sample(value).unwrap();
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_files_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        write_wav(&dir.path().join("02.wav"), 10);
        write_wav(&dir.path().join("01.wav"), 10);
        fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let source = WavDirectorySource::open(dir.path()).unwrap();
        let names: Vec<_> = source
            .files()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["01.wav", "02.wav"]);
    }

    #[test]
    fn test_emit_normalises_int_samples() {
        let dir = tempdir().unwrap();
        write_wav(&dir.path().join("a.wav"), 8000);

        let mut source = WavDirectorySource::open(dir.path()).unwrap();
        let mut messages = Vec::new();
        source.emit(4096, &mut |m| messages.push(m)).unwrap();

        assert_eq!(messages[0], DecoderMessage::StreamCount(1));
        match &messages[1] {
            DecoderMessage::SegmentHeader {
                chunk_count,
                channels,
                duration,
                ..
            } => {
                assert_eq!(*chunk_count, 2);
                assert_eq!(*channels, 2);
                assert!((duration - 1.0).abs() < 1e-9);
            }
            other => panic!("expected header, got {:?}", other),
        }
        match &messages[2] {
            DecoderMessage::SegmentChunk(samples) => assert_eq!(samples[0], 0.5),
            other => panic!("expected chunk, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_directory() {
        assert!(matches!(
            WavDirectorySource::open("/definitely/not/here"),
            Err(LoadError::Io(_))
        ));
    }
}
