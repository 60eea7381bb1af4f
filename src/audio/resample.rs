// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Sample rate conversion using rubato.
//!
//! Segments are converted to the device rate once, when they are loaded, so
//! a segment of `d` seconds always fills exactly `d * rate` device frames and
//! consecutive segments stay back to back.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

use super::AudioBuffer;
use crate::error::LoadError;

/// Frames a buffer of `frames` frames occupies after conversion
pub fn converted_frames(frames: usize, input_rate: u32, output_rate: u32) -> usize {
    if input_rate == 0 {
        return 0;
    }
    (frames as f64 * output_rate as f64 / input_rate as f64).round() as usize
}

/// Convert `buffer` to `output_rate`
///
/// Buffers already at the target rate are returned unchanged. The result is
/// aligned to the input (the resampler delay is removed) and has exactly
/// [`converted_frames`] frames.
pub fn resample(buffer: &AudioBuffer, output_rate: u32) -> Result<AudioBuffer, LoadError> {
    let input_rate = buffer.sample_rate();
    if input_rate == output_rate {
        return Ok(buffer.clone());
    }
    let channel_count = buffer.channel_count();
    let frames = buffer.frames();
    let target = converted_frames(frames, input_rate, output_rate);
    if frames == 0 || channel_count == 0 || input_rate == 0 || output_rate == 0 {
        return Ok(AudioBuffer::from_channels(
            vec![vec![0.0; target]; channel_count],
            output_rate,
        ));
    }

    debug!(
        "Resampling {} frames from {}Hz to {}Hz ({} channels)",
        frames, input_rate, output_rate, channel_count
    );

    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        frames,
        channel_count,
    )
    .map_err(|e| LoadError::Decode(format!("Failed to create resampler: {}", e)))?;

    let planar: Vec<Vec<f32>> = (0..channel_count)
        .map(|c| buffer.channel(c).to_vec())
        .collect();
    let mut output = resampler
        .process(&planar, None)
        .map_err(|e| LoadError::Decode(format!("Resampling failed: {}", e)))?;
    // Flush the tail still inside the filter
    let tail = resampler
        .process_partial(None::<&[Vec<f32>]>, None)
        .map_err(|e| LoadError::Decode(format!("Resampling failed: {}", e)))?;

    let delay = resampler.output_delay();
    for (channel, rest) in output.iter_mut().zip(tail) {
        channel.extend(rest);
        channel.drain(..delay.min(channel.len()));
        channel.resize(target, 0.0);
    }

    Ok(AudioBuffer::from_channels(output, output_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(channels: usize, rate: u32, frames: usize, value: f32) -> AudioBuffer {
        let mut buffer = AudioBuffer::new(channels, rate);
        buffer.append_interleaved(&vec![value; frames * channels]);
        buffer
    }

    #[test]
    fn test_same_rate_is_unchanged() {
        let buffer = constant(2, 48000, 64, 0.25);
        assert_eq!(resample(&buffer, 48000).unwrap(), buffer);
    }

    #[test]
    fn test_converted_length_matches_duration() {
        let buffer = constant(2, 44100, 4410, 0.5);
        let converted = resample(&buffer, 48000).unwrap();
        assert_eq!(converted.sample_rate(), 48000);
        assert_eq!(converted.channel_count(), 2);
        assert_eq!(converted.frames(), 4800);
        assert!((converted.duration_secs() - buffer.duration_secs()).abs() < 1e-9);
    }

    #[test]
    fn test_signal_survives_conversion() {
        let buffer = constant(1, 1000, 100, 0.5);
        let converted = resample(&buffer, 2000).unwrap();
        assert_eq!(converted.frames(), 200);
        assert!((converted.channel(0)[100] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = AudioBuffer::new(2, 22050);
        let converted = resample(&buffer, 44100).unwrap();
        assert_eq!(converted.frames(), 0);
        assert_eq!(converted.sample_rate(), 44100);
        assert_eq!(converted.channel_count(), 2);
    }
}
