//! Integration tests for container export
//!
//! These tests check the produced WAV bytes with an independent parser.

use crate::test_utils::sine;
use pcm_stream_player::audio::{ContainerEncoder, ContainerFormat, SampleBuffer};
use std::error::Error;
use std::io::Cursor;
use tempfile::tempdir;

#[cfg(test)]
mod container_integration_tests {
    use super::*;

    #[test]
    fn test_stereo_export_parses() -> Result<(), Box<dyn Error>> {
        let format = ContainerFormat::pcm16(2, 44100);
        let encoder = ContainerEncoder::new(format);
        let left = sine(441, 44100, 1000.0, 0.8);
        let interleaved: Vec<i16> = left.iter().flat_map(|&s| [s, s.saturating_neg()]).collect();

        let snapshot = encoder.refresh(&interleaved)?;
        let reader = hound::WavReader::new(snapshot.reader())?;
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);
        assert_eq!(reader.duration(), 441);

        let decoded: Vec<i16> = reader.into_samples::<i16>().collect::<Result<_, _>>()?;
        assert_eq!(decoded, interleaved);
        Ok(())
    }

    #[test]
    fn test_float_export_parses() -> Result<(), Box<dyn Error>> {
        let format = ContainerFormat {
            channels: 1,
            sample_rate: 16000,
            is_float: true,
        };
        let samples = vec![0i16, 16384, -16384, -32768];
        let snapshot = ContainerEncoder::new(format).refresh(&samples)?;

        let reader = hound::WavReader::new(snapshot.reader())?;
        assert_eq!(reader.spec().sample_format, hound::SampleFormat::Float);
        assert_eq!(reader.spec().bits_per_sample, 32);
        let decoded: Vec<f32> = reader.into_samples::<f32>().collect::<Result<_, _>>()?;
        assert_eq!(decoded, vec![0.0, 0.5, -0.5, -1.0]);
        Ok(())
    }

    #[test]
    fn test_each_snapshot_is_a_complete_file() -> Result<(), Box<dyn Error>> {
        let encoder = ContainerEncoder::new(ContainerFormat::pcm16(1, 16000));
        let mut buffer = SampleBuffer::new();
        let audio = sine(4800, 16000, 440.0, 0.5);

        for (n, chunk) in audio.chunks(1600).enumerate() {
            buffer.append(chunk);
            let snapshot = encoder.refresh(buffer.snapshot_history())?;
            let reader = hound::WavReader::new(Cursor::new(snapshot.bytes().clone()))?;
            assert_eq!(reader.duration() as usize, 1600 * (n + 1));
        }
        Ok(())
    }

    #[test]
    fn test_export_to_disk() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("export.wav");
        let audio = sine(1600, 16000, 440.0, 0.5);

        let snapshot = ContainerEncoder::new(ContainerFormat::pcm16(1, 16000)).refresh(&audio)?;
        std::fs::write(&path, snapshot.into_bytes())?;

        let mut reader = hound::WavReader::open(&path)?;
        let decoded: Vec<i16> = reader.samples::<i16>().collect::<Result<_, _>>()?;
        assert_eq!(decoded, audio);
        Ok(())
    }
}
