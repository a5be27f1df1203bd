use crate::audio::chunk_decoder::{decode_s16le, BYTES_PER_SAMPLE};
use crate::audio::AudioError;
use crate::source::PcmClip;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

const LOG_TARGET: &str = "pcm_stream_player::source::pcm_file";

/// Reads headerless s16le PCM until EOF.
///
/// A trailing partial frame is dropped with a warning.
pub fn read_raw<R: Read>(mut reader: R, channels: u16, sample_rate: u32) -> Result<PcmClip, AudioError> {
    if channels == 0 || sample_rate == 0 {
        return Err(AudioError::InvalidArgument(format!(
            "raw PCM needs a channel count and sample rate, got {} ch @ {} Hz",
            channels, sample_rate
        )));
    }

    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    let frame_bytes = channels as usize * BYTES_PER_SAMPLE;
    let usable = bytes.len() - bytes.len() % frame_bytes;
    if usable != bytes.len() {
        warn!(target: LOG_TARGET, "Dropping {} trailing bytes that do not form a whole frame.", bytes.len() - usable);
    }

    let samples = decode_s16le(&bytes[..usable])?;
    debug!(target: LOG_TARGET, "Read {} raw samples ({} bytes).", samples.len(), usable);
    Ok(PcmClip {
        channels,
        sample_rate,
        samples,
    })
}

pub fn read_raw_file(path: &Path, channels: u16, sample_rate: u32) -> Result<PcmClip, AudioError> {
    let file = File::open(path)?;
    read_raw(BufReader::new(file), channels, sample_rate)
}
