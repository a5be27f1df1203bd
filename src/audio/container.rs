//! RIFF/WAVE serialization of the accumulated sample history.

use crate::audio::error::AudioError;
use bytes::{BufMut, Bytes, BytesMut};
use std::io::Cursor;
use tracing::trace;

const LOG_TARGET: &str = "pcm_stream_player::audio::container";

/// Size of the canonical PCM WAVE header written in front of the sample data.
pub const WAV_HEADER_LEN: usize = 44;

/// Largest data chunk whose RIFF size (`data + 36`) still fits in 32 bits.
pub const MAX_DATA_BYTES: u32 = u32::MAX - 36;

const FORMAT_PCM: u16 = 1;
const FORMAT_IEEE_FLOAT: u16 = 3;

/// Format metadata written into the container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerFormat {
    pub channels: u16,
    pub sample_rate: u32,
    /// Store samples as 32-bit float (format tag 3) instead of 16-bit integers.
    pub is_float: bool,
}

impl ContainerFormat {
    pub fn pcm16(channels: u16, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
            is_float: false,
        }
    }

    pub fn bytes_per_sample(&self) -> u16 {
        if self.is_float {
            4
        } else {
            2
        }
    }

    pub fn audio_format(&self) -> u16 {
        if self.is_float {
            FORMAT_IEEE_FLOAT
        } else {
            FORMAT_PCM
        }
    }

    pub fn checked_block_align(&self) -> Option<u16> {
        self.channels.checked_mul(self.bytes_per_sample())
    }

    pub fn checked_byte_rate(&self) -> Option<u32> {
        self.sample_rate.checked_mul(self.checked_block_align()? as u32)
    }

    /// Saturates for formats rejected by [`ContainerFormat::validate`].
    pub fn block_align(&self) -> u16 {
        self.checked_block_align().unwrap_or(u16::MAX)
    }

    /// Saturates for formats rejected by [`ContainerFormat::validate`].
    pub fn byte_rate(&self) -> u32 {
        self.checked_byte_rate().unwrap_or(u32::MAX)
    }

    /// Checks that every header field can represent this format.
    pub fn validate(&self) -> Result<(), AudioError> {
        if self.channels == 0 || self.sample_rate == 0 {
            return Err(AudioError::InvalidArgument(format!(
                "container needs at least one channel and a non-zero rate, got {} ch @ {} Hz",
                self.channels, self.sample_rate
            )));
        }
        if self.checked_block_align().is_none() {
            return Err(AudioError::InvalidArgument(format!(
                "{} channels overflow the 16-bit block align field",
                self.channels
            )));
        }
        if self.checked_byte_rate().is_none() {
            return Err(AudioError::InvalidArgument(format!(
                "{} Hz x {} ch overflows the 32-bit byte rate field",
                self.sample_rate, self.channels
            )));
        }
        Ok(())
    }

    /// Largest whole-frame sample count a single container can declare.
    pub fn max_samples(&self) -> usize {
        let samples = (MAX_DATA_BYTES / self.bytes_per_sample() as u32) as usize;
        let channels = self.channels.max(1) as usize;
        samples - samples % channels
    }

    pub fn can_hold(&self, samples: usize) -> bool {
        samples <= self.max_samples()
    }
}

/// Writes the 44-byte header for `data_size` bytes of sample data.
/// `data_size` must not exceed [`MAX_DATA_BYTES`].
pub fn write_header(out: &mut BytesMut, format: &ContainerFormat, data_size: u32) {
    out.put_slice(b"RIFF");
    out.put_u32_le(data_size.saturating_add(36));
    out.put_slice(b"WAVE");
    out.put_slice(b"fmt ");
    out.put_u32_le(16);
    out.put_u16_le(format.audio_format());
    out.put_u16_le(format.channels);
    out.put_u32_le(format.sample_rate);
    out.put_u32_le(format.byte_rate());
    out.put_u16_le(format.block_align());
    out.put_u16_le(format.bytes_per_sample() * 8);
    out.put_slice(b"data");
    out.put_u32_le(data_size);
}

/// Serializes interleaved samples as a complete container (header + data).
///
/// Float containers carry each sample scaled by 1/32768. Fails when the data
/// would not fit the 32-bit size fields.
pub fn encode(samples: &[i16], format: &ContainerFormat) -> Result<Bytes, AudioError> {
    let data_size = u32::try_from(samples.len())
        .ok()
        .and_then(|n| n.checked_mul(format.bytes_per_sample() as u32))
        .filter(|size| *size <= MAX_DATA_BYTES)
        .ok_or_else(|| {
            AudioError::InvalidArgument(format!(
                "{} samples exceed the {} byte container limit",
                samples.len(),
                MAX_DATA_BYTES
            ))
        })?;
    let mut out = BytesMut::with_capacity(WAV_HEADER_LEN + data_size as usize);
    write_header(&mut out, format, data_size);
    if format.is_float {
        for &sample in samples {
            out.put_f32_le(sample as f32 / 32768.0);
        }
    } else {
        for &sample in samples {
            out.put_i16_le(sample);
        }
    }
    Ok(out.freeze())
}

/// An immutable, exportable view of all audio received up to one feed.
///
/// Cloning is cheap; the bytes are freed once the last clone is dropped.
#[derive(Debug, Clone)]
pub struct ContainerSnapshot {
    bytes: Bytes,
    format: ContainerFormat,
    frames: u64,
}

impl ContainerSnapshot {
    pub fn empty(format: ContainerFormat) -> Self {
        let mut header = BytesMut::with_capacity(WAV_HEADER_LEN);
        write_header(&mut header, &format, 0);
        Self {
            bytes: header.freeze(),
            format,
            frames: 0,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    /// Frames (samples per channel) declared by the header.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / self.format.sample_rate as f64
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Seekable reader over the snapshot, for random-access consumers.
    pub fn reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.bytes.clone())
    }
}

/// Regenerates the container from the full history after every feed.
#[derive(Debug, Clone)]
pub struct ContainerEncoder {
    format: ContainerFormat,
}

impl ContainerEncoder {
    pub fn new(format: ContainerFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    /// Builds a fresh snapshot of `history`. Cost is linear in the whole history.
    pub fn refresh(&self, history: &[i16]) -> Result<ContainerSnapshot, AudioError> {
        let bytes = encode(history, &self.format)?;
        let frames = (history.len() / self.format.channels.max(1) as usize) as u64;
        trace!(target: LOG_TARGET, "Container refreshed: {} frames, {} bytes", frames, bytes.len());
        Ok(ContainerSnapshot {
            bytes,
            format: self.format,
            frames,
        })
    }
}
