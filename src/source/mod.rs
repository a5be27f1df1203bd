//! Chunk producers: whole-clip loaders for raw PCM and compressed media,
//! split into fixed-duration transport chunks.

pub mod pcm_file;
pub mod symphonia_file;

use crate::audio::chunk_decoder::{encode_base64, encode_s16le};
use crate::audio::{AudioError, ChunkEncoding};
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub use pcm_file::{read_raw, read_raw_file};
pub use symphonia_file::decode_media_file;

const LOG_TARGET: &str = "pcm_stream_player::source";

/// A fully loaded stretch of interleaved s16 audio.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmClip {
    pub channels: u16,
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

impl PcmClip {
    pub fn frames(&self) -> u64 {
        (self.samples.len() / self.channels.max(1) as usize) as u64
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate.max(1) as f64)
    }

    /// Frames carried by one chunk of `chunk_ms` milliseconds (at least one).
    pub fn frames_per_chunk(&self, chunk_ms: u64) -> usize {
        ((self.sample_rate as u64 * chunk_ms / 1000) as usize).max(1)
    }

    /// Splits the clip into frame-aligned chunks encoded for `encoding`.
    /// The last chunk may be shorter.
    pub fn chunks(&self, chunk_ms: u64, encoding: ChunkEncoding) -> Vec<Bytes> {
        let samples_per_chunk = self.frames_per_chunk(chunk_ms) * self.channels.max(1) as usize;
        self.samples
            .chunks(samples_per_chunk)
            .map(|chunk| {
                let pcm = encode_s16le(chunk);
                match encoding {
                    ChunkEncoding::Raw => Bytes::from(pcm),
                    ChunkEncoding::Base64 => Bytes::from(encode_base64(&pcm)),
                }
            })
            .collect()
    }
}

/// Loads `input` (a path, or `-` for stdin).
///
/// Raw input is taken as s16le with the given layout; anything else is
/// probed and decoded, keeping the file's own rate and channel count.
pub async fn load_clip(input: &str, raw: bool, channels: u16, sample_rate: u32) -> Result<PcmClip, AudioError> {
    let clip = if input == "-" {
        let stdin = std::io::stdin();
        tokio::task::spawn_blocking(move || read_raw(stdin.lock(), channels, sample_rate)).await??
    } else if raw {
        read_raw_file(Path::new(input), channels, sample_rate)?
    } else {
        let path = Path::new(input).to_path_buf();
        tokio::task::spawn_blocking(move || decode_media_file(&path)).await??
    };
    info!(
        target: LOG_TARGET,
        "Loaded {}: {} ch @ {} Hz, {} frames ({:.2}s)",
        input,
        clip.channels,
        clip.sample_rate,
        clip.frames(),
        clip.duration().as_secs_f64()
    );
    Ok(clip)
}
