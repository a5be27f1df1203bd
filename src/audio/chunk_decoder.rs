use crate::audio::error::AudioError;
use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};
use tracing::trace;

const LOG_TARGET: &str = "pcm_stream_player::audio::chunk_decoder";

/// Width of one PCM sample on the wire (signed 16-bit little-endian).
pub const BYTES_PER_SAMPLE: usize = 2;

/// How chunk payloads are wrapped by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChunkEncoding {
    /// Payload bytes are the PCM samples themselves.
    #[default]
    Raw,
    /// Payload bytes are standard-alphabet base64 text of the PCM samples.
    Base64,
}

/// Turns transport chunks into interleaved s16 samples.
///
/// Pure transform: a rejected chunk leaves no trace anywhere.
#[derive(Debug, Clone, Copy)]
pub struct ChunkDecoder {
    encoding: ChunkEncoding,
    channels: usize,
}

impl ChunkDecoder {
    pub fn new(encoding: ChunkEncoding, channels: u16) -> Self {
        Self {
            encoding,
            channels: channels.max(1) as usize,
        }
    }

    pub fn encoding(&self) -> ChunkEncoding {
        self.encoding
    }

    /// Decodes one chunk. Empty payloads decode to an empty sequence.
    pub fn decode(&self, chunk: &[u8]) -> Result<Vec<i16>, AudioError> {
        let samples = match self.encoding {
            ChunkEncoding::Raw => decode_s16le(chunk)?,
            ChunkEncoding::Base64 => {
                let raw = general_purpose::STANDARD.decode(trim_ascii(chunk))?;
                decode_s16le(&raw)?
            }
        };

        if samples.len() % self.channels != 0 {
            return Err(AudioError::DecodeError(format!(
                "chunk holds {} samples, not a whole number of {}-channel frames",
                samples.len(),
                self.channels
            )));
        }

        trace!(target: LOG_TARGET, "Decoded chunk of {} bytes into {} samples", chunk.len(), samples.len());
        Ok(samples)
    }
}

/// Decodes little-endian signed 16-bit PCM. Rejects a trailing partial sample.
pub fn decode_s16le(bytes: &[u8]) -> Result<Vec<i16>, AudioError> {
    if bytes.len() % BYTES_PER_SAMPLE != 0 {
        return Err(AudioError::DecodeError(format!(
            "payload length {} is not a multiple of the {}-byte sample width",
            bytes.len(),
            BYTES_PER_SAMPLE
        )));
    }
    Ok(bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Encodes samples as little-endian signed 16-bit PCM.
pub fn encode_s16le(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// Wraps raw PCM bytes the way a base64 transport would deliver them.
pub fn encode_base64(pcm: &[u8]) -> String {
    general_purpose::STANDARD.encode(pcm)
}

// Transports commonly append a newline to text frames.
fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &bytes[start..end]
}
