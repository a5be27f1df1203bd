use crate::audio::AudioError;
use crate::source::PcmClip;
use std::fs::File;
use std::io;
use std::path::Path;
use symphonia::core::audio::{SampleBuffer as InterleavedBuffer, SignalSpec};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, trace, warn};

const LOG_TARGET: &str = "pcm_stream_player::source::symphonia_file";

/// Decodes the first playable track of a media file to interleaved s16.
///
/// Blocking; call it from `spawn_blocking`. Undecodable packets are skipped,
/// a mid-stream format change is an `UnsupportedFormat` error.
pub fn decode_media_file(path: &Path) -> Result<PcmClip, AudioError> {
    debug!(target: LOG_TARGET, "Probing {}", path.display());
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::UnsupportedFormat("No suitable audio track found".to_string()))?
        .clone();
    debug!(target: LOG_TARGET, "Found audio track: ID={}, Codec={:?}", track.id, track.codec_params.codec);

    let mut decoder = symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut spec: Option<SignalSpec> = None;
    let mut samples: Vec<i16> = Vec::new();
    let mut skipped = 0usize;

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                trace!(target: LOG_TARGET, "End of stream reached.");
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                warn!(target: LOG_TARGET, "Stream discontinuity (reset required); stopping at {} samples.", samples.len());
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track.id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(err)) => {
                warn!(target: LOG_TARGET, "Symphonia decode error (skipping packet): {}", err);
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let packet_spec = *decoded.spec();
        match spec {
            None => spec = Some(packet_spec),
            Some(expected) if expected != packet_spec => {
                return Err(AudioError::UnsupportedFormat(format!(
                    "audio format changed mid-stream: {:?} -> {:?}",
                    expected, packet_spec
                )));
            }
            Some(_) => {}
        }

        let mut buf = InterleavedBuffer::<i16>::new(decoded.capacity() as u64, packet_spec);
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    let spec = spec
        .or_else(|| {
            let params = &track.codec_params;
            Some(SignalSpec::new(params.sample_rate?, params.channels?))
        })
        .ok_or_else(|| AudioError::UnsupportedFormat("track declares no sample rate or channel layout".to_string()))?;

    let channels = u16::try_from(spec.channels.count())
        .map_err(|_| AudioError::UnsupportedFormat(format!("{} channels", spec.channels.count())))?;
    if skipped > 0 {
        warn!(target: LOG_TARGET, "Skipped {} undecodable packets.", skipped);
    }
    info!(
        target: LOG_TARGET,
        "Decoded {}: {} ch @ {} Hz, {} samples",
        path.display(),
        channels,
        spec.rate,
        samples.len()
    );

    Ok(PcmClip {
        channels,
        sample_rate: spec.rate,
        samples,
    })
}
