use pcm_stream_player::audio::{AudioError, OutputClock, VirtualOutput};
use pcm_stream_player::config::{PlayerConfig, Settings};
use pcm_stream_player::init_app_dirs;
use pcm_stream_player::source::load_clip;
use pcm_stream_player::ui::{Cli, LogFormat, OutputDevice};
use pcm_stream_player::{PlaybackState, PlayerEvent, StreamingPlayer};
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_TARGET: &str = "pcm_stream_player::main";

/// Period of the real-time driver behind `--device null`.
const NULL_DEVICE_PERIOD: Duration = Duration::from_millis(10);

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_writer(std::io::stderr)).init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
    }
}

fn open_player(
    config: PlayerConfig,
    device: OutputDevice,
    alsa_device: &str,
) -> Result<(StreamingPlayer, Option<JoinHandle<()>>), AudioError> {
    match device {
        OutputDevice::Null => {
            let mut driver = None;
            let player = StreamingPlayer::with_output(config, |ctx| {
                let output = VirtualOutput::new(ctx).without_capture();
                driver = Some(output.drive_realtime(NULL_DEVICE_PERIOD));
                Ok(Box::new(output) as Box<dyn OutputClock>)
            })?;
            Ok((player, driver))
        }
        #[cfg(feature = "alsa-output")]
        OutputDevice::Alsa => Ok((StreamingPlayer::open_alsa(config, alsa_device)?, None)),
        #[cfg(not(feature = "alsa-output"))]
        OutputDevice::Alsa => Err(AudioError::InitializationError(format!(
            "ALSA device '{}' requested but ALSA output support is not compiled in; use --device null",
            alsa_device
        ))),
    }
}

/// Waits until the player reports `Finished`.
async fn wait_for_finish(player: &StreamingPlayer, events: &mut broadcast::Receiver<PlayerEvent>) -> Result<(), AudioError> {
    loop {
        match events.recv().await {
            Ok(PlayerEvent::StateChanged(PlaybackState::Finished)) => return Ok(()),
            Ok(event) => debug!(target: LOG_TARGET, "Player event: {:?}", event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(target: LOG_TARGET, "Missed {} player events; polling status.", skipped);
                if player.status().await?.state == PlaybackState::Finished {
                    return Ok(());
                }
            }
            Err(broadcast::error::RecvError::Closed) => {
                return Err(AudioError::InvalidState("player stopped before finishing".to_string()));
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Parse command-line arguments and initialize CLI
    let cli = Cli::new();
    let args = &cli.args;
    init_tracing(args.log_format);

    init_app_dirs()?;

    let config_path = match &args.config {
        Some(path) => Path::new(path).to_path_buf(),
        None => Settings::default_path(),
    };
    let mut settings = Settings::load(&config_path)?;
    args.apply_to(&mut settings);

    let raw = args.raw || args.input == "-";
    let clip = load_clip(&args.input, raw, settings.player.channels, settings.player.sample_rate).await?;
    // Decoded files dictate the stream format; there is no resampling.
    settings.player.channels = clip.channels;
    settings.player.sample_rate = clip.sample_rate;
    settings.validate()?;

    let encoding = settings.player.chunk_encoding;
    cli.display_clip(&clip, encoding);

    let (player, driver) = open_player(settings.player, args.device, &settings.alsa_device)?;
    player.set_volume(settings.volume)?;
    let mut events = player.subscribe_events();

    let chunks = clip.chunks(args.chunk_ms, encoding);
    let frames_per_chunk = clip.frames_per_chunk(args.chunk_ms) as u64;
    let chunk_period = Duration::from_millis(args.chunk_ms);
    let pb = cli.feed_progress(clip.frames())?;

    let playback = async {
        for chunk in &chunks {
            player.feed(chunk).await?;
            pb.inc(frames_per_chunk);
            if args.realtime {
                tokio::time::sleep(chunk_period).await;
            }
        }
        pb.set_message("playing");
        if player.set_done().await? != PlaybackState::Finished {
            wait_for_finish(&player, &mut events).await?;
        }
        Ok::<(), AudioError>(())
    };

    let outcome = tokio::select! {
        result = playback => result,
        _ = tokio::signal::ctrl_c() => {
            info!(target: LOG_TARGET, "Interrupted; stopping playback.");
            Ok(())
        }
    };
    pb.finish_and_clear();

    if let Err(e) = &outcome {
        error!(target: LOG_TARGET, "Playback failed: {}", e);
        cli.display_error(e);
    }

    let status = player.status().await?;
    let snapshot = player.snapshot()?;
    cli.display_summary(&status, &snapshot);

    if let Some(path) = &args.export {
        let frames = snapshot.frame_count();
        let bytes = snapshot.into_bytes();
        tokio::fs::write(path, &bytes).await?;
        info!(target: LOG_TARGET, "Exported {} frames to {}", frames, path.display());
        cli.display_export(path, bytes.len());
    }

    player.destroy().await?;
    if let Some(driver) = driver {
        driver.await?;
    }

    outcome.map_err(Into::into)
}
