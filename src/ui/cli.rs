//! Command-line interface implementation

use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::error::Error;
use std::path::PathBuf;

use crate::audio::{ChunkEncoding, ContainerSnapshot};
use crate::config::Settings;
use crate::player::PlayerStatus;
use crate::source::PcmClip;

/// Where rendered audio goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputDevice {
    /// ALSA playback device
    Alsa,
    /// In-memory clock running in real time; nothing is audible
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Command-line arguments for pcm-stream-player
#[derive(Parser, Debug)]
#[command(author, version, about = "Gapless streaming PCM player", long_about = None)]
pub struct Args {
    /// Audio file to stream, or `-` for raw PCM on stdin
    #[arg(short, long)]
    pub input: String,

    /// Treat the input as headerless s16le PCM instead of probing it
    #[arg(long)]
    pub raw: bool,

    /// Channel count (raw input only; decoded files use their own)
    #[arg(short, long)]
    pub channels: Option<u16>,

    /// Sample rate in Hz (raw input only; decoded files use their own)
    #[arg(short = 'r', long)]
    pub sample_rate: Option<u32>,

    /// Scheduling tick period in milliseconds
    #[arg(long)]
    pub flush_interval_ms: Option<u64>,

    /// Duration of each fed chunk in milliseconds
    #[arg(long, default_value_t = 100)]
    pub chunk_ms: u64,

    /// Feed chunks at the pace they would arrive from a live producer
    #[arg(long)]
    pub realtime: bool,

    /// Wrap every chunk in base64 before feeding it
    #[arg(long)]
    pub base64: bool,

    /// Output sink
    #[arg(long, value_enum, default_value_t = OutputDevice::Alsa)]
    pub device: OutputDevice,

    /// ALSA device to use
    #[arg(short = 'd', long, env = "PCM_PLAYER_ALSA_DEVICE")]
    pub alsa_device: Option<String>,

    /// Playback gain (1.0 is unity)
    #[arg(short, long)]
    pub volume: Option<f32>,

    /// Write the final WAV container here once playback finishes
    #[arg(short, long)]
    pub export: Option<PathBuf>,

    /// Config file path
    #[arg(long, env = "PCM_PLAYER_CONFIG")]
    pub config: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, env = "PCM_PLAYER_LOG_FORMAT")]
    pub log_format: LogFormat,
}

impl Args {
    /// Lays command-line overrides over the loaded settings.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(channels) = self.channels {
            settings.player.channels = channels;
        }
        if let Some(rate) = self.sample_rate {
            settings.player.sample_rate = rate;
        }
        if let Some(interval) = self.flush_interval_ms {
            settings.player.flush_interval_ms = interval;
        }
        if self.base64 {
            settings.player.chunk_encoding = ChunkEncoding::Base64;
        }
        if let Some(device) = &self.alsa_device {
            settings.alsa_device = device.clone();
        }
        if let Some(volume) = self.volume {
            settings.volume = volume;
        }
    }
}

/// CLI user interface for the player binary
pub struct Cli {
    pub args: Args,
}

impl Cli {
    /// Create a new CLI instance
    pub fn new() -> Self {
        Cli { args: Args::parse() }
    }

    /// Describe what is about to be streamed
    pub fn display_clip(&self, clip: &PcmClip, encoding: ChunkEncoding) {
        println!("\nStreaming: {}", self.args.input);
        println!(
            "Format: {} ch @ {} Hz, {:.2}s, {} ms chunks ({:?})",
            clip.channels,
            clip.sample_rate,
            clip.duration().as_secs_f64(),
            self.args.chunk_ms,
            encoding
        );
        println!("\nPress Ctrl+C to stop playback");
    }

    /// Progress bar over the fed audio, in frames
    pub fn feed_progress(&self, total_frames: u64) -> Result<ProgressBar, Box<dyn Error>> {
        let pb = ProgressBar::new(total_frames);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} {msg}\n[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} frames ({eta})")?
            .progress_chars("#>-");
        pb.set_style(style);
        pb.set_message("feeding");
        Ok(pb)
    }

    /// Display the final player state
    pub fn display_summary(&self, status: &PlayerStatus, snapshot: &ContainerSnapshot) {
        println!("\nPlayback {:?}.", status.state);
        println!(
            "Received {} frames ({:.2}s), container {} bytes, volume {:.2}",
            status.fed_frames,
            snapshot.duration_secs(),
            snapshot.len(),
            status.volume
        );
    }

    pub fn display_export(&self, path: &std::path::Path, bytes: usize) {
        println!("Wrote {} ({} bytes)", path.display(), bytes);
    }

    /// Display error messages
    pub fn display_error(&self, error: &dyn Error) {
        eprintln!("Error: {}", error);
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}
