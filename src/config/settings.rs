//! Player configuration and persisted settings

use crate::audio::{ChunkEncoding, ContainerFormat};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Stream format and scheduling cadence, fixed for the lifetime of one player.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct PlayerConfig {
    /// Interleaved channel count of the incoming PCM
    #[serde(default = "default_channels")]
    pub channels: u16,
    /// Sample rate of the incoming PCM, in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Period of the scheduling tick, in milliseconds
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// How chunk payloads are wrapped by the transport
    #[serde(default)]
    pub chunk_encoding: ChunkEncoding,
}

fn default_channels() -> u16 {
    1
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_flush_interval_ms() -> u64 {
    100
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            channels: default_channels(),
            sample_rate: default_sample_rate(),
            flush_interval_ms: default_flush_interval_ms(),
            chunk_encoding: ChunkEncoding::default(),
        }
    }
}

impl PlayerConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels == 0 {
            return Err(ConfigError::ValidationError("channels must be at least 1".to_string()));
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::ValidationError("sample rate must be greater than 0".to_string()));
        }
        if self.flush_interval_ms == 0 {
            return Err(ConfigError::ValidationError("flush interval must be greater than 0 ms".to_string()));
        }
        ContainerFormat::pcm16(self.channels, self.sample_rate)
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("unsupported stream format: {}", e)))?;
        Ok(())
    }
}

/// Application settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    /// Stream format and scheduling cadence
    #[serde(default)]
    pub player: PlayerConfig,
    /// ALSA device to use for audio playback
    #[serde(default = "default_alsa_device")]
    pub alsa_device: String,
    /// Initial gain
    #[serde(default = "default_volume")]
    pub volume: f32,
}

fn default_alsa_device() -> String {
    "default".to_string()
}

fn default_volume() -> f32 {
    1.0
}

/// Error types for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    IoError(io::Error),
    ParseError(String),
    ValidationError(String),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "I/O error: {}", e),
            ConfigError::ParseError(s) => write!(f, "Parse error: {}", s),
            ConfigError::ValidationError(s) => write!(f, "Validation error: {}", s),
        }
    }
}

impl Error for ConfigError {}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            player: PlayerConfig::default(),
            alsa_device: default_alsa_device(),
            volume: default_volume(),
        }
    }
}

impl Settings {
    /// Load settings from a file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(&self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("pcm-stream-player").join("config.json")
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.player.validate()?;

        if self.alsa_device.is_empty() {
            return Err(ConfigError::ValidationError("ALSA device cannot be empty".to_string()));
        }

        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(ConfigError::ValidationError(format!("volume must be >= 0.0, got {}", self.volume)));
        }

        Ok(())
    }
}
