//! Integration tests for configuration management
//!
//! These tests verify that the configuration system works correctly
//! across module boundaries.

use pcm_stream_player::audio::{AudioError, ChunkEncoding, OutputClock, VirtualOutput};
use pcm_stream_player::config::{PlayerConfig, Settings};
use pcm_stream_player::StreamingPlayer;
use std::error::Error;
use tempfile::tempdir;

#[cfg(test)]
mod config_integration_tests {
    use super::*;

    /// Test complete configuration workflow
    #[test]
    fn test_config_lifecycle() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");

        let mut settings = Settings::default();
        settings.player = PlayerConfig {
            channels: 2,
            sample_rate: 48000,
            flush_interval_ms: 20,
            chunk_encoding: ChunkEncoding::Base64,
        };
        settings.alsa_device = "test-audio-device".to_string();
        settings.volume = 0.7;

        settings.validate()?;
        settings.save(&config_path)?;

        let loaded_settings = Settings::load(&config_path)?;
        assert_eq!(loaded_settings.player, settings.player);
        assert_eq!(loaded_settings.alsa_device, "test-audio-device");
        assert_eq!(loaded_settings.volume, 0.7);

        let mut updated_settings = loaded_settings;
        updated_settings.player.sample_rate = 22050;
        updated_settings.save(&config_path)?;

        let reloaded_settings = Settings::load(&config_path)?;
        assert_eq!(reloaded_settings.player.sample_rate, 22050);

        Ok(())
    }

    /// Test invalid configuration handling
    #[test]
    fn test_invalid_config_validation() {
        let mut invalid_settings = Settings::default();
        invalid_settings.player.sample_rate = 0;

        let result = invalid_settings.validate();
        assert!(result.is_err());
        if let Err(e) = result {
            assert!(e.to_string().contains("sample rate"));
        }
    }

    /// A config that fails validation never produces a player.
    #[tokio::test]
    async fn test_invalid_config_rejected_by_player() {
        let mut config = PlayerConfig::default();
        config.flush_interval_ms = 0;

        let result = StreamingPlayer::with_output(config, |ctx| Ok(Box::new(VirtualOutput::new(ctx)) as Box<dyn OutputClock>));
        match result {
            Err(AudioError::InitializationError(msg)) => assert!(msg.contains("flush interval")),
            Err(e) => panic!("expected InitializationError, got {}", e),
            Ok(_) => panic!("expected InitializationError"),
        }
    }
}
