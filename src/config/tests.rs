//! Tests for configuration management module

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::audio::ChunkEncoding;

    use tempfile::tempdir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.player.channels, 1);
        assert_eq!(settings.player.sample_rate, 16000);
        assert_eq!(settings.player.flush_interval_ms, 100);
        assert_eq!(settings.player.chunk_encoding, ChunkEncoding::Raw);
        assert_eq!(settings.alsa_device, "default");
        assert_eq!(settings.volume, 1.0);
    }

    #[test]
    fn test_settings_save_and_load() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("nested").join("config.json");

        let mut settings = Settings::default();
        settings.player.channels = 2;
        settings.player.sample_rate = 24000;
        settings.player.chunk_encoding = ChunkEncoding::Base64;
        settings.alsa_device = "hw:1,0".to_string();

        settings.save(&config_path)?;

        assert!(config_path.exists());

        let loaded = Settings::load(&config_path)?;

        assert_eq!(loaded.player.channels, 2);
        assert_eq!(loaded.player.sample_rate, 24000);
        assert_eq!(loaded.player.flush_interval_ms, 100);
        assert_eq!(loaded.player.chunk_encoding, ChunkEncoding::Base64);
        assert_eq!(loaded.alsa_device, "hw:1,0");

        Ok(())
    }

    #[test]
    fn test_load_missing_file_gives_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let loaded = Settings::load(&dir.path().join("absent.json"))?;
        assert_eq!(loaded.player, PlayerConfig::default());
        Ok(())
    }

    #[test]
    fn test_partial_file_fills_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "player": { "sample_rate": 22050, "chunk_encoding": "base64" } }"#)?;

        let loaded = Settings::load(&config_path)?;
        assert_eq!(loaded.player.sample_rate, 22050);
        assert_eq!(loaded.player.channels, 1);
        assert_eq!(loaded.player.chunk_encoding, ChunkEncoding::Base64);
        assert_eq!(loaded.alsa_device, "default");
        Ok(())
    }

    #[test]
    fn test_malformed_file_is_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, "{ not json")?;

        match Settings::load(&config_path) {
            Err(ConfigError::ParseError(_)) => Ok(()),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_settings_validation() {
        assert!(Settings::default().validate().is_ok());

        let mut zero_channels = Settings::default();
        zero_channels.player.channels = 0;
        assert!(zero_channels.validate().is_err());

        let mut zero_rate = Settings::default();
        zero_rate.player.sample_rate = 0;
        assert!(zero_rate.validate().is_err());

        let mut zero_interval = Settings::default();
        zero_interval.player.flush_interval_ms = 0;
        assert!(zero_interval.validate().is_err());

        let mut negative_volume = Settings::default();
        negative_volume.volume = -0.5;
        assert!(negative_volume.validate().is_err());

        let mut no_device = Settings::default();
        no_device.alsa_device = String::new();
        assert!(no_device.validate().is_err());
    }

    #[test]
    fn test_formats_that_overflow_the_container_header_are_invalid() {
        let wide = PlayerConfig {
            channels: 40000,
            ..PlayerConfig::default()
        };
        match wide.validate() {
            Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("block align")),
            other => panic!("expected ValidationError, got {:?}", other),
        }

        let fast = PlayerConfig {
            sample_rate: 3_000_000_000,
            ..PlayerConfig::default()
        };
        match fast.validate() {
            Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("byte rate")),
            other => panic!("expected ValidationError, got {:?}", other),
        }

        let widest_pcm = PlayerConfig {
            channels: 32767,
            sample_rate: 8000,
            ..PlayerConfig::default()
        };
        assert!(widest_pcm.validate().is_ok());
    }

    #[test]
    fn test_flush_interval_duration() {
        let config = PlayerConfig {
            flush_interval_ms: 40,
            ..PlayerConfig::default()
        };
        assert_eq!(config.flush_interval(), std::time::Duration::from_millis(40));
    }

    #[test]
    fn test_default_path() {
        let path = Settings::default_path();
        assert!(path.to_str().unwrap().contains(".config/pcm-stream-player/config.json"));
    }
}
