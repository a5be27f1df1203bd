//! pcm-stream-player library core functionality

pub mod audio;
pub mod config;
pub mod player;
pub mod source;
pub mod ui;

pub use player::{PlaybackState, PlayerEvent, PlayerStatus, StreamingPlayer};

/// Initialize the application directories
pub fn init_app_dirs() -> std::io::Result<()> {
    let default_path = config::Settings::default_path();
    if let Some(config_dir) = default_path.parent() {
        if !config_dir.exists() {
            std::fs::create_dir_all(config_dir)?;
        }
    }
    Ok(())
}
