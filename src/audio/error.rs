use std::error::Error;
use std::io;
use symphonia::core::errors::Error as SymphoniaError;

/// Error types for the streaming playback engine.
#[derive(Debug)]
pub enum AudioError {
    /// Chunk payload was malformed or not a whole number of samples/frames.
    DecodeError(String),
    /// The output clock could not be opened; the player is never usable.
    InitializationError(String),
    /// Operation invoked on a destroyed player or a closed output.
    InvalidState(String),
    InvalidArgument(String),
    AlsaError(String),
    IoError(io::Error),
    SymphoniaError(SymphoniaError),
    UnsupportedFormat(String),
    TaskJoinError(String),
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::DecodeError(e) => write!(f, "Decoding error: {}", e),
            AudioError::InitializationError(e) => write!(f, "Initialization error: {}", e),
            AudioError::InvalidState(s) => write!(f, "Invalid state: {}", s),
            AudioError::InvalidArgument(s) => write!(f, "Invalid argument: {}", s),
            AudioError::AlsaError(e) => write!(f, "ALSA error: {}", e),
            AudioError::IoError(e) => write!(f, "I/O error: {}", e),
            AudioError::SymphoniaError(e) => write!(f, "Symphonia error: {}", e),
            AudioError::UnsupportedFormat(s) => write!(f, "Unsupported format: {}", s),
            AudioError::TaskJoinError(e) => write!(f, "Async task join error: {}", e),
        }
    }
}

impl Error for AudioError {}

impl AudioError {
    /// Shorthand for the error every operation returns once the player is torn down.
    pub(crate) fn destroyed() -> Self {
        AudioError::InvalidState("player has been destroyed".to_string())
    }
}

// --- From Implementations for AudioError ---

#[cfg(feature = "alsa-output")]
impl From<alsa::Error> for AudioError {
    fn from(e: alsa::Error) -> Self {
        AudioError::AlsaError(e.to_string())
    }
}

impl From<SymphoniaError> for AudioError {
    fn from(e: SymphoniaError) -> Self {
        AudioError::SymphoniaError(e)
    }
}

impl From<io::Error> for AudioError {
    fn from(e: io::Error) -> Self {
        AudioError::IoError(e)
    }
}

impl From<base64::DecodeError> for AudioError {
    fn from(e: base64::DecodeError) -> Self {
        AudioError::DecodeError(format!("invalid base64 payload: {}", e))
    }
}

impl From<tokio::task::JoinError> for AudioError {
    fn from(e: tokio::task::JoinError) -> Self {
        AudioError::TaskJoinError(e.to_string())
    }
}
