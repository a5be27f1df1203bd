use crate::audio::error::AudioError;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

const LOG_TARGET: &str = "pcm_stream_player::audio::gain";

pub const DEFAULT_GAIN: f32 = 1.0;

/// The single gain stage between every scheduled buffer and the output sink.
///
/// Read by the render side on every period, so a change is heard from the
/// next rendered period on. Stored as raw `f32` bits to stay lock-free.
#[derive(Debug)]
pub struct GainController {
    level_bits: AtomicU32,
}

impl GainController {
    pub fn new() -> Self {
        Self::with_level(DEFAULT_GAIN)
    }

    pub fn with_level(level: f32) -> Self {
        Self {
            level_bits: AtomicU32::new(level.to_bits()),
        }
    }

    /// Sets the gain. Levels above 1.0 amplify; negative or non-finite levels are rejected.
    pub fn set_volume(&self, level: f32) -> Result<(), AudioError> {
        if !level.is_finite() || level < 0.0 {
            return Err(AudioError::InvalidArgument(format!("volume must be a finite value >= 0.0, got {}", level)));
        }
        debug!(target: LOG_TARGET, "Gain set to {:.3}", level);
        self.level_bits.store(level.to_bits(), Ordering::Release);
        Ok(())
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Acquire))
    }

    /// Scales `samples` in place by the current level.
    pub fn apply(&self, samples: &mut [f32]) {
        let level = self.volume();
        if level == DEFAULT_GAIN {
            return;
        }
        for sample in samples.iter_mut() {
            *sample *= level;
        }
    }
}

impl Default for GainController {
    fn default() -> Self {
        Self::new()
    }
}
