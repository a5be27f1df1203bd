use tracing::{debug, trace};

const LOG_TARGET: &str = "pcm_stream_player::audio::sample_buffer";

/// Holds every sample fed so far plus the segment not yet handed to the scheduler.
///
/// Both sequences are channel-interleaved and grow with amortized `Vec`
/// reallocation. The buffer has a single owner (the engine task), so an
/// append and a drain can never interleave.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    history: Vec<i16>,
    pending: Vec<i16>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to both the history and the pending segment, in arrival order.
    pub fn append(&mut self, samples: &[i16]) {
        if samples.is_empty() {
            return;
        }
        self.history.extend_from_slice(samples);
        self.pending.extend_from_slice(samples);
        trace!(
            target: LOG_TARGET,
            "Appended {} samples (history={}, pending={})",
            samples.len(),
            self.history.len(),
            self.pending.len()
        );
    }

    /// Read-only view of the pending segment.
    pub fn pending(&self) -> &[i16] {
        &self.pending
    }

    /// Returns the whole pending segment and leaves it empty.
    pub fn drain_pending(&mut self) -> Vec<i16> {
        std::mem::take(&mut self.pending)
    }

    /// Everything fed so far.
    pub fn snapshot_history(&self) -> &[i16] {
        &self.history
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Frees both sequences. Only used at teardown.
    pub fn release(&mut self) {
        debug!(target: LOG_TARGET, "Releasing {} history and {} pending samples.", self.history.len(), self.pending.len());
        self.history = Vec::new();
        self.pending = Vec::new();
    }
}
