//! The render clock abstraction the scheduler targets, and the timeline both
//! output implementations render from.

use crate::audio::{error::AudioError, gain::GainController};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::ops::Add;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Identifies one scheduled buffer for its end-of-render notification.
pub type BufferId = u64;

/// A position on the render clock, counted in frames at the output sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ClockTime(u64);

impl ClockTime {
    pub const ZERO: ClockTime = ClockTime(0);

    pub fn from_frames(frames: u64) -> Self {
        ClockTime(frames)
    }

    pub fn frames(self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(self, sample_rate: u32) -> f64 {
        self.0 as f64 / sample_rate as f64
    }
}

impl Add<u64> for ClockTime {
    type Output = ClockTime;

    fn add(self, frames: u64) -> ClockTime {
        ClockTime(self.0 + frames)
    }
}

/// Planar float audio ready to be placed on the render clock.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayableBuffer {
    planes: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl PlayableBuffer {
    /// All planes must have the same length.
    pub fn new(planes: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        debug_assert!(planes.windows(2).all(|w| w[0].len() == w[1].len()));
        Self { planes, sample_rate }
    }

    pub fn channel_count(&self) -> usize {
        self.planes.len()
    }

    pub fn frames(&self) -> u64 {
        self.planes.first().map_or(0, |p| p.len() as u64)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn channel_data(&self, channel: usize) -> &[f32] {
        &self.planes[channel]
    }
}

/// What an output needs from the player that owns it.
#[derive(Debug, Clone)]
pub struct OutputContext {
    pub channels: u16,
    pub sample_rate: u32,
    pub gain: Arc<GainController>,
    /// Receives the id of each buffer once it has actually been rendered.
    pub completions: mpsc::UnboundedSender<BufferId>,
}

/// A real-time render clock that buffers can be scheduled onto.
///
/// The engine never blocks on it: `schedule` only queues work, and
/// rendering progress comes back through [`OutputContext::completions`].
#[async_trait]
pub trait OutputClock: Send + Sync {
    /// The position the render clock has reached. Anything scheduled before it is late.
    fn current_time(&self) -> ClockTime;

    /// Queues `buffer` to start playing at `start`.
    fn schedule(&self, id: BufferId, buffer: PlayableBuffer, start: ClockTime) -> Result<(), AudioError>;

    /// Starts (or restarts) the render clock.
    async fn resume(&self) -> Result<(), AudioError>;

    /// Stops the render clock where it is.
    async fn suspend(&self) -> Result<(), AudioError>;

    /// Releases the device. Further calls fail with `InvalidState`.
    async fn close(&self) -> Result<(), AudioError>;
}

#[derive(Debug)]
struct TimelineEntry {
    id: BufferId,
    start: u64,
    buffer: PlayableBuffer,
}

impl TimelineEntry {
    fn end(&self) -> u64 {
        self.start + self.buffer.frames()
    }
}

/// Scheduled buffers ordered by start, rendered period by period.
#[derive(Debug, Default)]
pub struct RenderTimeline {
    entries: VecDeque<TimelineEntry>,
}

impl RenderTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: BufferId, buffer: PlayableBuffer, start: ClockTime) {
        let start = start.frames();
        let pos = self.entries.iter().position(|e| e.start > start).unwrap_or(self.entries.len());
        self.entries.insert(pos, TimelineEntry { id, start, buffer });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mixes `frames` frames starting at `position` into `out` (interleaved,
    /// `channels` wide). Frames no buffer covers are silent.
    pub fn render(&self, position: u64, frames: usize, channels: usize, out: &mut Vec<f32>) {
        out.clear();
        out.resize(frames * channels, 0.0);
        let window_end = position + frames as u64;
        for entry in &self.entries {
            if entry.start >= window_end {
                break;
            }
            if entry.end() <= position {
                continue;
            }
            let from = entry.start.max(position);
            let to = entry.end().min(window_end);
            let planes = entry.buffer.channel_count().min(channels);
            for t in from..to {
                let src = (t - entry.start) as usize;
                let dst = (t - position) as usize * channels;
                for ch in 0..planes {
                    out[dst + ch] += entry.buffer.channel_data(ch)[src];
                }
            }
        }
    }

    /// Removes and returns, in order, every buffer that ends at or before `position`.
    pub fn take_ended(&mut self, position: u64) -> Vec<BufferId> {
        let mut ended = Vec::new();
        while let Some(front) = self.entries.front() {
            if front.end() > position {
                break;
            }
            if let Some(entry) = self.entries.pop_front() {
                ended.push(entry.id);
            }
        }
        ended
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
