use crate::audio::{
    error::AudioError,
    output::{BufferId, ClockTime, OutputClock, PlayableBuffer},
    sample_buffer::SampleBuffer,
};
use tracing::{debug, instrument, trace, warn};

const LOG_TARGET: &str = "pcm_stream_player::audio::scheduler";

/// Divisor that maps the s16 range onto [-1.0, 1.0).
pub const S16_SCALE: f32 = 32768.0;

/// Record of one buffer placed on the render clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledBuffer {
    pub id: BufferId,
    pub start: ClockTime,
    pub frames: u64,
}

impl ScheduledBuffer {
    pub fn end(&self) -> ClockTime {
        self.start + self.frames
    }
}

/// Splits interleaved s16 samples into normalized float planes.
/// A trailing partial frame is ignored.
pub fn deinterleave(samples: &[i16], channels: usize) -> Vec<Vec<f32>> {
    let channels = channels.max(1);
    let frames = samples.len() / channels;
    let mut planes = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (plane, &sample) in planes.iter_mut().zip(frame) {
            plane.push(sample as f32 / S16_SCALE);
        }
    }
    planes
}

/// Moves the pending segment onto the render clock, back to back.
///
/// `playback_clock` is the end of everything scheduled so far. Each buffer
/// starts at `max(playback_clock, render time)`, so buffers never overlap and
/// only leave a gap when the render clock has already run past the queue.
#[derive(Debug)]
pub struct PlaybackScheduler {
    channels: u16,
    sample_rate: u32,
    playback_clock: ClockTime,
    next_id: BufferId,
    last_scheduled: Option<BufferId>,
    in_flight: usize,
}

impl PlaybackScheduler {
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        Self {
            channels: channels.max(1),
            sample_rate,
            playback_clock: ClockTime::ZERO,
            next_id: 1,
            last_scheduled: None,
            in_flight: 0,
        }
    }

    /// One scheduling pass. Returns `Ok(None)` when nothing is pending.
    ///
    /// The pending segment is only drained once the output accepted the
    /// buffer, so a failed schedule loses nothing.
    #[instrument(skip(self, buffer, output), fields(pending = buffer.pending_len()))]
    pub fn tick(&mut self, buffer: &mut SampleBuffer, output: &dyn OutputClock) -> Result<Option<ScheduledBuffer>, AudioError> {
        if buffer.is_pending_empty() {
            return Ok(None);
        }

        let planes = deinterleave(buffer.pending(), self.channels as usize);
        let playable = PlayableBuffer::new(planes, self.sample_rate);
        let frames = playable.frames();

        let render_time = output.current_time();
        let start = self.playback_clock.max(render_time);
        if render_time > self.playback_clock && self.in_flight > 0 {
            warn!(
                target: LOG_TARGET,
                "Render clock ({}) passed the scheduled end ({}); starting late.",
                render_time.frames(),
                self.playback_clock.frames()
            );
        } else if render_time > self.playback_clock {
            trace!(target: LOG_TARGET, "Queue was idle; starting at render time {}", render_time.frames());
        }

        let id = self.next_id;
        output.schedule(id, playable, start)?;

        self.next_id += 1;
        self.last_scheduled = Some(id);
        self.in_flight += 1;
        self.playback_clock = start + frames;
        let drained = buffer.drain_pending();

        debug!(
            target: LOG_TARGET,
            "Scheduled buffer {}: {} frames ({} samples) at {:.3}s, clock now {:.3}s",
            id,
            frames,
            drained.len(),
            start.as_secs_f64(self.sample_rate),
            self.playback_clock.as_secs_f64(self.sample_rate)
        );

        Ok(Some(ScheduledBuffer { id, start, frames }))
    }

    /// Records that `id` finished rendering. Returns true if it was the most
    /// recently scheduled buffer.
    pub fn buffer_ended(&mut self, id: BufferId) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.last_scheduled == Some(id)
    }

    pub fn playback_clock(&self) -> ClockTime {
        self.playback_clock
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn last_scheduled(&self) -> Option<BufferId> {
        self.last_scheduled
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
