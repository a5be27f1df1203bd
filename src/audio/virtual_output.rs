use crate::audio::{
    error::AudioError,
    gain::GainController,
    output::{BufferId, ClockTime, OutputClock, OutputContext, PlayableBuffer, RenderTimeline},
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

const LOG_TARGET: &str = "pcm_stream_player::audio::virtual_output";

struct VirtualState {
    now: u64,
    running: bool,
    closed: bool,
    timeline: RenderTimeline,
    capture: Option<Vec<f32>>,
    scratch: Vec<f32>,
}

/// An in-memory render clock.
///
/// Time only moves when [`advance`](Self::advance) is called, either by a test
/// or by the real-time driver. Rendered output is optionally captured so the
/// audible result (after gain) can be inspected. Clones share the same clock.
#[derive(Clone)]
pub struct VirtualOutput {
    state: Arc<Mutex<VirtualState>>,
    channels: usize,
    sample_rate: u32,
    gain: Arc<GainController>,
    completions: mpsc::UnboundedSender<BufferId>,
}

impl VirtualOutput {
    /// Creates a running clock at time zero that captures everything it renders.
    pub fn new(ctx: OutputContext) -> Self {
        debug!(target: LOG_TARGET, "Creating virtual output: {} ch @ {} Hz", ctx.channels, ctx.sample_rate);
        Self {
            state: Arc::new(Mutex::new(VirtualState {
                now: 0,
                running: true,
                closed: false,
                timeline: RenderTimeline::new(),
                capture: Some(Vec::new()),
                scratch: Vec::new(),
            })),
            channels: ctx.channels.max(1) as usize,
            sample_rate: ctx.sample_rate,
            gain: ctx.gain,
            completions: ctx.completions,
        }
    }

    /// Drops the capture buffer, for long-running use.
    pub fn without_capture(self) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.capture = None;
        }
        self
    }

    /// Renders `frames` frames if the clock is running and reports finished buffers.
    /// Returns how many frames the clock actually moved.
    pub fn advance(&self, frames: u64) -> u64 {
        let ended = {
            let mut guard = match self.state.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if !guard.running || guard.closed || frames == 0 {
                return 0;
            }
            let state = &mut *guard;
            state.timeline.render(state.now, frames as usize, self.channels, &mut state.scratch);
            self.gain.apply(&mut state.scratch);
            if let Some(capture) = state.capture.as_mut() {
                capture.extend_from_slice(&state.scratch);
            }
            state.now += frames;
            state.timeline.take_ended(state.now)
        };
        for id in ended {
            trace!(target: LOG_TARGET, "Buffer {} finished rendering", id);
            if self.completions.send(id).is_err() {
                trace!(target: LOG_TARGET, "Completion receiver gone; dropping notification for buffer {}", id);
            }
        }
        frames
    }

    /// Advances by a wall-clock duration worth of frames.
    pub fn advance_by(&self, elapsed: Duration) -> u64 {
        let frames = (elapsed.as_secs_f64() * self.sample_rate as f64).round() as u64;
        self.advance(frames)
    }

    /// Interleaved samples rendered so far (after gain). Empty when capture is off.
    pub fn captured(&self) -> Vec<f32> {
        self.state
            .lock()
            .map(|s| s.capture.clone().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().map(|s| s.running).unwrap_or(false)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(true)
    }

    /// Number of scheduled buffers that have not finished rendering.
    pub fn queued(&self) -> usize {
        self.state.lock().map(|s| s.timeline.len()).unwrap_or(0)
    }

    /// Spawns a task that advances the clock in real time, one `period` at a
    /// time, until the output is closed.
    pub fn drive_realtime(&self, period: Duration) -> JoinHandle<()> {
        let output = self.clone();
        info!(target: LOG_TARGET, "Driving virtual output in real time (period {:?}).", period);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            let mut last = tokio::time::Instant::now();
            loop {
                ticker.tick().await;
                if output.is_closed() {
                    debug!(target: LOG_TARGET, "Virtual output closed, real-time driver exiting.");
                    break;
                }
                let now = tokio::time::Instant::now();
                output.advance_by(now - last);
                last = now;
            }
        })
    }

    fn with_open_state<T>(&self, f: impl FnOnce(&mut VirtualState) -> T) -> Result<T, AudioError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| AudioError::InvalidState("virtual output mutex poisoned".to_string()))?;
        if state.closed {
            return Err(AudioError::InvalidState("virtual output is closed".to_string()));
        }
        Ok(f(&mut state))
    }
}

#[async_trait]
impl OutputClock for VirtualOutput {
    fn current_time(&self) -> ClockTime {
        ClockTime::from_frames(self.state.lock().map(|s| s.now).unwrap_or(0))
    }

    fn schedule(&self, id: BufferId, buffer: PlayableBuffer, start: ClockTime) -> Result<(), AudioError> {
        if buffer.channel_count() != self.channels {
            warn!(target: LOG_TARGET, "Buffer {} has {} channels, output has {}", id, buffer.channel_count(), self.channels);
        }
        self.with_open_state(|state| state.timeline.insert(id, buffer, start))
    }

    async fn resume(&self) -> Result<(), AudioError> {
        self.with_open_state(|state| state.running = true)
    }

    async fn suspend(&self) -> Result<(), AudioError> {
        self.with_open_state(|state| state.running = false)
    }

    async fn close(&self) -> Result<(), AudioError> {
        self.with_open_state(|state| {
            state.closed = true;
            state.running = false;
            state.timeline.clear();
            state.scratch = Vec::new();
        })
    }
}
