use crate::audio::{
    alsa_handler::AlsaPcmHandler,
    error::AudioError,
    gain::GainController,
    output::{BufferId, ClockTime, OutputClock, OutputContext, PlayableBuffer, RenderTimeline},
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, error, info, instrument, trace, warn};

const LOG_TARGET: &str = "pcm_stream_player::audio::alsa_output";

/// Frames rendered and written per render-thread iteration.
const PERIOD_FRAMES: usize = 1024;
const IDLE_SLEEP: Duration = Duration::from_millis(5);
const UNDERRUN_RETRY_SLEEP: Duration = Duration::from_millis(10);

struct RenderShared {
    handler: Mutex<AlsaPcmHandler>,
    timeline: Mutex<RenderTimeline>,
    /// First frame not yet rendered into a period.
    render_cursor: AtomicU64,
    running: AtomicBool,
    closed: AtomicBool,
    channels: usize,
    gain: Arc<GainController>,
    completions: mpsc::UnboundedSender<BufferId>,
}

/// Render clock backed by an ALSA playback device.
///
/// A dedicated thread renders the scheduled timeline one period at a time,
/// applies the gain and writes the period to the device, so the clock keeps
/// running (emitting silence) between buffers. A buffer is reported ended once
/// the device has actually played past its last frame.
pub struct AlsaOutput {
    shared: Arc<RenderShared>,
    render_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl AlsaOutput {
    /// Opens `device` and starts the render thread.
    /// Any failure here is an `InitializationError`.
    #[instrument(skip(ctx), fields(channels = ctx.channels, rate = ctx.sample_rate))]
    pub fn open(device: &str, ctx: OutputContext) -> Result<Self, AudioError> {
        let mut handler = AlsaPcmHandler::new(device);
        handler
            .initialize(ctx.channels, ctx.sample_rate)
            .map_err(|e| AudioError::InitializationError(format!("cannot open ALSA device '{}': {}", device, e)))?;
        debug!(
            target: LOG_TARGET,
            "Device '{}' accepted {} ch @ {:?} Hz.",
            device,
            handler.channels(),
            handler.get_actual_rate()
        );

        let shared = Arc::new(RenderShared {
            handler: Mutex::new(handler),
            timeline: Mutex::new(RenderTimeline::new()),
            render_cursor: AtomicU64::new(0),
            running: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            channels: ctx.channels.max(1) as usize,
            gain: ctx.gain,
            completions: ctx.completions,
        });

        let thread_shared = Arc::clone(&shared);
        let render_thread = thread::Builder::new()
            .name("pcm-render".to_string())
            .spawn(move || render_loop(thread_shared))
            .map_err(|e| AudioError::InitializationError(format!("cannot spawn render thread: {}", e)))?;

        info!(target: LOG_TARGET, "ALSA output running on '{}'.", device);
        Ok(Self {
            shared,
            render_thread: Mutex::new(Some(render_thread)),
        })
    }

    fn ensure_open(&self) -> Result<(), AudioError> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(AudioError::InvalidState("ALSA output is closed".to_string()));
        }
        Ok(())
    }
}

fn render_loop(shared: Arc<RenderShared>) {
    debug!(target: LOG_TARGET, "Render thread started.");
    let channels = shared.channels;
    let mut mixed: Vec<f32> = Vec::with_capacity(PERIOD_FRAMES * channels);
    let mut period: Vec<i16> = Vec::with_capacity(PERIOD_FRAMES * channels);
    let mut written: u64 = 0;

    while !shared.closed.load(Ordering::Acquire) {
        if !shared.running.load(Ordering::Acquire) {
            thread::sleep(IDLE_SLEEP);
            continue;
        }

        {
            let timeline = match shared.timeline.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let position = shared.render_cursor.load(Ordering::Acquire);
            timeline.render(position, PERIOD_FRAMES, channels, &mut mixed);
            shared.render_cursor.store(position + PERIOD_FRAMES as u64, Ordering::Release);
        }
        shared.gain.apply(&mut mixed);
        period.clear();
        period.extend(mixed.iter().map(|s| (s * 32768.0).clamp(-32768.0, 32767.0) as i16));

        // Hold the device for the whole period so pause/close land between periods.
        let handler = match shared.handler.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!(target: LOG_TARGET, "ALSA handler mutex poisoned: {}", poisoned);
                break;
            }
        };
        written += write_period(&period, channels, |samples| handler.write_s16_buffer(samples)) as u64;
        let played = written.saturating_sub(handler.delay());
        drop(handler);

        let ended = match shared.timeline.lock() {
            Ok(mut timeline) => timeline.take_ended(played),
            Err(poisoned) => poisoned.into_inner().take_ended(played),
        };
        for id in ended {
            trace!(target: LOG_TARGET, "Buffer {} played out at frame {}", id, played);
            if shared.completions.send(id).is_err() {
                trace!(target: LOG_TARGET, "Completion receiver gone; dropping notification for buffer {}", id);
            }
        }
    }
    debug!(target: LOG_TARGET, "Render thread exiting.");
}

/// Writes one interleaved period, retrying after recovered underruns.
/// Returns the frames the device accepted; a write error drops the rest.
pub(crate) fn write_period<W>(period: &[i16], channels: usize, mut write: W) -> usize
where
    W: FnMut(&[i16]) -> Result<usize, AudioError>,
{
    let total = period.len() / channels.max(1);
    let mut offset = 0;
    while offset < total {
        match write(&period[offset * channels..]) {
            Ok(0) => {
                trace!(target: LOG_TARGET, "Retrying period after recovered underrun.");
                thread::sleep(UNDERRUN_RETRY_SLEEP);
            }
            Ok(frames) => offset += frames.min(total - offset),
            Err(e) => {
                error!(target: LOG_TARGET, "Dropping rest of period after write error: {}", e);
                thread::sleep(IDLE_SLEEP);
                break;
            }
        }
    }
    offset
}

#[async_trait]
impl OutputClock for AlsaOutput {
    /// One period past the render cursor: the period being rendered right now
    /// is already committed.
    fn current_time(&self) -> ClockTime {
        ClockTime::from_frames(self.shared.render_cursor.load(Ordering::Acquire) + PERIOD_FRAMES as u64)
    }

    fn schedule(&self, id: BufferId, buffer: PlayableBuffer, start: ClockTime) -> Result<(), AudioError> {
        self.ensure_open()?;
        let mut timeline = self
            .shared
            .timeline
            .lock()
            .map_err(|_| AudioError::InvalidState("render timeline mutex poisoned".to_string()))?;
        if start.frames() < self.shared.render_cursor.load(Ordering::Acquire) {
            warn!(target: LOG_TARGET, "Buffer {} scheduled behind the render cursor; its head will be cut.", id);
        }
        timeline.insert(id, buffer, start);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn resume(&self) -> Result<(), AudioError> {
        self.ensure_open()?;
        debug!(target: LOG_TARGET, "Requesting ALSA resume.");
        let shared = Arc::clone(&self.shared);
        task::spawn_blocking(move || {
            let result = match shared.handler.lock() {
                Ok(handler) => handler.resume(),
                Err(poisoned) => {
                    error!(target: LOG_TARGET, "ALSA handler mutex poisoned during resume attempt: {}", poisoned);
                    Err(AudioError::InvalidState("ALSA handler mutex poisoned".to_string()))
                }
            };
            shared.running.store(true, Ordering::Release);
            result
        })
        .await?
    }

    #[instrument(skip(self))]
    async fn suspend(&self) -> Result<(), AudioError> {
        self.ensure_open()?;
        debug!(target: LOG_TARGET, "Requesting ALSA pause.");
        self.shared.running.store(false, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        task::spawn_blocking(move || match shared.handler.lock() {
            Ok(handler) => handler.pause(),
            Err(poisoned) => {
                error!(target: LOG_TARGET, "ALSA handler mutex poisoned during pause attempt: {}", poisoned);
                Err(AudioError::InvalidState("ALSA handler mutex poisoned".to_string()))
            }
        })
        .await?
    }

    #[instrument(skip(self))]
    async fn close(&self) -> Result<(), AudioError> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Err(AudioError::InvalidState("ALSA output is already closed".to_string()));
        }
        info!(target: LOG_TARGET, "Closing ALSA output.");
        let render_thread = self.render_thread.lock().ok().and_then(|mut slot| slot.take());
        let shared = Arc::clone(&self.shared);
        task::spawn_blocking(move || {
            if let Some(handle) = render_thread {
                if handle.join().is_err() {
                    error!(target: LOG_TARGET, "Render thread panicked.");
                }
            }
            if let Ok(mut timeline) = shared.timeline.lock() {
                timeline.clear();
            }
            match shared.handler.lock() {
                Ok(mut handler) => {
                    handler.close();
                    Ok(())
                }
                Err(poisoned) => {
                    error!(target: LOG_TARGET, "ALSA handler mutex poisoned during close: {}", poisoned);
                    Err(AudioError::InvalidState("ALSA handler mutex poisoned during close".to_string()))
                }
            }
        })
        .await?
    }
}

impl Drop for AlsaOutput {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
    }
}
