use crate::audio::{AudioError, BufferId, ClockTime, ContainerSnapshot, ScheduledBuffer};
use tokio::sync::oneshot;

/// Playback-control state of one streaming player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    /// The stream was marked done and its last buffer has been rendered.
    Finished,
}

/// Commands processed by the engine task, in the order they were sent.
#[derive(Debug)]
pub enum EngineCommand {
    /// Samples already decoded and validated by the handle.
    Feed {
        samples: Vec<i16>,
        reply: oneshot::Sender<Result<ContainerSnapshot, AudioError>>,
    },
    Play(oneshot::Sender<Result<PlaybackState, AudioError>>),
    Pause(oneshot::Sender<Result<PlaybackState, AudioError>>),
    SetDone(oneshot::Sender<PlaybackState>),
    GetStatus(oneshot::Sender<PlayerStatus>),
    Destroy(oneshot::Sender<()>),
}

/// Point-in-time view of the engine, for status displays.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStatus {
    pub state: PlaybackState,
    pub done: bool,
    /// End of everything scheduled so far, on the render clock.
    pub playback_clock: ClockTime,
    pub render_time: ClockTime,
    pub fed_frames: u64,
    pub pending_samples: usize,
    pub buffers_in_flight: usize,
    pub volume: f32,
}

/// Updates broadcast by the engine task.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    BufferScheduled(ScheduledBuffer),
    BufferEnded(BufferId),
    StateChanged(PlaybackState),
}
