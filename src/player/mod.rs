//! The streaming player: a handle that decodes chunks and drives the engine task.

use crate::audio::{
    AudioError, BufferId, ChunkDecoder, ContainerEncoder, ContainerFormat, ContainerSnapshot, GainController,
    OutputClock, OutputContext, PlaybackScheduler, SampleBuffer,
};
use crate::config::PlayerConfig;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

mod run_loop;
mod state;

pub use state::{EngineCommand, PlaybackState, PlayerEvent, PlayerStatus};

const PLAYER_LOG_TARGET: &str = "pcm_stream_player::player";

const COMMAND_BUFFER_SIZE: usize = 64;
const EVENT_CAPACITY: usize = 256;

/// Plays an incrementally arriving PCM stream gaplessly while keeping an
/// exportable container of everything received.
///
/// All playback state lives on a dedicated engine task; this handle only
/// decodes chunks and exchanges messages with it. Once [`destroy`](Self::destroy)
/// has run, every operation except `destroy` fails with `InvalidState`.
pub struct StreamingPlayer {
    session_id: Uuid,
    config: PlayerConfig,
    decoder: ChunkDecoder,
    gain: Arc<GainController>,
    command_tx: mpsc::Sender<EngineCommand>,
    snapshot_rx: watch::Receiver<ContainerSnapshot>,
    event_tx: broadcast::Sender<PlayerEvent>,
    engine_task: TokioMutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl StreamingPlayer {
    /// Builds a player on top of the output returned by `open_output` and
    /// starts its engine task. Must be called inside a Tokio runtime.
    ///
    /// An invalid config or a failing `open_output` is an `InitializationError`.
    pub fn with_output<F>(config: PlayerConfig, open_output: F) -> Result<Self, AudioError>
    where
        F: FnOnce(OutputContext) -> Result<Box<dyn OutputClock>, AudioError>,
    {
        config
            .validate()
            .map_err(|e| AudioError::InitializationError(format!("invalid player config: {}", e)))?;

        let session_id = Uuid::new_v4();
        let gain = Arc::new(GainController::new());
        let (completion_tx, completion_rx) = mpsc::unbounded_channel::<BufferId>();

        let output = open_output(OutputContext {
            channels: config.channels,
            sample_rate: config.sample_rate,
            gain: Arc::clone(&gain),
            completions: completion_tx,
        })
        .map_err(|e| match e {
            AudioError::InitializationError(_) => e,
            other => AudioError::InitializationError(other.to_string()),
        })?;

        let format = ContainerFormat::pcm16(config.channels, config.sample_rate);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER_SIZE);
        let (snapshot_tx, snapshot_rx) = watch::channel(ContainerSnapshot::empty(format));
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let engine = run_loop::PlayerEngine {
            session_id,
            config,
            buffer: SampleBuffer::new(),
            encoder: ContainerEncoder::new(format),
            scheduler: PlaybackScheduler::new(config.channels, config.sample_rate),
            output,
            gain: Arc::clone(&gain),
            state: PlaybackState::Playing,
            done: false,
            command_rx,
            completion_rx,
            snapshot_tx,
            event_tx: event_tx.clone(),
        };

        info!(
            target: PLAYER_LOG_TARGET,
            session = %session_id,
            "Starting streaming player: {} ch @ {} Hz, flush every {} ms, {:?} chunks",
            config.channels,
            config.sample_rate,
            config.flush_interval_ms,
            config.chunk_encoding
        );
        let engine_task = tokio::spawn(engine.run());

        Ok(Self {
            session_id,
            config,
            decoder: ChunkDecoder::new(config.chunk_encoding, config.channels),
            gain,
            command_tx,
            snapshot_rx,
            event_tx,
            engine_task: TokioMutex::new(Some(engine_task)),
            destroyed: AtomicBool::new(false),
        })
    }

    /// Builds a player that renders to an ALSA playback device.
    #[cfg(feature = "alsa-output")]
    pub fn open_alsa(config: PlayerConfig, device: &str) -> Result<Self, AudioError> {
        Self::with_output(config, |ctx| Ok(Box::new(crate::audio::AlsaOutput::open(device, ctx)?) as Box<dyn OutputClock>))
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    fn ensure_live(&self) -> Result<(), AudioError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(AudioError::destroyed());
        }
        Ok(())
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> EngineCommand) -> Result<T, AudioError> {
        self.ensure_live()?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| AudioError::destroyed())?;
        reply_rx.await.map_err(|_| AudioError::destroyed())
    }

    /// Decodes one chunk and appends it. Returns the refreshed container snapshot.
    ///
    /// A malformed chunk fails with `DecodeError` and leaves the player untouched.
    /// A chunk that would grow the container past its 32-bit size limit fails
    /// with `InvalidArgument`, also without side effects.
    #[instrument(skip(self, chunk), fields(session = %self.session_id, bytes = chunk.as_ref().len()))]
    pub async fn feed(&self, chunk: impl AsRef<[u8]>) -> Result<ContainerSnapshot, AudioError> {
        self.ensure_live()?;
        let samples = self.decoder.decode(chunk.as_ref()).map_err(|e| {
            warn!(target: PLAYER_LOG_TARGET, "Rejected chunk: {}", e);
            e
        })?;
        self.request(|reply| EngineCommand::Feed { samples, reply }).await?
    }

    /// Feeds every chunk of `chunks` in order, then marks the stream done.
    /// Stops at the first rejected chunk.
    pub async fn feed_stream<S>(&self, chunks: S) -> Result<PlaybackState, AudioError>
    where
        S: Stream<Item = Bytes> + Unpin,
    {
        let mut chunks = chunks;
        let mut fed = 0usize;
        while let Some(chunk) = chunks.next().await {
            self.feed(&chunk).await?;
            fed += 1;
        }
        debug!(target: PLAYER_LOG_TARGET, session = %self.session_id, "Chunk stream ended after {} chunks.", fed);
        self.set_done().await
    }

    /// Resumes the render clock. Resolves once the output has actually resumed.
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub async fn play(&self) -> Result<PlaybackState, AudioError> {
        self.request(EngineCommand::Play).await?
    }

    /// Suspends the render clock. Resolves once the output has actually suspended.
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub async fn pause(&self) -> Result<PlaybackState, AudioError> {
        self.request(EngineCommand::Pause).await?
    }

    /// Pauses when playing, plays when paused.
    pub async fn toggle(&self) -> Result<PlaybackState, AudioError> {
        match self.status().await?.state {
            PlaybackState::Playing => self.pause().await,
            PlaybackState::Paused => self.play().await,
            PlaybackState::Finished => Ok(PlaybackState::Finished),
        }
    }

    /// Sets the gain applied to everything rendered from now on.
    pub fn set_volume(&self, level: f32) -> Result<(), AudioError> {
        self.ensure_live()?;
        self.gain.set_volume(level)
    }

    pub fn volume(&self) -> Result<f32, AudioError> {
        self.ensure_live()?;
        Ok(self.gain.volume())
    }

    /// Marks that no further chunks will arrive.
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub async fn set_done(&self) -> Result<PlaybackState, AudioError> {
        self.request(EngineCommand::SetDone).await
    }

    pub async fn status(&self) -> Result<PlayerStatus, AudioError> {
        self.request(EngineCommand::GetStatus).await
    }

    /// The container as of the most recent feed.
    pub fn snapshot(&self) -> Result<ContainerSnapshot, AudioError> {
        self.ensure_live()?;
        Ok(self.snapshot_rx.borrow().clone())
    }

    /// Receiver that sees every refreshed snapshot.
    pub fn subscribe_snapshots(&self) -> Result<watch::Receiver<ContainerSnapshot>, AudioError> {
        self.ensure_live()?;
        Ok(self.snapshot_rx.clone())
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.event_tx.subscribe()
    }

    /// Stops the scheduling task, releases buffers and closes the output.
    ///
    /// Returns once the engine task has exited, so no tick can run afterwards.
    /// Calling it again is a no-op that still waits for that exit.
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub async fn destroy(&self) -> Result<(), AudioError> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            debug!(target: PLAYER_LOG_TARGET, "Player already destroyed.");
            return self.join_engine().await;
        }
        info!(target: PLAYER_LOG_TARGET, "Destroying player.");

        let (reply_tx, reply_rx) = oneshot::channel();
        if self.command_tx.send(EngineCommand::Destroy(reply_tx)).await.is_ok() && reply_rx.await.is_err() {
            debug!(target: PLAYER_LOG_TARGET, "Engine exited without acknowledging destroy.");
        }

        self.join_engine().await?;
        info!(target: PLAYER_LOG_TARGET, "Player destroyed.");
        Ok(())
    }

    /// Waits for the engine task to exit. The lock is held across the join, so
    /// concurrent callers all return only after the task is gone.
    async fn join_engine(&self) -> Result<(), AudioError> {
        let mut engine_task = self.engine_task.lock().await;
        if let Some(handle) = engine_task.take() {
            handle.await?;
        }
        Ok(())
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}
