use crate::audio::{
    AudioError, BufferId, ContainerEncoder, ContainerSnapshot, GainController, OutputClock, PlaybackScheduler, SampleBuffer,
};
use crate::config::PlayerConfig;
use crate::player::state::{EngineCommand, PlaybackState, PlayerEvent, PlayerStatus};
use crate::player::PLAYER_LOG_TARGET;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

/// Owns every piece of mutable playback state for one player.
///
/// Feeds, control commands, render completions and scheduling ticks are all
/// handled on this one task, so an append can never race a drain.
pub(crate) struct PlayerEngine {
    pub(crate) session_id: Uuid,
    pub(crate) config: PlayerConfig,
    pub(crate) buffer: SampleBuffer,
    pub(crate) encoder: ContainerEncoder,
    pub(crate) scheduler: PlaybackScheduler,
    pub(crate) output: Box<dyn OutputClock>,
    pub(crate) gain: Arc<GainController>,
    pub(crate) state: PlaybackState,
    pub(crate) done: bool,
    pub(crate) command_rx: mpsc::Receiver<EngineCommand>,
    pub(crate) completion_rx: mpsc::UnboundedReceiver<BufferId>,
    pub(crate) snapshot_tx: watch::Sender<ContainerSnapshot>,
    pub(crate) event_tx: broadcast::Sender<PlayerEvent>,
}

impl PlayerEngine {
    /// Runs until a `Destroy` command arrives or every handle is dropped.
    #[instrument(skip(self), name = "player_engine", fields(session = %self.session_id))]
    pub(crate) async fn run(mut self) {
        info!(target: PLAYER_LOG_TARGET, "Engine started (flush every {} ms).", self.config.flush_interval_ms);
        let mut ticker = tokio::time::interval(self.config.flush_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                command = self.command_rx.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).await.is_break() {
                            break;
                        }
                    }
                    None => {
                        info!(target: PLAYER_LOG_TARGET, "All player handles dropped; tearing down.");
                        self.teardown().await;
                        break;
                    }
                },
                Some(id) = self.completion_rx.recv() => self.handle_buffer_ended(id),
                _ = ticker.tick() => self.tick(),
            }
        }
        info!(target: PLAYER_LOG_TARGET, "Engine stopped.");
    }

    async fn handle_command(&mut self, command: EngineCommand) -> ControlFlow<()> {
        match command {
            EngineCommand::Feed { samples, reply } => {
                let snapshot = self.append(samples);
                if reply.send(snapshot).is_err() {
                    trace!(target: PLAYER_LOG_TARGET, "Feed caller dropped before the snapshot was returned.");
                }
            }
            EngineCommand::Play(reply) => {
                let result = self.resume().await;
                if reply.send(result).is_err() {
                    trace!(target: PLAYER_LOG_TARGET, "Play caller dropped before completion.");
                }
            }
            EngineCommand::Pause(reply) => {
                let result = self.suspend().await;
                if reply.send(result).is_err() {
                    trace!(target: PLAYER_LOG_TARGET, "Pause caller dropped before completion.");
                }
            }
            EngineCommand::SetDone(reply) => {
                self.mark_done();
                if reply.send(self.state).is_err() {
                    trace!(target: PLAYER_LOG_TARGET, "SetDone caller dropped before completion.");
                }
            }
            EngineCommand::GetStatus(reply) => {
                if reply.send(self.status()).is_err() {
                    trace!(target: PLAYER_LOG_TARGET, "Status caller dropped before completion.");
                }
            }
            EngineCommand::Destroy(reply) => {
                self.teardown().await;
                if reply.send(()).is_err() {
                    debug!(target: PLAYER_LOG_TARGET, "Destroy caller went away before teardown finished.");
                }
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn append(&mut self, samples: Vec<i16>) -> Result<ContainerSnapshot, AudioError> {
        if samples.is_empty() {
            trace!(target: PLAYER_LOG_TARGET, "Ignoring empty feed.");
            return Ok(self.snapshot_tx.borrow().clone());
        }
        if self.done {
            warn!(target: PLAYER_LOG_TARGET, "Received {} samples after the stream was marked done.", samples.len());
        }
        let total = self.buffer.history_len().saturating_add(samples.len());
        if !self.encoder.format().can_hold(total) {
            warn!(target: PLAYER_LOG_TARGET, "Rejected {} samples: container would exceed its size limit.", samples.len());
            return Err(AudioError::InvalidArgument(format!(
                "feeding {} more samples would exceed the container limit of {} samples",
                samples.len(),
                self.encoder.format().max_samples()
            )));
        }
        self.buffer.append(&samples);
        let snapshot = self.encoder.refresh(self.buffer.snapshot_history())?;
        debug!(
            target: PLAYER_LOG_TARGET,
            "Fed {} samples; container now {} frames ({:.3}s).",
            samples.len(),
            snapshot.frame_count(),
            snapshot.duration_secs()
        );
        self.snapshot_tx.send_replace(snapshot.clone());
        Ok(snapshot)
    }

    fn tick(&mut self) {
        match self.scheduler.tick(&mut self.buffer, &*self.output) {
            Ok(Some(scheduled)) => self.broadcast(PlayerEvent::BufferScheduled(scheduled)),
            Ok(None) => {}
            Err(e) => {
                error!(target: PLAYER_LOG_TARGET, "Scheduling failed, pending samples kept for the next tick: {}", e);
            }
        }
    }

    fn handle_buffer_ended(&mut self, id: BufferId) {
        let was_last = self.scheduler.buffer_ended(id);
        trace!(target: PLAYER_LOG_TARGET, "Buffer {} ended (last scheduled: {}).", id, was_last);
        self.broadcast(PlayerEvent::BufferEnded(id));
        if was_last && self.done && self.buffer.is_pending_empty() {
            self.finish();
        }
    }

    fn mark_done(&mut self) {
        if !self.done {
            info!(target: PLAYER_LOG_TARGET, "Stream marked done.");
            self.done = true;
        }
        // Nothing left that could end later, so nothing else would trigger the finish.
        if self.buffer.is_pending_empty() && self.scheduler.in_flight() == 0 {
            self.finish();
        }
    }

    fn finish(&mut self) {
        if self.state == PlaybackState::Finished {
            return;
        }
        info!(target: PLAYER_LOG_TARGET, "Playback finished.");
        self.state = PlaybackState::Finished;
        self.broadcast(PlayerEvent::StateChanged(PlaybackState::Finished));
    }

    async fn resume(&mut self) -> Result<PlaybackState, AudioError> {
        if self.state == PlaybackState::Finished {
            debug!(target: PLAYER_LOG_TARGET, "Play requested after finish; ignoring.");
            return Ok(self.state);
        }
        self.output.resume().await?;
        self.set_state(PlaybackState::Playing);
        Ok(self.state)
    }

    async fn suspend(&mut self) -> Result<PlaybackState, AudioError> {
        if self.state == PlaybackState::Finished {
            debug!(target: PLAYER_LOG_TARGET, "Pause requested after finish; ignoring.");
            return Ok(self.state);
        }
        self.output.suspend().await?;
        self.set_state(PlaybackState::Paused);
        Ok(self.state)
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!(target: PLAYER_LOG_TARGET, "State {:?} -> {:?}", self.state, state);
            self.state = state;
            self.broadcast(PlayerEvent::StateChanged(state));
        }
    }

    fn status(&self) -> PlayerStatus {
        PlayerStatus {
            state: self.state,
            done: self.done,
            playback_clock: self.scheduler.playback_clock(),
            render_time: self.output.current_time(),
            fed_frames: (self.buffer.history_len() / self.config.channels.max(1) as usize) as u64,
            pending_samples: self.buffer.pending_len(),
            buffers_in_flight: self.scheduler.in_flight(),
            volume: self.gain.volume(),
        }
    }

    async fn teardown(&mut self) {
        info!(target: PLAYER_LOG_TARGET, "Tearing down player.");
        if let Err(e) = self.output.close().await {
            warn!(target: PLAYER_LOG_TARGET, "Error closing output during teardown: {}", e);
        }
        self.buffer.release();
        self.snapshot_tx.send_replace(ContainerSnapshot::empty(self.encoder.format()));
        self.completion_rx.close();
    }

    /// Sends an event, logging when nobody is listening.
    fn broadcast(&self, event: PlayerEvent) {
        trace!(target: PLAYER_LOG_TARGET, "Broadcasting event: {:?}", event);
        if self.event_tx.send(event).is_err() {
            trace!(target: PLAYER_LOG_TARGET, "No active listeners for player event.");
        }
    }
}
