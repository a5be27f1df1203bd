use crate::audio::error::AudioError;
use alsa::nix::errno::Errno;
use alsa::pcm::{Access, Format, HwParams, State as PcmState, PCM};
use alsa::{Direction, ValueOr};
use std::ffi::CString;
use tracing::instrument;
use tracing::{debug, error, info, warn};

const LOG_TARGET: &str = "pcm_stream_player::audio::alsa_handler";

/// Owns the ALSA PCM device the render thread writes to.
pub struct AlsaPcmHandler {
    device_name: String,
    pcm: Option<PCM>,
    channels: usize,
    actual_rate: Option<u32>,
}

impl AlsaPcmHandler {
    pub fn new(device_name: &str) -> Self {
        info!(target: LOG_TARGET, "Creating new AlsaPcmHandler for device: {}", device_name);
        AlsaPcmHandler {
            device_name: device_name.to_string(),
            pcm: None,
            channels: 0,
            actual_rate: None,
        }
    }

    /// Opens the device for interleaved S16 playback. Closes any open PCM first.
    ///
    /// The device must accept `rate` exactly: the engine does no resampling.
    #[instrument(skip(self), fields(device = %self.device_name))]
    pub fn initialize(&mut self, channels: u16, rate: u32) -> Result<(), AudioError> {
        info!(
            target: LOG_TARGET,
            "Initializing ALSA PCM device '{}': rate={}, channels={}",
            self.device_name, rate, channels
        );

        self.close();

        let device = CString::new(self.device_name.clone())
            .map_err(|e| AudioError::InitializationError(format!("Invalid device name: {}", e)))?;

        let pcm = PCM::open(&device, Direction::Playback, false)?;

        {
            let hwp = HwParams::any(&pcm)?;
            hwp.set_access(Access::RWInterleaved)?;
            hwp.set_format(Format::s16())?;
            hwp.set_channels(channels as u32)?;
            hwp.set_rate_near(rate, ValueOr::Nearest)?;
            let actual_rate = hwp.get_rate()?;
            if actual_rate != rate {
                error!(target: LOG_TARGET, "ALSA rate negotiation: requested={}, actual={}", rate, actual_rate);
                return Err(AudioError::AlsaError(format!(
                    "device '{}' does not support {} Hz (offered {} Hz)",
                    self.device_name, rate, actual_rate
                )));
            }
            pcm.hw_params(&hwp)?;
            debug!(target: LOG_TARGET, "ALSA hardware parameters applied.");

            let swp = pcm.sw_params_current()?;
            let buffer_size = hwp.get_buffer_size()?;
            let period_size = hwp.get_period_size()?;
            swp.set_start_threshold(buffer_size - period_size)?;
            pcm.sw_params(&swp)?;
            debug!(target: LOG_TARGET, "ALSA software parameters applied (buffer={}, period={}).", buffer_size, period_size);
            self.actual_rate = Some(actual_rate);
        }

        self.pcm = Some(pcm);
        self.channels = channels as usize;
        info!(target: LOG_TARGET, "ALSA initialized successfully.");
        Ok(())
    }

    /// Writes interleaved S16 samples, blocking until the device takes them.
    /// Returns `Ok(0)` when an underrun occurred and was recovered; the caller retries.
    pub fn write_s16_buffer(&self, buffer: &[i16]) -> Result<usize, AudioError> {
        let pcm = self
            .pcm
            .as_ref()
            .ok_or(AudioError::InvalidState("PCM not initialized for writing".to_string()))?;
        let io = pcm.io_i16()?;

        match io.writei(buffer) {
            Ok(frames_written) => Ok(frames_written),
            Err(e) if e.errno() == Errno::EPIPE => {
                warn!(target: LOG_TARGET, "ALSA buffer underrun (EPIPE), recovering.");
                match pcm.recover(libc::EPIPE, true) {
                    Ok(()) => Ok(0),
                    Err(recover_err) => {
                        error!(target: LOG_TARGET, "ALSA underrun recovery failed: {}", recover_err);
                        Err(AudioError::AlsaError(format!("ALSA recovery failed: {}", recover_err)))
                    }
                }
            }
            Err(e) => {
                error!(target: LOG_TARGET, "ALSA write error: {}", e);
                Err(AudioError::AlsaError(e.to_string()))
            }
        }
    }

    /// Frames written but not yet played by the hardware.
    pub fn delay(&self) -> u64 {
        self.pcm
            .as_ref()
            .and_then(|pcm| pcm.delay().ok())
            .map_or(0, |frames| frames.max(0) as u64)
    }

    pub fn pause(&self) -> Result<(), AudioError> {
        let pcm = self.pcm.as_ref().ok_or(AudioError::InvalidState("PCM not initialized for pausing".to_string()))?;
        match pcm.state() {
            PcmState::Running => {
                debug!(target: LOG_TARGET, "Pausing ALSA PCM device.");
                pcm.pause(true).map_err(|e| {
                    error!(target: LOG_TARGET, "Error pausing ALSA: {}", e);
                    AudioError::from(e)
                })
            }
            other_state => {
                debug!(target: LOG_TARGET, "ALSA in state {:?}, nothing to pause.", other_state);
                Ok(())
            }
        }
    }

    pub fn resume(&self) -> Result<(), AudioError> {
        let pcm = self.pcm.as_ref().ok_or(AudioError::InvalidState("PCM not initialized for resuming".to_string()))?;
        match pcm.state() {
            PcmState::Paused => {
                debug!(target: LOG_TARGET, "Resuming ALSA PCM device.");
                pcm.pause(false).map_err(|e| {
                    error!(target: LOG_TARGET, "Error resuming ALSA: {}", e);
                    AudioError::from(e)
                })
            }
            other_state => {
                debug!(target: LOG_TARGET, "ALSA in state {:?}, nothing to resume.", other_state);
                Ok(())
            }
        }
    }

    /// Stops the stream immediately and closes the device.
    pub fn close(&mut self) {
        if let Some(pcm) = self.pcm.take() {
            debug!(target: LOG_TARGET, "Closing ALSA PCM device (state: {:?})...", pcm.state());
            if pcm.state() == PcmState::Running || pcm.state() == PcmState::Prepared || pcm.state() == PcmState::Paused {
                if let Err(e) = pcm.drop() {
                    warn!(target: LOG_TARGET, "Error dropping ALSA buffer during close (ignored): {}", e);
                }
            }
            debug!(target: LOG_TARGET, "ALSA PCM closed.");
        }
        self.actual_rate = None;
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn get_actual_rate(&self) -> Option<u32> {
        self.actual_rate
    }
}

impl Drop for AlsaPcmHandler {
    fn drop(&mut self) {
        debug!(target: LOG_TARGET, "Dropping AlsaPcmHandler.");
        self.close();
    }
}
