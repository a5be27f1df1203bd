//! Streaming PCM playback engine: chunk decoding, sample buffering, container
//! export and gapless scheduling onto a render clock.

#[cfg(feature = "alsa-output")]
mod alsa_handler;
#[cfg(feature = "alsa-output")]
mod alsa_output;
pub mod chunk_decoder;
pub mod container;
pub mod error;
pub mod gain;
pub mod output;
pub mod sample_buffer;
pub mod scheduler;
pub mod virtual_output;

#[cfg(feature = "alsa-output")]
pub use alsa_output::AlsaOutput;
pub use chunk_decoder::{ChunkDecoder, ChunkEncoding};
pub use container::{ContainerEncoder, ContainerFormat, ContainerSnapshot};
pub use error::AudioError;
pub use gain::GainController;
pub use output::{BufferId, ClockTime, OutputClock, OutputContext, PlayableBuffer};
pub use sample_buffer::SampleBuffer;
pub use scheduler::{PlaybackScheduler, ScheduledBuffer};
pub use virtual_output::VirtualOutput;
