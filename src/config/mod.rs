//! Configuration management

mod settings;
#[cfg(test)]
mod tests;

pub use settings::{ConfigError, PlayerConfig, Settings};
