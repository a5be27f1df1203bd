//! Integration tests module
//!
//! This module organizes all integration tests for the pcm-stream-player crate.

// Import individual test modules
pub mod config_test;
pub mod container_test;
pub mod player_test;
