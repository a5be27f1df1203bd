//! Main integration test entry point for pcm-stream-player
//!
//! This file serves as the entry point for all integration tests.

// Import the individual test modules
mod integration;
