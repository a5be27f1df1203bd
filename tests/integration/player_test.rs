//! Integration tests for the streaming player
//!
//! These tests drive the public player API against a virtual render clock.

use crate::test_utils::{let_tick, settle, sine, virtual_player};
use pcm_stream_player::audio::chunk_decoder::{encode_base64, encode_s16le};
use pcm_stream_player::audio::{AudioError, ChunkEncoding, OutputClock};
use pcm_stream_player::config::PlayerConfig;
use pcm_stream_player::{PlaybackState, PlayerEvent};
use std::error::Error;
use std::io::Cursor;

#[cfg(test)]
mod player_integration_tests {
    use super::*;

    fn mono_16k() -> PlayerConfig {
        PlayerConfig::default()
    }

    /// Three 100 ms chunks at 16 kHz: contiguous schedule, growing export, one finish.
    #[tokio::test(start_paused = true)]
    async fn test_streaming_session_end_to_end() -> Result<(), Box<dyn Error>> {
        let config = mono_16k();
        let (player, output) = virtual_player(config);
        let mut events = player.subscribe_events();
        let audio = sine(4800, 16000, 440.0, 0.5);

        let mut exported_sizes = Vec::new();
        for chunk in audio.chunks(1600) {
            let snapshot = player.feed(encode_s16le(chunk)).await?;
            exported_sizes.push(snapshot.len());
            let_tick(&config).await;
        }
        assert_eq!(exported_sizes, vec![44 + 3200, 44 + 6400, 44 + 9600]);

        player.set_done().await?;
        output.advance(4800);
        settle().await;

        let mut starts = Vec::new();
        let mut finished = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                PlayerEvent::BufferScheduled(b) => starts.push(b.start.frames()),
                PlayerEvent::StateChanged(PlaybackState::Finished) => finished += 1,
                _ => {}
            }
        }
        assert_eq!(starts, vec![0, 1600, 3200]);
        assert_eq!(finished, 1);

        // What was heard is exactly what was fed.
        let expected: Vec<f32> = audio.iter().map(|&s| s as f32 / 32768.0).collect();
        assert_eq!(output.captured(), expected);

        // The export decodes back to the fed samples.
        let snapshot = player.snapshot()?;
        let mut reader = hound::WavReader::new(Cursor::new(snapshot.bytes().to_vec()))?;
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.bits_per_sample, 16);
        let decoded: Vec<i16> = reader.samples::<i16>().collect::<Result<_, _>>()?;
        assert_eq!(decoded, audio);

        player.destroy().await?;
        Ok(())
    }

    /// A base64 producer interleaved with pause/resume keeps every sample.
    #[tokio::test(start_paused = true)]
    async fn test_base64_stream_with_pause() -> Result<(), Box<dyn Error>> {
        let config = PlayerConfig {
            channels: 2,
            sample_rate: 8000,
            flush_interval_ms: 50,
            chunk_encoding: ChunkEncoding::Base64,
        };
        let (player, output) = virtual_player(config);
        let left = sine(800, 8000, 200.0, 0.4);
        let right = sine(800, 8000, 300.0, 0.4);
        let interleaved: Vec<i16> = left.iter().zip(&right).flat_map(|(l, r)| [*l, *r]).collect();

        for (n, chunk) in interleaved.chunks(2 * 200).enumerate() {
            player.feed(encode_base64(&encode_s16le(chunk))).await?;
            if n == 1 {
                player.pause().await?;
                assert_eq!(output.advance(400), 0);
            }
            let_tick(&config).await;
        }
        assert_eq!(player.status().await?.state, PlaybackState::Paused);

        player.play().await?;
        player.set_done().await?;
        output.advance(800);
        settle().await;

        let expected: Vec<f32> = interleaved.iter().map(|&s| s as f32 / 32768.0).collect();
        assert_eq!(output.captured(), expected);
        assert_eq!(player.status().await?.state, PlaybackState::Finished);

        player.destroy().await?;
        Ok(())
    }

    /// Teardown closes the output and every later call fails.
    #[tokio::test(start_paused = true)]
    async fn test_teardown() -> Result<(), Box<dyn Error>> {
        let (player, output) = virtual_player(mono_16k());
        player.feed(encode_s16le(&[1; 320])).await?;

        player.destroy().await?;
        player.destroy().await?;
        assert!(output.is_closed());
        assert_eq!(output.current_time().frames(), 0);

        match player.feed(encode_s16le(&[1; 2])).await {
            Err(AudioError::InvalidState(_)) => {}
            other => panic!("expected InvalidState, got {:?}", other.map(|s| s.frame_count())),
        }
        assert!(player.status().await.is_err());
        Ok(())
    }

    /// Dropping the handle without destroy still stops the engine and closes the output.
    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_tears_down() {
        let (player, output) = virtual_player(mono_16k());
        drop(player);
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        assert!(output.is_closed());
    }
}
