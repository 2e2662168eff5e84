//! Extraction settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::planner::DEFAULT_BATCH_SIZE;

/// Frames sampled per second of video.
pub const FRAME_PER_SEC: u32 = 1;

/// Width of a frame tile in pixels.
pub const TILE_WIDTH: u32 = 60;

/// Where each invocation starts reading the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekPolicy {
    /// Every invocation starts at offset 0.
    #[default]
    FromStart,
    /// Each invocation seeks to the timestamp of its first frame.
    BatchOffset,
}

/// Configuration for frame extraction runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Frames requested per transcoder invocation.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Sampling rate.
    #[serde(default = "default_frames_per_sec")]
    pub frames_per_sec: u32,

    /// Output tile width; height keeps the aspect ratio.
    #[serde(default = "default_tile_width")]
    pub tile_width: u32,

    /// Directory frames are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub seek_policy: SeekPolicy,

    /// Capacity of the caller's event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_frames_per_sec() -> u32 {
    FRAME_PER_SEC
}

fn default_tile_width() -> u32 {
    TILE_WIDTH
}

fn default_output_dir() -> PathBuf {
    std::env::temp_dir().join("framestrip")
}

fn default_event_buffer() -> usize {
    256
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            frames_per_sec: default_frames_per_sec(),
            tile_width: default_tile_width(),
            output_dir: default_output_dir(),
            seek_policy: SeekPolicy::default(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl ExtractionConfig {
    /// Sets the output directory.
    pub fn with_output_dir(mut self, output_dir: PathBuf) -> Self {
        self.output_dir = output_dir;
        self
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExtractionConfig::default();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.frames_per_sec, 1);
        assert_eq!(config.tile_width, 60);
        assert_eq!(config.seek_policy, SeekPolicy::FromStart);
        assert!(config.output_dir.ends_with("framestrip"));
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: ExtractionConfig = toml::from_str("batch_size = 20").unwrap();
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.tile_width, 60);
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            batch_size = 10
            frames_per_sec = 2
            tile_width = 120
            output_dir = "/tmp/strips"
            seek_policy = "batch_offset"
            event_buffer = 16
        "#;
        let config: ExtractionConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.frames_per_sec, 2);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/strips"));
        assert_eq!(config.seek_policy, SeekPolicy::BatchOffset);
        assert_eq!(config.event_buffer, 16);
    }
}
