//! Types for the transcoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// One frame-extraction invocation of the transcoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    /// Identifier used to correlate logs of this invocation.
    pub session_id: Uuid,
    /// Source locator (path or URL) handed to the transcoder.
    pub source: String,
    /// Input seek offset in seconds.
    pub seek_secs: f64,
    /// Sampling rate in frames per second.
    pub frames_per_sec: u32,
    /// Output width in pixels; height follows the aspect ratio.
    pub tile_width: u32,
    /// Exact number of frames to write.
    pub frame_limit: usize,
    /// Number given to the first output file.
    pub start_number: usize,
    /// Output path pattern with a sequence placeholder.
    pub output_pattern: PathBuf,
}

impl ExtractionRequest {
    /// Filter graph sampling at the configured rate and scaling to the tile width.
    ///
    /// A height of `-2` keeps the aspect ratio with an even result.
    pub fn video_filter(&self) -> String {
        format!(
            "fps={}/1:round=up,scale={}:-2",
            self.frames_per_sec, self.tile_width
        )
    }
}

/// A periodic statistics sample reported by the transcoder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSample {
    /// Frames written so far.
    pub frame: u64,
    /// Current processing rate in frames per second.
    pub fps: Option<f32>,
    /// Output timestamp reached, in seconds.
    pub time_secs: f64,
    /// Processing speed relative to realtime (e.g. "4.2x").
    pub speed: Option<String>,
    /// Whether the transcoder reported the end of processing.
    pub finished: bool,
}

/// Diagnostic output of a running invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TranscoderEvent {
    /// A raw log line.
    Log(String),
    /// A statistics sample.
    Stats(StatsSample),
}

/// Result of a successful invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    /// Frames the transcoder reported as written.
    pub frames_written: u64,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
}

/// Information about a media file, as reported by ffprobe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Locator that was probed.
    pub source: String,
    /// Container format.
    pub format: String,
    /// Duration in seconds.
    pub duration_secs: f64,
    pub video_codec: Option<String>,
    pub video_width: Option<u32>,
    pub video_height: Option<u32>,
    pub video_fps: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_filter() {
        let request = ExtractionRequest {
            session_id: Uuid::nil(),
            source: "/videos/clip.mp4".to_string(),
            seek_secs: 0.0,
            frames_per_sec: 1,
            tile_width: 60,
            frame_limit: 50,
            start_number: 0,
            output_pattern: PathBuf::from("/cache/clip_0_%04d.png"),
        };
        assert_eq!(request.video_filter(), "fps=1/1:round=up,scale=60:-2");
    }

    #[test]
    fn test_event_serialization() {
        let event = TranscoderEvent::Stats(StatsSample {
            frame: 12,
            fps: Some(30.0),
            time_secs: 12.0,
            speed: Some("8x".to_string()),
            finished: false,
        });
        let json = serde_json::to_string(&event).unwrap();
        let parsed: TranscoderEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
