//! Transcoder module for rasterizing video frames.
//!
//! This module provides the `Transcoder` trait and an FFmpeg implementation
//! that writes a bounded run of sampled, scaled frames per invocation.
//!
//! # Features
//!
//! - Fixed-rate sampling with aspect-preserving scaling to a tile width
//! - Exact frame count and start numbering per invocation
//! - Log line and statistics streaming while ffmpeg runs
//! - Media probing through ffprobe
//!
//! # Example
//!
//! ```ignore
//! use framestrip_core::transcoder::{ExtractionRequest, FfmpegTranscoder, Transcoder};
//!
//! let transcoder = FfmpegTranscoder::with_defaults();
//! transcoder.validate().await?;
//!
//! let info = transcoder.probe("/videos/clip.mp4").await?;
//! println!("Duration: {} seconds", info.duration_secs);
//!
//! let (tx, mut rx) = tokio::sync::mpsc::channel(64);
//! let summary = transcoder.execute(request, tx).await?;
//! println!("Wrote {} frames", summary.frames_written);
//! ```

mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use config::TranscoderConfig;
pub use error::TranscoderError;
pub use ffmpeg::FfmpegTranscoder;
pub use traits::Transcoder;
pub use types::{ExtractionRequest, MediaInfo, SessionSummary, StatsSample, TranscoderEvent};
