//! Testing utilities and mock implementations.
//!
//! This module provides a mock transcoder so extraction runs can be exercised
//! end to end without an ffmpeg binary.
//!
//! # Example
//!
//! ```rust,ignore
//! use framestrip_core::testing::{fixtures, MockTranscoder};
//!
//! let transcoder = MockTranscoder::new();
//! transcoder.fail_invocation(2, TranscoderError::process_failed("boom", None)).await;
//!
//! let orchestrator = FrameStripOrchestrator::new(fixtures::extraction_config(dir), transcoder.clone());
//! ```

mod mock_transcoder;

pub use mock_transcoder::{MockTranscoder, RecordedInvocation};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use crate::extraction::ExtractionConfig;
    use crate::source::SourceVideo;

    /// A source video with a predictable base name.
    pub fn source_video(name: &str, duration_secs: f64) -> SourceVideo {
        SourceVideo::new(format!("/videos/{}.mp4", name), duration_secs)
    }

    /// Extraction settings writing into `output_dir` with the default batch size.
    pub fn extraction_config(output_dir: &Path) -> ExtractionConfig {
        ExtractionConfig::default().with_output_dir(output_dir.to_path_buf())
    }
}
