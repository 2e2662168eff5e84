//! Error types for the transcoder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running the external transcoder.
#[derive(Debug, Error)]
pub enum TranscoderError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// The process could not be spawned for a reason other than a missing binary.
    #[error("Failed to launch {program}: {reason}")]
    LaunchFailed { program: String, reason: String },

    /// Source file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Output directory does not exist and could not be created.
    #[error("Failed to create output directory: {path}")]
    OutputDirectoryFailed { path: PathBuf },

    /// The transcoder started but finished with a failure.
    #[error("Transcoder failed: {reason}")]
    ProcessFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// The invocation exceeded its time budget and was killed.
    #[error("Transcoder timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Failed to probe media file.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// I/O error while talking to the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse FFprobe output.
    #[error("Failed to parse media info: {reason}")]
    ParseError { reason: String },
}

impl TranscoderError {
    /// Creates a new process failed error with stderr output.
    pub fn process_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ProcessFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a new probe failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Creates a new launch failed error.
    pub fn launch_failed(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LaunchFailed {
            program: program.into(),
            reason: reason.into(),
        }
    }

    /// Whether the process never started.
    pub fn is_launch_failure(&self) -> bool {
        matches!(
            self,
            Self::FfmpegNotFound { .. }
                | Self::FfprobeNotFound { .. }
                | Self::LaunchFailed { .. }
                | Self::OutputDirectoryFailed { .. }
        )
    }

    /// Captured error output, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ProcessFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}
