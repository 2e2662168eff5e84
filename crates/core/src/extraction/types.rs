//! Signals emitted by an extraction session.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transcoder::{SessionSummary, StatsSample, TranscoderError};

/// Why a batch failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchFailure {
    /// The transcoder process could not be started.
    #[error("transcoder could not be launched: {reason}")]
    Launch { reason: String },

    /// The transcoder started but did not finish successfully.
    #[error("transcoder failed: {reason}")]
    Process {
        reason: String,
        stderr: Option<String>,
    },
}

impl BatchFailure {
    /// Metric label of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Launch { .. } => "launch",
            Self::Process { .. } => "process",
        }
    }
}

impl From<TranscoderError> for BatchFailure {
    fn from(err: TranscoderError) -> Self {
        if err.is_launch_failure() {
            return Self::Launch {
                reason: err.to_string(),
            };
        }
        let stderr = err.stderr().map(String::from);
        Self::Process {
            reason: err.to_string(),
            stderr,
        }
    }
}

/// A notification from the session, tagged with the run generation that
/// issued the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionSignal {
    Log {
        generation: u64,
        batch_index: usize,
        line: String,
    },
    Stats {
        generation: u64,
        batch_index: usize,
        sample: StatsSample,
    },
    BatchComplete {
        generation: u64,
        batch_index: usize,
        summary: SessionSummary,
    },
    BatchError {
        generation: u64,
        batch_index: usize,
        failure: BatchFailure,
    },
}

impl SessionSignal {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Log { generation, .. }
            | Self::Stats { generation, .. }
            | Self::BatchComplete { generation, .. }
            | Self::BatchError { generation, .. } => *generation,
        }
    }

    pub fn batch_index(&self) -> usize {
        match self {
            Self::Log { batch_index, .. }
            | Self::Stats { batch_index, .. }
            | Self::BatchComplete { batch_index, .. }
            | Self::BatchError { batch_index, .. } => *batch_index,
        }
    }

    /// Whether this signal ends its batch.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::BatchComplete { .. } | Self::BatchError { .. })
    }
}
