//! Splits a frame strip into transcoder batches.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of frames requested per transcoder invocation.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// A contiguous range of frames requested in one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Position of the batch in the plan.
    pub index: usize,
    /// Global 0-based index of the first frame.
    pub start_frame: usize,
    /// Number of frames in the batch (always > 0).
    pub frame_count: usize,
}

impl Batch {
    /// Global index one past the last frame of the batch.
    pub fn end_frame(&self) -> usize {
        self.start_frame + self.frame_count
    }
}

/// Rejected plan parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("invalid input: total frame count must be positive")]
    ZeroFrames,

    #[error("invalid input: batch size must be positive")]
    ZeroBatchSize,
}

/// Computes the ordered batches covering `total_frames` frames.
pub fn plan(total_frames: usize, batch_size: usize) -> Result<Vec<Batch>, PlanError> {
    if total_frames == 0 {
        return Err(PlanError::ZeroFrames);
    }
    if batch_size == 0 {
        return Err(PlanError::ZeroBatchSize);
    }

    Ok((0..total_frames.div_ceil(batch_size))
        .map(|index| {
            let start_frame = index * batch_size;
            Batch {
                index,
                start_frame,
                frame_count: batch_size.min(total_frames - start_frame),
            }
        })
        .collect())
}
