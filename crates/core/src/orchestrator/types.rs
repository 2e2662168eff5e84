//! Types for the frame-strip orchestrator.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::extraction::BatchFailure;
use crate::naming::FramePattern;
use crate::planner::{self, Batch, PlanError};
use crate::source::SourceVideo;
use crate::transcoder::StatsSample;

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Run parameters were rejected before anything was started.
    #[error("{0}")]
    InvalidInput(#[from] PlanError),

    /// A signal from a superseded run.
    #[error("stale signal: generation {signal_generation}, current {current_generation}")]
    StaleSignal {
        signal_generation: u64,
        current_generation: u64,
    },

    /// A terminal signal for a batch that is not the one in flight.
    #[error("unexpected batch: expected {expected}, got {actual}")]
    UnexpectedBatch { expected: usize, actual: usize },

    /// The run already reached a terminal state.
    #[error("run is not running (state: {state})")]
    NotRunning { state: RunState },

    /// Probing the picked video failed.
    #[error("failed to probe source: {0}")]
    Probe(#[from] crate::transcoder::TranscoderError),
}

/// Lifecycle of an extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Terminal failure of a run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("frame strip failed at batch {batch_index}: {failure}")]
pub struct RunFailure {
    pub generation: u64,
    pub batch_index: usize,
    pub failure: BatchFailure,
}

/// Final result of a run: every frame path in order, or why it failed.
pub type RunOutcome = Result<Vec<PathBuf>, RunFailure>;

/// Progress reported to the caller while a run is going.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Log { batch_index: usize, line: String },
    Stats { batch_index: usize, sample: StatsSample },
    /// A batch finished; its frames can be displayed.
    BatchCompleted {
        batch_index: usize,
        paths: Vec<PathBuf>,
    },
}

/// Caller side of a started run.
#[derive(Debug)]
pub struct RunHandle {
    pub generation: u64,
    /// Best-effort progress events.
    pub events: mpsc::Receiver<RunEvent>,
    /// Terminal result.
    pub outcome: oneshot::Receiver<RunOutcome>,
}

impl RunHandle {
    /// Waits for the terminal result; `None` if the run was superseded.
    pub async fn finish(self) -> Option<RunOutcome> {
        self.outcome.await.ok()
    }
}

/// One tile of the frame strip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameSlot {
    Pending,
    Ready(PathBuf),
}

/// Read-only view of the current run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub generation: u64,
    pub state: RunState,
    pub total_frames: usize,
    pub completed_batches: usize,
    pub slots: Vec<FrameSlot>,
}

impl RunSnapshot {
    pub fn idle() -> Self {
        Self {
            generation: 0,
            state: RunState::Idle,
            total_frames: 0,
            completed_batches: 0,
            slots: Vec::new(),
        }
    }

    /// Number of frames ready for display.
    pub fn ready_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, FrameSlot::Ready(_)))
            .count()
    }
}

/// What the orchestrator must do after a terminal batch signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Issue `next`; `batch_paths` were just produced.
    Next {
        batch_paths: Vec<PathBuf>,
        next: Batch,
    },
    /// The strip is complete.
    Completed {
        batch_paths: Vec<PathBuf>,
        paths: Vec<PathBuf>,
    },
    /// The run failed.
    Failed(RunFailure),
}

/// State of one end-to-end extraction attempt.
#[derive(Debug, Clone)]
pub struct ExtractionRun {
    generation: u64,
    source: SourceVideo,
    output_dir: PathBuf,
    total_frames: usize,
    batch_size: usize,
    batches: Vec<Batch>,
    current_batch_index: usize,
    produced_paths: Vec<PathBuf>,
    state: RunState,
}

impl ExtractionRun {
    /// Plans a run; it stays `Idle` until [`ExtractionRun::begin`].
    pub fn new(
        generation: u64,
        source: SourceVideo,
        total_frames: usize,
        batch_size: usize,
        output_dir: &Path,
    ) -> Result<Self, OrchestratorError> {
        let batches = planner::plan(total_frames, batch_size)?;

        Ok(Self {
            generation,
            source,
            output_dir: output_dir.to_path_buf(),
            total_frames,
            batch_size,
            batches,
            current_batch_index: 0,
            produced_paths: Vec::with_capacity(total_frames),
            state: RunState::Idle,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn source(&self) -> &SourceVideo {
        &self.source
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn current_batch_index(&self) -> usize {
        self.current_batch_index
    }

    pub fn produced_paths(&self) -> &[PathBuf] {
        &self.produced_paths
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Enters `Running` and returns the first batch to issue.
    pub fn begin(&mut self) -> Batch {
        self.state = RunState::Running;
        self.current_batch_index = 0;
        self.produced_paths.clear();
        self.batches[0]
    }

    /// Paths written by the batch at `index`.
    pub fn batch_paths(&self, index: usize) -> Vec<PathBuf> {
        match self.batches.get(index) {
            Some(batch) => FramePattern::new(
                &self.output_dir,
                &self.source.base_name,
                batch.index,
                batch.start_frame,
            )
            .frame_paths(batch.frame_count),
            None => Vec::new(),
        }
    }

    /// Checks that a terminal signal belongs to the batch in flight.
    fn accept(&self, generation: u64, batch_index: usize) -> Result<(), OrchestratorError> {
        if generation != self.generation {
            return Err(OrchestratorError::StaleSignal {
                signal_generation: generation,
                current_generation: self.generation,
            });
        }
        if self.state != RunState::Running {
            return Err(OrchestratorError::NotRunning { state: self.state });
        }
        if batch_index != self.current_batch_index {
            return Err(OrchestratorError::UnexpectedBatch {
                expected: self.current_batch_index,
                actual: batch_index,
            });
        }
        Ok(())
    }

    /// Applies a successful batch completion.
    pub fn on_batch_complete(
        &mut self,
        generation: u64,
        batch_index: usize,
    ) -> Result<Transition, OrchestratorError> {
        self.accept(generation, batch_index)?;

        let batch_paths = self.batch_paths(batch_index);
        self.produced_paths.extend(batch_paths.iter().cloned());

        if self.current_batch_index + 1 == self.batches.len() {
            self.state = RunState::Completed;
            return Ok(Transition::Completed {
                batch_paths,
                paths: self.produced_paths.clone(),
            });
        }

        self.current_batch_index += 1;
        Ok(Transition::Next {
            batch_paths,
            next: self.batches[self.current_batch_index],
        })
    }

    /// Applies a batch failure; the whole run fails.
    pub fn on_batch_error(
        &mut self,
        generation: u64,
        batch_index: usize,
        failure: BatchFailure,
    ) -> Result<Transition, OrchestratorError> {
        self.accept(generation, batch_index)?;

        self.state = RunState::Failed;
        // All-or-nothing: earlier batches are not part of the result
        self.produced_paths.clear();
        Ok(Transition::Failed(RunFailure {
            generation,
            batch_index,
            failure,
        }))
    }

    /// Read-only view with a slot per frame.
    pub fn snapshot(&self) -> RunSnapshot {
        let mut slots: Vec<FrameSlot> = self
            .produced_paths
            .iter()
            .cloned()
            .map(FrameSlot::Ready)
            .collect();
        slots.resize(self.total_frames, FrameSlot::Pending);

        let completed_batches = match self.state {
            RunState::Completed => self.batches.len(),
            RunState::Running => self.current_batch_index,
            RunState::Idle | RunState::Failed => 0,
        };

        RunSnapshot {
            generation: self.generation,
            state: self.state,
            total_frames: self.total_frames,
            completed_batches,
            slots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(total: usize) -> ExtractionRun {
        ExtractionRun::new(
            4,
            SourceVideo::new("/videos/clip.mp4", total as f64),
            total,
            50,
            Path::new("/cache"),
        )
        .unwrap()
    }

    fn process_failure() -> BatchFailure {
        BatchFailure::Process {
            reason: "exit 1".to_string(),
            stderr: None,
        }
    }

    #[test]
    fn test_new_run_is_idle() {
        let run = run(125);
        assert_eq!(run.state(), RunState::Idle);
        assert_eq!(run.batches().len(), 3);
        assert!(run.produced_paths().is_empty());
    }

    #[test]
    fn test_invalid_input() {
        let err = ExtractionRun::new(
            1,
            SourceVideo::new("/videos/clip.mp4", 0.0),
            0,
            50,
            Path::new("/cache"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::InvalidInput(PlanError::ZeroFrames)
        ));
    }

    #[test]
    fn test_full_progression() {
        let mut run = run(125);
        let first = run.begin();
        assert_eq!(first.index, 0);

        match run.on_batch_complete(4, 0).unwrap() {
            Transition::Next { batch_paths, next } => {
                assert_eq!(batch_paths.len(), 50);
                assert_eq!(next.index, 1);
            }
            other => panic!("unexpected transition {:?}", other),
        }
        assert!(matches!(
            run.on_batch_complete(4, 1).unwrap(),
            Transition::Next { .. }
        ));

        match run.on_batch_complete(4, 2).unwrap() {
            Transition::Completed { batch_paths, paths } => {
                assert_eq!(batch_paths.len(), 25);
                assert_eq!(paths.len(), 125);
                assert_eq!(paths[0], PathBuf::from("/cache/clip_0_0000.png"));
                assert_eq!(paths[124], PathBuf::from("/cache/clip_2_0124.png"));
            }
            other => panic!("unexpected transition {:?}", other),
        }
        assert_eq!(run.state(), RunState::Completed);
        assert_eq!(run.produced_paths().len(), 125);
    }

    #[test]
    fn test_failure_is_terminal() {
        let mut run = run(125);
        run.begin();
        run.on_batch_complete(4, 0).unwrap();

        let transition = run.on_batch_error(4, 1, process_failure()).unwrap();
        assert!(matches!(
            transition,
            Transition::Failed(RunFailure { batch_index: 1, .. })
        ));
        assert_eq!(run.state(), RunState::Failed);
        assert!(run.produced_paths().is_empty());

        // Nothing moves a failed run
        let err = run.on_batch_complete(4, 1).unwrap_err();
        assert!(matches!(err, OrchestratorError::NotRunning { .. }));
    }

    #[test]
    fn test_stale_generation_rejected() {
        let mut run = run(125);
        run.begin();

        let err = run.on_batch_complete(3, 0).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::StaleSignal {
                signal_generation: 3,
                current_generation: 4
            }
        ));
        let err = run.on_batch_error(3, 0, process_failure()).unwrap_err();
        assert!(matches!(err, OrchestratorError::StaleSignal { .. }));

        assert_eq!(run.state(), RunState::Running);
        assert!(run.produced_paths().is_empty());
    }

    #[test]
    fn test_unexpected_batch_rejected() {
        let mut run = run(125);
        run.begin();

        let err = run.on_batch_complete(4, 2).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::UnexpectedBatch {
                expected: 0,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_snapshot_slots() {
        let mut run = run(60);
        assert_eq!(run.snapshot().slots.len(), 60);

        run.begin();
        run.on_batch_complete(4, 0).unwrap();

        let snapshot = run.snapshot();
        assert_eq!(snapshot.state, RunState::Running);
        assert_eq!(snapshot.completed_batches, 1);
        assert_eq!(snapshot.ready_count(), 50);
        assert_eq!(snapshot.slots[50], FrameSlot::Pending);
    }

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::NotRunning {
            state: RunState::Completed,
        };
        assert_eq!(err.to_string(), "run is not running (state: completed)");

        let failure = RunFailure {
            generation: 1,
            batch_index: 1,
            failure: process_failure(),
        };
        assert_eq!(
            failure.to_string(),
            "frame strip failed at batch 1: transcoder failed: exit 1"
        );
    }
}
