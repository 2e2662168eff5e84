//! Frame-strip orchestrator.
//!
//! Splits a video into batches and drives them through an
//! [`ExtractionSession`](crate::extraction::ExtractionSession) one after
//! another, reporting progress and a single terminal outcome per run.

mod runner;
mod types;

pub use runner::FrameStripOrchestrator;
pub use types::{
    ExtractionRun, FrameSlot, OrchestratorError, RunEvent, RunFailure, RunHandle, RunOutcome,
    RunSnapshot, RunState, Transition,
};
