//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Runs (started, finished by result, frames produced)
//! - Batches (invocations by result, invocation duration)
//! - Stale signals dropped by the orchestrator

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Run Metrics
// =============================================================================

/// Runs started total.
pub static RUNS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("framestrip_runs_started_total", "Total extraction runs started").unwrap()
});

/// Runs finished total by result.
pub static RUNS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "framestrip_runs_finished_total",
            "Total extraction runs that reached a terminal state",
        ),
        &["result"], // "completed", "failed"
    )
    .unwrap()
});

/// Frames delivered by completed runs.
pub static FRAMES_PRODUCED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "framestrip_frames_produced_total",
        "Total frame paths delivered by completed runs",
    )
    .unwrap()
});

// =============================================================================
// Batch Metrics
// =============================================================================

/// Transcoder invocations total by result.
pub static BATCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("framestrip_batches_total", "Total batch invocations"),
        &["result"], // "success", "launch", "process"
    )
    .unwrap()
});

/// Invocation duration in seconds.
pub static BATCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "framestrip_batch_duration_seconds",
            "Duration of a single transcoder invocation",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["result"],
    )
    .unwrap()
});

/// Signals dropped because their run was superseded.
pub static STALE_SIGNALS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "framestrip_stale_signals_total",
        "Session signals ignored because they belong to a superseded run",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Runs
        Box::new(RUNS_STARTED.clone()),
        Box::new(RUNS_FINISHED.clone()),
        Box::new(FRAMES_PRODUCED.clone()),
        // Batches
        Box::new(BATCHES_TOTAL.clone()),
        Box::new(BATCH_DURATION.clone()),
        Box::new(STALE_SIGNALS.clone()),
    ]
}
