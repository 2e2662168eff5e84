//! Frame-strip orchestrator implementation.
//!
//! Runs one extraction at a time. Batches are chained strictly in order: the
//! terminal signal of batch `i` is the only thing that issues batch `i + 1`.
//! All session signals arrive on one channel and are matched against the
//! generation of the current run, so a superseded run can never touch the
//! state of its successor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tracing::{debug, error, info, warn};

use crate::extraction::{ExtractionConfig, ExtractionSession, SessionSignal};
use crate::metrics;
use crate::source::{SourceVideo, VideoPick};
use crate::transcoder::Transcoder;

use super::types::{
    ExtractionRun, OrchestratorError, RunEvent, RunHandle, RunOutcome, RunSnapshot, RunState,
    Transition,
};

/// Capacity of the channel carrying session signals to the driver.
const SIGNAL_BUFFER: usize = 256;

/// The run currently owned by the orchestrator, with its caller channels.
struct ActiveRun {
    run: ExtractionRun,
    events: mpsc::Sender<RunEvent>,
    outcome: Option<oneshot::Sender<RunOutcome>>,
}

impl ActiveRun {
    fn emit(&self, event: RunEvent) {
        if let Err(e) = self.events.try_send(event) {
            debug!(generation = self.run.generation(), "Dropped run event: {}", e);
        }
    }

    fn deliver(&mut self, outcome: RunOutcome) {
        if let Some(tx) = self.outcome.take() {
            if tx.send(outcome).is_err() {
                debug!(generation = self.run.generation(), "Caller dropped the run handle");
            }
        }
    }
}

/// State shared between the orchestrator and its signal driver.
struct Shared<T: Transcoder> {
    session: ExtractionSession<T>,
    generation: AtomicU64,
    active: Mutex<Option<ActiveRun>>,
    signal_tx: mpsc::Sender<SessionSignal>,
}

impl<T: Transcoder + 'static> Shared<T> {
    async fn handle_signal(&self, signal: SessionSignal) {
        let mut guard = self.active.lock().await;
        let Some(active) = guard.as_mut() else {
            metrics::STALE_SIGNALS.inc();
            debug!(
                generation = signal.generation(),
                batch = signal.batch_index(),
                "Ignoring signal with no run"
            );
            return;
        };

        let current = active.run.generation();
        match signal {
            SessionSignal::Log {
                generation,
                batch_index,
                line,
            } => {
                if generation == current {
                    active.emit(RunEvent::Log { batch_index, line });
                } else {
                    metrics::STALE_SIGNALS.inc();
                }
            }
            SessionSignal::Stats {
                generation,
                batch_index,
                sample,
            } => {
                if generation == current {
                    active.emit(RunEvent::Stats {
                        batch_index,
                        sample,
                    });
                } else {
                    metrics::STALE_SIGNALS.inc();
                }
            }
            SessionSignal::BatchComplete {
                generation,
                batch_index,
                ..
            } => match active.run.on_batch_complete(generation, batch_index) {
                Ok(transition) => self.apply(active, transition),
                Err(e) => Self::drop_stale(&e, "batch complete"),
            },
            SessionSignal::BatchError {
                generation,
                batch_index,
                failure,
            } => match active.run.on_batch_error(generation, batch_index, failure) {
                Ok(transition) => self.apply(active, transition),
                Err(e) => Self::drop_stale(&e, "batch error"),
            },
        }
    }

    fn apply(&self, active: &mut ActiveRun, transition: Transition) {
        let generation = active.run.generation();
        match transition {
            Transition::Next { batch_paths, next } => {
                active.emit(RunEvent::BatchCompleted {
                    batch_index: next.index - 1,
                    paths: batch_paths,
                });
                self.session.issue(
                    generation,
                    active.run.source(),
                    next,
                    self.signal_tx.clone(),
                );
            }
            Transition::Completed { batch_paths, paths } => {
                let last = active.run.batches().len() - 1;
                active.emit(RunEvent::BatchCompleted {
                    batch_index: last,
                    paths: batch_paths,
                });
                info!(
                    generation,
                    frames = paths.len(),
                    "Frame strip completed for {}",
                    active.run.source().locator
                );
                metrics::RUNS_FINISHED.with_label_values(&["completed"]).inc();
                metrics::FRAMES_PRODUCED.inc_by(paths.len() as u64);
                active.deliver(Ok(paths));
            }
            Transition::Failed(failure) => {
                error!(generation, "{}", failure);
                metrics::RUNS_FINISHED.with_label_values(&["failed"]).inc();
                active.deliver(Err(failure));
            }
        }
    }

    fn drop_stale(err: &OrchestratorError, what: &str) {
        metrics::STALE_SIGNALS.inc();
        debug!("Ignoring {} signal: {}", what, err);
    }
}

/// Drives frame-strip runs through the extraction session.
pub struct FrameStripOrchestrator<T: Transcoder + 'static> {
    shared: Arc<Shared<T>>,
    signal_rx: Mutex<Option<mpsc::Receiver<SessionSignal>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl<T: Transcoder + 'static> FrameStripOrchestrator<T> {
    /// Create a new orchestrator.
    pub fn new(config: ExtractionConfig, transcoder: T) -> Self {
        Self::with_session(ExtractionSession::new(config, transcoder))
    }

    /// Create an orchestrator around an existing session.
    pub fn with_session(session: ExtractionSession<T>) -> Self {
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_BUFFER);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            shared: Arc::new(Shared {
                session,
                generation: AtomicU64::new(0),
                active: Mutex::new(None),
                signal_tx,
            }),
            signal_rx: Mutex::new(Some(signal_rx)),
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        self.shared.session.config()
    }

    pub fn transcoder(&self) -> &Arc<T> {
        self.shared.session.transcoder()
    }

    /// Generation of the most recently started run (0 before the first).
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// Starts extracting `total_frames` frames of `source`.
    ///
    /// Any run in progress is superseded: its handle never receives an
    /// outcome and its pending signals are ignored. Invalid parameters are
    /// rejected without touching the current run.
    pub async fn start(
        &self,
        source: SourceVideo,
        total_frames: usize,
    ) -> Result<RunHandle, OrchestratorError> {
        self.spawn_driver().await;

        let config = self.shared.session.config();
        let mut guard = self.shared.active.lock().await;

        let generation = self.shared.generation.load(Ordering::SeqCst) + 1;
        let mut run = ExtractionRun::new(
            generation,
            source,
            total_frames,
            config.batch_size,
            &config.output_dir,
        )?;
        self.shared.generation.store(generation, Ordering::SeqCst);

        let first = run.begin();
        let (events_tx, events_rx) = mpsc::channel(config.event_buffer.max(1));
        let (outcome_tx, outcome_rx) = oneshot::channel();

        info!(
            generation,
            total_frames,
            batches = run.batches().len(),
            "Starting frame strip for {}",
            run.source().locator
        );

        let previous = guard.replace(ActiveRun {
            run,
            events: events_tx,
            outcome: Some(outcome_tx),
        });
        if let Some(previous) = previous {
            if previous.run.state() == RunState::Running {
                warn!(
                    superseded = previous.run.generation(),
                    "Superseding run still in progress"
                );
            }
        }

        if let Some(active) = guard.as_ref() {
            self.shared.session.issue(
                generation,
                active.run.source(),
                first,
                self.shared.signal_tx.clone(),
            );
        }
        metrics::RUNS_STARTED.inc();

        Ok(RunHandle {
            generation,
            events: events_rx,
            outcome: outcome_rx,
        })
    }

    /// Starts a run for a picker result, probing the video for its length.
    ///
    /// A cancelled or empty pick starts nothing and returns `Ok(None)`.
    pub async fn start_from_pick(
        &self,
        pick: &VideoPick,
    ) -> Result<Option<RunHandle>, OrchestratorError> {
        let Some(locator) = pick.locator() else {
            debug!("Video selection cancelled");
            return Ok(None);
        };

        let info = self.shared.session.transcoder().probe(locator).await?;
        let source = SourceVideo::new(locator, info.duration_secs);
        let total_frames = source.frame_count(self.config().frames_per_sec);

        self.start(source, total_frames).await.map(Some)
    }

    /// Feeds a session signal to the state machine.
    ///
    /// The driver task calls this for every signal it receives.
    pub async fn handle_signal(&self, signal: SessionSignal) {
        self.shared.handle_signal(signal).await;
    }

    /// State of the current run.
    pub async fn state(&self) -> RunState {
        self.shared
            .active
            .lock()
            .await
            .as_ref()
            .map(|a| a.run.state())
            .unwrap_or_default()
    }

    /// Read-only view of the current run.
    pub async fn snapshot(&self) -> RunSnapshot {
        self.shared
            .active
            .lock()
            .await
            .as_ref()
            .map(|a| a.run.snapshot())
            .unwrap_or_else(RunSnapshot::idle)
    }

    /// Spawns the signal driver on first use.
    async fn spawn_driver(&self) {
        let Some(mut signal_rx) = self.signal_rx.lock().await.take() else {
            return;
        };

        let shared = Arc::clone(&self.shared);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            debug!("Signal driver started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    signal = signal_rx.recv() => match signal {
                        Some(signal) => shared.handle_signal(signal).await,
                        None => break,
                    },
                }
            }
            debug!("Signal driver stopped");
        });
    }
}

impl<T: Transcoder + 'static> Drop for FrameStripOrchestrator<T> {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}
