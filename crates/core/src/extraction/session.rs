//! One transcoder invocation per batch.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::metrics;
use crate::naming::FramePattern;
use crate::planner::Batch;
use crate::source::SourceVideo;
use crate::transcoder::{ExtractionRequest, Transcoder, TranscoderEvent};

use super::config::{ExtractionConfig, SeekPolicy};
use super::types::{BatchFailure, SessionSignal};

/// Buffer between the transcoder and the signal forwarder.
const TRANSCODER_EVENT_BUFFER: usize = 64;

/// Issues batches to the transcoder, at most one at a time.
///
/// Every batch ends with exactly one terminal signal on the channel given to
/// [`ExtractionSession::issue`]; log and stats signals of that batch are
/// always delivered before it.
pub struct ExtractionSession<T: Transcoder> {
    config: ExtractionConfig,
    transcoder: Arc<T>,
    permit: Arc<Semaphore>,
}

impl<T: Transcoder + 'static> ExtractionSession<T> {
    /// Creates a session driving `transcoder`.
    pub fn new(config: ExtractionConfig, transcoder: T) -> Self {
        Self::from_arc(config, Arc::new(transcoder))
    }

    /// Creates a session sharing an existing transcoder.
    pub fn from_arc(config: ExtractionConfig, transcoder: Arc<T>) -> Self {
        Self {
            config,
            transcoder,
            permit: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn transcoder(&self) -> &Arc<T> {
        &self.transcoder
    }

    /// Whether an invocation is currently running.
    pub fn is_pending(&self) -> bool {
        self.permit.available_permits() == 0
    }

    /// Output pattern of `batch`.
    pub fn frame_pattern(&self, source: &SourceVideo, batch: &Batch) -> FramePattern {
        FramePattern::new(
            &self.config.output_dir,
            &source.base_name,
            batch.index,
            batch.start_frame,
        )
    }

    /// Builds the invocation parameters of `batch`.
    pub fn build_request(&self, source: &SourceVideo, batch: &Batch) -> ExtractionRequest {
        let seek_secs = match self.config.seek_policy {
            SeekPolicy::FromStart => 0.0,
            SeekPolicy::BatchOffset => {
                batch.start_frame as f64 / f64::from(self.config.frames_per_sec.max(1))
            }
        };

        ExtractionRequest {
            session_id: Uuid::new_v4(),
            source: source.locator.clone(),
            seek_secs,
            frames_per_sec: self.config.frames_per_sec,
            tile_width: self.config.tile_width,
            frame_limit: batch.frame_count,
            start_number: batch.start_frame,
            output_pattern: self.frame_pattern(source, batch).output_arg(),
        }
    }

    /// Starts the invocation for `batch` and returns its parameters.
    ///
    /// Never blocks: the invocation runs on a spawned task which first waits
    /// for any pending invocation to finish.
    pub fn issue(
        &self,
        generation: u64,
        source: &SourceVideo,
        batch: Batch,
        signals: mpsc::Sender<SessionSignal>,
    ) -> ExtractionRequest {
        let request = self.build_request(source, &batch);
        let transcoder = Arc::clone(&self.transcoder);
        let permit = Arc::clone(&self.permit);
        let spawned = request.clone();

        debug!(
            generation,
            batch = batch.index,
            start_frame = batch.start_frame,
            frame_count = batch.frame_count,
            session_id = %request.session_id,
            "Issuing batch"
        );

        tokio::spawn(async move {
            let batch_index = batch.index;
            let session_id = spawned.session_id;

            let permit = match permit.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    let _ = signals
                        .send(SessionSignal::BatchError {
                            generation,
                            batch_index,
                            failure: BatchFailure::Launch {
                                reason: e.to_string(),
                            },
                        })
                        .await;
                    return;
                }
            };

            let (event_tx, mut event_rx) = mpsc::channel(TRANSCODER_EVENT_BUFFER);
            let forward_to = signals.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(event) = event_rx.recv().await {
                    let signal = match event {
                        TranscoderEvent::Log(line) => SessionSignal::Log {
                            generation,
                            batch_index,
                            line,
                        },
                        TranscoderEvent::Stats(sample) => SessionSignal::Stats {
                            generation,
                            batch_index,
                            sample,
                        },
                    };
                    if forward_to.send(signal).await.is_err() {
                        break;
                    }
                }
            });

            let started = Instant::now();
            let result = transcoder.execute(spawned, event_tx).await;
            let elapsed = started.elapsed().as_secs_f64();

            // The sender went with `execute`, so the forwarder drains and exits
            if let Err(e) = forwarder.await {
                warn!(session_id = %session_id, "Event forwarder ended abnormally: {}", e);
            }
            drop(permit);

            // A clean exit that wrote fewer frames than asked for still fails the batch
            let result = result.map_err(BatchFailure::from).and_then(|summary| {
                if summary.frames_written < batch.frame_count as u64 {
                    Err(BatchFailure::Process {
                        reason: format!(
                            "transcoder wrote {} of {} frames",
                            summary.frames_written, batch.frame_count
                        ),
                        stderr: None,
                    })
                } else {
                    Ok(summary)
                }
            });

            let signal = match result {
                Ok(summary) => {
                    metrics::BATCHES_TOTAL.with_label_values(&["success"]).inc();
                    metrics::BATCH_DURATION
                        .with_label_values(&["success"])
                        .observe(elapsed);
                    info!(
                        generation,
                        batch = batch_index,
                        session_id = %session_id,
                        frames = summary.frames_written,
                        "Batch finished in {} ms",
                        summary.elapsed_ms
                    );
                    SessionSignal::BatchComplete {
                        generation,
                        batch_index,
                        summary,
                    }
                }
                Err(failure) => {
                    metrics::BATCHES_TOTAL
                        .with_label_values(&[failure.kind()])
                        .inc();
                    metrics::BATCH_DURATION
                        .with_label_values(&[failure.kind()])
                        .observe(elapsed);
                    warn!(
                        generation,
                        batch = batch_index,
                        session_id = %session_id,
                        "Batch failed: {}",
                        failure
                    );
                    SessionSignal::BatchError {
                        generation,
                        batch_index,
                        failure,
                    }
                }
            };

            if signals.send(signal).await.is_err() {
                debug!(session_id = %session_id, "No receiver for batch result");
            }
        });

        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner;
    use crate::testing::MockTranscoder;
    use crate::transcoder::TranscoderError;
    use std::path::PathBuf;
    use std::time::Duration;

    fn session(transcoder: MockTranscoder) -> ExtractionSession<MockTranscoder> {
        let config = ExtractionConfig::default().with_output_dir(PathBuf::from("/cache"));
        ExtractionSession::new(config, transcoder)
    }

    async fn collect_until_terminal(rx: &mut mpsc::Receiver<SessionSignal>) -> Vec<SessionSignal> {
        let mut signals = Vec::new();
        while let Some(signal) = rx.recv().await {
            let terminal = signal.is_terminal();
            signals.push(signal);
            if terminal {
                break;
            }
        }
        signals
    }

    #[test]
    fn test_build_request_policy() {
        let session = session(MockTranscoder::new());
        let source = SourceVideo::new("/videos/clip.mp4", 125.0);
        let batches = planner::plan(125, 50).unwrap();

        let request = session.build_request(&source, &batches[1]);
        assert_eq!(request.source, "/videos/clip.mp4");
        assert_eq!(request.seek_secs, 0.0);
        assert_eq!(request.frames_per_sec, 1);
        assert_eq!(request.tile_width, 60);
        assert_eq!(request.frame_limit, 50);
        assert_eq!(request.start_number, 50);
        assert_eq!(
            request.output_pattern,
            PathBuf::from("/cache/clip_1_%04d.png")
        );
    }

    #[test]
    fn test_build_request_batch_offset_seek() {
        let mut config = ExtractionConfig::default();
        config.seek_policy = SeekPolicy::BatchOffset;
        config.frames_per_sec = 2;
        let session = ExtractionSession::new(config, MockTranscoder::new());
        let source = SourceVideo::new("/videos/clip.mp4", 60.0);
        let batches = planner::plan(120, 50).unwrap();

        assert_eq!(session.build_request(&source, &batches[0]).seek_secs, 0.0);
        assert_eq!(session.build_request(&source, &batches[2]).seek_secs, 50.0);
    }

    #[tokio::test]
    async fn test_issue_success_signals() {
        let transcoder = MockTranscoder::new();
        transcoder.set_invocation_duration(Duration::ZERO).await;
        let session = session(transcoder.clone());
        let source = SourceVideo::new("/videos/clip.mp4", 10.0);
        let batch = planner::plan(10, 50).unwrap()[0];
        let (tx, mut rx) = mpsc::channel(64);

        session.issue(7, &source, batch, tx);
        let signals = collect_until_terminal(&mut rx).await;

        let last = signals.last().unwrap();
        assert!(matches!(
            last,
            SessionSignal::BatchComplete {
                generation: 7,
                batch_index: 0,
                ..
            }
        ));
        // Diagnostics precede the terminal signal
        assert!(signals[..signals.len() - 1].iter().all(|s| !s.is_terminal()));
        assert!(signals
            .iter()
            .any(|s| matches!(s, SessionSignal::Log { .. })));
        assert_eq!(transcoder.invocation_count().await, 1);
    }

    #[tokio::test]
    async fn test_issue_launch_failure() {
        let transcoder = MockTranscoder::new();
        transcoder
            .set_next_error(TranscoderError::FfmpegNotFound {
                path: PathBuf::from("ffmpeg"),
            })
            .await;
        let session = session(transcoder);
        let source = SourceVideo::new("/videos/clip.mp4", 10.0);
        let batch = planner::plan(10, 50).unwrap()[0];
        let (tx, mut rx) = mpsc::channel(64);

        session.issue(1, &source, batch, tx);
        let signals = collect_until_terminal(&mut rx).await;

        match signals.last().unwrap() {
            SessionSignal::BatchError { failure, .. } => assert_eq!(failure.kind(), "launch"),
            other => panic!("expected batch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_short_write_is_batch_error() {
        let transcoder = MockTranscoder::new();
        transcoder.set_invocation_duration(Duration::ZERO).await;
        transcoder.set_frames_written(Some(7)).await;
        let session = session(transcoder);
        let source = SourceVideo::new("/videos/clip.mp4", 10.0);
        let batch = planner::plan(10, 50).unwrap()[0];
        let (tx, mut rx) = mpsc::channel(64);

        session.issue(2, &source, batch, tx);
        let signals = collect_until_terminal(&mut rx).await;

        match signals.last().unwrap() {
            SessionSignal::BatchError {
                generation: 2,
                batch_index: 0,
                failure,
            } => {
                assert_eq!(failure.kind(), "process");
                assert!(failure.to_string().contains("wrote 7 of 10 frames"));
            }
            other => panic!("expected batch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invocations_never_overlap() {
        let transcoder = MockTranscoder::new();
        transcoder
            .set_invocation_duration(Duration::from_millis(30))
            .await;
        let session = session(transcoder.clone());
        let source = SourceVideo::new("/videos/clip.mp4", 100.0);
        let batches = planner::plan(100, 50).unwrap();
        let (tx, mut rx) = mpsc::channel(64);

        session.issue(1, &source, batches[0], tx.clone());
        session.issue(1, &source, batches[1], tx);

        let mut terminal = 0;
        while let Some(signal) = rx.recv().await {
            if signal.is_terminal() {
                terminal += 1;
                if terminal == 2 {
                    break;
                }
            }
        }

        assert_eq!(transcoder.max_concurrent_invocations().await, 1);
        assert!(!session.is_pending());
    }
}
