//! Mock transcoder for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

use crate::naming::{self, FRAME_EXTENSION};
use crate::transcoder::{
    ExtractionRequest, MediaInfo, SessionSummary, StatsSample, Transcoder, TranscoderError,
    TranscoderEvent,
};

/// A recorded invocation for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedInvocation {
    /// The request that was submitted.
    pub request: ExtractionRequest,
    /// Whether the invocation succeeded.
    pub success: bool,
}

/// Mock implementation of the Transcoder trait.
///
/// Provides controllable behavior for testing:
/// - Track invocations for assertions
/// - Simulate launch and process failures, on the next or on the n-th call
/// - Simulate log and statistics output
/// - Optionally write empty frame files where ffmpeg would
///
/// # Example
///
/// ```rust,ignore
/// use framestrip_core::testing::MockTranscoder;
///
/// let transcoder = MockTranscoder::new();
/// transcoder.fail_invocation(2, TranscoderError::process_failed("boom", None)).await;
///
/// // ... run an extraction ...
///
/// let invocations = transcoder.recorded_invocations().await;
/// assert_eq!(invocations.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MockTranscoder {
    /// Recorded invocations.
    invocations: Arc<RwLock<Vec<RecordedInvocation>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<TranscoderError>>>,
    /// Errors for specific invocations, keyed by 1-based invocation number.
    planned_failures: Arc<RwLock<HashMap<usize, TranscoderError>>>,
    /// Simulated invocation duration in milliseconds.
    invocation_duration_ms: Arc<RwLock<u64>>,
    /// Whether to send log and stats events.
    send_events: Arc<RwLock<bool>>,
    /// Whether to create the frame files on success.
    write_files: Arc<RwLock<bool>>,
    /// Duration reported by probe.
    probe_duration_secs: Arc<RwLock<f64>>,
    /// Frames reported as written instead of the requested count.
    frames_written: Arc<RwLock<Option<u64>>>,
    /// Invocations started so far.
    started: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscoder {
    /// Create a new mock transcoder.
    pub fn new() -> Self {
        Self {
            invocations: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            planned_failures: Arc::new(RwLock::new(HashMap::new())),
            invocation_duration_ms: Arc::new(RwLock::new(10)),
            send_events: Arc::new(RwLock::new(true)),
            write_files: Arc::new(RwLock::new(false)),
            probe_duration_secs: Arc::new(RwLock::new(125.0)),
            frames_written: Arc::new(RwLock::new(None)),
            started: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get all recorded invocations.
    pub async fn recorded_invocations(&self) -> Vec<RecordedInvocation> {
        self.invocations.read().await.clone()
    }

    /// Get the number of invocations performed.
    pub async fn invocation_count(&self) -> usize {
        self.invocations.read().await.len()
    }

    /// Highest number of invocations that ever ran at the same time.
    pub async fn max_concurrent_invocations(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: TranscoderError) {
        *self.next_error.write().await = Some(error);
    }

    /// Configure the `n`-th invocation (1-based) to fail with the given error.
    pub async fn fail_invocation(&self, n: usize, error: TranscoderError) {
        self.planned_failures.write().await.insert(n, error);
    }

    /// Set the simulated invocation duration.
    pub async fn set_invocation_duration(&self, duration: Duration) {
        *self.invocation_duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Enable or disable log and stats events.
    pub async fn set_send_events(&self, send: bool) {
        *self.send_events.write().await = send;
    }

    /// Enable or disable writing empty frame files.
    pub async fn set_write_files(&self, write: bool) {
        *self.write_files.write().await = write;
    }

    /// Set the duration reported by probe.
    pub async fn set_probe_duration(&self, duration_secs: f64) {
        *self.probe_duration_secs.write().await = duration_secs;
    }

    /// Report `frames` written per successful invocation, or the requested
    /// count when `None`.
    pub async fn set_frames_written(&self, frames: Option<u64>) {
        *self.frames_written.write().await = frames;
    }

    /// Take the next error if set.
    async fn take_error(&self) -> Option<TranscoderError> {
        self.next_error.write().await.take()
    }

    /// Paths the transcoder would write for `request`.
    fn output_paths(request: &ExtractionRequest, count: usize) -> Vec<PathBuf> {
        let pattern = request.output_pattern.to_string_lossy();
        let extension = format!(".{}", FRAME_EXTENSION);
        let template = pattern.strip_suffix(&extension).unwrap_or(&pattern);
        (0..count)
            .map(|i| PathBuf::from(naming::resolve_frame_path(template, request.start_number + i)))
            .collect()
    }

    async fn run(
        &self,
        request: &ExtractionRequest,
        events: &mpsc::Sender<TranscoderEvent>,
    ) -> Result<SessionSummary, TranscoderError> {
        let n = self.started.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        if *self.send_events.read().await {
            let _ = events
                .send(TranscoderEvent::Log(format!(
                    "mock: writing {} frames from {}",
                    request.frame_limit, request.start_number
                )))
                .await;
            let _ = events
                .send(TranscoderEvent::Stats(StatsSample {
                    frame: request.frame_limit as u64,
                    fps: Some(100.0),
                    time_secs: request.frame_limit as f64 / f64::from(request.frames_per_sec.max(1)),
                    speed: Some("10x".to_string()),
                    finished: true,
                }))
                .await;
        }

        let duration_ms = *self.invocation_duration_ms.read().await;
        if duration_ms > 0 {
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        }

        if let Some(err) = self.planned_failures.write().await.remove(&n) {
            return Err(err);
        }

        let frames_written = self
            .frames_written
            .read()
            .await
            .unwrap_or(request.frame_limit as u64);

        if *self.write_files.read().await {
            let count = (frames_written as usize).min(request.frame_limit);
            for path in Self::output_paths(request, count) {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, b"").await?;
            }
        }

        Ok(SessionSummary {
            session_id: request.session_id,
            frames_written,
            elapsed_ms: duration_ms,
        })
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, source: &str) -> Result<MediaInfo, TranscoderError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        Ok(MediaInfo {
            source: source.to_string(),
            format: "mp4".to_string(),
            duration_secs: *self.probe_duration_secs.read().await,
            video_codec: Some("h264".to_string()),
            video_width: Some(1920),
            video_height: Some(1080),
            video_fps: Some(30.0),
        })
    }

    async fn execute(
        &self,
        request: ExtractionRequest,
        events: mpsc::Sender<TranscoderEvent>,
    ) -> Result<SessionSummary, TranscoderError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        let result = self.run(&request, &events).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.invocations.write().await.push(RecordedInvocation {
            request,
            success: result.is_ok(),
        });
        result
    }

    async fn validate(&self) -> Result<(), TranscoderError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn create_test_request(start_number: usize, frame_limit: usize) -> ExtractionRequest {
        ExtractionRequest {
            session_id: Uuid::new_v4(),
            source: "/videos/clip.mp4".to_string(),
            seek_secs: 0.0,
            frames_per_sec: 1,
            tile_width: 60,
            frame_limit,
            start_number,
            output_pattern: PathBuf::from("/cache/clip_0_%04d.png"),
        }
    }

    #[tokio::test]
    async fn test_basic_invocation() {
        let transcoder = MockTranscoder::new();
        transcoder.set_invocation_duration(Duration::ZERO).await;
        let (tx, _rx) = mpsc::channel(8);

        let summary = transcoder
            .execute(create_test_request(0, 50), tx)
            .await
            .unwrap();

        assert_eq!(summary.frames_written, 50);
        let invocations = transcoder.recorded_invocations().await;
        assert_eq!(invocations.len(), 1);
        assert!(invocations[0].success);
    }

    #[tokio::test]
    async fn test_error_injection() {
        let transcoder = MockTranscoder::new();
        transcoder
            .set_next_error(TranscoderError::process_failed("test error", None))
            .await;
        let (tx, _rx) = mpsc::channel(8);

        let result = transcoder.execute(create_test_request(0, 5), tx).await;
        assert!(result.is_err());

        // Error should be consumed, invocation recorded as failed
        let invocations = transcoder.recorded_invocations().await;
        assert_eq!(invocations.len(), 1);
        assert!(!invocations[0].success);
    }

    #[tokio::test]
    async fn test_planned_failure() {
        let transcoder = MockTranscoder::new();
        transcoder.set_invocation_duration(Duration::ZERO).await;
        transcoder
            .fail_invocation(2, TranscoderError::Timeout { timeout_secs: 1 })
            .await;

        let (tx, _rx) = mpsc::channel(8);
        assert!(transcoder.execute(create_test_request(0, 5), tx.clone()).await.is_ok());
        assert!(transcoder.execute(create_test_request(5, 5), tx.clone()).await.is_err());
        assert!(transcoder.execute(create_test_request(10, 5), tx).await.is_ok());
    }

    #[tokio::test]
    async fn test_events() {
        let transcoder = MockTranscoder::new();
        transcoder.set_invocation_duration(Duration::ZERO).await;
        let (tx, mut rx) = mpsc::channel(8);

        transcoder
            .execute(create_test_request(0, 3), tx)
            .await
            .unwrap();

        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_write_files() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let transcoder = MockTranscoder::new();
        transcoder.set_invocation_duration(Duration::ZERO).await;
        transcoder.set_write_files(true).await;

        let mut request = create_test_request(50, 3);
        request.output_pattern = temp_dir.path().join("clip_1_%04d.png");
        let (tx, _rx) = mpsc::channel(8);
        transcoder.execute(request, tx).await.unwrap();

        assert!(temp_dir.path().join("clip_1_0050.png").exists());
        assert!(temp_dir.path().join("clip_1_0052.png").exists());
        assert!(!temp_dir.path().join("clip_1_0053.png").exists());
    }

    #[tokio::test]
    async fn test_short_write() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let transcoder = MockTranscoder::new();
        transcoder.set_invocation_duration(Duration::ZERO).await;
        transcoder.set_write_files(true).await;
        transcoder.set_frames_written(Some(2)).await;

        let mut request = create_test_request(0, 5);
        request.output_pattern = temp_dir.path().join("clip_0_%04d.png");
        let (tx, _rx) = mpsc::channel(8);
        let summary = transcoder.execute(request, tx).await.unwrap();

        assert_eq!(summary.frames_written, 2);
        assert!(temp_dir.path().join("clip_0_0001.png").exists());
        assert!(!temp_dir.path().join("clip_0_0002.png").exists());
    }
}
