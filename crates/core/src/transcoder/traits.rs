//! Trait definitions for the transcoder module.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::TranscoderError;
use super::types::{ExtractionRequest, MediaInfo, SessionSummary, TranscoderEvent};

/// An external tool that rasterizes video frames.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the name of this transcoder implementation.
    fn name(&self) -> &str;

    /// Probes a media source to get its information.
    async fn probe(&self, source: &str) -> Result<MediaInfo, TranscoderError>;

    /// Runs one extraction invocation to completion.
    ///
    /// Log lines and statistics samples are sent on `events` while the
    /// invocation runs. If the receiver is dropped, the invocation continues
    /// without diagnostics.
    async fn execute(
        &self,
        request: ExtractionRequest,
        events: mpsc::Sender<TranscoderEvent>,
    ) -> Result<SessionSummary, TranscoderError>;

    /// Validates that the transcoder is properly configured and ready.
    async fn validate(&self) -> Result<(), TranscoderError>;
}
