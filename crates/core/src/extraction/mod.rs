//! Batch-level extraction on top of a [`Transcoder`](crate::transcoder::Transcoder).
//!
//! An [`ExtractionSession`] turns a planned batch into one transcoder
//! invocation and reports its outcome as generation-tagged
//! [`SessionSignal`]s.

mod config;
mod session;
mod types;

pub use config::{ExtractionConfig, SeekPolicy, FRAME_PER_SEC, TILE_WIDTH};
pub use session::ExtractionSession;
pub use types::{BatchFailure, SessionSignal};
