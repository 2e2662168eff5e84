pub mod config;
pub mod extraction;
pub mod metrics;
pub mod naming;
pub mod orchestrator;
pub mod planner;
pub mod source;
pub mod testing;
pub mod transcoder;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, ENV_PREFIX,
};
pub use extraction::{
    BatchFailure, ExtractionConfig, ExtractionSession, SeekPolicy, SessionSignal, FRAME_PER_SEC,
    TILE_WIDTH,
};
pub use naming::FramePattern;
pub use orchestrator::{
    ExtractionRun, FrameSlot, FrameStripOrchestrator, OrchestratorError, RunEvent, RunFailure,
    RunHandle, RunOutcome, RunSnapshot, RunState, Transition,
};
pub use planner::{plan, Batch, PlanError, DEFAULT_BATCH_SIZE};
pub use source::{SourceVideo, VideoPick};
pub use transcoder::{
    ExtractionRequest, FfmpegTranscoder, MediaInfo, SessionSummary, StatsSample, Transcoder,
    TranscoderConfig, TranscoderError, TranscoderEvent,
};
