//! Source videos and the picker boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::naming;

/// The video a frame strip is extracted from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceVideo {
    /// Path or URI of the video.
    pub locator: String,
    /// Stable identifier derived from the locator, used for output names.
    pub base_name: String,
    /// Length of the video in seconds.
    pub duration_secs: f64,
}

impl SourceVideo {
    pub fn new(locator: impl Into<String>, duration_secs: f64) -> Self {
        let locator = locator.into();
        let base_name = naming::base_name(Some(&locator));
        Self {
            locator,
            base_name,
            duration_secs,
        }
    }

    /// Overrides the derived base name.
    pub fn with_base_name(mut self, base_name: impl Into<String>) -> Self {
        self.base_name = base_name.into();
        self
    }

    /// Frames sampled from this video at `frames_per_sec`.
    pub fn frame_count(&self, frames_per_sec: u32) -> usize {
        naming::frame_count_for_duration(self.duration_secs, frames_per_sec)
    }
}

/// What a video picker hands back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoPick {
    pub locator: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
}

impl VideoPick {
    /// A pick of `locator`, made now.
    pub fn selected(locator: impl Into<String>) -> Self {
        Self {
            locator: Some(locator.into()),
            created_at: Some(Utc::now()),
            cancelled: false,
        }
    }

    /// A dismissed picker.
    pub fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Default::default()
        }
    }

    /// The chosen locator, unless the pick was cancelled or empty.
    pub fn locator(&self) -> Option<&str> {
        if self.cancelled {
            return None;
        }
        self.locator.as_deref().filter(|l| !l.is_empty())
    }
}
