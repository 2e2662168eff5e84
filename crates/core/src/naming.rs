//! Output naming for extracted frames.
//!
//! Every batch writes its frames as `<base>_<batch>_<NNNN>.png` inside the
//! output directory. The transcoder numbers files from the batch's start
//! number, so numbers stay contiguous across batches while the batch index in
//! the name keeps two batches from ever writing the same file.

use std::path::{Path, PathBuf};

/// Placeholder understood by the transcoder for the frame number.
pub const SEQUENCE_PLACEHOLDER: &str = "%04d";

/// Extension of every frame image.
pub const FRAME_EXTENSION: &str = "png";

/// Derives the base identifier for a source locator.
///
/// Takes the last `/`-separated segment and drops everything from the first
/// `.` onwards. A missing or empty locator yields an empty name.
pub fn base_name(locator: Option<&str>) -> String {
    let Some(locator) = locator else {
        return String::new();
    };

    let file_name = locator.rsplit('/').next().unwrap_or_default();
    file_name
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Builds the naming template of one batch, without directory or extension.
pub fn base_pattern(base_name: &str, batch_index: usize) -> String {
    format!("{}_{}_{}", base_name, batch_index, SEQUENCE_PLACEHOLDER)
}

/// Substitutes the placeholder of `template` and appends the image extension.
pub fn resolve_frame_path(template: &str, number: usize) -> String {
    format!(
        "{}.{}",
        template.replacen(SEQUENCE_PLACEHOLDER, &format!("{:04}", number), 1),
        FRAME_EXTENSION
    )
}

/// Locates global frame `k` (0-based) on disk: `(batch_index, file_number)`.
///
/// The file is `resolve_frame_path(&base_pattern(base, batch_index), file_number)`.
/// Returns `None` for a zero batch size.
pub fn frame_location(k: usize, batch_size: usize) -> Option<(usize, usize)> {
    if batch_size == 0 {
        return None;
    }
    Some((k / batch_size, k))
}

/// Number of frames sampled from a video of the given length.
pub fn frame_count_for_duration(duration_secs: f64, frames_per_sec: u32) -> usize {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return 0;
    }
    (duration_secs * f64::from(frames_per_sec)).ceil() as usize
}

/// Output pattern of a single batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePattern {
    template: PathBuf,
    start_number: usize,
}

impl FramePattern {
    /// Creates the pattern for a batch whose first file is numbered `start_number`.
    pub fn new(output_dir: &Path, base_name: &str, batch_index: usize, start_number: usize) -> Self {
        Self {
            template: output_dir.join(base_pattern(base_name, batch_index)),
            start_number,
        }
    }

    /// Template path containing the placeholder, without extension.
    pub fn template(&self) -> &Path {
        &self.template
    }

    /// Number given to the first file of the batch.
    pub fn start_number(&self) -> usize {
        self.start_number
    }

    /// Pattern handed to the transcoder as its output argument.
    pub fn output_arg(&self) -> PathBuf {
        let mut arg = self.template.clone().into_os_string();
        arg.push(".");
        arg.push(FRAME_EXTENSION);
        PathBuf::from(arg)
    }

    /// Path of the frame at 1-based `sequence_in_batch`.
    pub fn frame_path(&self, sequence_in_batch: usize) -> PathBuf {
        let number = self.start_number + sequence_in_batch.saturating_sub(1);
        PathBuf::from(resolve_frame_path(
            &self.template.to_string_lossy(),
            number,
        ))
    }

    /// Paths of the first `count` frames of the batch, in order.
    pub fn frame_paths(&self, count: usize) -> Vec<PathBuf> {
        (1..=count).map(|seq| self.frame_path(seq)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_base_name_from_uri() {
        assert_eq!(
            base_name(Some("file:///data/user/0/cache/ImagePicker/clip-01.mp4")),
            "clip-01"
        );
        assert_eq!(base_name(Some("movie.final.mkv")), "movie");
        assert_eq!(base_name(Some("/videos/noext")), "noext");
    }

    #[test]
    fn test_base_name_empty() {
        assert_eq!(base_name(None), "");
        assert_eq!(base_name(Some("")), "");
        assert_eq!(base_name(Some("/videos/")), "");
    }

    #[test]
    fn test_base_pattern() {
        assert_eq!(base_pattern("clip", 3), "clip_3_%04d");
    }

    #[test]
    fn test_resolve_frame_path() {
        assert_eq!(resolve_frame_path("clip_0_%04d", 1), "clip_0_0001.png");
        assert_eq!(resolve_frame_path("/tmp/clip_2_%04d", 125), "/tmp/clip_2_0125.png");
        // Wider numbers are not truncated
        assert_eq!(resolve_frame_path("clip_0_%04d", 12345), "clip_0_12345.png");
    }

    #[test]
    fn test_frame_location() {
        assert_eq!(frame_location(0, 50), Some((0, 0)));
        assert_eq!(frame_location(49, 50), Some((0, 49)));
        assert_eq!(frame_location(50, 50), Some((1, 50)));
        assert_eq!(frame_location(124, 50), Some((2, 124)));
        assert_eq!(frame_location(3, 0), None);
    }

    #[test]
    fn test_frame_location_names_written_file() {
        let dir = Path::new("/cache");
        for k in 0..125 {
            let (batch_index, number) = frame_location(k, 50).unwrap();
            let resolved = resolve_frame_path(
                &dir.join(base_pattern("clip", batch_index)).to_string_lossy(),
                number,
            );
            let pattern = FramePattern::new(dir, "clip", batch_index, batch_index * 50);
            assert_eq!(PathBuf::from(resolved), pattern.frame_path(k % 50 + 1));
        }
    }

    #[test]
    fn test_frame_count_for_duration() {
        assert_eq!(frame_count_for_duration(12.0, 1), 12);
        assert_eq!(frame_count_for_duration(12.2, 1), 13);
        assert_eq!(frame_count_for_duration(2.5, 2), 5);
        assert_eq!(frame_count_for_duration(0.0, 1), 0);
        assert_eq!(frame_count_for_duration(f64::NAN, 1), 0);
    }

    #[test]
    fn test_frame_pattern_paths() {
        let pattern = FramePattern::new(Path::new("/cache"), "clip", 1, 50);

        assert_eq!(pattern.output_arg(), PathBuf::from("/cache/clip_1_%04d.png"));
        assert_eq!(pattern.frame_path(1), PathBuf::from("/cache/clip_1_0050.png"));
        assert_eq!(pattern.frame_path(50), PathBuf::from("/cache/clip_1_0099.png"));
        assert_eq!(pattern.frame_paths(3).len(), 3);
    }

    #[test]
    fn test_naming_is_deterministic() {
        let a = FramePattern::new(Path::new("/cache"), "clip", 2, 100);
        let b = FramePattern::new(Path::new("/cache"), "clip", 2, 100);
        assert_eq!(a.frame_path(7), b.frame_path(7));
    }

    #[test]
    fn test_batches_never_collide() {
        let mut seen = HashSet::new();
        for batch in 0..4 {
            let pattern = FramePattern::new(Path::new("/cache"), "clip", batch, batch * 50);
            for path in pattern.frame_paths(50) {
                assert!(seen.insert(path), "duplicate frame path");
            }
        }
        assert_eq!(seen.len(), 200);
    }
}
