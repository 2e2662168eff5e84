use serde::{Deserialize, Serialize};

use crate::extraction::ExtractionConfig;
use crate::transcoder::TranscoderConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::SeekPolicy;
    use std::path::PathBuf;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.extraction.batch_size, 50);
        assert_eq!(config.extraction.frames_per_sec, 1);
        assert_eq!(config.extraction.tile_width, 60);
        assert_eq!(config.extraction.seek_policy, SeekPolicy::FromStart);
        assert_eq!(config.transcoder.ffmpeg_path, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_sections_deserialize() {
        let toml = r#"
[transcoder]
ffmpeg_path = "/usr/local/bin/ffmpeg"
extra_ffmpeg_args = ["-threads", "2"]

[extraction]
batch_size = 20
output_dir = "/var/cache/frames"
seek_policy = "batch_offset"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.transcoder.ffmpeg_path,
            PathBuf::from("/usr/local/bin/ffmpeg")
        );
        assert_eq!(config.transcoder.extra_ffmpeg_args, vec!["-threads", "2"]);
        assert_eq!(config.extraction.batch_size, 20);
        assert_eq!(
            config.extraction.output_dir,
            PathBuf::from("/var/cache/frames")
        );
        assert_eq!(config.extraction.seek_policy, SeekPolicy::BatchOffset);
    }

    #[test]
    fn test_config_serializes_back() {
        let config = Config::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["extraction"]["seek_policy"], "from_start");
        assert_eq!(json["transcoder"]["timeout_secs"], 3600);
    }
}
