//! FFmpeg-based transcoder implementation.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::{debug, trace, warn};

use super::config::TranscoderConfig;
use super::error::TranscoderError;
use super::traits::Transcoder;
use super::types::{ExtractionRequest, MediaInfo, SessionSummary, StatsSample, TranscoderEvent};

/// FFmpeg-based transcoder implementation.
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
}

impl FfmpegTranscoder {
    /// Creates a new FFmpeg transcoder with the given configuration.
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    /// Creates a transcoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TranscoderConfig::default())
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    /// Builds ffmpeg arguments for a frame extraction request.
    pub(crate) fn build_args(&self, request: &ExtractionRequest) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(), // Overwrite output
            "-ss".to_string(),
            request.seek_secs.to_string(),
            "-i".to_string(),
            request.source.clone(),
            "-vf".to_string(),
            request.video_filter(),
            "-frames:v".to_string(),
            request.frame_limit.to_string(),
            "-start_number".to_string(),
            request.start_number.to_string(),
        ];

        // Log level and progress
        args.extend([
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ]);

        // Extra args
        args.extend(self.config.extra_ffmpeg_args.iter().cloned());

        // Output pattern
        args.push(request.output_pattern.to_string_lossy().to_string());

        args
    }

    /// Parses ffprobe JSON output into MediaInfo.
    fn parse_probe_output(source: &str, output: &str) -> Result<MediaInfo, TranscoderError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: String,
            duration: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            codec_name: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
            r_frame_rate: Option<String>,
            duration: Option<String>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| TranscoderError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");

        // Some containers only carry the duration on the stream
        let duration_secs = probe
            .format
            .duration
            .as_ref()
            .or_else(|| video_stream.and_then(|s| s.duration.as_ref()))
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let format_name = probe
            .format
            .format_name
            .split(',')
            .next()
            .unwrap_or("unknown");

        Ok(MediaInfo {
            source: source.to_string(),
            format: format_name.to_string(),
            duration_secs,
            video_codec: video_stream.and_then(|s| s.codec_name.clone()),
            video_width: video_stream.and_then(|s| s.width),
            video_height: video_stream.and_then(|s| s.height),
            video_fps: video_stream
                .and_then(|s| s.r_frame_rate.as_deref())
                .and_then(parse_frame_rate),
        })
    }

    /// Maps a spawn error of `program` at `path`.
    fn spawn_error(program: &str, path: &Path, e: std::io::Error) -> TranscoderError {
        if e.kind() == std::io::ErrorKind::NotFound {
            if program == "ffprobe" {
                TranscoderError::FfprobeNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                TranscoderError::FfmpegNotFound {
                    path: path.to_path_buf(),
                }
            }
        } else {
            TranscoderError::launch_failed(program, e.to_string())
        }
    }

    /// Runs one invocation, streaming diagnostics to `events`.
    async fn run_extraction(
        &self,
        request: &ExtractionRequest,
        events: mpsc::Sender<TranscoderEvent>,
    ) -> Result<SessionSummary, TranscoderError> {
        let start = Instant::now();

        // Ensure output directory exists
        if let Some(parent) = request.output_pattern.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|_| {
                    TranscoderError::OutputDirectoryFailed {
                        path: parent.to_path_buf(),
                    }
                })?;
            }
        }

        let args = self.build_args(request);
        debug!(session_id = %request.session_id, ?args, "Launching ffmpeg");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Self::spawn_error("ffmpeg", &self.config.ffmpeg_path, e))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TranscoderError::launch_failed("ffmpeg", "stderr was not captured"))?;
        // Raw segments: ffmpeg may print bytes that are not UTF-8
        let mut reader = BufReader::new(stderr).split(b'\n');
        let mut progress = ProgressParser::new();

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut error_output = String::new();

            while let Some(raw) = reader.next_segment().await? {
                let line = String::from_utf8_lossy(&raw)
                    .trim_end_matches('\r')
                    .to_string();
                match progress.feed(&line) {
                    ProgressLine::Sample(sample) => {
                        // Non-blocking send
                        let _ = events.try_send(TranscoderEvent::Stats(sample));
                    }
                    ProgressLine::Field => {}
                    ProgressLine::Other => {
                        trace!(session_id = %request.session_id, "ffmpeg: {}", line);
                        if line.contains("Error") || line.contains("error") {
                            error_output.push_str(&line);
                            error_output.push('\n');
                        }
                        let _ = events.try_send(TranscoderEvent::Log(line));
                    }
                }
            }

            let status = child.wait().await?;
            Ok::<(std::process::ExitStatus, String), std::io::Error>((status, error_output))
        })
        .await;

        match result {
            Ok(Ok((status, error_output))) => {
                if !status.success() {
                    return Err(TranscoderError::process_failed(
                        format!("FFmpeg exited with code: {:?}", status.code()),
                        if error_output.is_empty() {
                            None
                        } else {
                            Some(error_output)
                        },
                    ));
                }
            }
            Ok(Err(e)) => return Err(TranscoderError::Io(e)),
            Err(_) => {
                // Kill the process on timeout
                if let Err(e) = child.kill().await {
                    warn!(session_id = %request.session_id, "Failed to kill ffmpeg: {}", e);
                }
                return Err(TranscoderError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
        }

        Ok(SessionSummary {
            session_id: request.session_id,
            frames_written: progress.last_frame(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Parses a frame rate like "24000/1001" or "30/1".
fn parse_frame_rate(rate: &str) -> Option<f32> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f32>().ok()?;
            let den = den.parse::<f32>().ok()?;
            if den > 0.0 {
                Some(num / den)
            } else {
                None
            }
        }
        None => rate.parse::<f32>().ok(),
    }
}

/// Classification of a stderr line.
#[derive(Debug, PartialEq)]
enum ProgressLine {
    /// A `progress=` line closed a block.
    Sample(StatsSample),
    /// A key of a progress block.
    Field,
    /// Anything else (regular log output).
    Other,
}

/// Accumulates `-progress` key/value blocks into statistics samples.
struct ProgressParser {
    field: Option<Regex>,
    current: StatsSample,
    last_frame: u64,
}

impl ProgressParser {
    fn new() -> Self {
        Self {
            field: Regex::new(r"^([a-z_0-9]+)=\s*(\S*)\s*$").ok(),
            current: StatsSample::default(),
            last_frame: 0,
        }
    }

    fn last_frame(&self) -> u64 {
        self.last_frame
    }

    fn feed(&mut self, line: &str) -> ProgressLine {
        let Some(caps) = self.field.as_ref().and_then(|re| re.captures(line.trim())) else {
            return ProgressLine::Other;
        };
        let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) else {
            return ProgressLine::Other;
        };
        let value = value.as_str();

        match key.as_str() {
            "frame" => {
                if let Ok(frame) = value.parse::<u64>() {
                    self.current.frame = frame;
                    self.last_frame = frame;
                }
            }
            "fps" => self.current.fps = value.parse::<f32>().ok(),
            "out_time_ms" | "out_time_us" => {
                // Both keys carry microseconds
                if let Ok(us) = value.parse::<f64>() {
                    self.current.time_secs = us / 1_000_000.0;
                }
            }
            "speed" => {
                if value != "N/A" && !value.is_empty() {
                    self.current.speed = Some(value.to_string());
                }
            }
            "progress" => {
                let mut sample = std::mem::take(&mut self.current);
                sample.finished = value == "end";
                return ProgressLine::Sample(sample);
            }
            _ => {}
        }

        ProgressLine::Field
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, source: &str) -> Result<MediaInfo, TranscoderError> {
        // Remote locators are left to ffprobe
        if !source.contains("://") && !Path::new(source).exists() {
            return Err(TranscoderError::InputNotFound {
                path: source.into(),
            });
        }

        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(source)
            .output()
            .await
            .map_err(|e| Self::spawn_error("ffprobe", &self.config.ffprobe_path, e))?;

        if !output.status.success() {
            return Err(TranscoderError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(source, &stdout)
    }

    async fn execute(
        &self,
        request: ExtractionRequest,
        events: mpsc::Sender<TranscoderEvent>,
    ) -> Result<SessionSummary, TranscoderError> {
        self.run_extraction(&request, events).await
    }

    async fn validate(&self) -> Result<(), TranscoderError> {
        Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| Self::spawn_error("ffmpeg", &self.config.ffmpeg_path, e))?;

        Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| Self::spawn_error("ffprobe", &self.config.ffprobe_path, e))?;

        Ok(())
    }
}
