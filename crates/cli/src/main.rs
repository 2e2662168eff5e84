//! # framestrip
//!
//! Extracts a strip of thumbnail frames from a video with ffmpeg, in batches.
//!
//! # Configuration
//!
//! Set `FRAMESTRIP_CONFIG` to a TOML config file path, or pass `--config`.
//! Without either, `framestrip.toml` in the working directory is used when
//! present and built-in defaults otherwise.
//!
//! # CLI Usage
//!
//! ```bash
//! # Strip a video into the default cache directory
//! framestrip movie.mp4
//!
//! # Custom output directory and batch size, JSON output
//! framestrip --output-dir ./frames --batch-size 20 --json movie.mp4
//! ```

mod metrics;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use framestrip_core::{
    load_config, validate_config, Config, ConfigError, FfmpegTranscoder, FrameStripOrchestrator,
    RunEvent, RunHandle, SourceVideo, Transcoder, VideoPick,
};

/// Config file looked up when none is given.
const DEFAULT_CONFIG_PATH: &str = "framestrip.toml";

/// Extract a frame strip from a video.
#[derive(Parser, Debug)]
#[command(name = "framestrip")]
#[command(about = "Extract a strip of thumbnail frames from a video")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long, env = "FRAMESTRIP_CONFIG")]
    config: Option<PathBuf>,

    /// Directory the frames are written to.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Frames extracted per ffmpeg invocation.
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Number of frames to extract instead of one per sampled second.
    #[arg(short, long)]
    frames: Option<usize>,

    /// Print the frame paths as a JSON array.
    #[arg(long)]
    json: bool,

    /// Print Prometheus metrics to stderr when done.
    #[arg(long)]
    metrics: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    /// Video file to extract frames from.
    video: String,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for the frame list
    let (plain_layer, json_layer) = if cli.log_json {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            ),
        )
    } else {
        (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        )
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(plain_layer)
        .with(json_layer)
        .init();

    let mut config = resolve_config(cli.config.as_ref())?;
    if let Some(output_dir) = &cli.output_dir {
        config.extraction.output_dir = output_dir.clone();
    }
    if let Some(batch_size) = cli.batch_size {
        config.extraction.batch_size = batch_size;
    }
    validate_config(&config).context("Configuration validation failed")?;

    info!("Output directory: {:?}", config.extraction.output_dir);
    info!("Batch size: {}", config.extraction.batch_size);

    let transcoder = FfmpegTranscoder::new(config.transcoder.clone());
    transcoder
        .validate()
        .await
        .context("FFmpeg is not available")?;

    let orchestrator = FrameStripOrchestrator::new(config.extraction.clone(), transcoder);

    let handle = match cli.frames {
        Some(frames) => {
            let info = orchestrator
                .transcoder()
                .probe(&cli.video)
                .await
                .with_context(|| format!("Failed to probe {}", cli.video))?;
            let source = SourceVideo::new(cli.video.clone(), info.duration_secs);
            Some(orchestrator.start(source, frames).await?)
        }
        None => orchestrator
            .start_from_pick(&VideoPick::selected(cli.video.clone()))
            .await
            .with_context(|| format!("Failed to start extraction for {}", cli.video))?,
    };
    let Some(handle) = handle else {
        bail!("No video selected");
    };

    let paths = drive(handle).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
    } else {
        for path in &paths {
            println!("{}", path.display());
        }
    }

    if cli.metrics {
        eprint!("{}", metrics::encode_metrics());
    }

    Ok(())
}

/// Loads the config file, falling back to defaults when the default file is absent.
fn resolve_config(explicit: Option<&PathBuf>) -> Result<Config> {
    let path = explicit
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    info!("Loading configuration from {:?}", path);
    match load_config(&path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(_)) if explicit.is_none() => {
            info!("No configuration file, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load config from {:?}", path)),
    }
}

/// Reports progress until the run ends and returns its frames.
async fn drive(handle: RunHandle) -> Result<Vec<PathBuf>> {
    let RunHandle {
        generation,
        mut events,
        mut outcome,
    } = handle;

    let result = loop {
        tokio::select! {
            biased;
            Some(event) = events.recv() => report(event),
            result = &mut outcome => break result,
        }
    };

    while let Ok(event) = events.try_recv() {
        report(event);
    }

    match result {
        Ok(Ok(paths)) => {
            info!(generation, "Extracted {} frames", paths.len());
            Ok(paths)
        }
        Ok(Err(failure)) => Err(failure.into()),
        Err(_) => bail!("Run {} ended without a result", generation),
    }
}

fn report(event: RunEvent) {
    match event {
        RunEvent::Log { batch_index, line } => {
            debug!(batch = batch_index, "ffmpeg: {}", line);
        }
        RunEvent::Stats {
            batch_index,
            sample,
        } => {
            debug!(
                batch = batch_index,
                frame = sample.frame,
                "ffmpeg progress at {:.1}s",
                sample.time_secs
            );
        }
        RunEvent::BatchCompleted { batch_index, paths } => {
            info!(batch = batch_index, "Batch ready with {} frames", paths.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_parses_overrides() {
        let cli = Cli::parse_from([
            "framestrip",
            "--output-dir",
            "/tmp/frames",
            "--batch-size",
            "20",
            "--json",
            "movie.mp4",
        ]);
        assert_eq!(cli.output_dir, Some(PathBuf::from("/tmp/frames")));
        assert_eq!(cli.batch_size, Some(20));
        assert!(cli.json);
        assert_eq!(cli.video, "movie.mp4");
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let missing = PathBuf::from("/nonexistent/framestrip.toml");
        assert!(resolve_config(Some(&missing)).is_err());
    }

    #[test]
    fn test_explicit_config_is_loaded() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[extraction]\nbatch_size = 7").unwrap();

        let config = resolve_config(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.extraction.batch_size, 7);
    }
}
