use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Batch size, sampling rate and timeout are not 0
/// - Tile width is positive and even, as the scale filter requires
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let extraction = &config.extraction;

    if extraction.batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "extraction.batch_size cannot be 0".to_string(),
        ));
    }

    if extraction.frames_per_sec == 0 {
        return Err(ConfigError::ValidationError(
            "extraction.frames_per_sec cannot be 0".to_string(),
        ));
    }

    if extraction.tile_width == 0 || extraction.tile_width % 2 != 0 {
        return Err(ConfigError::ValidationError(format!(
            "extraction.tile_width must be a positive even number, got {}",
            extraction.tile_width
        )));
    }

    if config.transcoder.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "transcoder.timeout_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}
