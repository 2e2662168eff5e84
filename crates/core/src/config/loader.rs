use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix of environment variable overrides.
///
/// Nested keys are separated by a double underscore, e.g.
/// `FRAMESTRIP_EXTRACTION__BATCH_SIZE=20`.
pub const ENV_PREFIX: &str = "FRAMESTRIP_";

fn env_overrides() -> Env {
    Env::prefixed(ENV_PREFIX).split("__")
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(env_overrides())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
