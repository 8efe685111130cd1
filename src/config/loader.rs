//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for {key}")]
    Env { key: &'static str, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply `TRACK_*` environment
/// overrides and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_file(path)?,
        None => ServerConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a TOML file without validating it.
pub fn parse_file(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Override fields from environment-style lookups.
pub fn apply_env_overrides<F>(config: &mut ServerConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("TRACK_HOST") {
        config.listener.host = parse("TRACK_HOST", v)?;
    }
    if let Some(v) = lookup("TRACK_PORT") {
        config.listener.port = parse("TRACK_PORT", v)?;
    }
    if let Some(v) = lookup("TRACK_TLS_CERT") {
        config.listener.tls.cert_path = PathBuf::from(v);
    }
    if let Some(v) = lookup("TRACK_TLS_KEY") {
        config.listener.tls.key_path = PathBuf::from(v);
    }
    if let Some(v) = lookup("TRACK_MAX_RETRIES") {
        config.startup.max_retries = parse("TRACK_MAX_RETRIES", v)?;
    }
    if let Some(v) = lookup("TRACK_RETRY_DELAY_MS") {
        config.startup.retry_delay_ms = parse("TRACK_RETRY_DELAY_MS", v)?;
    }
    if let Some(v) = lookup("TRACK_DATA_PATH") {
        config.store.data_path = PathBuf::from(v);
    }
    if let Some(v) = lookup("TRACK_LOG_LEVEL") {
        config.observability.log_level = v;
    }
    Ok(())
}

fn parse<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { key, value })
}
