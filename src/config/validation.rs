//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (port, retry count, timeouts)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ServerConfig;
use crate::resilience::BackoffPolicy;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port == 0 {
        errors.push(ValidationError::new("listener.port", "must be between 1 and 65535"));
    }
    if config.listener.tls.cert_path.as_os_str().is_empty() {
        errors.push(ValidationError::new("listener.tls.cert_path", "must not be empty"));
    }
    if config.listener.tls.key_path.as_os_str().is_empty() {
        errors.push(ValidationError::new("listener.tls.key_path", "must not be empty"));
    }

    if config.startup.max_retries == 0 {
        errors.push(ValidationError::new("startup.max_retries", "must be at least 1"));
    }
    // The cap only applies to exponential backoff.
    if config.startup.backoff == BackoffPolicy::Exponential
        && config.startup.max_delay_ms < config.startup.retry_delay_ms
    {
        errors.push(ValidationError::new(
            "startup.max_delay_ms",
            "must not be smaller than startup.retry_delay_ms",
        ));
    }

    if config.shutdown.close_timeout_ms == 0 {
        errors.push(ValidationError::new("shutdown.close_timeout_ms", "must be greater than 0"));
    }

    if config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::new("http.request_timeout_secs", "must be greater than 0"));
    }
    for origin in &config.http.allowed_origins {
        if !(origin.starts_with("http://") || origin.starts_with("https://")) {
            errors.push(ValidationError::new(
                "http.allowed_origins",
                format!("{origin:?} is not an http(s) origin"),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
