//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check the identity is usable as a header value
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HttpdConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderValue;

use crate::config::schema::HttpdConfig;
use crate::net::BindAddress;

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

/// Validate a parsed configuration.
pub fn validate_config(config: &HttpdConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.listener.bind_address.parse::<BindAddress>() {
        errors.push(ValidationError::new("listener.bind_address", e.to_string()));
    }

    if let Some(identity) = config.server.identity() {
        if HeaderValue::from_str(identity).is_err() {
            errors.push(ValidationError::new(
                "server.identity",
                "must be a valid header value",
            ));
        }
    }

    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }
    if config.server.drain_timeout_ms == 0 {
        errors.push(ValidationError::new("server.drain_timeout_ms", "must be > 0"));
    }
    if config.server.max_response_bytes == 0 {
        errors.push(ValidationError::new("server.max_response_bytes", "must be > 0"));
    }
    if config.server.worker_threads == 0 {
        errors.push(ValidationError::new("server.worker_threads", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {:?}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
