//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `Server` header sent by default.
pub const DEFAULT_IDENTITY: &str = "GMOryx/0.1";

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HttpdConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// HTTP server behaviour.
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., ":8080" or "127.0.0.1:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: ":8080".to_string(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Value of the `Server` response header. Empty disables it.
    pub identity: Option<String>,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// How long in-flight requests may run after shutdown is requested.
    pub drain_timeout_ms: u64,

    /// Largest response body a handler may write.
    pub max_response_bytes: usize,

    /// Runtime worker threads serving connections.
    pub worker_threads: usize,
}

impl ServerConfig {
    /// Identity with empty strings treated as unset.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref().filter(|s| !s.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            identity: Some(DEFAULT_IDENTITY.to_string()),
            request_timeout_secs: 30,
            drain_timeout_ms: 2000,
            max_response_bytes: 1024 * 1024, // 1MB
            worker_threads: 2,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
