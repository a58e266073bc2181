//! Structured logging.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(config: &ObservabilityConfig) -> String {
    format!(
        "gmoryx_httpd={level},tower_http={level}",
        level = config.log_level
    )
}

/// Install the global subscriber. `RUST_LOG` takes precedence over config.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
