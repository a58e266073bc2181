//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt subscriber, filtered by RUST_LOG)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
