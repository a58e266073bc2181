//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → HttpdConfig (validated, immutable)
//!
//! On reload (SIGHUP or file change):
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → host restarts the server lifecycle with the new config
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::HttpdConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::ServerConfig;
