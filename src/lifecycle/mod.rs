//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Activate (manager.rs):
//!     Stopped → Starting → set identity → register "/" → listen → Running
//!     → resolve display address
//!
//! Deactivate (manager.rs):
//!     Running → Stopping → shutdown (errors logged) → Stopped
//!
//! Shutdown (shutdown.rs):
//!     trigger → serve loop stops accepting → drain deadline → port released
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → exit, SIGHUP → reload, SIGUSR1/2 → pause/resume
//! ```
//!
//! # Design Decisions
//! - Transitions are serialized behind one mutex
//! - Repeated activate/deactivate are no-ops, never errors
//! - Shutdown is always terminal: state ends Stopped whatever the outcome

pub mod manager;
pub mod shutdown;
pub mod signals;
pub mod state;

pub use manager::{Activation, Deactivation, LifecycleConfig, LifecycleError, ServerLifecycle};
pub use shutdown::Shutdown;
pub use signals::HostSignal;
pub use state::ServerState;
