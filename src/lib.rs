//! Embeddable HTTP server host.
//!
//! Starts and stops an HTTP server serving a welcome page at `/`, and finds
//! the LAN address a user on another machine should connect to.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::HttpdConfig;
pub use http::{AxumServer, HttpServer};
pub use lifecycle::{Activation, Deactivation, ServerLifecycle, ServerState};
pub use net::{AddressResolver, ResolvedAddress};
