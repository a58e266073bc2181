//! HTTP server subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum + tower-http: request ID, trace span, timeout, Server header)
//!     → registry.rs (pattern lookup: exact, then longest subtree)
//!     → handler.rs (HttpRequest in, ResponseWriter out)
//!     → root.rs (welcome page at "/")
//!     → Send to client, Server header stamped
//! ```

pub mod handler;
pub mod registry;
pub mod root;
pub mod server;

pub use handler::{Handler, HandlerError, HttpRequest, ResponseWriter, WriteError};
pub use registry::HandlerRegistry;
pub use root::{RootHandler, WELCOME_HTML};
pub use server::{AxumServer, HttpServer, ServeOptions, ServerError};
