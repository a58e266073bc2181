//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Operating system / injected list
//!     → interfaces.rs (NetworkInterfaceProvider snapshot)
//!     → address.rs (filter IPv6 and 127.0.0.1, first match wins)
//!     → DisplayAddress shown to the user
//!
//! Configured listen address
//!     → bind.rs (":8080" or "ip:port")
//!     → HTTP server listener
//! ```
//!
//! # Design Decisions
//! - Address discovery is best effort: failures mean "no address"
//! - Enumeration order is preserved so selection is deterministic

pub mod address;
pub mod bind;
pub mod interfaces;

pub use address::{AddressResolver, DisplayAddress, ResolvedAddress};
pub use bind::BindAddress;
pub use interfaces::{
    NetworkInterfaceInfo, NetworkInterfaceProvider, StaticInterfaces, SystemInterfaces,
};
