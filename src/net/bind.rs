//! Listen address parsing.
//!
//! Accepts both full socket addresses (`127.0.0.1:8080`, `[::]:8080`) and the
//! short `:8080` form, which binds every IPv4 interface.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

/// Port used when no bind address is configured.
pub const DEFAULT_PORT: u16 = 8080;

/// Error type for bind address parsing.
#[derive(Debug, thiserror::Error)]
pub enum BindAddressError {
    #[error("bind address is empty")]
    Empty,
    #[error("invalid bind address {input:?}: {reason}")]
    Invalid { input: String, reason: String },
}

/// An address the HTTP server listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindAddress(SocketAddr);

impl BindAddress {
    /// Bind every IPv4 interface on `port`.
    pub fn all_interfaces(port: u16) -> Self {
        Self(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.0
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }
}

impl Default for BindAddress {
    fn default() -> Self {
        Self::all_interfaces(DEFAULT_PORT)
    }
}

impl From<SocketAddr> for BindAddress {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl FromStr for BindAddress {
    type Err = BindAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(BindAddressError::Empty);
        }

        if let Some(port) = s.strip_prefix(':') {
            return port
                .parse::<u16>()
                .map(Self::all_interfaces)
                .map_err(|e| BindAddressError::Invalid {
                    input: s.to_string(),
                    reason: e.to_string(),
                });
        }

        s.parse::<SocketAddr>()
            .map(Self)
            .map_err(|e| BindAddressError::Invalid {
                input: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl fmt::Display for BindAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
