//! Host address discovery.
//!
//! Picks the address a user on another machine should connect to: the first
//! IPv4 address, in enumeration order, that is not `127.0.0.1`. Interfaces are
//! not ranked by kind; first match wins.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use crate::net::interfaces::{
    AddressFamily, NetworkInterfaceInfo, NetworkInterfaceProvider, SystemInterfaces,
};

/// Only this exact literal is skipped, not the whole loopback range.
const LOOPBACK_LITERAL: &str = "127.0.0.1";

/// The selected host address, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolvedAddress(Option<Ipv4Addr>);

impl ResolvedAddress {
    pub fn found(ip: Ipv4Addr) -> Self {
        Self(Some(ip))
    }

    pub fn absent() -> Self {
        Self(None)
    }

    pub fn ip(&self) -> Option<Ipv4Addr> {
        self.0
    }

    pub fn is_found(&self) -> bool {
        self.0.is_some()
    }

    /// Pair with a port for presentation.
    pub fn display(self, port: u16) -> DisplayAddress {
        DisplayAddress {
            address: self,
            port,
        }
    }
}

/// `http://<ip>:<port>`, or a marker when no address was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayAddress {
    pub address: ResolvedAddress,
    pub port: u16,
}

impl fmt::Display for DisplayAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address.ip() {
            Some(ip) => write!(f, "http://{}:{}", ip, self.port),
            None => f.write_str("no address found"),
        }
    }
}

/// Resolves the primary host address from an interface provider.
#[derive(Debug, Clone, Default)]
pub struct AddressResolver<P = SystemInterfaces> {
    provider: P,
}

impl<P: NetworkInterfaceProvider> AddressResolver<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Best-effort: enumeration failures resolve to absent.
    pub fn resolve_primary_address(&self) -> ResolvedAddress {
        match self.provider.interfaces() {
            Ok(interfaces) => select_primary(&interfaces),
            Err(e) => {
                tracing::debug!(error = %e, "Interface enumeration failed");
                ResolvedAddress::absent()
            }
        }
    }
}

/// First IPv4 address other than `127.0.0.1`, interface order then address order.
pub fn select_primary(interfaces: &[NetworkInterfaceInfo]) -> ResolvedAddress {
    for iface in interfaces {
        for address in &iface.addresses {
            if address.family() == AddressFamily::V6 {
                continue;
            }
            if address.ip.to_string() == LOOPBACK_LITERAL {
                continue;
            }
            if let IpAddr::V4(ip) = address.ip {
                tracing::debug!(interface = %iface.name, address = %ip, "Selected host address");
                return ResolvedAddress::found(ip);
            }
        }
    }
    ResolvedAddress::absent()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::interfaces::{InterfaceError, StaticInterfaces};

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn resolver(pairs: Vec<(&str, Vec<IpAddr>)>) -> AddressResolver<StaticInterfaces> {
        AddressResolver::new(StaticInterfaces::from_pairs(pairs))
    }

    struct DeniedInterfaces;

    impl NetworkInterfaceProvider for DeniedInterfaces {
        fn interfaces(&self) -> Result<Vec<NetworkInterfaceInfo>, InterfaceError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into())
        }
    }

    #[test]
    fn skips_loopback_and_ipv6() {
        let r = resolver(vec![
            ("eth0", vec![ip("127.0.0.1"), ip("::1")]),
            ("wlan0", vec![ip("192.168.1.5")]),
        ]);
        assert_eq!(r.resolve_primary_address().ip(), Some("192.168.1.5".parse().unwrap()));
    }

    #[test]
    fn first_match_wins() {
        let r = resolver(vec![
            ("lo", vec![ip("127.0.0.1")]),
            ("rmnet0", vec![ip("fe80::2"), ip("10.20.30.40"), ip("10.20.30.41")]),
            ("wlan0", vec![ip("192.168.1.5")]),
        ]);
        assert_eq!(r.resolve_primary_address().ip(), Some("10.20.30.40".parse().unwrap()));
    }

    #[test]
    fn only_loopback_and_ipv6_is_absent() {
        let r = resolver(vec![
            ("lo", vec![ip("127.0.0.1"), ip("::1")]),
            ("wlan0", vec![ip("fe80::1"), ip("2001:db8::5")]),
        ]);
        assert!(!r.resolve_primary_address().is_found());
    }

    #[test]
    fn loopback_check_is_literal() {
        let r = resolver(vec![("lo", vec![ip("127.0.0.1"), ip("127.0.0.2")])]);
        assert_eq!(r.resolve_primary_address().ip(), Some("127.0.0.2".parse().unwrap()));
    }

    #[test]
    fn empty_enumeration_is_absent() {
        assert_eq!(resolver(vec![]).resolve_primary_address(), ResolvedAddress::absent());
        assert!(!resolver(vec![("eth0", vec![])]).resolve_primary_address().is_found());
    }

    #[test]
    fn enumeration_failure_is_absent() {
        let r = AddressResolver::new(DeniedInterfaces);
        assert!(!r.resolve_primary_address().is_found());
    }

    #[test]
    fn display_formats() {
        let found = ResolvedAddress::found("192.168.1.5".parse().unwrap()).display(8080);
        assert_eq!(found.to_string(), "http://192.168.1.5:8080");
        assert_eq!(ResolvedAddress::absent().display(8080).to_string(), "no address found");
    }
}
