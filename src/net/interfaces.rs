//! Network interface enumeration.
//!
//! # Responsibilities
//! - Snapshot the interfaces visible to the process
//! - Preserve the platform's interface and address ordering
//! - Allow tests to inject a fixed interface list

use std::net::IpAddr;

/// Error type for interface enumeration.
#[derive(Debug, thiserror::Error)]
pub enum InterfaceError {
    #[error("failed to enumerate network interfaces: {0}")]
    Enumeration(#[from] std::io::Error),
}

/// Address family of a bound address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

/// An address bound to an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceAddress {
    pub ip: IpAddr,
    pub loopback: bool,
}

impl InterfaceAddress {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            loopback: ip.is_loopback(),
        }
    }

    pub fn family(&self) -> AddressFamily {
        match self.ip {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }
}

/// A system-reported interface and its addresses, in reported order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterfaceInfo {
    pub name: String,
    pub addresses: Vec<InterfaceAddress>,
}

impl NetworkInterfaceInfo {
    pub fn new(name: impl Into<String>, addresses: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            name: name.into(),
            addresses: addresses.into_iter().map(InterfaceAddress::new).collect(),
        }
    }
}

/// Source of interface snapshots.
pub trait NetworkInterfaceProvider: Send + Sync {
    /// Enumerate interfaces. Order is significant.
    fn interfaces(&self) -> Result<Vec<NetworkInterfaceInfo>, InterfaceError>;
}

/// Interfaces reported by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl NetworkInterfaceProvider for SystemInterfaces {
    fn interfaces(&self) -> Result<Vec<NetworkInterfaceInfo>, InterfaceError> {
        let mut interfaces: Vec<NetworkInterfaceInfo> = Vec::new();

        // if-addrs reports one entry per address; fold them back into
        // interfaces without disturbing first-seen order.
        for iface in if_addrs::get_if_addrs()? {
            let address = InterfaceAddress {
                ip: iface.ip(),
                loopback: iface.is_loopback(),
            };
            match interfaces.iter_mut().find(|i| i.name == iface.name) {
                Some(existing) => existing.addresses.push(address),
                None => interfaces.push(NetworkInterfaceInfo {
                    name: iface.name,
                    addresses: vec![address],
                }),
            }
        }

        tracing::trace!(count = interfaces.len(), "Enumerated network interfaces");
        Ok(interfaces)
    }
}

/// A fixed interface list.
#[derive(Debug, Clone, Default)]
pub struct StaticInterfaces {
    interfaces: Vec<NetworkInterfaceInfo>,
}

impl StaticInterfaces {
    pub fn new(interfaces: Vec<NetworkInterfaceInfo>) -> Self {
        Self { interfaces }
    }

    /// Build from `(name, addresses)` pairs.
    pub fn from_pairs<N, A>(pairs: impl IntoIterator<Item = (N, A)>) -> Self
    where
        N: Into<String>,
        A: IntoIterator<Item = IpAddr>,
    {
        Self {
            interfaces: pairs
                .into_iter()
                .map(|(name, addrs)| NetworkInterfaceInfo::new(name, addrs))
                .collect(),
        }
    }
}

impl NetworkInterfaceProvider for StaticInterfaces {
    fn interfaces(&self) -> Result<Vec<NetworkInterfaceInfo>, InterfaceError> {
        Ok(self.interfaces.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_flags() {
        let v4 = InterfaceAddress::new("127.0.0.1".parse().unwrap());
        assert!(v4.loopback);
        assert_eq!(v4.family(), AddressFamily::V4);

        let v6 = InterfaceAddress::new("fe80::1".parse().unwrap());
        assert!(!v6.loopback);
        assert_eq!(v6.family(), AddressFamily::V6);
    }

    #[test]
    fn static_interfaces_keep_order() {
        let provider = StaticInterfaces::from_pairs([
            ("wlan0", vec!["192.168.1.5".parse().unwrap()]),
            ("eth0", vec!["10.0.0.2".parse().unwrap(), "::1".parse().unwrap()]),
        ]);
        let interfaces = provider.interfaces().unwrap();
        let names: Vec<_> = interfaces.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["wlan0", "eth0"]);
        assert_eq!(interfaces[1].addresses.len(), 2);
    }
}
