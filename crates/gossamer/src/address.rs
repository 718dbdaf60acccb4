//! Network endpoint identity.
//!
//! A [`NodeAddress`] is the identity of a cluster member: an IP and a port,
//! optionally decorated with a human-readable name. Two addresses are equal
//! when IP and port are equal; the name is display-only and never takes part
//! in equality, hashing, or the wire key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::error::GossipError;

/// Identity of a cluster member endpoint.
///
/// The canonical string form `ip:port` (via [`fmt::Display`]) is used as the
/// membership map key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAddress {
    ip: IpAddr,
    port: u16,
    name: Option<String>,
}

impl NodeAddress {
    /// Creates an address from an IP and port.
    #[must_use]
    pub const fn new(ip: IpAddr, port: u16) -> Self {
        Self {
            ip,
            port,
            name: None,
        }
    }

    /// Returns a copy of this address carrying a human-readable name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the IP component.
    #[must_use]
    pub const fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Returns the port component.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the human-readable name, if one was attached.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the address as a socket address for transport calls.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl PartialEq for NodeAddress {
    fn eq(&self, other: &Self) -> bool {
        self.ip == other.ip && self.port == other.port
    }
}

impl Eq for NodeAddress {}

impl std::hash::Hash for NodeAddress {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.ip.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", SocketAddr::new(self.ip, self.port))
    }
}

impl From<SocketAddr> for NodeAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl FromStr for NodeAddress {
    type Err = GossipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let socket: SocketAddr = s
            .parse()
            .map_err(|_| GossipError::Config(format!("invalid address '{s}', expected ip:port")))?;
        Ok(Self::from(socket))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> NodeAddress {
        s.parse().expect("valid address")
    }

    #[test]
    fn parse_and_display_round_trip() {
        let a = addr("127.0.0.1:7946");
        assert_eq!(a.ip(), IpAddr::from([127, 0, 0, 1]));
        assert_eq!(a.port(), 7946);
        assert_eq!(a.to_string(), "127.0.0.1:7946");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("not-an-address".parse::<NodeAddress>().is_err());
        assert!("127.0.0.1".parse::<NodeAddress>().is_err());
    }

    #[test]
    fn equality_ignores_name() {
        let plain = addr("10.0.0.1:9000");
        let named = addr("10.0.0.1:9000").with_name("node-a");

        assert_eq!(plain, named);
        assert_eq!(named.name(), Some("node-a"));
    }

    #[test]
    fn equality_distinguishes_ports() {
        assert_ne!(addr("10.0.0.1:9000"), addr("10.0.0.1:9001"));
        assert_ne!(addr("10.0.0.1:9000"), addr("10.0.0.2:9000"));
    }

    #[test]
    fn hash_consistent_with_equality() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(addr("10.0.0.1:9000").with_name("a"));
        assert!(set.contains(&addr("10.0.0.1:9000")));
    }
}
