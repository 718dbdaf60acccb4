//! Cluster configuration.

use std::net::SocketAddr;
use std::time::Duration;

use crate::address::NodeAddress;
use crate::error::GossipError;

/// Configuration for a cluster node.
///
/// Built once, validated at construction, and immutable afterwards. Defaults
/// suit a LAN deployment; [`ClusterConfig::local`] tightens the timers for
/// single-host development clusters.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Address the UDP and TCP listeners bind to.
    pub bind_addr: SocketAddr,
    /// Address advertised to peers; defaults to `bind_addr`.
    pub advertise_addr: Option<SocketAddr>,
    /// Human-readable node name attached to the advertised address.
    pub name: Option<String>,
    /// Interval between failure-detector probe rounds.
    pub probe_interval: Duration,
    /// Interval between gossip fan-out rounds.
    pub gossip_interval: Duration,
    /// Interval between anti-entropy push-pull exchanges.
    pub push_pull_interval: Duration,
    /// Connect/read/write deadline for one reliable exchange.
    pub exchange_timeout: Duration,
    /// Peers probed and gossiped to per round.
    pub fanout: usize,
    /// Peers exchanged with per anti-entropy round.
    pub push_pull_fanout: usize,
    /// Credibility granted when a peer becomes credible; one unit burns per
    /// unanswered probe round.
    pub trust_window: u32,
    /// Rounds each broadcast item is retransmitted before being dropped.
    pub broadcast_life: u8,
    /// Byte ceiling for one gossip round's drained messages.
    pub udp_payload_limit: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9632)),
            advertise_addr: None,
            name: None,
            probe_interval: Duration::from_millis(500),
            gossip_interval: Duration::from_millis(500),
            push_pull_interval: Duration::from_secs(20),
            exchange_timeout: Duration::from_secs(5),
            fanout: 3,
            push_pull_fanout: 1,
            trust_window: 3,
            broadcast_life: 3,
            udp_payload_limit: 2048,
        }
    }
}

impl ClusterConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset for single-host development clusters: loopback bind and a
    /// short anti-entropy period.
    #[must_use]
    pub fn local(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], port)),
            probe_interval: Duration::from_millis(300),
            gossip_interval: Duration::from_millis(300),
            push_pull_interval: Duration::from_secs(2),
            ..Self::default()
        }
    }

    /// Sets the bind address.
    #[must_use]
    pub const fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sets the advertised address.
    #[must_use]
    pub const fn with_advertise_addr(mut self, addr: SocketAddr) -> Self {
        self.advertise_addr = Some(addr);
        self
    }

    /// Sets the node name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the probe interval.
    #[must_use]
    pub const fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    /// Sets the gossip interval.
    #[must_use]
    pub const fn with_gossip_interval(mut self, interval: Duration) -> Self {
        self.gossip_interval = interval;
        self
    }

    /// Sets the anti-entropy interval.
    #[must_use]
    pub const fn with_push_pull_interval(mut self, interval: Duration) -> Self {
        self.push_pull_interval = interval;
        self
    }

    /// Sets the probe/gossip fanout.
    #[must_use]
    pub const fn with_fanout(mut self, fanout: usize) -> Self {
        self.fanout = fanout;
        self
    }

    /// Sets the trust window.
    #[must_use]
    pub const fn with_trust_window(mut self, trust_window: u32) -> Self {
        self.trust_window = trust_window;
        self
    }

    /// Sets the gossip byte budget per round.
    #[must_use]
    pub const fn with_udp_payload_limit(mut self, limit: usize) -> Self {
        self.udp_payload_limit = limit;
        self
    }

    /// The address peers are told to reach this node at.
    #[must_use]
    pub fn advertise(&self) -> NodeAddress {
        let addr = NodeAddress::from(self.advertise_addr.unwrap_or(self.bind_addr));
        match &self.name {
            Some(name) => addr.with_name(name.clone()),
            None => addr,
        }
    }

    /// Checks the configuration for values the node cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`GossipError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), GossipError> {
        if self.advertise().port() == 0 {
            return Err(GossipError::Config(
                "advertise port must be non-zero".to_string(),
            ));
        }
        if self.fanout == 0 {
            return Err(GossipError::Config("fanout must be at least 1".to_string()));
        }
        if self.push_pull_fanout == 0 {
            return Err(GossipError::Config(
                "push-pull fanout must be at least 1".to_string(),
            ));
        }
        if self.trust_window == 0 {
            return Err(GossipError::Config(
                "trust window must be at least 1".to_string(),
            ));
        }
        if self.broadcast_life == 0 {
            return Err(GossipError::Config(
                "broadcast life must be at least 1".to_string(),
            ));
        }
        if self.udp_payload_limit < 512 {
            return Err(GossipError::Config(
                "udp payload limit must be at least 512 bytes".to_string(),
            ));
        }
        Ok(())
    }
}
