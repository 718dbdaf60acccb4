//! Wire message types.
//!
//! Every datagram and every gossip-piggybacked assertion is a [`Message`]: a
//! kind tag, a sequence number, the sender address, and an opaque payload.
//! The payload is itself an encoded [`crate::member::NodeInfo`] (liveness
//! assertions) or [`KvPayload`] (replicated-KV mutations); probes carry no
//! payload.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::NodeAddress;
use crate::codec;
use crate::error::GossipError;
use crate::member::NodeInfo;

/// Fixed per-message envelope cost charged against the gossip byte budget:
/// one byte of kind tag plus eight bytes of sequence number.
pub const ENVELOPE_OVERHEAD: usize = 1 + 8;

/// Discriminant for the message union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Failure-detector probe.
    Ping,
    /// Probe acknowledgement.
    Pong,
    /// Assertion that a node is alive at some version.
    Alive,
    /// Assertion that a node is dead at some version.
    Dead,
    /// Replicated-KV initial insert.
    KvSet,
    /// Replicated-KV removal.
    KvDelete,
    /// Replicated-KV overwrite.
    KvUpdate,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Alive => "alive",
            Self::Dead => "dead",
            Self::KvSet => "kv-set",
            Self::KvDelete => "kv-delete",
            Self::KvUpdate => "kv-update",
        };
        f.write_str(name)
    }
}

/// A single protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Which arm of the union this is.
    pub kind: MessageKind,
    /// Sequence number; random for probes, probe-seq + 1 for acks.
    pub seq: u64,
    /// The sender's advertised address.
    pub from: NodeAddress,
    /// Encoded payload; empty for probes and acks.
    pub payload: Vec<u8>,
}

/// Key-value mutation carried inside KV gossip messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvPayload {
    /// The key being mutated.
    pub key: String,
    /// The new value; empty for deletes.
    pub value: Vec<u8>,
}

impl Message {
    /// Builds a probe message with a fresh random sequence number.
    #[must_use]
    pub fn ping(from: NodeAddress) -> Self {
        Self {
            kind: MessageKind::Ping,
            seq: rand::random::<u64>(),
            from,
            payload: Vec::new(),
        }
    }

    /// Builds the acknowledgement for a probe carrying `probe_seq`.
    #[must_use]
    pub fn pong(from: NodeAddress, probe_seq: u64) -> Self {
        Self {
            kind: MessageKind::Pong,
            seq: probe_seq.wrapping_add(1),
            from,
            payload: Vec::new(),
        }
    }

    /// Builds a liveness assertion (`Alive` or `Dead`) about `info`.
    pub fn liveness(
        kind: MessageKind,
        from: NodeAddress,
        info: &NodeInfo,
    ) -> Result<Self, GossipError> {
        debug_assert!(matches!(kind, MessageKind::Alive | MessageKind::Dead));
        Ok(Self {
            kind,
            seq: rand::random::<u64>(),
            from,
            payload: codec::encode(info)?,
        })
    }

    /// Builds a KV mutation message.
    pub fn kv(
        kind: MessageKind,
        from: NodeAddress,
        payload: &KvPayload,
    ) -> Result<Self, GossipError> {
        debug_assert!(matches!(
            kind,
            MessageKind::KvSet | MessageKind::KvDelete | MessageKind::KvUpdate
        ));
        Ok(Self {
            kind,
            seq: rand::random::<u64>(),
            from,
            payload: codec::encode(payload)?,
        })
    }

    /// Decodes the payload as a liveness snapshot.
    pub fn node_info(&self) -> Result<NodeInfo, GossipError> {
        codec::decode(&self.payload)
    }

    /// Decodes the payload as a KV mutation.
    pub fn kv_payload(&self) -> Result<KvPayload, GossipError> {
        codec::decode(&self.payload)
    }
}
