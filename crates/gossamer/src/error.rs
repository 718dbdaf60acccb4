//! Error types for gossamer.

use thiserror::Error;

/// Errors that can occur in cluster operations.
///
/// Only [`GossipError::Config`] is fatal, and only at construction time.
/// Everything else is a per-unit-of-work failure: the affected probe, gossip
/// send, or exchange round is logged and abandoned while the node keeps
/// running.
#[derive(Debug, Error)]
pub enum GossipError {
    /// Invalid configuration, rejected at construction time.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO failure on a transport operation.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// A peer violated the protocol (unknown message kind, bad state value).
    #[error("protocol error: {0}")]
    Protocol(String),
}
