//! Payload serialization.
//!
//! Thin wrappers around bincode so the rest of the crate never names the
//! concrete serializer. Everything that crosses the wire — [`crate::Message`]
//! envelopes, `NodeInfo` snapshots, KV payloads — goes through these two
//! functions.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::GossipError;

/// Encodes a value to its wire bytes.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, GossipError> {
    Ok(bincode::serialize(value)?)
}

/// Decodes a value from wire bytes.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, GossipError> {
    Ok(bincode::deserialize(bytes)?)
}
