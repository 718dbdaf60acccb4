//! # gossamer
//!
//! Decentralized cluster membership with a gossip-replicated key-value
//! store.
//!
//! Every node keeps a local, eventually-consistent view of which peers are
//! alive. Failures are detected by randomized probing with a decaying trust
//! counter, state changes spread epidemically through a budgeted broadcast
//! queue, and periodic full-table push-pull exchanges backstop convergence.
//! A small replicated KV store piggybacks on the same gossip channel.
//!
//! ## Core Types
//!
//! - [`Cluster`]: one node of the mesh — construct, `join`, `run`
//! - [`ClusterConfig`]: immutable configuration with builder methods
//! - [`NodeAddress`] / [`NodeInfo`] / [`Liveness`]: member identity and state
//! - [`BroadcastQueue`]: size-then-life priority queue draining under a byte
//!   budget
//! - [`EventDelegate`]: join/alive/dead membership notifications
//! - [`KvWatch`]: one-shot future resolving on a watched KV mutation
//! - [`DatagramTransport`] / [`ExchangeTransport`]: transport seams with
//!   tokio-backed implementations

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod address;
mod antientropy;
pub mod broadcast;
pub mod cluster;
pub mod codec;
pub mod config;
mod detector;
pub mod error;
pub mod events;
mod kv;
pub mod member;
pub mod message;
mod reconcile;
pub mod transport;
pub mod watch;

pub use address::NodeAddress;
pub use broadcast::BroadcastQueue;
pub use cluster::{Cluster, Outbound, ShutdownRx, ShutdownTx};
pub use config::ClusterConfig;
pub use error::GossipError;
pub use events::EventDelegate;
pub use member::{Liveness, NodeInfo};
pub use message::{ENVELOPE_OVERHEAD, KvPayload, Message, MessageKind};
pub use transport::{
    BoxFuture, DatagramTransport, ExchangeTransport, TcpExchangeTransport, UdpDatagramTransport,
};
pub use watch::{KvEventKind, KvWatch};
