//! Membership change notifications.

use crate::member::NodeInfo;

/// Receives membership transitions observed by the local node.
///
/// Callbacks run synchronously on the task that observed the transition,
/// after internal locks are released, and fire at most once per actual state
/// change — duplicate gossip about a transition already applied is silent.
/// Implementations should return quickly; hand off to a channel for anything
/// slow.
pub trait EventDelegate: Send + Sync {
    /// A peer was seen for the first time.
    fn on_join(&self, node: &NodeInfo) {
        let _ = node;
    }

    /// A known peer transitioned to alive.
    fn on_alive(&self, node: &NodeInfo) {
        let _ = node;
    }

    /// A known peer transitioned to dead.
    fn on_dead(&self, node: &NodeInfo) {
        let _ = node;
    }
}

/// Internal record of a transition to report once locks are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MemberEvent {
    /// First contact with a peer.
    Join(NodeInfo),
    /// Dead-or-unknown peer became alive.
    Alive(NodeInfo),
    /// Peer was declared dead.
    Dead(NodeInfo),
}

impl MemberEvent {
    pub(crate) fn dispatch(&self, delegate: &dyn EventDelegate) {
        match self {
            Self::Join(info) => delegate.on_join(info),
            Self::Alive(info) => delegate.on_alive(info),
            Self::Dead(info) => delegate.on_dead(info),
        }
    }
}
