//! Anti-entropy push-pull reconciliation.
//!
//! Gossip alone eventually reaches everyone, but a full-table exchange with
//! one random peer per period is the convergence backstop: both sides send
//! their complete membership snapshot and merge what they receive, so one
//! round-trip leaves each table the union of the two with the higher version
//! winning per address. Joining a cluster is the same exchange pointed at a
//! seed node.

use tracing::{debug, error, info, warn};

use crate::address::NodeAddress;
use crate::cluster::Cluster;
use crate::codec;
use crate::error::GossipError;
use crate::member::{Liveness, NodeInfo};
use crate::reconcile;

impl Cluster {
    /// Joins a cluster through `seed`: exchange snapshots and merge the
    /// response. The local list is just this node when called before any
    /// probing has happened, which is exactly what a joiner has to offer.
    ///
    /// # Errors
    ///
    /// Returns an error if `seed` is this node, or if the exchange fails.
    pub async fn join(&self, seed: &NodeAddress) -> Result<(), GossipError> {
        if *seed == self.local_addr {
            return Err(GossipError::Config("cannot join self".to_string()));
        }
        info!(seed = %seed, "joining cluster");
        self.exchange_with(seed).await
    }

    /// One anti-entropy round: push-pull with up to `push_pull_fanout`
    /// random credible peers. A failed exchange is this tick's loss; the
    /// next tick picks fresh peers.
    pub async fn run_push_pull_round(&self) {
        let targets = {
            let mb = self.membership.lock();
            mb.sample_credible(self.config.push_pull_fanout)
        };
        if targets.is_empty() {
            debug!("no credible peers for push-pull");
            return;
        }

        for target in targets {
            if let Err(e) = self.exchange_with(&target).await {
                warn!(peer = %target, error = %e, "push-pull exchange failed");
            }
        }
    }

    /// Performs the initiator side of one exchange with `peer`.
    async fn exchange_with(&self, peer: &NodeAddress) -> Result<(), GossipError> {
        let snapshot = self.membership.lock().snapshot();
        let request = codec::encode(&snapshot)?;

        let response = self.exchange.exchange(peer, &request).await?;
        let remote: Vec<NodeInfo> = codec::decode(&response)?;

        debug!(peer = %peer, records = remote.len(), "merging push-pull response");
        self.merge_snapshot(&remote);
        Ok(())
    }

    /// The responder side: merge the initiator's snapshot, reply with ours.
    /// Merging before replying means the response already reflects the
    /// union, so both sides converge in one round-trip.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be decoded.
    pub fn handle_exchange(&self, request: &[u8]) -> Result<Vec<u8>, GossipError> {
        let remote: Vec<NodeInfo> = codec::decode(request)?;
        debug!(records = remote.len(), "merging push-pull request");
        self.merge_snapshot(&remote);

        let snapshot = self.membership.lock().snapshot();
        codec::encode(&snapshot)
    }

    /// Feeds every record of a remote snapshot through the reconciler. A
    /// record asserting `Unknown` is a protocol violation: the rest of that
    /// peer's set is abandoned, already-merged records stand.
    pub(crate) fn merge_snapshot(&self, remote: &[NodeInfo]) {
        let mut outcomes = Vec::new();
        {
            let mut mb = self.membership.lock();
            for info in remote {
                match info.state {
                    Liveness::Alive => {
                        outcomes.push(reconcile::apply_alive(
                            &mut mb,
                            self.config.trust_window,
                            info,
                        ));
                    }
                    Liveness::Dead => outcomes.push(reconcile::apply_dead(&mut mb, info)),
                    Liveness::Unknown => {
                        error!(node = %info.addr, "snapshot asserts unknown state, aborting this record set");
                        break;
                    }
                }
            }
        }
        for outcome in outcomes {
            self.emit(outcome);
        }
    }
}
