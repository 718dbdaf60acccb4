//! Failure detection by randomized probing.
//!
//! Each probe round first settles the previous round's debts: every peer
//! still awaiting an ack loses one credibility, and a peer that would hit
//! zero is declared dead on the spot. Then a fresh random selection of
//! credible peers is probed. Acks restore the full trust window; an ack from
//! a peer already declared dead revives it — recovery detection that works
//! even when gossip is slow.

use tracing::{debug, info, warn};

use crate::cluster::{Cluster, Outbound};
use crate::events::MemberEvent;
use crate::member::{Liveness, Member, NodeInfo};
use crate::message::{Message, MessageKind};

impl Cluster {
    /// One failure-detector round: sweep the pending-ack set, then probe a
    /// fresh random selection of credible peers. Returns the probes to send.
    pub(crate) fn probe_round(&self) -> Vec<Outbound> {
        let mut outbound = Vec::new();
        let mut deaths: Vec<NodeInfo> = Vec::new();

        {
            let mut mb = self.membership.lock();

            // Sweep last round's unanswered probes.
            for key in mb.pending_keys() {
                let declared = match mb.get_mut(&key) {
                    Some(member) if member.credibility() <= 1 => {
                        member.mark_dead().then(|| member.info())
                    }
                    Some(member) => {
                        member.lose_credibility();
                        continue;
                    }
                    None => None,
                };
                mb.pending_remove(&key);
                if let Some(snapshot) = declared {
                    info!(node = %key, version = snapshot.version, "no ack within trust window, member is dead");
                    deaths.push(snapshot);
                }
            }

            // Probe a fresh selection. An empty credible subset is a silent
            // empty round.
            for target in mb.sample_credible(self.config.fanout) {
                debug!(node = %target, "probing");
                mb.pending_mark(target.to_string());
                outbound.push(Outbound {
                    to: target,
                    message: Message::ping(self.local_addr.clone()),
                });
            }
        }

        for snapshot in deaths {
            self.enqueue_liveness(MessageKind::Dead, &snapshot);
            self.notify(&MemberEvent::Dead(snapshot));
        }

        outbound
    }

    /// Executes a probe round and sends the probes.
    pub async fn run_probe_round(&self) {
        let outbound = self.probe_round();
        self.send_all(outbound).await;
    }

    /// Inbound probe: ack it, and auto-register senders never seen before.
    pub(crate) fn handle_ping(&self, message: Message) -> Vec<Outbound> {
        let from_key = message.from.to_string();
        let mut joined = None;

        {
            let mut mb = self.membership.lock();
            if mb.is_me(&message.from) {
                debug!("probe from own address, dropping");
                return Vec::new();
            }
            if mb.get(&from_key).is_none() {
                let mut member = Member::new(message.from.clone());
                member.mark_alive(self.config.trust_window);
                info!(node = %from_key, "new member via probe");
                joined = Some(mb.insert(member).info());
            }
        }

        if let Some(snapshot) = joined {
            self.notify(&MemberEvent::Join(snapshot));
        }

        vec![Outbound {
            to: message.from.clone(),
            message: Message::pong(self.local_addr.clone(), message.seq),
        }]
    }

    /// Inbound ack: restore the sender's credibility, or revive it if it was
    /// already declared dead (a late ack).
    pub(crate) fn handle_pong(&self, message: Message) -> Vec<Outbound> {
        let from_key = message.from.to_string();
        let mut revived = None;

        {
            let mut mb = self.membership.lock();
            let trust_window = self.config.trust_window;

            let state = match mb.get(&from_key) {
                Some(member) => member.state(),
                None => {
                    warn!(node = %from_key, "ack from unknown node, dropping");
                    return Vec::new();
                }
            };

            if state == Liveness::Dead {
                mb.pending_remove(&from_key);
                if let Some(member) = mb.get_mut(&from_key) {
                    member.mark_alive(trust_window);
                    info!(node = %from_key, version = member.version(), "dead member answered a probe, reviving");
                    revived = Some(member.info());
                }
            } else if mb.pending_remove(&from_key) {
                if let Some(member) = mb.get_mut(&from_key) {
                    member.restore_credibility(trust_window);
                }
                debug!(node = %from_key, "ack received");
            } else {
                debug!(node = %from_key, "unsolicited ack, ignoring");
            }
        }

        if let Some(snapshot) = revived {
            self.notify(&MemberEvent::Alive(snapshot));
        }

        Vec::new()
    }
}
