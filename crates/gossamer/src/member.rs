//! Per-peer liveness records and the membership table.
//!
//! A [`Member`] is the local view of one peer: liveness state, a monotonic
//! version, and a decaying credibility counter. State, version, and
//! credibility always change together under the [`Membership`] lock held by
//! the caller — there are no per-field atomics to race on.
//!
//! Membership is append-only: peers are created on first contact and never
//! removed; permanent departure is the terminal `Dead` state.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::address::NodeAddress;

/// Liveness state of a peer as seen by the local node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Liveness {
    /// Created but not yet asserted either way.
    Unknown,
    /// Responding to probes, or asserted alive by gossip.
    Alive,
    /// Declared dead after unanswered probes or by gossip.
    Dead,
}

impl Liveness {
    /// Returns true if the peer is currently considered alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        matches!(self, Self::Alive)
    }
}

/// Wire-level snapshot of a peer: the unit exchanged in gossip payloads and
/// anti-entropy lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// The peer's advertised address.
    pub addr: NodeAddress,
    /// Asserted liveness state.
    pub state: Liveness,
    /// Version the assertion was made at.
    pub version: u64,
    /// Reserved for external reapers; never interpreted by the core.
    pub ttl: Option<u32>,
}

/// Local runtime record for one peer.
#[derive(Debug, Clone)]
pub(crate) struct Member {
    addr: NodeAddress,
    state: Liveness,
    version: u64,
    credibility: u32,
}

impl Member {
    /// Creates a record for a peer seen for the first time.
    pub(crate) fn new(addr: NodeAddress) -> Self {
        Self {
            addr,
            state: Liveness::Unknown,
            version: 0,
            credibility: 0,
        }
    }

    /// Creates a record seeded from a remote snapshot.
    pub(crate) fn from_info(info: &NodeInfo) -> Self {
        Self {
            addr: info.addr.clone(),
            state: info.state,
            version: info.version,
            credibility: 0,
        }
    }

    pub(crate) fn addr(&self) -> &NodeAddress {
        &self.addr
    }

    pub(crate) fn state(&self) -> Liveness {
        self.state
    }

    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn credibility(&self) -> u32 {
        self.credibility
    }

    pub(crate) fn is_credible(&self) -> bool {
        self.credibility > 0
    }

    /// Raises the version to `v`. Returns false (and leaves the version
    /// untouched) if `v` is not strictly greater: versions never decrease.
    pub(crate) fn advance_version_to(&mut self, v: u64) -> bool {
        if v <= self.version {
            return false;
        }
        self.version = v;
        true
    }

    /// Switches to `Alive` and restores the trust window. Does not touch the
    /// version; callers decide whether this is a local bump or a remote merge.
    pub(crate) fn transition_alive(&mut self, trust_window: u32) {
        self.state = Liveness::Alive;
        self.credibility = trust_window;
    }

    /// Switches to `Dead`. A dead peer has zero credibility until it comes
    /// back alive.
    pub(crate) fn transition_dead(&mut self) {
        self.state = Liveness::Dead;
        self.credibility = 0;
    }

    /// Locally observed transition to `Alive` (probe path, self bootstrap):
    /// bumps the version and restores credibility. No-op when already alive.
    pub(crate) fn mark_alive(&mut self, trust_window: u32) -> bool {
        if self.state == Liveness::Alive {
            return false;
        }
        self.version += 1;
        self.transition_alive(trust_window);
        true
    }

    /// Locally observed transition to `Dead` (failed probes): bumps the
    /// version so the assertion outranks the peer's last known state. No-op
    /// when already dead.
    pub(crate) fn mark_dead(&mut self) -> bool {
        if self.state == Liveness::Dead {
            return false;
        }
        self.version += 1;
        self.transition_dead();
        true
    }

    /// Resets credibility to the trust window without a state transition.
    pub(crate) fn restore_credibility(&mut self, trust_window: u32) {
        self.credibility = trust_window;
    }

    /// Burns one round of credibility.
    pub(crate) fn lose_credibility(&mut self) {
        self.credibility = self.credibility.saturating_sub(1);
    }

    /// Returns the wire snapshot of this record.
    pub(crate) fn info(&self) -> NodeInfo {
        NodeInfo {
            addr: self.addr.clone(),
            state: self.state,
            version: self.version,
            ttl: None,
        }
    }
}

/// The membership table plus the local node's own record.
///
/// An ordered list drives random sampling; a string-keyed index gives O(1)
/// lookups. Exactly one entry exists per distinct address, and the local
/// record (`me`) lives here too so self-refutation mutates state and version
/// under the same lock as every other transition.
#[derive(Debug)]
pub(crate) struct Membership {
    me: Member,
    members: Vec<Member>,
    index: HashMap<String, usize>,
    pending_acks: HashSet<String>,
}

impl Membership {
    pub(crate) fn new(me: Member) -> Self {
        Self {
            me,
            members: Vec::new(),
            index: HashMap::new(),
            pending_acks: HashSet::new(),
        }
    }

    pub(crate) fn me(&self) -> &Member {
        &self.me
    }

    pub(crate) fn me_mut(&mut self) -> &mut Member {
        &mut self.me
    }

    pub(crate) fn is_me(&self, addr: &NodeAddress) -> bool {
        self.me.addr() == addr
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Member> {
        self.index.get(key).map(|&i| &self.members[i])
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut Member> {
        let i = *self.index.get(key)?;
        Some(&mut self.members[i])
    }

    /// Inserts a new record, returning a handle to it. If the address is
    /// already present the existing record wins and is returned instead.
    pub(crate) fn insert(&mut self, member: Member) -> &mut Member {
        let key = member.addr().to_string();
        if let Some(&i) = self.index.get(&key) {
            tracing::warn!(node = %key, "member already exists, keeping current record");
            return &mut self.members[i];
        }
        let i = self.members.len();
        self.members.push(member);
        self.index.insert(key, i);
        &mut self.members[i]
    }

    /// Full-state snapshot for anti-entropy: the local record first, then
    /// every known peer.
    pub(crate) fn snapshot(&self) -> Vec<NodeInfo> {
        let mut out = Vec::with_capacity(self.members.len() + 1);
        out.push(self.me.info());
        out.extend(self.members.iter().map(Member::info));
        out
    }

    /// Picks up to `k` distinct peers uniformly at random from the credible
    /// subset. Fewer than `k` credible peers yields a shorter (possibly
    /// empty) selection.
    pub(crate) fn sample_credible(&self, k: usize) -> Vec<NodeAddress> {
        let mut candidates: Vec<&Member> =
            self.members.iter().filter(|m| m.is_credible()).collect();
        candidates.shuffle(&mut rand::thread_rng());
        candidates.truncate(k);
        candidates.into_iter().map(|m| m.addr().clone()).collect()
    }

    // Pending-ack bookkeeping for the failure detector. Kept inside the
    // table so the sweep and any concurrent merge see one consistent view.

    pub(crate) fn pending_mark(&mut self, key: String) {
        self.pending_acks.insert(key);
    }

    pub(crate) fn pending_remove(&mut self, key: &str) -> bool {
        self.pending_acks.remove(key)
    }

    pub(crate) fn pending_keys(&self) -> Vec<String> {
        self.pending_acks.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRUST: u32 = 3;

    fn addr(s: &str) -> NodeAddress {
        s.parse().expect("valid address")
    }

    fn table_with(peers: &[(&str, u32)]) -> Membership {
        let mut me = Member::new(addr("127.0.0.1:7000"));
        me.mark_alive(TRUST);
        let mut table = Membership::new(me);
        for (a, cred) in peers {
            let mut m = Member::new(addr(a));
            m.mark_alive(*cred);
            if *cred == 0 {
                m.transition_dead();
            }
            table.insert(m);
        }
        table
    }

    // ========== Member Transition Tests ==========

    #[test]
    fn new_member_starts_unknown() {
        let m = Member::new(addr("10.0.0.1:7000"));
        assert_eq!(m.state(), Liveness::Unknown);
        assert_eq!(m.version(), 0);
        assert!(!m.is_credible());
    }

    #[test]
    fn mark_alive_bumps_version_and_restores_trust() {
        let mut m = Member::new(addr("10.0.0.1:7000"));

        assert!(m.mark_alive(TRUST));
        assert_eq!(m.state(), Liveness::Alive);
        assert_eq!(m.version(), 1);
        assert_eq!(m.credibility(), TRUST);

        // Already alive: nothing changes.
        assert!(!m.mark_alive(TRUST));
        assert_eq!(m.version(), 1);
    }

    #[test]
    fn mark_dead_zeroes_credibility() {
        let mut m = Member::new(addr("10.0.0.1:7000"));
        m.mark_alive(TRUST);

        assert!(m.mark_dead());
        assert_eq!(m.state(), Liveness::Dead);
        assert_eq!(m.version(), 2);
        assert_eq!(m.credibility(), 0);

        assert!(!m.mark_dead());
        assert_eq!(m.version(), 2);
    }

    #[test]
    fn version_never_decreases() {
        let mut m = Member::new(addr("10.0.0.1:7000"));
        assert!(m.advance_version_to(5));
        assert!(!m.advance_version_to(5));
        assert!(!m.advance_version_to(3));
        assert_eq!(m.version(), 5);
    }

    #[test]
    fn lose_credibility_saturates_at_zero() {
        let mut m = Member::new(addr("10.0.0.1:7000"));
        m.mark_alive(1);
        m.lose_credibility();
        m.lose_credibility();
        assert_eq!(m.credibility(), 0);
    }

    // ========== Membership Table Tests ==========

    #[test]
    fn insert_is_idempotent_per_address() {
        let mut table = table_with(&[]);
        table.insert(Member::new(addr("10.0.0.1:7000")));
        table.insert(Member::new(addr("10.0.0.1:7000")));

        assert_eq!(table.len(), 1);
        assert!(table.get("10.0.0.1:7000").is_some());
    }

    #[test]
    fn snapshot_leads_with_me() {
        let table = table_with(&[("10.0.0.1:7000", TRUST), ("10.0.0.2:7000", TRUST)]);
        let snapshot = table.snapshot();

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].addr, addr("127.0.0.1:7000"));
        assert_eq!(snapshot[0].state, Liveness::Alive);
    }

    #[test]
    fn sample_skips_non_credible_peers() {
        let table = table_with(&[
            ("10.0.0.1:7000", TRUST),
            ("10.0.0.2:7000", 0),
            ("10.0.0.3:7000", TRUST),
        ]);

        for _ in 0..16 {
            let picked = table.sample_credible(3);
            assert_eq!(picked.len(), 2);
            assert!(!picked.contains(&addr("10.0.0.2:7000")));
        }
    }

    #[test]
    fn sample_with_no_credible_peers_is_empty() {
        let table = table_with(&[("10.0.0.1:7000", 0)]);
        assert!(table.sample_credible(3).is_empty());
    }

    #[test]
    fn sample_respects_k() {
        let table = table_with(&[
            ("10.0.0.1:7000", TRUST),
            ("10.0.0.2:7000", TRUST),
            ("10.0.0.3:7000", TRUST),
            ("10.0.0.4:7000", TRUST),
        ]);
        assert_eq!(table.sample_credible(2).len(), 2);
    }

    #[test]
    fn pending_bookkeeping() {
        let mut table = table_with(&[("10.0.0.1:7000", TRUST)]);
        table.pending_mark("10.0.0.1:7000".to_string());

        assert_eq!(table.pending_keys(), vec!["10.0.0.1:7000".to_string()]);
        assert!(table.pending_remove("10.0.0.1:7000"));
        assert!(!table.pending_remove("10.0.0.1:7000"));
    }
}
