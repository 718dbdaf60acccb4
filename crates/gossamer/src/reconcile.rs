//! Liveness state reconciliation.
//!
//! A pure reducer over (membership table, incoming assertion): each call
//! mutates at most one record and reports at most one broadcast and one
//! notification for the caller to emit. Versions are the sole tie-breaker —
//! an equal-or-older version never changes anything, which is what makes
//! merges idempotent and monotone no matter how often gossip echoes an
//! assertion back.

use tracing::{debug, info, warn};

use crate::events::MemberEvent;
use crate::member::{Liveness, Member, Membership, NodeInfo};
use crate::message::MessageKind;

/// Effects of one merge: zero-or-one broadcast to enqueue and zero-or-one
/// notification to fire, both after the membership lock is released.
#[derive(Debug, Default)]
pub(crate) struct MergeOutcome {
    pub(crate) broadcast: Option<(MessageKind, NodeInfo)>,
    pub(crate) event: Option<MemberEvent>,
}

impl MergeOutcome {
    fn none() -> Self {
        Self::default()
    }
}

/// Merges an `Alive(remote)` assertion into the table.
pub(crate) fn apply_alive(
    table: &mut Membership,
    trust_window: u32,
    remote: &NodeInfo,
) -> MergeOutcome {
    if table.is_me(&remote.addr) {
        return MergeOutcome::none();
    }

    let key = remote.addr.to_string();
    if !table.contains(&key) {
        // First contact: adopt the remote version as-is and keep the
        // assertion propagating.
        let mut member = Member::from_info(remote);
        member.transition_alive(trust_window);
        let snapshot = member.info();
        table.insert(member);
        info!(node = %key, version = snapshot.version, "new member via alive assertion");
        return MergeOutcome {
            broadcast: Some((MessageKind::Alive, snapshot.clone())),
            event: Some(MemberEvent::Join(snapshot)),
        };
    }
    let Some(member) = table.get_mut(&key) else {
        return MergeOutcome::none();
    };

    if remote.version <= member.version() {
        debug!(node = %key, remote = remote.version, local = member.version(), "stale alive assertion");
        return MergeOutcome::none();
    }

    member.advance_version_to(remote.version);
    if member.state().is_alive() {
        // Fresher version, same state: remember it, nothing to announce.
        return MergeOutcome::none();
    }

    member.transition_alive(trust_window);
    let snapshot = member.info();
    info!(node = %key, version = snapshot.version, "member is alive");
    MergeOutcome {
        broadcast: Some((MessageKind::Alive, snapshot.clone())),
        event: Some(MemberEvent::Alive(snapshot)),
    }
}

/// Merges a `Dead(remote)` assertion into the table, refuting reports about
/// the local node itself.
pub(crate) fn apply_dead(table: &mut Membership, remote: &NodeInfo) -> MergeOutcome {
    if table.is_me(&remote.addr) {
        return refute(table, remote);
    }

    let key = remote.addr.to_string();
    let Some(member) = table.get_mut(&key) else {
        // Cannot assert death of a peer never seen.
        debug!(node = %key, "dead assertion about unknown member, ignoring");
        return MergeOutcome::none();
    };

    if remote.version <= member.version() {
        debug!(node = %key, remote = remote.version, local = member.version(), "stale dead assertion");
        return MergeOutcome::none();
    }

    member.advance_version_to(remote.version);
    if member.state() == Liveness::Dead {
        return MergeOutcome::none();
    }

    member.transition_dead();
    let snapshot = member.info();
    info!(node = %key, version = snapshot.version, "member is dead");
    MergeOutcome {
        broadcast: Some((MessageKind::Dead, snapshot.clone())),
        event: Some(MemberEvent::Dead(snapshot)),
    }
}

/// Handles a false death report about the local node: reassert alive at a
/// version strictly above the report so it outranks the rumor everywhere.
/// Reports older than the current self-version were already refuted.
fn refute(table: &mut Membership, remote: &NodeInfo) -> MergeOutcome {
    let me = table.me_mut();
    if remote.version < me.version() {
        debug!(remote = remote.version, local = me.version(), "dead report about self already refuted");
        return MergeOutcome::none();
    }

    me.advance_version_to(remote.version + 1);
    let snapshot = me.info();
    warn!(version = snapshot.version, "refuting death report about self");
    MergeOutcome {
        broadcast: Some((MessageKind::Alive, snapshot)),
        event: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::NodeAddress;
    use test_case::test_case;

    const TRUST: u32 = 3;

    fn addr(s: &str) -> NodeAddress {
        s.parse().expect("valid address")
    }

    fn info(s: &str, state: Liveness, version: u64) -> NodeInfo {
        NodeInfo {
            addr: addr(s),
            state,
            version,
            ttl: None,
        }
    }

    fn table() -> Membership {
        let mut me = Member::new(addr("127.0.0.1:7000"));
        me.mark_alive(TRUST);
        Membership::new(me)
    }

    // ========== Alive Merge Tests ==========

    #[test]
    fn alive_about_self_is_ignored() {
        let mut t = table();
        let outcome = apply_alive(&mut t, TRUST, &info("127.0.0.1:7000", Liveness::Alive, 99));

        assert!(outcome.broadcast.is_none());
        assert!(outcome.event.is_none());
        assert_eq!(t.me().version(), 1);
    }

    #[test]
    fn alive_about_unknown_creates_and_joins() {
        let mut t = table();
        let outcome = apply_alive(&mut t, TRUST, &info("10.0.0.2:7000", Liveness::Alive, 5));

        let member = t.get("10.0.0.2:7000").expect("created");
        assert_eq!(member.state(), Liveness::Alive);
        assert_eq!(member.version(), 5);
        assert_eq!(member.credibility(), TRUST);
        assert!(matches!(outcome.event, Some(MemberEvent::Join(_))));
        assert!(matches!(outcome.broadcast, Some((MessageKind::Alive, _))));
    }

    #[test_case(5, 5; "equal version")]
    #[test_case(5, 3; "older version")]
    fn alive_with_stale_version_is_noop(local: u64, remote: u64) {
        let mut t = table();
        apply_alive(&mut t, TRUST, &info("10.0.0.2:7000", Liveness::Alive, local));

        let outcome = apply_alive(&mut t, TRUST, &info("10.0.0.2:7000", Liveness::Alive, remote));

        assert!(outcome.broadcast.is_none());
        assert!(outcome.event.is_none());
        let member = t.get("10.0.0.2:7000").expect("present");
        assert_eq!(member.version(), local);
    }

    #[test]
    fn alive_resurrects_dead_member_with_newer_version() {
        let mut t = table();
        apply_alive(&mut t, TRUST, &info("10.0.0.2:7000", Liveness::Alive, 1));
        apply_dead(&mut t, &info("10.0.0.2:7000", Liveness::Dead, 2));

        let outcome = apply_alive(&mut t, TRUST, &info("10.0.0.2:7000", Liveness::Alive, 3));

        let member = t.get("10.0.0.2:7000").expect("present");
        assert_eq!(member.state(), Liveness::Alive);
        assert_eq!(member.version(), 3);
        assert_eq!(member.credibility(), TRUST);
        assert!(matches!(outcome.event, Some(MemberEvent::Alive(_))));
        assert!(matches!(outcome.broadcast, Some((MessageKind::Alive, _))));
    }

    #[test]
    fn alive_with_newer_version_same_state_updates_silently() {
        let mut t = table();
        apply_alive(&mut t, TRUST, &info("10.0.0.2:7000", Liveness::Alive, 1));

        let outcome = apply_alive(&mut t, TRUST, &info("10.0.0.2:7000", Liveness::Alive, 4));

        assert!(outcome.broadcast.is_none());
        assert!(outcome.event.is_none());
        assert_eq!(t.get("10.0.0.2:7000").expect("present").version(), 4);
    }

    // ========== Dead Merge Tests ==========

    #[test]
    fn dead_about_unknown_is_noop() {
        let mut t = table();
        let outcome = apply_dead(&mut t, &info("10.0.0.9:7000", Liveness::Dead, 4));

        assert!(outcome.broadcast.is_none());
        assert!(t.get("10.0.0.9:7000").is_none());
    }

    #[test]
    fn dead_transitions_known_alive_member() {
        let mut t = table();
        apply_alive(&mut t, TRUST, &info("10.0.0.2:7000", Liveness::Alive, 1));

        let outcome = apply_dead(&mut t, &info("10.0.0.2:7000", Liveness::Dead, 2));

        let member = t.get("10.0.0.2:7000").expect("present");
        assert_eq!(member.state(), Liveness::Dead);
        assert_eq!(member.version(), 2);
        assert_eq!(member.credibility(), 0);
        assert!(matches!(outcome.event, Some(MemberEvent::Dead(_))));
        assert!(matches!(outcome.broadcast, Some((MessageKind::Dead, _))));
    }

    #[test_case(3, 3; "equal version")]
    #[test_case(3, 2; "older version")]
    fn dead_with_stale_version_is_noop(local: u64, remote: u64) {
        let mut t = table();
        apply_alive(&mut t, TRUST, &info("10.0.0.2:7000", Liveness::Alive, local));

        let outcome = apply_dead(&mut t, &info("10.0.0.2:7000", Liveness::Dead, remote));

        assert!(outcome.broadcast.is_none());
        assert!(t.get("10.0.0.2:7000").expect("present").state().is_alive());
    }

    // ========== Idempotence / Monotonicity Tests ==========

    #[test]
    fn same_assertion_twice_changes_nothing_after_first() {
        let mut t = table();
        let assertion = info("10.0.0.2:7000", Liveness::Alive, 7);

        let first = apply_alive(&mut t, TRUST, &assertion);
        assert!(first.event.is_some());
        assert!(first.broadcast.is_some());
        let version_after_first = t.get("10.0.0.2:7000").expect("present").version();

        let second = apply_alive(&mut t, TRUST, &assertion);
        assert!(second.event.is_none());
        assert!(second.broadcast.is_none());
        assert_eq!(
            t.get("10.0.0.2:7000").expect("present").version(),
            version_after_first
        );
    }

    #[test]
    fn versions_never_regress_across_merge_sequences() {
        let mut t = table();
        let peer = "10.0.0.2:7000";
        let sequence = [
            (MessageKind::Alive, 3),
            (MessageKind::Dead, 1),
            (MessageKind::Alive, 2),
            (MessageKind::Dead, 6),
            (MessageKind::Alive, 4),
        ];

        let mut last = 0;
        for (kind, version) in sequence {
            match kind {
                MessageKind::Alive => {
                    apply_alive(&mut t, TRUST, &info(peer, Liveness::Alive, version))
                }
                _ => apply_dead(&mut t, &info(peer, Liveness::Dead, version)),
            };
            let now = t.get(peer).expect("present").version();
            assert!(now >= last, "version regressed from {last} to {now}");
            last = now;
        }
        assert_eq!(last, 6);
        assert_eq!(t.get(peer).expect("present").state(), Liveness::Dead);
    }

    // ========== Self-Refutation Tests ==========

    #[test]
    fn dead_report_about_self_is_refuted_above_report_version() {
        let mut t = table();
        let report_version = t.me().version() + 3;

        let outcome = apply_dead(&mut t, &info("127.0.0.1:7000", Liveness::Dead, report_version));

        assert!(t.me().version() > report_version);
        assert!(t.me().state().is_alive());
        match outcome.broadcast {
            Some((MessageKind::Alive, ref snapshot)) => {
                assert_eq!(snapshot.addr, addr("127.0.0.1:7000"));
                assert_eq!(snapshot.version, t.me().version());
            }
            other => panic!("expected alive refutation broadcast, got {other:?}"),
        }
        assert!(outcome.event.is_none());
    }

    #[test]
    fn repeated_dead_report_is_refuted_once() {
        let mut t = table();
        let report = info("127.0.0.1:7000", Liveness::Dead, t.me().version());

        let first = apply_dead(&mut t, &report);
        assert!(first.broadcast.is_some());
        let refuted_at = t.me().version();

        let second = apply_dead(&mut t, &report);
        assert!(second.broadcast.is_none());
        assert_eq!(t.me().version(), refuted_at);
    }
}
