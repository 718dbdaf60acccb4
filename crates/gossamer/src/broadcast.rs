//! Priority queue of pending gossip.
//!
//! Every liveness or KV state change lands here before fanning out. Items are
//! ordered by encoded payload size, then by remaining retransmit life, so the
//! cheapest and oldest assertions surface first when a round drains under the
//! transport byte budget. Retransmission is bounded: each drain burns one
//! life, and an item whose life reaches zero is dropped instead of requeued.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

use crate::message::{ENVELOPE_OVERHEAD, Message};

/// Ordering key: payload size, then remaining life, then an insertion
/// sequence to keep keys unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ItemKey {
    size: usize,
    life: u8,
    seq: u64,
}

#[derive(Debug)]
struct QueueEntry {
    dedup: String,
    message: Message,
}

#[derive(Debug, Default)]
struct QueueInner {
    items: BTreeMap<ItemKey, QueueEntry>,
    by_dedup: HashMap<String, ItemKey>,
    next_seq: u64,
}

/// Queue of gossip items pending dissemination.
///
/// `put` with the dedup key of a live entry replaces it: the most recent
/// assertion about a peer (or KV key) supersedes anything still waiting to
/// go out, so stale Alive/Dead flapping never lingers.
#[derive(Debug)]
pub struct BroadcastQueue {
    inner: Mutex<QueueInner>,
    life: u8,
}

impl BroadcastQueue {
    /// Creates a queue whose items are retransmitted at most `life` times.
    #[must_use]
    pub fn new(life: u8) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            life,
        }
    }

    /// Number of items currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Enqueues `message` under `dedup_key`, replacing any pending item with
    /// the same key.
    pub fn put(&self, dedup_key: impl Into<String>, message: Message) {
        let dedup = dedup_key.into();
        let mut inner = self.inner.lock();

        if let Some(stale) = inner.by_dedup.remove(&dedup) {
            inner.items.remove(&stale);
        }

        let key = ItemKey {
            size: message.payload.len(),
            life: self.life,
            seq: inner.next_seq,
        };
        inner.next_seq += 1;
        inner.by_dedup.insert(dedup.clone(), key);
        inner.items.insert(key, QueueEntry { dedup, message });
    }

    /// Drains messages smallest-first until the next item would push the
    /// total of payload plus per-item envelope bytes past `byte_budget`.
    ///
    /// Drained items keep circulating in later rounds until their life runs
    /// out; reinsertion happens after the drain so no item is emitted twice
    /// in one call.
    pub fn drain(&self, byte_budget: usize) -> Vec<Message> {
        let mut inner = self.inner.lock();
        let mut used = 0usize;
        let mut drained = Vec::new();
        let mut reinsert = Vec::new();

        while let Some((&key, _)) = inner.items.iter().next() {
            let cost = key.size + ENVELOPE_OVERHEAD;
            if used + cost > byte_budget {
                break;
            }
            let entry = match inner.items.remove(&key) {
                Some(entry) => entry,
                None => break,
            };
            inner.by_dedup.remove(&entry.dedup);
            used += cost;

            let life = key.life.saturating_sub(1);
            if life > 0 {
                reinsert.push((entry.dedup.clone(), entry.message.clone(), life));
            }
            drained.push(entry.message);
        }

        for (dedup, message, life) in reinsert {
            let key = ItemKey {
                size: message.payload.len(),
                life,
                seq: inner.next_seq,
            };
            inner.next_seq += 1;
            inner.by_dedup.insert(dedup.clone(), key);
            inner.items.insert(key, QueueEntry { dedup, message });
        }

        drained
    }
}
