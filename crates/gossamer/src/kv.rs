//! Convergent replicated key-value store.
//!
//! One reducer serves both the local API and gossip delivery, so a mutation
//! applies identically no matter which side observed it first. Convergence
//! relies on the no-op laws: `set` never overwrites, `update` ignores
//! byte-identical values, `delete` ignores absent keys. The first local
//! observation of a given state applies it and re-gossips; every duplicate
//! is a no-op and gossips nothing, which is what stops epidemic echo.

use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::watch::KvEventKind;

/// Result of applying a KV mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum KvOutcome {
    /// The mutation changed local state. `watch_value` is what watchers get:
    /// the new value for set/update, the pre-deletion value for delete.
    Applied {
        /// Event kind watchers and broadcasts are keyed by.
        kind: KvEventKind,
        /// Value delivered to watchers.
        watch_value: Vec<u8>,
    },
    /// Local state already reflected the mutation.
    NoOp,
}

/// The replicated store. Reads take the shared lock; mutations take the
/// exclusive lock and return what changed.
#[derive(Debug, Default)]
pub(crate) struct KvStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl KvStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the value for `key`.
    pub(crate) fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().get(key).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Initial insert. Strictly first-write: an existing key is untouched.
    pub(crate) fn apply_set(&self, key: &str, value: &[u8]) -> KvOutcome {
        let mut entries = self.entries.write();
        if entries.contains_key(key) {
            return KvOutcome::NoOp;
        }
        entries.insert(key.to_string(), value.to_vec());
        KvOutcome::Applied {
            kind: KvEventKind::Set,
            watch_value: value.to_vec(),
        }
    }

    /// Removal. Watchers receive the value that was removed.
    pub(crate) fn apply_delete(&self, key: &str) -> KvOutcome {
        let mut entries = self.entries.write();
        match entries.remove(key) {
            Some(old) => KvOutcome::Applied {
                kind: KvEventKind::Delete,
                watch_value: old,
            },
            None => KvOutcome::NoOp,
        }
    }

    /// Overwrite of an existing key. Absent keys and byte-identical values
    /// are no-ops.
    pub(crate) fn apply_update(&self, key: &str, value: &[u8]) -> KvOutcome {
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(current) if current.as_slice() == value => KvOutcome::NoOp,
            Some(current) => {
                *current = value.to_vec();
                KvOutcome::Applied {
                    kind: KvEventKind::Update,
                    watch_value: value.to_vec(),
                }
            }
            None => KvOutcome::NoOp,
        }
    }
}
