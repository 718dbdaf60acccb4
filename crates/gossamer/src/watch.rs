//! One-shot watchers for replicated-KV events.
//!
//! A watcher is a single-fire future: register interest in (key, event),
//! await the returned [`KvWatch`], and the first matching mutation resolves
//! it with a copy of the relevant value. Firing deregisters the watcher;
//! registering again for the same key and event replaces any pending one,
//! which resolves the replaced future with `None`.

use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Which KV mutation a watcher is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KvEventKind {
    /// Key inserted for the first time.
    Set,
    /// Key removed; the watcher receives the pre-deletion value.
    Delete,
    /// Key overwritten with a different value.
    Update,
}

/// Pending one-shot delivery of a KV value.
#[derive(Debug)]
pub struct KvWatch {
    rx: oneshot::Receiver<Vec<u8>>,
}

impl KvWatch {
    /// Waits for the watched event. Returns `None` if the watcher was
    /// replaced by a newer registration or the cluster shut down first.
    pub async fn wait(self) -> Option<Vec<u8>> {
        self.rx.await.ok()
    }
}

/// Registry of pending watchers, at most one per (key, event kind).
#[derive(Debug, Default)]
pub(crate) struct WatcherRegistry {
    pending: Mutex<HashMap<(String, KvEventKind), oneshot::Sender<Vec<u8>>>>,
}

impl WatcherRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a watcher, replacing any pending one for the same slot.
    pub(crate) fn register(&self, key: &str, kind: KvEventKind) -> KvWatch {
        let (tx, rx) = oneshot::channel();
        // Dropping a replaced sender resolves the old future with None.
        self.pending.lock().insert((key.to_string(), kind), tx);
        KvWatch { rx }
    }

    /// Fires the watcher for (key, kind) with `value`, if one is pending.
    /// The send happens outside the registry lock so a callback-side
    /// re-registration cannot deadlock.
    pub(crate) fn fire(&self, key: &str, kind: KvEventKind, value: &[u8]) {
        let sender = self.pending.lock().remove(&(key.to_string(), kind));
        if let Some(tx) = sender {
            let _ = tx.send(value.to_vec());
        }
    }
}
