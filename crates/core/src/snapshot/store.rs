use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;

use crate::models::Envelope;

/// Shared handle to the latest accepted envelope.
///
/// Cloning the handle is cheap; every clone observes the same snapshot.
/// The envelope is only ever swapped as a whole, so a reader holding the
/// returned `Arc` keeps a consistent view even while a replacement lands.
#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<Inner>,
}

struct Inner {
    current: RwLock<Option<Arc<Envelope>>>,
    revision: watch::Sender<u64>,
}

impl SnapshotStore {
    /// Create an empty store. Consumers render a loading state until the first replacement.
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(None),
                revision,
            }),
        }
    }

    /// Create a store seeded with a last-known-good envelope.
    pub fn with_snapshot(envelope: Envelope) -> Self {
        let store = Self::new();
        *store.inner.current.write() = Some(Arc::new(envelope));
        store
    }

    /// Current snapshot, or `None` while still loading.
    pub fn current(&self) -> Option<Arc<Envelope>> {
        self.inner.current.read().clone()
    }

    /// Hash of the current snapshot.
    pub fn data_hash(&self) -> Option<String> {
        self.inner
            .current
            .read()
            .as_ref()
            .map(|envelope| envelope.data_hash.clone())
    }

    /// Whether no snapshot has been accepted yet.
    pub fn is_loading(&self) -> bool {
        self.inner.current.read().is_none()
    }

    /// Replace the whole snapshot and notify subscribers.
    pub fn replace(&self, envelope: Envelope) {
        let envelope = Arc::new(envelope);
        *self.inner.current.write() = Some(envelope);
        self.inner.revision.send_modify(|revision| *revision += 1);
    }

    /// Number of replacements performed since the store was created.
    pub fn revision(&self) -> u64 {
        *self.inner.revision.borrow()
    }

    /// Subscribe to replacements. The received value is the new revision.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn envelope(hash: &str) -> Envelope {
        let now = Utc::now();
        Envelope {
            banners: Vec::new(),
            game_statuses: Vec::new(),
            fetched_at: now,
            next_refresh_at: now,
            data_hash: hash.to_string(),
        }
    }

    #[test]
    fn readers_keep_their_snapshot_across_replacement() {
        let store = SnapshotStore::new();
        assert!(store.is_loading());

        store.replace(envelope("aaaaaaaaaaaa"));
        let held = store.current().expect("snapshot present");

        store.replace(envelope("bbbbbbbbbbbb"));
        assert_eq!(held.data_hash, "aaaaaaaaaaaa");
        assert_eq!(store.data_hash().as_deref(), Some("bbbbbbbbbbbb"));
        assert_eq!(store.revision(), 2);
    }

    #[tokio::test]
    async fn subscribers_see_new_revisions() {
        let store = SnapshotStore::new();
        let mut rx = store.subscribe();
        let writer = store.clone();

        writer.replace(envelope("cccccccccccc"));
        rx.changed().await.expect("store alive");
        assert_eq!(*rx.borrow(), 1);
    }

    #[test]
    fn seeded_store_does_not_count_as_replacement() {
        let store = SnapshotStore::with_snapshot(envelope("dddddddddddd"));
        assert!(!store.is_loading());
        assert_eq!(store.revision(), 0);
    }
}
