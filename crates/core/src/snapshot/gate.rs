use tracing::debug;

use super::store::SnapshotStore;
use crate::models::Envelope;

/// Result of offering a freshly fetched envelope to the [`HashGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// The hash differed and the store was replaced.
    Changed,
    /// The hash matched the last accepted one; nothing was touched.
    Unchanged,
}

/// Change detector in front of the [`SnapshotStore`].
///
/// Only the opaque hash is compared, never the envelope contents.
pub struct HashGate {
    store: SnapshotStore,
    last_hash: Option<String>,
}

impl HashGate {
    /// Create a gate writing into `store`, seeded with the hash of whatever it already holds.
    pub fn new(store: SnapshotStore) -> Self {
        let last_hash = store.data_hash();
        Self { store, last_hash }
    }

    /// Offer an envelope, replacing the store only when `new_hash` differs.
    pub fn accept(&mut self, new_hash: &str, envelope: Envelope) -> GateOutcome {
        if self.matches(new_hash) {
            debug!(hash = new_hash, "snapshot unchanged");
            return GateOutcome::Unchanged;
        }

        debug!(
            previous = self.last_hash.as_deref().unwrap_or("none"),
            hash = new_hash,
            "snapshot changed"
        );
        self.store.replace(envelope);
        self.last_hash = Some(new_hash.to_string());
        GateOutcome::Changed
    }

    /// Whether `hash` equals the last accepted hash.
    pub fn matches(&self, hash: &str) -> bool {
        self.last_hash.as_deref() == Some(hash)
    }

    /// Last accepted hash.
    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    /// Store the gate writes into.
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Banner, GameId};
    use chrono::{Duration, Utc};

    fn envelope(hash: &str, character: &str) -> Envelope {
        let now = Utc::now();
        Envelope {
            banners: vec![Banner {
                id: "b-1".to_string(),
                game_id: GameId::Genshin,
                character: character.to_string(),
                start_date: None,
                end_date: now + Duration::days(3),
                color: "#60A5FA".to_string(),
                featured_characters: vec![character.to_string()],
            }],
            game_statuses: Vec::new(),
            fetched_at: now,
            next_refresh_at: now + Duration::minutes(30),
            data_hash: hash.to_string(),
        }
    }

    #[test]
    fn first_envelope_is_always_accepted() {
        let store = SnapshotStore::new();
        let mut gate = HashGate::new(store.clone());

        assert_eq!(gate.last_hash(), None);
        assert_eq!(
            gate.accept("abc123def456", envelope("abc123def456", "Neuvillette")),
            GateOutcome::Changed
        );
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn identical_hash_triggers_no_replacement() {
        let store = SnapshotStore::new();
        let mut gate = HashGate::new(store.clone());

        gate.accept("abc123def456", envelope("abc123def456", "Neuvillette"));
        let before = store.current().expect("snapshot present");

        // Different content under the same hash is still ignored.
        let outcome = gate.accept("abc123def456", envelope("abc123def456", "Zibai"));

        assert_eq!(outcome, GateOutcome::Unchanged);
        assert_eq!(store.revision(), 1);
        let after = store.current().expect("snapshot present");
        assert_eq!(*before, *after);
        assert_eq!(after.banners[0].character, "Neuvillette");
    }

    #[test]
    fn new_hash_replaces_snapshot() {
        let store = SnapshotStore::new();
        let mut gate = HashGate::new(store.clone());

        gate.accept("aaaaaaaaaaaa", envelope("aaaaaaaaaaaa", "Neuvillette"));
        let outcome = gate.accept("bbbbbbbbbbbb", envelope("bbbbbbbbbbbb", "Zibai"));

        assert_eq!(outcome, GateOutcome::Changed);
        assert_eq!(store.revision(), 2);
        assert_eq!(gate.last_hash(), Some("bbbbbbbbbbbb"));
    }

    #[test]
    fn gate_is_seeded_from_restored_snapshot() {
        let store = SnapshotStore::with_snapshot(envelope("cafebabe0000", "Sunna"));
        let mut gate = HashGate::new(store.clone());

        assert!(gate.matches("cafebabe0000"));
        assert_eq!(
            gate.accept("cafebabe0000", envelope("cafebabe0000", "Sunna")),
            GateOutcome::Unchanged
        );
        assert_eq!(store.revision(), 0);
    }
}
