//! Snapshot ownership: the store, the hash gate in front of it, and its on-disk copy.

/// Disk persistence of the last accepted envelope.
pub mod cache;
/// Hash-based change detection.
pub mod gate;
/// Shared handle owning the current envelope.
pub mod store;

pub use cache::SnapshotCache;
pub use gate::{GateOutcome, HashGate};
pub use store::SnapshotStore;
