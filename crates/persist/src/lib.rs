//! Persistence: snapshots, event log replay, rollback and file-backed storage.
//!
//! # Invariants
//! - Event log is append-only.
//! - Snapshots are verifiable and carry the random generator state.
//! - Loading reconstructs state via snapshot + log replay and fails closed on
//!   integrity or schema errors.

mod snapshot;
mod store;

pub use snapshot::{EventLog, Snapshot, SnapshotStore, apply_event};
pub use store::{IntegrityManifest, ManifestEntry, SimMeta, StoreError, WorldStore};
