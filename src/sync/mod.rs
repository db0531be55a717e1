//! Snapshot synchronization engine.
//!
//! Reconciles a device-local application snapshot with a remote object store:
//! content-hash change detection, whole-snapshot direction arbitration,
//! per-entry error aggregation and single-flight orchestration.

pub mod conflict;
pub mod engine;
pub mod hash;
pub mod identity;
pub mod manifest;
pub mod metadata;
pub mod snapshot;
pub mod transfer;

pub use conflict::{ConflictResolver, Decision, DecisionReason, Direction};
pub use engine::{SyncCoordinator, SyncOutcome, SyncResult, SyncState, SyncStatusReport};
pub use hash::{hash_bytes, hash_snapshot};
pub use identity::DeviceIdentity;
pub use manifest::{Manifest, ManifestCodec};
pub use metadata::{MetadataStore, SyncMetadata};
pub use snapshot::{FullExport, SnapshotSource, StoreSnapshotSource, SyncSnapshot};
pub use transfer::{PartialResult, RemoteObject, Transfer};
