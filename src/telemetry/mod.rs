//! # Telemetry Module
//!
//! Latest-sample cache for every sensor node on the mesh.
//!
//! This module handles:
//! - 64-bit device addresses and their textual forms
//! - Merging IO samples into a per-device cache
//! - Resolving node identifiers with one query per device
//! - Notifying listeners and persisting snapshots in the background
//! - Read-only queries against a persisted snapshot

pub mod address;
pub mod cache;
pub mod notifier;
pub mod query;
pub mod resolver;
pub mod sample;
pub mod snapshot;
pub mod writer;

pub use address::DeviceAddress;
pub use cache::{ResolutionState, SampleCache, SnapshotMap};
pub use notifier::{ChangeEvent, ChangeKind, ChangeListener, ChangeNotifier};
pub use query::TelemetryQuery;
pub use resolver::{IdentityResolver, NameQuery, PendingQueries};
pub use sample::{ChannelData, Sample, UNKNOWN_NODE_NAME};
pub use snapshot::SnapshotStore;
pub use writer::{SnapshotQueue, SnapshotWriter, WriterStats};
