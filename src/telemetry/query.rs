//! Read-only lookups over a loaded snapshot.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::address::DeviceAddress;
use super::cache::SnapshotMap;
use super::sample::Sample;
use super::snapshot::SnapshotStore;
use crate::error::{Result, TelemetryError};

/// Query facade for processes that only read the snapshot file
///
/// The data is static once loaded; call [`TelemetryQuery::load`] again to
/// pick up newer samples.
#[derive(Debug, Default)]
pub struct TelemetryQuery {
    snapshot: SnapshotMap,
    source: Option<PathBuf>,
}

impl TelemetryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the loaded data with the contents of `path`
    ///
    /// On failure the previously loaded data is kept.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let snapshot = SnapshotStore::read_from(path)?;
        debug!("Loaded {} devices from {}", snapshot.len(), path.display());

        self.snapshot = snapshot;
        self.source = Some(path.to_path_buf());
        Ok(())
    }

    pub fn by_address(&self, address: &DeviceAddress) -> Result<&Sample> {
        self.snapshot
            .get(address)
            .ok_or_else(|| TelemetryError::NotFound(format!("address {}", address)))
    }

    /// First device whose name equals `name` exactly
    ///
    /// Entries are scanned in address order, so when names collide the
    /// lowest address wins.
    pub fn by_name(&self, name: &str) -> Result<&Sample> {
        self.snapshot
            .values()
            .find(|sample| sample.node_name() == name)
            .ok_or_else(|| TelemetryError::NotFound(format!("name {:?}", name)))
    }

    /// Resolve a user supplied target
    ///
    /// Tried in order: `target` as a strict address, as an exact node name,
    /// then as a loosely formatted address (see
    /// [`DeviceAddress::parse_lenient`]). A name that happens to look like an
    /// address is still found by name.
    pub fn by_address_or_name(&self, target: &str) -> Result<&Sample> {
        if let Ok(address) = DeviceAddress::parse(target) {
            if let Ok(sample) = self.by_address(&address) {
                return Ok(sample);
            }
        }

        if let Ok(sample) = self.by_name(target) {
            return Ok(sample);
        }

        DeviceAddress::parse_lenient(target)
            .ok()
            .and_then(|address| self.snapshot.get(&address))
            .ok_or_else(|| TelemetryError::NotFound(format!("address or name {:?}", target)))
    }

    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.snapshot.values()
    }

    /// File the current data was loaded from
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }
}
