//! Latest sample per device.

use std::collections::{BTreeMap, HashMap};

use super::address::DeviceAddress;
use super::sample::Sample;

/// Full copy of the cache, ordered by address
pub type SnapshotMap = BTreeMap<DeviceAddress, Sample>;

/// Where a device is in name resolution
///
/// `Unseen` devices have no cache entry. There is no way back from
/// `Named`, and `Pending` has no timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Unseen,
    Pending,
    Named,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    sample: Sample,
    state: ResolutionState,
}

/// Mapping from device address to its most recent sample
///
/// Entries are never evicted, so a miss means no packet has been received
/// from that device during this run.
#[derive(Debug, Default)]
pub struct SampleCache {
    entries: HashMap<DeviceAddress, CacheEntry>,
}

impl SampleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `sample` as the device's latest reading
    ///
    /// A known device's name is carried forward onto the new sample.
    ///
    /// # Returns
    ///
    /// * `(Sample, bool)` - The stored sample, and `true` when this is the
    ///   first sample from the device
    pub fn merge(&mut self, sample: Sample) -> (Sample, bool) {
        let address = *sample.address();

        match self.entries.get_mut(&address) {
            Some(entry) => {
                let name = entry.sample.node_name().to_string();
                entry.sample = sample.with_node_name(name);
                (entry.sample.clone(), false)
            }
            None => {
                self.entries.insert(
                    address,
                    CacheEntry {
                        sample: sample.clone(),
                        state: ResolutionState::Pending,
                    },
                );
                (sample, true)
            }
        }
    }

    /// Replace the stored name for `address`
    ///
    /// Returns `None` when the address has never been seen; the caller drops
    /// the response. Otherwise returns the updated sample.
    pub fn apply_resolved_name(&mut self, address: &DeviceAddress, name: &str) -> Option<Sample> {
        let entry = self.entries.get_mut(address)?;
        entry.sample = entry.sample.clone().with_node_name(name);
        entry.state = ResolutionState::Named;
        Some(entry.sample.clone())
    }

    pub fn get(&self, address: &DeviceAddress) -> Option<&Sample> {
        self.entries.get(address).map(|entry| &entry.sample)
    }

    pub fn state(&self, address: &DeviceAddress) -> ResolutionState {
        self.entries
            .get(address)
            .map_or(ResolutionState::Unseen, |entry| entry.state)
    }

    /// Independent copy of every entry, for serialization
    pub fn snapshot_copy(&self) -> SnapshotMap {
        self.entries
            .iter()
            .map(|(address, entry)| (*address, entry.sample.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::sample::{ChannelData, UNKNOWN_NODE_NAME};
    use chrono::{TimeZone, Utc};

    const ADDR: DeviceAddress = DeviceAddress::from_u64(0x0013A200_12345678);

    fn sample_at(address: DeviceAddress, second: u32, raw: u16) -> Sample {
        Sample::new(
            address,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, second).unwrap(),
            ChannelData::new(0, 0x01, None, vec![(0, raw)]),
        )
    }

    #[test]
    fn test_first_sighting() {
        let mut cache = SampleCache::new();
        assert_eq!(cache.state(&ADDR), ResolutionState::Unseen);

        let (stored, first) = cache.merge(sample_at(ADDR, 0, 100));
        assert!(first);
        assert_eq!(stored.node_name(), UNKNOWN_NODE_NAME);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.state(&ADDR), ResolutionState::Pending);
    }

    #[test]
    fn test_second_sample_carries_unknown_name_forward() {
        let mut cache = SampleCache::new();
        cache.merge(sample_at(ADDR, 0, 100));

        let (stored, first) = cache.merge(sample_at(ADDR, 1, 200));
        assert!(!first);
        assert_eq!(stored.node_name(), UNKNOWN_NODE_NAME);
        assert_eq!(stored.channels().analog(0), Some(200));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_second_sample_carries_resolved_name_forward() {
        let mut cache = SampleCache::new();
        cache.merge(sample_at(ADDR, 0, 100));
        cache.apply_resolved_name(&ADDR, "THERMOMETER").unwrap();

        let (stored, first) = cache.merge(sample_at(ADDR, 5, 300));
        assert!(!first);
        assert_eq!(stored.node_name(), "THERMOMETER");
        assert_eq!(stored.captured_at(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 5).unwrap());
        assert_eq!(cache.get(&ADDR), Some(&stored));
        assert_eq!(cache.state(&ADDR), ResolutionState::Named);
    }

    #[test]
    fn test_apply_resolved_name_unknown_address() {
        let mut cache = SampleCache::new();
        cache.merge(sample_at(ADDR, 0, 100));
        let before = cache.snapshot_copy();

        let other = DeviceAddress::from_u64(0x0013A200_FFFFFFFF);
        assert!(cache.apply_resolved_name(&other, "GHOST").is_none());
        assert_eq!(cache.snapshot_copy(), before);
        assert_eq!(cache.state(&other), ResolutionState::Unseen);
    }

    #[test]
    fn test_apply_resolved_name_only_changes_name() {
        let mut cache = SampleCache::new();
        let (original, _) = cache.merge(sample_at(ADDR, 3, 100));

        let updated = cache.apply_resolved_name(&ADDR, "THERMOMETER").unwrap();
        assert_eq!(updated.node_name(), "THERMOMETER");
        assert_eq!(updated.address(), original.address());
        assert_eq!(updated.captured_at(), original.captured_at());
        assert_eq!(updated.channels(), original.channels());
    }

    #[test]
    fn test_empty_name_still_resolves() {
        let mut cache = SampleCache::new();
        cache.merge(sample_at(ADDR, 0, 100));

        let updated = cache.apply_resolved_name(&ADDR, "").unwrap();
        assert_eq!(updated.node_name(), "");
        assert_eq!(cache.state(&ADDR), ResolutionState::Named);
    }

    #[test]
    fn test_snapshot_copy_is_independent() {
        let mut cache = SampleCache::new();
        cache.merge(sample_at(ADDR, 0, 100));

        let snapshot = cache.snapshot_copy();
        cache.merge(sample_at(ADDR, 1, 999));
        cache.merge(sample_at(DeviceAddress::from_u64(2), 1, 1));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[&ADDR].channels().analog(0), Some(100));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_snapshot_copy_ordered_by_address() {
        let mut cache = SampleCache::new();
        for value in [30u64, 10, 20] {
            cache.merge(sample_at(DeviceAddress::from_u64(value), 0, 0));
        }

        let order: Vec<u64> = cache.snapshot_copy().keys().map(|a| a.as_u64()).collect();
        assert_eq!(order, vec![10, 20, 30]);
    }
}
