//! Node identity resolution.
//!
//! The first sample from a device triggers exactly one node identifier (`NI`)
//! query. The answer arrives later, on its own, as a remote AT response and
//! is merged back into the cache. There is no retry and no timeout: a device
//! whose answer never comes stays `Pending` and keeps the "Unknown" name.

use std::sync::Arc;

use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

use super::address::DeviceAddress;
use super::cache::{ResolutionState, SampleCache};
use super::notifier::{ChangeEvent, ChangeKind, ChangeNotifier};
use super::sample::Sample;
use crate::xbee::protocol::{InboundPacket, RemoteAtResponse, AT_NODE_IDENTIFIER};

/// Issues node identifier queries
///
/// Implementations must not block; the answer is delivered separately.
#[cfg_attr(test, automock)]
pub trait NameQuery {
    fn request_name(&mut self, address: &DeviceAddress);
}

/// Name queries waiting to be transmitted by the session loop
#[derive(Debug, Default)]
pub struct PendingQueries {
    pending: Vec<DeviceAddress>,
}

impl PendingQueries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every queued address, oldest first
    pub fn take(&mut self) -> Vec<DeviceAddress> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl NameQuery for PendingQueries {
    fn request_name(&mut self, address: &DeviceAddress) {
        self.pending.push(*address);
    }
}

/// Owns the sample cache and decides when names must be queried
///
/// All cache mutation goes through `&mut self`, so whichever task owns the
/// resolver is the single serialization point for both inbound channels.
#[derive(Debug)]
pub struct IdentityResolver<Q: NameQuery> {
    cache: SampleCache,
    query: Q,
    notifier: ChangeNotifier,
    queries_issued: u64,
}

impl<Q: NameQuery> IdentityResolver<Q> {
    pub fn new(query: Q, notifier: ChangeNotifier) -> Self {
        Self {
            cache: SampleCache::new(),
            query,
            notifier,
            queries_issued: 0,
        }
    }

    /// Route an inbound packet to the matching channel handler
    ///
    /// Frames other than IO samples and remote AT responses are ignored.
    pub fn dispatch(&mut self, packet: InboundPacket) {
        match packet {
            InboundPacket::IoSample(frame) => {
                self.on_sample(Sample::capture(frame.source, frame.channels));
            }
            InboundPacket::RemoteAtResponse(response) => {
                self.on_name_response(&response);
            }
            InboundPacket::AtResponse(response) => {
                debug!("Ignoring local {} response during ingestion", response.command);
            }
            InboundPacket::Other { frame_type } => {
                debug!("Ignoring frame type 0x{:02X}", frame_type);
            }
        }
    }

    /// Merge a new sample and query its name on first sighting
    pub fn on_sample(&mut self, sample: Sample) -> Sample {
        let (stored, first_sighting) = self.cache.merge(sample);

        if first_sighting {
            info!("New device {}, requesting node identifier", stored.address());
            self.query.request_name(stored.address());
            self.queries_issued += 1;
        } else {
            debug!("Sample from {} ({})", stored.address(), stored.node_name());
        }

        self.publish(ChangeKind::SampleMerged { first_sighting }, &stored);
        stored
    }

    /// Apply a node identifier response
    ///
    /// Returns `true` if a cached sample was renamed. Responses to other
    /// commands, error responses and responses from devices that are not
    /// cached are dropped.
    pub fn on_name_response(&mut self, response: &RemoteAtResponse) -> bool {
        if response.command != AT_NODE_IDENTIFIER {
            debug!("Ignoring remote {} response from {}", response.command, response.source);
            return false;
        }

        if !response.status.is_ok() {
            warn!(
                "Node identifier query to {} failed: {}",
                response.source, response.status
            );
            return false;
        }

        let name = response.node_identifier();
        match self.cache.apply_resolved_name(&response.source, &name) {
            Some(updated) => {
                info!("Device {} is named {:?}", response.source, name);
                self.publish(ChangeKind::NameResolved, &updated);
                true
            }
            None => {
                debug!("Dropping node identifier for unknown device {}", response.source);
                false
            }
        }
    }

    pub fn cache(&self) -> &SampleCache {
        &self.cache
    }

    pub fn state(&self, address: &DeviceAddress) -> ResolutionState {
        self.cache.state(address)
    }

    /// Name queries issued since start
    pub fn queries_issued(&self) -> u64 {
        self.queries_issued
    }

    pub fn query_mut(&mut self) -> &mut Q {
        &mut self.query
    }

    fn publish(&self, kind: ChangeKind, sample: &Sample) {
        if !self.notifier.has_listeners() {
            return;
        }
        self.notifier.notify(&ChangeEvent {
            kind,
            sample: sample.clone(),
            snapshot: Arc::new(self.cache.snapshot_copy()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::notifier::mocks::RecordingListener;
    use crate::telemetry::query::TelemetryQuery;
    use crate::telemetry::sample::{ChannelData, UNKNOWN_NODE_NAME};
    use crate::telemetry::snapshot::SnapshotStore;
    use crate::xbee::protocol::{AtCommand, CommandStatus, IoSampleFrame};
    use mockall::predicate::eq;

    const THERMOMETER: DeviceAddress = DeviceAddress::from_u64(0x0013A200_12345678);

    fn sample(address: DeviceAddress, raw: u16) -> Sample {
        Sample::capture(address, ChannelData::new(0, 0x01, None, vec![(0, raw)]))
    }

    fn ni_response(address: DeviceAddress, name: &str) -> RemoteAtResponse {
        RemoteAtResponse {
            frame_id: 1,
            source: address,
            network_address: 0x1234,
            command: AT_NODE_IDENTIFIER,
            status: CommandStatus::Ok,
            value: name.as_bytes().to_vec(),
        }
    }

    fn resolver_with_listener() -> (IdentityResolver<PendingQueries>, Arc<RecordingListener>) {
        let listener = Arc::new(RecordingListener::default());
        let mut notifier = ChangeNotifier::new();
        notifier.subscribe(listener.clone());
        (IdentityResolver::new(PendingQueries::new(), notifier), listener)
    }

    #[test]
    fn test_first_sample_issues_one_query() {
        let mut query = MockNameQuery::new();
        query
            .expect_request_name()
            .with(eq(THERMOMETER))
            .times(1)
            .return_const(());

        let mut resolver = IdentityResolver::new(query, ChangeNotifier::new());
        let stored = resolver.on_sample(sample(THERMOMETER, 1));
        resolver.on_sample(sample(THERMOMETER, 2));
        resolver.on_sample(sample(THERMOMETER, 3));

        assert_eq!(stored.node_name(), UNKNOWN_NODE_NAME);
        assert_eq!(resolver.queries_issued(), 1);
        assert_eq!(resolver.state(&THERMOMETER), ResolutionState::Pending);
    }

    #[test]
    fn test_each_new_device_is_queried() {
        let mut query = MockNameQuery::new();
        query.expect_request_name().times(3).return_const(());

        let mut resolver = IdentityResolver::new(query, ChangeNotifier::new());
        for value in 1..=3u64 {
            resolver.on_sample(sample(DeviceAddress::from_u64(value), 0));
            resolver.on_sample(sample(DeviceAddress::from_u64(value), 1));
        }
        assert_eq!(resolver.queries_issued(), 3);
        assert_eq!(resolver.cache().len(), 3);
    }

    #[test]
    fn test_name_resolution_flow() {
        let (mut resolver, listener) = resolver_with_listener();

        resolver.on_sample(sample(THERMOMETER, 100));
        assert_eq!(resolver.query_mut().take(), vec![THERMOMETER]);

        assert!(resolver.on_name_response(&ni_response(THERMOMETER, "THERMOMETER")));
        assert_eq!(resolver.state(&THERMOMETER), ResolutionState::Named);

        let second = resolver.on_sample(sample(THERMOMETER, 200));
        assert_eq!(second.node_name(), "THERMOMETER");
        assert_eq!(resolver.queries_issued(), 1);
        assert!(resolver.query_mut().is_empty());

        assert_eq!(
            listener.kinds(),
            vec![
                ChangeKind::SampleMerged { first_sighting: true },
                ChangeKind::NameResolved,
                ChangeKind::SampleMerged { first_sighting: false },
            ]
        );
    }

    #[test]
    fn test_events_carry_full_snapshot() {
        let (mut resolver, listener) = resolver_with_listener();
        let other = DeviceAddress::from_u64(0x0013A200_40522BAA);

        resolver.on_sample(sample(THERMOMETER, 1));
        resolver.on_sample(sample(other, 1));
        resolver.on_name_response(&ni_response(other, "PV-ARRAY"));

        let events = listener.events.lock().unwrap();
        assert_eq!(events[0].snapshot.len(), 1);
        assert_eq!(events[1].snapshot.len(), 2);
        assert_eq!(events[2].sample.node_name(), "PV-ARRAY");
        assert_eq!(events[2].snapshot[&other].node_name(), "PV-ARRAY");
        assert_eq!(events[2].snapshot[&THERMOMETER].node_name(), UNKNOWN_NODE_NAME);
    }

    #[test]
    fn test_response_for_unknown_device_is_dropped() {
        let (mut resolver, listener) = resolver_with_listener();
        resolver.on_sample(sample(THERMOMETER, 1));

        let stranger = DeviceAddress::from_u64(0x0013A200_DEADBEEF);
        assert!(!resolver.on_name_response(&ni_response(stranger, "GHOST")));

        assert_eq!(resolver.cache().len(), 1);
        assert_eq!(resolver.state(&stranger), ResolutionState::Unseen);
        assert_eq!(listener.len(), 1);
    }

    #[test]
    fn test_non_ni_and_failed_responses_are_ignored() {
        let (mut resolver, listener) = resolver_with_listener();
        resolver.on_sample(sample(THERMOMETER, 1));

        let mut other_command = ni_response(THERMOMETER, "X");
        other_command.command = AtCommand::new("ID").unwrap();
        assert!(!resolver.on_name_response(&other_command));

        let mut failed = ni_response(THERMOMETER, "");
        failed.status = CommandStatus::TransmissionFailure;
        assert!(!resolver.on_name_response(&failed));

        assert_eq!(resolver.state(&THERMOMETER), ResolutionState::Pending);
        assert_eq!(listener.len(), 1);
    }

    #[test]
    fn test_empty_name_payload_resolves_to_empty_string() {
        let (mut resolver, _listener) = resolver_with_listener();
        resolver.on_sample(sample(THERMOMETER, 1));

        assert!(resolver.on_name_response(&ni_response(THERMOMETER, "")));
        assert_eq!(resolver.cache().get(&THERMOMETER).unwrap().node_name(), "");
        assert_eq!(resolver.state(&THERMOMETER), ResolutionState::Named);
    }

    #[test]
    fn test_dispatch_routes_by_packet_type() {
        let (mut resolver, listener) = resolver_with_listener();

        resolver.dispatch(InboundPacket::IoSample(IoSampleFrame {
            source: THERMOMETER,
            network_address: 0x1234,
            receive_options: 0x01,
            channels: ChannelData::new(0, 0x01, None, vec![(0, 42)]),
        }));
        resolver.dispatch(InboundPacket::Other { frame_type: 0x8B });
        resolver.dispatch(InboundPacket::RemoteAtResponse(ni_response(THERMOMETER, "THERMOMETER")));

        assert_eq!(listener.len(), 2);
        assert_eq!(resolver.cache().get(&THERMOMETER).unwrap().channels().analog(0), Some(42));
        assert_eq!(resolver.state(&THERMOMETER), ResolutionState::Named);
    }

    #[test]
    fn test_thermometer_scenario_through_snapshot() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("xbee.json"));
        let (mut resolver, _listener) = resolver_with_listener();

        resolver.on_sample(sample(THERMOMETER, 233));
        assert_eq!(resolver.cache().len(), 1);
        assert_eq!(resolver.cache().get(&THERMOMETER).unwrap().node_name(), UNKNOWN_NODE_NAME);

        resolver.on_name_response(&ni_response(THERMOMETER, "THERMOMETER"));
        store.write(&resolver.cache().snapshot_copy()).unwrap();

        let mut query = TelemetryQuery::new();
        query.load(store.path()).unwrap();

        let by_name = query.by_name("THERMOMETER").unwrap();
        assert_eq!(by_name, resolver.cache().get(&THERMOMETER).unwrap());

        let wrong = DeviceAddress::from_u64(0x0013A200_87654321);
        assert!(query.by_address(&wrong).unwrap_err().is_not_found());
    }
}
