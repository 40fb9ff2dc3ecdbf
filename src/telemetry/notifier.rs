//! Change notification.
//!
//! Every cache mutation produces one [`ChangeEvent`]. Listeners run
//! synchronously in the mutating task, in mutation order, so they must not
//! block; the persistence listener only enqueues (see `writer`).

use std::sync::Arc;

use tracing::trace;

use super::cache::SnapshotMap;
use super::sample::Sample;

/// What kind of mutation happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A new sample was merged into the cache
    SampleMerged { first_sighting: bool },
    /// A node identifier was applied to a cached sample
    NameResolved,
}

/// One cache mutation
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,

    /// The sample as stored after the mutation
    pub sample: Sample,

    /// Copy of the whole cache after the mutation
    pub snapshot: Arc<SnapshotMap>,
}

/// Receiver of change events
///
/// Failures are the listener's own business: it must log or otherwise
/// absorb them so later notifications still go out.
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, event: &ChangeEvent);
}

/// Fan-out of change events to registered listeners
#[derive(Default)]
pub struct ChangeNotifier {
    listeners: Vec<Arc<dyn ChangeListener>>,
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Arc<dyn ChangeListener>) {
        self.listeners.push(listener);
    }

    pub fn has_listeners(&self) -> bool {
        !self.listeners.is_empty()
    }

    /// Deliver `event` to every listener, in subscription order
    pub fn notify(&self, event: &ChangeEvent) {
        trace!(
            "Notifying {} listeners of {:?} for {}",
            self.listeners.len(),
            event.kind,
            event.sample.address()
        );
        for listener in &self.listeners {
            listener.on_change(event);
        }
    }
}
