//! Background snapshot persistence.
//!
//! Ingestion pushes cache copies into a bounded [`SnapshotQueue`]; a
//! [`SnapshotWriter`] task drains it and writes on the blocking pool, so disk
//! latency never stalls packet intake.
//!
//! Back-pressure policy: when the queue is full the **oldest** pending
//! snapshot is dropped. Every snapshot is a full replacement, so only the
//! newest one needs to reach disk.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::cache::SnapshotMap;
use super::notifier::{ChangeEvent, ChangeListener};
use super::snapshot::SnapshotStore;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Arc<SnapshotMap>>,
    closed: bool,
}

/// Bounded drop-oldest queue of snapshots awaiting a write
#[derive(Debug)]
pub struct SnapshotQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
}

impl SnapshotQueue {
    /// Create a queue holding at most `capacity` snapshots (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue a snapshot, evicting the oldest one if full
    ///
    /// Returns `false` if the queue has been closed and the snapshot was
    /// discarded.
    pub fn push(&self, snapshot: Arc<SnapshotMap>) -> bool {
        {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            if state.pending.len() >= self.capacity {
                state.pending.pop_front();
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("Snapshot queue full, dropped oldest ({} dropped so far)", dropped);
            }
            state.pending.push_back(snapshot);
        }
        self.notify.notify_one();
        true
    }

    /// Wait for the next snapshot
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<Arc<SnapshotMap>> {
        loop {
            {
                let mut state = self.lock();
                if let Some(snapshot) = state.pending.pop_front() {
                    return Some(snapshot);
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Stop accepting snapshots; pending ones are still delivered
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshots evicted because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChangeListener for SnapshotQueue {
    fn on_change(&self, event: &ChangeEvent) {
        if !self.push(event.snapshot.clone()) {
            warn!("Snapshot queue closed, change to {} not persisted", event.sample.address());
        }
    }
}

/// Counters maintained by the writer task
#[derive(Debug, Default)]
pub struct WriterStats {
    written: AtomicU64,
    failed: AtomicU64,
}

impl WriterStats {
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Task that drains a [`SnapshotQueue`] into a [`SnapshotStore`]
#[derive(Debug)]
pub struct SnapshotWriter {
    store: Arc<SnapshotStore>,
    queue: Arc<SnapshotQueue>,
    stats: Arc<WriterStats>,
}

impl SnapshotWriter {
    pub fn new(store: Arc<SnapshotStore>, queue: Arc<SnapshotQueue>) -> Self {
        Self {
            store,
            queue,
            stats: Arc::new(WriterStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<WriterStats> {
        self.stats.clone()
    }

    /// Run the writer on the current runtime until the queue is closed
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Write snapshots until the queue is closed and drained
    ///
    /// Write failures are logged and counted; the in-memory cache is
    /// unaffected and the next snapshot is attempted as usual.
    pub async fn run(self) {
        info!("Snapshot writer started ({})", self.store.path().display());

        while let Some(snapshot) = self.queue.pop().await {
            let store = self.store.clone();
            let result = tokio::task::spawn_blocking(move || store.write(&snapshot)).await;

            match result {
                Ok(Ok(())) => {
                    self.stats.written.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Err(e)) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    error!("Snapshot write failed: {}", e);
                }
                Err(e) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    error!("Snapshot write task failed: {}", e);
                }
            }
        }

        info!(
            "Snapshot writer stopped ({} written, {} failed, {} dropped)",
            self.stats.written(),
            self.stats.failed(),
            self.queue.dropped()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{ChannelData, DeviceAddress, Sample};
    use std::time::Duration;
    use tempfile::TempDir;

    fn snapshot_with(count: u64) -> Arc<SnapshotMap> {
        let map: SnapshotMap = (0..count)
            .map(|i| {
                let sample = Sample::capture(DeviceAddress::from_u64(i), ChannelData::default());
                (*sample.address(), sample)
            })
            .collect();
        Arc::new(map)
    }

    async fn wait_until<F: Fn() -> bool>(condition: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_queue_fifo() {
        let queue = SnapshotQueue::new(4);
        queue.push(snapshot_with(1));
        queue.push(snapshot_with(2));

        assert_eq!(queue.pop().await.unwrap().len(), 1);
        assert_eq!(queue.pop().await.unwrap().len(), 2);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_queue_drops_oldest_when_full() {
        let queue = SnapshotQueue::new(2);
        for count in 1..=4 {
            assert!(queue.push(snapshot_with(count)));
        }

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 2);
        assert_eq!(queue.pop().await.unwrap().len(), 3);
        assert_eq!(queue.pop().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_queue_close_drains_then_ends() {
        let queue = SnapshotQueue::new(2);
        queue.push(snapshot_with(1));
        queue.close();

        assert!(!queue.push(snapshot_with(2)));
        assert_eq!(queue.pop().await.unwrap().len(), 1);
        assert!(queue.pop().await.is_none());
    }

    #[tokio::test]
    async fn test_pop_wakes_on_push() {
        let queue = Arc::new(SnapshotQueue::new(2));
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await.map(|s| s.len()) })
        };

        tokio::task::yield_now().await;
        queue.push(snapshot_with(3));

        assert_eq!(consumer.await.unwrap(), Some(3));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        assert_eq!(SnapshotQueue::new(0).capacity(), 1);
    }

    #[tokio::test]
    async fn test_writer_persists_latest_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SnapshotStore::new(dir.path().join("xbee.json")));
        let queue = Arc::new(SnapshotQueue::new(4));

        let writer = SnapshotWriter::new(store.clone(), queue.clone());
        let stats = writer.stats();
        let handle = writer.spawn();

        queue.push(snapshot_with(1));
        queue.push(snapshot_with(3));
        queue.close();
        handle.await.unwrap();

        assert_eq!(stats.failed(), 0);
        assert!(stats.written() >= 1);
        assert_eq!(store.read().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_writer_survives_failed_write() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file in the way").unwrap();

        let store = Arc::new(SnapshotStore::new(blocker.join("xbee.json")));
        let queue = Arc::new(SnapshotQueue::new(4));
        let writer = SnapshotWriter::new(store.clone(), queue.clone());
        let stats = writer.stats();
        let handle = writer.spawn();

        queue.push(snapshot_with(1));
        wait_until(|| stats.failed() == 1).await;

        std::fs::remove_file(&blocker).unwrap();
        queue.push(snapshot_with(2));
        queue.close();
        handle.await.unwrap();

        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.written(), 1);
        assert_eq!(store.read().unwrap().len(), 2);
    }
}
