//! Per-record mutation locks.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockTable = DashMap<Uuid, Arc<Mutex<()>>>;

/// One async mutex per inspection id.
///
/// Held across "mutate store, enqueue outbox entry" by the services and across
/// status finalization by the sync engine, so the two never interleave on a record.
/// Entries live only while some task holds or waits for them.
#[derive(Clone, Default)]
pub struct RecordLocks {
    inner: Arc<LockTable>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, record_id: Uuid) -> RecordGuard {
        let lock = self
            .inner
            .entry(record_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        RecordGuard {
            record_id,
            guard: Some(lock.lock_owned().await),
            table: Arc::clone(&self.inner),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Exclusive hold on one record. Dropping it releases the record and prunes the
/// table entry once nobody else references it.
pub struct RecordGuard {
    record_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<LockTable>,
}

impl Drop for RecordGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Waiters hold a clone of the mutex, so a count of one means only the table is left.
        self.table
            .remove_if(&self.record_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
