//! Outbox facade used by the mutation services.

use std::sync::Arc;

use metrics::gauge;
use tracing::{debug, info};
use uuid::Uuid;
use vigil_api_types::OutboxEnvelope;

use crate::application::error::AppError;
use crate::application::repos::{OutboxEntry, SyncQueueRepo};

pub(crate) const METRIC_SYNC_QUEUE_LEN: &str = "vigil_sync_queue_len";

/// Ordered, durable log of mutations awaiting remote acknowledgement.
#[derive(Clone)]
pub struct SyncQueue {
    repo: Arc<dyn SyncQueueRepo>,
}

impl SyncQueue {
    pub fn new(repo: Arc<dyn SyncQueueRepo>) -> Self {
        Self { repo }
    }

    /// Append one entry. Safe to repeat for the same mutation id.
    pub async fn add(&self, envelope: &OutboxEnvelope) -> Result<OutboxEntry, AppError> {
        let entry = self.repo.enqueue(envelope).await?;
        if entry.envelope.enqueued_at != envelope.enqueued_at
            || entry.envelope.payload != envelope.payload
        {
            debug!(
                mutation_id = %envelope.mutation_id,
                "Outbox entry already present; keeping stored copy"
            );
        } else {
            info!(
                target = "vigil::sync::queue",
                mutation_id = %entry.id(),
                record_id = %entry.record_id(),
                operation = %entry.operation(),
                sequence = entry.sequence,
                "Outbox entry enqueued"
            );
        }
        self.publish_len().await;
        Ok(entry)
    }

    pub async fn items(&self) -> Result<Vec<OutboxEntry>, AppError> {
        let items = self.repo.list_entries().await?;
        gauge!(METRIC_SYNC_QUEUE_LEN).set(items.len() as f64);
        Ok(items)
    }

    pub async fn items_for(&self, record_id: Uuid) -> Result<Vec<OutboxEntry>, AppError> {
        Ok(self.repo.entries_for_record(record_id).await?)
    }

    pub async fn count(&self) -> Result<u64, AppError> {
        Ok(self.repo.count_entries().await?)
    }

    pub(crate) async fn publish_len(&self) {
        if let Ok(len) = self.repo.count_entries().await {
            gauge!(METRIC_SYNC_QUEUE_LEN).set(len as f64);
        }
    }
}
