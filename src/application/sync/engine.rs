//! Outbox drain loop.
//!
//! Entries are delivered oldest first. A failed delivery blocks the rest of
//! that record's entries for the current flush while other records continue.
//! The flush only stops early when the remote fails its health probe.
//! A record is only marked `synced` after the remote acknowledged the entry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use vigil_api_types::{OutboxEnvelope, SyncAck, SyncOperation};

use crate::application::error::AppError;
use crate::application::locks::RecordLocks;
use crate::application::remote::{RemoteApi, RemoteError};
use crate::application::repos::{
    InspectionsRepo, OutboxEntry, SettingsRepo, SyncQueueRepo, SyncStateFilter,
};
use crate::domain::entities::SyncState;
use crate::domain::types::{ConflictPolicy, SyncStatus};

use super::conflict::{self, Resolution};
use super::payloads;
use super::queue::SyncQueue;

pub(crate) const METRIC_SYNC_SENT: &str = "vigil_sync_entries_sent_total";
pub(crate) const METRIC_SYNC_FAILED: &str = "vigil_sync_entries_failed_total";
pub(crate) const METRIC_SYNC_CONFLICTS: &str = "vigil_sync_conflicts_total";
pub(crate) const METRIC_SYNC_FLUSH_MS: &str = "vigil_sync_flush_ms";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Manual,
    ConnectivityRestored,
    Startup,
}

impl SyncTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncTrigger::Manual => "manual",
            SyncTrigger::ConnectivityRestored => "connectivity_restored",
            SyncTrigger::Startup => "startup",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub sent: u32,
    pub failed: u32,
    pub conflicts: u32,
    pub flagged: u32,
    /// Entries still queued when the flush ended.
    pub remaining: u64,
    /// The remote became unreachable part-way through.
    pub interrupted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    Completed(FlushReport),
    Offline { pending: u64 },
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub reset: u64,
    pub requeued: u64,
}

enum Delivery {
    Acknowledged,
    Failed,
    Unreachable,
}

pub struct SyncEngine {
    outbox: Arc<dyn SyncQueueRepo>,
    inspections: Arc<dyn InspectionsRepo>,
    settings: Arc<dyn SettingsRepo>,
    remote: Arc<dyn RemoteApi>,
    queue: SyncQueue,
    locks: RecordLocks,
    flush_gate: Mutex<()>,
    request_timeout: Duration,
}

impl SyncEngine {
    pub fn new(
        outbox: Arc<dyn SyncQueueRepo>,
        inspections: Arc<dyn InspectionsRepo>,
        settings: Arc<dyn SettingsRepo>,
        remote: Arc<dyn RemoteApi>,
        locks: RecordLocks,
        request_timeout: Duration,
    ) -> Self {
        Self {
            queue: SyncQueue::new(outbox.clone()),
            outbox,
            inspections,
            settings,
            remote,
            locks,
            flush_gate: Mutex::new(()),
            request_timeout,
        }
    }

    /// Drain the outbox. Concurrent calls return [`FlushOutcome::AlreadyRunning`].
    #[instrument(skip_all, fields(trigger = trigger.as_str()))]
    pub async fn flush(&self, trigger: SyncTrigger) -> Result<FlushOutcome, AppError> {
        let Ok(_gate) = self.flush_gate.try_lock() else {
            debug!("Flush already in flight; skipping");
            return Ok(FlushOutcome::AlreadyRunning);
        };

        if !self.remote.is_online().await {
            let pending = self.outbox.count_entries().await?;
            warn!(pending, "Remote unreachable; outbox left untouched");
            return Ok(FlushOutcome::Offline { pending });
        }

        let policy = self.settings.load_settings().await?.conflict_policy;
        let started = Instant::now();
        let mut report = FlushReport::default();
        let mut blocked: Vec<Uuid> = Vec::new();

        while let Some(entry) = self.outbox.next_entry(&blocked).await? {
            match self.deliver(&entry, policy, &mut report).await? {
                Delivery::Acknowledged => {}
                Delivery::Failed => blocked.push(entry.record_id()),
                Delivery::Unreachable => {
                    report.interrupted = true;
                    break;
                }
            }
        }

        report.remaining = self.outbox.count_entries().await?;
        histogram!(METRIC_SYNC_FLUSH_MS).record(started.elapsed().as_secs_f64() * 1000.0);
        self.queue.publish_len().await;

        info!(
            target = "vigil::sync::engine",
            sent = report.sent,
            failed = report.failed,
            conflicts = report.conflicts,
            flagged = report.flagged,
            remaining = report.remaining,
            interrupted = report.interrupted,
            "Outbox flush finished"
        );

        Ok(FlushOutcome::Completed(report))
    }

    /// Run a flush on the runtime without blocking the caller.
    pub fn spawn_flush(self: &Arc<Self>, trigger: SyncTrigger) -> JoinHandle<Result<FlushOutcome, AppError>> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.flush(trigger).await })
    }

    async fn deliver(
        &self,
        entry: &OutboxEntry,
        policy: ConflictPolicy,
        report: &mut FlushReport,
    ) -> Result<Delivery, AppError> {
        let record_id = entry.record_id();
        {
            let _lock = self.locks.acquire(record_id).await;
            self.outbox
                .mark_syncing(record_id, OffsetDateTime::now_utc())
                .await?;
        }

        let mut envelope = entry.envelope.clone();
        let mut flag_for_review = false;
        let mut result = self.send(&envelope).await;

        if let Err(error) = &result {
            match conflict::resolve(policy, error, envelope.force) {
                Resolution::ForceResend => {
                    report.conflicts += 1;
                    counter!(METRIC_SYNC_CONFLICTS, "resolution" => "force_resend").increment(1);
                    info!(
                        mutation_id = %envelope.mutation_id,
                        record_id = %record_id,
                        "Remote state is stale; resending local payload with force"
                    );
                    envelope.force = true;
                    result = self.send(&envelope).await;
                }
                Resolution::FlagForReview => {
                    report.conflicts += 1;
                    flag_for_review = true;
                    counter!(METRIC_SYNC_CONFLICTS, "resolution" => "flag_for_review").increment(1);
                }
                Resolution::Fail => {}
            }
        }

        // A transport error for one payload only ends the flush when the remote is really gone.
        let unreachable = match &result {
            Err(error) if error.is_connectivity() => !self.remote.is_online().await,
            _ => false,
        };

        let _lock = self.locks.acquire(record_id).await;
        let now = OffsetDateTime::now_utc();
        match result {
            Ok(ack) => {
                let status = self.outbox.acknowledge(entry.id(), record_id, now).await?;
                report.sent += 1;
                counter!(METRIC_SYNC_SENT, "operation" => entry.operation().as_str()).increment(1);
                info!(
                    mutation_id = %ack.mutation_id,
                    record_id = %record_id,
                    operation = %entry.operation(),
                    remote_revision = ?ack.remote_revision,
                    record_status = status.as_str(),
                    "Outbox entry acknowledged"
                );
                Ok(Delivery::Acknowledged)
            }
            Err(error) => {
                self.outbox
                    .record_failure(entry.id(), record_id, &error.to_string(), flag_for_review, now)
                    .await?;
                report.failed += 1;
                if flag_for_review {
                    report.flagged += 1;
                }
                counter!(METRIC_SYNC_FAILED, "operation" => entry.operation().as_str())
                    .increment(1);
                warn!(
                    mutation_id = %entry.id(),
                    record_id = %record_id,
                    operation = %entry.operation(),
                    attempts = entry.attempts + 1,
                    needs_review = flag_for_review,
                    error = %error,
                    "Outbox delivery failed; later entries for this record wait"
                );
                Ok(if unreachable {
                    Delivery::Unreachable
                } else {
                    Delivery::Failed
                })
            }
        }
    }

    async fn send(&self, envelope: &OutboxEnvelope) -> Result<SyncAck, RemoteError> {
        let ack = match tokio::time::timeout(self.request_timeout, self.remote.send(envelope)).await
        {
            Ok(result) => result?,
            Err(_) => return Err(RemoteError::Timeout(self.request_timeout)),
        };
        if ack.mutation_id != envelope.mutation_id {
            return Err(RemoteError::Validation(format!(
                "acknowledgement for {} does not match mutation {}",
                ack.mutation_id, envelope.mutation_id
            )));
        }
        Ok(ack)
    }

    /// Repair state left by an interrupted process before the first flush.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<ReconcileReport, AppError> {
        let reset = self.outbox.reset_interrupted().await?;
        let mut requeued = 0;

        for record_id in self.outbox.unsynced_without_entries().await? {
            let _lock = self.locks.acquire(record_id).await;
            if !self.outbox.entries_for_record(record_id).await?.is_empty() {
                continue;
            }
            let Some(record) = self.inspections.find_inspection(record_id).await? else {
                continue;
            };
            if record.sync_status == SyncStatus::Synced {
                continue;
            }

            let operation = if record.synced_at.is_none() {
                SyncOperation::CreateInspection
            } else {
                SyncOperation::UpdateInspection
            };
            let envelope = payloads::envelope(
                operation,
                &record,
                payloads::snapshot_payload(&record)?,
                OffsetDateTime::now_utc(),
            );
            self.queue.add(&envelope).await?;
            requeued += 1;
        }

        if reset > 0 || requeued > 0 {
            info!(
                target = "vigil::sync::engine",
                reset, requeued, "Reconciled sync state on startup"
            );
        }
        Ok(ReconcileReport { reset, requeued })
    }

    /// Keep the local edit for a flagged record and re-arm its entries with `force`.
    pub async fn force_retry(&self, record_id: Uuid) -> Result<u64, AppError> {
        let _lock = self.locks.acquire(record_id).await;
        if self.inspections.find_inspection(record_id).await?.is_none() {
            return Err(AppError::not_found("inspection"));
        }
        let armed = self.outbox.force_entries(record_id).await?;
        info!(record_id = %record_id, armed, "Forced retry requested");
        Ok(armed)
    }

    pub async fn sync_states(&self, filter: &SyncStateFilter) -> Result<Vec<SyncState>, AppError> {
        Ok(self.outbox.sync_states(filter).await?)
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }
}
