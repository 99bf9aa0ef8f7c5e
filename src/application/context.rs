//! Orchestration facade used by the UI and the CLI.
//!
//! Every mutation runs "mutate store, enqueue outbox entry" under the record
//! lock inside [`InspectionService`]. Reads, the dashboard summary included, always
//! go to the store.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::application::defects::DefectsGateway;
use crate::application::error::AppError;
use crate::application::inspections::InspectionService;
use crate::application::locks::RecordLocks;
use crate::application::remote::RemoteApi;
use crate::application::repos::{
    InspectionQueryFilter, InspectionsRepo, InspectionsWriteRepo, OutboxEntry, SettingsRepo,
    SyncQueueRepo, SyncStateFilter, TemplatesRepo, TemplatesWriteRepo,
};
use crate::application::settings::EngineSettingsService;
use crate::application::sync::{FlushOutcome, ReconcileReport, SyncEngine, SyncQueue, SyncTrigger};
use crate::application::templates::TemplateService;
use crate::domain::entities::{
    Actor, InspectionDetail, InspectionRecord, InspectionSummary, SyncState,
};
use crate::domain::lifecycle::{InspectionDraft, InspectionPatch};

/// Repository handles the context is assembled from.
#[derive(Clone)]
pub struct Stores {
    pub inspections: Arc<dyn InspectionsRepo>,
    pub inspections_write: Arc<dyn InspectionsWriteRepo>,
    pub templates: Arc<dyn TemplatesRepo>,
    pub templates_write: Arc<dyn TemplatesWriteRepo>,
    pub settings: Arc<dyn SettingsRepo>,
    pub sync_queue: Arc<dyn SyncQueueRepo>,
}

#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub code_prefix: String,
    pub request_timeout: Duration,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            code_prefix: "INSP".to_string(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

pub struct InspectionContext {
    inspections: InspectionService,
    templates: TemplateService,
    settings: EngineSettingsService,
    engine: Arc<SyncEngine>,
}

impl InspectionContext {
    pub fn new(
        stores: Stores,
        remote: Arc<dyn RemoteApi>,
        defects: Arc<dyn DefectsGateway>,
        options: ContextOptions,
    ) -> Self {
        let locks = RecordLocks::new();
        let queue = SyncQueue::new(stores.sync_queue.clone());
        let inspections = InspectionService::new(
            stores.inspections.clone(),
            stores.inspections_write.clone(),
            stores.templates.clone(),
            stores.settings.clone(),
            defects,
            queue,
            locks.clone(),
            options.code_prefix,
        );
        let engine = SyncEngine::new(
            stores.sync_queue,
            stores.inspections,
            stores.settings.clone(),
            remote,
            locks,
            options.request_timeout,
        );

        Self {
            inspections,
            templates: TemplateService::new(stores.templates, stores.templates_write),
            settings: EngineSettingsService::new(stores.settings),
            engine: Arc::new(engine),
        }
    }

    pub fn templates(&self) -> &TemplateService {
        &self.templates
    }

    pub fn settings(&self) -> &EngineSettingsService {
        &self.settings
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub async fn load_inspections(
        &self,
        filter: &InspectionQueryFilter,
    ) -> Result<Vec<InspectionRecord>, AppError> {
        self.inspections.list(filter).await
    }

    pub async fn count_inspections(&self, filter: &InspectionQueryFilter) -> Result<u64, AppError> {
        self.inspections.count(filter).await
    }

    pub async fn load_inspection(&self, id: Uuid) -> Result<InspectionDetail, AppError> {
        self.inspections.detail(id).await
    }

    pub async fn load_inspection_by_code(&self, code: &str) -> Result<InspectionRecord, AppError> {
        self.inspections.find_by_code(code).await
    }

    pub async fn create_new_inspection(
        &self,
        actor: &Actor,
        draft: InspectionDraft,
    ) -> Result<InspectionRecord, AppError> {
        self.inspections.create(actor, draft).await
    }

    pub async fn update_inspection_data(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: InspectionPatch,
    ) -> Result<InspectionRecord, AppError> {
        self.inspections.update(actor, id, patch).await
    }

    pub async fn submit_inspection_data(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<InspectionRecord, AppError> {
        self.inspections.submit(actor, id).await
    }

    pub async fn approve_inspection_data(
        &self,
        actor: &Actor,
        id: Uuid,
        comment: Option<String>,
    ) -> Result<InspectionRecord, AppError> {
        self.inspections.approve(actor, id, comment).await
    }

    pub async fn request_changes(
        &self,
        actor: &Actor,
        id: Uuid,
        comment: String,
    ) -> Result<InspectionRecord, AppError> {
        self.inspections.request_changes(actor, id, comment).await
    }

    pub async fn reopen_inspection(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<InspectionRecord, AppError> {
        self.inspections.reopen(actor, id).await
    }

    pub async fn close_inspection(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<InspectionRecord, AppError> {
        self.inspections.close(actor, id).await
    }

    pub async fn void_inspection(
        &self,
        actor: &Actor,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<InspectionRecord, AppError> {
        self.inspections.void(actor, id, reason).await
    }

    /// Drain the outbox now. Delivery failures are recorded per record, not returned.
    pub async fn sync(&self) -> Result<FlushOutcome, AppError> {
        self.engine.flush(SyncTrigger::Manual).await
    }

    /// Start a background flush after the device regains connectivity.
    pub fn connectivity_restored(&self) -> JoinHandle<Result<FlushOutcome, AppError>> {
        self.engine.spawn_flush(SyncTrigger::ConnectivityRestored)
    }

    pub async fn refresh_sync_queue(&self) -> Result<Vec<OutboxEntry>, AppError> {
        self.engine.queue().items().await
    }

    pub async fn sync_queue_count(&self) -> Result<u64, AppError> {
        self.engine.queue().count().await
    }

    pub async fn sync_states(&self, filter: &SyncStateFilter) -> Result<Vec<SyncState>, AppError> {
        self.engine.sync_states(filter).await
    }

    /// Re-arm a flagged record with last-writer-wins and flush.
    pub async fn force_retry(&self, record_id: Uuid) -> Result<FlushOutcome, AppError> {
        self.engine.force_retry(record_id).await?;
        self.engine.flush(SyncTrigger::Manual).await
    }

    #[instrument(skip(self))]
    pub async fn reconcile_on_startup(&self) -> Result<ReconcileReport, AppError> {
        let report = self.engine.reconcile().await?;
        self.engine.queue().publish_len().await;
        Ok(report)
    }

    /// Dashboard counters computed from the store as of now.
    pub async fn summary(&self) -> Result<InspectionSummary, AppError> {
        let summary = self
            .inspections
            .summary(OffsetDateTime::now_utc())
            .await?;
        debug!(total = summary.total, overdue = summary.overdue, "Summary computed");
        Ok(summary)
    }

    /// Reconcile, then flush when asked to and the remote is reachable.
    pub async fn start(&self, flush: bool) -> Result<Option<FlushOutcome>, AppError> {
        let report = self.reconcile_on_startup().await?;
        info!(
            target = "vigil::context",
            reset = report.reset,
            requeued = report.requeued,
            "Inspection context ready"
        );
        if !flush {
            return Ok(None);
        }
        Ok(Some(self.engine.flush(SyncTrigger::Startup).await?))
    }
}
