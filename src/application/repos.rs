//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{
    Actor, EngineSettings, HistoryEntry, InspectionRecord, InspectionSummary, SyncState,
};
use crate::domain::lifecycle::NewInspection;
use crate::domain::templates::TemplateRecord;
use crate::domain::types::{InspectionResult, InspectionStatus, SyncStatus};
use vigil_api_types::{OutboxEnvelope, SyncOperation};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectionSortField {
    InspectionDate,
    DueDate,
    CreatedAt,
    UpdatedAt,
    Code,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectionSort {
    pub field: InspectionSortField,
    pub descending: bool,
}

/// Composable inspection filter; every populated field narrows the result.
#[derive(Debug, Clone, Default)]
pub struct InspectionQueryFilter {
    pub statuses: Vec<InspectionStatus>,
    pub result: Option<InspectionResult>,
    pub site_id: Option<Uuid>,
    pub asset_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub template_id: Option<Uuid>,
    pub inspector_id: Option<Uuid>,
    pub inspection_date_from: Option<OffsetDateTime>,
    pub inspection_date_to: Option<OffsetDateTime>,
    /// Open inspections whose due date passed before this instant.
    pub overdue_at: Option<OffsetDateTime>,
    pub has_defects: Option<bool>,
    pub sync_status: Option<SyncStatus>,
    pub needs_review: Option<bool>,
    pub compliance_only: bool,
    /// Matched against code, template name and notes.
    pub search: Option<String>,
    pub sort: Option<InspectionSort>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl InspectionQueryFilter {
    /// Inspections assigned to the given actor.
    pub fn mine(actor: &Actor) -> Self {
        Self {
            inspector_id: Some(actor.user_id),
            ..Self::default()
        }
    }

    pub fn overdue(now: OffsetDateTime) -> Self {
        Self {
            overdue_at: Some(now),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait InspectionsRepo: Send + Sync {
    async fn find_inspection(&self, id: Uuid) -> Result<Option<InspectionRecord>, RepoError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<InspectionRecord>, RepoError>;

    async fn list_inspections(
        &self,
        filter: &InspectionQueryFilter,
    ) -> Result<Vec<InspectionRecord>, RepoError>;

    async fn count_inspections(&self, filter: &InspectionQueryFilter) -> Result<u64, RepoError>;

    async fn list_history(&self, id: Uuid) -> Result<Vec<HistoryEntry>, RepoError>;

    async fn summarize(&self, now: OffsetDateTime) -> Result<InspectionSummary, RepoError>;
}

#[async_trait]
pub trait InspectionsWriteRepo: Send + Sync {
    /// Allocate the next sequential code and insert the record.
    async fn create_inspection(
        &self,
        code_prefix: &str,
        inspection: NewInspection,
    ) -> Result<InspectionRecord, RepoError>;

    /// Persist a mutated record and its history in one transaction.
    ///
    /// Sync columns are left untouched.
    async fn save_inspection(
        &self,
        record: &InspectionRecord,
        entries: &[HistoryEntry],
    ) -> Result<InspectionRecord, RepoError>;
}

#[derive(Debug, Clone, Default)]
pub struct TemplateQueryFilter {
    pub include_drafts: bool,
    pub include_deactivated: bool,
    pub category: Option<String>,
    pub search: Option<String>,
}

#[async_trait]
pub trait TemplatesRepo: Send + Sync {
    async fn find_template(&self, id: Uuid) -> Result<Option<TemplateRecord>, RepoError>;

    async fn list_templates(
        &self,
        filter: &TemplateQueryFilter,
    ) -> Result<Vec<TemplateRecord>, RepoError>;

    async fn count_referencing_inspections(&self, template_id: Uuid) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait TemplatesWriteRepo: Send + Sync {
    async fn insert_template(&self, template: &TemplateRecord) -> Result<(), RepoError>;

    async fn update_template(&self, template: &TemplateRecord) -> Result<(), RepoError>;

    async fn delete_template(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait SettingsRepo: Send + Sync {
    async fn load_settings(&self) -> Result<EngineSettings, RepoError>;

    async fn upsert_settings(&self, settings: &EngineSettings) -> Result<(), RepoError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    pub sequence: i64,
    pub envelope: OutboxEnvelope,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<OffsetDateTime>,
}

impl OutboxEntry {
    pub fn id(&self) -> Uuid {
        self.envelope.mutation_id
    }

    pub fn record_id(&self) -> Uuid {
        self.envelope.record_id
    }

    pub fn operation(&self) -> SyncOperation {
        self.envelope.operation
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncStateFilter {
    pub statuses: Vec<SyncStatus>,
    pub needs_review: Option<bool>,
}

/// Durable outbox plus the per-record sync columns it drives.
#[async_trait]
pub trait SyncQueueRepo: Send + Sync {
    /// Insert unless an entry with the same mutation id exists; returns the stored entry.
    async fn enqueue(&self, envelope: &OutboxEnvelope) -> Result<OutboxEntry, RepoError>;

    /// Backlog in enqueue order.
    async fn list_entries(&self) -> Result<Vec<OutboxEntry>, RepoError>;

    async fn entries_for_record(&self, record_id: Uuid) -> Result<Vec<OutboxEntry>, RepoError>;

    async fn count_entries(&self) -> Result<u64, RepoError>;

    /// Oldest entry whose record is not in `skip`.
    async fn next_entry(&self, skip: &[Uuid]) -> Result<Option<OutboxEntry>, RepoError>;

    async fn mark_syncing(&self, record_id: Uuid, at: OffsetDateTime) -> Result<(), RepoError>;

    /// Remove an acknowledged entry and settle the record's status.
    async fn acknowledge(
        &self,
        entry_id: Uuid,
        record_id: Uuid,
        at: OffsetDateTime,
    ) -> Result<SyncStatus, RepoError>;

    /// Keep the entry, count the attempt and mark the record failed.
    async fn record_failure(
        &self,
        entry_id: Uuid,
        record_id: Uuid,
        error: &str,
        needs_review: bool,
        at: OffsetDateTime,
    ) -> Result<(), RepoError>;

    /// Re-arm a record's entries with `force` and clear its review flag.
    async fn force_entries(&self, record_id: Uuid) -> Result<u64, RepoError>;

    /// Return records stranded in `syncing` to `pending`.
    async fn reset_interrupted(&self) -> Result<u64, RepoError>;

    /// Records marked unsynced that have nothing queued.
    async fn unsynced_without_entries(&self) -> Result<Vec<Uuid>, RepoError>;

    async fn sync_states(&self, filter: &SyncStateFilter) -> Result<Vec<SyncState>, RepoError>;
}
