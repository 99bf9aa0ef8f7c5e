use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use super::answers::Answer;
use super::templates::{ChecklistItem, TemplateSection};
use super::types::{
    CloseKind, ConflictPolicy, HistoryEntryType, InspectionResult, InspectionStatus, Role,
    SyncStatus,
};

/// Identity triple supplied by the auth collaborator for every mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub user_name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, user_name: impl Into<String>, role: Role) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub before: Value,
    pub after: Value,
}

impl FieldChange {
    pub fn new(field: impl Into<String>, before: impl Serialize, after: impl Serialize) -> Self {
        Self {
            field: field.into(),
            before: serde_json::to_value(before).unwrap_or(Value::Null),
            after: serde_json::to_value(after).unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub inspection_id: Uuid,
    pub actor: Actor,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    pub entry_type: HistoryEntryType,
    pub summary: String,
    #[serde(default)]
    pub changes: Vec<FieldChange>,
}

impl HistoryEntry {
    pub fn new(
        inspection_id: Uuid,
        actor: &Actor,
        at: OffsetDateTime,
        entry_type: HistoryEntryType,
        summary: impl Into<String>,
        changes: Vec<FieldChange>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            inspection_id,
            actor: actor.clone(),
            at,
            entry_type,
            summary: summary.into(),
            changes,
        }
    }

    pub fn status_change(&self) -> Option<&FieldChange> {
        self.changes.iter().find(|change| change.field == "status")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentEntry {
    pub author_id: Uuid,
    pub author_name: String,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}

/// Defect raised by the defects collaborator for one failed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedDefect {
    pub defect_id: Uuid,
    pub item_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectionRecord {
    pub id: Uuid,
    pub code: String,
    pub template_id: Uuid,
    pub template_name: String,
    pub template_version: String,
    pub asset_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub site_id: Option<Uuid>,
    pub compliance_tag: Option<String>,
    pub inspector_id: Uuid,
    pub inspector_name: String,
    pub created_by: Uuid,
    pub sections: Vec<TemplateSection>,
    pub items: Vec<ChecklistItem>,
    pub answers: Vec<Answer>,
    pub notes: Option<String>,
    pub attachments: Vec<String>,
    pub comments: Vec<CommentEntry>,
    pub defects: Vec<LinkedDefect>,
    pub auto_create_defects: Option<bool>,
    pub status: InspectionStatus,
    pub result: InspectionResult,
    pub revision_number: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub inspection_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub submitted_at: Option<OffsetDateTime>,
    pub submitted_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub approved_at: Option<OffsetDateTime>,
    pub approved_by: Option<Uuid>,
    pub approval_comment: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub closed_at: Option<OffsetDateTime>,
    pub closed_by: Option<Uuid>,
    pub close_kind: Option<CloseKind>,
    pub sync_status: SyncStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub synced_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_sync_attempt: Option<OffsetDateTime>,
    pub sync_error: Option<String>,
    pub needs_review: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl InspectionRecord {
    pub fn answer(&self, item_id: &str) -> Option<&Answer> {
        self.answers.iter().find(|answer| answer.item_id == item_id)
    }

    pub fn item(&self, item_id: &str) -> Option<&ChecklistItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn defect_ids(&self) -> Vec<Uuid> {
        self.defects.iter().map(|defect| defect.defect_id).collect()
    }

    pub fn has_defect_for(&self, item_id: &str) -> bool {
        self.defects.iter().any(|defect| defect.item_id == item_id)
    }
}

/// A record together with its audit trail, oldest entry first.
#[derive(Debug, Clone, Serialize)]
pub struct InspectionDetail {
    pub record: InspectionRecord,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InspectionSummary {
    pub total: u64,
    pub completed_this_week: u64,
    pub overdue: u64,
    pub failed: u64,
    pub open_defects_from_inspections: u64,
    pub compliance_inspections: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineSettings {
    pub auto_create_defects: bool,
    pub conflict_policy: ConflictPolicy,
    /// Fields that may still change after an inspection is closed.
    pub post_close_fields: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl EngineSettings {
    pub fn allows_post_close(&self, field: &str) -> bool {
        self.post_close_fields.iter().any(|allowed| allowed == field)
    }
}

/// Replication state of one record, for status screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncState {
    pub record_id: Uuid,
    pub code: String,
    pub sync_status: SyncStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub synced_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_sync_attempt: Option<OffsetDateTime>,
    pub sync_error: Option<String>,
    pub needs_review: bool,
    pub queued_entries: u64,
}
