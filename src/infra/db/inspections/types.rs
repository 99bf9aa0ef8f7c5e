use sqlx::types::Json;
use uuid::Uuid;

use crate::application::repos::RepoError;
use crate::domain::answers::Answer;
use crate::domain::entities::{CommentEntry, InspectionRecord, LinkedDefect};
use crate::domain::templates::{ChecklistItem, TemplateSection};
use crate::domain::types::{CloseKind, InspectionResult, InspectionStatus, SyncStatus};

use crate::infra::db::util::{convert_u32, from_millis, opt_from_millis};

pub(crate) const INSPECTION_COLUMNS: &str = "i.id, i.code, i.template_id, i.template_name, \
     i.template_version, i.asset_id, i.location_id, i.site_id, i.compliance_tag, \
     i.inspector_id, i.inspector_name, i.created_by, i.sections, i.items, i.answers, i.notes, \
     i.attachments, i.comments, i.defects, i.auto_create_defects, i.status, i.result, \
     i.revision_number, i.inspection_date, i.due_date, i.started_at, i.submitted_at, \
     i.submitted_by, i.approved_at, i.approved_by, i.approval_comment, i.closed_at, \
     i.closed_by, i.close_kind, i.sync_status, i.synced_at, i.last_sync_attempt, \
     i.sync_error, i.needs_review, i.created_at, i.updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct InspectionRow {
    pub(crate) id: Uuid,
    pub(crate) code: String,
    pub(crate) template_id: Uuid,
    pub(crate) template_name: String,
    pub(crate) template_version: String,
    pub(crate) asset_id: Option<Uuid>,
    pub(crate) location_id: Option<Uuid>,
    pub(crate) site_id: Option<Uuid>,
    pub(crate) compliance_tag: Option<String>,
    pub(crate) inspector_id: Uuid,
    pub(crate) inspector_name: String,
    pub(crate) created_by: Uuid,
    pub(crate) sections: Json<Vec<TemplateSection>>,
    pub(crate) items: Json<Vec<ChecklistItem>>,
    pub(crate) answers: Json<Vec<Answer>>,
    pub(crate) notes: Option<String>,
    pub(crate) attachments: Json<Vec<String>>,
    pub(crate) comments: Json<Vec<CommentEntry>>,
    pub(crate) defects: Json<Vec<LinkedDefect>>,
    pub(crate) auto_create_defects: Option<bool>,
    pub(crate) status: InspectionStatus,
    pub(crate) result: InspectionResult,
    pub(crate) revision_number: i64,
    pub(crate) inspection_date: i64,
    pub(crate) due_date: Option<i64>,
    pub(crate) started_at: Option<i64>,
    pub(crate) submitted_at: Option<i64>,
    pub(crate) submitted_by: Option<Uuid>,
    pub(crate) approved_at: Option<i64>,
    pub(crate) approved_by: Option<Uuid>,
    pub(crate) approval_comment: Option<String>,
    pub(crate) closed_at: Option<i64>,
    pub(crate) closed_by: Option<Uuid>,
    pub(crate) close_kind: Option<CloseKind>,
    pub(crate) sync_status: SyncStatus,
    pub(crate) synced_at: Option<i64>,
    pub(crate) last_sync_attempt: Option<i64>,
    pub(crate) sync_error: Option<String>,
    pub(crate) needs_review: bool,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}

impl TryFrom<InspectionRow> for InspectionRecord {
    type Error = RepoError;

    fn try_from(row: InspectionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            code: row.code,
            template_id: row.template_id,
            template_name: row.template_name,
            template_version: row.template_version,
            asset_id: row.asset_id,
            location_id: row.location_id,
            site_id: row.site_id,
            compliance_tag: row.compliance_tag,
            inspector_id: row.inspector_id,
            inspector_name: row.inspector_name,
            created_by: row.created_by,
            sections: row.sections.0,
            items: row.items.0,
            answers: row.answers.0,
            notes: row.notes,
            attachments: row.attachments.0,
            comments: row.comments.0,
            defects: row.defects.0,
            auto_create_defects: row.auto_create_defects,
            status: row.status,
            result: row.result,
            revision_number: convert_u32("revision_number", row.revision_number)?,
            inspection_date: from_millis(row.inspection_date)?,
            due_date: opt_from_millis(row.due_date)?,
            started_at: opt_from_millis(row.started_at)?,
            submitted_at: opt_from_millis(row.submitted_at)?,
            submitted_by: row.submitted_by,
            approved_at: opt_from_millis(row.approved_at)?,
            approved_by: row.approved_by,
            approval_comment: row.approval_comment,
            closed_at: opt_from_millis(row.closed_at)?,
            closed_by: row.closed_by,
            close_kind: row.close_kind,
            sync_status: row.sync_status,
            synced_at: opt_from_millis(row.synced_at)?,
            last_sync_attempt: opt_from_millis(row.last_sync_attempt)?,
            sync_error: row.sync_error,
            needs_review: row.needs_review,
            created_at: from_millis(row.created_at)?,
            updated_at: from_millis(row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SummaryRow {
    pub(crate) total: i64,
    pub(crate) completed_this_week: i64,
    pub(crate) overdue: i64,
    pub(crate) failed: i64,
    pub(crate) open_defects: i64,
    pub(crate) compliance: i64,
}
