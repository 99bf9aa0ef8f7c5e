use async_trait::async_trait;
use sqlx::types::Json;

use crate::application::repos::{InspectionsWriteRepo, RepoError};
use crate::domain::entities::{HistoryEntry, InspectionRecord};
use crate::domain::lifecycle::{NewInspection, format_code};

use super::super::util::{convert_count, opt_to_millis, to_millis};
use super::super::{SqliteRepositories, WriteTx};
use crate::infra::db::map_sqlx_error;

async fn insert_history(write: &mut WriteTx<'_>, entries: &[HistoryEntry]) -> Result<(), RepoError> {
    for entry in entries {
        sqlx::query(
            "INSERT INTO inspection_history (id, inspection_id, entry_type, at, entry) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry.id)
        .bind(entry.inspection_id)
        .bind(entry.entry_type.as_str())
        .bind(to_millis(entry.at))
        .bind(Json(entry))
        .execute(&mut *write.tx)
        .await
        .map_err(map_sqlx_error)?;
    }
    Ok(())
}

#[async_trait]
impl InspectionsWriteRepo for SqliteRepositories {
    async fn create_inspection(
        &self,
        code_prefix: &str,
        inspection: NewInspection,
    ) -> Result<InspectionRecord, RepoError> {
        let mut write = self.begin_write().await?;

        let next: i64 = sqlx::query_scalar(
            "UPDATE inspection_code_sequence SET next_value = next_value + 1 \
             WHERE id = 1 RETURNING next_value",
        )
        .fetch_one(&mut *write.tx)
        .await
        .map_err(map_sqlx_error)?;
        let record = inspection.into_record(format_code(code_prefix, convert_count(next)?));

        sqlx::query(
            "INSERT INTO inspections (id, code, code_number, template_id, template_name, template_version, \
                 asset_id, location_id, site_id, compliance_tag, inspector_id, inspector_name, \
                 created_by, sections, items, answers, notes, attachments, comments, defects, \
                 defect_count, auto_create_defects, status, result, revision_number, \
                 inspection_date, due_date, sync_status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id)
        .bind(&record.code)
        .bind(next)
        .bind(record.template_id)
        .bind(&record.template_name)
        .bind(&record.template_version)
        .bind(record.asset_id)
        .bind(record.location_id)
        .bind(record.site_id)
        .bind(&record.compliance_tag)
        .bind(record.inspector_id)
        .bind(&record.inspector_name)
        .bind(record.created_by)
        .bind(Json(&record.sections))
        .bind(Json(&record.items))
        .bind(Json(&record.answers))
        .bind(&record.notes)
        .bind(Json(&record.attachments))
        .bind(Json(&record.comments))
        .bind(Json(&record.defects))
        .bind(record.defects.len() as i64)
        .bind(record.auto_create_defects)
        .bind(record.status)
        .bind(record.result)
        .bind(i64::from(record.revision_number))
        .bind(to_millis(record.inspection_date))
        .bind(opt_to_millis(record.due_date))
        .bind(record.sync_status)
        .bind(to_millis(record.created_at))
        .bind(to_millis(record.updated_at))
        .execute(&mut *write.tx)
        .await
        .map_err(map_sqlx_error)?;

        write.commit().await?;

        self.fetch_inspection(record.id)
            .await?
            .ok_or(RepoError::NotFound)
    }

    async fn save_inspection(
        &self,
        record: &InspectionRecord,
        entries: &[HistoryEntry],
    ) -> Result<InspectionRecord, RepoError> {
        let mut write = self.begin_write().await?;

        let result = sqlx::query(
            "UPDATE inspections SET asset_id = ?, location_id = ?, site_id = ?, \
                 inspector_id = ?, inspector_name = ?, answers = ?, notes = ?, attachments = ?, \
                 comments = ?, defects = ?, defect_count = ?, status = ?, result = ?, \
                 revision_number = ?, inspection_date = ?, due_date = ?, started_at = ?, \
                 submitted_at = ?, submitted_by = ?, approved_at = ?, approved_by = ?, \
                 approval_comment = ?, closed_at = ?, closed_by = ?, close_kind = ?, \
                 updated_at = ? \
             WHERE id = ?",
        )
        .bind(record.asset_id)
        .bind(record.location_id)
        .bind(record.site_id)
        .bind(record.inspector_id)
        .bind(&record.inspector_name)
        .bind(Json(&record.answers))
        .bind(&record.notes)
        .bind(Json(&record.attachments))
        .bind(Json(&record.comments))
        .bind(Json(&record.defects))
        .bind(record.defects.len() as i64)
        .bind(record.status)
        .bind(record.result)
        .bind(i64::from(record.revision_number))
        .bind(to_millis(record.inspection_date))
        .bind(opt_to_millis(record.due_date))
        .bind(opt_to_millis(record.started_at))
        .bind(opt_to_millis(record.submitted_at))
        .bind(record.submitted_by)
        .bind(opt_to_millis(record.approved_at))
        .bind(record.approved_by)
        .bind(&record.approval_comment)
        .bind(opt_to_millis(record.closed_at))
        .bind(record.closed_by)
        .bind(record.close_kind)
        .bind(to_millis(record.updated_at))
        .bind(record.id)
        .execute(&mut *write.tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        insert_history(&mut write, entries).await?;
        write.commit().await?;

        self.fetch_inspection(record.id)
            .await?
            .ok_or(RepoError::NotFound)
    }
}
