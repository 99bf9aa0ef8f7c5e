//! Envelope payloads for each queued operation.

use serde_json::{Value, json};
use time::OffsetDateTime;
use uuid::Uuid;
use vigil_api_types::{
    ApprovalDecision, ApprovalPayload, ClosePayload, CloseKind, OutboxEnvelope, SubmitPayload,
    SyncOperation,
};

use crate::application::error::AppError;
use crate::domain::entities::{HistoryEntry, InspectionRecord};

fn to_value(value: impl serde::Serialize) -> Result<Value, AppError> {
    serde_json::to_value(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode sync payload: {err}")))
}

fn missing(field: &str, record: &InspectionRecord) -> AppError {
    AppError::unexpected(format!(
        "inspection {} has no `{field}` to replicate",
        record.code
    ))
}

/// Full record snapshot; used for creation and for reconciliation replays.
pub fn snapshot_payload(record: &InspectionRecord) -> Result<Value, AppError> {
    Ok(json!({ "inspection": to_value(record)? }))
}

pub fn update_payload(
    record: &InspectionRecord,
    entry: &HistoryEntry,
) -> Result<Value, AppError> {
    Ok(json!({
        "inspection": to_value(record)?,
        "history_entry_id": entry.id,
        "changes": to_value(&entry.changes)?,
    }))
}

pub fn submit_payload(record: &InspectionRecord) -> Result<Value, AppError> {
    to_value(SubmitPayload {
        submitted_by: record
            .submitted_by
            .ok_or_else(|| missing("submitted_by", record))?,
        submitted_at: record
            .submitted_at
            .ok_or_else(|| missing("submitted_at", record))?,
        result: record.result.as_str().to_string(),
        answers: to_value(&record.answers)?,
        defect_ids: record.defect_ids(),
    })
}

pub fn approval_payload(
    record: &InspectionRecord,
    decision: ApprovalDecision,
    decided_by: Uuid,
    decided_at: OffsetDateTime,
) -> Result<Value, AppError> {
    to_value(ApprovalPayload {
        decision,
        decided_by,
        decided_at,
        comment: record.approval_comment.clone(),
    })
}

pub fn close_payload(
    record: &InspectionRecord,
    reason: Option<String>,
) -> Result<Value, AppError> {
    to_value(ClosePayload {
        kind: record.close_kind.unwrap_or(CloseKind::Completed),
        closed_by: record.closed_by.ok_or_else(|| missing("closed_by", record))?,
        closed_at: record.closed_at.ok_or_else(|| missing("closed_at", record))?,
        reason,
    })
}

pub fn envelope(
    operation: SyncOperation,
    record: &InspectionRecord,
    payload: Value,
    enqueued_at: OffsetDateTime,
) -> OutboxEnvelope {
    OutboxEnvelope {
        mutation_id: Uuid::new_v4(),
        operation,
        record_id: record.id,
        record_code: record.code.clone(),
        revision_number: record.revision_number,
        force: false,
        enqueued_at,
        payload,
    }
}
