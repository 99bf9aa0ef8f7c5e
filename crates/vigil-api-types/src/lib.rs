//! Shared payload shapes for the inspection sync protocol.
//!
//! The local outbox stores one [`OutboxEnvelope`] per mutation; the remote
//! server answers each envelope with a [`SyncAck`] or a [`SyncRejection`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// Mutation kinds replayed against the server of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
pub enum SyncOperation {
    CreateInspection,
    UpdateInspection,
    SubmitInspection,
    ApproveInspection,
    CloseInspection,
}

impl SyncOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncOperation::CreateInspection => "create_inspection",
            SyncOperation::UpdateInspection => "update_inspection",
            SyncOperation::SubmitInspection => "submit_inspection",
            SyncOperation::ApproveInspection => "approve_inspection",
            SyncOperation::CloseInspection => "close_inspection",
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One queued mutation, exactly as it is sent to the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEnvelope {
    pub mutation_id: Uuid,
    pub operation: SyncOperation,
    pub record_id: Uuid,
    pub record_code: String,
    pub revision_number: u32,
    /// Ask the server to apply the payload over its current state.
    #[serde(default)]
    pub force: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub enqueued_at: OffsetDateTime,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAck {
    pub mutation_id: Uuid,
    pub record_id: Uuid,
    #[serde(default)]
    pub remote_revision: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    Validation,
    StaleState,
    PermissionDenied,
}

/// Body returned by the server when it refuses an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRejection {
    pub kind: RejectionKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    ChangesRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
pub enum CloseKind {
    Completed,
    Voided,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitPayload {
    pub submitted_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    pub result: String,
    pub answers: Value,
    pub defect_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPayload {
    pub decision: ApprovalDecision,
    pub decided_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub decided_at: OffsetDateTime,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosePayload {
    pub kind: CloseKind,
    pub closed_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub closed_at: OffsetDateTime,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDefectRequest {
    pub inspection_id: Uuid,
    pub item_id: String,
    pub severity: String,
    #[serde(default)]
    pub compliance_tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDefectResponse {
    pub id: Uuid,
}
