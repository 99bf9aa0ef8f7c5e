//! Shared domain enumerations aligned with persisted column values.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub use vigil_api_types::{ApprovalDecision, CloseKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum InspectionStatus {
    Draft,
    InProgress,
    Submitted,
    ChangesRequested,
    Approved,
    Closed,
}

impl InspectionStatus {
    pub const ALL: [InspectionStatus; 6] = [
        InspectionStatus::Draft,
        InspectionStatus::InProgress,
        InspectionStatus::Submitted,
        InspectionStatus::ChangesRequested,
        InspectionStatus::Approved,
        InspectionStatus::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InspectionStatus::Draft => "draft",
            InspectionStatus::InProgress => "in_progress",
            InspectionStatus::Submitted => "submitted",
            InspectionStatus::ChangesRequested => "changes_requested",
            InspectionStatus::Approved => "approved",
            InspectionStatus::Closed => "closed",
        }
    }

    /// Statuses in which field-level roles lose edit rights.
    pub fn is_under_review(self) -> bool {
        matches!(
            self,
            InspectionStatus::Submitted | InspectionStatus::Approved | InspectionStatus::Closed
        )
    }

    /// Statuses that still count as outstanding work.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            InspectionStatus::Draft
                | InspectionStatus::InProgress
                | InspectionStatus::ChangesRequested
        )
    }
}

impl fmt::Display for InspectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InspectionStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        InspectionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| format!("unknown inspection status `{value}`"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum InspectionResult {
    Pass,
    Fail,
    Pending,
}

impl InspectionResult {
    pub fn as_str(self) -> &'static str {
        match self {
            InspectionResult::Pass => "pass",
            InspectionResult::Fail => "fail",
            InspectionResult::Pending => "pending",
        }
    }
}

impl FromStr for InspectionResult {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pass" => Ok(InspectionResult::Pass),
            "fail" => Ok(InspectionResult::Fail),
            "pending" => Ok(InspectionResult::Pending),
            other => Err(format!("unknown inspection result `{other}`")),
        }
    }
}

/// Per-record replication state. Written only by the sync subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    Pending,
    Syncing,
    Failed,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Synced => "synced",
            SyncStatus::Pending => "pending",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Failed => "failed",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "synced" => Ok(SyncStatus::Synced),
            "pending" => Ok(SyncStatus::Pending),
            "syncing" => Ok(SyncStatus::Syncing),
            "failed" => Ok(SyncStatus::Failed),
            other => Err(format!("unknown sync status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Supervisor,
    Fitter,
    Viewer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Supervisor => "supervisor",
            Role::Fitter => "fitter",
            Role::Viewer => "viewer",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "supervisor" => Ok(Role::Supervisor),
            "fitter" => Ok(Role::Fitter),
            "viewer" => Ok(Role::Viewer),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    PassFail,
    #[serde(alias = "pass_fail_n_a")]
    PassFailNa,
    Number,
    Text,
    Date,
    Photo,
    Signature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Rule applied when the remote rejects a mutation because its copy moved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    LastWriteWins,
    #[default]
    FlagForReview,
}

impl ConflictPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictPolicy::LastWriteWins => "last-write-wins",
            ConflictPolicy::FlagForReview => "flag-for-review",
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "last-write-wins" => Ok(ConflictPolicy::LastWriteWins),
            "flag-for-review" => Ok(ConflictPolicy::FlagForReview),
            other => Err(format!("unknown conflict policy `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEntryType {
    FieldsUpdated,
    AnswersUpdated,
    SignatureCaptured,
    StatusChanged,
    Submitted,
    Approved,
    ChangesRequested,
    Reopened,
    Closed,
    Voided,
    DefectLinked,
    Warning,
    CommentAdded,
    AttachmentAdded,
}

impl HistoryEntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryEntryType::FieldsUpdated => "fields_updated",
            HistoryEntryType::AnswersUpdated => "answers_updated",
            HistoryEntryType::SignatureCaptured => "signature_captured",
            HistoryEntryType::StatusChanged => "status_changed",
            HistoryEntryType::Submitted => "submitted",
            HistoryEntryType::Approved => "approved",
            HistoryEntryType::ChangesRequested => "changes_requested",
            HistoryEntryType::Reopened => "reopened",
            HistoryEntryType::Closed => "closed",
            HistoryEntryType::Voided => "voided",
            HistoryEntryType::DefectLinked => "defect_linked",
            HistoryEntryType::Warning => "warning",
            HistoryEntryType::CommentAdded => "comment_added",
            HistoryEntryType::AttachmentAdded => "attachment_added",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_column_text() {
        for status in InspectionStatus::ALL {
            assert_eq!(status.as_str().parse::<InspectionStatus>(), Ok(status));
        }
    }

    #[test]
    fn conflict_policy_uses_kebab_case() {
        let json = serde_json::to_string(&ConflictPolicy::LastWriteWins).expect("serialize");
        assert_eq!(json, "\"last-write-wins\"");
        assert_eq!(
            "flag-for-review".parse::<ConflictPolicy>(),
            Ok(ConflictPolicy::FlagForReview)
        );
    }
}
