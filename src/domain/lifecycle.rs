//! Inspection status machine.
//!
//! `Draft -> InProgress -> Submitted -> {Approved | ChangesRequested} -> Closed`,
//! with `ChangesRequested -> InProgress` as the only backward edge and a void
//! short-cut from `Draft`/`InProgress` straight to `Closed`. Every method that
//! mutates a record returns the history entry that must be persisted with it.

use serde_json::json;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use super::answers::{self, Answer, AnswerInput, AnswerValue};
use super::entities::{
    Actor, CommentEntry, EngineSettings, FieldChange, HistoryEntry, InspectionRecord,
    LinkedDefect,
};
use super::error::DomainError;
use super::permissions::{self, require};
use super::templates::TemplateRecord;
use super::types::{
    CloseKind, HistoryEntryType, InspectionResult, InspectionStatus, SyncStatus,
};

pub const FIELD_ATTACHMENTS: &str = "attachments";
pub const FIELD_COMMENTS: &str = "comments";

/// Caller-supplied values for a new inspection.
#[derive(Debug, Clone, Default)]
pub struct InspectionDraft {
    pub template_id: Uuid,
    pub asset_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub site_id: Option<Uuid>,
    /// Defaults to the creating actor.
    pub inspector: Option<(Uuid, String)>,
    pub inspection_date: Option<OffsetDateTime>,
    pub due_date: Option<OffsetDateTime>,
    pub notes: Option<String>,
}

/// A fully-built inspection awaiting its sequential code.
#[derive(Debug, Clone)]
pub struct NewInspection {
    record: InspectionRecord,
}

impl NewInspection {
    pub fn from_template(
        id: Uuid,
        template: &TemplateRecord,
        draft: InspectionDraft,
        actor: &Actor,
        now: OffsetDateTime,
    ) -> Result<Self, DomainError> {
        require(
            permissions::can_create(actor.role),
            actor.role,
            "create inspections",
        )?;
        ensure_linkage(&draft)?;
        if !template.is_usable() {
            return Err(DomainError::invalid_state(format!(
                "template `{}` is not published or has been deactivated",
                template.name
            )));
        }

        let (inspector_id, inspector_name) = draft
            .inspector
            .unwrap_or_else(|| (actor.user_id, actor.user_name.clone()));

        Ok(Self {
            record: InspectionRecord {
                id,
                code: String::new(),
                template_id: template.id,
                template_name: template.name.clone(),
                template_version: template.version.clone(),
                asset_id: draft.asset_id,
                location_id: draft.location_id,
                site_id: draft.site_id,
                compliance_tag: template.compliance_tag.clone(),
                inspector_id,
                inspector_name,
                created_by: actor.user_id,
                sections: template.sections.clone(),
                items: template.items.clone(),
                answers: Vec::new(),
                notes: draft.notes,
                attachments: Vec::new(),
                comments: Vec::new(),
                defects: Vec::new(),
                auto_create_defects: template.auto_create_defects,
                status: InspectionStatus::Draft,
                result: InspectionResult::Pending,
                revision_number: 0,
                inspection_date: draft.inspection_date.unwrap_or(now),
                due_date: draft.due_date,
                started_at: None,
                submitted_at: None,
                submitted_by: None,
                approved_at: None,
                approved_by: None,
                approval_comment: None,
                closed_at: None,
                closed_by: None,
                close_kind: None,
                sync_status: SyncStatus::Pending,
                synced_at: None,
                last_sync_attempt: None,
                sync_error: None,
                needs_review: false,
                created_at: now,
                updated_at: now,
            },
        })
    }

    pub fn id(&self) -> Uuid {
        self.record.id
    }

    pub fn into_record(mut self, code: String) -> InspectionRecord {
        self.record.code = code;
        self.record
    }
}

pub fn ensure_linkage(draft: &InspectionDraft) -> Result<(), DomainError> {
    if draft.asset_id.is_none() && draft.location_id.is_none() {
        return Err(DomainError::validation(
            "an inspection must be linked to an asset or a location",
        ));
    }
    Ok(())
}

pub fn format_code(prefix: &str, value: u64) -> String {
    format!("{prefix}-{value:06}")
}

/// Partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct InspectionPatch {
    pub asset_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub site_id: Option<Uuid>,
    pub inspection_date: Option<OffsetDateTime>,
    pub due_date: Option<OffsetDateTime>,
    pub notes: Option<String>,
    /// Upserted by item id.
    pub answers: Vec<AnswerInput>,
    /// Appended.
    pub attachments: Vec<String>,
    /// Appended; author and timestamp come from the actor.
    pub comments: Vec<String>,
}

impl InspectionPatch {
    pub fn touched_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.asset_id.is_some() {
            fields.push("asset_id");
        }
        if self.location_id.is_some() {
            fields.push("location_id");
        }
        if self.site_id.is_some() {
            fields.push("site_id");
        }
        if self.inspection_date.is_some() {
            fields.push("inspection_date");
        }
        if self.due_date.is_some() {
            fields.push("due_date");
        }
        if self.notes.is_some() {
            fields.push("notes");
        }
        if !self.answers.is_empty() {
            fields.push("answers");
        }
        if !self.attachments.is_empty() {
            fields.push(FIELD_ATTACHMENTS);
        }
        if !self.comments.is_empty() {
            fields.push(FIELD_COMMENTS);
        }
        fields
    }
}

fn set_field<T>(field: &str, slot: &mut T, value: Option<T>, changes: &mut Vec<FieldChange>)
where
    T: PartialEq + serde::Serialize,
{
    if let Some(value) = value
        && *slot != value
    {
        changes.push(FieldChange::new(field, &*slot, &value));
        *slot = value;
    }
}

fn status_change(before: InspectionStatus, after: InspectionStatus) -> FieldChange {
    FieldChange::new("status", before, after)
}

impl InspectionRecord {
    fn ensure_status(
        &self,
        allowed: &[InspectionStatus],
        action: &str,
    ) -> Result<(), DomainError> {
        if allowed.contains(&self.status) {
            return Ok(());
        }
        if self.status == InspectionStatus::Closed {
            return Err(DomainError::invalid_state(format!(
                "inspection {} is closed; cannot {action}",
                self.code
            )));
        }
        Err(DomainError::invalid_state(format!(
            "cannot {action} inspection {} while it is {}",
            self.code, self.status
        )))
    }

    fn refresh_result(&mut self) {
        self.result = if self.status == InspectionStatus::Draft {
            InspectionResult::Pending
        } else {
            answers::compute_result(&self.items, &self.answers)
        };
    }

    /// Merge a partial update and describe it as one history entry.
    ///
    /// Returns `Ok(None)` when the patch changes nothing.
    pub fn apply_patch(
        &mut self,
        actor: &Actor,
        patch: InspectionPatch,
        settings: &EngineSettings,
        now: OffsetDateTime,
    ) -> Result<Option<HistoryEntry>, DomainError> {
        require(
            permissions::can_edit(actor.role, Some(self.status)),
            actor.role,
            "edit this inspection",
        )?;

        let touched = patch.touched_fields();
        if self.status == InspectionStatus::Closed
            && let Some(field) = touched
                .iter()
                .find(|field| !settings.allows_post_close(field))
        {
            return Err(DomainError::invalid_state(format!(
                "inspection {} is closed; `{field}` can no longer change",
                self.code
            )));
        }
        if !patch.answers.is_empty() {
            self.ensure_status(
                &[InspectionStatus::Draft, InspectionStatus::InProgress],
                "record answers on",
            )?;
        }

        let linked_asset = patch.asset_id.or(self.asset_id);
        let linked_location = patch.location_id.or(self.location_id);
        if linked_asset.is_none() && linked_location.is_none() {
            return Err(DomainError::validation(
                "an inspection must be linked to an asset or a location",
            ));
        }

        let mut changes = Vec::new();
        set_field("asset_id", &mut self.asset_id, patch.asset_id.map(Some), &mut changes);
        set_field(
            "location_id",
            &mut self.location_id,
            patch.location_id.map(Some),
            &mut changes,
        );
        set_field("site_id", &mut self.site_id, patch.site_id.map(Some), &mut changes);
        if let Some(date) = patch.inspection_date
            && date != self.inspection_date
        {
            changes.push(FieldChange::new(
                "inspection_date",
                rfc3339(Some(self.inspection_date)),
                rfc3339(Some(date)),
            ));
            self.inspection_date = date;
        }
        if let Some(due) = patch.due_date
            && self.due_date != Some(due)
        {
            changes.push(FieldChange::new(
                "due_date",
                rfc3339(self.due_date),
                rfc3339(Some(due)),
            ));
            self.due_date = Some(due);
        }
        set_field("notes", &mut self.notes, patch.notes.map(Some), &mut changes);

        let mut signature_captured = false;
        let mut answers_changed = false;
        for answer in patch.answers {
            let item = self.item(&answer.item_id).ok_or_else(|| {
                DomainError::validation(format!(
                    "inspection {} has no checklist item `{}`",
                    self.code, answer.item_id
                ))
            })?;
            answers::validate_answer(item, &answer)?;

            let answer = answer.stamp(actor.user_id, now);
            let position = self
                .answers
                .iter()
                .position(|existing| existing.item_id == answer.item_id);
            let before = position.map(|index| self.answers[index].clone());
            let unchanged = before.as_ref().is_some_and(|existing| {
                existing.value == answer.value
                    && existing.comment == answer.comment
                    && existing.photos == answer.photos
            });
            if unchanged {
                continue;
            }

            if matches!(answer.value, Some(AnswerValue::Signature { .. })) {
                signature_captured = true;
            }
            answers_changed = true;
            changes.push(FieldChange::new(
                format!("answers.{}", answer.item_id),
                before.as_ref().map(answer_summary),
                answer_summary(&answer),
            ));
            match position {
                Some(index) => self.answers[index] = answer,
                None => self.answers.push(answer),
            }
        }

        let attachments_added = !patch.attachments.is_empty();
        if attachments_added {
            let before = self.attachments.clone();
            self.attachments.extend(patch.attachments);
            changes.push(FieldChange::new(FIELD_ATTACHMENTS, before, &self.attachments));
        }

        let comments_added = !patch.comments.is_empty();
        if comments_added {
            let before = self.comments.len();
            for body in patch.comments {
                if body.trim().is_empty() {
                    return Err(DomainError::validation("comments must not be empty"));
                }
                self.comments.push(CommentEntry {
                    author_id: actor.user_id,
                    author_name: actor.user_name.clone(),
                    body,
                    at: now,
                });
            }
            changes.push(FieldChange::new(
                FIELD_COMMENTS,
                before,
                self.comments.len(),
            ));
        }

        if changes.is_empty() {
            return Ok(None);
        }

        let mut entry_type = if signature_captured {
            HistoryEntryType::SignatureCaptured
        } else if answers_changed {
            HistoryEntryType::AnswersUpdated
        } else if attachments_added && changes.len() == 1 {
            HistoryEntryType::AttachmentAdded
        } else if comments_added && changes.len() == 1 {
            HistoryEntryType::CommentAdded
        } else {
            HistoryEntryType::FieldsUpdated
        };
        let mut summary = format!("Updated {}", describe_fields(&changes));

        if answers_changed && self.status == InspectionStatus::Draft {
            changes.push(status_change(self.status, InspectionStatus::InProgress));
            self.status = InspectionStatus::InProgress;
            self.started_at.get_or_insert(now);
            entry_type = HistoryEntryType::StatusChanged;
            summary = format!("Started inspection; {summary}");
        }

        let result_before = self.result;
        self.refresh_result();
        if self.result != result_before {
            changes.push(FieldChange::new("result", result_before, self.result));
        }
        self.updated_at = now;

        Ok(Some(HistoryEntry::new(
            self.id, actor, now, entry_type, summary, changes,
        )))
    }

    pub fn submit(
        &mut self,
        actor: &Actor,
        now: OffsetDateTime,
    ) -> Result<HistoryEntry, DomainError> {
        require(
            permissions::can_submit(actor.role),
            actor.role,
            "submit inspections",
        )?;
        self.ensure_status(&[InspectionStatus::InProgress], "submit")?;

        let problems = answers::submission_problems(&self.items, &self.answers);
        if !problems.is_empty() {
            return Err(DomainError::validation(problems.join("; ")));
        }

        let before = self.status;
        let result_before = self.result;
        self.status = InspectionStatus::Submitted;
        self.refresh_result();
        self.submitted_at = Some(now);
        self.submitted_by = Some(actor.user_id);
        self.updated_at = now;

        Ok(HistoryEntry::new(
            self.id,
            actor,
            now,
            HistoryEntryType::Submitted,
            format!("Submitted revision {} with result {}", self.revision_number, self.result.as_str()),
            vec![
                status_change(before, self.status),
                FieldChange::new("result", result_before, self.result),
            ],
        ))
    }

    pub fn approve(
        &mut self,
        actor: &Actor,
        comment: Option<String>,
        now: OffsetDateTime,
    ) -> Result<HistoryEntry, DomainError> {
        require(
            permissions::can_approve(actor.role),
            actor.role,
            "approve inspections",
        )?;
        self.ensure_status(&[InspectionStatus::Submitted], "approve")?;

        let before = self.status;
        self.status = InspectionStatus::Approved;
        self.approved_at = Some(now);
        self.approved_by = Some(actor.user_id);
        self.approval_comment = comment.filter(|comment| !comment.trim().is_empty());
        self.updated_at = now;

        Ok(HistoryEntry::new(
            self.id,
            actor,
            now,
            HistoryEntryType::Approved,
            format!("Approved by {}", actor.user_name),
            vec![status_change(before, self.status)],
        ))
    }

    pub fn request_changes(
        &mut self,
        actor: &Actor,
        comment: String,
        now: OffsetDateTime,
    ) -> Result<HistoryEntry, DomainError> {
        require(
            permissions::can_approve(actor.role),
            actor.role,
            "request changes on inspections",
        )?;
        self.ensure_status(&[InspectionStatus::Submitted], "request changes on")?;
        if comment.trim().is_empty() {
            return Err(DomainError::validation(
                "requesting changes needs a comment for the inspector",
            ));
        }

        let before = self.status;
        self.status = InspectionStatus::ChangesRequested;
        let comment_before = self.approval_comment.replace(comment);
        self.updated_at = now;

        Ok(HistoryEntry::new(
            self.id,
            actor,
            now,
            HistoryEntryType::ChangesRequested,
            format!("Changes requested by {}", actor.user_name),
            vec![
                status_change(before, self.status),
                FieldChange::new("approval_comment", comment_before, &self.approval_comment),
            ],
        ))
    }

    /// Back to `InProgress`; the submitted state is kept in the entry.
    pub fn reopen(
        &mut self,
        actor: &Actor,
        now: OffsetDateTime,
    ) -> Result<HistoryEntry, DomainError> {
        require(
            permissions::can_reopen(actor.role, None),
            actor.role,
            "reopen inspections",
        )?;
        self.ensure_status(&[InspectionStatus::ChangesRequested], "reopen")?;

        let snapshot = json!({
            "revision_number": self.revision_number,
            "result": self.result,
            "answers": self.answers,
            "submitted_at": rfc3339(self.submitted_at),
            "submitted_by": self.submitted_by,
            "approval_comment": self.approval_comment,
        });
        let before = self.status;
        let revision_before = self.revision_number;
        self.status = InspectionStatus::InProgress;
        self.revision_number += 1;
        self.updated_at = now;

        Ok(HistoryEntry::new(
            self.id,
            actor,
            now,
            HistoryEntryType::Reopened,
            format!("Reopened for revision {}", self.revision_number),
            vec![
                status_change(before, self.status),
                FieldChange::new("revision_number", revision_before, self.revision_number),
                FieldChange {
                    field: "submitted_snapshot".to_string(),
                    before: snapshot,
                    after: serde_json::Value::Null,
                },
            ],
        ))
    }

    pub fn close(
        &mut self,
        actor: &Actor,
        now: OffsetDateTime,
    ) -> Result<HistoryEntry, DomainError> {
        require(
            permissions::can_close(actor.role),
            actor.role,
            "close inspections",
        )?;
        self.ensure_status(&[InspectionStatus::Approved], "close")?;
        Ok(self.finish(actor, CloseKind::Completed, None, now))
    }

    /// Abandon an inspection that never reached review.
    pub fn void(
        &mut self,
        actor: &Actor,
        reason: Option<String>,
        now: OffsetDateTime,
    ) -> Result<HistoryEntry, DomainError> {
        require(
            permissions::can_close(actor.role),
            actor.role,
            "void inspections",
        )?;
        self.ensure_status(
            &[InspectionStatus::Draft, InspectionStatus::InProgress],
            "void",
        )?;
        Ok(self.finish(actor, CloseKind::Voided, reason, now))
    }

    fn finish(
        &mut self,
        actor: &Actor,
        kind: CloseKind,
        reason: Option<String>,
        now: OffsetDateTime,
    ) -> HistoryEntry {
        let before = self.status;
        self.status = InspectionStatus::Closed;
        self.closed_at = Some(now);
        self.closed_by = Some(actor.user_id);
        self.close_kind = Some(kind);
        self.updated_at = now;

        let (entry_type, summary) = match kind {
            CloseKind::Completed => (
                HistoryEntryType::Closed,
                format!("Closed by {}", actor.user_name),
            ),
            CloseKind::Voided => (
                HistoryEntryType::Voided,
                match reason {
                    Some(reason) => format!("Voided by {}: {reason}", actor.user_name),
                    None => format!("Voided by {}", actor.user_name),
                },
            ),
        };

        HistoryEntry::new(
            self.id,
            actor,
            now,
            entry_type,
            summary,
            vec![
                status_change(before, self.status),
                FieldChange::new("close_kind", Option::<CloseKind>::None, kind),
            ],
        )
    }

    /// Attach defects raised for failed items at submission.
    pub fn link_defects(
        &mut self,
        actor: &Actor,
        defects: Vec<LinkedDefect>,
        now: OffsetDateTime,
    ) -> Option<HistoryEntry> {
        if defects.is_empty() {
            return None;
        }
        let before = self.defect_ids();
        let count = defects.len();
        self.defects.extend(defects);
        self.updated_at = now;

        Some(HistoryEntry::new(
            self.id,
            actor,
            now,
            HistoryEntryType::DefectLinked,
            format!("Linked {count} defect(s) raised from failed items"),
            vec![FieldChange::new("defect_ids", before, self.defect_ids())],
        ))
    }

    pub fn warning(&self, actor: &Actor, message: impl Into<String>, now: OffsetDateTime) -> HistoryEntry {
        HistoryEntry::new(
            self.id,
            actor,
            now,
            HistoryEntryType::Warning,
            message,
            Vec::new(),
        )
    }
}

fn rfc3339(at: Option<OffsetDateTime>) -> Option<String> {
    at.and_then(|at| at.format(&Rfc3339).ok())
}

fn answer_summary(answer: &Answer) -> serde_json::Value {
    json!({
        "value": answer.value,
        "comment": answer.comment,
        "photos": answer.photos.len(),
    })
}

fn describe_fields(changes: &[FieldChange]) -> String {
    let mut fields: Vec<&str> = changes
        .iter()
        .map(|change| {
            change
                .field
                .split_once('.')
                .map_or(change.field.as_str(), |(head, _)| head)
        })
        .collect();
    fields.dedup();
    fields.join(", ")
}
