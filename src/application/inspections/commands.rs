use metrics::counter;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;
use vigil_api_types::{ApprovalDecision, SyncOperation};

use crate::application::defects;
use crate::application::error::AppError;
use crate::application::sync::payloads;
use crate::domain::entities::{Actor, HistoryEntry, InspectionRecord, LinkedDefect};
use crate::domain::error::DomainError;
use crate::domain::lifecycle::{self, InspectionDraft, InspectionPatch, NewInspection};
use crate::domain::permissions::{self, require};

use super::service::InspectionService;

pub(crate) const METRIC_TRANSITIONS: &str = "vigil_inspection_transitions_total";

impl InspectionService {
    pub async fn create(
        &self,
        actor: &Actor,
        draft: InspectionDraft,
    ) -> Result<InspectionRecord, AppError> {
        require(
            permissions::can_create(actor.role),
            actor.role,
            "create inspections",
        )?;
        lifecycle::ensure_linkage(&draft)?;

        let template = self
            .templates
            .find_template(draft.template_id)
            .await?
            .ok_or_else(|| AppError::not_found("template"))?;
        let inspection = NewInspection::from_template(
            Uuid::new_v4(),
            &template,
            draft,
            actor,
            OffsetDateTime::now_utc(),
        )?;

        let _lock = self.locks.acquire(inspection.id()).await;
        let record = self
            .writer
            .create_inspection(&self.code_prefix, inspection)
            .await?;
        info!(
            target = "vigil::inspections",
            inspection_id = %record.id,
            code = %record.code,
            template_id = %record.template_id,
            actor = %actor.user_id,
            "Inspection created"
        );

        let payload = payloads::snapshot_payload(&record)?;
        self.enqueue(SyncOperation::CreateInspection, &record, payload)
            .await
    }

    /// Merge a patch. A patch that changes nothing is not recorded or queued.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: InspectionPatch,
    ) -> Result<InspectionRecord, AppError> {
        let _lock = self.locks.acquire(id).await;
        let mut record = self.get(id).await?;
        let settings = self.settings.load_settings().await?;

        let Some(entry) =
            record.apply_patch(actor, patch, &settings, OffsetDateTime::now_utc())?
        else {
            return Ok(record);
        };
        let record = self
            .writer
            .save_inspection(&record, std::slice::from_ref(&entry))
            .await?;
        if entry.status_change().is_some() {
            counter!(METRIC_TRANSITIONS, "action" => "start").increment(1);
        }

        let payload = payloads::update_payload(&record, &entry)?;
        self.enqueue(SyncOperation::UpdateInspection, &record, payload)
            .await
    }

    /// Submit, then raise defects for qualifying failures.
    ///
    /// The submission is committed before the defects collaborator is called;
    /// a defect that cannot be created becomes a warning in history.
    pub async fn submit(&self, actor: &Actor, id: Uuid) -> Result<InspectionRecord, AppError> {
        let _lock = self.locks.acquire(id).await;
        let mut record = self.get(id).await?;
        let now = OffsetDateTime::now_utc();

        let entry = record.submit(actor, now)?;
        let mut record = self.writer.save_inspection(&record, &[entry]).await?;
        counter!(METRIC_TRANSITIONS, "action" => "submit").increment(1);

        let settings = self.settings.load_settings().await?;
        let requests = defects::qualifying_failures(&record, &settings);
        if !requests.is_empty() {
            let mut linked = Vec::new();
            let mut warnings = Vec::new();
            for request in requests {
                match self
                    .defects
                    .create_defect_from_failed_item(
                        record.id,
                        &request.item_id,
                        request.severity,
                        request.compliance_tag.as_deref(),
                    )
                    .await
                {
                    Ok(defect_id) => linked.push(LinkedDefect {
                        defect_id,
                        item_id: request.item_id,
                    }),
                    Err(err) => {
                        warn!(
                            inspection_id = %record.id,
                            item_id = %request.item_id,
                            error = %err,
                            "Defect creation failed; submission stands"
                        );
                        warnings.push(record.warning(
                            actor,
                            format!(
                                "Defect for failed item `{}` was not created: {err}",
                                request.item_id
                            ),
                            now,
                        ));
                    }
                }
            }

            let mut entries: Vec<HistoryEntry> =
                record.link_defects(actor, linked, now).into_iter().collect();
            entries.extend(warnings);
            record = self.writer.save_inspection(&record, &entries).await?;
        }

        info!(
            target = "vigil::inspections",
            inspection_id = %record.id,
            code = %record.code,
            result = record.result.as_str(),
            defects = record.defects.len(),
            "Inspection submitted"
        );

        let payload = payloads::submit_payload(&record)?;
        self.enqueue(SyncOperation::SubmitInspection, &record, payload)
            .await
    }

    pub async fn approve(
        &self,
        actor: &Actor,
        id: Uuid,
        comment: Option<String>,
    ) -> Result<InspectionRecord, AppError> {
        self.transition(
            id,
            "approve",
            SyncOperation::ApproveInspection,
            |record, now| record.approve(actor, comment, now),
            |record, entry| {
                payloads::approval_payload(
                    record,
                    ApprovalDecision::Approved,
                    actor.user_id,
                    entry.at,
                )
            },
        )
        .await
    }

    pub async fn request_changes(
        &self,
        actor: &Actor,
        id: Uuid,
        comment: String,
    ) -> Result<InspectionRecord, AppError> {
        self.transition(
            id,
            "request_changes",
            SyncOperation::ApproveInspection,
            |record, now| record.request_changes(actor, comment, now),
            |record, entry| {
                payloads::approval_payload(
                    record,
                    ApprovalDecision::ChangesRequested,
                    actor.user_id,
                    entry.at,
                )
            },
        )
        .await
    }

    pub async fn reopen(&self, actor: &Actor, id: Uuid) -> Result<InspectionRecord, AppError> {
        self.transition(
            id,
            "reopen",
            SyncOperation::UpdateInspection,
            |record, now| record.reopen(actor, now),
            payloads::update_payload,
        )
        .await
    }

    pub async fn close(&self, actor: &Actor, id: Uuid) -> Result<InspectionRecord, AppError> {
        self.transition(
            id,
            "close",
            SyncOperation::CloseInspection,
            |record, now| record.close(actor, now),
            |record, _| payloads::close_payload(record, None),
        )
        .await
    }

    pub async fn void(
        &self,
        actor: &Actor,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<InspectionRecord, AppError> {
        let payload_reason = reason.clone();
        self.transition(
            id,
            "void",
            SyncOperation::CloseInspection,
            |record, now| record.void(actor, reason, now),
            |record, _| payloads::close_payload(record, payload_reason),
        )
        .await
    }

    async fn transition<T, P>(
        &self,
        id: Uuid,
        action: &'static str,
        operation: SyncOperation,
        apply: T,
        payload: P,
    ) -> Result<InspectionRecord, AppError>
    where
        T: FnOnce(&mut InspectionRecord, OffsetDateTime) -> Result<HistoryEntry, DomainError>,
        P: FnOnce(&InspectionRecord, &HistoryEntry) -> Result<Value, AppError>,
    {
        let _lock = self.locks.acquire(id).await;
        let mut record = self.get(id).await?;

        let entry = apply(&mut record, OffsetDateTime::now_utc())?;
        let record = self
            .writer
            .save_inspection(&record, std::slice::from_ref(&entry))
            .await?;
        counter!(METRIC_TRANSITIONS, "action" => action).increment(1);
        info!(
            target = "vigil::inspections",
            inspection_id = %record.id,
            code = %record.code,
            action,
            status = %record.status,
            actor = %entry.actor.user_id,
            "Inspection transitioned"
        );

        let body = payload(&record, &entry)?;
        self.enqueue(operation, &record, body).await
    }

    /// Queue the committed mutation and return the record as stored.
    async fn enqueue(
        &self,
        operation: SyncOperation,
        record: &InspectionRecord,
        payload: Value,
    ) -> Result<InspectionRecord, AppError> {
        let envelope = payloads::envelope(operation, record, payload, OffsetDateTime::now_utc());
        self.queue.add(&envelope).await?;
        self.get(record.id).await
    }
}
