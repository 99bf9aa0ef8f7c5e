mod support;

use sqlx::SqlitePool;
use vigil::application::context::ContextOptions;
use vigil::application::error::AppError;
use vigil::application::settings::SettingsPatch;
use vigil::domain::answers::{AnswerInput, CheckResult};
use vigil::domain::lifecycle::{InspectionDraft, InspectionPatch};
use vigil::domain::types::{
    CloseKind, HistoryEntryType, InspectionResult, InspectionStatus, Severity, SyncStatus,
};
use vigil_api_types::SyncOperation;

use support::{Harness, admin, check_item, draft_for, fitter, manager, supervisor, viewer};

fn answers(inputs: Vec<AnswerInput>) -> InspectionPatch {
    InspectionPatch {
        answers: inputs,
        ..InspectionPatch::default()
    }
}

fn all_pass() -> InspectionPatch {
    answers(vec![
        AnswerInput::check("rungs", CheckResult::Pass),
        AnswerInput::check("feet", CheckResult::Pass),
    ])
}

#[sqlx::test(migrations = "./migrations")]
async fn create_assigns_sequential_codes_and_queues_the_creation(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let template = harness.basic_template().await;

    let first = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create first inspection");
    let second = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create second inspection");

    assert_eq!(first.code, "INSP-000001");
    assert_eq!(second.code, "INSP-000002");
    assert_eq!(first.status, InspectionStatus::Draft);
    assert_eq!(first.result, InspectionResult::Pending);
    assert_eq!(first.revision_number, 0);
    assert_eq!(first.sync_status, SyncStatus::Pending);
    assert_eq!(first.template_version, "v1");
    assert_eq!(first.items, template.items);
    assert_eq!(first.inspector_id, fitter().user_id);

    let queued = harness.context.refresh_sync_queue().await.expect("queue");
    assert_eq!(queued.len(), 2);
    assert!(
        queued
            .iter()
            .all(|entry| entry.operation() == SyncOperation::CreateInspection)
    );
    assert_eq!(queued[0].record_id(), first.id);

    let found = harness
        .context
        .load_inspection_by_code("INSP-000002")
        .await
        .expect("find by code");
    assert_eq!(found.id, second.id);
}

#[sqlx::test(migrations = "./migrations")]
async fn code_prefix_comes_from_options(pool: SqlitePool) {
    let harness = Harness::with_options(
        pool,
        ContextOptions {
            code_prefix: "LAD".to_string(),
            ..ContextOptions::default()
        },
    );
    let template = harness.basic_template().await;

    let record = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create inspection");
    assert_eq!(record.code, "LAD-000001");
}

#[sqlx::test(migrations = "./migrations")]
async fn rejected_creations_leave_no_trace(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let template = harness.basic_template().await;

    let err = harness
        .context
        .create_new_inspection(&viewer(), draft_for(template.id))
        .await
        .expect_err("viewers cannot create");
    assert!(matches!(err, AppError::Permission(_)), "got {err:?}");

    let unlinked = InspectionDraft {
        template_id: template.id,
        ..InspectionDraft::default()
    };
    let err = harness
        .context
        .create_new_inspection(&fitter(), unlinked)
        .await
        .expect_err("asset or location is required");
    assert!(matches!(err, AppError::Validation(_)), "got {err:?}");

    let err = harness
        .context
        .create_new_inspection(&fitter(), draft_for(uuid::Uuid::new_v4()))
        .await
        .expect_err("unknown template");
    assert!(matches!(err, AppError::NotFound { .. }), "got {err:?}");

    assert_eq!(harness.context.sync_queue_count().await.expect("count"), 0);

    let record = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create after failures");
    assert_eq!(record.code, "INSP-000001");
}

#[sqlx::test(migrations = "./migrations")]
async fn only_published_active_templates_can_be_inspected(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let templates = harness.context.templates();
    let draft = templates
        .create(
            &manager(),
            vigil::domain::templates::TemplateContent {
                name: "Unpublished".to_string(),
                items: vec![check_item("hinge", true, false)],
                ..Default::default()
            },
        )
        .await
        .expect("create draft template");

    let err = harness
        .context
        .create_new_inspection(&fitter(), draft_for(draft.id))
        .await
        .expect_err("drafts cannot be used");
    assert!(matches!(err, AppError::InvalidState(_)), "got {err:?}");

    let published = harness.basic_template().await;
    templates
        .deactivate(&manager(), published.id)
        .await
        .expect("deactivate");
    let err = harness
        .context
        .create_new_inspection(&fitter(), draft_for(published.id))
        .await
        .expect_err("deactivated templates cannot be used");
    assert!(matches!(err, AppError::InvalidState(_)), "got {err:?}");
}

#[sqlx::test(migrations = "./migrations")]
async fn first_answer_starts_the_inspection(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let template = harness.basic_template().await;
    let record = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create");

    let updated = harness
        .context
        .update_inspection_data(
            &fitter(),
            record.id,
            answers(vec![AnswerInput::check("rungs", CheckResult::Pass)]),
        )
        .await
        .expect("record answer");

    assert_eq!(updated.status, InspectionStatus::InProgress);
    assert!(updated.started_at.is_some());
    assert_eq!(updated.result, InspectionResult::Pending);
    assert_eq!(updated.answers.len(), 1);
    assert_eq!(updated.answers[0].answered_by, fitter().user_id);

    let detail = harness
        .context
        .load_inspection(record.id)
        .await
        .expect("detail");
    assert_eq!(detail.history.len(), 1);
    let entry = &detail.history[0];
    assert_eq!(entry.entry_type, HistoryEntryType::StatusChanged);
    assert_eq!(entry.actor.user_id, fitter().user_id);
    assert!(entry.changes.iter().any(|change| change.field == "status"));

    let queued = harness.context.refresh_sync_queue().await.expect("queue");
    assert_eq!(
        queued.iter().map(|entry| entry.operation()).collect::<Vec<_>>(),
        vec![SyncOperation::CreateInspection, SyncOperation::UpdateInspection]
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn unchanged_patch_is_neither_recorded_nor_queued(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let template = harness.basic_template().await;
    let record = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create");
    let notes = InspectionPatch {
        notes: Some("Ladder stored in bay 4".to_string()),
        ..InspectionPatch::default()
    };

    harness
        .context
        .update_inspection_data(&fitter(), record.id, notes.clone())
        .await
        .expect("first update");
    harness
        .context
        .update_inspection_data(&fitter(), record.id, notes)
        .await
        .expect("repeat update");

    let detail = harness.context.load_inspection(record.id).await.expect("detail");
    assert_eq!(detail.history.len(), 1);
    assert_eq!(detail.history[0].entry_type, HistoryEntryType::FieldsUpdated);
    assert_eq!(harness.context.sync_queue_count().await.expect("count"), 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn failed_required_item_needs_a_comment_before_submission(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let template = harness.basic_template().await;
    let record = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create");
    harness
        .context
        .update_inspection_data(
            &fitter(),
            record.id,
            answers(vec![
                AnswerInput::check("rungs", CheckResult::Fail),
                AnswerInput::check("feet", CheckResult::Pass),
            ]),
        )
        .await
        .expect("answer");

    let err = harness
        .context
        .submit_inspection_data(&fitter(), record.id)
        .await
        .expect_err("comment missing");
    assert!(matches!(err, AppError::Validation(ref message) if message.contains("rungs")));

    let stored = harness.context.load_inspection(record.id).await.expect("detail");
    assert_eq!(stored.record.status, InspectionStatus::InProgress);

    harness
        .context
        .update_inspection_data(
            &fitter(),
            record.id,
            answers(vec![
                AnswerInput::check("rungs", CheckResult::Fail).with_comment("Third rung cracked"),
            ]),
        )
        .await
        .expect("add comment");
    let submitted = harness
        .context
        .submit_inspection_data(&fitter(), record.id)
        .await
        .expect("submit");
    assert_eq!(submitted.status, InspectionStatus::Submitted);
    assert_eq!(submitted.result, InspectionResult::Fail);
    assert_eq!(submitted.submitted_by, Some(fitter().user_id));
}

#[sqlx::test(migrations = "./migrations")]
async fn draft_cannot_be_submitted(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let template = harness.basic_template().await;
    let record = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create");

    let err = harness
        .context
        .submit_inspection_data(&fitter(), record.id)
        .await
        .expect_err("nothing answered yet");
    assert!(matches!(err, AppError::InvalidState(_)), "got {err:?}");
}

#[sqlx::test(migrations = "./migrations")]
async fn full_review_cycle_ends_closed(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let template = harness.basic_template().await;
    let record = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create");
    harness
        .context
        .update_inspection_data(&fitter(), record.id, all_pass())
        .await
        .expect("answer");
    let submitted = harness
        .context
        .submit_inspection_data(&fitter(), record.id)
        .await
        .expect("submit");
    assert_eq!(submitted.result, InspectionResult::Pass);

    let err = harness
        .context
        .update_inspection_data(
            &fitter(),
            record.id,
            InspectionPatch {
                notes: Some("late note".into()),
                ..InspectionPatch::default()
            },
        )
        .await
        .expect_err("fitters lose edit rights under review");
    assert!(matches!(err, AppError::Permission(_)), "got {err:?}");

    let err = harness
        .context
        .approve_inspection_data(&fitter(), record.id, None)
        .await
        .expect_err("fitters cannot approve");
    assert!(matches!(err, AppError::Permission(_)), "got {err:?}");

    let approved = harness
        .context
        .approve_inspection_data(&supervisor(), record.id, Some("Looks good".into()))
        .await
        .expect("approve");
    assert_eq!(approved.status, InspectionStatus::Approved);
    assert_eq!(approved.approved_by, Some(supervisor().user_id));
    assert_eq!(approved.approval_comment.as_deref(), Some("Looks good"));

    let closed = harness
        .context
        .close_inspection(&supervisor(), record.id)
        .await
        .expect("close");
    assert_eq!(closed.status, InspectionStatus::Closed);
    assert_eq!(closed.close_kind, Some(CloseKind::Completed));
    assert!(closed.closed_at.is_some());

    let detail = harness.context.load_inspection(record.id).await.expect("detail");
    let kinds: Vec<_> = detail.history.iter().map(|entry| entry.entry_type).collect();
    assert_eq!(
        kinds,
        vec![
            HistoryEntryType::StatusChanged,
            HistoryEntryType::Submitted,
            HistoryEntryType::Approved,
            HistoryEntryType::Closed,
        ]
    );

    let queued = harness.context.refresh_sync_queue().await.expect("queue");
    assert_eq!(
        queued.iter().map(|entry| entry.operation()).collect::<Vec<_>>(),
        vec![
            SyncOperation::CreateInspection,
            SyncOperation::UpdateInspection,
            SyncOperation::SubmitInspection,
            SyncOperation::ApproveInspection,
            SyncOperation::CloseInspection,
        ]
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn requested_changes_reopen_as_a_new_revision(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let template = harness.basic_template().await;
    let record = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create");
    harness
        .context
        .update_inspection_data(&fitter(), record.id, all_pass())
        .await
        .expect("answer");
    harness
        .context
        .submit_inspection_data(&fitter(), record.id)
        .await
        .expect("submit");

    let err = harness
        .context
        .request_changes(&supervisor(), record.id, "   ".to_string())
        .await
        .expect_err("comment required");
    assert!(matches!(err, AppError::Validation(_)), "got {err:?}");

    let returned = harness
        .context
        .request_changes(&supervisor(), record.id, "Photograph the feet".to_string())
        .await
        .expect("request changes");
    assert_eq!(returned.status, InspectionStatus::ChangesRequested);

    let reopened = harness
        .context
        .reopen_inspection(&fitter(), record.id)
        .await
        .expect("reopen");
    assert_eq!(reopened.status, InspectionStatus::InProgress);
    assert_eq!(reopened.revision_number, 1);
    assert_eq!(reopened.answers.len(), 2);

    let resubmitted = harness
        .context
        .submit_inspection_data(&fitter(), record.id)
        .await
        .expect("resubmit");
    assert_eq!(resubmitted.status, InspectionStatus::Submitted);
    assert_eq!(resubmitted.revision_number, 1);

    let detail = harness.context.load_inspection(record.id).await.expect("detail");
    let reopened_entry = detail
        .history
        .iter()
        .find(|entry| entry.entry_type == HistoryEntryType::Reopened)
        .expect("reopen entry");
    let snapshot = reopened_entry
        .changes
        .iter()
        .find(|change| change.field == "submitted_snapshot")
        .expect("snapshot of the submitted revision");
    assert_eq!(snapshot.before["revision_number"], 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn closed_inspections_cannot_be_reopened(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let template = harness.basic_template().await;
    let record = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create");
    harness
        .context
        .update_inspection_data(&fitter(), record.id, all_pass())
        .await
        .expect("answer");
    harness
        .context
        .submit_inspection_data(&fitter(), record.id)
        .await
        .expect("submit");
    harness
        .context
        .approve_inspection_data(&supervisor(), record.id, None)
        .await
        .expect("approve");
    harness
        .context
        .close_inspection(&supervisor(), record.id)
        .await
        .expect("close");

    let err = harness
        .context
        .reopen_inspection(&admin(), record.id)
        .await
        .expect_err("closed is terminal");
    assert!(matches!(err, AppError::InvalidState(_)), "got {err:?}");
}

#[sqlx::test(migrations = "./migrations")]
async fn closed_inspections_only_accept_configured_fields(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let template = harness.basic_template().await;
    let record = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create");
    harness
        .context
        .void_inspection(&supervisor(), record.id, None)
        .await
        .expect("void");

    let attachment = InspectionPatch {
        attachments: vec!["photos/ladder-1.jpg".to_string()],
        ..InspectionPatch::default()
    };
    let err = harness
        .context
        .update_inspection_data(&admin(), record.id, attachment.clone())
        .await
        .expect_err("nothing is editable after close by default");
    assert!(matches!(err, AppError::InvalidState(_)), "got {err:?}");

    harness
        .context
        .settings()
        .update(
            &admin(),
            SettingsPatch {
                post_close_fields: Some(vec!["attachments".to_string()]),
                ..SettingsPatch::default()
            },
        )
        .await
        .expect("allow attachments after close");

    let updated = harness
        .context
        .update_inspection_data(&admin(), record.id, attachment)
        .await
        .expect("attachments allowed");
    assert_eq!(updated.attachments, vec!["photos/ladder-1.jpg".to_string()]);
    assert_eq!(updated.status, InspectionStatus::Closed);

    let err = harness
        .context
        .update_inspection_data(
            &admin(),
            record.id,
            InspectionPatch {
                comments: vec!["one more thing".to_string()],
                ..InspectionPatch::default()
            },
        )
        .await
        .expect_err("comments are still locked");
    assert!(matches!(err, AppError::InvalidState(_)), "got {err:?}");

    let detail = harness.context.load_inspection(record.id).await.expect("detail");
    assert_eq!(
        detail.history.last().map(|entry| entry.entry_type),
        Some(HistoryEntryType::AttachmentAdded)
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn voiding_is_limited_to_unreviewed_work(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let template = harness.basic_template().await;
    let record = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create");

    let err = harness
        .context
        .void_inspection(&fitter(), record.id, None)
        .await
        .expect_err("fitters cannot void");
    assert!(matches!(err, AppError::Permission(_)), "got {err:?}");

    let voided = harness
        .context
        .void_inspection(&supervisor(), record.id, Some("Asset scrapped".into()))
        .await
        .expect("void");
    assert_eq!(voided.status, InspectionStatus::Closed);
    assert_eq!(voided.close_kind, Some(CloseKind::Voided));

    let detail = harness.context.load_inspection(record.id).await.expect("detail");
    let entry = detail.history.last().expect("void entry");
    assert_eq!(entry.entry_type, HistoryEntryType::Voided);
    assert!(entry.summary.contains("Asset scrapped"));

    let other = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create");
    harness
        .context
        .update_inspection_data(&fitter(), other.id, all_pass())
        .await
        .expect("answer");
    harness
        .context
        .submit_inspection_data(&fitter(), other.id)
        .await
        .expect("submit");
    let err = harness
        .context
        .void_inspection(&supervisor(), other.id, None)
        .await
        .expect_err("submitted work goes through review");
    assert!(matches!(err, AppError::InvalidState(_)), "got {err:?}");
}

#[sqlx::test(migrations = "./migrations")]
async fn failed_items_raise_defects_on_submission(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let mut guard = check_item("guard", true, true);
    guard.compliance_tag = Some("PUWER".to_string());
    let mut oil = check_item("oil", false, false);
    oil.create_defect_on_fail = true;
    let label = check_item("label", false, false);
    let template = harness
        .published_template("Lathe pre-use", vec![guard, oil, label])
        .await;

    let record = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create");
    harness
        .context
        .update_inspection_data(
            &fitter(),
            record.id,
            answers(vec![
                AnswerInput::check("guard", CheckResult::Fail).with_comment("Guard missing"),
                AnswerInput::check("oil", CheckResult::Fail),
                AnswerInput::check("label", CheckResult::Fail),
            ]),
        )
        .await
        .expect("answer");

    let submitted = harness
        .context
        .submit_inspection_data(&fitter(), record.id)
        .await
        .expect("submit");
    assert_eq!(submitted.result, InspectionResult::Fail);
    assert_eq!(submitted.defects.len(), 2);

    let raised = harness.defects.raised();
    assert_eq!(raised.len(), 2);
    let guard_defect = raised
        .iter()
        .find(|defect| defect.item_id == "guard")
        .expect("critical failure raises a defect");
    assert_eq!(guard_defect.severity, Severity::Critical);
    assert_eq!(guard_defect.compliance_tag.as_deref(), Some("PUWER"));
    let oil_defect = raised
        .iter()
        .find(|defect| defect.item_id == "oil")
        .expect("flagged item raises a defect");
    assert_eq!(oil_defect.severity, Severity::Medium);
    assert!(raised.iter().all(|defect| defect.item_id != "label"));

    let detail = harness.context.load_inspection(record.id).await.expect("detail");
    assert!(
        detail
            .history
            .iter()
            .any(|entry| entry.entry_type == HistoryEntryType::DefectLinked)
    );

    harness
        .context
        .request_changes(&supervisor(), record.id, "Re-check the guard".into())
        .await
        .expect("request changes");
    harness
        .context
        .reopen_inspection(&fitter(), record.id)
        .await
        .expect("reopen");
    let resubmitted = harness
        .context
        .submit_inspection_data(&fitter(), record.id)
        .await
        .expect("resubmit");
    assert_eq!(resubmitted.defects.len(), 2);
    assert_eq!(harness.defects.raised().len(), 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn unavailable_defects_service_leaves_a_warning(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let template = harness
        .published_template("Hoist", vec![check_item("brake", true, true)])
        .await;
    harness.defects.set_unavailable(true);

    let record = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create");
    harness
        .context
        .update_inspection_data(
            &fitter(),
            record.id,
            answers(vec![
                AnswerInput::check("brake", CheckResult::Fail).with_comment("Brake slips"),
            ]),
        )
        .await
        .expect("answer");

    let submitted = harness
        .context
        .submit_inspection_data(&fitter(), record.id)
        .await
        .expect("submission stands without defects");
    assert_eq!(submitted.status, InspectionStatus::Submitted);
    assert!(submitted.defects.is_empty());

    let detail = harness.context.load_inspection(record.id).await.expect("detail");
    let warning = detail
        .history
        .iter()
        .find(|entry| entry.entry_type == HistoryEntryType::Warning)
        .expect("warning recorded");
    assert!(warning.summary.contains("brake"));
}

#[sqlx::test(migrations = "./migrations")]
async fn disabled_auto_defects_raise_nothing(pool: SqlitePool) {
    let harness = Harness::new(pool);
    harness
        .context
        .settings()
        .update(
            &admin(),
            SettingsPatch {
                auto_create_defects: Some(false),
                ..SettingsPatch::default()
            },
        )
        .await
        .expect("disable auto defects");
    let template = harness
        .published_template("Hoist", vec![check_item("brake", true, true)])
        .await;
    let record = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create");
    harness
        .context
        .update_inspection_data(
            &fitter(),
            record.id,
            answers(vec![
                AnswerInput::check("brake", CheckResult::Fail).with_comment("Brake slips"),
            ]),
        )
        .await
        .expect("answer");
    harness
        .context
        .submit_inspection_data(&fitter(), record.id)
        .await
        .expect("submit");

    assert!(harness.defects.raised().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn history_rows_are_append_only(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let template = harness.basic_template().await;
    let record = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create");
    harness
        .context
        .update_inspection_data(&fitter(), record.id, all_pass())
        .await
        .expect("answer");

    let update = sqlx::query("UPDATE inspection_history SET entry_type = 'warning'")
        .execute(harness.pool())
        .await;
    assert!(update.is_err(), "history rows must not be rewritten");

    let delete = sqlx::query("DELETE FROM inspection_history")
        .execute(harness.pool())
        .await;
    assert!(delete.is_err(), "history rows must not be deleted");

    let detail = harness.context.load_inspection(record.id).await.expect("detail");
    assert_eq!(detail.history.len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn one_critical_failure_outweighs_every_pass(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let mut items: Vec<_> = (1..=9)
        .map(|n| check_item(&format!("check-{n}"), true, false))
        .collect();
    items.push(check_item("isolator", true, true));
    let template = harness.published_template("Electrical panel", items).await;
    harness
        .context
        .settings()
        .update(
            &admin(),
            SettingsPatch {
                auto_create_defects: Some(false),
                ..SettingsPatch::default()
            },
        )
        .await
        .expect("disable auto defects");

    let record = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create");
    let mut inputs: Vec<_> = (1..=9)
        .map(|n| AnswerInput::check(format!("check-{n}"), CheckResult::Pass))
        .collect();
    inputs.push(AnswerInput::check("isolator", CheckResult::Fail).with_comment("Isolator seized"));
    harness
        .context
        .update_inspection_data(&fitter(), record.id, answers(inputs))
        .await
        .expect("answer");

    let submitted = harness
        .context
        .submit_inspection_data(&fitter(), record.id)
        .await
        .expect("submit");
    assert_eq!(submitted.result, InspectionResult::Fail);
}

#[sqlx::test(migrations = "./migrations")]
async fn submission_walkthrough_with_three_required_items(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let template = harness
        .published_template(
            "Harness check",
            vec![
                check_item("webbing", true, false),
                check_item("buckles", true, false),
                check_item("lanyard", true, false),
            ],
        )
        .await;
    let record = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create");
    harness
        .context
        .update_inspection_data(
            &fitter(),
            record.id,
            answers(vec![
                AnswerInput::check("webbing", CheckResult::Pass),
                AnswerInput::check("buckles", CheckResult::Pass),
            ]),
        )
        .await
        .expect("answer two items");

    let err = harness
        .context
        .submit_inspection_data(&fitter(), record.id)
        .await
        .expect_err("third item unanswered");
    assert!(matches!(err, AppError::Validation(ref message) if message.contains("lanyard")));

    harness
        .context
        .update_inspection_data(
            &fitter(),
            record.id,
            answers(vec![AnswerInput::check("lanyard", CheckResult::Fail)]),
        )
        .await
        .expect("answer third item");
    let err = harness
        .context
        .submit_inspection_data(&fitter(), record.id)
        .await
        .expect_err("failed item needs a comment");
    assert!(matches!(err, AppError::Validation(_)), "got {err:?}");

    harness
        .context
        .update_inspection_data(
            &fitter(),
            record.id,
            answers(vec![
                AnswerInput::check("lanyard", CheckResult::Fail).with_comment("Stitching frayed"),
            ]),
        )
        .await
        .expect("add comment");
    let submitted = harness
        .context
        .submit_inspection_data(&fitter(), record.id)
        .await
        .expect("submit");
    assert_eq!(submitted.status, InspectionStatus::Submitted);
    assert_eq!(submitted.result, InspectionResult::Fail);
    assert_eq!(submitted.code, record.code);
}
