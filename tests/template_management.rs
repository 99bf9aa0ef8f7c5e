mod support;

use sqlx::SqlitePool;
use vigil::application::error::AppError;
use vigil::application::repos::TemplateQueryFilter;
use vigil::application::settings::SettingsPatch;
use vigil::domain::templates::TemplateContent;
use vigil::domain::types::ConflictPolicy;

use support::{Harness, admin, check_item, draft_for, fitter, manager, supervisor};

fn content(name: &str, item_ids: &[&str]) -> TemplateContent {
    TemplateContent {
        name: name.to_string(),
        category: Some("access".to_string()),
        items: item_ids
            .iter()
            .map(|id| check_item(id, true, false))
            .collect(),
        ..TemplateContent::default()
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn only_managers_and_admins_manage_templates(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let templates = harness.context.templates();

    for actor in [fitter(), supervisor()] {
        let err = templates
            .create(&actor, content("Scaffold tag", &["ties"]))
            .await
            .expect_err("field roles cannot author templates");
        assert!(matches!(err, AppError::Permission(_)), "got {err:?}");
    }

    templates
        .create(&admin(), content("Scaffold tag", &["ties"]))
        .await
        .expect("admins can author templates");
}

#[sqlx::test(migrations = "./migrations")]
async fn publishing_versions_and_listing(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let templates = harness.context.templates();
    let draft = templates
        .create(&manager(), content("Scaffold tag", &["ties", "boards"]))
        .await
        .expect("create draft");
    assert_eq!(draft.version, "draft");

    let listed = templates
        .list(&TemplateQueryFilter::default())
        .await
        .expect("list published");
    assert!(listed.is_empty(), "drafts are hidden by default");

    let v1 = templates
        .publish(&manager(), draft.id, Some("first issue".into()))
        .await
        .expect("publish v1");
    assert_eq!(v1.version, "v1");
    assert!(v1.is_active);

    let err = templates
        .update(&manager(), draft.id, content("Scaffold tag", &["ties"]))
        .await
        .expect_err("published templates are frozen");
    assert!(matches!(err, AppError::InvalidState(_)), "got {err:?}");

    templates
        .start_revision(&manager(), draft.id)
        .await
        .expect("start revision");
    templates
        .update(
            &manager(),
            draft.id,
            content("Scaffold tag", &["ties", "boards", "toeboards"]),
        )
        .await
        .expect("edit revision");
    let v2 = templates
        .publish(&manager(), draft.id, None)
        .await
        .expect("publish v2");
    assert_eq!(v2.version, "v2");
    assert_eq!(v2.versions.len(), 2);
    assert_eq!(v2.items.len(), 3);

    let stored = templates.get(draft.id).await.expect("get");
    assert_eq!(stored.versions[0].notes.as_deref(), Some("first issue"));

    let by_category = templates
        .list(&TemplateQueryFilter {
            category: Some("access".into()),
            ..TemplateQueryFilter::default()
        })
        .await
        .expect("list by category");
    assert_eq!(by_category.len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn template_changes_never_touch_existing_inspections(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let templates = harness.context.templates();
    let template = harness.basic_template().await;
    let record = harness
        .context
        .create_new_inspection(&fitter(), draft_for(template.id))
        .await
        .expect("create inspection");

    templates
        .start_revision(&manager(), template.id)
        .await
        .expect("start revision");
    templates
        .update(&manager(), template.id, content("Ladder check", &["only-one"]))
        .await
        .expect("edit revision");
    templates
        .deactivate(&manager(), template.id)
        .await
        .expect("deactivate");

    let stored = harness
        .context
        .load_inspection(record.id)
        .await
        .expect("reload")
        .record;
    assert_eq!(stored.items, record.items);
    assert_eq!(stored.sections, record.sections);
    assert_eq!(stored.template_version, "v1");
}

#[sqlx::test(migrations = "./migrations")]
async fn delete_is_refused_while_referenced(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let templates = harness.context.templates();
    let referenced = harness.basic_template().await;
    harness
        .context
        .create_new_inspection(&fitter(), draft_for(referenced.id))
        .await
        .expect("create inspection");

    let err = templates
        .delete(&manager(), referenced.id)
        .await
        .expect_err("still referenced");
    assert!(matches!(err, AppError::Conflict(_)), "got {err:?}");
    templates.get(referenced.id).await.expect("still present");

    let unused = templates
        .create(&manager(), content("Unused", &["a"]))
        .await
        .expect("create unused");
    templates
        .delete(&manager(), unused.id)
        .await
        .expect("delete unused");
    let err = templates.get(unused.id).await.expect_err("gone");
    assert!(matches!(err, AppError::NotFound { .. }), "got {err:?}");
}

#[sqlx::test(migrations = "./migrations")]
async fn invalid_content_is_rejected(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let err = harness
        .context
        .templates()
        .create(&manager(), content("Duplicated", &["same", "same"]))
        .await
        .expect_err("duplicate item ids");
    assert!(matches!(err, AppError::Validation(_)), "got {err:?}");

    let empty = harness
        .context
        .templates()
        .create(&manager(), content("Empty", &[]))
        .await
        .expect("empty drafts are allowed");
    let err = harness
        .context
        .templates()
        .publish(&manager(), empty.id, None)
        .await
        .expect_err("cannot publish without items");
    assert!(matches!(err, AppError::Validation(_)), "got {err:?}");
}

#[sqlx::test(migrations = "./migrations")]
async fn settings_are_admin_only_and_validated(pool: SqlitePool) {
    let harness = Harness::new(pool);
    let settings = harness.context.settings();

    let defaults = settings.load().await.expect("load defaults");
    assert!(defaults.auto_create_defects);
    assert_eq!(defaults.conflict_policy, ConflictPolicy::FlagForReview);
    assert!(defaults.post_close_fields.is_empty());

    let err = settings
        .update(
            &manager(),
            SettingsPatch {
                auto_create_defects: Some(false),
                ..SettingsPatch::default()
            },
        )
        .await
        .expect_err("managers cannot change engine settings");
    assert!(matches!(err, AppError::Permission(_)), "got {err:?}");

    let err = settings
        .update(
            &admin(),
            SettingsPatch {
                post_close_fields: Some(vec!["answers".to_string()]),
                ..SettingsPatch::default()
            },
        )
        .await
        .expect_err("answers are never editable after close");
    assert!(matches!(err, AppError::Validation(_)), "got {err:?}");

    let updated = settings
        .update(
            &admin(),
            SettingsPatch {
                conflict_policy: Some(ConflictPolicy::LastWriteWins),
                post_close_fields: Some(vec![
                    "comments".to_string(),
                    "attachments".to_string(),
                    "comments".to_string(),
                ]),
                ..SettingsPatch::default()
            },
        )
        .await
        .expect("admin update");
    assert_eq!(
        updated.post_close_fields,
        vec!["attachments".to_string(), "comments".to_string()]
    );

    let reloaded = settings.load().await.expect("reload");
    assert_eq!(reloaded.conflict_policy, ConflictPolicy::LastWriteWins);
    assert_eq!(reloaded.post_close_fields, updated.post_close_fields);
}
