use std::sync::Arc;

use time::OffsetDateTime;
use tracing::info;

use crate::application::error::AppError;
use crate::application::repos::SettingsRepo;
use crate::domain::entities::{Actor, EngineSettings};
use crate::domain::lifecycle::{FIELD_ATTACHMENTS, FIELD_COMMENTS};
use crate::domain::permissions::{self, require};
use crate::domain::types::ConflictPolicy;

/// Fields that may be configured as editable after close.
pub const POST_CLOSE_CANDIDATES: [&str; 2] = [FIELD_ATTACHMENTS, FIELD_COMMENTS];

#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub auto_create_defects: Option<bool>,
    pub conflict_policy: Option<ConflictPolicy>,
    pub post_close_fields: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct EngineSettingsService {
    repo: Arc<dyn SettingsRepo>,
}

impl EngineSettingsService {
    pub fn new(repo: Arc<dyn SettingsRepo>) -> Self {
        Self { repo }
    }

    pub async fn load(&self) -> Result<EngineSettings, AppError> {
        Ok(self.repo.load_settings().await?)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        patch: SettingsPatch,
    ) -> Result<EngineSettings, AppError> {
        require(
            permissions::can_manage_settings(actor.role),
            actor.role,
            "change engine settings",
        )?;

        let mut settings = self.repo.load_settings().await?;
        if let Some(enabled) = patch.auto_create_defects {
            settings.auto_create_defects = enabled;
        }
        if let Some(policy) = patch.conflict_policy {
            settings.conflict_policy = policy;
        }
        if let Some(mut fields) = patch.post_close_fields {
            if let Some(unknown) = fields
                .iter()
                .find(|field| !POST_CLOSE_CANDIDATES.contains(&field.as_str()))
            {
                return Err(AppError::validation(format!(
                    "`{unknown}` cannot be edited after close"
                )));
            }
            fields.sort();
            fields.dedup();
            settings.post_close_fields = fields;
        }
        settings.updated_at = OffsetDateTime::now_utc();

        self.repo.upsert_settings(&settings).await?;
        info!(
            target = "vigil::settings",
            actor = %actor.user_id,
            conflict_policy = settings.conflict_policy.as_str(),
            auto_create_defects = settings.auto_create_defects,
            "Engine settings updated"
        );
        Ok(settings)
    }
}
