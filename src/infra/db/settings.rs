use async_trait::async_trait;
use sqlx::types::Json;

use crate::application::repos::{RepoError, SettingsRepo};
use crate::domain::entities::EngineSettings;
use crate::domain::types::ConflictPolicy;

use super::util::{from_millis, to_millis};
use super::{SqliteRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct EngineSettingsRow {
    auto_create_defects: bool,
    conflict_policy: ConflictPolicy,
    post_close_fields: Json<Vec<String>>,
    updated_at: i64,
}

impl TryFrom<EngineSettingsRow> for EngineSettings {
    type Error = RepoError;

    fn try_from(row: EngineSettingsRow) -> Result<Self, Self::Error> {
        Ok(Self {
            auto_create_defects: row.auto_create_defects,
            conflict_policy: row.conflict_policy,
            post_close_fields: row.post_close_fields.0,
            updated_at: from_millis(row.updated_at)?,
        })
    }
}

#[async_trait]
impl SettingsRepo for SqliteRepositories {
    async fn load_settings(&self) -> Result<EngineSettings, RepoError> {
        let row = sqlx::query_as::<_, EngineSettingsRow>(
            "SELECT auto_create_defects, conflict_policy, post_close_fields, updated_at \
             FROM engine_settings WHERE id = 1",
        )
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let row = row.ok_or_else(|| RepoError::from_persistence("engine settings row missing"))?;
        EngineSettings::try_from(row)
    }

    async fn upsert_settings(&self, settings: &EngineSettings) -> Result<(), RepoError> {
        let mut write = self.begin_write().await?;
        sqlx::query(
            "INSERT INTO engine_settings (id, auto_create_defects, conflict_policy, \
                 post_close_fields, updated_at) \
             VALUES (1, ?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET \
                 auto_create_defects = excluded.auto_create_defects, \
                 conflict_policy = excluded.conflict_policy, \
                 post_close_fields = excluded.post_close_fields, \
                 updated_at = excluded.updated_at",
        )
        .bind(settings.auto_create_defects)
        .bind(settings.conflict_policy)
        .bind(Json(&settings.post_close_fields))
        .bind(to_millis(settings.updated_at))
        .execute(&mut *write.tx)
        .await
        .map_err(map_sqlx_error)?;
        write.commit().await
    }
}
