use async_trait::async_trait;
use sqlx::{QueryBuilder, types::Json};
use uuid::Uuid;

use crate::application::repos::{
    RepoError, TemplateQueryFilter, TemplatesRepo, TemplatesWriteRepo,
};
use crate::domain::templates::{ChecklistItem, TemplateRecord, TemplateSection, TemplateVersion};

use super::util::{convert_count, convert_u32, from_millis, opt_from_millis, opt_to_millis, to_millis};
use super::{SqliteRepositories, map_sqlx_error};

const TEMPLATE_COLUMNS: &str = "id, name, description, category, compliance_tag, \
     auto_create_defects, sections, items, version, version_number, versions, is_active, \
     deactivated_at, created_by, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct TemplateRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    category: Option<String>,
    compliance_tag: Option<String>,
    auto_create_defects: Option<bool>,
    sections: Json<Vec<TemplateSection>>,
    items: Json<Vec<ChecklistItem>>,
    version: String,
    version_number: i64,
    versions: Json<Vec<TemplateVersion>>,
    is_active: bool,
    deactivated_at: Option<i64>,
    created_by: Uuid,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<TemplateRow> for TemplateRecord {
    type Error = RepoError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            category: row.category,
            compliance_tag: row.compliance_tag,
            auto_create_defects: row.auto_create_defects,
            sections: row.sections.0,
            items: row.items.0,
            version: row.version,
            version_number: convert_u32("version_number", row.version_number)?,
            versions: row.versions.0,
            is_active: row.is_active,
            deactivated_at: opt_from_millis(row.deactivated_at)?,
            created_by: row.created_by,
            created_at: from_millis(row.created_at)?,
            updated_at: from_millis(row.updated_at)?,
        })
    }
}

#[async_trait]
impl TemplatesRepo for SqliteRepositories {
    async fn find_template(&self, id: Uuid) -> Result<Option<TemplateRecord>, RepoError> {
        let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = ?");
        let row = sqlx::query_as::<_, TemplateRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(TemplateRecord::try_from).transpose()
    }

    async fn list_templates(
        &self,
        filter: &TemplateQueryFilter,
    ) -> Result<Vec<TemplateRecord>, RepoError> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {TEMPLATE_COLUMNS} FROM templates WHERE 1=1"
        ));

        if !filter.include_drafts {
            qb.push(" AND is_active = 1");
        }
        if !filter.include_deactivated {
            qb.push(" AND deactivated_at IS NULL");
        }
        if let Some(category) = filter.category.as_ref() {
            qb.push(" AND category = ");
            qb.push_bind(category);
        }
        if let Some(search) = filter.search.as_ref() {
            qb.push(" AND name LIKE ");
            qb.push_bind(format!("%{}%", search.trim()));
        }
        qb.push(" ORDER BY name COLLATE NOCASE, created_at");

        let rows = qb
            .build_query_as::<TemplateRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(TemplateRecord::try_from).collect()
    }

    async fn count_referencing_inspections(&self, template_id: Uuid) -> Result<u64, RepoError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM inspections WHERE template_id = ?")
                .bind(template_id)
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        convert_count(count)
    }
}

#[async_trait]
impl TemplatesWriteRepo for SqliteRepositories {
    async fn insert_template(&self, template: &TemplateRecord) -> Result<(), RepoError> {
        let mut write = self.begin_write().await?;
        sqlx::query(
            "INSERT INTO templates (id, name, description, category, compliance_tag, \
                 auto_create_defects, sections, items, version, version_number, versions, \
                 is_active, deactivated_at, created_by, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(template.id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(&template.category)
        .bind(&template.compliance_tag)
        .bind(template.auto_create_defects)
        .bind(Json(&template.sections))
        .bind(Json(&template.items))
        .bind(&template.version)
        .bind(i64::from(template.version_number))
        .bind(Json(&template.versions))
        .bind(template.is_active)
        .bind(opt_to_millis(template.deactivated_at))
        .bind(template.created_by)
        .bind(to_millis(template.created_at))
        .bind(to_millis(template.updated_at))
        .execute(&mut *write.tx)
        .await
        .map_err(map_sqlx_error)?;
        write.commit().await
    }

    async fn update_template(&self, template: &TemplateRecord) -> Result<(), RepoError> {
        let mut write = self.begin_write().await?;
        let result = sqlx::query(
            "UPDATE templates SET name = ?, description = ?, category = ?, compliance_tag = ?, \
                 auto_create_defects = ?, sections = ?, items = ?, version = ?, \
                 version_number = ?, versions = ?, is_active = ?, deactivated_at = ?, \
                 updated_at = ? \
             WHERE id = ?",
        )
        .bind(&template.name)
        .bind(&template.description)
        .bind(&template.category)
        .bind(&template.compliance_tag)
        .bind(template.auto_create_defects)
        .bind(Json(&template.sections))
        .bind(Json(&template.items))
        .bind(&template.version)
        .bind(i64::from(template.version_number))
        .bind(Json(&template.versions))
        .bind(template.is_active)
        .bind(opt_to_millis(template.deactivated_at))
        .bind(to_millis(template.updated_at))
        .bind(template.id)
        .execute(&mut *write.tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        write.commit().await
    }

    async fn delete_template(&self, id: Uuid) -> Result<(), RepoError> {
        let mut write = self.begin_write().await?;
        let result = sqlx::query("DELETE FROM templates WHERE id = ?")
            .bind(id)
            .execute(&mut *write.tx)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        write.commit().await
    }
}
