//! Template management: drafts, publishing, revisions and retirement.
//!
//! Templates are device-local reference data and are not replicated through
//! the outbox. Inspections keep a denormalized copy of the template they were
//! created from, so nothing here ever touches an existing inspection.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{TemplateQueryFilter, TemplatesRepo, TemplatesWriteRepo};
use crate::domain::entities::Actor;
use crate::domain::permissions::{self, require};
use crate::domain::templates::{TemplateContent, TemplateRecord};

#[derive(Clone)]
pub struct TemplateService {
    reader: Arc<dyn TemplatesRepo>,
    writer: Arc<dyn TemplatesWriteRepo>,
}

impl TemplateService {
    pub fn new(reader: Arc<dyn TemplatesRepo>, writer: Arc<dyn TemplatesWriteRepo>) -> Self {
        Self { reader, writer }
    }

    fn authorize(actor: &Actor, action: &'static str) -> Result<(), AppError> {
        require(
            permissions::can_manage_templates(actor.role),
            actor.role,
            action,
        )?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<TemplateRecord, AppError> {
        self.reader
            .find_template(id)
            .await?
            .ok_or_else(|| AppError::not_found("template"))
    }

    pub async fn list(&self, filter: &TemplateQueryFilter) -> Result<Vec<TemplateRecord>, AppError> {
        Ok(self.reader.list_templates(filter).await?)
    }

    pub async fn create(
        &self,
        actor: &Actor,
        content: TemplateContent,
    ) -> Result<TemplateRecord, AppError> {
        Self::authorize(actor, "create templates")?;
        let template = TemplateRecord::new_draft(
            Uuid::new_v4(),
            content,
            actor.user_id,
            OffsetDateTime::now_utc(),
        )?;
        self.writer.insert_template(&template).await?;
        info!(
            target = "vigil::templates",
            template_id = %template.id,
            name = %template.name,
            "Template draft created"
        );
        Ok(template)
    }

    /// Replace a draft's content. Published templates need a new revision first.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        content: TemplateContent,
    ) -> Result<TemplateRecord, AppError> {
        Self::authorize(actor, "edit templates")?;
        let mut template = self.get(id).await?;
        template.replace_content(content, OffsetDateTime::now_utc())?;
        self.writer.update_template(&template).await?;
        Ok(template)
    }

    pub async fn publish(
        &self,
        actor: &Actor,
        id: Uuid,
        notes: Option<String>,
    ) -> Result<TemplateRecord, AppError> {
        Self::authorize(actor, "publish templates")?;
        let mut template = self.get(id).await?;
        let version = template
            .publish(actor.user_id, notes, OffsetDateTime::now_utc())?
            .version
            .clone();
        self.writer.update_template(&template).await?;
        info!(
            target = "vigil::templates",
            template_id = %template.id,
            version = %version,
            "Template published"
        );
        Ok(template)
    }

    pub async fn start_revision(&self, actor: &Actor, id: Uuid) -> Result<TemplateRecord, AppError> {
        Self::authorize(actor, "revise templates")?;
        let mut template = self.get(id).await?;
        template.start_revision(OffsetDateTime::now_utc())?;
        self.writer.update_template(&template).await?;
        Ok(template)
    }

    /// Soft delete; always allowed, even while inspections reference the template.
    pub async fn deactivate(&self, actor: &Actor, id: Uuid) -> Result<TemplateRecord, AppError> {
        Self::authorize(actor, "deactivate templates")?;
        let mut template = self.get(id).await?;
        template.deactivate(OffsetDateTime::now_utc())?;
        self.writer.update_template(&template).await?;
        info!(
            target = "vigil::templates",
            template_id = %template.id,
            "Template deactivated"
        );
        Ok(template)
    }

    /// Hard delete, refused while any inspection references the template.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), AppError> {
        Self::authorize(actor, "delete templates")?;
        let template = self.get(id).await?;
        let references = self.reader.count_referencing_inspections(id).await?;
        if references > 0 {
            return Err(AppError::conflict(format!(
                "template `{}` is referenced by {references} inspection(s); deactivate it instead",
                template.name
            )));
        }
        self.writer.delete_template(id).await?;
        info!(target = "vigil::templates", template_id = %id, "Template deleted");
        Ok(())
    }
}
