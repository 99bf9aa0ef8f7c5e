//! Inspection templates: versioned checklist definitions.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::DomainError;
use super::types::{ItemType, Severity};

pub const DRAFT_VERSION_TAG: &str = "draft";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSection {
    pub id: String,
    pub title: String,
    pub order: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericBounds {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl NumericBounds {
    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    #[serde(default)]
    pub section_id: Option<String>,
    pub question: String,
    pub item_type: ItemType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, alias = "safety_critical", alias = "safetyCritical")]
    pub critical: bool,
    #[serde(default)]
    pub bounds: Option<NumericBounds>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub photo_required_on_fail: bool,
    #[serde(default)]
    pub create_defect_on_fail: bool,
    #[serde(default)]
    pub defect_severity: Option<Severity>,
    #[serde(default)]
    pub compliance_tag: Option<String>,
    pub order: u32,
}

impl ChecklistItem {
    /// Severity used when a failure on this item raises a defect.
    pub fn failure_severity(&self) -> Severity {
        self.defect_severity.unwrap_or(if self.critical {
            Severity::Critical
        } else {
            Severity::Medium
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateVersion {
    pub version: String,
    pub version_number: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    pub published_by: Uuid,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub compliance_tag: Option<String>,
    /// Overrides the global auto-defect policy when set.
    pub auto_create_defects: Option<bool>,
    pub sections: Vec<TemplateSection>,
    pub items: Vec<ChecklistItem>,
    pub version: String,
    pub version_number: u32,
    pub versions: Vec<TemplateVersion>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deactivated_at: Option<OffsetDateTime>,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Editable template content.
#[derive(Debug, Clone, Default)]
pub struct TemplateContent {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub compliance_tag: Option<String>,
    pub auto_create_defects: Option<bool>,
    pub sections: Vec<TemplateSection>,
    pub items: Vec<ChecklistItem>,
}

impl TemplateRecord {
    pub fn new_draft(
        id: Uuid,
        content: TemplateContent,
        created_by: Uuid,
        now: OffsetDateTime,
    ) -> Result<Self, DomainError> {
        validate_content(&content)?;
        Ok(Self {
            id,
            name: content.name,
            description: content.description,
            category: content.category,
            compliance_tag: content.compliance_tag,
            auto_create_defects: content.auto_create_defects,
            sections: content.sections,
            items: content.items,
            version: DRAFT_VERSION_TAG.to_string(),
            version_number: 0,
            versions: Vec::new(),
            is_active: false,
            deactivated_at: None,
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_deactivated(&self) -> bool {
        self.deactivated_at.is_some()
    }

    /// Published and not deactivated.
    pub fn is_usable(&self) -> bool {
        self.is_active && !self.is_deactivated()
    }

    pub fn replace_content(
        &mut self,
        content: TemplateContent,
        now: OffsetDateTime,
    ) -> Result<(), DomainError> {
        self.ensure_draft("edit")?;
        validate_content(&content)?;
        self.name = content.name;
        self.description = content.description;
        self.category = content.category;
        self.compliance_tag = content.compliance_tag;
        self.auto_create_defects = content.auto_create_defects;
        self.sections = content.sections;
        self.items = content.items;
        self.updated_at = now;
        Ok(())
    }

    /// Freeze the current draft under the next version tag.
    pub fn publish(
        &mut self,
        published_by: Uuid,
        notes: Option<String>,
        now: OffsetDateTime,
    ) -> Result<&TemplateVersion, DomainError> {
        self.ensure_draft("publish")?;
        if self.items.is_empty() {
            return Err(DomainError::validation(
                "a template needs at least one checklist item before publishing",
            ));
        }

        let version_number = self.version_number + 1;
        let version = format!("v{version_number}");
        self.versions.push(TemplateVersion {
            version: version.clone(),
            version_number,
            published_at: now,
            published_by,
            notes,
        });
        self.version = version;
        self.version_number = version_number;
        self.is_active = true;
        self.updated_at = now;

        self.versions
            .last()
            .ok_or_else(|| DomainError::invariant("version history empty after publish"))
    }

    /// Reopen a published template for editing; inspections keep their own copy.
    pub fn start_revision(&mut self, now: OffsetDateTime) -> Result<(), DomainError> {
        if self.is_deactivated() {
            return Err(DomainError::invalid_state(
                "deactivated templates cannot be revised",
            ));
        }
        if !self.is_active {
            return Err(DomainError::invalid_state("template is already a draft"));
        }
        self.is_active = false;
        self.version = DRAFT_VERSION_TAG.to_string();
        self.updated_at = now;
        Ok(())
    }

    pub fn deactivate(&mut self, now: OffsetDateTime) -> Result<(), DomainError> {
        if self.is_deactivated() {
            return Err(DomainError::invalid_state("template is already deactivated"));
        }
        self.deactivated_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    fn ensure_draft(&self, action: &str) -> Result<(), DomainError> {
        if self.is_deactivated() {
            return Err(DomainError::invalid_state(format!(
                "cannot {action} a deactivated template"
            )));
        }
        if self.is_active {
            return Err(DomainError::invalid_state(format!(
                "cannot {action} a published template; start a new revision first"
            )));
        }
        Ok(())
    }
}

fn validate_content(content: &TemplateContent) -> Result<(), DomainError> {
    if content.name.trim().is_empty() {
        return Err(DomainError::validation("template name must not be empty"));
    }

    let mut section_ids = HashSet::new();
    for section in &content.sections {
        if section.id.trim().is_empty() {
            return Err(DomainError::validation("section id must not be empty"));
        }
        if !section_ids.insert(section.id.as_str()) {
            return Err(DomainError::validation(format!(
                "duplicate section id `{}`",
                section.id
            )));
        }
    }

    let mut item_ids = HashSet::new();
    for item in &content.items {
        if item.id.trim().is_empty() {
            return Err(DomainError::validation("checklist item id must not be empty"));
        }
        if !item_ids.insert(item.id.as_str()) {
            return Err(DomainError::validation(format!(
                "duplicate checklist item id `{}`",
                item.id
            )));
        }
        if item.question.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "checklist item `{}` needs a question",
                item.id
            )));
        }
        if let Some(section_id) = item.section_id.as_deref()
            && !section_ids.contains(section_id)
        {
            return Err(DomainError::validation(format!(
                "checklist item `{}` references unknown section `{section_id}`",
                item.id
            )));
        }
        if let Some(bounds) = item.bounds {
            if item.item_type != ItemType::Number {
                return Err(DomainError::validation(format!(
                    "checklist item `{}` declares bounds but is not numeric",
                    item.id
                )));
            }
            if let (Some(min), Some(max)) = (bounds.min, bounds.max)
                && min > max
            {
                return Err(DomainError::validation(format!(
                    "checklist item `{}` has min greater than max",
                    item.id
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn item(id: &str) -> ChecklistItem {
        ChecklistItem {
            id: id.to_string(),
            section_id: None,
            question: format!("Check {id}"),
            item_type: ItemType::PassFail,
            required: true,
            critical: false,
            bounds: None,
            unit: None,
            photo_required_on_fail: false,
            create_defect_on_fail: false,
            defect_severity: None,
            compliance_tag: None,
            order: 0,
        }
    }

    fn content() -> TemplateContent {
        TemplateContent {
            name: "Forklift pre-start".to_string(),
            items: vec![item("brakes"), item("horn")],
            ..Default::default()
        }
    }

    #[test]
    fn publish_bumps_version_and_freezes_content() {
        let now = datetime!(2026-01-05 09:00 UTC);
        let mut template =
            TemplateRecord::new_draft(Uuid::new_v4(), content(), Uuid::nil(), now).expect("draft");
        assert_eq!(template.version, DRAFT_VERSION_TAG);

        template
            .publish(Uuid::nil(), Some("first cut".into()), now)
            .expect("publish");
        assert!(template.is_usable());
        assert_eq!(template.version, "v1");
        assert_eq!(template.versions.len(), 1);

        let err = template
            .replace_content(content(), now)
            .expect_err("published templates are frozen");
        assert!(matches!(err, DomainError::InvalidState { .. }));

        template.start_revision(now).expect("revise");
        template.replace_content(content(), now).expect("edit draft");
        template.publish(Uuid::nil(), None, now).expect("publish v2");
        assert_eq!(template.version, "v2");
        assert_eq!(template.versions.len(), 2);
    }

    #[test]
    fn rejects_items_pointing_at_unknown_sections() {
        let mut content = content();
        content.items[0].section_id = Some("missing".into());
        let err = TemplateRecord::new_draft(Uuid::new_v4(), content, Uuid::nil(), datetime!(2026-01-05 09:00 UTC))
            .expect_err("unknown section");
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn safety_critical_alias_deserializes() {
        let json = r#"{"id":"a","question":"Guard fitted?","item_type":"pass_fail","safetyCritical":true,"order":1}"#;
        let item: ChecklistItem = serde_json::from_str(json).expect("parse item");
        assert!(item.critical);
        assert_eq!(item.failure_severity(), Severity::Critical);
    }
}
