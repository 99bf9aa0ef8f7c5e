//! Defects collaborator used when submissions contain failed items.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::answers;
use crate::domain::entities::{EngineSettings, InspectionRecord};
use crate::domain::types::Severity;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DefectError {
    #[error("defects service unavailable: {0}")]
    Unavailable(String),
    #[error("defects service rejected the request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait DefectsGateway: Send + Sync {
    async fn create_defect_from_failed_item(
        &self,
        inspection_id: Uuid,
        item_id: &str,
        severity: Severity,
        compliance_tag: Option<&str>,
    ) -> Result<Uuid, DefectError>;
}

/// Gateway for devices with no defects endpoint configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledDefects;

#[async_trait]
impl DefectsGateway for DisabledDefects {
    async fn create_defect_from_failed_item(
        &self,
        _inspection_id: Uuid,
        _item_id: &str,
        _severity: Severity,
        _compliance_tag: Option<&str>,
    ) -> Result<Uuid, DefectError> {
        Err(DefectError::Unavailable(
            "no defects endpoint configured".to_string(),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefectRequest {
    pub item_id: String,
    pub severity: Severity,
    pub compliance_tag: Option<String>,
}

/// Failed items that should raise a defect under the active policy.
pub fn qualifying_failures(
    record: &InspectionRecord,
    settings: &EngineSettings,
) -> Vec<DefectRequest> {
    let enabled = record
        .auto_create_defects
        .unwrap_or(settings.auto_create_defects);
    if !enabled {
        return Vec::new();
    }

    answers::failed_items(&record.items, &record.answers)
        .into_iter()
        .filter(|item| item.create_defect_on_fail || item.critical)
        .filter(|item| !record.has_defect_for(&item.id))
        .map(|item| DefectRequest {
            item_id: item.id.clone(),
            severity: item.failure_severity(),
            compliance_tag: item
                .compliance_tag
                .clone()
                .or_else(|| record.compliance_tag.clone()),
        })
        .collect()
}
