use std::sync::Arc;

use crate::application::defects::DefectsGateway;
use crate::application::locks::RecordLocks;
use crate::application::repos::{
    InspectionsRepo, InspectionsWriteRepo, SettingsRepo, TemplatesRepo,
};
use crate::application::sync::SyncQueue;

#[derive(Clone)]
pub struct InspectionService {
    pub(crate) reader: Arc<dyn InspectionsRepo>,
    pub(crate) writer: Arc<dyn InspectionsWriteRepo>,
    pub(crate) templates: Arc<dyn TemplatesRepo>,
    pub(crate) settings: Arc<dyn SettingsRepo>,
    pub(crate) defects: Arc<dyn DefectsGateway>,
    pub(crate) queue: SyncQueue,
    pub(crate) locks: RecordLocks,
    pub(crate) code_prefix: String,
}

impl InspectionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: Arc<dyn InspectionsRepo>,
        writer: Arc<dyn InspectionsWriteRepo>,
        templates: Arc<dyn TemplatesRepo>,
        settings: Arc<dyn SettingsRepo>,
        defects: Arc<dyn DefectsGateway>,
        queue: SyncQueue,
        locks: RecordLocks,
        code_prefix: impl Into<String>,
    ) -> Self {
        Self {
            reader,
            writer,
            templates,
            settings,
            defects,
            queue,
            locks,
            code_prefix: code_prefix.into(),
        }
    }
}
