use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::InspectionQueryFilter;
use crate::domain::entities::{HistoryEntry, InspectionDetail, InspectionRecord, InspectionSummary};

use super::service::InspectionService;

impl InspectionService {
    pub async fn list(
        &self,
        filter: &InspectionQueryFilter,
    ) -> Result<Vec<InspectionRecord>, AppError> {
        Ok(self.reader.list_inspections(filter).await?)
    }

    pub async fn count(&self, filter: &InspectionQueryFilter) -> Result<u64, AppError> {
        Ok(self.reader.count_inspections(filter).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<InspectionRecord, AppError> {
        self.reader
            .find_inspection(id)
            .await?
            .ok_or_else(|| AppError::not_found("inspection"))
    }

    pub async fn find_by_code(&self, code: &str) -> Result<InspectionRecord, AppError> {
        self.reader
            .find_by_code(code)
            .await?
            .ok_or_else(|| AppError::not_found("inspection"))
    }

    pub async fn history(&self, id: Uuid) -> Result<Vec<HistoryEntry>, AppError> {
        Ok(self.reader.list_history(id).await?)
    }

    pub async fn detail(&self, id: Uuid) -> Result<InspectionDetail, AppError> {
        let record = self.get(id).await?;
        let history = self.history(id).await?;
        Ok(InspectionDetail { record, history })
    }

    pub async fn summary(&self, now: OffsetDateTime) -> Result<InspectionSummary, AppError> {
        Ok(self.reader.summarize(now).await?)
    }
}
