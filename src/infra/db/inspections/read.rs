use async_trait::async_trait;
use sqlx::{QueryBuilder, types::Json};
use time::{Duration, OffsetDateTime, Time, UtcOffset};
use uuid::Uuid;

use crate::application::repos::{InspectionQueryFilter, InspectionsRepo, RepoError};
use crate::domain::entities::{HistoryEntry, InspectionRecord, InspectionSummary};

use super::super::SqliteRepositories;
use super::super::util::{convert_count, to_millis};
use super::OPEN_STATUSES;
use super::types::{INSPECTION_COLUMNS, InspectionRow, SummaryRow};
use crate::infra::db::map_sqlx_error;

/// Monday 00:00 UTC of the week containing `now`.
pub(crate) fn week_start(now: OffsetDateTime) -> OffsetDateTime {
    let today = now.to_offset(UtcOffset::UTC).date();
    let back = i64::from(today.weekday().number_days_from_monday());
    (today - Duration::days(back)).with_time(Time::MIDNIGHT).assume_utc()
}

impl SqliteRepositories {
    pub(crate) async fn fetch_inspection(
        &self,
        id: Uuid,
    ) -> Result<Option<InspectionRecord>, RepoError> {
        let sql = format!("SELECT {INSPECTION_COLUMNS} FROM inspections i WHERE i.id = ?");
        let row = sqlx::query_as::<_, InspectionRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(InspectionRecord::try_from).transpose()
    }
}

#[async_trait]
impl InspectionsRepo for SqliteRepositories {
    async fn find_inspection(&self, id: Uuid) -> Result<Option<InspectionRecord>, RepoError> {
        self.fetch_inspection(id).await
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<InspectionRecord>, RepoError> {
        let sql = format!("SELECT {INSPECTION_COLUMNS} FROM inspections i WHERE i.code = ?");
        let row = sqlx::query_as::<_, InspectionRow>(&sql)
            .bind(code)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(InspectionRecord::try_from).transpose()
    }

    async fn list_inspections(
        &self,
        filter: &InspectionQueryFilter,
    ) -> Result<Vec<InspectionRecord>, RepoError> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {INSPECTION_COLUMNS} FROM inspections i WHERE 1=1"
        ));
        Self::apply_inspection_filter(&mut qb, filter);
        Self::push_inspection_order(&mut qb, filter);

        match filter.limit {
            Some(limit) => {
                qb.push(" LIMIT ");
                qb.push_bind(i64::from(limit.clamp(1, 1000)));
            }
            None => {
                qb.push(" LIMIT -1");
            }
        }
        if filter.offset > 0 {
            qb.push(" OFFSET ");
            qb.push_bind(i64::from(filter.offset));
        }

        let rows = qb
            .build_query_as::<InspectionRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(InspectionRecord::try_from).collect()
    }

    async fn count_inspections(&self, filter: &InspectionQueryFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM inspections i WHERE 1=1");
        Self::apply_inspection_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        convert_count(count)
    }

    async fn list_history(&self, id: Uuid) -> Result<Vec<HistoryEntry>, RepoError> {
        let entries: Vec<Json<HistoryEntry>> = sqlx::query_scalar(
            "SELECT entry FROM inspection_history WHERE inspection_id = ? ORDER BY seq",
        )
        .bind(id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(entries.into_iter().map(|entry| entry.0).collect())
    }

    async fn summarize(&self, now: OffsetDateTime) -> Result<InspectionSummary, RepoError> {
        let sql = format!(
            "SELECT COUNT(*) AS total, \
                 COALESCE(SUM(CASE WHEN i.submitted_at >= ? \
                     AND i.status IN ('submitted', 'approved', 'closed') \
                     AND (i.close_kind IS NULL OR i.close_kind != 'voided') \
                     THEN 1 ELSE 0 END), 0) AS completed_this_week, \
                 COALESCE(SUM(CASE WHEN i.status IN {OPEN_STATUSES} \
                     AND i.due_date IS NOT NULL AND i.due_date < ? \
                     THEN 1 ELSE 0 END), 0) AS overdue, \
                 COALESCE(SUM(CASE WHEN i.result = 'fail' THEN 1 ELSE 0 END), 0) AS failed, \
                 COALESCE(SUM(CASE WHEN i.status != 'closed' THEN i.defect_count ELSE 0 END), 0) \
                     AS open_defects, \
                 COALESCE(SUM(CASE WHEN i.compliance_tag IS NOT NULL THEN 1 ELSE 0 END), 0) \
                     AS compliance \
             FROM inspections i"
        );
        let row = sqlx::query_as::<_, SummaryRow>(&sql)
            .bind(to_millis(week_start(now)))
            .bind(to_millis(now))
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(InspectionSummary {
            total: convert_count(row.total)?,
            completed_this_week: convert_count(row.completed_this_week)?,
            overdue: convert_count(row.overdue)?,
            failed: convert_count(row.failed)?,
            open_defects_from_inspections: convert_count(row.open_defects)?,
            compliance_inspections: convert_count(row.compliance)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::week_start;

    #[test]
    fn week_starts_on_monday_midnight_utc() {
        assert_eq!(
            week_start(datetime!(2026-10-16 14:30 UTC)),
            datetime!(2026-10-12 00:00 UTC)
        );
        assert_eq!(
            week_start(datetime!(2026-10-12 00:00 UTC)),
            datetime!(2026-10-12 00:00 UTC)
        );
        assert_eq!(
            week_start(datetime!(2026-10-12 01:00 +03:00)),
            datetime!(2026-10-05 00:00 UTC)
        );
    }
}
