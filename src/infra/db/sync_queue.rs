use async_trait::async_trait;
use sqlx::{QueryBuilder, types::Json};
use time::OffsetDateTime;
use uuid::Uuid;
use vigil_api_types::OutboxEnvelope;

use crate::application::repos::{OutboxEntry, RepoError, SyncQueueRepo, SyncStateFilter};
use crate::domain::entities::SyncState;
use crate::domain::types::SyncStatus;

use super::util::{convert_count, convert_u32, opt_from_millis, to_millis};
use super::{SqliteRepositories, map_sqlx_error};

const OUTBOX_COLUMNS: &str = "seq, envelope, force, attempts, last_error, last_attempt_at";

#[derive(sqlx::FromRow)]
struct OutboxRow {
    seq: i64,
    envelope: Json<OutboxEnvelope>,
    force: bool,
    attempts: i64,
    last_error: Option<String>,
    last_attempt_at: Option<i64>,
}

impl TryFrom<OutboxRow> for OutboxEntry {
    type Error = RepoError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        let mut envelope = row.envelope.0;
        envelope.force = envelope.force || row.force;
        Ok(Self {
            sequence: row.seq,
            envelope,
            attempts: convert_u32("attempts", row.attempts)?,
            last_error: row.last_error,
            last_attempt_at: opt_from_millis(row.last_attempt_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SyncStateRow {
    id: Uuid,
    code: String,
    sync_status: SyncStatus,
    synced_at: Option<i64>,
    last_sync_attempt: Option<i64>,
    sync_error: Option<String>,
    needs_review: bool,
    queued_entries: i64,
}

impl TryFrom<SyncStateRow> for SyncState {
    type Error = RepoError;

    fn try_from(row: SyncStateRow) -> Result<Self, Self::Error> {
        Ok(Self {
            record_id: row.id,
            code: row.code,
            sync_status: row.sync_status,
            synced_at: opt_from_millis(row.synced_at)?,
            last_sync_attempt: opt_from_millis(row.last_sync_attempt)?,
            sync_error: row.sync_error,
            needs_review: row.needs_review,
            queued_entries: convert_count(row.queued_entries)?,
        })
    }
}

impl SqliteRepositories {
    async fn fetch_entry(&self, id: Uuid) -> Result<Option<OutboxEntry>, RepoError> {
        let sql = format!("SELECT {OUTBOX_COLUMNS} FROM sync_queue WHERE id = ?");
        let row = sqlx::query_as::<_, OutboxRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(OutboxEntry::try_from).transpose()
    }
}

#[async_trait]
impl SyncQueueRepo for SqliteRepositories {
    async fn enqueue(&self, envelope: &OutboxEnvelope) -> Result<OutboxEntry, RepoError> {
        let mut write = self.begin_write().await?;

        let inserted = sqlx::query(
            "INSERT INTO sync_queue (id, operation, record_id, envelope, force, enqueued_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(envelope.mutation_id)
        .bind(envelope.operation)
        .bind(envelope.record_id)
        .bind(Json(envelope))
        .bind(envelope.force)
        .bind(to_millis(OffsetDateTime::now_utc()))
        .execute(&mut *write.tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

        if inserted > 0 {
            sqlx::query(
                "UPDATE inspections SET sync_status = 'pending' \
                 WHERE id = ? AND sync_status = 'synced'",
            )
            .bind(envelope.record_id)
            .execute(&mut *write.tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        write.commit().await?;

        self.fetch_entry(envelope.mutation_id)
            .await?
            .ok_or(RepoError::NotFound)
    }

    async fn list_entries(&self) -> Result<Vec<OutboxEntry>, RepoError> {
        let sql = format!("SELECT {OUTBOX_COLUMNS} FROM sync_queue ORDER BY seq");
        let rows = sqlx::query_as::<_, OutboxRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(OutboxEntry::try_from).collect()
    }

    async fn entries_for_record(&self, record_id: Uuid) -> Result<Vec<OutboxEntry>, RepoError> {
        let sql = format!("SELECT {OUTBOX_COLUMNS} FROM sync_queue WHERE record_id = ? ORDER BY seq");
        let rows = sqlx::query_as::<_, OutboxRow>(&sql)
            .bind(record_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(OutboxEntry::try_from).collect()
    }

    async fn count_entries(&self) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        convert_count(count)
    }

    async fn next_entry(&self, skip: &[Uuid]) -> Result<Option<OutboxEntry>, RepoError> {
        let mut qb = QueryBuilder::new(format!("SELECT {OUTBOX_COLUMNS} FROM sync_queue"));
        if !skip.is_empty() {
            qb.push(" WHERE record_id NOT IN (");
            let mut separated = qb.separated(", ");
            for record_id in skip {
                separated.push_bind(*record_id);
            }
            separated.push_unseparated(")");
        }
        qb.push(" ORDER BY seq LIMIT 1");

        let row = qb
            .build_query_as::<OutboxRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(OutboxEntry::try_from).transpose()
    }

    async fn mark_syncing(&self, record_id: Uuid, at: OffsetDateTime) -> Result<(), RepoError> {
        let mut write = self.begin_write().await?;
        sqlx::query("UPDATE inspections SET sync_status = ?, last_sync_attempt = ? WHERE id = ?")
            .bind(SyncStatus::Syncing)
            .bind(to_millis(at))
            .bind(record_id)
            .execute(&mut *write.tx)
            .await
            .map_err(map_sqlx_error)?;
        write.commit().await
    }

    async fn acknowledge(
        &self,
        entry_id: Uuid,
        record_id: Uuid,
        at: OffsetDateTime,
    ) -> Result<SyncStatus, RepoError> {
        let mut write = self.begin_write().await?;

        sqlx::query("DELETE FROM sync_queue WHERE id = ?")
            .bind(entry_id)
            .execute(&mut *write.tx)
            .await
            .map_err(map_sqlx_error)?;

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue WHERE record_id = ?")
            .bind(record_id)
            .fetch_one(&mut *write.tx)
            .await
            .map_err(map_sqlx_error)?;
        let status = if remaining > 0 {
            SyncStatus::Pending
        } else {
            SyncStatus::Synced
        };

        sqlx::query(
            "UPDATE inspections SET sync_status = ?, synced_at = ?, sync_error = NULL, \
                 needs_review = 0 \
             WHERE id = ?",
        )
        .bind(status)
        .bind(to_millis(at))
        .bind(record_id)
        .execute(&mut *write.tx)
        .await
        .map_err(map_sqlx_error)?;

        write.commit().await?;
        Ok(status)
    }

    async fn record_failure(
        &self,
        entry_id: Uuid,
        record_id: Uuid,
        error: &str,
        needs_review: bool,
        at: OffsetDateTime,
    ) -> Result<(), RepoError> {
        let mut write = self.begin_write().await?;
        let at = to_millis(at);

        sqlx::query(
            "UPDATE sync_queue SET attempts = attempts + 1, last_error = ?, last_attempt_at = ? \
             WHERE id = ?",
        )
        .bind(error)
        .bind(at)
        .bind(entry_id)
        .execute(&mut *write.tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            "UPDATE inspections SET sync_status = ?, sync_error = ?, last_sync_attempt = ?, \
                 needs_review = (needs_review OR ?) \
             WHERE id = ?",
        )
        .bind(SyncStatus::Failed)
        .bind(error)
        .bind(at)
        .bind(needs_review)
        .bind(record_id)
        .execute(&mut *write.tx)
        .await
        .map_err(map_sqlx_error)?;

        write.commit().await
    }

    async fn force_entries(&self, record_id: Uuid) -> Result<u64, RepoError> {
        let mut write = self.begin_write().await?;

        let armed = sqlx::query("UPDATE sync_queue SET force = 1 WHERE record_id = ?")
            .bind(record_id)
            .execute(&mut *write.tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        sqlx::query(
            "UPDATE inspections SET needs_review = 0, \
                 sync_status = CASE WHEN sync_status = 'failed' THEN 'pending' ELSE sync_status END \
             WHERE id = ?",
        )
        .bind(record_id)
        .execute(&mut *write.tx)
        .await
        .map_err(map_sqlx_error)?;

        write.commit().await?;
        Ok(armed)
    }

    async fn reset_interrupted(&self) -> Result<u64, RepoError> {
        let mut write = self.begin_write().await?;
        let reset = sqlx::query("UPDATE inspections SET sync_status = ? WHERE sync_status = ?")
            .bind(SyncStatus::Pending)
            .bind(SyncStatus::Syncing)
            .execute(&mut *write.tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();
        write.commit().await?;
        Ok(reset)
    }

    async fn unsynced_without_entries(&self) -> Result<Vec<Uuid>, RepoError> {
        sqlx::query_scalar(
            "SELECT i.id FROM inspections i \
             WHERE i.sync_status != 'synced' \
               AND NOT EXISTS (SELECT 1 FROM sync_queue q WHERE q.record_id = i.id) \
             ORDER BY i.created_at",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn sync_states(&self, filter: &SyncStateFilter) -> Result<Vec<SyncState>, RepoError> {
        let mut qb = QueryBuilder::new(
            "SELECT i.id, i.code, i.sync_status, i.synced_at, i.last_sync_attempt, \
                 i.sync_error, i.needs_review, \
                 (SELECT COUNT(*) FROM sync_queue q WHERE q.record_id = i.id) AS queued_entries \
             FROM inspections i WHERE 1=1",
        );
        if !filter.statuses.is_empty() {
            qb.push(" AND i.sync_status IN (");
            let mut separated = qb.separated(", ");
            for status in &filter.statuses {
                separated.push_bind(*status);
            }
            separated.push_unseparated(")");
        }
        if let Some(needs_review) = filter.needs_review {
            qb.push(" AND i.needs_review = ");
            qb.push_bind(needs_review);
        }
        qb.push(" ORDER BY i.updated_at DESC, i.code DESC");

        let rows = qb
            .build_query_as::<SyncStateRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(SyncState::try_from).collect()
    }
}
