use sqlx::error::ErrorKind;
use time::OffsetDateTime;

use crate::application::repos::RepoError;

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::UniqueViolation => RepoError::Duplicate {
                constraint: db
                    .message()
                    .split_once(": ")
                    .map(|(_, columns)| columns.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            },
            ErrorKind::ForeignKeyViolation => RepoError::Integrity {
                message: db.message().to_string(),
            },
            ErrorKind::CheckViolation | ErrorKind::NotNullViolation => RepoError::InvalidInput {
                message: db.message().to_string(),
            },
            _ if db.message().contains("database is locked") => RepoError::Timeout,
            _ if db.message().contains("append-only") => RepoError::Integrity {
                message: db.message().to_string(),
            },
            _ => RepoError::from_persistence(db),
        },
        other => RepoError::from_persistence(other),
    }
}

/// Timestamps are stored as unix milliseconds.
pub(crate) fn to_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

pub(crate) fn opt_to_millis(at: Option<OffsetDateTime>) -> Option<i64> {
    at.map(to_millis)
}

pub(crate) fn from_millis(value: i64) -> Result<OffsetDateTime, RepoError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(value) * 1_000_000)
        .map_err(|err| RepoError::from_persistence(format!("stored timestamp {value}: {err}")))
}

pub(crate) fn opt_from_millis(value: Option<i64>) -> Result<Option<OffsetDateTime>, RepoError> {
    value.map(from_millis).transpose()
}

pub(crate) fn convert_count(value: i64) -> Result<u64, RepoError> {
    value
        .try_into()
        .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
}

pub(crate) fn convert_u32(column: &str, value: i64) -> Result<u32, RepoError> {
    value
        .try_into()
        .map_err(|_| RepoError::from_persistence(format!("`{column}` out of range: {value}")))
}
