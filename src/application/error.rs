use thiserror::Error;

use crate::{application::repos::RepoError, domain::error::DomainError, infra::error::InfraError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("network error: {0}")]
    Network(String),
    #[error(transparent)]
    Repo(RepoError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Stable short name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::InvalidState(_) => "invalid_state",
            AppError::Permission(_) => "permission",
            AppError::NotFound { .. } => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Network(_) => "network",
            AppError::Repo(_) => "persistence",
            AppError::Infra(_) => "infra",
            AppError::Unexpected(_) => "unexpected",
        }
    }
}

impl From<DomainError> for AppError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::NotFound { entity } => AppError::NotFound { entity },
            DomainError::Validation { message } => AppError::Validation(message),
            DomainError::InvalidState { message } => AppError::InvalidState(message),
            err @ DomainError::Permission { .. } => AppError::Permission(err.to_string()),
            DomainError::Invariant { message } => AppError::Unexpected(message),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(error: RepoError) -> Self {
        match error {
            RepoError::NotFound => AppError::NotFound { entity: "record" },
            RepoError::Duplicate { constraint } => {
                AppError::Conflict(format!("duplicate value for `{constraint}`"))
            }
            RepoError::Integrity { message } => AppError::Conflict(message),
            RepoError::InvalidInput { message } => AppError::Validation(message),
            other => AppError::Repo(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_keep_their_taxonomy() {
        let err = AppError::from(DomainError::invalid_state("closed"));
        assert_eq!(err.kind(), "invalid_state");

        let err = AppError::from(DomainError::permission("viewer", "submit inspections"));
        assert!(matches!(err, AppError::Permission(_)));
    }

    #[test]
    fn integrity_violations_surface_as_conflicts() {
        let err = AppError::from(RepoError::Integrity {
            message: "template still referenced".into(),
        });
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
