//! Contract of the server of record that receives queued mutations.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use vigil_api_types::{OutboxEnvelope, SyncAck};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("remote rejected the payload: {0}")]
    Validation(String),
    #[error("remote record changed since it was read: {0}")]
    StaleState(String),
    #[error("remote denied the operation: {0}")]
    PermissionDenied(String),
    #[error("remote failed to process the payload: {0}")]
    Server(String),
    #[error("remote unreachable: {0}")]
    Network(String),
    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),
}

impl RemoteError {
    /// Transport failures. The engine re-probes the remote before treating one as an outage.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, RemoteError::Network(_))
    }
}

#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn is_online(&self) -> bool;

    async fn send(&self, envelope: &OutboxEnvelope) -> Result<SyncAck, RemoteError>;
}
