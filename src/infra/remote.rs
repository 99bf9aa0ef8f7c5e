//! HTTP adapters for the server of record.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;
use vigil_api_types::{
    CreateDefectRequest, CreateDefectResponse, OutboxEnvelope, RejectionKind, SyncAck,
    SyncRejection,
};

use crate::application::defects::{DefectError, DefectsGateway};
use crate::application::remote::{RemoteApi, RemoteError};
use crate::domain::types::Severity;
use crate::infra::error::InfraError;

const HEALTH_PATH: &str = "api/v1/health";
const MUTATIONS_PATH: &str = "api/v1/sync/mutations";
const DEFECTS_PATH: &str = "api/v1/defects";
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone, Debug)]
pub struct HttpRemote {
    client: Client,
    base: Url,
    token: Option<String>,
    timeout: Duration,
}

impl HttpRemote {
    pub fn new(base: &str, token: Option<String>, timeout: Duration) -> Result<Self, InfraError> {
        let base = Url::parse(base)
            .and_then(|url| url.join("/"))
            .map_err(|err| InfraError::configuration(format!("invalid remote url: {err}")))?;
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http(err.to_string()))?;
        Ok(Self {
            client,
            base,
            token,
            timeout,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("vigil/", env!("CARGO_PKG_VERSION"))
    }

    fn url(&self, path: &str) -> Result<Url, RemoteError> {
        self.base
            .join(path)
            .map_err(|err| RemoteError::Validation(format!("invalid endpoint `{path}`: {err}")))
    }

    fn post(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.post(url);
        match self.token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            RemoteError::Timeout(self.timeout)
        } else {
            RemoteError::Network(err.to_string())
        }
    }

    async fn parse<T: DeserializeOwned>(&self, response: Response) -> Result<T, RemoteError> {
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.transport_error(err))?;
        if status.is_success() {
            return serde_json::from_slice(&bytes)
                .map_err(|err| RemoteError::Validation(format!("unreadable response: {err}")));
        }
        Err(classify(status, &bytes))
    }
}

/// Map a non-success response onto the error the sync engine acts on.
///
/// A server error is about this payload, not about reachability, so it becomes
/// [`RemoteError::Server`] and only holds up the record it carries.
fn classify(status: StatusCode, body: &[u8]) -> RemoteError {
    let rejection = serde_json::from_slice::<SyncRejection>(body).ok();
    let message = rejection
        .as_ref()
        .map(|rejection| rejection.message.clone())
        .unwrap_or_else(|| format!("status {status}: {}", String::from_utf8_lossy(body)));

    match (status, rejection.map(|rejection| rejection.kind)) {
        (_, Some(RejectionKind::StaleState)) | (StatusCode::CONFLICT, None) => {
            RemoteError::StaleState(message)
        }
        (_, Some(RejectionKind::PermissionDenied))
        | (StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED, None) => {
            RemoteError::PermissionDenied(message)
        }
        (_, Some(RejectionKind::Validation)) => RemoteError::Validation(message),
        (status, None) if status.is_server_error() => RemoteError::Server(message),
        (_, None) => RemoteError::Validation(message),
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn is_online(&self) -> bool {
        let Ok(url) = self.url(HEALTH_PATH) else {
            return false;
        };
        match self.client.get(url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(error = %err, "Remote health probe failed");
                false
            }
        }
    }

    async fn send(&self, envelope: &OutboxEnvelope) -> Result<SyncAck, RemoteError> {
        let response = self
            .post(self.url(MUTATIONS_PATH)?)
            .json(envelope)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;
        self.parse(response).await
    }
}

#[async_trait]
impl DefectsGateway for HttpRemote {
    async fn create_defect_from_failed_item(
        &self,
        inspection_id: Uuid,
        item_id: &str,
        severity: Severity,
        compliance_tag: Option<&str>,
    ) -> Result<Uuid, DefectError> {
        let url = self
            .url(DEFECTS_PATH)
            .map_err(|err| DefectError::Rejected(err.to_string()))?;
        let body = CreateDefectRequest {
            inspection_id,
            item_id: item_id.to_string(),
            severity: severity.as_str().to_string(),
            compliance_tag: compliance_tag.map(str::to_string),
        };
        let response = self
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|err| DefectError::Unavailable(err.to_string()))?;

        match self.parse::<CreateDefectResponse>(response).await {
            Ok(created) => Ok(created.id),
            Err(
                err @ (RemoteError::Network(_) | RemoteError::Timeout(_) | RemoteError::Server(_)),
            ) => {
                Err(DefectError::Unavailable(err.to_string()))
            }
            Err(err) => Err(DefectError::Rejected(err.to_string())),
        }
    }
}

/// Remote used when no server is configured; the outbox simply accumulates.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineRemote;

#[async_trait]
impl RemoteApi for OfflineRemote {
    async fn is_online(&self) -> bool {
        false
    }

    async fn send(&self, _envelope: &OutboxEnvelope) -> Result<SyncAck, RemoteError> {
        Err(RemoteError::Network("no remote configured".to_string()))
    }
}
