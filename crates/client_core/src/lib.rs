use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::{
    domain::ProjectId,
    error::{ApiError, GenerateCodeError, TransportFailure},
    protocol::{
        ApiResponse, GenerateCodeRequest, GenerateCodeResponse, GetProjectRequest,
        GetProjectResponse,
    },
};
use storage::Storage;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info};
use url::Url;

mod modified_state;
pub use modified_state::{CachedStateReconciler, StateReconciler};

const GENERATE_CODE_TITLE: &str = "generate-code";
const GET_PROJECT_TITLE: &str = "get-project";
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Remote surface consumed by the orchestrator. Both calls resolve with a
/// status/payload pair when an HTTP response arrived, and reject with a
/// [`TransportFailure`] when the call never produced a usable outcome.
#[async_trait]
pub trait ProjectBackend: Send + Sync {
    async fn generate_code(
        &self,
        request: &GenerateCodeRequest,
    ) -> std::result::Result<ApiResponse<GenerateCodeResponse>, TransportFailure>;

    async fn get_project(
        &self,
        request: &GetProjectRequest,
    ) -> std::result::Result<ApiResponse<GetProjectResponse>, TransportFailure>;
}

#[derive(Debug, Error)]
pub enum BackendConfigError {
    #[error("invalid server url '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("unsupported server url scheme '{scheme}'; expected http or https")]
    UnsupportedScheme { scheme: String },
}

/// reqwest-backed [`ProjectBackend`] speaking to the code-generation server.
pub struct HttpBackend {
    http: Client,
    server_url: String,
}

impl HttpBackend {
    pub fn new(server_url: impl Into<String>) -> std::result::Result<Self, BackendConfigError> {
        let server_url = server_url.into();
        let parsed = Url::parse(&server_url).map_err(|source| BackendConfigError::InvalidUrl {
            url: server_url.clone(),
            source,
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(BackendConfigError::UnsupportedScheme {
                scheme: parsed.scheme().to_string(),
            });
        }
        Ok(Self {
            http: Client::new(),
            server_url: server_url.trim_end_matches('/').to_string(),
        })
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<ApiResponse<T>, TransportFailure> {
        let response = request
            .send()
            .await
            .map_err(|err| TransportFailure::no_response(err.to_string()))?;

        let status = response.status().as_u16();
        if response.status().is_success() {
            let data = response.json::<T>().await.ok();
            return Ok(ApiResponse { status, data });
        }

        let body = response.text().await.unwrap_or_default();
        if let Ok(api_error) = serde_json::from_str::<ApiError>(&body) {
            return Err(TransportFailure::new(status, api_error.message));
        }
        Ok(ApiResponse::status_only(status))
    }
}

#[async_trait]
impl ProjectBackend for HttpBackend {
    async fn generate_code(
        &self,
        request: &GenerateCodeRequest,
    ) -> std::result::Result<ApiResponse<GenerateCodeResponse>, TransportFailure> {
        self.execute(
            self.http
                .post(format!("{}/code-operations/generate", self.server_url))
                .json(request),
        )
        .await
    }

    async fn get_project(
        &self,
        request: &GetProjectRequest,
    ) -> std::result::Result<ApiResponse<GetProjectResponse>, TransportFailure> {
        self.execute(
            self.http
                .get(format!("{}/projects/{}", self.server_url, request.id)),
        )
        .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Failure,
}

/// User-facing toast. The UI layer subscribes to the event channel and
/// renders these; the core never blocks on delivery.
#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    Notification(Notification),
    /// The cached project snapshot was replaced with a fresh server copy.
    /// Callers that need freshness guarantees after a generate-code action
    /// wait for this instead of the action's own result.
    ProjectRefreshed {
        id: ProjectId,
        version: i64,
    },
    ProjectRefreshFailed {
        message: String,
    },
}

/// Drives the generate-code action: one remote call, a uniform result for
/// the dispatching layer, and a detached refresh of the cached project
/// snapshot on success.
pub struct CodeOperationsClient {
    backend: Arc<dyn ProjectBackend>,
    cache: Storage,
    reconciler: Arc<dyn StateReconciler>,
    events: broadcast::Sender<ClientEvent>,
}

impl CodeOperationsClient {
    pub fn new(backend: Arc<dyn ProjectBackend>, cache: Storage) -> Arc<Self> {
        let reconciler = Arc::new(CachedStateReconciler::new(cache.clone()));
        Self::new_with_reconciler(backend, cache, reconciler)
    }

    pub fn new_with_reconciler(
        backend: Arc<dyn ProjectBackend>,
        cache: Storage,
        reconciler: Arc<dyn StateReconciler>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            backend,
            cache,
            reconciler,
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    fn notify_success(&self, title: &str, message: &str) {
        info!("{title} [Success]: {message}");
        let _ = self.events.send(ClientEvent::Notification(Notification {
            level: NotificationLevel::Success,
            title: title.to_string(),
            message: message.to_string(),
        }));
    }

    fn notify_failure(&self, title: &str, message: &str) {
        error!("{title} [Failure]: {message}");
        let _ = self.events.send(ClientEvent::Notification(Notification {
            level: NotificationLevel::Failure,
            title: title.to_string(),
            message: message.to_string(),
        }));
    }

    /// Trigger a code-generation run for the project named in `request`.
    ///
    /// On a 200 the payload is returned and the cached project snapshot is
    /// refreshed in a detached task; the refresh outcome reaches callers only
    /// through the event channel, never through this result. Every other
    /// outcome collapses into a [`GenerateCodeError`] with a uniform message.
    pub async fn generate_code(
        self: &Arc<Self>,
        request: GenerateCodeRequest,
    ) -> std::result::Result<GenerateCodeResponse, GenerateCodeError> {
        let project_id = request.project_id.clone();

        let response = match self.backend.generate_code(&request).await {
            Ok(response) => response,
            Err(failure) => {
                let message = failure.to_string();
                self.notify_failure(GENERATE_CODE_TITLE, &message);
                return Err(GenerateCodeError::new(message));
            }
        };

        if response.status != 200 {
            let message = format!(
                "Failed to generate code for '{project_id}'. Received: {}",
                response.status
            );
            self.notify_failure(GENERATE_CODE_TITLE, &message);
            return Err(GenerateCodeError::new(message));
        }

        let Some(payload) = response.data else {
            let message = format!(
                "Status: {}, Message: Received malformed generate-code payload",
                response.status
            );
            self.notify_failure(GENERATE_CODE_TITLE, &message);
            return Err(GenerateCodeError::new(message));
        };

        let message = format!("Successfully generated code for '{project_id}'");
        self.notify_success(GENERATE_CODE_TITLE, &message);

        let client = Arc::clone(self);
        tokio::spawn(async move {
            client.refresh_project_snapshot(project_id).await;
        });

        Ok(payload)
    }

    /// Fetch the authoritative project snapshot and reconcile the local
    /// cache. Failures here are terminal for the refresh only: they are
    /// reported via notification and event, never to the primary caller.
    async fn refresh_project_snapshot(&self, project_id: ProjectId) {
        let request = GetProjectRequest { id: project_id };

        let response = match self.backend.get_project(&request).await {
            Ok(response) => response,
            Err(failure) => {
                let message = failure.to_string();
                self.notify_failure(GET_PROJECT_TITLE, &message);
                let _ = self
                    .events
                    .send(ClientEvent::ProjectRefreshFailed { message });
                return;
            }
        };

        let snapshot = match response.data {
            Some(snapshot) if response.status == 200 => snapshot,
            _ => {
                let message = format!(
                    "Status: {}, Message: Failed to retrieve project.",
                    response.status
                );
                self.notify_failure(GET_PROJECT_TITLE, &message);
                let _ = self
                    .events
                    .send(ClientEvent::ProjectRefreshFailed { message });
                return;
            }
        };

        self.notify_success(GET_PROJECT_TITLE, "Successfully retrieved project.");

        if let Err(err) = self.apply_project_snapshot(&snapshot).await {
            let message = format!("failed to cache refreshed project '{}': {err:#}", snapshot.id);
            error!("{message}");
            let _ = self
                .events
                .send(ClientEvent::ProjectRefreshFailed { message });
            return;
        }

        let _ = self.events.send(ClientEvent::ProjectRefreshed {
            id: snapshot.id.clone(),
            version: snapshot.version,
        });
    }

    async fn apply_project_snapshot(&self, snapshot: &GetProjectResponse) -> Result<()> {
        self.cache.set_current_config(&snapshot.json).await?;
        self.cache.set_current_state(&snapshot.json).await?;
        self.cache
            .set_current_project_details(&snapshot.id, snapshot.version)
            .await?;
        self.reconciler.update_modified_state(snapshot).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
