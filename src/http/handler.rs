use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::deploy::{DeployOutcome, DeployStatus, Dispatcher, ProcessRunner};
use crate::webhook::signature::{self, SIGNATURE_HEADER};
use crate::webhook::{Secrets, VerifyError, WebhookEvent};

const EVENT_HEADER: &str = "x-github-event";

/// Shared, read-only request context. The per-target locks keep two
/// deliveries for the same target from running its script at once, even if
/// the first client goes away mid-deploy.
pub struct AppState {
    pub config: Arc<Config>,
    pub secrets: Secrets,
    pub dispatcher: Dispatcher,
    deploy_locks: HashMap<String, Arc<Mutex<()>>>,
}

impl AppState {
    pub fn new(config: Config, secrets: Secrets, runner: Arc<dyn ProcessRunner>) -> Self {
        let config = Arc::new(config);
        let deploy_locks = config
            .targets
            .keys()
            .map(|id| (id.clone(), Arc::new(Mutex::new(()))))
            .collect();

        Self {
            dispatcher: Dispatcher::new(Arc::clone(&config), runner),
            config,
            secrets,
            deploy_locks,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub status: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Debug)]
pub enum ApiError {
    Verify(VerifyError),
    InvalidPayload(String),
    DeployFailed(String),
}

impl From<VerifyError> for ApiError {
    fn from(e: VerifyError) -> Self {
        ApiError::Verify(e)
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Verify(VerifyError::UnknownTarget(_)) => StatusCode::NOT_FOUND,
            ApiError::Verify(VerifyError::MissingSignature)
            | ApiError::Verify(VerifyError::SignatureMismatch) => StatusCode::FORBIDDEN,
            ApiError::Verify(VerifyError::SecretNotConfigured { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::DeployFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(self) -> String {
        match self {
            ApiError::Verify(e) => e.to_string(),
            ApiError::InvalidPayload(detail) | ApiError::DeployFailed(detail) => detail,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            status: "error",
            detail: self.detail(),
        };
        (status, Json(body)).into_response()
    }
}

pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match process_webhook(&state, target_id, &headers, body).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn process_webhook(
    state: &Arc<AppState>,
    target_id: String,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    // A header that is not valid UTF-8 is present but cannot match.
    let presented = headers
        .get(SIGNATURE_HEADER)
        .map(|value| value.to_str().unwrap_or_default());

    if let Err(e) = signature::verify(&state.config, &state.secrets, &target_id, &body, presented) {
        match &e {
            VerifyError::SecretNotConfigured { .. } => error!("Rejecting webhook: {}", e),
            _ => warn!("Rejecting webhook for {}: {}", target_id, e),
        }
        return Err(e.into());
    }

    let event_kind = headers
        .get(EVENT_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("push");
    if event_kind == "ping" {
        info!("Received ping for target {}", target_id);
        let pong = InfoResponse {
            status: "info",
            message: "pong".to_string(),
        };
        return Ok(Json(pong).into_response());
    }

    let event = WebhookEvent::from_slice(&body)
        .map_err(|e| ApiError::InvalidPayload(format!("invalid webhook payload: {}", e)))?;
    info!(
        "Accepted {} delivery for target {} on {}{}",
        event_kind,
        target_id,
        event.reference,
        event
            .repository
            .as_ref()
            .map(|repo| format!(" ({})", repo.full_name))
            .unwrap_or_default()
    );

    let outcome = run_deploy(state, target_id, event).await;
    match outcome.status {
        DeployStatus::Success | DeployStatus::Skipped => Ok(Json(outcome).into_response()),
        DeployStatus::Failure => Err(ApiError::DeployFailed(outcome.message)),
    }
}

async fn run_deploy(state: &Arc<AppState>, target_id: String, event: WebhookEvent) -> DeployOutcome {
    let guard = match state.deploy_locks.get(&target_id) {
        Some(lock) => Some(Arc::clone(lock).lock_owned().await),
        None => None,
    };

    let dispatcher = state.dispatcher.clone();
    let task_target = target_id.clone();
    // Held until the script exits, even if this request is dropped first.
    let task = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        dispatcher.dispatch(&task_target, &event)
    });
    match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Deploy task for {} did not complete: {}", target_id, e);
            DeployOutcome {
                status: DeployStatus::Failure,
                message: format!("deploy task for `{}` did not complete", target_id),
            }
        }
    }
}
