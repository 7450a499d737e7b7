//! HTTP and WebSocket surface.
//!
//! Routes:
//!
//! | Method     | Path          | Handler                                  |
//! |------------|---------------|------------------------------------------|
//! | GET        | `/`           | Dashboard page                           |
//! | GET        | `/api/status` | Current snapshot from the hub            |
//! | GET        | `/api/config` | Current configuration from the store     |
//! | POST, PUT  | `/api/config` | Partial update through the coordinator   |
//! | POST       | `/api/action` | Pause or resume monitoring               |
//! | GET        | `/api/logs`   | Recent log entries, oldest first         |
//! | GET        | `/api/ws`     | Push subscription                        |
//! | GET        | `/health`     | Liveness                                 |
//!
//! Every rejection, including a body that does not deserialize, is answered
//! with an `ErrorResponse` JSON body.

use std::io;
use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tempwatch_core::{ConfigPatch, Configuration, Snapshot};
use tempwatch_protocol::{
    routes, ActionRequest, ActionResponse, ConfigUpdateResponse, ErrorCode, ErrorResponse,
    HealthResponse, LogEntry, UnknownAction,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::coordinator::{CoordinatorError, CoordinatorHandle};
use crate::hub::{HubError, HubHandle};
use crate::log_feed::RecentLogs;
use crate::store::StateStore;

mod ws;

const DASHBOARD_HTML: &str = include_str!("../../assets/dashboard.html");

/// Service name reported by `/health`.
pub const SERVICE_NAME: &str = "tempwatchd";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] io::Error),
}

/// Handler failures, rendered as `ErrorResponse` bodies.
#[derive(Debug, Error)]
enum ApiError {
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Action(#[from] UnknownAction),

    /// Request body that does not fit the expected schema
    #[error("{rejection}")]
    Body {
        code: ErrorCode,
        rejection: JsonRejection,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Coordinator(CoordinatorError::InvalidConfiguration(e)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse::invalid_configuration(e),
            ),
            ApiError::Action(e) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(ErrorCode::InvalidAction, e.to_string()),
            ),
            ApiError::Body { code, rejection } => {
                let text = rejection.body_text();
                let field = rejection_field(&text);
                (rejection.status(), ErrorResponse::new(*code, text).with_field(field))
            }
            ApiError::Coordinator(_) | ApiError::Hub(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::new(ErrorCode::Unavailable, self.to_string()),
            ),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// State and Router
// ============================================================================

/// Shared handles for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: CoordinatorHandle,
    pub hub: HubHandle,
    pub store: StateStore,
    pub logs: RecentLogs,
    pub cancel: CancellationToken,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route(routes::STATUS, get(status))
        .route(routes::CONFIG, get(get_config).post(update_config).put(update_config))
        .route(routes::ACTION, post(action))
        .route(routes::LOGS, get(recent_logs))
        .route(routes::WS, get(ws::ws_handler))
        .route(routes::HEALTH, get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the listener.
///
/// # Errors
///
/// Returns `ServerError::Bind` if the address is unavailable.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Serves until the state's cancellation token fires, then drains.
///
/// # Errors
///
/// Returns `ServerError::Serve` on a fatal accept-loop error.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), ServerError> {
    let cancel = state.cancel.clone();
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "HTTP server listening");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn status(State(state): State<AppState>) -> Result<Json<Snapshot>, ApiError> {
    Ok(Json(state.hub.current().await?))
}

async fn get_config(State(state): State<AppState>) -> Json<Configuration> {
    Json(state.store.config())
}

async fn update_config(
    State(state): State<AppState>,
    body: Result<Json<ConfigPatch>, JsonRejection>,
) -> Result<Json<ConfigUpdateResponse>, ApiError> {
    let Json(patch) = body.map_err(|rejection| ApiError::Body {
        code: ErrorCode::InvalidConfiguration,
        rejection,
    })?;
    if patch.is_empty() {
        let config = state.store.config();
        return Ok(Json(ConfigUpdateResponse::applied(config.clone(), config)));
    }

    let update = state.coordinator.update_config(patch).await.inspect_err(|e| {
        if !matches!(e, CoordinatorError::InvalidConfiguration(_)) {
            warn!(error = %e, "Configuration update failed");
        }
    })?;
    Ok(Json(ConfigUpdateResponse::applied(update.config, update.previous)))
}

async fn action(
    State(state): State<AppState>,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<ActionResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::Body {
        code: ErrorCode::InvalidAction,
        rejection,
    })?;
    let action = request.parse()?;
    let paused = state.coordinator.set_paused(action.paused()).await?;
    Ok(Json(ActionResponse {
        success: true,
        action,
        monitoring_paused: paused,
    }))
}

async fn recent_logs(State(state): State<AppState>) -> Json<Vec<LogEntry>> {
    Json(state.logs.entries())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy(SERVICE_NAME, env!("CARGO_PKG_VERSION")))
}

/// Field named in a JSON extractor rejection.
///
/// Data errors read `...target type: <path>: <reason>`; unknown keys read
/// ``unknown field `<name>`, expected ...``. Syntax errors name no field.
fn rejection_field(text: &str) -> Option<String> {
    let detail = text
        .split_once("target type: ")
        .map_or(text, |(_, detail)| detail);

    if let Some((_, rest)) = detail.split_once("unknown field `") {
        return rest.split_once('`').map(|(name, _)| name.to_string());
    }

    let (path, _) = detail.split_once(": ")?;
    let is_path = !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '[' || c == ']');
    is_path.then(|| path.to_string())
}
