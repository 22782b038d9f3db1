// SPDX-License-Identifier: MIT

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::steps::error::{BackendError, WmsError};
use crate::steps::state::StepWorkflowStore;
use crate::wms::graphql::{Forwarder, GraphqlOperation};
use crate::wms::workflow::PlanRegistry;

pub mod error;
pub mod workflows;

use error::ApiError;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: StepWorkflowStore,
    pub plans: PlanRegistry,
    pub forwarder: Arc<Forwarder>,
    /// Cookie holding the caller's bearer token
    pub token_cookie: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/graphql", post(graphql))
        .route("/api/routes/{name}", post(forward_route))
        .route("/api/workflows", delete(workflows::reset_all))
        .route(
            "/api/workflows/{process}",
            get(workflows::get_one).delete(workflows::reset),
        )
        .route("/api/workflows/{process}/start", post(workflows::start))
        .route("/api/workflows/{process}/submit", post(workflows::submit))
        .route("/api/workflows/{process}/back", post(workflows::back))
        .route("/api/workflows/{process}/finish", post(workflows::finish))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> crate::Result<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Install the fmt subscriber that renders TraceLayer spans.
///
/// Returns false when a global subscriber is already set.
pub fn init_tracing() -> bool {
    let subscriber = tracing_subscriber::fmt().finish();
    match tracing::subscriber::set_global_default(subscriber) {
        Ok(()) => true,
        Err(e) => {
            log::debug!("Tracing subscriber not installed: {}", e);
            false
        }
    }
}

/// Caller's token: the configured cookie first, then `Authorization: Bearer`.
pub fn bearer_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn graphql(
    State(app): State<AppState>,
    headers: HeaderMap,
    Json(operation): Json<GraphqlOperation>,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers, &app.token_cookie);
    let data = app.forwarder.passthrough(&operation, token.as_deref()).await?;
    Ok(Json(json!({ "data": data })))
}

async fn forward_route(
    State(app): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body: Value = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(body) => body,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("Invalid JSON body: {}", e) })),
                )
                    .into_response()
            }
        }
    };

    let token = bearer_token(&headers, &app.token_cookie);
    match app.forwarder.forward(&name, &body, token.as_deref()).await {
        Ok(response) => (StatusCode::OK, Json(json!({ "response": response }))).into_response(),
        Err(WmsError::Backend(BackendError::RouteNotFound(_))) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Route '{}' not found", name) })),
        )
            .into_response(),
        Err(e @ WmsError::Backend(BackendError::InvalidRequest(_))) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
        Err(e) => {
            log::error!("Route '{}' failed: {}", name, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
