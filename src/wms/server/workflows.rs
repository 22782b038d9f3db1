// SPDX-License-Identifier: MIT

//! Workflow endpoints backed by the step workflow store.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::{bearer_token, AppState};
use crate::steps::state::WorkflowState;
use crate::wms::workflow::StepDriver;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub step: u32,
    pub data: Value,
}

#[derive(Debug, Deserialize)]
pub struct BackRequest {
    pub step: u32,
}

/// Forward route run by `finish` for a process, when configured
pub fn validation_route(process: &str) -> String {
    format!("validate-{}", process)
}

async fn driver(state: &AppState, process: &str) -> Result<StepDriver, ApiError> {
    let plan = state
        .plans
        .get(process)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Process '{}' not found", process)))?;
    Ok(StepDriver::new(state.store.clone(), plan)?)
}

fn view(driver: &StepDriver, state: &WorkflowState) -> Json<Value> {
    Json(json!({
        "process": driver.process(),
        "state": state,
        "pendingStep": driver.pending_step(state),
        "finished": driver.is_finished(state),
    }))
}

pub async fn get_one(
    State(app): State<AppState>,
    Path(process): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let driver = driver(&app, &process).await?;
    let state = driver.state()?;
    Ok(view(&driver, &state))
}

pub async fn start(
    State(app): State<AppState>,
    Path(process): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let driver = driver(&app, &process).await?;
    let state = driver.start()?;
    Ok(view(&driver, &state))
}

pub async fn submit(
    State(app): State<AppState>,
    Path(process): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<Value>, ApiError> {
    let driver = driver(&app, &process).await?;
    let state = driver.submit(request.step, request.data)?;
    Ok(view(&driver, &state))
}

pub async fn back(
    State(app): State<AppState>,
    Path(process): Path<String>,
    Json(request): Json<BackRequest>,
) -> Result<Json<Value>, ApiError> {
    let driver = driver(&app, &process).await?;
    let state = driver.back(request.step)?;
    Ok(view(&driver, &state))
}

/// Validate a finished process through its `validate-{process}` route, then
/// drop its state. Without such a route the state is simply dropped.
pub async fn finish(
    State(app): State<AppState>,
    Path(process): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let driver = driver(&app, &process).await?;
    let route = validation_route(&process);
    let forwarder = app.forwarder.clone();
    let token = bearer_token(&headers, &app.token_cookie);

    let response = driver
        .finish(move |state| async move {
            if !forwarder.has_route(&route) {
                return Ok(Value::Null);
            }
            match serde_json::to_value(&state) {
                Ok(body) => forwarder.forward(&route, &body, token.as_deref()).await,
                Err(e) => Err(e.into()),
            }
        })
        .await?;

    Ok(Json(json!({ "response": response })))
}

pub async fn reset(
    State(app): State<AppState>,
    Path(process): Path<String>,
) -> Result<StatusCode, ApiError> {
    let driver = driver(&app, &process).await?;
    driver.reset()?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reset_all(State(app): State<AppState>) -> Result<Json<Value>, ApiError> {
    let removed = app.store.reset_all()?;
    Ok(Json(json!({ "removed": removed })))
}
