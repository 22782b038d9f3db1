// SPDX-License-Identifier: MIT

//! API error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::steps::error::{BackendError, StoreError, WmsError};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// Stale write, the client should reload and retry
    Conflict(String),
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, error) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        (
            status,
            Json(ErrorResponse {
                error,
                kind: kind.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<WmsError> for ApiError {
    fn from(err: WmsError) -> Self {
        let msg = err.to_string();
        match err {
            WmsError::Store(StoreError::StepNotFound { .. })
            | WmsError::Backend(BackendError::RouteNotFound(_)) => ApiError::NotFound(msg),
            WmsError::Store(StoreError::Conflict(_)) => ApiError::Conflict(msg),
            WmsError::Store(
                StoreError::InvalidTransition { .. }
                | StoreError::NotInitialized(_)
                | StoreError::Payload { .. }
                | StoreError::InvalidKey(_),
            )
            | WmsError::Scan(_)
            | WmsError::Backend(BackendError::InvalidRequest(_)) => ApiError::BadRequest(msg),
            _ => ApiError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::error::ScanError;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_not_found_response() {
        let error: ApiError = WmsError::from(StoreError::step_not_found("reception", 30)).into();
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.kind, "not_found");
        assert!(json.error.contains("Step 30"));
    }

    #[test]
    fn test_status_mapping() {
        let status = |err: WmsError| ApiError::from(err).into_response().status();

        assert_eq!(
            status(StoreError::Conflict("load".to_string()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(StoreError::invalid_transition("load", "nope").into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status(ScanError::EmptyInput.into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(BackendError::Graphql("boom".to_string()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(StoreError::corrupt("load", "bad json").into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
