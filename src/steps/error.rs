// SPDX-License-Identifier: MIT

//! Typed error handling for wms-rs
//!
//! Every fallible API in the crate returns [`Result`], whose error side is
//! [`WmsError`]. Each concern keeps its own enum so callers can match on the
//! failure that matters to them (a stale write, a rejected scan, a GraphQL
//! error) without string inspection.

use thiserror::Error;

/// Top-level error type for wms-rs
#[derive(Debug, Error)]
pub enum WmsError {
    /// Step workflow store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// GraphQL backend errors
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Scan/check errors surfaced to the operator
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    /// Configuration errors (missing env vars, invalid config)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Step workflow store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored blob for a process is not a valid workflow state
    #[error("Corrupt workflow state for '{process}': {reason}")]
    Corrupt { process: String, reason: String },

    /// The process has not been initialized yet
    #[error("Process '{0}' is not initialized")]
    NotInitialized(String),

    /// The step was never entered in this process
    #[error("Step {step} not found in process '{process}'")]
    StepNotFound { process: String, step: u32 },

    /// Another writer changed the state between read and write
    #[error("Concurrent modification of process '{0}'")]
    Conflict(String),

    /// Storage key cannot be used by the backend
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// Step transition not allowed by the process plan
    #[error("Invalid transition in '{process}': {reason}")]
    InvalidTransition { process: String, reason: String },

    /// Step payload does not match the step's declared shape
    #[error("Invalid payload for step {step}: {reason}")]
    Payload { step: u32, reason: String },

    /// Process plan is malformed
    #[error("Invalid plan '{plan}': {reason}")]
    InvalidPlan { plan: String, reason: String },

    /// Lock poisoned or backend unavailable
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// GraphQL backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend answered with a GraphQL `errors` array
    #[error("GraphQL errors: {0}")]
    Graphql(String),

    /// Non-success HTTP status from the backend
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body is missing an expected field
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Forward route not configured
    #[error("Route '{0}' not found")]
    RouteNotFound(String),

    /// Request cannot be turned into GraphQL operations
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Scan/check failures, in the order the operator meets them
#[derive(Debug, Error, PartialEq)]
pub enum ScanError {
    /// Nothing was scanned or typed
    #[error("Empty input")]
    EmptyInput,

    /// The scanned value resolved to nothing the step expects
    #[error("Unexpected scanned item: {0}")]
    UnexpectedItem(String),

    /// Backend function failed at the transport/exception level
    #[error("Function error: {0}")]
    Function(String),

    /// Backend function rejected the request on a business rule
    #[error("Rejected with code {code}")]
    Rejected { code: String, detail: Option<String> },

    /// Network or HTTP failure
    #[error("Transport error: {0}")]
    Transport(String),
}

impl WmsError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl StoreError {
    /// Create a corrupt-state error
    pub fn corrupt(process: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            process: process.into(),
            reason: reason.into(),
        }
    }

    /// Create a step-not-found error
    pub fn step_not_found(process: impl Into<String>, step: u32) -> Self {
        Self::StepNotFound {
            process: process.into(),
            step,
        }
    }

    /// Create an invalid-transition error
    pub fn invalid_transition(process: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTransition {
            process: process.into(),
            reason: reason.into(),
        }
    }
}

/// Alias used by every fallible API in the crate.
pub type Result<T> = std::result::Result<T, WmsError>;
