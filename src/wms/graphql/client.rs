// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use url::Url;

use crate::steps::error::{BackendError, Result};

/// A GraphQL document and its variables
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GraphqlOperation {
    pub query: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
}

impl GraphqlOperation {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: Map::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }
}

/// Anything able to run a GraphQL operation on behalf of a caller.
///
/// `token` is the caller's bearer token, passed through untouched.
/// Implementations return the `data` member of the response.
#[async_trait]
pub trait GraphqlBackend: Send + Sync {
    async fn execute(&self, operation: &GraphqlOperation, token: Option<&str>) -> Result<Value>;
}

/// reqwest-backed client for the remote GraphQL endpoint
pub struct HttpGraphqlClient {
    client: Client,
    endpoint: Url,
}

impl HttpGraphqlClient {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl GraphqlBackend for HttpGraphqlClient {
    async fn execute(&self, operation: &GraphqlOperation, token: Option<&str>) -> Result<Value> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("Accept", "application/json")
            .json(&json!({
                "query": operation.query,
                "variables": operation.variables,
            }));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await?;
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let body: Value = resp.json().await?;
        parse_response(body)
    }
}

/// Extract `data` from a GraphQL response body, turning `errors` into an error.
pub fn parse_response(mut body: Value) -> Result<Value> {
    if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
        if !errors.is_empty() {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| {
                    e.get("message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| e.to_string())
                })
                .collect();
            return Err(BackendError::Graphql(messages.join("; ")).into());
        }
    }

    match body.get_mut("data").map(Value::take) {
        Some(Value::Null) | None => {
            Err(BackendError::InvalidResponse("missing data".to_string()).into())
        }
        Some(data) => Ok(data),
    }
}
