// SPDX-License-Identifier: MIT

//! Scan checks
//!
//! A scan check turns the raw value typed or scanned by the operator into the
//! candidate items a step can accept. Backend functions answer with a
//! `{status, output}` envelope which [`classify_function_response`] maps onto
//! [`ScanError`].

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::steps::error::{Result, ScanError, WmsError};
use crate::wms::graphql::{GraphqlBackend, GraphqlOperation};

/// Map a backend function response onto success or a [`ScanError`].
///
/// `status == "ERROR"` is a function failure. `status == "OK"` with
/// `output.status == "KO"` is a business rejection carrying a code.
pub fn classify_function_response(response: &Value) -> std::result::Result<Value, ScanError> {
    let status = response.get("status").and_then(Value::as_str);
    let output = response.get("output");

    match status {
        Some("OK") => {
            let output = output.cloned().unwrap_or(Value::Null);
            if output.get("status").and_then(Value::as_str) == Some("KO") {
                let code = output
                    .pointer("/output/code")
                    .or_else(|| output.get("code"))
                    .and_then(Value::as_str)
                    .unwrap_or("UNKNOWN")
                    .to_string();
                let detail = output
                    .pointer("/output/message")
                    .or_else(|| output.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                return Err(ScanError::Rejected { code, detail });
            }
            match output.get("output") {
                Some(inner) => Ok(inner.clone()),
                None => Ok(output),
            }
        }
        Some("ERROR") => Err(ScanError::Function(describe(output))),
        other => Err(ScanError::Function(format!(
            "unexpected function status {:?}",
            other
        ))),
    }
}

fn describe(output: Option<&Value>) -> String {
    match output {
        Some(Value::String(s)) => s.clone(),
        Some(v) => v
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| v.to_string()),
        None => "function failed".to_string(),
    }
}

/// Resolves a scanned value into candidate items
#[async_trait]
pub trait Lookup: Send + Sync {
    async fn lookup(&self, scanned: &str, token: Option<&str>) -> Result<Vec<Value>>;
}

/// Lookup backed by a GraphQL query
pub struct GraphqlLookup {
    backend: Arc<dyn GraphqlBackend>,
    query: String,
    /// Variable receiving the scanned value
    variable: String,
    /// Dotted path of the result list inside `data`
    path: String,
}

impl GraphqlLookup {
    pub fn new(
        backend: Arc<dyn GraphqlBackend>,
        query: impl Into<String>,
        variable: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            query: query.into(),
            variable: variable.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl Lookup for GraphqlLookup {
    async fn lookup(&self, scanned: &str, token: Option<&str>) -> Result<Vec<Value>> {
        let operation = GraphqlOperation::new(self.query.clone())
            .with_variable(self.variable.clone(), Value::String(scanned.to_string()));
        let data = self.backend.execute(&operation, token).await?;

        let found = self
            .path
            .split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(&data, |value, segment| value.get(segment));

        Ok(match found {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(item) => vec![item.clone()],
        })
    }
}

/// Validates scanned input against a lookup
#[derive(Clone)]
pub struct ScanCheck {
    lookup: Arc<dyn Lookup>,
}

impl ScanCheck {
    pub fn new(lookup: Arc<dyn Lookup>) -> Self {
        Self { lookup }
    }

    /// Resolve `scanned` and keep the candidates accepted by `filter`.
    ///
    /// Never returns an empty list: no match is `UnexpectedItem`.
    pub async fn check<F>(
        &self,
        scanned: &str,
        token: Option<&str>,
        filter: F,
    ) -> std::result::Result<Vec<Value>, ScanError>
    where
        F: Fn(&Value) -> bool,
    {
        let scanned = scanned.trim();
        if scanned.is_empty() {
            return Err(ScanError::EmptyInput);
        }

        let candidates = match self.lookup.lookup(scanned, token).await {
            Ok(candidates) => candidates,
            Err(WmsError::Scan(e)) => return Err(e),
            Err(e) => return Err(ScanError::Transport(e.to_string())),
        };

        let matches: Vec<Value> = candidates.into_iter().filter(|c| filter(c)).collect();
        if matches.is_empty() {
            log::debug!("Scan '{}' matched nothing", scanned);
            return Err(ScanError::UnexpectedItem(scanned.to_string()));
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::error::BackendError;
    use serde_json::json;

    struct FixedLookup(Result<Vec<Value>>);

    #[async_trait]
    impl Lookup for FixedLookup {
        async fn lookup(&self, _scanned: &str, _token: Option<&str>) -> Result<Vec<Value>> {
            match &self.0 {
                Ok(items) => Ok(items.clone()),
                Err(e) => Err(BackendError::Graphql(e.to_string()).into()),
            }
        }
    }

    fn check_with(items: Result<Vec<Value>>) -> ScanCheck {
        ScanCheck::new(Arc::new(FixedLookup(items)))
    }

    #[test]
    fn test_classify_success_unwraps_inner_output() {
        let response = json!({"status": "OK", "output": {"status": "OK", "output": {"id": "hu-1"}}});
        assert_eq!(classify_function_response(&response), Ok(json!({"id": "hu-1"})));

        let response = json!({"status": "OK", "output": {"id": "hu-2"}});
        assert_eq!(classify_function_response(&response), Ok(json!({"id": "hu-2"})));
    }

    #[test]
    fn test_classify_rejection_carries_code() {
        let response = json!({
            "status": "OK",
            "output": {"status": "KO", "output": {"code": "FAPI_000002", "message": "Location is blocked"}}
        });
        assert_eq!(
            classify_function_response(&response),
            Err(ScanError::Rejected {
                code: "FAPI_000002".to_string(),
                detail: Some("Location is blocked".to_string()),
            })
        );

        let response = json!({"status": "OK", "output": {"status": "KO"}});
        assert!(matches!(
            classify_function_response(&response),
            Err(ScanError::Rejected { code, detail: None }) if code == "UNKNOWN"
        ));
    }

    #[test]
    fn test_classify_function_error() {
        let response = json!({"status": "ERROR", "output": "stack overflow"});
        assert_eq!(
            classify_function_response(&response),
            Err(ScanError::Function("stack overflow".to_string()))
        );
        assert!(matches!(
            classify_function_response(&json!({})),
            Err(ScanError::Function(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let check = check_with(Ok(vec![json!({"id": 1})]));
        assert_eq!(check.check("   ", None, |_| true).await, Err(ScanError::EmptyInput));
    }

    #[tokio::test]
    async fn test_filter_and_unexpected_item() {
        let check = check_with(Ok(vec![
            json!({"id": "a-1", "status": 110}),
            json!({"id": "a-2", "status": 200}),
        ]));

        let matches = check
            .check(" 3760001 ", None, |c| c["status"] == 110)
            .await
            .unwrap();
        assert_eq!(matches, vec![json!({"id": "a-1", "status": 110})]);

        let err = check.check("3760001", None, |c| c["status"] == 999).await;
        assert_eq!(err, Err(ScanError::UnexpectedItem("3760001".to_string())));
    }

    #[tokio::test]
    async fn test_backend_failure_is_transport_error() {
        let check = check_with(Err(WmsError::config("down")));
        assert!(matches!(
            check.check("x", None, |_| true).await,
            Err(ScanError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_graphql_lookup_extracts_path() {
        struct Articles;

        #[async_trait]
        impl GraphqlBackend for Articles {
            async fn execute(&self, op: &GraphqlOperation, _token: Option<&str>) -> Result<Value> {
                let barcode = op.variables["barcode"].clone();
                Ok(json!({"articleLuBarcodes": {"results": [{"barcode": barcode}]}}))
            }
        }

        let lookup = GraphqlLookup::new(
            Arc::new(Articles),
            "query ($barcode: String!) { articleLuBarcodes(filters: {barcode: $barcode}) { results { barcode } } }",
            "barcode",
            "articleLuBarcodes.results",
        );
        let items = lookup.lookup("3760001", None).await.unwrap();
        assert_eq!(items, vec![json!({"barcode": "3760001"})]);

        let missing = GraphqlLookup::new(Arc::new(Articles), "q", "barcode", "nothing.here");
        assert!(missing.lookup("x", None).await.unwrap().is_empty());
    }
}
