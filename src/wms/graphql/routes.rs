// SPDX-License-Identifier: MIT

//! Forward routes
//!
//! A forward route is a named, server-side list of GraphQL operations. The
//! JSON body posted to the route is merged into every operation's variables,
//! and the operations run in order, optionally inside one backend transaction.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::client::{GraphqlBackend, GraphqlOperation};
use super::transaction::run_in_transaction;
use crate::steps::error::{BackendError, Result, WmsError};

/// One named operation of a route
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RouteOperation {
    pub name: String,
    pub query: String,
    /// Default variables, overridden by the request body
    #[serde(default)]
    pub variables: Map<String, Value>,
}

/// A named list of operations exposed as `POST /api/routes/{name}`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ForwardRoute {
    pub name: String,
    #[serde(default)]
    pub transactional: bool,
    pub operations: Vec<RouteOperation>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct RoutesFile {
    #[serde(default)]
    pub routes: Vec<ForwardRoute>,
}

impl ForwardRoute {
    fn validate(&self) -> Result<()> {
        if self.operations.is_empty() {
            return Err(WmsError::config(format!(
                "route '{}' has no operations",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for op in &self.operations {
            if !seen.insert(op.name.as_str()) {
                return Err(WmsError::config(format!(
                    "route '{}' declares operation '{}' twice",
                    self.name, op.name
                )));
            }
        }
        Ok(())
    }

    /// Operations with the request body merged over the default variables
    fn bind(&self, body: &Value) -> Result<Vec<(String, GraphqlOperation)>> {
        let overrides = match body {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            _ => {
                return Err(BackendError::InvalidRequest(
                    "request body must be a JSON object".to_string(),
                )
                .into())
            }
        };

        Ok(self
            .operations
            .iter()
            .map(|op| {
                let mut variables = op.variables.clone();
                variables.extend(overrides.clone());
                (
                    op.name.clone(),
                    GraphqlOperation {
                        query: op.query.clone(),
                        variables,
                    },
                )
            })
            .collect())
    }
}

/// Loads forward routes from YAML files
pub struct RouteLoader;

impl RouteLoader {
    pub fn load_routes<P: AsRef<Path>>(path: P) -> Result<Vec<ForwardRoute>> {
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    pub fn parse_yaml(content: &str) -> Result<Vec<ForwardRoute>> {
        let file: RoutesFile = serde_yaml::from_str(content)?;
        let mut names = HashSet::new();
        for route in &file.routes {
            route.validate()?;
            if !names.insert(route.name.as_str()) {
                return Err(WmsError::config(format!(
                    "route '{}' is declared twice",
                    route.name
                )));
            }
        }
        Ok(file.routes)
    }
}

/// Forwards requests to the GraphQL backend on behalf of callers
pub struct Forwarder {
    backend: Arc<dyn GraphqlBackend>,
    routes: HashMap<String, ForwardRoute>,
}

impl Forwarder {
    pub fn new(backend: Arc<dyn GraphqlBackend>, routes: Vec<ForwardRoute>) -> Self {
        let routes = routes.into_iter().map(|r| (r.name.clone(), r)).collect();
        Self { backend, routes }
    }

    pub fn backend(&self) -> Arc<dyn GraphqlBackend> {
        self.backend.clone()
    }

    pub fn has_route(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    /// Configured route names, sorted
    pub fn route_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.routes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run a single operation as-is
    pub async fn passthrough(&self, operation: &GraphqlOperation, token: Option<&str>) -> Result<Value> {
        self.backend.execute(operation, token).await
    }

    /// Run route `name` with `body` as variables.
    ///
    /// Returns an object mapping each operation name to its `data`.
    pub async fn forward(&self, name: &str, body: &Value, token: Option<&str>) -> Result<Value> {
        let route = self
            .routes
            .get(name)
            .ok_or_else(|| BackendError::RouteNotFound(name.to_string()))?;
        let operations = route.bind(body)?;

        let results = if route.transactional {
            run_in_transaction(self.backend.clone(), token, &operations).await?
        } else {
            let mut results = Map::new();
            for (op_name, operation) in &operations {
                let data = self.backend.execute(operation, token).await?;
                results.insert(op_name.clone(), data);
            }
            results
        };

        log::info!(
            "Forwarded route '{}' ({} operation(s), transactional: {})",
            name,
            operations.len(),
            route.transactional
        );
        Ok(Value::Object(results))
    }
}
