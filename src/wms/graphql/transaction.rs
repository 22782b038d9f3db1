// SPDX-License-Identifier: MIT

//! Backend-side transactions
//!
//! The backend scopes a group of mutations with a transaction id: the id is
//! generated first, passed as the `transactionId` variable of every
//! operation, then committed on success or rolled back on the first failure.

use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::client::{GraphqlBackend, GraphqlOperation};
use crate::steps::error::{BackendError, Result};

const GENERATE_TRANSACTION_ID: &str = "mutation { generateTransactionId }";
const COMMIT_TRANSACTION: &str =
    "mutation commitTransaction($transactionId: String!) { commitTransaction(transactionId: $transactionId) }";
const ROLLBACK_TRANSACTION: &str =
    "mutation rollbackTransaction($transactionId: String!) { rollbackTransaction(transactionId: $transactionId) }";

/// An open backend transaction
pub struct Transaction {
    backend: Arc<dyn GraphqlBackend>,
    token: Option<String>,
    id: String,
}

impl Transaction {
    /// Ask the backend for a new transaction id
    pub async fn begin(backend: Arc<dyn GraphqlBackend>, token: Option<&str>) -> Result<Self> {
        let data = backend
            .execute(&GraphqlOperation::new(GENERATE_TRANSACTION_ID), token)
            .await?;
        let id = data
            .get("generateTransactionId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                BackendError::InvalidResponse("generateTransactionId returned no id".to_string())
            })?
            .to_string();
        log::debug!("Transaction {} opened", id);

        Ok(Self {
            backend,
            token: token.map(str::to_string),
            id,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run one operation inside the transaction
    pub async fn run(&self, operation: &GraphqlOperation) -> Result<Value> {
        let mut operation = operation.clone();
        operation
            .variables
            .insert("transactionId".to_string(), json!(self.id));
        self.backend
            .execute(&operation, self.token.as_deref())
            .await
    }

    pub async fn commit(&self) -> Result<()> {
        self.finish(COMMIT_TRANSACTION).await?;
        log::debug!("Transaction {} committed", self.id);
        Ok(())
    }

    pub async fn rollback(&self) -> Result<()> {
        self.finish(ROLLBACK_TRANSACTION).await?;
        log::info!("Transaction {} rolled back", self.id);
        Ok(())
    }

    async fn finish(&self, document: &str) -> Result<Value> {
        let operation =
            GraphqlOperation::new(document).with_variable("transactionId", json!(self.id));
        self.backend
            .execute(&operation, self.token.as_deref())
            .await
    }
}

/// Run `operations` in order within one transaction.
///
/// Returns the `data` of each operation keyed by name. Any failure, commit
/// included, triggers a rollback and the original error is returned.
pub async fn run_in_transaction(
    backend: Arc<dyn GraphqlBackend>,
    token: Option<&str>,
    operations: &[(String, GraphqlOperation)],
) -> Result<Map<String, Value>> {
    let tx = Transaction::begin(backend.clone(), token).await?;

    let mut results = Map::new();
    let mut failure = None;
    for (name, operation) in operations {
        match tx.run(operation).await {
            Ok(data) => {
                results.insert(name.clone(), data);
            }
            Err(e) => {
                log::warn!("Operation '{}' failed in transaction {}: {}", name, tx.id(), e);
                failure = Some(e);
                break;
            }
        }
    }

    let failure = match failure {
        None => match tx.commit().await {
            Ok(()) => return Ok(results),
            Err(e) => e,
        },
        Some(e) => e,
    };

    if let Err(rollback_err) = tx.rollback().await {
        log::warn!("Rollback of transaction {} failed: {}", tx.id(), rollback_err);
    }
    Err(failure)
}
