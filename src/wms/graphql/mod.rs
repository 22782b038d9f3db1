// SPDX-License-Identifier: MIT

//! GraphQL backend access
//!
//! This module provides:
//! - `GraphqlBackend` / `HttpGraphqlClient` - run one operation with the caller's token
//! - `Transaction` - group mutations under a backend transaction id
//! - `Forwarder` - named server-side routes of operations

pub mod client;
pub mod routes;
pub mod transaction;

pub use client::{parse_response, GraphqlBackend, GraphqlOperation, HttpGraphqlClient};
pub use routes::{ForwardRoute, Forwarder, RouteLoader, RouteOperation};
pub use transaction::{run_in_transaction, Transaction};
