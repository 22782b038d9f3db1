// SPDX-License-Identifier: MIT

//! Step-based warehouse workflows over a GraphQL backend.
//!
//! - [`steps`] - the step workflow store and its storage seam
//! - [`wms`] - process plans, scan checks, GraphQL forwarding and the HTTP server

pub mod steps;
pub mod wms;

pub use steps::error::{Result, WmsError};
