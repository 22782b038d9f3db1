// SPDX-License-Identifier: MIT

pub mod config;
pub mod graphql;
pub mod scan;
pub mod server;
pub mod workflow;
