// SPDX-License-Identifier: MIT

//! Step workflow state
//!
//! This module provides:
//! - `WorkflowState` / `StepRecord` - the persisted shape of one process
//! - `StepWorkflowStore` - transitions over that shape, committed to a `Storage`

mod record;
mod store;

pub use record::{StepRecord, WorkflowState, NO_PREVIOUS_STEP};
pub use store::StepWorkflowStore;
