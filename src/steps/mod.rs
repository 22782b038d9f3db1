// SPDX-License-Identifier: MIT

pub mod error;
pub mod state;
pub mod storage;

pub use error::{BackendError, Result, ScanError, StoreError, WmsError};
pub use state::{StepRecord, StepWorkflowStore, WorkflowState};
pub use storage::{FileStorage, MemoryStorage, Storage};
