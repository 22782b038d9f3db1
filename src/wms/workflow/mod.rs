// SPDX-License-Identifier: MIT

pub mod driver;
pub mod loader;
pub mod payload;
pub mod registry;
pub mod types;

pub use driver::{Offer, StepDriver};
pub use loader::PlanLoader;
pub use registry::PlanRegistry;
pub use types::{Process, StepDefinition, StepPlan};
