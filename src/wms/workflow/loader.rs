// SPDX-License-Identifier: MIT

//! Plan loader - YAML file loading and parsing
//!
//! Lets a deployment declare extra processes, or override the built-in plans,
//! without recompiling.

use super::types::{PlansFile, StepPlan};
use crate::steps::error::Result;
use std::fs;
use std::path::Path;

/// Loads step plans from YAML files
pub struct PlanLoader;

impl PlanLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load and validate every plan in a YAML file
    pub fn load_plans<P: AsRef<Path>>(&self, path: P) -> Result<Vec<StepPlan>> {
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Parse and validate plans from a YAML string
    pub fn parse_yaml(content: &str) -> Result<Vec<StepPlan>> {
        let file: PlansFile = serde_yaml::from_str(content)?;
        for plan in &file.plans {
            plan.validate()?;
        }
        Ok(file.plans)
    }
}

impl Default for PlanLoader {
    fn default() -> Self {
        Self::new()
    }
}
