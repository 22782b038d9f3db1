// SPDX-License-Identifier: MIT

//! Process names and declarative step plans
//!
//! A plan is the transition table of one process: the ordered list of its
//! sparse step numbers. Numbers are developer-chosen (10, 20, 25, ...) so
//! steps can be inserted later without renumbering.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::steps::error::StoreError;
use crate::steps::state::NO_PREVIOUS_STEP;

/// A named multi-step process. The name doubles as its storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Process {
    PickAndPack,
    Reception,
    Load,
    LocationInfo,
    Substitution,
    /// Process declared in a plans file
    Custom(String),
}

impl Process {
    /// Every process shipped with a built-in plan
    pub const KNOWN: [Process; 5] = [
        Process::PickAndPack,
        Process::Reception,
        Process::Load,
        Process::LocationInfo,
        Process::Substitution,
    ];

    /// Storage key of the process
    pub fn key(&self) -> &str {
        match self {
            Process::PickAndPack => "pickAndPack",
            Process::Reception => "reception",
            Process::Load => "load",
            Process::LocationInfo => "locationInfo",
            Process::Substitution => "substitution",
            Process::Custom(name) => name,
        }
    }
}

impl FromStr for Process {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pickAndPack" => Process::PickAndPack,
            "reception" => Process::Reception,
            "load" => Process::Load,
            "locationInfo" => Process::LocationInfo,
            "substitution" => Process::Substitution,
            other => Process::Custom(other.to_string()),
        })
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One step of a plan
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StepDefinition {
    pub number: u32,
    pub label: String,
    /// Submit automatically when the step's lookup yields a single candidate
    #[serde(default)]
    pub auto_skip: bool,
}

/// Ordered step list of a process
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StepPlan {
    /// Process name (and storage key)
    pub process: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<StepDefinition>,
}

/// Top-level plans file
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PlansFile {
    #[serde(default)]
    pub plans: Vec<StepPlan>,
}

impl StepDefinition {
    pub fn new(number: u32, label: impl Into<String>) -> Self {
        Self {
            number,
            label: label.into(),
            auto_skip: false,
        }
    }

    pub fn auto_skip(mut self) -> Self {
        self.auto_skip = true;
        self
    }
}

impl StepPlan {
    pub fn new(process: impl Into<String>, steps: Vec<StepDefinition>) -> Self {
        Self {
            process: process.into(),
            description: String::new(),
            steps,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Check that the plan has steps, none of them 0, in strictly
    /// increasing order.
    pub fn validate(&self) -> Result<(), StoreError> {
        let invalid = |reason: String| StoreError::InvalidPlan {
            plan: self.process.clone(),
            reason,
        };

        if self.process.is_empty() {
            return Err(invalid("process name is empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(invalid("plan has no steps".to_string()));
        }
        if self.steps[0].number == NO_PREVIOUS_STEP {
            return Err(invalid("step 0 is reserved".to_string()));
        }
        for pair in self.steps.windows(2) {
            if pair[1].number <= pair[0].number {
                return Err(invalid(format!(
                    "step {} must be greater than step {}",
                    pair[1].number, pair[0].number
                )));
            }
        }
        Ok(())
    }

    pub fn first_step(&self) -> Option<u32> {
        self.steps.first().map(|s| s.number)
    }

    pub fn last_step(&self) -> Option<u32> {
        self.steps.last().map(|s| s.number)
    }

    pub fn get(&self, number: u32) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.number == number)
    }

    /// Step that follows `number` in plan order
    pub fn next_after(&self, number: u32) -> Option<u32> {
        self.steps
            .iter()
            .map(|s| s.number)
            .find(|&n| n > number)
    }

    pub fn contains(&self, number: u32) -> bool {
        self.get(number).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(numbers: &[u32]) -> StepPlan {
        StepPlan::new(
            "test",
            numbers
                .iter()
                .map(|n| StepDefinition::new(*n, format!("step {}", n)))
                .collect(),
        )
    }

    #[test]
    fn test_process_roundtrip() {
        for process in Process::KNOWN {
            let parsed: Process = process.key().parse().unwrap();
            assert_eq!(parsed, process);
        }
        let custom: Process = "cycleCount".parse().unwrap();
        assert_eq!(custom, Process::Custom("cycleCount".to_string()));
        assert_eq!(custom.to_string(), "cycleCount");
    }

    #[test]
    fn test_validate_accepts_sparse_numbers() {
        assert!(plan(&[10, 20, 25, 30, 40]).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_plans() {
        assert!(plan(&[]).validate().is_err());
        assert!(plan(&[0, 10]).validate().is_err());
        assert!(plan(&[10, 10]).validate().is_err());
        assert!(plan(&[20, 10]).validate().is_err());
    }

    #[test]
    fn test_navigation_helpers() {
        let p = plan(&[10, 20, 25, 40]);
        assert_eq!(p.first_step(), Some(10));
        assert_eq!(p.last_step(), Some(40));
        assert_eq!(p.next_after(20), Some(25));
        assert_eq!(p.next_after(22), Some(25));
        assert_eq!(p.next_after(40), None);
        assert!(p.contains(25));
        assert!(!p.contains(30));
    }
}
