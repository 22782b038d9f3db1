// SPDX-License-Identifier: MIT

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::types::{Process, StepDefinition, StepPlan};

static BUILTIN_PLANS: Lazy<Vec<StepPlan>> = Lazy::new(|| {
    vec![
        StepPlan::new(
            Process::Reception.key(),
            vec![
                StepDefinition::new(10, "scan goods-in"),
                StepDefinition::new(20, "scan article").auto_skip(),
                StepDefinition::new(30, "enter quantity"),
                StepDefinition::new(40, "scan location"),
            ],
        )
        .with_description("Receive goods against a goods-in document"),
        StepPlan::new(
            Process::PickAndPack.key(),
            vec![
                StepDefinition::new(10, "scan location"),
                StepDefinition::new(20, "scan handling unit"),
                StepDefinition::new(30, "scan article").auto_skip(),
                StepDefinition::new(40, "enter quantity"),
                StepDefinition::new(50, "scan final handling unit"),
            ],
        )
        .with_description("Pick articles and pack them into an outbound handling unit"),
        StepPlan::new(
            Process::Load.key(),
            vec![
                StepDefinition::new(10, "scan load"),
                StepDefinition::new(20, "scan handling unit outbound"),
                StepDefinition::new(30, "check load"),
            ],
        )
        .with_description("Load outbound handling units onto a carrier load"),
        StepPlan::new(
            Process::LocationInfo.key(),
            vec![StepDefinition::new(10, "scan location")],
        )
        .with_description("Show the content of a location"),
        StepPlan::new(
            Process::Substitution.key(),
            vec![
                StepDefinition::new(10, "scan article"),
                StepDefinition::new(20, "scan substitute article").auto_skip(),
                StepDefinition::new(30, "enter quantity"),
            ],
        )
        .with_description("Replace an article with a substitute"),
    ]
});

/// Process name -> plan, shared across handlers
#[derive(Clone)]
pub struct PlanRegistry {
    plans: Arc<RwLock<HashMap<String, Arc<StepPlan>>>>,
}

impl PlanRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            plans: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registry pre-filled with the plans of every known process
    pub fn with_builtins() -> Self {
        let plans = BUILTIN_PLANS
            .iter()
            .map(|p| (p.process.clone(), Arc::new(p.clone())))
            .collect();
        Self {
            plans: Arc::new(RwLock::new(plans)),
        }
    }

    /// Register a plan, replacing any plan for the same process
    pub async fn register(&self, plan: StepPlan) {
        let mut plans = self.plans.write().await;
        log::debug!("Registered plan: {}", plan.process);
        plans.insert(plan.process.clone(), Arc::new(plan));
    }

    pub async fn get(&self, process: &str) -> Option<Arc<StepPlan>> {
        let plans = self.plans.read().await;
        plans.get(process).cloned()
    }

    /// Registered process names, sorted
    pub async fn names(&self) -> Vec<String> {
        let plans = self.plans.read().await;
        let mut names: Vec<String> = plans.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for PlanRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
