// SPDX-License-Identifier: MIT

//! Plan-driven step driver
//!
//! Interprets a [`StepPlan`] against the [`StepWorkflowStore`]: the state of a
//! process is "the first plan step whose data is absent", a step may only be
//! submitted when every earlier plan step is complete, and submitting a step
//! claims the next one.

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use super::payload::StepPayload;
use super::types::StepPlan;
use crate::steps::error::{Result, ScanError, StoreError};
use crate::steps::state::{StepWorkflowStore, WorkflowState};

/// Result of offering lookup candidates to a step
#[derive(Debug, Clone, PartialEq)]
pub enum Offer {
    /// The step was completed without user interaction
    Submitted(WorkflowState),
    /// The operator has to pick one of these
    Choose(Vec<Value>),
}

/// Drives one process through its plan
#[derive(Clone)]
pub struct StepDriver {
    store: StepWorkflowStore,
    plan: Arc<StepPlan>,
}

impl StepDriver {
    /// Create a driver; the plan is validated first
    pub fn new(store: StepWorkflowStore, plan: Arc<StepPlan>) -> Result<Self> {
        plan.validate()?;
        Ok(Self { store, plan })
    }

    pub fn process(&self) -> &str {
        &self.plan.process
    }

    pub fn plan(&self) -> &StepPlan {
        &self.plan
    }

    /// Current persisted state
    pub fn state(&self) -> Result<WorkflowState> {
        self.store.load(self.process())
    }

    /// Enter the first plan step, or resume an existing process
    pub fn start(&self) -> Result<WorkflowState> {
        let first = self.plan.first_step().ok_or_else(|| StoreError::InvalidPlan {
            plan: self.plan.process.clone(),
            reason: "plan has no steps".to_string(),
        })?;
        let state = self.store.initialize(self.process(), first)?;
        self.resume(state)
    }

    /// Claim the pending step when the current one is complete but the
    /// claim of its successor never landed.
    fn resume(&self, state: WorkflowState) -> Result<WorkflowState> {
        let (current, pending) = match (state.current_step, self.pending_step(&state)) {
            (Some(current), Some(pending)) if pending > current => (current, pending),
            _ => return Ok(state),
        };
        if !state.is_complete(current) {
            return Ok(state);
        }
        log::info!(
            "[{}] resuming at step {} after completed step {}",
            self.process(),
            pending,
            current
        );
        self.store.advance(self.process(), &state, pending, None)
    }

    /// First plan step whose data is absent; `None` once all are complete
    pub fn pending_step(&self, state: &WorkflowState) -> Option<u32> {
        self.plan
            .steps
            .iter()
            .map(|s| s.number)
            .find(|&n| !state.is_complete(n))
    }

    /// True once every plan step carries data
    pub fn is_finished(&self, state: &WorkflowState) -> bool {
        self.pending_step(state).is_none()
    }

    /// Complete `step` with `data` and claim the next plan step.
    ///
    /// `step` must be both the current step and the pending one. A state
    /// left with a completed current step and no claimed successor is
    /// resumed first.
    pub fn submit(&self, step: u32, data: Value) -> Result<WorkflowState> {
        let process = self.process();
        let state = self.state()?;
        if state.is_empty() {
            return Err(StoreError::NotInitialized(process.to_string()).into());
        }
        let state = self.resume(state)?;
        if !self.plan.contains(step) {
            return Err(StoreError::invalid_transition(
                process,
                format!("step {} is not part of the plan", step),
            )
            .into());
        }
        if state.current_step != Some(step) || self.pending_step(&state) != Some(step) {
            return Err(StoreError::invalid_transition(
                process,
                format!(
                    "step {} cannot be submitted (current {:?}, pending {:?})",
                    step,
                    state.current_step,
                    self.pending_step(&state)
                ),
            )
            .into());
        }

        let state = self.store.complete(process, step, data)?;
        match self.plan.next_after(step) {
            Some(next) => self.store.advance(process, &state, next, None),
            None => Ok(state),
        }
    }

    /// Submit a typed payload at its own step
    pub fn submit_payload<P: StepPayload>(&self, payload: &P) -> Result<WorkflowState> {
        self.submit(payload.step(), payload.to_value()?)
    }

    /// Offer lookup candidates to `step`.
    ///
    /// A single candidate on an auto-skip step is submitted immediately, so
    /// that step never needs to be shown.
    pub fn offer(&self, step: u32, mut candidates: Vec<Value>) -> Result<Offer> {
        if candidates.is_empty() {
            return Err(ScanError::UnexpectedItem(format!("no candidate for step {}", step)).into());
        }

        let auto_skip = self.plan.get(step).is_some_and(|s| s.auto_skip);
        if auto_skip && candidates.len() == 1 {
            log::info!("[{}] auto-submitting step {}", self.process(), step);
            let state = self.submit(step, candidates.remove(0))?;
            return Ok(Offer::Submitted(state));
        }
        Ok(Offer::Choose(candidates))
    }

    /// Rewind from `step` to its predecessor
    pub fn back(&self, step: u32) -> Result<WorkflowState> {
        let state = self.state()?;
        self.store.back(self.process(), &state, step)
    }

    /// Run the terminal validation and drop the process state on success.
    ///
    /// The state is kept when validation fails so the operator can retry.
    pub async fn finish<F, Fut, T>(&self, validate: F) -> Result<T>
    where
        F: FnOnce(WorkflowState) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let state = self.state()?;
        if !self.is_finished(&state) {
            return Err(StoreError::invalid_transition(
                self.process(),
                format!("step {:?} is still pending", self.pending_step(&state)),
            )
            .into());
        }

        let output = validate(state).await?;
        self.store.reset(self.process())?;
        log::info!("[{}] validated and closed", self.process());
        Ok(output)
    }

    /// Drop the process state ("back to origin")
    pub fn reset(&self) -> Result<()> {
        self.store.reset(self.process())
    }
}
