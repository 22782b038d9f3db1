// SPDX-License-Identifier: MIT

//! Step workflow store
//!
//! All reads and writes of a process's [`WorkflowState`] go through here.
//! Every mutation is a read-modify-write of the whole blob, committed with
//! [`Storage::compare_and_set`] so a writer working from a stale copy gets
//! [`StoreError::Conflict`] instead of silently clobbering newer state.

use serde_json::Value;
use std::sync::Arc;

use super::record::{StepRecord, WorkflowState, NO_PREVIOUS_STEP};
use crate::steps::error::{Result, StoreError};
use crate::steps::storage::Storage;

/// Shared store of per-process workflow states
#[derive(Clone)]
pub struct StepWorkflowStore {
    storage: Arc<dyn Storage>,
}

impl StepWorkflowStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Read the state of `process`. Absent or unreadable storage yields the
    /// empty state; a blob that does not parse is reported as corrupt.
    pub fn load(&self, process: &str) -> Result<WorkflowState> {
        let raw = match self.storage.get(process) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Reading '{}' failed, treating as not started: {}", process, e);
                None
            }
        };
        parse(process, raw.as_deref())
    }

    /// Enter `first_step` if the process has not started yet.
    /// A non-empty state is returned as-is and nothing is written.
    pub fn initialize(&self, process: &str, first_step: u32) -> Result<WorkflowState> {
        if first_step == NO_PREVIOUS_STEP {
            return Err(
                StoreError::invalid_transition(process, "step 0 is reserved").into(),
            );
        }

        let state = self.load(process)?;
        if !state.is_empty() {
            return Ok(state);
        }

        let mut next = WorkflowState {
            current_step: Some(first_step),
            ..Default::default()
        };
        next.steps
            .insert(first_step, StepRecord::new(NO_PREVIOUS_STEP));

        match self.compare_and_swap(process, &state, &next) {
            Ok(()) => {
                log::info!("[{}] initialized at step {}", process, first_step);
                Ok(next)
            }
            // Someone else initialized in between; theirs wins
            Err(crate::WmsError::Store(StoreError::Conflict(_))) => self.load(process),
            Err(e) => Err(e),
        }
    }

    /// Claim `target_step` as the new current step.
    ///
    /// Guarded by `current_step < target_step`; when the guard fails without
    /// `data`, `state` is returned unchanged. When `data` is given the step is
    /// completed right away, including when `target_step` is already the
    /// current step. Data for a step behind the current one is rejected.
    pub fn advance(
        &self,
        process: &str,
        state: &WorkflowState,
        target_step: u32,
        data: Option<Value>,
    ) -> Result<WorkflowState> {
        let current = state
            .current_step
            .ok_or_else(|| StoreError::NotInitialized(process.to_string()))?;
        if let Some(data) = &data {
            check_payload(target_step, data)?;
        }

        if current >= target_step {
            return match data {
                None => {
                    log::debug!(
                        "[{}] advance to {} ignored, current step is {}",
                        process,
                        target_step,
                        current
                    );
                    Ok(state.clone())
                }
                Some(data) if current == target_step => self.complete(process, target_step, data),
                Some(_) => Err(StoreError::invalid_transition(
                    process,
                    format!(
                        "cannot store data for step {} behind current step {}",
                        target_step, current
                    ),
                )
                .into()),
            };
        }

        let mut next = state.clone();
        next.steps.insert(target_step, StepRecord::new(current));
        next.current_step = Some(target_step);
        self.compare_and_swap(process, state, &next)?;
        log::info!("[{}] advanced {} -> {}", process, current, target_step);

        match data {
            Some(data) => self.complete(process, target_step, data),
            None => Ok(next),
        }
    }

    /// Store the payload of the current step (second phase of an advance).
    ///
    /// Fails with `InvalidTransition` when `step` is no longer the current
    /// step, which is how a late response for an abandoned step is dropped.
    /// A `null` payload is a `Payload` error since it reads back as absent.
    pub fn complete(&self, process: &str, step: u32, data: Value) -> Result<WorkflowState> {
        check_payload(step, &data)?;
        let state = self.load(process)?;
        if !state.steps.contains_key(&step) {
            return Err(StoreError::step_not_found(process, step).into());
        }
        if state.current_step != Some(step) {
            return Err(StoreError::invalid_transition(
                process,
                format!(
                    "step {} is not current (current is {:?})",
                    step, state.current_step
                ),
            )
            .into());
        }

        let mut next = state.clone();
        if let Some(record) = next.steps.get_mut(&step) {
            record.data = Some(data);
        }
        self.compare_and_swap(process, &state, &next)?;
        log::info!("[{}] step {} completed", process, step);
        Ok(next)
    }

    /// Rewind from `step` to the step that preceded it.
    ///
    /// Clears `data` of every visited step in `[previousStep, step]` and
    /// moves `current_step` to `previousStep`. Going back from the first step
    /// only clears its data. Repeating the call changes nothing further.
    pub fn back(&self, process: &str, state: &WorkflowState, step: u32) -> Result<WorkflowState> {
        let record = state
            .step(step)
            .ok_or_else(|| StoreError::step_not_found(process, step))?;
        let previous = record.previous_step;

        let mut next = state.clone();
        let cleared = next.clear_data_between(previous, step);
        next.current_step = if previous == NO_PREVIOUS_STEP {
            Some(step)
        } else {
            Some(previous)
        };

        if next == *state {
            return Ok(next);
        }
        self.compare_and_swap(process, state, &next)?;
        log::info!(
            "[{}] back from {} to {:?}, cleared {:?}",
            process,
            step,
            next.current_step,
            cleared
        );
        Ok(next)
    }

    /// Remove the whole state of `process`
    pub fn reset(&self, process: &str) -> Result<()> {
        self.storage.remove(process)?;
        log::info!("[{}] reset", process);
        Ok(())
    }

    /// Remove the state of every process in this store's storage
    pub fn reset_all(&self) -> Result<usize> {
        let keys = self.storage.keys()?;
        for key in &keys {
            self.storage.remove(key)?;
        }
        log::info!("Reset {} process(es)", keys.len());
        Ok(keys.len())
    }

    /// Names of the processes that currently have state
    pub fn processes(&self) -> Result<Vec<String>> {
        self.storage.keys()
    }

    /// Persist `next` only if the stored state still equals `expected`.
    pub fn compare_and_swap(
        &self,
        process: &str,
        expected: &WorkflowState,
        next: &WorkflowState,
    ) -> Result<()> {
        let raw = self.storage.get(process)?;
        let current = parse(process, raw.as_deref())?;
        if current != *expected {
            return Err(StoreError::Conflict(process.to_string()).into());
        }

        let serialized = serde_json::to_string(next)?;
        if !self
            .storage
            .compare_and_set(process, raw.as_deref(), &serialized)?
        {
            return Err(StoreError::Conflict(process.to_string()).into());
        }
        Ok(())
    }
}

fn check_payload(step: u32, data: &Value) -> std::result::Result<(), StoreError> {
    if data.is_null() {
        return Err(StoreError::Payload {
            step,
            reason: "payload is null".to_string(),
        });
    }
    Ok(())
}

fn parse(process: &str, raw: Option<&str>) -> Result<WorkflowState> {
    match raw {
        None => Ok(WorkflowState::default()),
        Some(raw) if raw.trim().is_empty() => Ok(WorkflowState::default()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| StoreError::corrupt(process, e.to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::storage::MemoryStorage;
    use crate::WmsError;
    use serde_json::json;

    fn make_store() -> (StepWorkflowStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (StepWorkflowStore::new(storage.clone()), storage)
    }

    #[test]
    fn test_load_missing_is_empty() {
        let (store, _) = make_store();
        assert!(store.load("reception").unwrap().is_empty());
    }

    #[test]
    fn test_load_corrupt_is_reported() {
        let (store, storage) = make_store();
        storage.set("reception", "{not json").unwrap();

        let err = store.load("reception").unwrap_err();
        assert!(matches!(err, WmsError::Store(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_initialize_on_empty() {
        let (store, storage) = make_store();
        let state = store.initialize("reception", 10).unwrap();

        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({"currentStep": 10, "steps": {"10": {"previousStep": 0}}})
        );
        assert_eq!(store.load("reception").unwrap(), state);
        assert!(storage.get("reception").unwrap().is_some());
    }

    #[test]
    fn test_initialize_is_noop_when_started() {
        let (store, storage) = make_store();
        let blob = r#"{"currentStep":20,"steps":{"10":{"previousStep":0,"data":{"z":1,"a":2}},"20":{"previousStep":10}}}"#;
        storage.set("reception", blob).unwrap();

        let state = store.initialize("reception", 10).unwrap();
        assert_eq!(state.current_step, Some(20));
        // Byte-for-byte untouched
        assert_eq!(storage.get("reception").unwrap().as_deref(), Some(blob));
    }

    #[test]
    fn test_initialize_rejects_step_zero() {
        let (store, _) = make_store();
        assert!(store.initialize("reception", 0).is_err());
    }

    #[test]
    fn test_advance_strictly_increasing_sequence() {
        let (store, _) = make_store();
        let mut state = store.initialize("pickAndPack", 10).unwrap();

        for target in [20, 25, 40, 50] {
            let before = state.current_step.unwrap();
            state = store.advance("pickAndPack", &state, target, None).unwrap();
            assert_eq!(state.current_step, Some(target));
            assert_eq!(state.step(target).unwrap().previous_step, before);
        }
        assert_eq!(store.load("pickAndPack").unwrap(), state);
    }

    #[test]
    fn test_advance_guard_ignores_lower_or_equal_target() {
        let (store, _) = make_store();
        let state = store.initialize("load", 10).unwrap();
        let state = store.advance("load", &state, 30, None).unwrap();

        let same = store.advance("load", &state, 30, None).unwrap();
        assert_eq!(same, state);
        let lower = store.advance("load", &state, 20, None).unwrap();
        assert_eq!(lower, state);
        assert!(lower.step(20).is_none());
    }

    #[test]
    fn test_advance_uninitialized_fails() {
        let (store, _) = make_store();
        let err = store
            .advance("load", &WorkflowState::default(), 10, None)
            .unwrap_err();
        assert!(matches!(err, WmsError::Store(StoreError::NotInitialized(_))));
    }

    #[test]
    fn test_advance_with_data_completes_target() {
        let (store, _) = make_store();
        let state = store.initialize("load", 10).unwrap();
        let state = store
            .advance("load", &state, 20, Some(json!({"loadId": "L1"})))
            .unwrap();

        assert_eq!(state.data(20), Some(&json!({"loadId": "L1"})));
        assert_eq!(store.load("load").unwrap(), state);
    }

    #[test]
    fn test_advance_from_stale_state_conflicts() {
        let (store, _) = make_store();
        let stale = store.initialize("reception", 10).unwrap();
        store.advance("reception", &stale, 20, None).unwrap();

        let err = store.advance("reception", &stale, 30, None).unwrap_err();
        assert!(matches!(err, WmsError::Store(StoreError::Conflict(_))));
    }

    #[test]
    fn test_complete_requires_current_step() {
        let (store, _) = make_store();
        let state = store.initialize("reception", 10).unwrap();
        store.advance("reception", &state, 20, None).unwrap();

        // Late answer for step 10
        let err = store.complete("reception", 10, json!({})).unwrap_err();
        assert!(matches!(
            err,
            WmsError::Store(StoreError::InvalidTransition { .. })
        ));

        let err = store.complete("reception", 99, json!({})).unwrap_err();
        assert!(matches!(
            err,
            WmsError::Store(StoreError::StepNotFound { step: 99, .. })
        ));
    }

    #[test]
    fn test_back_clears_range_and_keeps_records() {
        let (store, _) = make_store();
        let state = store.initialize("pickAndPack", 10).unwrap();
        let state = store.complete("pickAndPack", 10, json!("loc")).unwrap();
        let state = store
            .advance("pickAndPack", &state, 20, Some(json!("hu")))
            .unwrap();
        let state = store
            .advance("pickAndPack", &state, 30, Some(json!("article")))
            .unwrap();

        let state = store.back("pickAndPack", &state, 30).unwrap();
        assert_eq!(state.current_step, Some(20));
        assert!(state.is_complete(10));
        assert!(!state.is_complete(20));
        assert!(!state.is_complete(30));
        assert_eq!(state.step(30).unwrap().previous_step, 20);
        assert_eq!(state.step(20).unwrap().previous_step, 10);
        assert_eq!(store.load("pickAndPack").unwrap(), state);
    }

    #[test]
    fn test_back_twice_does_not_double_decrement() {
        let (store, _) = make_store();
        let state = store.initialize("load", 10).unwrap();
        let state = store.complete("load", 10, json!(1)).unwrap();
        let state = store.advance("load", &state, 20, Some(json!(2))).unwrap();

        let once = store.back("load", &state, 20).unwrap();
        let twice = store.back("load", &once, 20).unwrap();
        assert_eq!(once.current_step, Some(10));
        assert_eq!(twice, once);
    }

    #[test]
    fn test_back_from_first_step_stays_on_it() {
        let (store, _) = make_store();
        let state = store.initialize("load", 10).unwrap();
        let state = store.complete("load", 10, json!(1)).unwrap();

        let state = store.back("load", &state, 10).unwrap();
        assert_eq!(state.current_step, Some(10));
        assert!(!state.is_complete(10));
    }

    #[test]
    fn test_back_unknown_step() {
        let (store, _) = make_store();
        let state = store.initialize("load", 10).unwrap();
        assert!(store.back("load", &state, 40).is_err());
    }

    #[test]
    fn test_reset_and_reset_all() {
        let (store, storage) = make_store();
        store.initialize("reception", 10).unwrap();
        store.initialize("load", 10).unwrap();
        store.initialize("pickAndPack", 10).unwrap();

        store.reset("reception").unwrap();
        assert!(storage.get("reception").unwrap().is_none());
        assert_eq!(store.processes().unwrap(), vec!["load", "pickAndPack"]);

        assert_eq!(store.reset_all().unwrap(), 2);
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_null_payload_is_rejected_without_writing() {
        let (store, storage) = make_store();
        store.initialize("reception", 10).unwrap();
        let before = storage.get("reception").unwrap();

        let err = store.complete("reception", 10, Value::Null).unwrap_err();
        assert!(matches!(
            err,
            WmsError::Store(StoreError::Payload { step: 10, .. })
        ));

        let state = store.load("reception").unwrap();
        let err = store
            .advance("reception", &state, 20, Some(Value::Null))
            .unwrap_err();
        assert!(matches!(
            err,
            WmsError::Store(StoreError::Payload { step: 20, .. })
        ));

        // Nothing claimed, and a later advance is not a conflict
        assert_eq!(storage.get("reception").unwrap(), before);
        let state = store.advance("reception", &state, 20, None).unwrap();
        assert_eq!(state.current_step, Some(20));
    }

    #[test]
    fn test_advance_with_data_on_claimed_step_completes_it() {
        let (store, _) = make_store();
        let state = store.initialize("load", 10).unwrap();
        let state = store.advance("load", &state, 20, None).unwrap();

        let state = store
            .advance("load", &state, 20, Some(json!({"loadId": "L1"})))
            .unwrap();
        assert_eq!(state.current_step, Some(20));
        assert_eq!(state.step(20).unwrap().previous_step, 10);
        assert_eq!(
            store.load("load").unwrap().data(20),
            Some(&json!({"loadId": "L1"}))
        );
    }

    #[test]
    fn test_advance_with_data_behind_current_fails() {
        let (store, _) = make_store();
        let state = store.initialize("load", 10).unwrap();
        let state = store.advance("load", &state, 20, None).unwrap();

        let err = store
            .advance("load", &state, 10, Some(json!({"loadId": "L1"})))
            .unwrap_err();
        assert!(matches!(
            err,
            WmsError::Store(StoreError::InvalidTransition { .. })
        ));
        assert!(store.load("load").unwrap().data(10).is_none());
    }
}
