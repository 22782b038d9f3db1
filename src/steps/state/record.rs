// SPDX-License-Identifier: MIT

//! Persisted shape of a step workflow

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// `previousStep` value of the first step of a process.
pub const NO_PREVIOUS_STEP: u32 = 0;

/// Step-keyed state of one process
///
/// Serialises to `{"currentStep": 20, "steps": {"10": {...}, "20": {...}}}`;
/// an uninitialized process serialises to `{}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    /// Active step, set by transitions only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<u32>,
    /// Every step visited in this process instance
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub steps: BTreeMap<u32, StepRecord>,
}

/// Stored object for a single step
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    /// Step that was active when this one was entered
    pub previous_step: u32,
    /// Completion payload. `null` deserialises as absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl StepRecord {
    pub fn new(previous_step: u32) -> Self {
        Self {
            previous_step,
            data: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.data.is_some()
    }
}

impl WorkflowState {
    /// True for a process that has never been initialized
    pub fn is_empty(&self) -> bool {
        self.current_step.is_none() && self.steps.is_empty()
    }

    pub fn step(&self, step: u32) -> Option<&StepRecord> {
        self.steps.get(&step)
    }

    /// Completion payload of a step, if the step completed
    pub fn data(&self, step: u32) -> Option<&Value> {
        self.steps.get(&step).and_then(|r| r.data.as_ref())
    }

    pub fn is_complete(&self, step: u32) -> bool {
        self.data(step).is_some()
    }

    /// Visited step numbers in ascending order
    pub fn step_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.steps.keys().copied()
    }

    /// Drops `data` of every visited step in `from..=to`, keeping the records.
    /// Returns the steps that were cleared.
    pub(crate) fn clear_data_between(&mut self, from: u32, to: u32) -> Vec<u32> {
        if from > to {
            return vec![];
        }
        self.steps
            .range_mut(from..=to)
            .filter_map(|(step, record)| record.data.take().map(|_| *step))
            .collect()
    }

    /// Get a nested value of a step payload using dot notation
    /// (e.g. `10.article.id`)
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let step: u32 = parts.next()?.parse().ok()?;
        let mut current = self.data(step)?;
        for part in parts {
            current = match current {
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                other => other.get(part)?,
            };
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_state_serialises_as_empty_object() {
        let state = WorkflowState::default();
        assert!(state.is_empty());
        assert_eq!(serde_json::to_string(&state).unwrap(), "{}");

        let parsed: WorkflowState = serde_json::from_str("{}").unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_layout_uses_camel_case_and_string_keys() {
        let mut state = WorkflowState {
            current_step: Some(20),
            ..Default::default()
        };
        state.steps.insert(10, StepRecord::new(0));
        state.steps.insert(20, StepRecord::new(10));
        state.steps.get_mut(&10).unwrap().data = Some(json!({"barcode": "X"}));

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value,
            json!({
                "currentStep": 20,
                "steps": {
                    "10": {"previousStep": 0, "data": {"barcode": "X"}},
                    "20": {"previousStep": 10}
                }
            })
        );
    }

    #[test]
    fn test_parses_browser_written_blob() {
        let blob = r#"{"currentStep":25,"steps":{"10":{"previousStep":0,"data":{"a":1}},"25":{"previousStep":10,"data":null}}}"#;
        let state: WorkflowState = serde_json::from_str(blob).unwrap();

        assert_eq!(state.current_step, Some(25));
        assert!(state.is_complete(10));
        // null data counts as absent
        assert!(!state.is_complete(25));
        assert_eq!(state.step(25).unwrap().previous_step, 10);
    }

    #[test]
    fn test_clear_data_between_keeps_records() {
        let mut state = WorkflowState::default();
        for (step, prev) in [(10, 0), (20, 10), (25, 20), (30, 25)] {
            let mut record = StepRecord::new(prev);
            record.data = Some(json!(step));
            state.steps.insert(step, record);
        }

        let cleared = state.clear_data_between(20, 25);
        assert_eq!(cleared, vec![20, 25]);
        assert!(state.is_complete(10));
        assert!(!state.is_complete(20));
        assert!(!state.is_complete(25));
        assert!(state.is_complete(30));
        assert_eq!(state.step(25).unwrap().previous_step, 20);
    }

    #[test]
    fn test_get_path() {
        let mut state = WorkflowState::default();
        let mut record = StepRecord::new(0);
        record.data = Some(json!({"article": {"id": "a-1", "lus": [{"q": 3}]}}));
        state.steps.insert(10, record);

        assert_eq!(state.get_path("10.article.id"), Some(&json!("a-1")));
        assert_eq!(state.get_path("10.article.lus.0.q"), Some(&json!(3)));
        assert_eq!(state.get_path("10.missing"), None);
        assert_eq!(state.get_path("20.article"), None);
        assert_eq!(state.get_path("x.article"), None);
    }
}
