//! Read-only values a script can reference, assembled by the caller from a
//! workout entry before each evaluation.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::value::{Value, Weight};

/// The binding scripts may write to; its final value is reported back to
/// the caller as one-rep-max feedback.
pub const FEEDBACK_BINDING: &str = "rm1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalMode {
    /// Finishing a real workout: observed data is visible.
    #[default]
    Live,
    /// Preview: observed data is replaced by hypothetical inputs so that
    /// runs are reproducible.
    Static,
}

impl EvalMode {
    pub fn is_static(&self) -> bool {
        matches!(self, EvalMode::Static)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetEntry {
    /// Planned reps.
    pub reps: u32,
    pub weight: Weight,
    /// Reps actually performed; `None` while the set is not done.
    #[serde(default)]
    pub completed_reps: Option<u32>,
}

impl SetEntry {
    pub fn is_completed(&self) -> bool {
        self.completed_reps.map_or(false, |done| done >= self.reps)
    }
}

/// One exercise of a finished (or planned) workout day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutEntry {
    pub day: u32,
    #[serde(default = "default_week")]
    pub week: u32,
    pub sets: Vec<SetEntry>,
    /// Previously computed one-rep-max estimate.
    #[serde(default)]
    pub rm1: Option<Weight>,
}

fn default_week() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: BTreeMap<String, Value>,
    observed: BTreeSet<String>,
    hypothetical: BTreeMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value that is reproducible (planned sets, day index, ...).
    pub fn insert(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Bind genuinely observed workout data. Static runs never read it.
    pub fn insert_observed(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
        self.observed.insert(name.to_string());
    }

    /// Stand-in for an observed binding, read in static mode only.
    pub fn insert_hypothetical(&mut self, name: &str, value: Value) {
        self.hypothetical.insert(name.to_string(), value);
    }

    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn with_observed(mut self, name: &str, value: Value) -> Self {
        self.insert_observed(name, value);
        self
    }

    pub fn with_hypothetical(mut self, name: &str, value: Value) -> Self {
        self.insert_hypothetical(name, value);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name) || self.hypothetical.contains_key(name)
    }

    pub fn is_observed(&self, name: &str) -> bool {
        self.observed.contains(name)
    }

    /// Resolve `name` under `mode`.
    pub fn get(&self, name: &str, mode: EvalMode) -> Option<&Value> {
        match mode {
            EvalMode::Live => self.values.get(name),
            EvalMode::Static => {
                if let Some(value) = self.hypothetical.get(name) {
                    Some(value)
                } else if self.observed.contains(name) {
                    None
                } else {
                    self.values.get(name)
                }
            }
        }
    }

    /// Build the standard binding set for a workout entry. Completed reps
    /// and weights are observed; their hypothetical stand-ins assume every
    /// set was performed exactly as planned.
    pub fn from_entry(entry: &WorkoutEntry) -> Self {
        let reps: Vec<Value> = entry
            .sets
            .iter()
            .map(|s| Value::Number(s.reps as f64))
            .collect();
        let weights: Vec<Value> = entry.sets.iter().map(|s| Value::Weight(s.weight)).collect();
        let completed_reps: Vec<Value> = entry
            .sets
            .iter()
            .map(|s| Value::Number(s.completed_reps.unwrap_or(0) as f64))
            .collect();
        let completed_weights: Vec<Value> = entry
            .sets
            .iter()
            .map(|s| {
                if s.completed_reps.is_some() {
                    Value::Weight(s.weight)
                } else {
                    Value::Weight(Weight::new(0.0, s.weight.unit))
                }
            })
            .collect();
        let completed_all = !entry.sets.is_empty() && entry.sets.iter().all(SetEntry::is_completed);

        let mut bindings = Bindings::new()
            .with("day", Value::Number(entry.day as f64))
            .with("week", Value::Number(entry.week as f64))
            .with("numberOfSets", Value::Number(entry.sets.len() as f64))
            .with("reps", Value::List(reps.clone()))
            .with("weights", Value::List(weights.clone()))
            .with_observed("completedReps", Value::List(completed_reps))
            .with_observed("completedWeights", Value::List(completed_weights))
            .with_observed("completedAllReps", Value::Bool(completed_all))
            .with_hypothetical("completedReps", Value::List(reps))
            .with_hypothetical("completedWeights", Value::List(weights))
            .with_hypothetical("completedAllReps", Value::Bool(!entry.sets.is_empty()));

        if let Some(rm1) = entry.rm1 {
            bindings.insert(FEEDBACK_BINDING, Value::Weight(rm1));
        }
        bindings
    }
}
