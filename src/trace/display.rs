//! Human-readable rendering of update records and state diffs.
//!
//! Leading wildcard path components only mean "no specific index" and are
//! dropped here; the records themselves keep them.

use std::collections::BTreeSet;

use super::{PathSegment, UpdateRecord};
use crate::ast::AssignOp;
use crate::runtime::bindings::FEEDBACK_BINDING;
use crate::runtime::value::{Unit, Value, Weight};
use crate::runtime::{Evaluation, ProgramState};

/// Label shown for the one-rep-max feedback binding.
pub const FEEDBACK_LABEL: &str = "1 RM";

/// `name` or `name[2:*]`, without leading wildcards.
pub fn display_key(update: &UpdateRecord) -> String {
    let path: Vec<String> = update
        .target
        .iter()
        .skip_while(|segment| **segment == PathSegment::Wildcard)
        .map(|segment| segment.to_string())
        .collect();
    if path.is_empty() {
        update.variable.clone()
    } else {
        format!("{}[{}]", update.variable, path.join(":"))
    }
}

/// `+= 5lb` for compound writes, the stored value for plain ones.
pub fn display_change(update: &UpdateRecord) -> String {
    match update.op {
        AssignOp::Assign => update.operand.to_string(),
        op => format!("{} {}", op, update.operand),
    }
}

/// One line per record: `weights[2]: += 5lb`.
pub fn render_update(update: &UpdateRecord) -> String {
    format!("{}: {}", display_key(update), display_change(update))
}

pub fn render_updates(updates: &[UpdateRecord]) -> Vec<String> {
    updates.iter().map(render_update).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub name: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

impl StateChange {
    /// `200lb -> 205lb`, weights shown in `units` when given.
    pub fn render(&self, units: Option<Unit>) -> String {
        let show = |v: &Option<Value>| match v {
            Some(value) => convert_for_display(value, units).to_string(),
            None => "-".to_string(),
        };
        format!("{}: {} -> {}", self.name, show(&self.old), show(&self.new))
    }
}

/// Variables whose value differs between `old` and `new`, by name.
pub fn diff_state(old: &ProgramState, new: &ProgramState) -> Vec<StateChange> {
    let names: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    names
        .into_iter()
        .filter_map(|name| {
            let (before, after) = (old.get(name), new.get(name));
            let unchanged = match (before, after) {
                (Some(a), Some(b)) => a.same_as(b),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                None
            } else {
                Some(StateChange {
                    name: name.clone(),
                    old: before.cloned(),
                    new: after.cloned(),
                })
            }
        })
        .collect()
}

/// Change of the one-rep-max feedback binding, if the run altered it.
pub fn feedback_change(previous: Option<Weight>, evaluation: &Evaluation) -> Option<StateChange> {
    let new = evaluation.bindings.get(FEEDBACK_BINDING)?;
    let old = previous.map(Value::Weight);
    if old.as_ref().map_or(false, |o| o.same_as(new)) {
        return None;
    }
    Some(StateChange {
        name: FEEDBACK_LABEL.to_string(),
        old,
        new: Some(new.clone()),
    })
}

fn convert_for_display(value: &Value, units: Option<Unit>) -> Value {
    match (value, units) {
        (Value::Weight(w), Some(unit)) => Value::Weight(w.convert_to(unit)),
        (Value::List(items), Some(_)) => {
            Value::List(items.iter().map(|v| convert_for_display(v, units)).collect())
        }
        _ => value.clone(),
    }
}

/// State changes of a run followed by the 1 RM change, weights shown in
/// `units` when given.
pub fn render_changes(
    before: &ProgramState,
    previous_rm1: Option<Weight>,
    evaluation: &Evaluation,
    units: Option<Unit>,
) -> Vec<String> {
    diff_state(before, &evaluation.state)
        .into_iter()
        .chain(feedback_change(previous_rm1, evaluation))
        .map(|change| change.render(units))
        .collect()
}
