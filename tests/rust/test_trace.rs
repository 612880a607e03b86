//! Update trace tests: record contents, coalescing, display rendering, state diffs

use liftscript::ast::AssignOp;
use liftscript::runtime::bindings::{Bindings, EvalMode};
use liftscript::runtime::stdlib::FunctionLibrary;
use liftscript::runtime::value::{Unit, Value, Weight};
use liftscript::runtime::{evaluate, Evaluation, ProgramState};
use liftscript::script::Script;
use liftscript::trace::display::{
    diff_state, display_key, feedback_change, render_changes, render_update, render_updates, FEEDBACK_LABEL,
};
use liftscript::trace::{coalesce, PathSegment, UpdateRecord};

fn state(pairs: &[(&str, Value)]) -> ProgramState {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn run(source: &str, initial: &ProgramState, bindings: &Bindings) -> Evaluation {
    let script = Script::compile(source).unwrap();
    evaluate(&script, initial, bindings, &FunctionLibrary::default(), EvalMode::Live).unwrap()
}

fn lb(n: f64) -> Value {
    Value::Weight(Weight::lb(n))
}

fn weights(values: &[f64]) -> Value {
    Value::List(values.iter().map(|v| lb(*v)).collect())
}

// ── Records ─────────────────────────────────────────────────

#[test]
fn record_keeps_operator_and_operand() {
    let result = run("weight += 5lb", &state(&[("weight", lb(100.0))]), &Bindings::new());
    let update = &result.updates[0];
    assert_eq!(update.op, AssignOp::Add);
    assert_eq!(update.operand, lb(5.0));
    assert_eq!(update.value, lb(105.0));
    assert!(update.target.is_empty());
    assert_eq!((update.loc.line, update.loc.column), (1, 1));
}

#[test]
fn wildcard_is_kept_in_record() {
    let result = run("weights[*] = 50lb", &state(&[("weights", weights(&[45.0, 45.0]))]), &Bindings::new());
    let update = &result.updates[0];
    assert!(update.has_wildcard());
    assert_eq!(update.target, vec![PathSegment::Wildcard]);
    assert_eq!(update.value, weights(&[50.0, 50.0]));
}

#[test]
fn coalesce_keeps_last_write_per_target() {
    let src = "x = 1\nx = 2\nws[1] = 5lb\nws[2] = 6lb\nws[1] = 7lb";
    let result = run(src, &state(&[("ws", weights(&[0.0, 0.0]))]), &Bindings::new());
    assert_eq!(result.updates.len(), 5);
    let last = coalesce(&result.updates);
    assert_eq!(last.len(), 3);
    let x_key: (String, Vec<PathSegment>) = ("x".to_string(), vec![]);
    let ws_key: (String, Vec<PathSegment>) = ("ws".to_string(), vec![PathSegment::Index(1)]);
    assert_eq!(last[&x_key].value, Value::Number(2.0));
    assert_eq!(last[&ws_key].value, lb(7.0));
}

#[test]
fn records_serialize_with_wildcard_marker() {
    let result = run("ws[2:*] -= 5lb", &state(&[("ws", Value::List(vec![weights(&[1.0]), weights(&[10.0, 20.0])]))]), &Bindings::new());
    let json = serde_json::to_value(&result.updates[0]).unwrap();
    assert_eq!(json["target"], serde_json::json!([2, "*"]));
    assert_eq!(json["op"], serde_json::json!("-="));
    let back: UpdateRecord = serde_json::from_value(json).unwrap();
    assert_eq!(back, result.updates[0]);
}

// ── Display ─────────────────────────────────────────────────

#[test]
fn display_strips_leading_wildcards_only() {
    let src = "ws[*] += 5lb\ngrid[*:2] = 1\ngrid[1:*] = 1";
    let grid = Value::List(vec![
        Value::List(vec![Value::Number(0.0), Value::Number(0.0)]),
        Value::List(vec![Value::Number(0.0), Value::Number(0.0)]),
    ]);
    let result = run(src, &state(&[("ws", weights(&[100.0])), ("grid", grid)]), &Bindings::new());
    assert_eq!(display_key(&result.updates[0]), "ws");
    assert_eq!(display_key(&result.updates[1]), "grid[2]");
    assert_eq!(display_key(&result.updates[2]), "grid[1:*]");
}

#[test]
fn render_compound_and_plain_assignments() {
    let src = "weight += 5lb\nreps = 6";
    let result = run(src, &state(&[("weight", lb(100.0)), ("reps", Value::Number(5.0))]), &Bindings::new());
    assert_eq!(
        render_updates(&result.updates),
        vec!["weight: += 5lb".to_string(), "reps: 6".to_string()]
    );
}

#[test]
fn render_indexed_update() {
    let result = run("ws[2] *= 1.1", &state(&[("ws", weights(&[100.0, 100.0]))]), &Bindings::new());
    assert_eq!(render_update(&result.updates[0]), "ws[2]: *= 1.1");
}

// ── State diff ──────────────────────────────────────────────

#[test]
fn diff_lists_only_changed_variables() {
    let before = state(&[("weight", lb(100.0)), ("reps", Value::Number(5.0))]);
    let result = run("weight += 5lb; reps = 5", &before, &Bindings::new());
    let changes = diff_state(&before, &result.state);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].render(None), "weight: 100lb -> 105lb");
}

#[test]
fn diff_treats_equal_mass_as_unchanged() {
    let before = state(&[("w", Value::Weight(Weight::kg(100.0)))]);
    let after = state(&[("w", Value::Weight(Weight::kg(100.0).convert_to(Unit::Lb)))]);
    assert!(diff_state(&before, &after).is_empty());
}

#[test]
fn diff_shows_new_variables() {
    let before = ProgramState::new();
    let result = run("count += 1", &before, &Bindings::new());
    let changes = diff_state(&before, &result.state);
    assert_eq!(changes[0].render(None), "count: - -> 1");
}

#[test]
fn diff_renders_in_requested_unit() {
    let before = state(&[("w", Value::Weight(Weight::kg(100.0)))]);
    let after = state(&[("w", Value::Weight(Weight::kg(102.5)))]);
    let changes = diff_state(&before, &after);
    assert_eq!(changes[0].render(Some(Unit::Kg)), "w: 100kg -> 102.5kg");
}

#[test]
fn feedback_change_is_labelled() {
    let bindings = Bindings::new().with("rm1", lb(300.0));
    let result = run("rm1 = 315lb", &ProgramState::new(), &bindings);
    let change = feedback_change(Some(Weight::lb(300.0)), &result).unwrap();
    assert_eq!(change.name, FEEDBACK_LABEL);
    assert_eq!(change.render(None), "1 RM: 300lb -> 315lb");
}

#[test]
fn unchanged_feedback_is_not_reported() {
    let bindings = Bindings::new().with("rm1", lb(300.0));
    let result = run("x = rm1", &ProgramState::new(), &bindings);
    assert!(feedback_change(Some(Weight::lb(300.0)), &result).is_none());
}

#[test]
fn changes_render_in_user_units_with_one_rep_max() {
    let before = state(&[("weight", lb(100.0))]);
    let bindings = Bindings::new().with("rm1", lb(300.0));
    let result = run("weight += 5lb\nrm1 = 315lb", &before, &bindings);
    let kg = |n: f64| Weight::lb(n).convert_to(Unit::Kg).to_string();
    assert_eq!(
        render_changes(&before, Some(Weight::lb(300.0)), &result, Some(Unit::Kg)),
        vec![
            format!("weight: {} -> {}", kg(100.0), kg(105.0)),
            format!("1 RM: {} -> {}", kg(300.0), kg(315.0)),
        ]
    );
}

#[test]
fn changes_without_feedback_write_list_state_only() {
    let before = state(&[("weight", lb(100.0))]);
    let result = run("weight += 5lb", &before, &Bindings::new());
    assert_eq!(
        render_changes(&before, None, &result, None),
        vec!["weight: 100lb -> 105lb".to_string()]
    );
}
