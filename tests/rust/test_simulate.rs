//! Static simulation tests: state threading, halting, static-mode bindings

use liftscript::runtime::bindings::{Bindings, SetEntry, WorkoutEntry};
use liftscript::runtime::stdlib::FunctionLibrary;
use liftscript::runtime::value::{Value, Weight};
use liftscript::runtime::{ErrorKind, ProgramState};
use liftscript::script::Script;
use liftscript::simulate::simulate;

fn state(pairs: &[(&str, Value)]) -> ProgramState {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn lb(n: f64) -> Value {
    Value::Weight(Weight::lb(n))
}

fn week(n: u32) -> Bindings {
    Bindings::new().with("week", Value::Number(n as f64))
}

fn planned(week: u32, completed: Option<u32>) -> WorkoutEntry {
    WorkoutEntry {
        day: 1,
        week,
        sets: vec![SetEntry { reps: 5, weight: Weight::lb(200.0), completed_reps: completed }; 3],
        rm1: None,
    }
}

// ── Threading ───────────────────────────────────────────────

#[test]
fn n_steps_yield_n_results() {
    let script = Script::compile("weight += 5lb").unwrap();
    let functions = FunctionLibrary::default();
    let schedule: Vec<Bindings> = (1..=4).map(week).collect();
    let results: Vec<_> = simulate(&script, &state(&[("weight", lb(100.0))]), schedule, &functions).collect();
    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.is_ok()));
}

#[test]
fn each_step_starts_from_previous_state() {
    let script = Script::compile("weight += 5lb").unwrap();
    let functions = FunctionLibrary::default();
    let start = state(&[("weight", lb(100.0))]);
    let results: Vec<_> = simulate(&script, &start, (1..=3).map(week), &functions)
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(results[0].state["weight"], lb(105.0));
    assert_eq!(results[1].state["weight"], lb(110.0));
    assert_eq!(results[2].state["weight"], lb(115.0));
    assert_eq!(start["weight"], lb(100.0));
}

#[test]
fn simulation_is_lazy() {
    let script = Script::compile("n += 1").unwrap();
    let functions = FunctionLibrary::default();
    let mut steps = simulate(&script, &ProgramState::new(), (1..).map(week), &functions);
    assert!(steps.next().is_some());
    assert!(steps.next().is_some());
    assert_eq!(steps.state()["n"], Value::Number(2.0));
}

#[test]
fn empty_schedule_yields_nothing() {
    let script = Script::compile("n += 1").unwrap();
    let functions = FunctionLibrary::default();
    assert_eq!(simulate(&script, &ProgramState::new(), Vec::new(), &functions).count(), 0);
}

// ── Halting ─────────────────────────────────────────────────

#[test]
fn failure_halts_sequence() {
    // Week 3 divides by zero.
    let script = Script::compile("x += 1; y = 10 / (3 - week)").unwrap();
    let functions = FunctionLibrary::default();
    let results: Vec<_> = simulate(&script, &ProgramState::new(), (1..=5).map(week), &functions).collect();
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    assert_eq!(results[2].as_ref().unwrap_err().kind, ErrorKind::Arithmetic);
}

#[test]
fn run_to_end_reports_failing_step() {
    let script = Script::compile("x += 1; y = 10 / (3 - week)").unwrap();
    let functions = FunctionLibrary::default();
    let outcome = simulate(&script, &ProgramState::new(), (1..=5).map(week), &functions).run_to_end();
    assert!(!outcome.is_complete());
    assert_eq!(outcome.steps.len(), 2);
    let (index, err) = outcome.failure.as_ref().unwrap();
    assert_eq!(*index, 2);
    assert_eq!(err.kind, ErrorKind::Arithmetic);
    assert_eq!(outcome.final_state().unwrap()["x"], Value::Number(2.0));
}

// ── Static bindings ─────────────────────────────────────────

#[test]
fn simulation_runs_in_static_mode() {
    let script = Script::compile("if (completedAllReps) { weight += 5lb } else { weight -= 10lb }").unwrap();
    let functions = FunctionLibrary::default();
    // The recorded sets were all missed, but previews assume the plan is met.
    let schedule: Vec<Bindings> = (1..=2).map(|w| Bindings::from_entry(&planned(w, Some(0)))).collect();
    let outcome = simulate(&script, &state(&[("weight", lb(200.0))]), schedule, &functions).run_to_end();
    assert!(outcome.is_complete());
    assert_eq!(outcome.final_state().unwrap()["weight"], lb(210.0));
}

#[test]
fn observed_data_without_stand_in_fails_in_preview() {
    let script = Script::compile("last = completedReps[1]").unwrap();
    let functions = FunctionLibrary::default();
    let schedule = vec![Bindings::new().with_observed("completedReps", Value::List(vec![Value::Number(5.0)]))];
    let results: Vec<_> = simulate(&script, &ProgramState::new(), schedule, &functions).collect();
    assert_eq!(results[0].as_ref().unwrap_err().kind, ErrorKind::UndefinedReference);
}

#[test]
fn identical_schedules_give_identical_projections() {
    let script = Script::compile("tm = calculateTrainingMax(weights[1], reps[1])\nweights[*] += 5lb").unwrap();
    let functions = FunctionLibrary::default();
    let start = state(&[("weights", Value::List(vec![lb(200.0), lb(200.0)]))]);
    let schedule = || (1..=3).map(|w| Bindings::from_entry(&planned(w, None)));
    let a = simulate(&script, &start, schedule(), &functions).run_to_end();
    let b = simulate(&script, &start, schedule(), &functions).run_to_end();
    assert_eq!(a, b);
}
