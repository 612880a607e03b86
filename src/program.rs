//! Finishing a workout day for a whole program: every exercise script runs
//! live against its entry, then the program-level script decides which day
//! comes next. The result is all or nothing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::runtime::bindings::{Bindings, EvalMode, WorkoutEntry, FEEDBACK_BINDING};
use crate::runtime::stdlib::FunctionLibrary;
use crate::runtime::value::{Value, Weight};
use crate::runtime::{evaluate, EvalError, Evaluation, ProgramState};
use crate::script::{CompileError, ScriptCache};
use crate::simulate::{simulate, SimulationOutcome};

/// Program-state variable holding the day to run next. Only the program
/// script sees it.
pub const NEXT_DAY_VARIABLE: &str = "nextDay";

const PROGRAM_SCOPE: &str = "program";

#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("{scope}: {source}")]
    Compile { scope: String, source: CompileError },
    #[error("{scope}: {source}")]
    Eval { scope: String, source: EvalError },
    #[error("Unknown exercise '{0}'")]
    UnknownExercise(String),
    #[error("nextDay must be a whole number between 1 and {days}, got {value}")]
    InvalidNextDay { days: u32, value: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramExercise {
    pub id: String,
    #[serde(default)]
    pub state: ProgramState,
    #[serde(default)]
    pub finish_day_script: String,
    /// Last one-rep-max feedback, used when an entry carries none.
    #[serde(default)]
    pub rm1: Option<Weight>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    pub days: u32,
    #[serde(default = "first_day")]
    pub next_day: u32,
    #[serde(default)]
    pub state: ProgramState,
    #[serde(default)]
    pub finish_day_script: String,
    #[serde(default)]
    pub exercises: Vec<ProgramExercise>,
}

fn first_day() -> u32 {
    1
}

/// Replacement program plus every evaluation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedDay {
    pub program: Program,
    pub exercises: BTreeMap<String, Evaluation>,
    pub program_evaluation: Evaluation,
}

impl Program {
    pub fn exercise(&self, id: &str) -> Option<&ProgramExercise> {
        self.exercises.iter().find(|e| e.id == id)
    }

    /// Day that follows `next_day`, wrapping back to 1.
    pub fn following_day(&self) -> u32 {
        self.next_day % self.days.max(1) + 1
    }

    pub fn finish_day(
        &self,
        entries: &BTreeMap<String, WorkoutEntry>,
        cache: &mut ScriptCache,
        functions: &FunctionLibrary,
    ) -> Result<FinishedDay, ProgramError> {
        let mut program = self.clone();
        let mut evaluations = BTreeMap::new();

        for exercise in &mut program.exercises {
            let Some(entry) = entries.get(&exercise.id) else {
                continue;
            };
            let scope = || exercise.id.clone();
            let script = cache
                .get_or_compile(&exercise.finish_day_script)
                .map_err(|source| ProgramError::Compile { scope: scope(), source })?;
            let bindings = exercise_bindings(entry, exercise.rm1);
            let evaluation = evaluate(&script, &exercise.state, &bindings, functions, EvalMode::Live)
                .map_err(|source| ProgramError::Eval { scope: scope(), source })?;

            exercise.state = evaluation.state.clone();
            if let Some(rm1) = feedback_weight(&evaluation, functions) {
                exercise.rm1 = Some(rm1);
            }
            evaluations.insert(exercise.id.clone(), evaluation);
        }

        let script = cache
            .get_or_compile(&self.finish_day_script)
            .map_err(|source| ProgramError::Compile {
                scope: PROGRAM_SCOPE.to_string(),
                source,
            })?;
        // A `nextDay` already in program state wins over the computed one.
        let mut state = self.state.clone();
        state
            .entry(NEXT_DAY_VARIABLE.to_string())
            .or_insert(Value::Number(self.following_day() as f64));
        let bindings = Bindings::new()
            .with("day", Value::Number(self.next_day as f64))
            .with("numberOfDays", Value::Number(self.days as f64));
        let mut program_evaluation = evaluate(&script, &state, &bindings, functions, EvalMode::Live)
            .map_err(|source| ProgramError::Eval {
                scope: PROGRAM_SCOPE.to_string(),
                source,
            })?;

        let next = program_evaluation
            .state
            .remove(NEXT_DAY_VARIABLE)
            .unwrap_or(Value::Number(self.following_day() as f64));
        program.next_day = day_number(&next, self.days)?;
        program.state = program_evaluation.state.clone();

        info!(
            program = %self.name,
            day = self.next_day,
            next_day = program.next_day,
            exercises = evaluations.len(),
            "finished day"
        );
        Ok(FinishedDay {
            program,
            exercises: evaluations,
            program_evaluation,
        })
    }

    /// Week-by-week preview of one exercise over planned entries. The
    /// program itself is not touched.
    pub fn preview_exercise(
        &self,
        id: &str,
        entries: &[WorkoutEntry],
        cache: &mut ScriptCache,
        functions: &FunctionLibrary,
    ) -> Result<SimulationOutcome, ProgramError> {
        let exercise = self
            .exercise(id)
            .ok_or_else(|| ProgramError::UnknownExercise(id.to_string()))?;
        let script = cache
            .get_or_compile(&exercise.finish_day_script)
            .map_err(|source| ProgramError::Compile {
                scope: id.to_string(),
                source,
            })?;
        let schedule = entries
            .iter()
            .map(|entry| exercise_bindings(entry, exercise.rm1));
        Ok(simulate(&script, &exercise.state, schedule, functions).run_to_end())
    }
}

fn exercise_bindings(entry: &WorkoutEntry, rm1: Option<Weight>) -> Bindings {
    let mut bindings = Bindings::from_entry(entry);
    if entry.rm1.is_none() {
        if let Some(rm1) = rm1 {
            bindings.insert(FEEDBACK_BINDING, Value::Weight(rm1));
        }
    }
    bindings
}

/// Feedback written by the script. Bare numbers are taken in the user's unit.
fn feedback_weight(evaluation: &Evaluation, functions: &FunctionLibrary) -> Option<Weight> {
    match evaluation.bindings.get(FEEDBACK_BINDING)? {
        Value::Weight(w) => Some(*w),
        Value::Number(n) => Some(Weight::new(*n, functions.settings().units)),
        _ => None,
    }
}

fn day_number(value: &Value, days: u32) -> Result<u32, ProgramError> {
    match value {
        Value::Number(n) if n.fract() == 0.0 && *n >= 1.0 && *n <= days.max(1) as f64 => {
            Ok(*n as u32)
        }
        other => Err(ProgramError::InvalidNextDay {
            days,
            value: other.clone(),
        }),
    }
}
