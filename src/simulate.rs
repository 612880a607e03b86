//! Static simulation: repeated evaluation over a schedule of hypothetical
//! bindings, threading each step's state into the next. Nothing here is
//! persisted; dropping the iterator abandons the preview.

use tracing::{debug, warn};

use crate::runtime::bindings::{Bindings, EvalMode};
use crate::runtime::stdlib::FunctionLibrary;
use crate::runtime::{evaluate, EvalError, Evaluation, EvaluationResult, ProgramState};
use crate::script::Script;

pub fn simulate<'a, I>(
    script: &'a Script,
    starting_state: &ProgramState,
    schedule: I,
    functions: &'a FunctionLibrary,
) -> Simulation<'a, I::IntoIter>
where
    I: IntoIterator<Item = Bindings>,
{
    Simulation {
        script,
        functions,
        schedule: schedule.into_iter(),
        state: starting_state.clone(),
        step: 0,
        halted: false,
    }
}

/// Lazy sequence of per-step results. Yields at most one `Err`, after
/// which it is exhausted.
pub struct Simulation<'a, I> {
    script: &'a Script,
    functions: &'a FunctionLibrary,
    schedule: I,
    state: ProgramState,
    step: usize,
    halted: bool,
}

impl<'a, I> Simulation<'a, I>
where
    I: Iterator<Item = Bindings>,
{
    /// State the next step would start from.
    pub fn state(&self) -> &ProgramState {
        &self.state
    }

    /// Drain the remaining steps.
    pub fn run_to_end(self) -> SimulationOutcome {
        let mut steps = Vec::new();
        let mut failure = None;
        for (index, result) in self.enumerate() {
            match result {
                Ok(evaluation) => steps.push(evaluation),
                Err(err) => failure = Some((index, err)),
            }
        }
        SimulationOutcome { steps, failure }
    }
}

impl<'a, I> Iterator for Simulation<'a, I>
where
    I: Iterator<Item = Bindings>,
{
    type Item = EvaluationResult;

    fn next(&mut self) -> Option<EvaluationResult> {
        if self.halted {
            return None;
        }
        let bindings = self.schedule.next()?;
        let step = self.step;
        self.step += 1;
        match evaluate(self.script, &self.state, &bindings, self.functions, EvalMode::Static) {
            Ok(evaluation) => {
                debug!(step, updates = evaluation.updates.len(), "simulation step");
                self.state = evaluation.state.clone();
                Some(Ok(evaluation))
            }
            Err(err) => {
                warn!(step, error = %err, "simulation halted");
                self.halted = true;
                Some(Err(err))
            }
        }
    }
}

impl<'a, I> std::iter::FusedIterator for Simulation<'a, I> where I: std::iter::FusedIterator<Item = Bindings> {}

/// Every successful step, plus the failing step's index and error if the
/// run halted early.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    pub steps: Vec<Evaluation>,
    pub failure: Option<(usize, EvalError)>,
}

impl SimulationOutcome {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// State after the last successful step.
    pub fn final_state(&self) -> Option<&ProgramState> {
        self.steps.last().map(|e| &e.state)
    }
}
