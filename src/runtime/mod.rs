pub mod bindings;
pub mod stdlib;
pub mod value;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::ast::*;
use crate::script::Script;
use crate::trace::{PathSegment, UpdateRecord};
use bindings::{Bindings, EvalMode, FEEDBACK_BINDING};
use stdlib::FunctionLibrary;
use value::{Value, Weight};

/// Per-exercise (or per-program) variables a script reads and rewrites.
pub type ProgramState = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Syntax,
    UndefinedReference,
    TypeMismatch,
    InvalidFunctionCall,
    Arithmetic,
    Index,
    ReadOnlyBinding,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Syntax => "Syntax Error",
            ErrorKind::UndefinedReference => "Undefined Reference",
            ErrorKind::TypeMismatch => "Type Mismatch",
            ErrorKind::InvalidFunctionCall => "Invalid Function Call",
            ErrorKind::Arithmetic => "Arithmetic Error",
            ErrorKind::Index => "Index Error",
            ErrorKind::ReadOnlyBinding => "Read-only Binding",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}{}: {message}", location_suffix(.loc))]
pub struct EvalError {
    pub kind: ErrorKind,
    pub message: String,
    pub loc: Option<SourceLocation>,
}

fn location_suffix(loc: &Option<SourceLocation>) -> String {
    loc.map(|l| format!(" at {}", l)).unwrap_or_default()
}

impl EvalError {
    pub fn new(kind: ErrorKind, message: String) -> Self {
        Self {
            kind,
            message,
            loc: None,
        }
    }

    /// Attach a location unless a more precise one is already set.
    pub fn at(mut self, loc: SourceLocation) -> Self {
        if self.loc.is_none() {
            self.loc = Some(loc);
        }
        self
    }
}

/// Outcome of a successful run. Nothing is surfaced for a failed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Complete replacement for the input state.
    pub state: ProgramState,
    pub updates: Vec<UpdateRecord>,
    /// Bindings actually read, plus the final feedback binding if written.
    pub bindings: BTreeMap<String, Value>,
}

pub type EvaluationResult = Result<Evaluation, EvalError>;

/// Run `script` against a private copy of `initial_state`.
pub fn evaluate(
    script: &Script,
    initial_state: &ProgramState,
    bindings: &Bindings,
    functions: &FunctionLibrary,
    mode: EvalMode,
) -> EvaluationResult {
    let mut interpreter = Interpreter::new(initial_state.clone(), bindings, functions, mode);
    interpreter.exec_statements(script.statements())?;
    Ok(interpreter.finish())
}

struct Interpreter<'a> {
    state: ProgramState,
    bindings: &'a Bindings,
    functions: &'a FunctionLibrary,
    mode: EvalMode,
    locals: Vec<(String, Value)>,
    updates: Vec<UpdateRecord>,
    used_bindings: BTreeMap<String, Value>,
    feedback: Option<Value>,
}

impl<'a> Interpreter<'a> {
    fn new(
        state: ProgramState,
        bindings: &'a Bindings,
        functions: &'a FunctionLibrary,
        mode: EvalMode,
    ) -> Self {
        Self {
            state,
            bindings,
            functions,
            mode,
            locals: Vec::new(),
            updates: Vec::new(),
            used_bindings: BTreeMap::new(),
            feedback: None,
        }
    }

    fn finish(self) -> Evaluation {
        let mut bindings = self.used_bindings;
        if let Some(feedback) = self.feedback {
            bindings.insert(FEEDBACK_BINDING.to_string(), feedback);
        }
        Evaluation {
            state: self.state,
            updates: self.updates,
            bindings,
        }
    }

    // ── Statement execution ─────────────────────────────────────────────

    fn exec_statements(&mut self, stmts: &[Statement]) -> Result<(), EvalError> {
        for stmt in stmts {
            self.exec_statement(stmt)?;
        }
        Ok(())
    }

    fn exec_statement(&mut self, stmt: &Statement) -> Result<(), EvalError> {
        match stmt {
            Statement::Assignment {
                target, op, value, ..
            } => self.exec_assignment(target, *op, value),
            Statement::If {
                condition,
                then_body,
                else_body,
                ..
            } => {
                let cond = self.eval_expr(condition)?;
                let taken = match cond {
                    Value::Bool(b) => b,
                    other => {
                        return Err(EvalError::new(
                            ErrorKind::TypeMismatch,
                            format!("Condition must be Bool, got {}", other.type_name()),
                        )
                        .at(condition.loc()))
                    }
                };
                if taken {
                    self.exec_statements(then_body)
                } else {
                    self.exec_statements(else_body)
                }
            }
            Statement::For {
                var,
                iterable,
                body,
                loc,
            } => {
                let items = match self.eval_expr(iterable)? {
                    Value::List(items) => items,
                    other => {
                        return Err(EvalError::new(
                            ErrorKind::TypeMismatch,
                            format!("Cannot iterate over {}", other.type_name()),
                        )
                        .at(*loc))
                    }
                };
                for item in items {
                    self.locals.push((var.clone(), item));
                    let result = self.exec_statements(body);
                    self.locals.pop();
                    result?;
                }
                Ok(())
            }
        }
    }

    fn exec_assignment(&mut self, target: &Target, op: AssignOp, value: &Expr) -> Result<(), EvalError> {
        let operand = self.eval_expr(value)?;
        if !operand.is_storable() {
            return Err(EvalError::new(
                ErrorKind::TypeMismatch,
                format!("Cannot store {} in '{}'", operand.type_name(), target.name),
            )
            .at(value.loc()));
        }
        let path = self.resolve_path(target)?;

        let is_feedback = !target.qualified
            && target.name == FEEDBACK_BINDING
            && !self.state.contains_key(FEEDBACK_BINDING);
        if !is_feedback
            && !target.qualified
            && !self.state.contains_key(&target.name)
            && self.bindings.contains(&target.name)
        {
            return Err(EvalError::new(
                ErrorKind::ReadOnlyBinding,
                format!("'{}' is a read-only binding", target.name),
            )
            .at(target.loc));
        }

        let current = if is_feedback {
            self.feedback
                .clone()
                .or_else(|| self.bindings.get(FEEDBACK_BINDING, self.mode).cloned())
        } else {
            self.state.get(&target.name).cloned()
        };

        let updated = match current {
            Some(ref existing) => write_path(existing, &path, op, &operand),
            None if path.is_empty() => apply_op(None, op, &operand),
            None => Err(EvalError::new(
                ErrorKind::UndefinedReference,
                format!("Cannot index undefined variable '{}'", target.name),
            )),
        }
        .map_err(|e| e.at(target.loc))?;
        if !updated.is_finite() {
            return Err(EvalError::new(
                ErrorKind::Arithmetic,
                format!("Cannot store a non-finite number in '{}'", target.name),
            )
            .at(target.loc));
        }

        let stored = read_path(&updated, &path).map_err(|e| e.at(target.loc))?;
        debug!(
            variable = %target.name,
            op = %op,
            value = %stored,
            "assignment"
        );
        self.updates.push(UpdateRecord {
            variable: target.name.clone(),
            target: path,
            op,
            operand,
            value: stored,
            loc: target.loc,
        });

        if is_feedback {
            self.feedback = Some(updated);
        } else {
            self.state.insert(target.name.clone(), updated);
        }
        Ok(())
    }

    fn resolve_path(&mut self, target: &Target) -> Result<Vec<PathSegment>, EvalError> {
        let mut path = Vec::with_capacity(target.path.len());
        for component in &target.path {
            let segment = match component {
                PathComponent::Wildcard => PathSegment::Wildcard,
                PathComponent::Index(expr) => {
                    let index = self.eval_expr(expr)?;
                    PathSegment::Index(to_index(&index).map_err(|e| e.at(expr.loc()))?)
                }
            };
            path.push(segment);
        }
        Ok(path)
    }

    // ── Expression evaluation ───────────────────────────────────────────

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        self.eval_expr_inner(expr).map_err(|e| e.at(expr.loc()))
    }

    fn eval_expr_inner(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Number { value, .. } => Ok(Value::Number(*value)),
            Expr::Weight { value, unit, .. } => Ok(Value::Weight(Weight::new(*value, *unit))),
            Expr::Bool { value, .. } => Ok(Value::Bool(*value)),
            Expr::Str { value, .. } => Ok(Value::Str(value.clone())),
            Expr::Identifier { name, .. } => self.lookup(name),
            Expr::StateVar { name, .. } => self.state.get(name).cloned().ok_or_else(|| {
                EvalError::new(
                    ErrorKind::UndefinedReference,
                    format!("Undefined state variable 'state.{}'", name),
                )
            }),
            Expr::Binary {
                left, op, right, ..
            } => match op {
                // Short-circuit: the right side is not evaluated when the left decides.
                BinaryOp::And | BinaryOp::Or => {
                    let l = self.eval_expr(left)?.as_bool().map_err(|e| e.at(left.loc()))?;
                    if (*op == BinaryOp::And && !l) || (*op == BinaryOp::Or && l) {
                        return Ok(Value::Bool(l));
                    }
                    let r = self.eval_expr(right)?.as_bool().map_err(|e| e.at(right.loc()))?;
                    Ok(Value::Bool(r))
                }
                _ => {
                    let l = self.eval_expr(left)?;
                    let r = self.eval_expr(right)?;
                    l.binary(*op, &r)
                }
            },
            Expr::Unary { op, operand, .. } => {
                let val = self.eval_expr(operand)?;
                match op {
                    UnaryOp::Neg => val.negate(),
                    UnaryOp::Not => Ok(Value::Bool(!val.as_bool()?)),
                }
            }
            Expr::Ternary {
                condition,
                then_value,
                else_value,
                ..
            } => {
                let cond = self.eval_expr(condition)?;
                let taken = cond.as_bool().map_err(|e| e.at(condition.loc()))?;
                if taken {
                    self.eval_expr(then_value)
                } else {
                    self.eval_expr(else_value)
                }
            }
            Expr::Call {
                name, arguments, ..
            } => {
                let args: Vec<Value> = arguments
                    .iter()
                    .map(|a| self.eval_expr(a))
                    .collect::<Result<_, _>>()?;
                let result = self.functions.call(name, &args)?;
                tracing::trace!(function = %name, result = %result, "call");
                Ok(result)
            }
            Expr::Index { object, index, .. } => {
                let obj = self.eval_expr(object)?;
                let idx = self.eval_expr(index)?;
                let i = to_index(&idx).map_err(|e| e.at(index.loc()))?;
                element(&obj, i).cloned()
            }
        }
    }

    /// Bare names: loop locals, then state, then the feedback value written
    /// so far, then bindings.
    fn lookup(&mut self, name: &str) -> Result<Value, EvalError> {
        if let Some((_, value)) = self.locals.iter().rev().find(|(n, _)| n == name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.state.get(name) {
            return Ok(value.clone());
        }
        if name == FEEDBACK_BINDING {
            if let Some(value) = &self.feedback {
                return Ok(value.clone());
            }
        }
        if let Some(value) = self.bindings.get(name, self.mode) {
            self.used_bindings.insert(name.to_string(), value.clone());
            return Ok(value.clone());
        }
        let message = if self.mode.is_static() && self.bindings.is_observed(name) {
            format!(
                "'{}' is observed workout data with no hypothetical value in static mode",
                name
            )
        } else {
            format!("Undefined variable '{}'", name)
        };
        Err(EvalError::new(ErrorKind::UndefinedReference, message))
    }
}

// ── Paths ───────────────────────────────────────────────────────────────

fn to_index(value: &Value) -> Result<i64, EvalError> {
    match value {
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => Ok(*n as i64),
        Value::Number(n) => Err(EvalError::new(
            ErrorKind::TypeMismatch,
            format!("Index must be a whole number, got {}", n),
        )),
        other => Err(EvalError::new(
            ErrorKind::TypeMismatch,
            format!("Index must be a Number, got {}", other.type_name()),
        )),
    }
}

/// 1-based element access.
fn element(value: &Value, index: i64) -> Result<&Value, EvalError> {
    match value {
        Value::List(items) => Ok(&items[position(index, items.len())?]),
        other => Err(not_indexable(other)),
    }
}

fn position(index: i64, len: usize) -> Result<usize, EvalError> {
    if index < 1 || index as usize > len {
        Err(EvalError::new(
            ErrorKind::Index,
            format!("Index {} out of bounds (list length {})", index, len),
        ))
    } else {
        Ok(index as usize - 1)
    }
}

fn not_indexable(value: &Value) -> EvalError {
    EvalError::new(
        ErrorKind::TypeMismatch,
        format!("Cannot index {}", value.type_name()),
    )
}

fn apply_op(current: Option<&Value>, op: AssignOp, operand: &Value) -> Result<Value, EvalError> {
    match op.arithmetic() {
        None => Ok(operand.clone()),
        Some(arith) => {
            let base = current.cloned().unwrap_or_else(|| Value::zero_like(operand));
            base.binary(arith, operand)
        }
    }
}

/// Return `value` with the operator applied at `path`. A wildcard applies
/// to every element of a list, or to the value itself when it is a scalar.
fn write_path(value: &Value, path: &[PathSegment], op: AssignOp, operand: &Value) -> Result<Value, EvalError> {
    let Some((segment, rest)) = path.split_first() else {
        return apply_op(Some(value), op, operand);
    };
    match (segment, value) {
        (PathSegment::Wildcard, Value::List(items)) => items
            .iter()
            .map(|item| write_path(item, rest, op, operand))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        (PathSegment::Wildcard, scalar) => write_path(scalar, rest, op, operand),
        (PathSegment::Index(i), Value::List(items)) => {
            let at = position(*i, items.len())?;
            let updated = write_path(&items[at], rest, op, operand)?;
            let mut items = items.clone();
            items[at] = updated;
            Ok(Value::List(items))
        }
        (PathSegment::Index(_), other) => Err(not_indexable(other)),
    }
}

/// The value a path designates: wildcards collect every element.
fn read_path(value: &Value, path: &[PathSegment]) -> Result<Value, EvalError> {
    let Some((segment, rest)) = path.split_first() else {
        return Ok(value.clone());
    };
    match (segment, value) {
        (PathSegment::Wildcard, Value::List(items)) => items
            .iter()
            .map(|item| read_path(item, rest))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        (PathSegment::Wildcard, scalar) => read_path(scalar, rest),
        (PathSegment::Index(i), _) => read_path(element(value, *i)?, rest),
    }
}
