//! Built-in function library
//!
//! A closed registry of pure functions callable by name from scripts:
//! math helpers (floor, ceil, round, abs, clamp, min, max, sum, length) and
//! weight helpers (roundWeight, convert, calculate1RM, calculateRepMax,
//! calculateTrainingMax). The library is an immutable value built once by
//! the caller and passed into every evaluation.

pub mod math;
pub mod weight;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::value::{Unit, Value};
use super::{ErrorKind, EvalError};

/// Bumped whenever a function is added, removed or changes meaning.
pub const LIBRARY_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == *n,
            Arity::AtLeast(n) => count >= *n,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Module {
    Math,
    Weight,
}

/// User settings the weight helpers depend on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// Unit assumed for bare numbers passed where a weight is expected.
    pub units: Unit,
    /// Smallest plate increment available, per unit.
    pub rounding_lb: f64,
    pub rounding_kg: f64,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            units: Unit::Lb,
            rounding_lb: 5.0,
            rounding_kg: 2.5,
        }
    }
}

impl LibrarySettings {
    pub fn rounding_for(&self, unit: Unit) -> f64 {
        match unit {
            Unit::Lb => self.rounding_lb,
            Unit::Kg => self.rounding_kg,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionLibrary {
    settings: LibrarySettings,
    registry: BTreeMap<&'static str, (Module, Arity)>,
}

impl Default for FunctionLibrary {
    fn default() -> Self {
        Self::new(LibrarySettings::default())
    }
}

impl FunctionLibrary {
    pub fn new(settings: LibrarySettings) -> Self {
        let mut registry = BTreeMap::new();
        for (name, arity) in math::FUNCTIONS {
            registry.insert(*name, (Module::Math, *arity));
        }
        for (name, arity) in weight::FUNCTIONS {
            registry.insert(*name, (Module::Weight, *arity));
        }
        Self { settings, registry }
    }

    pub fn version(&self) -> u32 {
        LIBRARY_VERSION
    }

    pub fn settings(&self) -> &LibrarySettings {
        &self.settings
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains_key(name)
    }

    /// Call `name` with already evaluated arguments.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        let (module, arity) = self.registry.get(name).copied().ok_or_else(|| {
            EvalError::new(
                ErrorKind::InvalidFunctionCall,
                format!("Unknown function '{}'", name),
            )
        })?;
        if !arity.accepts(args.len()) {
            let expected = match arity {
                Arity::Exact(n) => format!("{}", n),
                Arity::AtLeast(n) => format!("at least {}", n),
            };
            return Err(EvalError::new(
                ErrorKind::InvalidFunctionCall,
                format!(
                    "{}() expects {} argument(s), got {}",
                    name,
                    expected,
                    args.len()
                ),
            ));
        }
        let result = match module {
            Module::Math => math::call(name, args),
            Module::Weight => weight::call(name, args, &self.settings),
        }?;
        if !result.is_finite() {
            return Err(EvalError::new(
                ErrorKind::Arithmetic,
                format!("{}() produced a non-finite number", name),
            ));
        }
        Ok(result)
    }
}

pub(crate) fn invalid_call(message: String) -> EvalError {
    EvalError::new(ErrorKind::InvalidFunctionCall, message)
}

/// Number or weight argument as a plain magnitude, keeping the weight's unit.
pub(crate) fn magnitude(name: &str, value: &Value) -> Result<(f64, Option<Unit>), EvalError> {
    match value {
        Value::Number(n) => Ok((*n, None)),
        Value::Weight(w) => Ok((w.value, Some(w.unit))),
        other => Err(invalid_call(format!(
            "{}() requires a Number or Weight, got {}",
            name,
            other.type_name()
        ))),
    }
}
