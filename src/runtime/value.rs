//! Script values: numbers, weights with units, booleans and lists.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{ErrorKind, EvalError};
use crate::ast::BinaryOp;

const LB_PER_KG: f64 = 2.20462;

/// Tolerance used when comparing weights across units.
const WEIGHT_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Lb,
    Kg,
}

impl Unit {
    pub fn suffix(&self) -> &'static str {
        match self {
            Unit::Lb => "lb",
            Unit::Kg => "kg",
        }
    }

    pub fn from_name(name: &str) -> Option<Unit> {
        match name {
            "lb" | "lbs" => Some(Unit::Lb),
            "kg" | "kgs" => Some(Unit::Kg),
            _ => None,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weight {
    pub value: f64,
    pub unit: Unit,
}

impl Weight {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn lb(value: f64) -> Self {
        Self::new(value, Unit::Lb)
    }

    pub fn kg(value: f64) -> Self {
        Self::new(value, Unit::Kg)
    }

    pub fn convert_to(&self, unit: Unit) -> Weight {
        let value = match (self.unit, unit) {
            (Unit::Lb, Unit::Kg) => self.value / LB_PER_KG,
            (Unit::Kg, Unit::Lb) => self.value * LB_PER_KG,
            _ => self.value,
        };
        Weight::new(value, unit)
    }

    /// Value expressed in `unit`.
    pub fn value_in(&self, unit: Unit) -> f64 {
        self.convert_to(unit).value
    }

    pub fn approx_eq(&self, other: &Weight) -> bool {
        (self.value - other.value_in(self.unit)).abs() < WEIGHT_EPSILON
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", format_number(self.value), self.unit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Weight(Weight),
    List(Vec<Value>),
    Str(String),
}

fn weight_pattern() -> Result<&'static Regex, String> {
    static WEIGHT: OnceLock<Option<Regex>> = OnceLock::new();
    WEIGHT
        .get_or_init(|| Regex::new(r"^(-?\d+(?:\.\d+)?)(lb|kg)$").ok())
        .as_ref()
        .ok_or_else(|| "weight pattern failed to compile".to_string())
}

/// Reads a binding value given on the command line: `5`, `2.5kg`, `true`
/// or a JSON list.
impl FromStr for Value {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = if let Some(caps) = weight_pattern()?.captures(s) {
            let value: f64 = caps[1].parse().map_err(|_| format!("Invalid weight '{}'", s))?;
            let unit = Unit::from_name(&caps[2]).ok_or_else(|| format!("Invalid unit in '{}'", s))?;
            Value::Weight(Weight::new(value, unit))
        } else if s == "true" || s == "false" {
            Value::Bool(s == "true")
        } else if let Ok(n) = s.parse::<f64>() {
            Value::Number(n)
        } else if s.starts_with('[') {
            serde_json::from_str(s).map_err(|e| format!("Invalid list '{}': {}", s, e))?
        } else {
            return Err(format!("Cannot read '{}' as a number, bool, weight or list", s));
        };
        if !value.is_finite() {
            return Err(format!("'{}' is not a finite number", s));
        }
        Ok(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Weight(w) => write!(f, "{}", w),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Render a number without a trailing `.0` and with at most two decimals.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        let s = format!("{:.2}", n);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Weight(_) => "Weight",
            Value::Bool(_) => "Bool",
            Value::List(_) => "List",
            Value::Str(_) => "String",
        }
    }

    pub fn as_bool(&self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Err(EvalError::new(
                ErrorKind::TypeMismatch,
                format!("Expected Bool, got {}", self.type_name()),
            )),
        }
    }

    /// Whether this value may live in program state.
    pub fn is_storable(&self) -> bool {
        match self {
            Value::Number(_) | Value::Weight(_) | Value::Bool(_) => true,
            Value::List(items) => items.iter().all(Value::is_storable),
            Value::Str(_) => false,
        }
    }

    /// False when any number or weight magnitude is infinite or NaN.
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Number(n) => n.is_finite(),
            Value::Weight(w) => w.value.is_finite(),
            Value::List(items) => items.iter().all(Value::is_finite),
            Value::Bool(_) | Value::Str(_) => true,
        }
    }

    /// Zero of the same kind as `operand`: the starting point of a compound
    /// assignment to a variable that does not exist yet.
    pub fn zero_like(operand: &Value) -> Value {
        match operand {
            Value::Weight(w) => Value::Weight(Weight::new(0.0, w.unit)),
            _ => Value::Number(0.0),
        }
    }

    /// Equality that treats weights in different units as equal when they
    /// describe the same mass.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Weight(a), Value::Weight(b)) => a.approx_eq(b),
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
            }
            _ => self == other,
        }
    }

    pub fn negate(&self) -> Result<Value, EvalError> {
        match self {
            Value::Number(n) => Ok(Value::Number(-n)),
            Value::Weight(w) => Ok(Value::Weight(Weight::new(-w.value, w.unit))),
            _ => Err(EvalError::new(
                ErrorKind::TypeMismatch,
                format!("Cannot negate {}", self.type_name()),
            )),
        }
    }

    /// Apply a non short-circuit binary operator.
    pub fn binary(&self, op: BinaryOp, right: &Value) -> Result<Value, EvalError> {
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                self.arithmetic(op, right)
            }
            BinaryOp::Eq => self.equals(right).map(Value::Bool),
            BinaryOp::NotEq => self.equals(right).map(|eq| Value::Bool(!eq)),
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                let ordering = self.compare(right)?;
                let result = match op {
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::LtEq => ordering != Ordering::Greater,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                };
                Ok(Value::Bool(result))
            }
            BinaryOp::And | BinaryOp::Or => {
                let (a, b) = (self.as_bool()?, right.as_bool()?);
                Ok(Value::Bool(if op == BinaryOp::And { a && b } else { a || b }))
            }
        }
    }

    fn arithmetic(&self, op: BinaryOp, right: &Value) -> Result<Value, EvalError> {
        let result = match (self, right) {
            (Value::Number(a), Value::Number(b)) => Value::Number(apply(op, *a, *b)?),
            (Value::Weight(a), Value::Weight(b)) => match op {
                BinaryOp::Add | BinaryOp::Sub => {
                    Value::Weight(Weight::new(apply(op, a.value, b.value_in(a.unit))?, a.unit))
                }
                BinaryOp::Div => Value::Number(apply(op, a.value, b.value_in(a.unit))?),
                _ => return Err(self.mismatch(op, right)),
            },
            (Value::Weight(a), Value::Number(b)) => {
                Value::Weight(Weight::new(apply(op, a.value, *b)?, a.unit))
            }
            (Value::Number(a), Value::Weight(b)) => match op {
                BinaryOp::Add | BinaryOp::Mul => {
                    Value::Weight(Weight::new(apply(op, *a, b.value)?, b.unit))
                }
                _ => return Err(self.mismatch(op, right)),
            },
            _ => return Err(self.mismatch(op, right)),
        };
        Ok(result)
    }

    fn equals(&self, right: &Value) -> Result<bool, EvalError> {
        match (self, right) {
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::Str(a), Value::Str(b)) => Ok(a == b),
            (Value::List(_), Value::List(_)) => Ok(self.same_as(right)),
            _ => self.compare(right).map(|o| o == Ordering::Equal),
        }
    }

    fn compare(&self, right: &Value) -> Result<Ordering, EvalError> {
        let (a, b) = match (self, right) {
            (Value::Number(a), Value::Number(b)) => (*a, *b),
            (Value::Weight(a), Value::Weight(b)) => {
                if a.approx_eq(b) {
                    return Ok(Ordering::Equal);
                }
                (a.value, b.value_in(a.unit))
            }
            (Value::Weight(a), Value::Number(b)) => (a.value, *b),
            (Value::Number(a), Value::Weight(b)) => (*a, b.value),
            _ => {
                return Err(EvalError::new(
                    ErrorKind::TypeMismatch,
                    format!("Cannot compare {} with {}", self.type_name(), right.type_name()),
                ))
            }
        };
        a.partial_cmp(&b).ok_or_else(|| {
            EvalError::new(ErrorKind::Arithmetic, "Cannot compare NaN".to_string())
        })
    }

    fn mismatch(&self, op: BinaryOp, right: &Value) -> EvalError {
        EvalError::new(
            ErrorKind::TypeMismatch,
            format!(
                "Cannot apply '{}' to {} and {}",
                op,
                self.type_name(),
                right.type_name()
            ),
        )
    }
}

fn apply(op: BinaryOp, a: f64, b: f64) -> Result<f64, EvalError> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(EvalError::new(
                    ErrorKind::Arithmetic,
                    "Division by zero".to_string(),
                ));
            }
            a / b
        }
        _ => {
            return Err(EvalError::new(
                ErrorKind::TypeMismatch,
                format!("'{}' is not an arithmetic operator", op),
            ))
        }
    };
    if result.is_finite() {
        Ok(result)
    } else {
        Err(EvalError::new(
            ErrorKind::Arithmetic,
            format!("Result of '{}' is not a finite number", op),
        ))
    }
}
