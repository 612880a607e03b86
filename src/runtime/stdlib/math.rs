//! Numeric helpers and aggregates over set lists

use std::cmp::Ordering;

use super::super::value::{Value, Weight};
use super::super::EvalError;
use super::{invalid_call, magnitude, Arity};
use crate::ast::BinaryOp;

pub(super) const FUNCTIONS: &[(&str, Arity)] = &[
    ("floor", Arity::Exact(1)),
    ("ceil", Arity::Exact(1)),
    ("round", Arity::Exact(1)),
    ("abs", Arity::Exact(1)),
    ("clamp", Arity::Exact(3)),
    ("min", Arity::AtLeast(1)),
    ("max", Arity::AtLeast(1)),
    ("sum", Arity::Exact(1)),
    ("length", Arity::Exact(1)),
];

pub(super) fn call(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match name {
        "floor" => unary_op(name, &args[0], f64::floor),
        "ceil" => unary_op(name, &args[0], f64::ceil),
        "round" => unary_op(name, &args[0], f64::round),
        "abs" => unary_op(name, &args[0], f64::abs),
        "clamp" => clamp(&args[0], &args[1], &args[2]),
        "min" => extreme(name, args, Ordering::Less),
        "max" => extreme(name, args, Ordering::Greater),
        "sum" => sum(&args[0]),
        "length" => match &args[0] {
            Value::List(items) => Ok(Value::Number(items.len() as f64)),
            other => Err(invalid_call(format!(
                "length() requires a List, got {}",
                other.type_name()
            ))),
        },
        _ => Err(invalid_call(format!("Unknown function '{}'", name))),
    }
}

fn unary_op(name: &str, arg: &Value, op: fn(f64) -> f64) -> Result<Value, EvalError> {
    let (n, unit) = magnitude(name, arg)?;
    Ok(match unit {
        Some(unit) => Value::Weight(Weight::new(op(n), unit)),
        None => Value::Number(op(n)),
    })
}

fn ordering(name: &str, a: &Value, b: &Value) -> Result<Ordering, EvalError> {
    // Reuse the script comparison rules so weights in mixed units order correctly.
    let less = a
        .binary(BinaryOp::Lt, b)
        .map_err(|e| invalid_call(format!("{}(): {}", name, e.message)))?;
    if less == Value::Bool(true) {
        return Ok(Ordering::Less);
    }
    let greater = a
        .binary(BinaryOp::Gt, b)
        .map_err(|e| invalid_call(format!("{}(): {}", name, e.message)))?;
    Ok(if greater == Value::Bool(true) {
        Ordering::Greater
    } else {
        Ordering::Equal
    })
}

fn clamp(value: &Value, lo: &Value, hi: &Value) -> Result<Value, EvalError> {
    for arg in [value, lo, hi] {
        magnitude("clamp", arg)?;
    }
    if ordering("clamp", lo, hi)? == Ordering::Greater {
        return Err(invalid_call(format!(
            "clamp() lower bound {} exceeds upper bound {}",
            lo, hi
        )));
    }
    if ordering("clamp", value, lo)? == Ordering::Less {
        Ok(lo.clone())
    } else if ordering("clamp", value, hi)? == Ordering::Greater {
        Ok(hi.clone())
    } else {
        Ok(value.clone())
    }
}

/// `min`/`max` over either the arguments or a single list argument.
fn extreme(name: &str, args: &[Value], wanted: Ordering) -> Result<Value, EvalError> {
    let items: &[Value] = match args {
        [Value::List(items)] => items,
        _ => args,
    };
    let mut best = items
        .first()
        .ok_or_else(|| invalid_call(format!("{}() of an empty list", name)))?;
    magnitude(name, best)?;
    for item in &items[1..] {
        magnitude(name, item)?;
        if ordering(name, item, best)? == wanted {
            best = item;
        }
    }
    Ok(best.clone())
}

fn sum(arg: &Value) -> Result<Value, EvalError> {
    let items = match arg {
        Value::List(items) => items,
        other => {
            return Err(invalid_call(format!(
                "sum() requires a List, got {}",
                other.type_name()
            )))
        }
    };
    let mut total = match items.first() {
        Some(Value::Weight(w)) => Value::Weight(Weight::new(0.0, w.unit)),
        _ => Value::Number(0.0),
    };
    for item in items {
        magnitude("sum", item)?;
        total = total
            .binary(BinaryOp::Add, item)
            .map_err(|e| invalid_call(format!("sum(): {}", e.message)))?;
    }
    Ok(total)
}
