//! Weight helpers: plate rounding, unit conversion and rep-max estimates

use super::super::value::{Unit, Value, Weight};
use super::super::EvalError;
use super::{invalid_call, magnitude, Arity, LibrarySettings};

pub(super) const FUNCTIONS: &[(&str, Arity)] = &[
    ("roundWeight", Arity::Exact(1)),
    ("convert", Arity::Exact(2)),
    ("calculate1RM", Arity::Exact(2)),
    ("calculateRepMax", Arity::Exact(2)),
    ("calculateTrainingMax", Arity::Exact(2)),
];

const TRAINING_MAX_RATIO: f64 = 0.9;

pub(super) fn call(
    name: &str,
    args: &[Value],
    settings: &LibrarySettings,
) -> Result<Value, EvalError> {
    match name {
        "roundWeight" => {
            let weight = weight_arg(name, &args[0], settings)?;
            Ok(Value::Weight(round_weight(weight, settings)))
        }
        "convert" => {
            let weight = weight_arg(name, &args[0], settings)?;
            let unit = match &args[1] {
                Value::Str(s) => Unit::from_name(s),
                _ => None,
            }
            .ok_or_else(|| {
                invalid_call(format!(
                    "convert() second argument must be \"lb\" or \"kg\", got {}",
                    args[1]
                ))
            })?;
            Ok(Value::Weight(weight.convert_to(unit)))
        }
        "calculate1RM" => {
            let weight = weight_arg(name, &args[0], settings)?;
            let reps = reps_arg(name, &args[1])?;
            Ok(Value::Weight(one_rep_max(weight, reps)))
        }
        "calculateTrainingMax" => {
            let weight = weight_arg(name, &args[0], settings)?;
            let reps = reps_arg(name, &args[1])?;
            let max = one_rep_max(weight, reps);
            Ok(Value::Weight(Weight::new(max.value * TRAINING_MAX_RATIO, max.unit)))
        }
        "calculateRepMax" => {
            let one_rm = weight_arg(name, &args[0], settings)?;
            let reps = reps_arg(name, &args[1])?;
            Ok(Value::Weight(rep_max(one_rm, reps)))
        }
        _ => Err(invalid_call(format!("Unknown function '{}'", name))),
    }
}

/// Round to the nearest plate increment available for the weight's unit.
pub fn round_weight(weight: Weight, settings: &LibrarySettings) -> Weight {
    let step = settings.rounding_for(weight.unit);
    if step <= 0.0 {
        return weight;
    }
    Weight::new((weight.value / step).round() * step, weight.unit)
}

/// Epley estimate. One rep (or fewer) is the weight itself.
pub fn one_rep_max(weight: Weight, reps: f64) -> Weight {
    if reps <= 1.0 {
        return weight;
    }
    Weight::new(weight.value * (1.0 + reps / 30.0), weight.unit)
}

/// Inverse Epley: the weight that can be lifted for `reps` given a one-rep max.
pub fn rep_max(one_rm: Weight, reps: f64) -> Weight {
    if reps <= 1.0 {
        return one_rm;
    }
    Weight::new(one_rm.value / (1.0 + reps / 30.0), one_rm.unit)
}

/// Weights pass through; bare numbers are read in the user's unit.
fn weight_arg(name: &str, value: &Value, settings: &LibrarySettings) -> Result<Weight, EvalError> {
    match magnitude(name, value)? {
        (n, Some(unit)) => Ok(Weight::new(n, unit)),
        (n, None) => Ok(Weight::new(n, settings.units)),
    }
}

fn reps_arg(name: &str, value: &Value) -> Result<f64, EvalError> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(invalid_call(format!(
            "{}() reps must be a Number, got {}",
            name,
            other.type_name()
        ))),
    }
}
