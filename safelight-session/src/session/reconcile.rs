//! Schema reconciliation
//!
//! Builds the argument list and value map for a freshly described filter,
//! carrying over the user's values where the previous schema matches.

use safelight_common::values::insert_run_defaults;
use safelight_common::{make_input_buffer, Argument, TypeCode, Value, ValueMap};

/// Derive the new argument list and value map
///
/// Handle-typed arguments are dropped. Output values start as null. An input
/// keeps its previous value only when the previous list has the same length,
/// the previous argument at the same position is compatible, and a value is
/// stored under its name. Otherwise inputs get a default:
/// - buffers: a synthesized `side` x `side` buffer seeded by position
/// - 1-bit unsigned: the declared default as a boolean
/// - other scalars: the declared default (or 0) clamped into `[min, max]`
pub fn reconcile(
    previous: &[Argument],
    values: &ValueMap,
    described: Vec<Argument>,
    side: i32,
) -> (Vec<Argument>, ValueMap) {
    let arguments: Vec<Argument> = described
        .into_iter()
        .filter(|a| a.type_code != TypeCode::Handle)
        .collect();
    let same_length = previous.len() == arguments.len();

    let mut next = ValueMap::new();
    insert_run_defaults(&mut next);
    for (index, argument) in arguments.iter().enumerate() {
        let preserved = same_length
            && argument.is_input()
            && previous[index].is_compatible_with(argument);
        let value = match values.get(&argument.name) {
            Some(existing) if preserved => existing.clone(),
            _ => default_value(argument, index, side),
        };
        next.insert(argument.name.clone(), value);
    }
    (arguments, next)
}

/// Value for an argument with nothing to carry over
pub fn default_value(argument: &Argument, index: usize, side: i32) -> Value {
    if !argument.is_input() {
        Value::Null
    } else if argument.is_buffer() {
        Value::Buffer(make_input_buffer(argument, side, side, index as u32))
    } else if argument.is_boolean() {
        Value::Bool(argument.default_bool())
    } else {
        Value::Number(clamped_default(argument))
    }
}

fn clamped_default(argument: &Argument) -> f64 {
    let mut v = argument.default_number();
    if let Some(min) = argument.min_number() {
        v = v.max(min);
    }
    if let Some(max) = argument.max_number() {
        v = v.min(max);
    }
    v
}
