//! Boolean and comparison built-ins.

use super::{at_least, exactly, Builtin};
use crate::ast::{Expression, Mode};
use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::value::Value;

pub(super) fn and(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    at_least("and", "at least two arguments of type 'bool'", 2, args).map(Builtin::And)
}

pub(super) fn or(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    at_least("or", "at least two arguments of type 'bool'", 2, args).map(Builtin::Or)
}

pub(super) fn not(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    let [arg] = exactly::<1>("not", "one argument of type 'bool'", args)?;
    Ok(Builtin::Not(arg))
}

pub(super) fn eq(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    let [left, right] = exactly::<2>("eq", "two arguments", args)?;
    Ok(Builtin::Eq(left, right))
}

pub(super) fn ne(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    let [left, right] = exactly::<2>("ne", "two arguments", args)?;
    Ok(Builtin::Ne(left, right))
}

pub(super) fn in_array(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    let [array, item] = exactly::<2>("in", "two arguments ('array', 'any')", args)?;
    Ok(Builtin::In { array, item })
}

// Every operand is evaluated, no short-circuit.
pub(super) fn all(
    args: &[Expression],
    ctx: &EvaluationContext<'_>,
    mode: Mode,
) -> Result<Value, EvalError> {
    let mut result = true;
    for arg in args {
        result &= arg.expect_bool(ctx, mode)?;
    }
    Ok(Value::Bool(result))
}

pub(super) fn any(
    args: &[Expression],
    ctx: &EvaluationContext<'_>,
    mode: Mode,
) -> Result<Value, EvalError> {
    let mut result = false;
    for arg in args {
        result |= arg.expect_bool(ctx, mode)?;
    }
    Ok(Value::Bool(result))
}

pub(super) fn member(
    array: &Expression,
    item: &Expression,
    ctx: &EvaluationContext<'_>,
    mode: Mode,
) -> Result<Value, EvalError> {
    let items = match array.run(ctx, mode)? {
        Value::Array(items) => items,
        other => return Err(EvalError::conversion(&other, "array")),
    };
    let item = item.run(ctx, mode)?;
    Ok(Value::Bool(items.contains(&item)))
}
