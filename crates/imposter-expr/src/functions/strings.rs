//! String built-ins.

use super::{at_least, exactly, Builtin};
use crate::ast::{Expression, Mode};
use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::value::{format_exponent, Value};
use regex::Regex;

pub(super) fn contains(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    let [subject, needle] = exactly::<2>("contains", "two arguments of type 'string'", args)?;
    Ok(Builtin::Contains { subject, needle })
}

pub(super) fn regex_match(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    let [subject, pattern] = exactly::<2>("regex_match", "two arguments of type 'string'", args)?;
    Ok(Builtin::RegexMatch { subject, pattern })
}

pub(super) fn to_string(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    let [arg] = exactly::<1>("to_string", "one argument", args)?;
    Ok(Builtin::ToString(arg))
}

pub(super) fn concat(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    at_least("concat", "at least two arguments", 2, args).map(Builtin::Concat)
}

pub(super) fn contains_in(
    subject: &Expression,
    needle: &Expression,
    ctx: &EvaluationContext<'_>,
    mode: Mode,
) -> Result<Value, EvalError> {
    let subject = subject.expect_string(ctx, mode)?;
    let needle = needle.expect_string(ctx, mode)?;
    Ok(Value::Bool(subject.contains(&needle)))
}

/// The pattern is compiled on every call since it may be computed.
pub(super) fn matches(
    subject: &Expression,
    pattern: &Expression,
    ctx: &EvaluationContext<'_>,
    mode: Mode,
) -> Result<Value, EvalError> {
    let subject = subject.expect_string(ctx, mode)?;
    let pattern = pattern.expect_string(ctx, mode)?;
    let regex = Regex::new(&pattern).map_err(|e| EvalError::Regex(e.to_string()))?;
    Ok(Value::Bool(regex.is_match(&subject)))
}

pub(super) fn format(
    arg: &Expression,
    ctx: &EvaluationContext<'_>,
    mode: Mode,
) -> Result<Value, EvalError> {
    let formatted = match arg.run(ctx, mode)? {
        Value::Str(s) => s,
        Value::Float(x) => format_exponent(x),
        other => other.to_string(),
    };
    Ok(Value::Str(formatted))
}

pub(super) fn join(
    args: &[Expression],
    ctx: &EvaluationContext<'_>,
    mode: Mode,
) -> Result<Value, EvalError> {
    let mut out = String::new();
    for arg in args {
        let value = arg.run(ctx, mode)?;
        if !value.is_primitive() {
            return Err(EvalError::conversion(&value, "string"));
        }
        out.push_str(&value.to_string());
    }
    Ok(Value::Str(out))
}
