use super::{exactly, Builtin};
use crate::ast::{Expression, Mode};
use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::value::Value;

pub(super) fn var(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    let [name] = exactly::<1>("var", "one argument of type 'string'", args)?;
    Ok(Builtin::Var(name))
}

pub(super) fn lookup(
    name: &Expression,
    ctx: &EvaluationContext<'_>,
    mode: Mode,
) -> Result<Value, EvalError> {
    let name = name.expect_string(ctx, mode)?;
    ctx.vars
        .get(&name)
        .cloned()
        .ok_or(EvalError::UnknownVariable(name))
}
