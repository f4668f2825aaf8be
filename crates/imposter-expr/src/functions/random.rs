use super::{exactly, Builtin};
use crate::ast::{Expression, Mode};
use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::value::Value;

pub(super) fn rnd_string(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    let [len] = exactly::<1>("rnd_string", "one argument of type 'int'", args)?;
    Ok(Builtin::RndString(len))
}

pub(super) fn rnd_int(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    let [min, max] = exactly::<2>("rnd_int", "two arguments of type 'int'", args)?;
    Ok(Builtin::RndInt { min, max })
}

pub(super) fn letters(
    len: &Expression,
    ctx: &EvaluationContext<'_>,
    mode: Mode,
) -> Result<Value, EvalError> {
    let len = len.expect_int(ctx, mode)?;
    let len = usize::try_from(len).map_err(|_| EvalError::NegativeLength(len))?;
    let limit = ctx.resources.max_string_length;
    if len > limit {
        return Err(EvalError::StringTooLong { length: len, limit });
    }
    Ok(Value::Str(ctx.resources.random.letters(len)))
}

/// Uniform value in `[min, max)`.
pub(super) fn int_between(
    min: &Expression,
    max: &Expression,
    ctx: &EvaluationContext<'_>,
    mode: Mode,
) -> Result<Value, EvalError> {
    let min = min.expect_int(ctx, mode)?;
    let max = max.expect_int(ctx, mode)?;
    if min >= max {
        return Err(EvalError::RandomRange);
    }
    Ok(Value::Int(ctx.resources.random.int_in(min, max)))
}

#[cfg(test)]
mod tests {
    use crate::{
        parse, EvalError, EvaluationContext, RandomSource, RequestInfo, Resources, Value, Vars,
    };

    fn eval(source: &str) -> Result<Value, EvalError> {
        let vars = Vars::new();
        let request = RequestInfo::default();
        let resources = Resources::default().with_random(RandomSource::seeded(42));
        let ctx = EvaluationContext::new(&vars, &request, &resources);
        parse(source).unwrap().evaluate(&ctx)
    }

    #[test]
    fn test_rnd_string() {
        let value = eval("${rnd_string(12)}").unwrap();
        let s = value.as_str().unwrap();
        assert_eq!(s.len(), 12);
        assert!(s.chars().all(|c| c.is_ascii_alphabetic()));
        assert_eq!(eval("${rnd_string(0)}").unwrap(), Value::from(""));
        assert_eq!(
            eval("${rnd_string(-1)}").unwrap_err(),
            EvalError::NegativeLength(-1)
        );
    }

    #[test]
    fn test_rnd_string_length_is_bounded() {
        let vars = Vars::new();
        let request = RequestInfo::default();
        let resources = Resources::default().with_max_string_length(16);
        let ctx = EvaluationContext::new(&vars, &request, &resources);

        let expr = parse("${rnd_string(9223372036854775807)}").unwrap();
        for result in [expr.evaluate(&ctx), expr.test(&ctx)] {
            assert_eq!(
                result.unwrap_err(),
                EvalError::StringTooLong {
                    length: 9223372036854775807,
                    limit: 16
                }
            );
        }

        let at_limit = parse("${rnd_string(16)}").unwrap().evaluate(&ctx).unwrap();
        assert_eq!(at_limit.as_str().unwrap().len(), 16);
    }

    #[test]
    fn test_rnd_int() {
        for _ in 0..50 {
            let n = eval("${rnd_int(10, 20)}").unwrap().as_int().unwrap();
            assert!((10..20).contains(&n));
        }
        assert_eq!(eval("${rnd_int(5, 5)}").unwrap_err(), EvalError::RandomRange);
        assert_eq!(eval("${rnd_int(6, 5)}").unwrap_err(), EvalError::RandomRange);
        assert!(eval(r#"${rnd_int("1", 5)}"#).is_err());
    }
}
