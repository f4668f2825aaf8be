//! Expression tree and the dual-mode evaluator.

use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::functions;
use crate::value::Value;

/// Selects between real execution and dry validation.
///
/// Both modes perform the same type checks. `Test` never touches the network
/// or the filesystem and, for `if`, checks both branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Evaluate,
    Test,
}

/// A parsed expression. Immutable once built and re-evaluated per request.
///
/// Numeric and boolean literals keep the raw source text and are converted on
/// evaluation, so a malformed literal is reported at evaluation time.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    StringIdentity(String),
    IntegerIdentity(String),
    FloatIdentity(String),
    BoolIdentity(String),
    ArrayIdentity(Vec<Expression>),
    /// Call to a built-in, resolved by name when evaluated.
    Function {
        name: String,
        args: Vec<Expression>,
    },
    IfElse {
        guard: Box<Expression>,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<Value, EvalError> {
        self.run(ctx, Mode::Evaluate)
    }

    pub fn test(&self, ctx: &EvaluationContext<'_>) -> Result<Value, EvalError> {
        self.run(ctx, Mode::Test)
    }

    pub fn run(&self, ctx: &EvaluationContext<'_>, mode: Mode) -> Result<Value, EvalError> {
        match self {
            Expression::StringIdentity(value) => Ok(Value::Str(value.clone())),
            Expression::IntegerIdentity(raw) => {
                raw.parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| EvalError::InvalidLiteral {
                        kind: "int",
                        raw: raw.clone(),
                    })
            }
            Expression::FloatIdentity(raw) => {
                raw.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| EvalError::InvalidLiteral {
                        kind: "float64",
                        raw: raw.clone(),
                    })
            }
            Expression::BoolIdentity(raw) => match raw.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(EvalError::InvalidLiteral {
                    kind: "bool",
                    raw: raw.clone(),
                }),
            },
            Expression::ArrayIdentity(elements) => run_array(elements, ctx, mode),
            Expression::Function { name, args } => functions::build(name, args)?.call(ctx, mode),
            Expression::IfElse { guard, left, right } => {
                let selected = guard.expect_bool(ctx, mode)?;
                match mode {
                    Mode::Evaluate if selected => left.run(ctx, mode),
                    Mode::Evaluate => right.run(ctx, mode),
                    Mode::Test => {
                        let left = left.run(ctx, mode)?;
                        let right = right.run(ctx, mode)?;
                        if !left.same_type(&right) {
                            return Err(EvalError::BranchMismatch {
                                left: left.type_name(),
                                right: right.type_name(),
                            });
                        }
                        Ok(left)
                    }
                }
            }
        }
    }

    pub(crate) fn expect_string(
        &self,
        ctx: &EvaluationContext<'_>,
        mode: Mode,
    ) -> Result<String, EvalError> {
        match self.run(ctx, mode)? {
            Value::Str(s) => Ok(s),
            other => Err(EvalError::conversion(&other, "string")),
        }
    }

    pub(crate) fn expect_bool(
        &self,
        ctx: &EvaluationContext<'_>,
        mode: Mode,
    ) -> Result<bool, EvalError> {
        match self.run(ctx, mode)? {
            Value::Bool(b) => Ok(b),
            other => Err(EvalError::conversion(&other, "bool")),
        }
    }

    pub(crate) fn expect_int(
        &self,
        ctx: &EvaluationContext<'_>,
        mode: Mode,
    ) -> Result<i64, EvalError> {
        match self.run(ctx, mode)? {
            Value::Int(i) => Ok(i),
            other => Err(EvalError::conversion(&other, "int")),
        }
    }
}

fn run_array(
    elements: &[Expression],
    ctx: &EvaluationContext<'_>,
    mode: Mode,
) -> Result<Value, EvalError> {
    let mut items: Vec<Value> = Vec::with_capacity(elements.len());
    for element in elements {
        let value = element.run(ctx, mode)?;
        if let Some(first) = items.first() {
            if !first.same_type(&value) {
                return Err(EvalError::MixedArray);
            }
        }
        if !value.is_primitive() {
            return Err(EvalError::UnsupportedArrayElement(value.type_name()));
        }
        items.push(value);
    }
    Ok(Value::Array(items))
}
