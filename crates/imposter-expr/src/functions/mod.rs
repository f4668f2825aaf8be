//! Built-in function registry.
//!
//! Each built-in is a factory that checks the shape of its argument list and
//! returns a [`Builtin`] borrowing the argument expressions. Lookup happens at
//! evaluation time, so an unknown name inside an untaken `if` branch is only
//! reported by validation.

mod io;
mod logic;
mod random;
mod request;
mod strings;
mod vars;

use crate::ast::{Expression, Mode};
use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::value::Value;
use once_cell::sync::Lazy;
use std::collections::HashMap;

type Factory = for<'e> fn(&'e [Expression]) -> Result<Builtin<'e>, EvalError>;

static REGISTRY: Lazy<HashMap<&'static str, Factory>> = Lazy::new(|| {
    let entries: [(&'static str, Factory); 22] = [
        ("var", vars::var),
        ("link", io::link),
        ("redirect", io::redirect),
        ("file", io::file),
        ("and", logic::and),
        ("or", logic::or),
        ("not", logic::not),
        ("eq", logic::eq),
        ("ne", logic::ne),
        ("in", logic::in_array),
        ("contains", strings::contains),
        ("regex_match", strings::regex_match),
        ("to_string", strings::to_string),
        ("concat", strings::concat),
        ("rnd_string", random::rnd_string),
        ("rnd_int", random::rnd_int),
        ("request_http_header", request::http_header),
        ("request_url", request::url),
        ("request_url_path", request::url_path),
        ("request_url_query", request::url_query),
        ("request_http_method", request::http_method),
        ("request_http_host", request::http_host),
    ];
    entries.into_iter().collect()
});

/// A built-in bound to its argument expressions.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Builtin<'e> {
    Var(&'e Expression),
    Link(&'e Expression),
    Redirect {
        location: &'e Expression,
        status: Option<&'e Expression>,
    },
    File(&'e Expression),
    And(&'e [Expression]),
    Or(&'e [Expression]),
    Not(&'e Expression),
    Eq(&'e Expression, &'e Expression),
    Ne(&'e Expression, &'e Expression),
    In {
        array: &'e Expression,
        item: &'e Expression,
    },
    Contains {
        subject: &'e Expression,
        needle: &'e Expression,
    },
    RegexMatch {
        subject: &'e Expression,
        pattern: &'e Expression,
    },
    ToString(&'e Expression),
    Concat(&'e [Expression]),
    RndString(&'e Expression),
    RndInt {
        min: &'e Expression,
        max: &'e Expression,
    },
    RequestHeader(&'e Expression),
    RequestUrl,
    RequestUrlPath,
    RequestUrlQuery(Option<&'e Expression>),
    RequestMethod,
    RequestHost,
}

impl Builtin<'_> {
    pub(crate) fn call(&self, ctx: &EvaluationContext<'_>, mode: Mode) -> Result<Value, EvalError> {
        match *self {
            Builtin::Var(name) => vars::lookup(name, ctx, mode),
            Builtin::Link(url) => io::fetch(url, ctx, mode),
            Builtin::Redirect { location, status } => io::redirect_to(location, status, ctx, mode),
            Builtin::File(path) => io::read_file(path, ctx, mode),
            Builtin::And(args) => logic::all(args, ctx, mode),
            Builtin::Or(args) => logic::any(args, ctx, mode),
            Builtin::Not(arg) => Ok(Value::Bool(!arg.expect_bool(ctx, mode)?)),
            Builtin::Eq(left, right) => Ok(Value::Bool(left.run(ctx, mode)? == right.run(ctx, mode)?)),
            Builtin::Ne(left, right) => Ok(Value::Bool(left.run(ctx, mode)? != right.run(ctx, mode)?)),
            Builtin::In { array, item } => logic::member(array, item, ctx, mode),
            Builtin::Contains { subject, needle } => strings::contains_in(subject, needle, ctx, mode),
            Builtin::RegexMatch { subject, pattern } => strings::matches(subject, pattern, ctx, mode),
            Builtin::ToString(arg) => strings::format(arg, ctx, mode),
            Builtin::Concat(args) => strings::join(args, ctx, mode),
            Builtin::RndString(len) => random::letters(len, ctx, mode),
            Builtin::RndInt { min, max } => random::int_between(min, max, ctx, mode),
            Builtin::RequestHeader(name) => request::header_value(name, ctx, mode),
            Builtin::RequestUrl => Ok(Value::Str(ctx.request.uri.to_string())),
            Builtin::RequestUrlPath => Ok(Value::from(ctx.request.path())),
            Builtin::RequestUrlQuery(param) => request::query_value(param, ctx, mode),
            Builtin::RequestMethod => Ok(Value::from(ctx.request.method.as_str())),
            Builtin::RequestHost => Ok(Value::Str(ctx.request.host())),
        }
    }
}

/// Resolves `name` and binds it to `args`, checking arity.
pub(crate) fn build<'e>(name: &str, args: &'e [Expression]) -> Result<Builtin<'e>, EvalError> {
    let factory = REGISTRY
        .get(name)
        .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
    factory(args)
}

/// Destructures exactly `N` arguments or reports an arity error.
fn exactly<'e, const N: usize>(
    name: &'static str,
    expected: &'static str,
    args: &'e [Expression],
) -> Result<&'e [Expression; N], EvalError> {
    args.try_into().map_err(|_| EvalError::Arity {
        name,
        expected,
        found: args.len(),
    })
}

fn at_least<'e>(
    name: &'static str,
    expected: &'static str,
    min: usize,
    args: &'e [Expression],
) -> Result<&'e [Expression], EvalError> {
    if args.len() < min {
        return Err(EvalError::Arity {
            name,
            expected,
            found: args.len(),
        });
    }
    Ok(args)
}
