//! Expression language for imposter rules.
//!
//! Every rule guard and every response field of an imposter configuration is a
//! string. A string wrapped in `${ ... }` is parsed into an [`Expression`]; any
//! other string is a literal. Expressions are parsed once at startup and then
//! evaluated once per request against a fresh [`EvaluationContext`].
//!
//! Evaluation runs in one of two modes:
//!
//! - [`Mode::Evaluate`] - real execution, may perform network and disk I/O
//!   (`link`, `file`).
//! - [`Mode::Test`] - dry validation, same type checks but I/O-bearing built-ins
//!   return a placeholder of the right type instead.
//!
//! # Example
//!
//! ```
//! use imposter_expr::{parse, EvaluationContext, RequestInfo, Resources, Value, Vars};
//!
//! let expr = parse(r#"${if (contains("Hello, world!", "world")) "correct" else "wrong"}"#).unwrap();
//! let vars = Vars::new();
//! let request = RequestInfo::default();
//! let resources = Resources::default();
//! let ctx = EvaluationContext::new(&vars, &request, &resources);
//! assert_eq!(expr.evaluate(&ctx).unwrap(), Value::from("correct"));
//! ```

mod ast;
mod context;
mod error;
mod functions;
mod parser;
mod value;

pub use ast::{Expression, Mode};
pub use context::{
    EvaluationContext, Fetcher, OfflineFetcher, RandomSource, RequestInfo, Resources, Vars,
    DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_STRING_LENGTH,
};
pub use error::{EvalError, ParseError};
pub use parser::parse;
pub use value::{HttpRsp, Value};
