//! Error types for rule compilation and request handling.

use imposter_expr::{EvalError, ParseError};

/// Failure turning configuration into compiled rules.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("rule #{index}: {source}")]
    Rule {
        index: usize,
        #[source]
        source: Box<CompileError>,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("HTTP method '{0}' is not supported")]
    UnsupportedMethod(String),

    #[error("latency requires a value greater than zero; got '{0}' instead")]
    NegativeLatency(i64),

    #[error("header '{name}': expected a value of type 'string'; got '{found}' instead")]
    HeaderNotString { name: String, found: &'static str },

    #[error("invalid header name '{0}'")]
    InvalidHeaderName(String),

    #[error("{0}")]
    Variable(String),
}

/// Per-request failure. Always answered with a 500 carrying the message.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("evaluation error: expected 'bool' for any rule expression; got '{0}' instead")]
    GuardNotBool(&'static str),

    #[error(
        "full response computing requires a function returning 'HTTPRsp' (e.g. 'link', 'redirect', ...); got '{0}' instead"
    )]
    NotAResponse(&'static str),

    #[error("expected an 'int' value for status code; got '{0}' instead")]
    StatusNotInt(&'static str),

    #[error("expected a positive 'int' value for status code; got '{0}' instead")]
    StatusNotPositive(i64),

    #[error("'{0}' is not a valid HTTP status code")]
    InvalidStatus(i64),

    #[error("invalid value for header '{name}': '{value}'")]
    InvalidHeaderValue { name: String, value: String },

    #[error("cookie '{name}': cannot parse expiry date '{value}'")]
    CookieExpires { name: String, value: String },

    #[error("evaluation task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for HandlerError {
    fn from(err: tokio::task::JoinError) -> Self {
        HandlerError::Task(err.to_string())
    }
}
