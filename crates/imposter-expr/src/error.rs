//! Error types for parsing and evaluating expressions.

use crate::value::Value;

/// Number of characters shown on each side of a failing position.
const CONTEXT_RADIUS: usize = 30;

/// A syntax error, annotated with the surrounding source and a caret pointing
/// at the offending column.
///
/// `Display` renders `"<message>\n<context window>\n<caret line>"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{rendered}")]
pub struct ParseError {
    message: String,
    position: usize,
    rendered: String,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, source: &str, position: usize) -> Self {
        let message = message.into();
        let rendered = render(&message, source, position);
        Self {
            message,
            position,
            rendered,
        }
    }

    /// The bare message, without the source window.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Byte offset of the failure inside the delimited expression body.
    pub fn position(&self) -> usize {
        self.position
    }
}

fn render(message: &str, source: &str, position: usize) -> String {
    let position = position.min(source.len());

    let mut left = position.saturating_sub(CONTEXT_RADIUS);
    while !source.is_char_boundary(left) {
        left -= 1;
    }
    let mut right = (position + CONTEXT_RADIUS + 1).min(source.len());
    while !source.is_char_boundary(right) {
        right += 1;
    }

    let mut out = String::with_capacity(message.len() + 2 * (right - left) + 8);
    out.push_str(message);
    out.push('\n');
    if left > 0 {
        out.push_str("...\n");
    }

    let window = &source[left..right];
    let lines: Vec<&str> = if window.is_empty() {
        vec![""]
    } else {
        window.lines().collect()
    };

    let mut line_start = left;
    for line in lines {
        out.push_str(line);
        out.push('\n');
        let line_end = line_start + line.len() + 1;
        if line_start <= position && position < line_end {
            let column = source
                .get(line_start..position)
                .map(|s| s.chars().count())
                .unwrap_or(position - line_start);
            out.extend(std::iter::repeat(' ').take(column));
            out.push_str("^\n");
        }
        line_start = line_end;
    }

    if right < source.len() {
        out.push_str("...");
    }
    out
}

/// Failure while building a built-in from its arguments or while evaluating an
/// expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("could not find a built-in function with name '{0}'")]
    UnknownFunction(String),

    #[error("function '{name}' is expecting {expected}; found {found} argument(s) instead")]
    Arity {
        name: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("evaluation error: cannot convert value '{value}' to '{expected}'")]
    Conversion {
        value: String,
        expected: &'static str,
    },

    #[error("evaluation error: invalid {kind} literal '{raw}'")]
    InvalidLiteral { kind: &'static str, raw: String },

    #[error("evaluation error: cannot find a variable named '{0}'")]
    UnknownVariable(String),

    #[error("evaluation error: mixed type arrays are not allowed")]
    MixedArray,

    #[error("array support is limited to 'int', 'string', 'bool', 'float64': found '{0}' instead")]
    UnsupportedArrayElement(&'static str),

    #[error("type mismatch: cannot convert type '{left}' to '{right}'")]
    BranchMismatch {
        left: &'static str,
        right: &'static str,
    },

    #[error("evaluation error: {0}")]
    Regex(String),

    #[error("evaluation error: expected status code '3XX'; got '{0}' instead")]
    RedirectStatus(i64),

    #[error("evaluation error: invalid redirect location '{0}'")]
    RedirectLocation(String),

    #[error("evaluation error: 'min' argument must be lower than 'max'")]
    RandomRange,

    #[error("evaluation error: expected a positive integer value; got '{0}' instead")]
    NegativeLength(i64),

    #[error("evaluation error: string length {length} is over the {limit} characters limit")]
    StringTooLong { length: usize, limit: usize },

    #[error("evaluation error: could not read file '{path}': {reason}")]
    File { path: String, reason: String },

    #[error("evaluation error: file '{path}' is {size} bytes long, over the {limit} bytes limit")]
    FileTooLarge { path: String, size: u64, limit: u64 },

    #[error("evaluation error: request to '{url}' failed: {reason}")]
    Link { url: String, reason: String },
}

impl EvalError {
    pub(crate) fn conversion(value: &Value, expected: &'static str) -> Self {
        EvalError::Conversion {
            value: value.to_string(),
            expected,
        }
    }
}
