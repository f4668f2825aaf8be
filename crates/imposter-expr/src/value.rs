//! Runtime values produced by expression evaluation.

use bytes::Bytes;
use hyper::HeaderMap;
use std::fmt;

/// A complete HTTP response computed by a built-in such as `link` or `redirect`.
///
/// A `status_code` of zero marks the placeholder returned in test mode. The
/// body is kept as raw bytes so binary upstream payloads pass through intact.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpRsp {
    pub body: Bytes,
    pub headers: HeaderMap,
    pub status_code: u16,
}

/// Dynamically typed result of evaluating an expression.
///
/// Equality is strict: values of different variants never compare equal, so
/// `Int(1) != Float(1.0)` and `Int(1) != Str("1")`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    /// Homogeneous list of primitive values.
    Array(Vec<Value>),
    Response(Box<HttpRsp>),
}

impl Value {
    /// Name of the runtime type, as shown in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float64",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::Array(_) => "array",
            Value::Response(_) => "HTTPRsp",
        }
    }

    /// Whether the value may be stored in an array.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Int(_) | Value::Float(_) | Value::Str(_) | Value::Bool(_)
        )
    }

    pub fn same_type(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_response(self) -> Option<HttpRsp> {
        match self {
            Value::Response(rsp) => Some(*rsp),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Response(rsp) => f.write_str(&String::from_utf8_lossy(&rsp.body)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<HttpRsp> for Value {
    fn from(rsp: HttpRsp) -> Self {
        Value::Response(Box::new(rsp))
    }
}

/// Formats a float in exponent notation with a signed, two-digit exponent
/// (`1.5E+00`, `-2.5E-07`).
pub(crate) fn format_exponent(x: f64) -> String {
    let formatted = format!("{x:E}");
    match formatted.split_once('E') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}E{sign}{:02}", exponent.abs())
        }
        None => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_equality_across_types() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Int(1), Value::from("1"));
        assert_eq!(Value::from("a"), Value::Str("a".to_string()));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]).to_string(),
            "[1 2 3]"
        );

        let rsp = HttpRsp {
            body: Bytes::from_static(b"payload"),
            ..Default::default()
        };
        assert_eq!(Value::from(rsp).to_string(), "payload");
    }

    #[test]
    fn test_format_exponent() {
        assert_eq!(format_exponent(1.123), "1.123E+00");
        assert_eq!(format_exponent(1500.0), "1.5E+03");
        assert_eq!(format_exponent(-0.00000025), "-2.5E-07");
        assert_eq!(format_exponent(0.0), "0E+00");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Int(0).type_name(), "int");
        assert_eq!(Value::Float(0.0).type_name(), "float64");
        assert_eq!(Value::from(HttpRsp::default()).type_name(), "HTTPRsp");
        assert!(!Value::Array(vec![]).is_primitive());
    }
}
