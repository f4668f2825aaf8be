//! Built-ins reading the live request. In test mode they read an empty request.

use super::{exactly, Builtin};
use crate::ast::{Expression, Mode};
use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::value::Value;

pub(super) fn http_header(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    let [name] = exactly::<1>("request_http_header", "one argument of type 'string'", args)?;
    Ok(Builtin::RequestHeader(name))
}

pub(super) fn url(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    exactly::<0>("request_url", "no arguments", args)?;
    Ok(Builtin::RequestUrl)
}

pub(super) fn url_path(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    exactly::<0>("request_url_path", "no arguments", args)?;
    Ok(Builtin::RequestUrlPath)
}

pub(super) fn url_query(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    match args {
        [] => Ok(Builtin::RequestUrlQuery(None)),
        [name] => Ok(Builtin::RequestUrlQuery(Some(name))),
        _ => Err(EvalError::Arity {
            name: "request_url_query",
            expected: "one or no arguments",
            found: args.len(),
        }),
    }
}

pub(super) fn http_method(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    exactly::<0>("request_http_method", "no arguments", args)?;
    Ok(Builtin::RequestMethod)
}

pub(super) fn http_host(args: &[Expression]) -> Result<Builtin<'_>, EvalError> {
    exactly::<0>("request_http_host", "no arguments", args)?;
    Ok(Builtin::RequestHost)
}

pub(super) fn header_value(
    name: &Expression,
    ctx: &EvaluationContext<'_>,
    mode: Mode,
) -> Result<Value, EvalError> {
    let name = name.expect_string(ctx, mode)?;
    Ok(Value::Str(ctx.request.header(&name)))
}

/// Raw query string without an argument, one decoded parameter with one.
pub(super) fn query_value(
    param: Option<&Expression>,
    ctx: &EvaluationContext<'_>,
    mode: Mode,
) -> Result<Value, EvalError> {
    match param {
        None => Ok(Value::from(ctx.request.raw_query())),
        Some(name) => {
            let name = name.expect_string(ctx, mode)?;
            Ok(Value::Str(ctx.request.query_param(&name)))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{parse, EvaluationContext, RequestInfo, Resources, Value, Vars};
    use hyper::header::{HeaderValue, HOST};
    use hyper::{HeaderMap, Method};

    fn request() -> RequestInfo {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("localhost:8080"));
        headers.insert("x-token", HeaderValue::from_static("abc123"));
        RequestInfo::new(
            Method::POST,
            "/orders/7?expand=items&q=a+b".parse().unwrap(),
            headers,
        )
    }

    fn eval(source: &str) -> Value {
        let vars = Vars::new();
        let request = request();
        let resources = Resources::default();
        let ctx = EvaluationContext::new(&vars, &request, &resources);
        parse(source).unwrap().evaluate(&ctx).unwrap()
    }

    #[test]
    fn test_request_accessors() {
        assert_eq!(eval(r#"${request_http_header("X-Token")}"#), Value::from("abc123"));
        assert_eq!(eval(r#"${request_http_header("x-absent")}"#), Value::from(""));
        assert_eq!(eval("${request_http_method()}"), Value::from("POST"));
        assert_eq!(eval("${request_http_host()}"), Value::from("localhost:8080"));
        assert_eq!(eval("${request_url()}"), Value::from("/orders/7?expand=items&q=a+b"));
        assert_eq!(eval("${request_url_path()}"), Value::from("/orders/7"));
        assert_eq!(eval("${request_url_query()}"), Value::from("expand=items&q=a+b"));
        assert_eq!(eval(r#"${request_url_query("q")}"#), Value::from("a b"));
        assert_eq!(eval(r#"${request_url_query("none")}"#), Value::from(""));
    }

    #[test]
    fn test_arity() {
        let vars = Vars::new();
        let request = request();
        let resources = Resources::default();
        let ctx = EvaluationContext::new(&vars, &request, &resources);
        let err = parse(r#"${request_url_path("x")}"#)
            .unwrap()
            .evaluate(&ctx)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "function 'request_url_path' is expecting no arguments; found 1 argument(s) instead"
        );
        assert!(parse(r#"${request_url_query("a", "b")}"#)
            .unwrap()
            .evaluate(&ctx)
            .is_err());
    }

    #[test]
    fn test_empty_request_in_test_mode() {
        let vars = Vars::new();
        let request = RequestInfo::default();
        let resources = Resources::default();
        let ctx = EvaluationContext::new(&vars, &request, &resources);
        let value = parse(r#"${request_http_header("x-token")}"#)
            .unwrap()
            .test(&ctx)
            .unwrap();
        assert_eq!(value, Value::from(""));
    }
}
