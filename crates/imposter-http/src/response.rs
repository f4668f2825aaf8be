//! Response building for matched rules.

use crate::config::{CookieConfig, MatchRsp, ResponseConfig};
use crate::error::{CompileError, HandlerError};
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use http_body_util::Full;
use hyper::header::{
    HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, SET_COOKIE, TE, TRAILER,
    TRANSFER_ENCODING, UPGRADE,
};
use hyper::{HeaderMap, Response, StatusCode};
use imposter_expr::{parse, EvaluationContext, Expression, Mode, Value};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Framing and hop-by-hop headers. hyper frames the body itself.
static HOP_BY_HOP: [HeaderName; 8] = [
    CONTENT_LENGTH,
    TRANSFER_ENCODING,
    CONNECTION,
    TE,
    TRAILER,
    UPGRADE,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
];

/// A fully computed response, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl MockResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        let mut response = Self::new(status);
        response
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
        response.body = Bytes::from(body.into());
        response
    }

    /// 500 with the error text as body.
    pub fn error(err: &HandlerError) -> Self {
        Self::text(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }

    pub fn not_found() -> Self {
        Self::text(StatusCode::NOT_FOUND, "404 page not found\n")
    }

    /// Convert into a hyper response. `head` drops the body.
    ///
    /// Framing headers copied from an upstream response or set by a rule are
    /// removed so they can never disagree with the body actually sent.
    pub fn into_hyper(mut self, head: bool) -> Response<Full<Bytes>> {
        for name in &HOP_BY_HOP {
            self.headers.remove(name);
        }
        let body = if head { Bytes::new() } else { self.body };
        let mut response = Response::new(Full::new(body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Cookie whose attributes are expressions.
pub struct CompiledCookie {
    name: String,
    value: Expression,
    path: Expression,
    domain: Expression,
    expires: Expression,
}

/// Compiled response side of a rule.
pub enum ResponseHandler {
    /// One expression that must evaluate to an `HTTPRsp`.
    Computed(Expression),
    Structured {
        body: Expression,
        headers: Vec<(HeaderName, Expression)>,
        cookies: Vec<CompiledCookie>,
        status: Expression,
    },
}

impl ResponseHandler {
    pub fn compile(config: &ResponseConfig) -> Result<Self, CompileError> {
        match config {
            ResponseConfig::Computed(source) => Ok(ResponseHandler::Computed(parse(source)?)),
            ResponseConfig::Structured(rsp) => Self::compile_structured(rsp),
        }
    }

    fn compile_structured(rsp: &MatchRsp) -> Result<Self, CompileError> {
        let body = parse(&rsp.body)?;

        let mut headers = Vec::with_capacity(rsp.headers.len());
        for (name, raw) in &rsp.headers {
            let source = header_source(name, raw)?;
            let header = HeaderName::try_from(name.as_str())
                .map_err(|_| CompileError::InvalidHeaderName(name.clone()))?;
            headers.push((header, parse(source)?));
        }

        let cookies = rsp
            .cookies
            .iter()
            .map(|(name, cookie)| compile_cookie(name, cookie))
            .collect::<Result<Vec<_>, _>>()?;

        let status = parse(&rsp.status_expression())?;

        Ok(ResponseHandler::Structured {
            body,
            headers,
            cookies,
            status,
        })
    }

    /// Evaluate the response against one request.
    ///
    /// Structured responses evaluate the body, then headers, then cookies,
    /// then the status code.
    pub fn render(&self, ctx: &EvaluationContext<'_>) -> Result<MockResponse, HandlerError> {
        match self {
            ResponseHandler::Computed(expr) => {
                let value = expr.evaluate(ctx)?;
                let rsp = match value {
                    Value::Response(rsp) => *rsp,
                    other => return Err(HandlerError::NotAResponse(other.type_name())),
                };
                let status = status_code(i64::from(rsp.status_code))?;
                Ok(MockResponse {
                    status,
                    headers: rsp.headers,
                    body: rsp.body,
                })
            }
            ResponseHandler::Structured {
                body,
                headers,
                cookies,
                status,
            } => {
                let body = body.evaluate(ctx)?.to_string();

                let mut header_map = HeaderMap::new();
                for (name, expr) in headers {
                    let value = expr.evaluate(ctx)?.to_string();
                    header_map.insert(name.clone(), header_value(name.as_str(), value)?);
                }

                for cookie in cookies {
                    let set_cookie = cookie.render(ctx, Mode::Evaluate)?;
                    header_map.append(SET_COOKIE, header_value("Set-Cookie", set_cookie)?);
                }

                let status = match status.evaluate(ctx)? {
                    Value::Int(code) => status_code(code)?,
                    other => return Err(HandlerError::StatusNotInt(other.type_name())),
                };

                Ok(MockResponse {
                    status,
                    headers: header_map,
                    body: Bytes::from(body),
                })
            }
        }
    }
}

impl CompiledCookie {
    fn render(&self, ctx: &EvaluationContext<'_>, mode: Mode) -> Result<String, HandlerError> {
        let value = self.value.run(ctx, mode)?.to_string();
        let path = self.path.run(ctx, mode)?.to_string();
        let domain = self.domain.run(ctx, mode)?.to_string();
        let expires = self.expires.run(ctx, mode)?.to_string();

        let mut out = format!("{}={}", self.name, value);
        if !path.is_empty() {
            out.push_str("; Path=");
            out.push_str(&path);
        }
        if !domain.is_empty() {
            out.push_str("; Domain=");
            out.push_str(&domain);
        }
        if !expires.is_empty() {
            let when = parse_http_date(&expires).ok_or_else(|| HandlerError::CookieExpires {
                name: self.name.clone(),
                value: expires.clone(),
            })?;
            out.push_str("; Expires=");
            out.push_str(&when.format(HTTP_DATE).to_string());
        }
        Ok(out)
    }
}

fn compile_cookie(name: &str, cookie: &CookieConfig) -> Result<CompiledCookie, CompileError> {
    Ok(CompiledCookie {
        name: name.to_string(),
        value: parse(&cookie.value)?,
        path: parse(&cookie.path)?,
        domain: parse(&cookie.domain)?,
        expires: parse(&cookie.expires)?,
    })
}

pub(crate) fn header_source<'a>(
    name: &str,
    raw: &'a serde_json::Value,
) -> Result<&'a str, CompileError> {
    raw.as_str().ok_or_else(|| CompileError::HeaderNotString {
        name: name.to_string(),
        found: json_type_name(raw),
    })
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => "int",
        serde_json::Value::Number(_) => "float64",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "map",
    }
}

fn header_value(name: &str, value: String) -> Result<HeaderValue, HandlerError> {
    HeaderValue::from_str(&value).map_err(|_| HandlerError::InvalidHeaderValue {
        name: name.to_string(),
        value,
    })
}

pub(crate) fn status_code(code: i64) -> Result<StatusCode, HandlerError> {
    if code <= 0 {
        return Err(HandlerError::StatusNotPositive(code));
    }
    u16::try_from(code)
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or(HandlerError::InvalidStatus(code))
}

/// Accepts the three HTTP date layouts (IMF-fixdate, RFC 850, asctime).
fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc2822(raw) {
        return Some(date.with_timezone(&Utc));
    }
    ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"]
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
        .map(|naive| naive.and_utc())
}

/// Current time as an HTTP date.
pub fn http_date_now() -> String {
    Utc::now().format(HTTP_DATE).to_string()
}

/// Type-check a structured response without a live request.
pub(crate) fn test_cookie(
    name: &str,
    cookie: &CookieConfig,
    ctx: &EvaluationContext<'_>,
) -> Result<(), String> {
    let compiled = compile_cookie(name, cookie).map_err(|e| e.to_string())?;
    compiled
        .render(ctx, Mode::Test)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StatusCodeConfig;
    use imposter_expr::{RequestInfo, Resources, Vars};
    use std::collections::BTreeMap;

    fn render(config: ResponseConfig) -> Result<MockResponse, HandlerError> {
        render_with(config, RequestInfo::default())
    }

    fn render_with(
        config: ResponseConfig,
        request: RequestInfo,
    ) -> Result<MockResponse, HandlerError> {
        let handler = ResponseHandler::compile(&config).unwrap();
        let vars = Vars::new();
        let resources = Resources::default();
        let ctx = EvaluationContext::new(&vars, &request, &resources);
        handler.render(&ctx)
    }

    fn structured(body: &str, status: Option<&str>) -> MatchRsp {
        MatchRsp {
            body: body.to_string(),
            status_code: status.map(|s| StatusCodeConfig::Expression(s.to_string())),
            ..Default::default()
        }
    }

    #[test]
    fn test_structured_response() {
        let mut rsp = structured("${concat(\"hello \", request_http_method())}", Some("${201}"));
        rsp.headers.insert(
            "X-Echo".to_string(),
            serde_json::Value::String("${request_http_header(\"x-in\")}".to_string()),
        );
        let mut headers = HeaderMap::new();
        headers.insert("x-in", HeaderValue::from_static("ping"));
        let request = RequestInfo::new(hyper::Method::PUT, "/".parse().unwrap(), headers);

        let response = render_with(ResponseConfig::Structured(rsp), request).unwrap();
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.headers["x-echo"], "ping");
        assert_eq!(response.body, Bytes::from("hello PUT"));
    }

    #[test]
    fn test_default_status_is_200() {
        let response = render(ResponseConfig::Structured(structured("ok", None))).unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, Bytes::from("ok"));
    }

    #[test]
    fn test_status_must_be_positive_int() {
        let err = render(ResponseConfig::Structured(structured("", Some("${0}")))).unwrap_err();
        assert!(matches!(err, HandlerError::StatusNotPositive(0)));

        let err =
            render(ResponseConfig::Structured(structured("", Some("${\"200\"}")))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected an 'int' value for status code; got 'string' instead"
        );

        let err = render(ResponseConfig::Structured(structured("", Some("${1000}")))).unwrap_err();
        assert!(matches!(err, HandlerError::InvalidStatus(1000)));
    }

    #[test]
    fn test_body_errors_surface_even_with_valid_status() {
        let err = render(ResponseConfig::Structured(structured(
            "${var(\"missing\")}",
            None,
        )))
        .unwrap_err();
        assert!(matches!(err, HandlerError::Eval(_)));
    }

    #[test]
    fn test_computed_response() {
        let response =
            render(ResponseConfig::Computed("${redirect(\"/login\", 302)}".into())).unwrap();
        assert_eq!(response.status, StatusCode::FOUND);
        assert_eq!(response.headers["location"], "/login");

        let err = render(ResponseConfig::Computed("plain text".into())).unwrap_err();
        assert!(matches!(err, HandlerError::NotAResponse("string")));
    }

    #[test]
    fn test_cookies() {
        let mut rsp = structured("", None);
        rsp.cookies = BTreeMap::from([
            (
                "session".to_string(),
                CookieConfig {
                    value: "abc".into(),
                    path: "/".into(),
                    domain: "example.com".into(),
                    expires: "Wed, 21 Oct 2026 07:28:00 GMT".into(),
                },
            ),
            (
                "theme".to_string(),
                CookieConfig {
                    value: "${to_string(1)}".into(),
                    ..Default::default()
                },
            ),
        ]);

        let response = render(ResponseConfig::Structured(rsp)).unwrap();
        let cookies: Vec<_> = response
            .headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            cookies,
            vec![
                "session=abc; Path=/; Domain=example.com; Expires=Wed, 21 Oct 2026 07:28:00 GMT",
                "theme=1",
            ]
        );
    }

    #[test]
    fn test_bad_cookie_date() {
        let mut rsp = structured("", None);
        rsp.cookies.insert(
            "c".to_string(),
            CookieConfig {
                value: "v".into(),
                expires: "tomorrow".into(),
                ..Default::default()
            },
        );
        let err = render(ResponseConfig::Structured(rsp)).unwrap_err();
        assert!(matches!(err, HandlerError::CookieExpires { .. }));
    }

    #[test]
    fn test_header_must_be_string() {
        let mut rsp = structured("", None);
        rsp.headers
            .insert("X-Count".to_string(), serde_json::Value::from(3));
        let err = ResponseHandler::compile(&ResponseConfig::Structured(rsp))
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "header 'X-Count': expected a value of type 'string'; got 'int' instead"
        );
    }

    #[test]
    fn test_parse_http_date_layouts() {
        let expected = parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        assert_eq!(
            parse_http_date("Sunday, 06-Nov-94 08:49:37 GMT").unwrap(),
            expected
        );
        assert_eq!(parse_http_date("Sun Nov  6 08:49:37 1994").unwrap(), expected);
        assert!(parse_http_date("not a date").is_none());
    }

    #[test]
    fn test_into_hyper_drops_body_for_head() {
        let response = MockResponse::text(StatusCode::OK, "payload");
        let hyper_response = response.clone().into_hyper(true);
        assert_eq!(hyper_response.status(), StatusCode::OK);
        assert_eq!(hyper_response.headers()[CONTENT_TYPE], TEXT_PLAIN);

        let mut framed = MockResponse::text(StatusCode::OK, "hello");
        framed
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from_static("3"));
        framed
            .headers
            .insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        framed
            .headers
            .insert("x-kept", HeaderValue::from_static("yes"));
        let hyper_response = framed.into_hyper(false);
        assert!(!hyper_response.headers().contains_key(CONTENT_LENGTH));
        assert!(!hyper_response.headers().contains_key(TRANSFER_ENCODING));
        assert_eq!(hyper_response.headers()["x-kept"], "yes");

        let not_found = MockResponse::not_found();
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);
        assert_eq!(not_found.body, Bytes::from("404 page not found\n"));
    }
}
