//! Ordered, first-match-wins rule router.
//!
//! For each request the guards are evaluated in configuration order. The
//! first guard that evaluates to `true` and whose method filter accepts the
//! request wins: its latency is applied and its response is rendered. When
//! nothing matches the router answers 404. Any evaluation failure answers 500.

use crate::config::{Config, RuleConfig};
use crate::error::{CompileError, HandlerError};
use crate::response::{MockResponse, ResponseHandler};
use hyper::Method;
use imposter_expr::{parse, EvaluationContext, Expression, RequestInfo, Resources, Value, Vars};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Optional HTTP method restriction of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    Any,
    Only(Method),
}

impl MethodFilter {
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(expected) => expected == method,
        }
    }
}

impl FromStr for MethodFilter {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s.trim().to_ascii_uppercase().as_str() {
            "" | "*" => return Ok(MethodFilter::Any),
            "OPTIONS" => Method::OPTIONS,
            "HEAD" => Method::HEAD,
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "TRACE" => Method::TRACE,
            _ => return Err(CompileError::UnsupportedMethod(s.to_string())),
        };
        Ok(MethodFilter::Only(method))
    }
}

/// A compiled rule.
pub struct Rule {
    pub guard: Expression,
    pub method: MethodFilter,
    pub latency: Duration,
    pub response: ResponseHandler,
}

impl Rule {
    pub fn compile(config: &RuleConfig) -> Result<Self, CompileError> {
        let method = match &config.method {
            Some(method) => method.parse()?,
            None => MethodFilter::Any,
        };
        Ok(Self {
            guard: parse(&config.rule_expression)?,
            method,
            latency: latency(config.latency)?,
            response: ResponseHandler::compile(&config.response)?,
        })
    }
}

pub(crate) fn latency(millis: i64) -> Result<Duration, CompileError> {
    u64::try_from(millis)
        .map(Duration::from_millis)
        .map_err(|_| CompileError::NegativeLatency(millis))
}

/// Immutable after construction; shared by every request.
pub struct Router {
    rules: Vec<Rule>,
    vars: Vars,
    resources: Arc<Resources>,
}

impl Router {
    pub fn new(config: &Config, resources: Arc<Resources>) -> Result<Self, CompileError> {
        let (vars, errors) = config.variables();
        if let Some(first) = errors.into_iter().next() {
            return Err(CompileError::Variable(first));
        }

        let rules = config
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                Rule::compile(rule).map_err(|source| CompileError::Rule {
                    index,
                    source: Box::new(source),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            rules,
            vars,
            resources,
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn context<'a>(&'a self, request: &'a RequestInfo) -> EvaluationContext<'a> {
        EvaluationContext::new(&self.vars, request, &self.resources)
    }

    /// Index of the first rule matching `request`.
    ///
    /// A true guard with a non-matching method filter does not stop the scan.
    pub fn select(&self, request: &RequestInfo) -> Result<Option<usize>, HandlerError> {
        let ctx = self.context(request);
        for (index, rule) in self.rules.iter().enumerate() {
            let matched = match rule.guard.evaluate(&ctx)? {
                Value::Bool(matched) => matched,
                other => return Err(HandlerError::GuardNotBool(other.type_name())),
            };
            if !matched {
                continue;
            }
            if !rule.method.matches(&request.method) {
                debug!(
                    "Rule #{} matched but method {} is filtered out",
                    index, request.method
                );
                continue;
            }
            return Ok(Some(index));
        }
        Ok(None)
    }

    /// Render the response of rule `index`.
    pub fn render(&self, index: usize, request: &RequestInfo) -> Result<MockResponse, HandlerError> {
        match self.rules.get(index) {
            Some(rule) => rule.response.render(&self.context(request)),
            None => Ok(MockResponse::not_found()),
        }
    }

    pub fn latency(&self, index: usize) -> Duration {
        self.rules
            .get(index)
            .map(|rule| rule.latency)
            .unwrap_or_default()
    }

    /// Route one request end to end.
    ///
    /// Evaluation runs on the blocking pool since `link` and `file` do
    /// synchronous I/O. Latency is an async sleep between selection and
    /// rendering.
    pub async fn dispatch(self: &Arc<Self>, request: Arc<RequestInfo>) -> MockResponse {
        match self.try_dispatch(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!("Request evaluation failed: {}", err);
                MockResponse::error(&err)
            }
        }
    }

    async fn try_dispatch(
        self: &Arc<Self>,
        request: Arc<RequestInfo>,
    ) -> Result<MockResponse, HandlerError> {
        let router = Arc::clone(self);
        let req = Arc::clone(&request);
        let selected = tokio::task::spawn_blocking(move || router.select(&req)).await??;

        let Some(index) = selected else {
            debug!("No rule matched {} {}", request.method, request.uri);
            return Ok(MockResponse::not_found());
        };
        debug!("Rule #{} matched {} {}", index, request.method, request.uri);

        let latency = self.latency(index);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let router = Arc::clone(self);
        tokio::task::spawn_blocking(move || router.render(index, &request)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::StatusCode;

    fn router(yaml: &str) -> Arc<Router> {
        let config = Config::parse(yaml).unwrap();
        Arc::new(Router::new(&config, Arc::new(Resources::default())).unwrap())
    }

    fn request(method: Method, uri: &str) -> Arc<RequestInfo> {
        Arc::new(RequestInfo::new(
            method,
            uri.parse().unwrap(),
            Default::default(),
        ))
    }

    #[test]
    fn test_method_filter_parsing() {
        assert_eq!("get".parse::<MethodFilter>().unwrap(), MethodFilter::Only(Method::GET));
        assert_eq!("*".parse::<MethodFilter>().unwrap(), MethodFilter::Any);
        assert_eq!("".parse::<MethodFilter>().unwrap(), MethodFilter::Any);
        assert_eq!(
            "PATCH".parse::<MethodFilter>().unwrap_err().to_string(),
            "HTTP method 'PATCH' is not supported"
        );
    }

    #[test]
    fn test_first_match_wins() {
        let router = router(
            r#"
pattern_list:
  - rule_expression: '${true}'
    response: {body: first, status_code: 201}
  - rule_expression: '${true}'
    response: {body: second, status_code: 202}
"#,
        );
        let req = request(Method::GET, "/");
        assert_eq!(router.select(&req).unwrap(), Some(0));
        let response = router.render(0, &req).unwrap();
        assert_eq!(response.status, StatusCode::CREATED);
    }

    #[test]
    fn test_no_rules_selects_nothing() {
        let router = router("pattern_list: []");
        assert!(router.is_empty());
        assert_eq!(router.select(&request(Method::GET, "/")).unwrap(), None);
    }

    #[test]
    fn test_method_mismatch_continues_scan() {
        let router = router(
            r#"
pattern_list:
  - rule_expression: '${true}'
    method: GET
    response: {body: get-only}
  - rule_expression: '${eq(request_url_path(), "/x")}'
    response: {body: fallback}
"#,
        );
        assert_eq!(router.select(&request(Method::GET, "/x")).unwrap(), Some(0));
        assert_eq!(router.select(&request(Method::POST, "/x")).unwrap(), Some(1));
        assert_eq!(router.select(&request(Method::POST, "/y")).unwrap(), None);
    }

    #[test]
    fn test_guard_must_be_bool() {
        let router = router(
            r#"
pattern_list:
  - rule_expression: '${"yes"}'
    response: {body: never}
"#,
        );
        let err = router.select(&request(Method::GET, "/")).unwrap_err();
        assert!(matches!(err, HandlerError::GuardNotBool("string")));
    }

    #[test]
    fn test_compile_errors_name_the_rule() {
        let config = Config::parse(
            r#"
pattern_list:
  - rule_expression: '${true}'
    response: ok
  - rule_expression: '${and(true,}'
    response: ok
"#,
        )
        .unwrap();
        let err = Router::new(&config, Arc::new(Resources::default()))
            .err()
            .unwrap();
        assert!(err.to_string().starts_with("rule #1: "));

        let config = Config::parse(
            "pattern_list:\n  - rule_expression: '${true}'\n    latency: -5\n    response: ok\n",
        )
        .unwrap();
        let err = Router::new(&config, Arc::new(Resources::default()))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            CompileError::Rule { index: 0, ref source } if matches!(**source, CompileError::NegativeLatency(-5))
        ));
    }

    #[tokio::test]
    async fn test_dispatch_applies_latency() {
        let router = router(
            r#"
pattern_list:
  - rule_expression: '${true}'
    latency: 50
    response: {body: slow}
"#,
        );
        let started = std::time::Instant::now();
        let response = router.dispatch(request(Method::GET, "/")).await;
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, bytes::Bytes::from("slow"));
    }

    #[tokio::test]
    async fn test_dispatch_turns_errors_into_500() {
        let router = router(
            r#"
vars: {a: 1}
pattern_list:
  - rule_expression: '${var("b")}'
    response: {body: never}
"#,
        );
        let response = router.dispatch(request(Method::GET, "/")).await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.body,
            bytes::Bytes::from("evaluation error: cannot find a variable named 'b'")
        );

        let empty = self::router("{}");
        let response = empty.dispatch(request(Method::GET, "/")).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }
}
