//! Offline configuration check used by `imposter validate`.
//!
//! Every expression is run in `Test` mode against an empty request with a
//! fetcher that cannot reach the network, so validation never performs I/O.
//! All problems are collected; nothing stops at the first error.

use crate::config::{Config, MatchRsp, ResponseConfig, RuleConfig};
use crate::error::CompileError;
use crate::response::{header_source, status_code, test_cookie};
use crate::router::{latency, MethodFilter};
use hyper::header::HeaderName;
use imposter_expr::{parse, EvaluationContext, Expression, RequestInfo, Resources, Value};
use serde::Serialize;

const SEPARATOR: &str = "\n--------------------\n";

/// Aggregated validation outcome.
#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub count: usize,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, error: String) {
        self.errors.push(error);
        self.count = self.errors.len();
    }

    /// Plain-text rendering: a header line, then errors split by a rule line.
    pub fn render_text(&self) -> String {
        if self.is_ok() {
            return String::new();
        }
        format!(
            "found {} errors:{SEPARATOR}{}",
            self.count,
            self.errors.join(SEPARATOR)
        )
    }

    pub fn render_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Check a whole configuration.
pub fn validate(config: &Config) -> ValidationReport {
    let mut report = ValidationReport::default();

    let (vars, var_errors) = config.variables();
    for error in var_errors {
        report.push(error);
    }

    let request = RequestInfo::default();
    let resources = Resources::default();
    let ctx = EvaluationContext::new(&vars, &request, &resources);

    for (index, rule) in config.rules.iter().enumerate() {
        RuleCheck {
            index,
            ctx: &ctx,
            report: &mut report,
        }
        .run(rule);
    }
    report
}

struct RuleCheck<'r, 'c> {
    index: usize,
    ctx: &'r EvaluationContext<'c>,
    report: &'r mut ValidationReport,
}

impl RuleCheck<'_, '_> {
    fn error(&mut self, field: &str, message: impl std::fmt::Display) {
        self.report
            .push(format!("rule #{} {}: {}", self.index, field, message));
    }

    fn run(&mut self, rule: &RuleConfig) {
        if let Some(method) = &rule.method {
            if let Err(err) = method.parse::<MethodFilter>() {
                self.error("method", err);
            }
        }
        if let Err(err) = latency(rule.latency) {
            self.error("latency", err);
        }

        if let Some(value) = self.test("rule_expression", &rule.rule_expression) {
            if !matches!(value, Value::Bool(_)) {
                self.error(
                    "rule_expression",
                    format!(
                        "expected 'bool' for any rule expression; got '{}' instead",
                        value.type_name()
                    ),
                );
            }
        }

        match &rule.response {
            ResponseConfig::Computed(source) => {
                if let Some(value) = self.test("response", source) {
                    if !matches!(value, Value::Response(_)) {
                        self.error(
                            "response",
                            format!(
                                "full response computing requires a function returning 'HTTPRsp'; got '{}' instead",
                                value.type_name()
                            ),
                        );
                    }
                }
            }
            ResponseConfig::Structured(rsp) => self.structured(rsp),
        }
    }

    fn structured(&mut self, rsp: &MatchRsp) {
        self.test("body", &rsp.body);

        for (name, raw) in &rsp.headers {
            let field = format!("header '{name}'");
            if HeaderName::try_from(name.as_str()).is_err() {
                self.error(&field, CompileError::InvalidHeaderName(name.clone()));
            }
            match header_source(name, raw) {
                Ok(source) => {
                    self.test(&field, source);
                }
                Err(err) => self.error(&field, err),
            }
        }

        for (name, cookie) in &rsp.cookies {
            if let Err(err) = test_cookie(name, cookie, self.ctx) {
                self.error(&format!("cookie '{name}'"), err);
            }
        }

        let status = rsp.status_expression();
        match self.test("status_code", &status) {
            Some(Value::Int(code)) => {
                // Only a literal is known before a request arrives.
                if matches!(parse(&status), Ok(Expression::IntegerIdentity(_))) {
                    if let Err(err) = status_code(code) {
                        self.error("status_code", err);
                    }
                }
            }
            Some(value) => self.error(
                "status_code",
                format!(
                    "expected an 'int' value for status code; got '{}' instead",
                    value.type_name()
                ),
            ),
            None => {}
        }
    }

    /// Parse and test one expression, recording any failure.
    fn test(&mut self, field: &str, source: &str) -> Option<Value> {
        let expr = match parse(source) {
            Ok(expr) => expr,
            Err(err) => {
                self.error(field, err);
                return None;
            }
        };
        match expr.test(self.ctx) {
            Ok(value) => Some(value),
            Err(err) => {
                self.error(field, err);
                None
            }
        }
    }
}
