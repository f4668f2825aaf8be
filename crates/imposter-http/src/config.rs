//! Rule file model and loading.
//!
//! A rule file is JSON or YAML:
//!
//! ```yaml
//! vars:
//!   greeting: hello
//! pattern_list:
//!   - rule_expression: '${eq(request_url_path(), "/hello")}'
//!     method: GET
//!     latency: 250
//!     response:
//!       body: '${var("greeting")}'
//!       headers:
//!         Content-Type: text/plain
//!       status_code: 200
//!   - rule_expression: '${true}'
//!     response: '${redirect("/hello")}'
//! ```

use imposter_expr::{Value, Vars};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// Status code expression used when a structured response omits one.
pub const DEFAULT_STATUS_CODE: &str = "${200}";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Ordered rule list; the first matching rule answers.
    #[serde(rename = "pattern_list", default)]
    pub rules: Vec<RuleConfig>,

    /// Read-only variables available through `var(...)`.
    #[serde(default)]
    pub vars: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub rule_expression: String,

    /// HTTP method filter; absent or `*` matches any method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Artificial delay in milliseconds applied before the response is computed.
    #[serde(default)]
    pub latency: i64,

    pub response: ResponseConfig,
}

/// A response is either one expression producing a whole `HTTPRsp`
/// (`link`, `redirect`) or a structured object whose fields are expressions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseConfig {
    Computed(String),
    Structured(MatchRsp),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchRsp {
    #[serde(default)]
    pub body: String,

    /// Header values must be strings; anything else is rejected when compiled.
    #[serde(default)]
    pub headers: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub cookies: BTreeMap<String, CookieConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<StatusCodeConfig>,
}

impl MatchRsp {
    /// Status code as an expression source, `${200}` when unset.
    pub fn status_expression(&self) -> String {
        match &self.status_code {
            None => DEFAULT_STATUS_CODE.to_string(),
            Some(StatusCodeConfig::Code(code)) => format!("${{{code}}}"),
            Some(StatusCodeConfig::Expression(expr)) if expr.trim().is_empty() => {
                DEFAULT_STATUS_CODE.to_string()
            }
            Some(StatusCodeConfig::Expression(expr)) => expr.clone(),
        }
    }
}

/// `status_code: 404` is shorthand for `status_code: "${404}"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusCodeConfig {
    Code(i64),
    Expression(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CookieConfig {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub domain: String,
    /// HTTP date; empty for a session cookie.
    #[serde(default)]
    pub expires: String,
}

impl Config {
    /// Load configuration from a JSON or YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {e}", path.display())
        })?;
        Self::parse(&contents)
    }

    /// Load configuration from standard input.
    pub fn from_stdin() -> Result<Self, anyhow::Error> {
        let mut contents = String::new();
        std::io::stdin().read_to_string(&mut contents)?;
        Self::parse(&contents)
    }

    /// JSON is tried first, YAML second.
    pub fn parse(contents: &str) -> Result<Self, anyhow::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        match serde_json::from_str(contents) {
            Ok(config) => Ok(config),
            Err(json_err) => serde_yaml::from_str(contents).map_err(|yaml_err| {
                anyhow::anyhow!(
                    "Failed to parse configuration as JSON ({json_err}) or YAML ({yaml_err})"
                )
            }),
        }
    }

    /// Convert configured vars into expression values.
    ///
    /// Returns the converted bag plus one message per rejected entry.
    pub fn variables(&self) -> (Vars, Vec<String>) {
        let mut vars = Vars::with_capacity(self.vars.len());
        let mut errors = Vec::new();
        for (name, raw) in &self.vars {
            match convert_var(raw) {
                Ok(value) => {
                    vars.insert(name.clone(), value);
                }
                Err(reason) => errors.push(format!("variable '{name}': {reason}")),
            }
        }
        (vars, errors)
    }
}

fn convert_var(raw: &serde_json::Value) -> Result<Value, String> {
    match raw {
        serde_json::Value::Array(items) => {
            let items = items
                .iter()
                .map(convert_primitive)
                .collect::<Result<Vec<_>, _>>()?;
            if items.windows(2).any(|pair| !pair[0].same_type(&pair[1])) {
                return Err("mixed type arrays are not allowed".to_string());
            }
            Ok(Value::Array(items))
        }
        other => convert_primitive(other),
    }
}

fn convert_primitive(raw: &serde_json::Value) -> Result<Value, String> {
    match raw {
        serde_json::Value::String(s) => Ok(Value::Str(s.clone())),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Int(i)),
            None => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| format!("unsupported number '{n}'")),
        },
        serde_json::Value::Null => Err("null values are not supported".to_string()),
        serde_json::Value::Array(_) => Err("nested arrays are not supported".to_string()),
        serde_json::Value::Object(_) => Err("objects are not supported".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json() {
        let config = Config::parse(
            r#"{
                "vars": {"name": "world", "ids": [1, 2]},
                "pattern_list": [
                    {
                        "rule_expression": "${true}",
                        "method": "GET",
                        "latency": 10,
                        "response": {"body": "hello", "status_code": 201}
                    },
                    {
                        "rule_expression": "${false}",
                        "response": "${redirect(\"/x\")}"
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[0].method.as_deref(), Some("GET"));
        assert_eq!(config.rules[0].latency, 10);
        match &config.rules[0].response {
            ResponseConfig::Structured(rsp) => {
                assert_eq!(rsp.body, "hello");
                assert_eq!(rsp.status_expression(), "${201}");
            }
            other => panic!("unexpected response {other:?}"),
        }
        assert!(matches!(
            config.rules[1].response,
            ResponseConfig::Computed(ref s) if s == "${redirect(\"/x\")}"
        ));
        assert_eq!(config.rules[1].latency, 0);
    }

    #[test]
    fn test_parse_yaml() {
        let config = Config::parse(
            r#"
pattern_list:
  - rule_expression: '${eq(request_url_path(), "/a")}'
    response:
      body: a
      headers:
        Content-Type: text/plain
      cookies:
        session:
          value: abc
          path: /
      status_code: '${404}'
"#,
        )
        .unwrap();

        let rule = &config.rules[0];
        let ResponseConfig::Structured(rsp) = &rule.response else {
            panic!("expected structured response");
        };
        assert_eq!(rsp.headers["Content-Type"], "text/plain");
        assert_eq!(rsp.cookies["session"].value, "abc");
        assert_eq!(rsp.cookies["session"].expires, "");
        assert_eq!(rsp.status_expression(), "${404}");
    }

    #[test]
    fn test_default_status_code() {
        let rsp = MatchRsp::default();
        assert_eq!(rsp.status_expression(), "${200}");

        let rsp = MatchRsp {
            status_code: Some(StatusCodeConfig::Expression(String::new())),
            ..Default::default()
        };
        assert_eq!(rsp.status_expression(), "${200}");
    }

    #[test]
    fn test_empty_input_is_empty_config() {
        let config = Config::parse("  \n").unwrap();
        assert!(config.rules.is_empty());
        assert!(config.vars.is_empty());
    }

    #[test]
    fn test_invalid_input() {
        assert!(Config::parse("pattern_list: [ {").is_err());
    }

    #[test]
    fn test_variables() {
        let config = Config::parse(
            r#"{"vars": {"s": "x", "i": 3, "f": 1.5, "b": true, "a": ["p", "q"],
                         "mixed": [1, "a"], "obj": {"k": 1}, "nil": null}}"#,
        )
        .unwrap();
        let (vars, errors) = config.variables();

        assert_eq!(vars["s"], Value::from("x"));
        assert_eq!(vars["i"], Value::Int(3));
        assert_eq!(vars["f"], Value::Float(1.5));
        assert_eq!(vars["b"], Value::Bool(true));
        assert_eq!(
            vars["a"],
            Value::Array(vec![Value::from("p"), Value::from("q")])
        );
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.starts_with("variable 'mixed'")));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.yaml");
        std::fs::write(
            &path,
            "pattern_list:\n  - rule_expression: '${true}'\n    response: ok\n",
        )
        .unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.rules.len(), 1);

        assert!(Config::from_file(dir.path().join("missing.yaml")).is_err());
    }
}
