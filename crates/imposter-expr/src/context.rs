//! Evaluation context: the variable bag, the live request and the shared
//! resources (random source, outbound HTTP, file limits) that built-ins use.

use crate::error::EvalError;
use crate::value::{HttpRsp, Value};
use hyper::header::{HeaderName, HOST};
use hyper::{HeaderMap, Method, Uri};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Read-only variables supplied by configuration, looked up with `var(...)`.
pub type Vars = HashMap<String, Value>;

/// Default upper bound for files read by the `file` built-in (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Default upper bound for strings generated by `rnd_string` (1 MiB).
pub const DEFAULT_MAX_STRING_LENGTH: usize = 1024 * 1024;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// The parts of an inbound HTTP request that built-ins can inspect.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestInfo {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    /// First value of the named header, or an empty string.
    pub fn header(&self, name: &str) -> String {
        HeaderName::try_from(name)
            .ok()
            .and_then(|name| self.headers.get(name))
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    /// Host the request was addressed to: the URI authority for absolute-form
    /// requests, the `Host` header otherwise.
    pub fn host(&self) -> String {
        match self.uri.authority() {
            Some(authority) => authority.to_string(),
            None => self
                .headers
                .get(HOST)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string(),
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn raw_query(&self) -> &str {
        self.uri.query().unwrap_or_default()
    }

    /// First decoded value of the named query parameter, or an empty string.
    pub fn query_param(&self, name: &str) -> String {
        for pair in self.raw_query().split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            if decode_component(key) == name {
                return decode_component(value);
            }
        }
        String::new()
    }
}

fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    match urlencoding::decode(&raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw,
    }
}

/// Performs the outbound `GET` behind the `link` built-in.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<HttpRsp, EvalError>;
}

/// Fetcher used when no HTTP client is configured; every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineFetcher;

impl Fetcher for OfflineFetcher {
    fn fetch(&self, url: &str) -> Result<HttpRsp, EvalError> {
        Err(EvalError::Link {
            url: url.to_string(),
            reason: "no HTTP client configured".to_string(),
        })
    }
}

/// Thread-safe random source shared by `rnd_string` and `rnd_int`.
pub struct RandomSource {
    rng: Mutex<StdRng>,
}

impl RandomSource {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic source, mostly useful in tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Uniform integer in `[min, max)`. Callers guarantee `min < max`.
    pub fn int_in(&self, min: i64, max: i64) -> i64 {
        self.rng.lock().gen_range(min..max)
    }

    /// String of `len` ASCII letters. The shared lock is only held to draw a
    /// seed.
    pub fn letters(&self, len: usize) -> String {
        let seed: u64 = self.rng.lock().gen();
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len)
            .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
            .collect()
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl fmt::Debug for RandomSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomSource").finish_non_exhaustive()
    }
}

/// Process-lifetime resources injected into every evaluation.
pub struct Resources {
    pub random: RandomSource,
    pub fetcher: Arc<dyn Fetcher>,
    pub max_file_size: u64,
    pub max_string_length: usize,
}

impl Resources {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            random: RandomSource::from_entropy(),
            fetcher,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
        }
    }

    pub fn with_random(mut self, random: RandomSource) -> Self {
        self.random = random;
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn with_max_string_length(mut self, max_string_length: usize) -> Self {
        self.max_string_length = max_string_length;
        self
    }
}

impl Default for Resources {
    fn default() -> Self {
        Self::new(Arc::new(OfflineFetcher))
    }
}

impl fmt::Debug for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resources")
            .field("random", &self.random)
            .field("max_file_size", &self.max_file_size)
            .field("max_string_length", &self.max_string_length)
            .finish_non_exhaustive()
    }
}

/// Everything one evaluation may read. Built fresh for each request.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub vars: &'a Vars,
    pub request: &'a RequestInfo,
    pub resources: &'a Resources,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(vars: &'a Vars, request: &'a RequestInfo, resources: &'a Resources) -> Self {
        Self {
            vars,
            request,
            resources,
        }
    }
}
