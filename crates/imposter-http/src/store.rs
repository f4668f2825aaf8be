//! In-memory recording store.
//!
//! With recording enabled, `PUT` stores the request body under a key built
//! from the selected URI parts and `GET`/`HEAD` replay it. Anything else, and
//! reads of unknown keys, fall through to the router.

use crate::response::{http_date_now, MockResponse};
use bytes::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE, DATE, LAST_MODIFIED};
use hyper::{HeaderMap, Method, StatusCode};
use imposter_expr::RequestInfo;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// URI parts that make up a recording key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordKey {
    pub scheme: bool,
    pub host: bool,
    pub path: bool,
    pub query: bool,
}

impl RecordKey {
    /// Build the key for `request`. Scheme and query only contribute when present.
    pub fn key_for(&self, request: &RequestInfo) -> String {
        let mut key = String::new();
        if self.scheme {
            if let Some(scheme) = request.uri.scheme_str() {
                key.push_str(scheme);
                key.push_str("://");
            }
        }
        if self.host {
            key.push_str(&request.host());
        }
        if self.path {
            key.push_str(request.path());
        }
        if self.query && !request.raw_query().is_empty() {
            key.push('?');
            key.push_str(request.raw_query());
        }
        key
    }
}

#[derive(Debug, thiserror::Error)]
#[error(
    "'{0}' is not a valid flag: select multiple values from {{'scheme', 'host', 'path', 'query'}} separated by pipe (|)"
)]
pub struct InvalidRecordKey(String);

impl FromStr for RecordKey {
    type Err = InvalidRecordKey;

    /// Parses `scheme|host|path|query` (any subset, any order).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut key = RecordKey::default();
        for flag in s.split('|').map(str::trim) {
            match flag {
                "scheme" => key.scheme = true,
                "host" => key.host = true,
                "path" => key.path = true,
                "query" => key.query = true,
                other => return Err(InvalidRecordKey(other.to_string())),
            }
        }
        Ok(key)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags: Vec<&str> = [
            (self.scheme, "scheme"),
            (self.host, "host"),
            (self.path, "path"),
            (self.query, "query"),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, name)| *name)
        .collect();
        write!(f, "{}", flags.join("|"))
    }
}

#[derive(Debug, Clone)]
struct StoredEntry {
    headers: HeaderMap,
    body: Bytes,
}

/// Recorded bodies keyed by URI parts.
pub struct RecordStore {
    key: RecordKey,
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl RecordStore {
    pub fn new(key: RecordKey) -> Self {
        Self {
            key,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Whether this store wants to see the request body.
    pub fn accepts_write(method: &Method) -> bool {
        method == Method::PUT
    }

    /// Store `body`; 202 for a new key, 204 when an entry was replaced.
    pub fn write(&self, request: &RequestInfo, body: Bytes) -> MockResponse {
        let key = self.key.key_for(request);
        let now = http_date_now();

        let mut headers = HeaderMap::new();
        if let Ok(now) = HeaderValue::from_str(&now) {
            headers.insert(LAST_MODIFIED, now.clone());
            headers.insert(DATE, now);
        }
        if let Some(content_type) = request.headers.get(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, content_type.clone());
        }

        let replaced = self
            .entries
            .write()
            .insert(key.clone(), StoredEntry { headers, body })
            .is_some();
        debug!("Recorded '{}' (replaced: {})", key, replaced);

        if replaced {
            MockResponse::new(StatusCode::NO_CONTENT)
        } else {
            MockResponse::new(StatusCode::ACCEPTED)
        }
    }

    /// Replay a stored entry for `GET`/`HEAD`.
    pub fn read(&self, request: &RequestInfo) -> Option<MockResponse> {
        if request.method != Method::GET && request.method != Method::HEAD {
            return None;
        }
        let key = self.key.key_for(request);
        let entries = self.entries.read();
        let entry = entries.get(&key)?;
        debug!("Replaying recorded '{}'", key);
        Some(MockResponse {
            status: StatusCode::OK,
            headers: entry.headers.clone(),
            body: entry.body.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
