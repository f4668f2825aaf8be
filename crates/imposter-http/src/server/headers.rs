//! CORS headers and request logging.

use hyper::header::{
    HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, HOST,
};
use hyper::http::request::Parts;
use hyper::HeaderMap;
use tracing::{debug, info};

static WILDCARD: HeaderValue = HeaderValue::from_static("*");

static CORS_HEADERS: [HeaderName; 3] = [
    ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_HEADERS,
];

/// Allow any origin, method and header.
pub fn apply_cors(headers: &mut HeaderMap) {
    for name in &CORS_HEADERS {
        headers.insert(name.clone(), WILDCARD.clone());
    }
}

/// Request line and host at `info`, headers at `debug`.
pub fn log_request(parts: &Parts) {
    let host = parts
        .uri
        .authority()
        .map(|authority| authority.as_str())
        .or_else(|| parts.headers.get(HOST).and_then(|v| v.to_str().ok()))
        .unwrap_or("-");
    info!(
        "{} {} {:?} host={}",
        parts.method, parts.uri, parts.version, host
    );
    for (name, value) in &parts.headers {
        debug!("  {}: {}", name, String::from_utf8_lossy(value.as_bytes()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_cors() {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("https://example.com"),
        );
        apply_cors(&mut headers);
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "*");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], "*");
        assert_eq!(headers.len(), 3);
    }
}
