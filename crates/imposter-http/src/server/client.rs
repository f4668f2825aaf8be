//! Outbound HTTP client behind the `link` built-in.
//!
//! Evaluation is synchronous and runs on tokio's blocking pool, so the
//! fetcher drives the shared async client through a runtime handle.

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::Request;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use imposter_expr::{EvalError, Fetcher, HttpRsp};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Type alias for the HTTP client used by `link`.
pub type HttpClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Empty<Bytes>>;

/// Create the shared client with connection pooling.
pub fn create_http_client(timeout: Duration) -> Result<HttpClient, anyhow::Error> {
    let mut http_connector = HttpConnector::new();
    http_connector.set_connect_timeout(Some(timeout));
    http_connector.enforce_http(false);

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = match hyper_rustls::HttpsConnectorBuilder::new()
        .with_provider_and_native_roots(Arc::clone(&provider))
    {
        Ok(builder) => builder,
        Err(err) => {
            warn!(
                "Could not load native root certificates ({}); https links will fail verification",
                err
            );
            let tls_config = rustls::ClientConfig::builder_with_provider(provider)
                .with_safe_default_protocol_versions()
                .map_err(|e| anyhow::anyhow!("Failed to build TLS client configuration: {e}"))?
                .with_root_certificates(rustls::RootCertStore::empty())
                .with_no_client_auth();
            hyper_rustls::HttpsConnectorBuilder::new().with_tls_config(tls_config)
        }
    };
    let https_connector = builder
        .https_or_http()
        .enable_http1()
        .wrap_connector(http_connector);

    Ok(Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(90))
        .build(https_connector))
}

/// `GET`s a URL on behalf of the `link` built-in.
pub struct LinkClient {
    client: HttpClient,
    handle: Handle,
    timeout: Duration,
}

impl LinkClient {
    /// Must be called from within a tokio runtime. `fetch` must then be
    /// called from a blocking thread, never from an async task.
    pub fn new(timeout: Duration) -> Result<Self, anyhow::Error> {
        Ok(Self {
            client: create_http_client(timeout)?,
            handle: Handle::current(),
            timeout,
        })
    }

    async fn get(&self, url: &str) -> Result<HttpRsp, String> {
        let request = Request::get(url)
            .body(Empty::new())
            .map_err(|e| e.to_string())?;
        let response = self.client.request(request).await.map_err(|e| e.to_string())?;
        let (parts, body) = response.into_parts();
        let body = body.collect().await.map_err(|e| e.to_string())?.to_bytes();

        Ok(HttpRsp {
            body,
            headers: parts.headers,
            status_code: parts.status.as_u16(),
        })
    }
}

impl Fetcher for LinkClient {
    fn fetch(&self, url: &str) -> Result<HttpRsp, EvalError> {
        let link_error = |reason: String| EvalError::Link {
            url: url.to_string(),
            reason,
        };
        debug!("GET {} (timeout {:?})", url, self.timeout);
        self.handle.block_on(async {
            match tokio::time::timeout(self.timeout, self.get(url)).await {
                Ok(result) => result.map_err(link_error),
                Err(_) => Err(link_error(format!("timed out after {:?}", self.timeout))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_reports_connection_errors() {
        let client = Arc::new(LinkClient::new(Duration::from_secs(2)).unwrap());
        let err = tokio::task::spawn_blocking(move || client.fetch("http://127.0.0.1:1/"))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, EvalError::Link { ref url, .. } if url == "http://127.0.0.1:1/"));
    }
}
