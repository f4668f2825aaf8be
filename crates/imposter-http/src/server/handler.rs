//! Per-request pipeline: logging, recording store, router, CORS.

use super::headers::{apply_cors, log_request};
use crate::response::MockResponse;
use crate::router::Router;
use crate::store::RecordStore;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use imposter_expr::RequestInfo;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::warn;

/// State shared by every connection.
pub struct HandlerState {
    pub router: Arc<Router>,
    pub store: Option<RecordStore>,
    pub cors: bool,
}

/// Handle one request. Never fails: every error becomes a response.
pub async fn handle_request(
    state: &HandlerState,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    log_request(&parts);

    let head = parts.method == Method::HEAD;
    let request = RequestInfo::new(parts.method, parts.uri, parts.headers);

    let mut response = match &state.store {
        Some(store) if RecordStore::accepts_write(&request.method) => {
            match body.collect().await {
                Ok(collected) => store.write(&request, collected.to_bytes()),
                Err(err) => {
                    warn!("Failed to read request body: {}", err);
                    MockResponse::text(
                        StatusCode::BAD_REQUEST,
                        format!("could not read request body: {err}"),
                    )
                }
            }
        }
        Some(store) => match store.read(&request) {
            Some(replay) => replay,
            None => state.router.dispatch(Arc::new(request)).await,
        },
        None => state.router.dispatch(Arc::new(request)).await,
    };

    if state.cors {
        apply_cors(&mut response.headers);
    }
    Ok(response.into_hyper(head))
}
