//! Built-in request-phase decoration: cache busting, bearer auth, trace id.

use reqwest::Method;
use reqwest::header::{self, HeaderMap, HeaderValue};
use uuid::Uuid;

use super::request::RequestDescriptor;

/// Header carrying the per-request trace id.
pub const REQUEST_ID: &str = "x-request-id";

/// Query parameter added to GET requests to defeat intermediary caches.
pub const CACHE_BUST_PARAM: &str = "_t";

fn bearer(token: &str) -> Option<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).ok()?;
    value.set_sensitive(true);
    Some(value)
}

/// Fresh opaque trace id.
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Apply the built-in mutations to an outgoing request and return the
/// request id that was stamped on it.
///
/// Caller-supplied `Authorization` and `X-Request-ID` headers are replaced.
pub fn decorate(req: &mut RequestDescriptor, token: Option<&str>) -> String {
    if req.method == Method::GET {
        let now = chrono::Utc::now().timestamp_millis();
        req.query.push((CACHE_BUST_PARAM.to_string(), now.to_string()));
    }

    if let Some(value) = token.and_then(bearer) {
        req.headers.insert(header::AUTHORIZATION, value);
    }

    let request_id = new_request_id();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        req.headers.insert(REQUEST_ID, value);
    }
    request_id
}

/// Headers for the streamed AI-reply request.
///
/// Adds `Connection: close` so the socket is released as soon as the body is
/// dropped, whether the stream ended or was cancelled.
pub fn streaming_headers(token: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::ACCEPT, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("close"));

    if let Some(value) = token.and_then(bearer) {
        headers.insert(header::AUTHORIZATION, value);
    }
    if let Ok(value) = HeaderValue::from_str(&new_request_id()) {
        headers.insert(REQUEST_ID, value);
    }

    headers
}
