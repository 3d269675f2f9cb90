//! HTTP client running every call through the request/response pipeline.

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::headers;
use super::interceptor::RequestHooks;
use super::request::{RequestBody, RequestDescriptor};
use super::response;
use crate::auth::{Session, UnauthorizedHandler};
use crate::config::ApiConfig;
use crate::error::{Error, Result};

/// Pipeline-aware HTTP client shared by every API group.
pub struct HttpClient {
    client: reqwest::Client,
    /// No whole-request timeout: reply streams may stay open for minutes.
    stream_client: reqwest::Client,
    base_url: String,
    session: Arc<Session>,
    unauthorized: Arc<UnauthorizedHandler>,
    hooks: RequestHooks,
}

impl HttpClient {
    pub fn new(
        api: &ApiConfig,
        session: Arc<Session>,
        unauthorized: Arc<UnauthorizedHandler>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(api.connect_timeout())
            .timeout(api.timeout())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Self::with_client(client, api, session, unauthorized)
    }

    /// Use a caller-supplied client for regular calls.
    pub fn with_client(
        client: reqwest::Client,
        api: &ApiConfig,
        session: Arc<Session>,
        unauthorized: Arc<UnauthorizedHandler>,
    ) -> Result<Self> {
        let stream_client = reqwest::Client::builder()
            .connect_timeout(api.connect_timeout())
            .build()
            .map_err(|e| Error::Config(format!("failed to build stream client: {}", e)))?;
        Ok(Self {
            client,
            stream_client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            session,
            unauthorized,
            hooks: RequestHooks::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path relative to the base URL.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub fn hooks(&self) -> &RequestHooks {
        &self.hooks
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn unauthorized_handler(&self) -> &Arc<UnauthorizedHandler> {
        &self.unauthorized
    }

    /// Issue a request and unwrap the response envelope.
    pub async fn send(&self, req: RequestDescriptor) -> Result<Value> {
        let response = self.execute(req).await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        let value = parse_body(&body);

        if !(200..300).contains(&status) {
            return Err(self.reject(status, value.as_ref()).await);
        }
        let value = match value {
            Some(value) => value,
            None if body.is_empty() => Value::Null,
            None => return Err(Error::Decode("response body is not JSON".into())),
        };
        if response::is_unauthorized(status, Some(&value)) {
            self.unauthorized.handle().await;
        }
        response::unwrap_envelope(value)
    }

    /// GET with query parameters taken from a JSON object.
    pub async fn get(&self, path: &str, params: Option<&Value>) -> Result<Value> {
        let mut req = RequestDescriptor::get(path);
        if let Some(params) = params {
            req = req.query_value(params);
        }
        self.send(req).await
    }

    /// POST with a JSON body; `Value::Null` sends no body.
    pub async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.send(with_json(RequestDescriptor::post(path), body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<Value> {
        self.send(with_json(RequestDescriptor::put(path), body)).await
    }

    pub async fn delete(&self, path: &str, body: Value) -> Result<Value> {
        self.send(with_json(RequestDescriptor::delete(path), body)).await
    }

    /// Issue a request and return the raw body.
    ///
    /// A JSON body carrying an envelope code is checked first, since the
    /// backend reports download failures that way.
    pub async fn download(&self, req: RequestDescriptor) -> Result<Bytes> {
        let response = self.execute(req).await?;
        let status = response.status().as_u16();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        let body = response.bytes().await?;
        let value = if is_json { parse_body(&body) } else { None };

        if !(200..300).contains(&status) {
            return Err(self.reject(status, value.as_ref()).await);
        }
        if let Some(value) = value {
            if value.get("code").is_some() {
                if response::is_unauthorized(status, Some(&value)) {
                    self.unauthorized.handle().await;
                }
                response::unwrap_envelope(value)?;
            }
        }
        Ok(body)
    }

    /// Open the streamed AI-reply request. Bypasses envelope normalization.
    ///
    /// Only the bearer token and trace id are attached; a non-2xx status is
    /// an error and does not run the unauthorized handler.
    pub async fn open_stream(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
        let token = self.session.token().await;
        let hdrs = headers::streaming_headers(token.as_deref());
        let url = self.url(path);
        debug!(url = %url, "Opening reply stream");

        let response = self
            .stream_client
            .post(&url)
            .headers(hdrs)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                message: format!("HTTP error, status: {}", status.as_u16()),
            });
        }
        Ok(response)
    }

    async fn execute(&self, mut req: RequestDescriptor) -> Result<reqwest::Response> {
        let token = self.session.token().await;
        let request_id = headers::decorate(&mut req, token.as_deref());
        self.hooks.apply(&mut req);

        let url = self.url(&req.path);
        debug!(
            method = %req.method,
            path = %req.path,
            request_id = %request_id,
            "Sending request"
        );

        let mut builder = self
            .client
            .request(req.method, &url)
            .headers(req.headers)
            .query(&req.query);
        if let Some(timeout) = req.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match req.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Multipart(form) => builder.multipart(form),
        };

        builder.send().await.map_err(|e| {
            let err = Error::from(e);
            warn!(request_id = %request_id, error = %err, "Request failed before a response");
            err
        })
    }

    async fn reject(&self, status: u16, body: Option<&Value>) -> Error {
        if response::is_unauthorized(status, body) {
            self.unauthorized.handle().await;
        }
        let err = response::classify_status(status, body);
        debug!(status, error = %err, "Request rejected");
        err
    }
}

fn with_json(req: RequestDescriptor, body: Value) -> RequestDescriptor {
    if body.is_null() { req } else { req.json(body) }
}

fn parse_body(body: &[u8]) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice(body).ok()
}

/// Timeout applied to uploads unless the caller sets one.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
