//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::MockServer;

use chatdesk::storage::{MemorySessionStorage, StoredSession};
use chatdesk::{ChatdeskClient, Config, RouteState};

pub struct Harness {
    pub client: ChatdeskClient,
    pub storage: Arc<MemorySessionStorage>,
    pub nav: Arc<RouteState>,
}

/// Client pointed at `server` with in-memory storage, sitting on `/chat`.
pub async fn harness(server: &MockServer) -> Harness {
    harness_with(server, Config::default(), None).await
}

/// Client whose storage already holds a logged-in session for `token`.
pub async fn logged_in(server: &MockServer, token: &str) -> Harness {
    let record = StoredSession {
        token: Some(token.to_string()),
        user: Some(json!({ "id": 1, "username": "alice" })),
        is_logged_in: true,
    };
    harness_with(server, Config::default(), Some(record)).await
}

pub async fn harness_with(
    server: &MockServer,
    config: Config,
    record: Option<StoredSession>,
) -> Harness {
    let storage = Arc::new(match record {
        Some(record) => MemorySessionStorage::with_record(record),
        None => MemorySessionStorage::new(),
    });
    let nav = Arc::new(RouteState::new("/chat"));
    let client = ChatdeskClient::builder()
        .config(config)
        .base_url(server.uri())
        .storage(storage.clone())
        .navigator(nav.clone())
        .build()
        .await
        .unwrap();
    Harness {
        client,
        storage,
        nav,
    }
}

/// `{ code, message, data }` body.
pub fn envelope(code: i64, data: Value) -> Value {
    json!({ "code": code, "message": "ok", "data": data })
}

/// Unsigned JWT whose `exp` is `offset_secs` from now.
pub fn jwt_expiring_in(offset_secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + offset_secs;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({ "sub": "1", "exp": exp }).to_string());
    format!("{header}.{payload}.sig")
}
