//! Authenticated session state shared by the request pipeline and callers.

use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::jwt;
use crate::error::{Error, Result};
use crate::storage::{MemorySessionStorage, SessionStorage, StoredSession};

/// In-memory view of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub token: Option<String>,
    pub user: Option<Value>,
    pub logged_in: bool,
}

impl From<StoredSession> for SessionState {
    fn from(record: StoredSession) -> Self {
        Self {
            token: record.token,
            user: record.user,
            logged_in: record.is_logged_in,
        }
    }
}

impl From<&SessionState> for StoredSession {
    fn from(state: &SessionState) -> Self {
        Self {
            token: state.token.clone(),
            user: state.user.clone(),
            is_logged_in: state.logged_in,
        }
    }
}

/// Holds the current token and user and mirrors them to durable storage.
///
/// Thread-safe: one instance is shared behind an `Arc` by the HTTP client,
/// the unauthorized handler and API callers.
pub struct Session {
    state: RwLock<SessionState>,
    storage: Arc<dyn SessionStorage>,
    hydrated: AtomicBool,
}

impl Session {
    /// Create a session persisted through `storage`. Nothing is loaded until
    /// [`init`](Self::init) is called.
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            state: RwLock::new(SessionState::default()),
            storage,
            hydrated: AtomicBool::new(false),
        }
    }

    /// A session that is never written anywhere.
    pub fn ephemeral() -> Self {
        Self::new(Arc::new(MemorySessionStorage::new()))
    }

    /// Hydrate from storage.
    ///
    /// Idempotent: after the first successful hydration, or when a token has
    /// already been set in memory, this does nothing. A malformed stored
    /// record is logged and treated as no session. Returns whether a stored
    /// session was restored.
    pub async fn init(&self) -> Result<bool> {
        if self.hydrated.load(Ordering::Acquire) {
            return Ok(false);
        }

        let mut state = self.state.write().await;
        if self.hydrated.load(Ordering::Acquire) || state.token.is_some() {
            self.hydrated.store(true, Ordering::Release);
            return Ok(false);
        }

        let record = match self.storage.load().await {
            Ok(record) => record,
            Err(Error::StorageSerialization(e)) => {
                warn!(storage = self.storage.name(), error = %e, "Ignoring malformed stored session");
                None
            }
            Err(e) => return Err(e),
        };
        self.hydrated.store(true, Ordering::Release);

        match record {
            Some(record) if record.token.is_some() => {
                *state = record.into();
                debug!(storage = self.storage.name(), "Session restored");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Record a successful login: token, user and the logged-in flag are
    /// persisted as a group, then published in memory.
    pub async fn establish(&self, token: impl Into<String>, user: Option<Value>) -> Result<()> {
        let next = SessionState {
            token: Some(token.into()),
            user,
            logged_in: true,
        };
        self.storage.save(&StoredSession::from(&next)).await?;

        *self.state.write().await = next;
        self.hydrated.store(true, Ordering::Release);
        info!("Session established");
        Ok(())
    }

    /// Replace the token, keeping the user (token refresh).
    pub async fn set_token(&self, token: impl Into<String>) -> Result<()> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        next.token = Some(token.into());
        self.storage.save(&StoredSession::from(&next)).await?;
        *state = next;
        debug!("Session token replaced");
        Ok(())
    }

    /// Shallow-merge `patch` into the stored user and persist.
    ///
    /// Object patches are merged key by key into an object user; any other
    /// combination replaces the user outright.
    pub async fn update_user(&self, patch: Value) -> Result<Value> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let merged = match (next.user.take(), patch) {
            (Some(Value::Object(mut user)), Value::Object(patch)) => {
                user.extend(patch);
                Value::Object(user)
            }
            (_, patch) => patch,
        };
        next.user = Some(merged.clone());
        self.storage.save(&StoredSession::from(&next)).await?;
        *state = next;
        Ok(merged)
    }

    /// Drop the in-memory state and the persisted group.
    ///
    /// Memory is always cleared; a storage failure is reported afterwards.
    pub async fn clear(&self) -> Result<()> {
        *self.state.write().await = SessionState::default();
        self.storage.clear().await?;
        info!("Session cleared");
        Ok(())
    }

    pub async fn token(&self) -> Option<String> {
        self.state.read().await.token.clone()
    }

    pub async fn user(&self) -> Option<Value> {
        self.state.read().await.user.clone()
    }

    /// Read-only snapshot of the whole state.
    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// A token is present and its `exp` claim lies in the future.
    pub async fn is_valid(&self) -> bool {
        self.state
            .read()
            .await
            .token
            .as_deref()
            .is_some_and(jwt::is_token_valid)
    }

    /// Logged-in flag set and the token still valid.
    pub async fn is_logged_in(&self) -> bool {
        let state = self.state.read().await;
        state.logged_in && state.token.as_deref().is_some_and(jwt::is_token_valid)
    }

    pub fn storage_name(&self) -> &str {
        self.storage.name()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("storage", &self.storage.name())
            .field("hydrated", &self.hydrated.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::make_token;
    use crate::storage::FileSessionStorage;
    use serde_json::json;

    fn valid_token() -> String {
        make_token(&json!({"exp": chrono::Utc::now().timestamp() + 3600}))
    }

    #[tokio::test]
    async fn test_init_restores_stored_session() {
        let token = valid_token();
        let storage = Arc::new(MemorySessionStorage::with_record(StoredSession {
            token: Some(token.clone()),
            user: Some(json!({"id": 1})),
            is_logged_in: true,
        }));
        let session = Session::new(storage);

        assert!(session.init().await.unwrap());
        assert_eq!(session.token().await, Some(token));
        assert!(session.is_logged_in().await);

        // Second call is a no-op.
        assert!(!session.init().await.unwrap());
    }

    #[tokio::test]
    async fn test_init_skips_when_state_already_set() {
        let storage = Arc::new(MemorySessionStorage::with_record(StoredSession {
            token: Some("old".into()),
            user: None,
            is_logged_in: true,
        }));
        let session = Session::new(storage);
        session.establish("fresh", None).await.unwrap();

        assert!(!session.init().await.unwrap());
        assert_eq!(session.token().await.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_init_malformed_record_is_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "[garbage").unwrap();

        let session = Session::new(Arc::new(FileSessionStorage::new(&path)));
        assert!(!session.init().await.unwrap());
        assert!(session.token().await.is_none());
        assert!(!session.is_valid().await);
    }

    #[tokio::test]
    async fn test_establish_persists_group() {
        let storage = Arc::new(MemorySessionStorage::new());
        let session = Session::new(storage.clone());

        session.establish("t", Some(json!({"id": 1}))).await.unwrap();

        let stored = storage.load().await.unwrap().unwrap();
        assert_eq!(stored.token.as_deref(), Some("t"));
        assert_eq!(stored.user, Some(json!({"id": 1})));
        assert!(stored.is_logged_in);
    }

    #[tokio::test]
    async fn test_clear_wipes_memory_and_storage() {
        let storage = Arc::new(MemorySessionStorage::new());
        let session = Session::new(storage.clone());
        session.establish(valid_token(), None).await.unwrap();

        session.clear().await.unwrap();
        assert_eq!(session.snapshot().await, SessionState::default());
        assert!(storage.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_user_merges_and_persists() {
        let storage = Arc::new(MemorySessionStorage::new());
        let session = Session::new(storage.clone());
        session
            .establish("t", Some(json!({"id": 1, "name": "a"})))
            .await
            .unwrap();

        let merged = session
            .update_user(json!({"name": "b", "avatarUrl": "/a.png"}))
            .await
            .unwrap();
        assert_eq!(merged, json!({"id": 1, "name": "b", "avatarUrl": "/a.png"}));

        let stored = storage.load().await.unwrap().unwrap();
        assert_eq!(stored.user, Some(merged));
    }

    #[tokio::test]
    async fn test_set_token_keeps_user() {
        let session = Session::ephemeral();
        session.establish("t1", Some(json!({"id": 3}))).await.unwrap();
        session.set_token("t2").await.unwrap();

        let state = session.snapshot().await;
        assert_eq!(state.token.as_deref(), Some("t2"));
        assert_eq!(state.user, Some(json!({"id": 3})));
        assert!(state.logged_in);
    }

    #[tokio::test]
    async fn test_validity_requires_unexpired_token() {
        let session = Session::ephemeral();
        assert!(!session.is_valid().await);

        let expired = make_token(&json!({"exp": chrono::Utc::now().timestamp() - 60}));
        session.establish(expired, None).await.unwrap();
        assert!(!session.is_valid().await);
        assert!(!session.is_logged_in().await);

        session.set_token(valid_token()).await.unwrap();
        assert!(session.is_valid().await);
        assert!(session.is_logged_in().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_writes_to_file_storage_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileSessionStorage::new(dir.path().join("session.json")));
        let session = Session::new(storage.clone());
        session.establish("t1", Some(json!({"id": 1}))).await.unwrap();

        let (a, b, c) = tokio::join!(
            session.update_user(json!({"nickname": "al"})),
            session.update_user(json!({"avatar": "/a.png"})),
            session.set_token("t2"),
        );
        a.unwrap();
        b.unwrap();
        c.unwrap();

        let expected = json!({"id": 1, "nickname": "al", "avatar": "/a.png"});
        assert_eq!(session.user().await, Some(expected.clone()));
        let stored = storage.load().await.unwrap().unwrap();
        assert_eq!(stored.token.as_deref(), Some("t2"));
        assert_eq!(stored.user, Some(expected));
    }
}
