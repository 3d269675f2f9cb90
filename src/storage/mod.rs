//! Durable backends for the session group.
//!
//! The token, user and logged-in flag are persisted together as one
//! [`StoredSession`] record and cleared together.
//!
//! - [`FileSessionStorage`] - JSON file, atomic replace, 0600 permissions
//! - [`MemorySessionStorage`] - in-memory (testing, ephemeral sessions)

mod file;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use file::FileSessionStorage;
pub use memory::MemorySessionStorage;

use crate::error::Result;

/// On-disk shape of a persisted session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<Value>,
    #[serde(rename = "isLoggedIn", default)]
    pub is_logged_in: bool,
}

/// Trait for session storage backends.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Load the stored record, `None` when nothing has been saved.
    async fn load(&self) -> Result<Option<StoredSession>>;

    /// Replace the stored record.
    async fn save(&self, session: &StoredSession) -> Result<()>;

    /// Remove the stored record. Clearing an empty store is not an error.
    async fn clear(&self) -> Result<()>;

    /// Name of this storage backend.
    fn name(&self) -> &str {
        "unknown"
    }
}

#[async_trait]
impl<T: SessionStorage + ?Sized> SessionStorage for std::sync::Arc<T> {
    async fn load(&self) -> Result<Option<StoredSession>> {
        (**self).load().await
    }
    async fn save(&self, session: &StoredSession) -> Result<()> {
        (**self).save(session).await
    }
    async fn clear(&self) -> Result<()> {
        (**self).clear().await
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<T: SessionStorage + ?Sized> SessionStorage for Box<T> {
    async fn load(&self) -> Result<Option<StoredSession>> {
        (**self).load().await
    }
    async fn save(&self, session: &StoredSession) -> Result<()> {
        (**self).save(session).await
    }
    async fn clear(&self) -> Result<()> {
        (**self).clear().await
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}
