//! In-memory session storage.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{SessionStorage, StoredSession};
use crate::error::Result;

/// Session storage that lives only as long as the process.
#[derive(Default)]
pub struct MemorySessionStorage {
    record: RwLock<Option<StoredSession>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with a record, as if left by an earlier run.
    pub fn with_record(record: StoredSession) -> Self {
        Self {
            record: RwLock::new(Some(record)),
        }
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn load(&self) -> Result<Option<StoredSession>> {
        Ok(self.record.read().await.clone())
    }

    async fn save(&self, session: &StoredSession) -> Result<()> {
        *self.record.write().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.record.write().await = None;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
