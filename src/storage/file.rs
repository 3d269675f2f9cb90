//! File-based session storage with secure permissions.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{SessionStorage, StoredSession};
use crate::error::{Error, Result};

/// Session storage backed by a single JSON file.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a crash mid-write never leaves a half-written record behind.
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    /// Create storage at the specified path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create storage at the default path: `<data dir>/chatdesk/session.json`
    pub fn default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| Error::Config("Cannot determine data directory".into()))?;
        Ok(Self::new(data_dir.join("chatdesk").join("session.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn read_record(&self) -> Result<Option<StoredSession>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::storage_io(&self.path, e.to_string())),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::StorageSerialization(e.to_string()))
    }

    async fn write_record(&self, record: &StoredSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::storage_io(parent, e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(record)
            .map_err(|e| Error::StorageSerialization(e.to_string()))?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &content)
            .await
            .map_err(|e| Error::storage_io(&tmp, e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&tmp, perms)
                .await
                .map_err(|e| Error::storage_io(&tmp, format!("chmod: {}", e)))?;
        }

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::storage_io(&self.path, format!("rename: {}", e)))?;

        debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }
}

#[async_trait]
impl SessionStorage for FileSessionStorage {
    async fn load(&self) -> Result<Option<StoredSession>> {
        self.read_record().await
    }

    async fn save(&self, session: &StoredSession) -> Result<()> {
        self.write_record(session).await
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Session cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage_io(&self.path, e.to_string())),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}
