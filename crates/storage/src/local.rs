//! Backup result content on the local filesystem.
//!
//! ```text
//! <root>/incoming/<backupId>                 delivered, not yet ingested
//! <root>/archive/<ingestId>/<backupId>       ingested
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use ingest_core::{ContentStorage, Error, Result};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::config::StorageConfig;

const INCOMING_DIR: &str = "incoming";
const ARCHIVE_DIR: &str = "archive";

/// Backup ids become file names, so they must be a single path component.
fn validate_backup_id(backup_id: &str) -> Result<()> {
    let invalid = backup_id.is_empty()
        || backup_id == "."
        || backup_id == ".."
        || backup_id.contains(['/', '\\', '\0']);

    if invalid {
        return Err(Error::storage(format!("invalid backup id {:?}", backup_id)));
    }
    Ok(())
}

/// Content storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct LocalContentStorage {
    root: PathBuf,
}

impl LocalContentStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.root.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn incoming_path(&self, backup_id: &str) -> Result<PathBuf> {
        validate_backup_id(backup_id)?;
        Ok(self.root.join(INCOMING_DIR).join(backup_id))
    }

    pub fn archive_path(&self, backup_id: &str, ingest_id: Uuid) -> Result<PathBuf> {
        validate_backup_id(backup_id)?;
        Ok(self
            .root
            .join(ARCHIVE_DIR)
            .join(ingest_id.to_string())
            .join(backup_id))
    }

    /// Stores delivered content under `incoming/`.
    pub async fn put_backup_result_content(&self, backup_id: &str, content: &[u8]) -> Result<()> {
        let path = self.incoming_path(backup_id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        fs::write(&path, content)
            .await
            .map_err(|e| Error::storage(format!("Failed to write {}: {}", path.display(), e)))
    }
}

#[async_trait]
impl ContentStorage for LocalContentStorage {
    async fn get_backup_result_content(&self, backup_id: &str) -> Result<Bytes> {
        let path = self.incoming_path(backup_id)?;

        match fs::read(&path).await {
            Ok(content) => {
                debug!(backup_id = backup_id, bytes = content.len(), "Read backup result content");
                Ok(Bytes::from(content))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::storage(format!(
                "no content stored for backup {}",
                backup_id
            ))),
            Err(e) => Err(Error::storage(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn archive_backup_result_content(&self, backup_id: &str, ingest_id: Uuid) -> Result<()> {
        let from = self.incoming_path(backup_id)?;
        let to = self.archive_path(backup_id, ingest_id)?;

        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        fs::rename(&from, &to).await.map_err(|e| {
            Error::storage(format!(
                "Failed to archive {} to {}: {}",
                from.display(),
                to.display(),
                e
            ))
        })?;

        debug!(backup_id = backup_id, ingest_id = %ingest_id, "Archived backup result content");
        Ok(())
    }
}
