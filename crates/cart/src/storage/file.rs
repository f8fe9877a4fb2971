//! File-backed storage backend.
//!
//! All entries live in a single JSON object file (`{"key": "value", ...}`).
//! Writes go to a uniquely named temporary file in the same directory which
//! is then renamed over the original, so readers never see a partially
//! written file.

use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::{CartStorage, StorageError};

type Entries = BTreeMap<String, String>;

/// Storage persisted to a JSON file on disk.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStorage {
    /// Create a storage backed by the file at `path`.
    ///
    /// The file and its parent directories are created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<Entries, StorageError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(Entries::new());
        }

        serde_json::from_str(&raw).map_err(|e| {
            StorageError::Corrupt(format!(
                "storage file {} is not a JSON object of strings: {e}",
                self.path.display()
            ))
        })
    }

    async fn write_entries(&self, entries: &Entries) -> Result<(), StorageError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir).await?;

        let raw = serde_json::to_string_pretty(entries)?;
        let path = self.path.clone();

        // Unique per write; concurrent writers never share a temp file.
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(raw.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;

        debug!(path = %self.path.display(), entries = entries.len(), "Storage file written");
        Ok(())
    }
}

#[async_trait]
impl CartStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_entries().await?.remove(key))
    }

    #[instrument(skip(self, value), fields(path = %self.path.display()))]
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        entries.insert(key.to_string(), value);
        self.write_entries(&entries).await
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.write_entries(&entries).await
    }
}
