//! JSON-lines audit store
//!
//! One JSON object per line, written through an append-only file handle.
//! Writers in this process are serialized; each append is flushed and synced
//! before it is acknowledged.

use crate::entry::AuditLogEntry;
use crate::store::{AuditStore, AuditStoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

/// File-backed audit store
#[derive(Debug)]
pub struct JsonLinesAuditStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesAuditStore {
    /// Open (creating parent directories as needed)
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, AuditStoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Touch the file so reads before the first write succeed
        OpenOptions::new().create(true).append(true).open(&path).await?;

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditStore for JsonLinesAuditStore {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), AuditStoreError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(&line).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }

    async fn entries_since(&self, since: DateTime<Utc>) -> Result<Vec<AuditLogEntry>, AuditStoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditLogEntry>(line) {
                Ok(entry) if entry.timestamp >= since => entries.push(entry),
                Ok(_) => {}
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping unreadable audit line"
                ),
            }
        }
        Ok(entries)
    }
}
