//! Audit store port and in-memory implementation

use crate::entry::AuditLogEntry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Audit store failure
#[derive(Debug, Error)]
pub enum AuditStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Audit store unavailable: {0}")]
    Unavailable(String),
}

/// Durable audit storage.
///
/// Append-only: corrections are recorded as new entries.
#[async_trait]
pub trait AuditStore: Send + Sync + Debug {
    /// Persist one entry. Once this returns `Ok`, the entry is visible to reads.
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), AuditStoreError>;

    /// Entries with `timestamp >= since`, in append order
    async fn entries_since(&self, since: DateTime<Utc>) -> Result<Vec<AuditLogEntry>, AuditStoreError>;
}

/// In-memory audit store
///
/// Thread-safe implementation using RwLock.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditStore {
    entries: Arc<RwLock<Vec<AuditLogEntry>>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every entry, in append order
    pub fn snapshot(&self) -> Vec<AuditLogEntry> {
        self.entries.read().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), AuditStoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| AuditStoreError::Unavailable("Failed to acquire write lock".to_string()))?;
        entries.push(entry.clone());
        Ok(())
    }

    async fn entries_since(&self, since: DateTime<Utc>) -> Result<Vec<AuditLogEntry>, AuditStoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| AuditStoreError::Unavailable("Failed to acquire read lock".to_string()))?;
        Ok(entries.iter().filter(|e| e.timestamp >= since).cloned().collect())
    }
}
