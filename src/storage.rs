//! Document record persistence
//! Author: kartik4091
//! Created: 2026-03-06
//!
//! Records are write-once: a document's hash and signature are fixed when
//! it is sealed, and later checks compare against them instead of editing
//! them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::{fs, sync::Mutex};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::verification::StoredSignature;

/// What is persisted per sealed document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub filename: Option<String>,
    /// Hex SHA-256 of the bytes that were signed
    pub content_hash: String,
    /// Base64 signature over the raw digest
    pub signature: String,
    pub key_id: String,
    pub created_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn stored_signature(&self) -> StoredSignature<'_> {
        StoredSignature {
            content_hash: &self.content_hash,
            signature: &self.signature,
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fails with `DuplicateRecord` if the id is taken
    async fn insert(&self, record: DocumentRecord) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<DocumentRecord>>;

    async fn list(&self) -> Result<Vec<DocumentRecord>>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    records: DashMap<Uuid, DocumentRecord>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, record: DocumentRecord) -> Result<()> {
        use dashmap::mapref::entry::Entry;

        match self.records.entry(record.id) {
            Entry::Occupied(_) => Err(Error::DuplicateRecord(record.id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<DocumentRecord>> {
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }

    async fn list(&self) -> Result<Vec<DocumentRecord>> {
        let mut all: Vec<_> = self.records.iter().map(|r| r.value().clone()).collect();
        all.sort_by_key(|r| (r.created_at, r.id));
        Ok(all)
    }
}

/// JSON file store for the command line tool. The whole file is rewritten
/// on each insert via a temp file and rename; writers are serialized.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    async fn read_all(&self) -> Result<BTreeMap<Uuid, DocumentRecord>> {
        match fs::read(&self.path).await {
            Ok(data) if data.is_empty() => Ok(BTreeMap::new()),
            Ok(data) => {
                let records: Vec<DocumentRecord> = serde_json::from_slice(&data).map_err(|e| {
                    Error::Storage(format!("{} is corrupt: {}", self.path.display(), e))
                })?;
                Ok(records.into_iter().map(|r| (r.id, r)).collect())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, records: &BTreeMap<Uuid, DocumentRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let list: Vec<&DocumentRecord> = records.values().collect();
        let data = serde_json::to_vec_pretty(&list)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    #[instrument(skip(self, record), fields(id = %record.id))]
    async fn insert(&self, record: DocumentRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_all().await?;
        if records.contains_key(&record.id) {
            return Err(Error::DuplicateRecord(record.id.to_string()));
        }
        records.insert(record.id, record);
        self.write_all(&records).await?;
        debug!(count = records.len(), "Wrote {}", self.path.display());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<DocumentRecord>> {
        Ok(self.read_all().await?.remove(&id))
    }

    async fn list(&self) -> Result<Vec<DocumentRecord>> {
        let mut all: Vec<_> = self.read_all().await?.into_values().collect();
        all.sort_by_key(|r| (r.created_at, r.id));
        Ok(all)
    }
}
