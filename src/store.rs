//! Persisted repository records and their conversation logs.
//!
//! Records are written back wholesale, but every put carries the version the
//! caller read, so two recorders racing on the same repository cannot
//! silently overwrite each other's appended entry — the loser gets a
//! conflict error instead.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Who produced a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    Assistant,
}

/// One appended line of a repository's chat log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    pub message: String,
    pub origin: Origin,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

/// A repository's persisted record: identity plus an append-only chat log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRecord {
    pub owner_id: String,
    pub name: String,
    /// Version token for conditional puts. Incremented on every write.
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub chat_log: Vec<ConversationEntry>,
}

impl RepositoryRecord {
    pub fn new(owner_id: String, name: String) -> Self {
        Self {
            owner_id,
            name,
            version: 0,
            chat_log: Vec::new(),
        }
    }
}

/// Key-value storage of repository records.
///
/// `put_repository` is conditional: it succeeds only when the stored version
/// still equals `expected_version`, and writes the record with the version
/// bumped.
pub trait RecordStore {
    fn get_repository(
        &self,
        owner_id: &str,
        name: &str,
    ) -> impl Future<Output = Result<Option<RepositoryRecord>>>;

    fn put_repository(
        &self,
        record: &RepositoryRecord,
        expected_version: u64,
    ) -> impl Future<Output = Result<()>>;
}

/// File-backed store: one JSON document per repository under the state dir.
pub struct FileRecordStore {
    dir: PathBuf,
}

impl FileRecordStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create record store at {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn record_path(&self, owner_id: &str, name: &str) -> PathBuf {
        // Flatten the key into one filename; '/' never appears in either part.
        self.dir.join(format!("{}__{}.json", owner_id, name))
    }

    fn read_record(path: &Path) -> Result<Option<RepositoryRecord>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read record {}", path.display()))?;
        let record = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse record {}", path.display()))?;
        Ok(Some(record))
    }
}

impl RecordStore for FileRecordStore {
    async fn get_repository(&self, owner_id: &str, name: &str) -> Result<Option<RepositoryRecord>> {
        Self::read_record(&self.record_path(owner_id, name))
    }

    async fn put_repository(
        &self,
        record: &RepositoryRecord,
        expected_version: u64,
    ) -> Result<()> {
        let path = self.record_path(&record.owner_id, &record.name);

        let current = Self::read_record(&path)?.map(|r| r.version).unwrap_or(0);
        if current != expected_version {
            anyhow::bail!(
                "version conflict for {}/{}: expected {}, found {}",
                record.owner_id,
                record.name,
                expected_version,
                current
            );
        }

        let mut stored = record.clone();
        stored.version = expected_version + 1;

        let content =
            serde_json::to_string_pretty(&stored).context("failed to serialize record")?;
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write record {}", path.display()))?;

        debug!(
            "stored record {}/{} at version {}",
            stored.owner_id, stored.name, stored.version
        );
        Ok(())
    }
}
