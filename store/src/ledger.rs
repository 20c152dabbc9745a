use alphabot_core::{CoreError, ReplyRecord, StoreError};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Append-only JSON-lines log of every reply the bot has made.
///
/// It doubles as the dedup index: a comment is never handled again once its
/// id or its parent's id shows up as an `id` or `parent_id` in here.
#[derive(Debug)]
pub struct ReplyLedger {
    path: PathBuf,
}

impl ReplyLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record, in append order. A missing file is an empty ledger.
    pub async fn records(&self) -> Result<Vec<ReplyRecord>, CoreError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(line).map_err(|e| StoreError::CorruptRecord {
                path: self.path.display().to_string(),
                line: index + 1,
                reason: e.to_string(),
            })?;
            records.push(record);
        }
        Ok(records)
    }

    /// Union of all `id` and `parent_id` values.
    pub async fn replied_ids(&self) -> Result<HashSet<String>, CoreError> {
        let records = self.records().await?;
        let mut ids = HashSet::with_capacity(records.len() * 2);
        for record in records {
            ids.insert(record.parent_id);
            ids.insert(record.id);
        }
        debug!("Loaded {} replied ids from {}", ids.len(), self.path.display());
        Ok(ids)
    }

    /// Appends one record and fsyncs before returning.
    pub async fn append(&self, record: &ReplyRecord) -> Result<(), CoreError> {
        let persist_failed = |source: std::io::Error| StoreError::PersistFailed {
            path: self.path.display().to_string(),
            source,
        };

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(persist_failed)?;
        file.write_all(line.as_bytes())
            .await
            .map_err(persist_failed)?;
        file.sync_all().await.map_err(persist_failed)?;
        Ok(())
    }
}
