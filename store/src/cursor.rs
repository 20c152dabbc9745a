use alphabot_core::{CoreError, FetchWindow, StoreError};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// The cursor never trails the wall clock by more than this.
pub const MAX_CURSOR_LAG_SECS: i64 = 8 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct CursorRecord {
    last_fetch_time: i64,
}

/// Persisted watermark of processed comment time.
#[derive(Debug)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when no cursor has been written yet.
    pub async fn load(&self) -> Result<Option<i64>, CoreError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let line = raw
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| StoreError::EmptyCursor {
                path: self.path.display().to_string(),
            })?;
        let record: CursorRecord =
            serde_json::from_str(line).map_err(|e| StoreError::CorruptRecord {
                path: self.path.display().to_string(),
                line: 1,
                reason: e.to_string(),
            })?;

        Ok(Some(record.last_fetch_time))
    }

    /// Current cursor, or `now - MAX_CURSOR_LAG_SECS` on first start.
    pub async fn current(&self, now: i64) -> Result<i64, CoreError> {
        Ok(self.load().await?.unwrap_or(now - MAX_CURSOR_LAG_SECS))
    }

    /// Stores the cursor reached after a cycle and returns what was written.
    ///
    /// The value is clamped so it never trails `now` by more than
    /// `MAX_CURSOR_LAG_SECS` and never moves backwards.
    pub async fn advance(&self, last_seen: Option<i64>, now: i64) -> Result<i64, CoreError> {
        let previous = self.load().await?;
        let next = next_cursor(previous, last_seen, now);

        if previous == Some(next) {
            debug!("Cursor unchanged at {}", next);
            return Ok(next);
        }

        self.persist(next).await?;
        info!("Cursor advanced from {:?} to {}", previous, next);
        Ok(next)
    }

    // Write-then-rename so a crash leaves either the old or the new value.
    async fn persist(&self, last_fetch_time: i64) -> Result<(), CoreError> {
        let persist_failed = |source: std::io::Error| StoreError::PersistFailed {
            path: self.path.display().to_string(),
            source,
        };

        let record = serde_json::to_string(&CursorRecord { last_fetch_time })?;
        let tmp_path = self.path.with_extension("tmp");

        let mut file = fs::File::create(&tmp_path).await.map_err(persist_failed)?;
        file.write_all(record.as_bytes())
            .await
            .map_err(persist_failed)?;
        file.sync_all().await.map_err(persist_failed)?;
        drop(file);

        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(persist_failed)?;
        Ok(())
    }
}

/// `max(last_seen, now - lag)`, and never below what was already stored.
pub fn next_cursor(previous: Option<i64>, last_seen: Option<i64>, now: i64) -> i64 {
    let floor = now - MAX_CURSOR_LAG_SECS;
    let candidate = last_seen.map_or(floor, |seen| seen.max(floor));
    previous.map_or(candidate, |previous| previous.max(candidate))
}

/// Window requested for a cursor, padded by a second on each side.
pub fn fetch_window(last_fetch_time: i64, fetch_window_minutes: i64) -> FetchWindow {
    FetchWindow {
        after: last_fetch_time - 1,
        before: last_fetch_time + fetch_window_minutes * 60 + 1,
    }
}
