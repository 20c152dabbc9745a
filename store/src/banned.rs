use alphabot_core::{BannedSubreddits, CoreError, StoreError};
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct BannedEntry {
    subreddit: String,
}

/// JSON-lines list of subreddits that have banned the bot, one
/// `{"subreddit": "..."}` object per line. Re-read every cycle.
#[derive(Debug)]
pub struct BannedSubredditStore {
    path: PathBuf,
}

impl BannedSubredditStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn load(&self) -> Result<BannedSubreddits, CoreError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    "No banned subreddit list at {}, assuming none",
                    self.path.display()
                );
                return Ok(BannedSubreddits::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for (index, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: BannedEntry =
                serde_json::from_str(line).map_err(|e| StoreError::CorruptRecord {
                    path: self.path.display().to_string(),
                    line: index + 1,
                    reason: e.to_string(),
                })?;
            names.push(entry.subreddit);
        }

        Ok(BannedSubreddits::new(names))
    }
}
