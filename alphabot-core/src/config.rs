//! TOML configuration for the bot.
//!
//! Secrets may be left out of the file and supplied through
//! `ALPHABOTICAL_CLIENT_SECRET` and `ALPHABOTICAL_PASSWORD` instead.

use crate::{ConfigError, RetryConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CLIENT_SECRET_ENV: &str = "ALPHABOTICAL_CLIENT_SECRET";
pub const PASSWORD_ENV: &str = "ALPHABOTICAL_PASSWORD";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub reddit: RedditConfig,
    #[serde(default)]
    pub pushshift: PushshiftConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditConfig {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PushshiftConfig {
    pub base_url: String,
    pub page_size: u32,
}

impl Default for PushshiftConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.pushshift.io".to_string(),
            page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Width of each fetch window, in minutes
    pub fetch_window_minutes: i64,
    /// Pause before retrying a cycle whose fetch failed
    pub error_backoff_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            fetch_window_minutes: 3,
            error_backoff_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub cursor_path: PathBuf,
    pub ledger_path: PathBuf,
    pub banned_subreddits_path: PathBuf,
    pub dictionary_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cursor_path: PathBuf::from("last_fetch_time.jsonl"),
            ledger_path: PathBuf::from("comment_replies.jsonl"),
            banned_subreddits_path: PathBuf::from("banned_subreddits.jsonl"),
            dictionary_path: PathBuf::from("words_clean.txt"),
        }
    }
}

impl AppConfig {
    /// Reads, fills secrets from the environment, and validates.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        let mut config = Self::from_toml(&raw)?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Environment values win over the file.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup(CLIENT_SECRET_ENV) {
            self.reddit.client_secret = secret;
        }
        if let Some(password) = lookup(PASSWORD_ENV) {
            self.reddit.password = password;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("reddit.client_id", &self.reddit.client_id),
            ("reddit.client_secret", &self.reddit.client_secret),
            ("reddit.username", &self.reddit.username),
            ("reddit.password", &self.reddit.password),
            ("reddit.user_agent", &self.reddit.user_agent),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                });
            }
        }

        if self.polling.fetch_window_minutes <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "polling.fetch_window_minutes".to_string(),
                value: self.polling.fetch_window_minutes.to_string(),
            });
        }
        if self.pushshift.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pushshift.page_size".to_string(),
                value: "0".to_string(),
            });
        }
        if let Err(e) = url::Url::parse(&self.pushshift.base_url) {
            return Err(ConfigError::InvalidValue {
                field: "pushshift.base_url".to_string(),
                value: format!("{} ({})", self.pushshift.base_url, e),
            });
        }
        Ok(())
    }
}
