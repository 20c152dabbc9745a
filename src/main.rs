use alphabot_core::{AppConfig, CoreError};
use classifier::{Classifier, Dictionary};
use dispatcher::{Scheduler, SystemClock};
use reddit_client::RedditClient;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "alphabotical=info,alphabot_core=info,classifier=info,store=info,dispatcher=info,reddit_client=info";
const CONFIG_ENV: &str = "ALPHABOTICAL_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "alphabotical.toml";

fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
        .into()
}

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let path = config_path();
    tracing::info!("Starting alphabotical with {}", path.display());

    let config = AppConfig::load(&path).map_err(|e| {
        tracing::error!("Configuration error: {}", e);
        CoreError::from(e)
    })?;

    let dictionary = Dictionary::load(&config.storage.dictionary_path).map_err(|e| {
        tracing::error!("Dictionary error: {}", e);
        CoreError::from(e)
    })?;

    // One client serves as both the comment source and the reply sink.
    let reddit = RedditClient::from_config(&config)?;
    let mut scheduler = Scheduler::new(
        &reddit,
        &reddit,
        SystemClock,
        Classifier::new(dictionary),
        &config,
    );

    scheduler.run().await
}
