use alphabot_core::{
    AppConfig, BannedSubreddits, Clock, Comment, CommentSource, CoreError, ErrorExt,
    PollingConfig, ReplyRecord, ReplySink, RetryConfig, RetryExecutor,
};
use classifier::{Classification, Classifier};
use futures::TryStreamExt;
use std::collections::HashSet;
use std::time::Duration;
use store::{fetch_window, BannedSubredditStore, CursorStore, ReplyLedger};
use tokio::time::sleep;
use tracing::{debug, info, info_span, warn, Instrument};

/// What happened to the comments of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub screened_out: usize,
    pub already_replied: usize,
    pub disqualified: usize,
    pub matched: usize,
    pub replied: usize,
    pub failed: usize,
    pub cursor: i64,
}

/// Why a fetched comment never reached the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    Screened,
    AlreadyReplied,
}

/// Banned-subreddit and automated-author screening is repeated here even
/// though the source already applies it.
pub fn screen(
    comment: &Comment,
    banned: &BannedSubreddits,
    replied: &HashSet<String>,
) -> Option<Skip> {
    if banned.screens_out(comment) {
        return Some(Skip::Screened);
    }
    if replied.contains(&comment.id) || replied.contains(&comment.parent_id) {
        return Some(Skip::AlreadyReplied);
    }
    None
}

/// The dispatch loop: fetch a window, classify, reply once, record, advance.
pub struct Scheduler<S, R, C> {
    source: S,
    sink: R,
    clock: C,
    classifier: Classifier,
    cursor: CursorStore,
    ledger: ReplyLedger,
    banned: BannedSubredditStore,
    retry: RetryExecutor,
    polling: PollingConfig,
    rng: fastrand::Rng,
}

impl<S, R, C> Scheduler<S, R, C>
where
    S: CommentSource,
    R: ReplySink,
    C: Clock,
{
    pub fn new(source: S, sink: R, clock: C, classifier: Classifier, config: &AppConfig) -> Self {
        Self {
            source,
            sink,
            clock,
            classifier,
            cursor: CursorStore::new(&config.storage.cursor_path),
            ledger: ReplyLedger::new(&config.storage.ledger_path),
            banned: BannedSubredditStore::new(&config.storage.banned_subreddits_path),
            retry: RetryExecutor::new(config.retry.clone()),
            polling: config.polling.clone(),
            rng: fastrand::Rng::new(),
        }
    }

    pub fn with_rng(mut self, rng: fastrand::Rng) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry = RetryExecutor::new(config);
        self
    }

    pub fn ledger(&self) -> &ReplyLedger {
        &self.ledger
    }

    pub fn cursor(&self) -> &CursorStore {
        &self.cursor
    }

    /// Runs until a non-retryable error occurs.
    ///
    /// Retryable failures (fetch timeouts, server errors) abandon the cycle
    /// with the cursor untouched and try again after the configured backoff.
    pub async fn run(&mut self) -> Result<(), CoreError> {
        info!(
            "Dispatch loop starting with a {} minute window",
            self.polling.fetch_window_minutes
        );

        loop {
            match self.run_cycle().await {
                Ok(report) => debug!("Cycle finished: {:?}", report),
                Err(e) if e.is_retryable() => {
                    e.log_warn();
                    let backoff = Duration::from_secs(self.polling.error_backoff_secs);
                    warn!("Cycle abandoned, retrying in {:?}", backoff);
                    sleep(backoff).await;
                }
                Err(e) => {
                    e.log_error();
                    return Err(e);
                }
            }
        }
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport, CoreError> {
        let span = info_span!("cycle", id = %uuid::Uuid::new_v4());
        self.process_window().instrument(span).await
    }

    async fn process_window(&mut self) -> Result<CycleReport, CoreError> {
        let now = self.clock.now();
        let last_fetch_time = self.cursor.current(now).await?;
        let window = fetch_window(last_fetch_time, self.polling.fetch_window_minutes);
        let banned = self.banned.load().await?;
        let mut replied = self.ledger.replied_ids().await?;

        info!(
            "Fetching comments from {} to {} ({} banned subreddits, {} known ids)",
            window.after,
            window.before,
            banned.len(),
            replied.len()
        );

        let mut report = CycleReport::default();
        let mut last_seen = None;
        let mut comments = self.source.fetch(window, &banned);

        while let Some(comment) = comments.try_next().await? {
            report.fetched += 1;
            last_seen = Some(comment.created_utc);

            match screen(&comment, &banned, &replied) {
                Some(Skip::Screened) => {
                    report.screened_out += 1;
                    continue;
                }
                Some(Skip::AlreadyReplied) => {
                    debug!("Already replied around {}, skipping", comment.id);
                    report.already_replied += 1;
                    continue;
                }
                None => {}
            }

            let match_type = match self.classifier.classify(&comment.body) {
                Classification::Matched(match_type) => match_type,
                Classification::NoMatch => continue,
                Classification::Disqualified(reason) => {
                    debug!("Comment {} disqualified: {}", comment.id, reason);
                    report.disqualified += 1;
                    continue;
                }
            };
            report.matched += 1;

            let text = match_type.choose_reply(&mut self.rng);
            info!(
                "Matched {} in r/{} as {}: {:?} -> {:?} ({})",
                comment.id,
                comment.subreddit,
                match_type,
                comment.body,
                text,
                comment.permalink.as_deref().unwrap_or("no permalink")
            );

            let context = format!("replying to {} in r/{}", comment.id, comment.subreddit);
            let sink = &self.sink;
            let submitted = self
                .retry
                .execute("reply", &context, || sink.reply(&comment, text))
                .await;

            match submitted {
                Ok(handle) => {
                    let record = ReplyRecord::from_handle(handle, match_type);
                    self.ledger.append(&record).await?;
                    replied.insert(record.parent_id.clone());
                    replied.insert(record.id.clone());
                    report.replied += 1;
                }
                Err(e) => {
                    warn!("Giving up on {}: {}", comment.id, e);
                    report.failed += 1;
                }
            }
        }

        report.cursor = self.cursor.advance(last_seen, self.clock.now()).await?;
        info!(
            "Cycle done: {} fetched, {} matched, {} replied, cursor at {}",
            report.fetched, report.matched, report.replied, report.cursor
        );
        Ok(report)
    }
}

