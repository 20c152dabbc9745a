use alphabot_core::{
    AppConfig, BannedSubreddits, Clock, Comment, CommentSource, CoreError, ErrorExt, FetchWindow,
    MatchType, RedditApiError, ReplyHandle, ReplyRecord, ReplySink, RetryConfig,
};
use classifier::{Classifier, Dictionary};
use dispatcher::Scheduler;
use futures::stream::{self, BoxStream, StreamExt};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use store::ReplyLedger;

const NOW: i64 = 1_700_000_000;

#[derive(Clone, Default)]
struct ScriptedSource {
    comments: Arc<Mutex<Vec<Comment>>>,
    windows: Arc<Mutex<Vec<FetchWindow>>>,
    fail_after: Option<usize>,
}

impl ScriptedSource {
    fn with(comments: Vec<Comment>) -> Self {
        let source = Self::default();
        source.set(comments);
        source
    }

    fn set(&self, comments: Vec<Comment>) {
        *self.comments.lock().unwrap() = comments;
    }

    fn windows(&self) -> Vec<FetchWindow> {
        self.windows.lock().unwrap().clone()
    }
}

// Ignores the banned list on purpose so the loop's own screening is exercised.
impl CommentSource for ScriptedSource {
    fn fetch<'a>(
        &'a self,
        window: FetchWindow,
        _banned: &'a BannedSubreddits,
    ) -> BoxStream<'a, Result<Comment, CoreError>> {
        self.windows.lock().unwrap().push(window);
        let comments = self.comments.lock().unwrap().clone();

        let mut items: Vec<Result<Comment, CoreError>> = comments.into_iter().map(Ok).collect();
        if let Some(limit) = self.fail_after {
            items.truncate(limit);
            items.push(Err(CoreError::RedditApi(RedditApiError::RequestTimeout)));
        }
        stream::iter(items).boxed()
    }
}

#[derive(Clone, Default)]
struct CountingSink {
    calls: Arc<AtomicUsize>,
    failures: usize,
}

impl CountingSink {
    fn failing(failures: usize) -> Self {
        Self {
            failures,
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReplySink for CountingSink {
    async fn reply(&self, parent: &Comment, text: &str) -> Result<ReplyHandle, CoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(CoreError::RedditApi(RedditApiError::ServerError {
                status_code: 503,
            }));
        }

        Ok(ReplyHandle {
            parent_id: parent.id.clone(),
            id: format!("re{}", parent.id),
            submission_id: parent.submission_id.clone(),
            subreddit: parent.subreddit.clone(),
            parent_author: parent.author.clone(),
            parent_body: parent.body.clone(),
            body: text.to_string(),
        })
    }
}

#[derive(Clone)]
struct FixedClock(Arc<AtomicI64>);

impl FixedClock {
    fn at(now: i64) -> Self {
        Self(Arc::new(AtomicI64::new(now)))
    }

    fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

struct Paths {
    cursor: PathBuf,
    ledger: PathBuf,
    banned: PathBuf,
}

impl Paths {
    fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        let dir = std::env::temp_dir();
        Self {
            cursor: dir.join(format!("test_dispatch_cursor_{}.jsonl", id)),
            ledger: dir.join(format!("test_dispatch_ledger_{}.jsonl", id)),
            banned: dir.join(format!("test_dispatch_banned_{}.jsonl", id)),
        }
    }
}

impl Drop for Paths {
    fn drop(&mut self) {
        for path in [&self.cursor, &self.ledger, &self.banned] {
            std::fs::remove_file(path).ok();
        }
    }
}

fn config(paths: &Paths) -> AppConfig {
    let mut config = AppConfig::from_toml(
        r#"
        [reddit]
        client_id = "id"
        client_secret = "secret"
        username = "alphabotical"
        password = "hunter2"
        user_agent = "alphabotical/test"
        "#,
    )
    .unwrap();
    config.storage.cursor_path = paths.cursor.clone();
    config.storage.ledger_path = paths.ledger.clone();
    config.storage.banned_subreddits_path = paths.banned.clone();
    config
}

fn classifier() -> Classifier {
    Classifier::new(Dictionary::from_words([
        "ants", "bears", "cats", "dogs", "eels", "foxes", "hello", "there", "friend",
    ]))
}

fn scheduler(
    paths: &Paths,
    source: ScriptedSource,
    sink: CountingSink,
    clock: FixedClock,
) -> Scheduler<ScriptedSource, CountingSink, FixedClock> {
    Scheduler::new(source, sink, clock, classifier(), &config(paths))
        .with_retry(RetryConfig::immediate())
        .with_rng(fastrand::Rng::with_seed(7))
}

fn comment(id: &str, body: &str, created_utc: i64) -> Comment {
    Comment {
        id: id.to_string(),
        parent_id: format!("p{}", id),
        submission_id: "sub1".to_string(),
        subreddit: "rust".to_string(),
        author: Some("ferris".to_string()),
        body: body.to_string(),
        created_utc,
        permalink: Some(format!("/r/rust/comments/sub1/_/{}/", id)),
    }
}

const ASCENDING: &str = "ants bears cats dogs eels foxes";
const DESCENDING: &str = "foxes eels dogs cats bears ants";
const PLAIN: &str = "hello there friend, hello there friend";

#[tokio::test]
async fn replies_once_to_a_matching_comment() {
    let paths = Paths::new();
    let source = ScriptedSource::with(vec![
        comment("c1", ASCENDING, NOW - 300),
        comment("c2", PLAIN, NOW - 200),
        comment("c3", DESCENDING, NOW - 100),
    ]);
    let sink = CountingSink::default();
    let mut scheduler = scheduler(&paths, source, sink.clone(), FixedClock::at(NOW));

    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(report.fetched, 3);
    assert_eq!(report.matched, 2);
    assert_eq!(report.replied, 2);
    assert_eq!(sink.calls(), 2);

    let records = scheduler.ledger().records().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].parent_id, "c1");
    assert_eq!(records[0].id, "rec1");
    assert_eq!(records[0].comment_type, MatchType::AlphabeticalWords);
    assert_eq!(records[0].parent_body, ASCENDING);
    assert_eq!(records[1].comment_type, MatchType::AlphabeticalWordsReverse);
    assert_eq!(
        records[1].body,
        MatchType::AlphabeticalWordsReverse.templates()[0]
    );
}

#[tokio::test]
async fn replaying_the_same_comment_yields_one_record() {
    let paths = Paths::new();
    let repeated = comment("c1", ASCENDING, NOW - 100);
    let source = ScriptedSource::with(vec![repeated.clone(), repeated.clone()]);
    let sink = CountingSink::default();
    let mut scheduler = scheduler(&paths, source, sink.clone(), FixedClock::at(NOW));

    scheduler.run_cycle().await.unwrap();
    let report = scheduler.run_cycle().await.unwrap();

    assert_eq!(report.already_replied, 2);
    assert_eq!(sink.calls(), 1);
    assert_eq!(scheduler.ledger().records().await.unwrap().len(), 1);
}

#[tokio::test]
async fn ledger_ids_never_reach_the_classifier() {
    let paths = Paths::new();
    let ledger = ReplyLedger::new(&paths.ledger);
    ledger
        .append(&ReplyRecord {
            parent_id: "c1".to_string(),
            id: "mine".to_string(),
            submission_id: "sub1".to_string(),
            comment_type: MatchType::AlphabeticalWords,
            subreddit: "rust".to_string(),
            parent_author: None,
            body: "Congratulations".to_string(),
            parent_body: ASCENDING.to_string(),
        })
        .await
        .unwrap();

    // c1 was already answered; c2 answers our own reply
    let mut reply_to_us = comment("c2", DESCENDING, NOW - 50);
    reply_to_us.parent_id = "mine".to_string();
    let source = ScriptedSource::with(vec![comment("c1", ASCENDING, NOW - 100), reply_to_us]);
    let sink = CountingSink::default();
    let mut scheduler = scheduler(&paths, source, sink.clone(), FixedClock::at(NOW));

    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(report.already_replied, 2);
    assert_eq!(report.matched, 0);
    assert_eq!(report.disqualified, 0);
    assert_eq!(sink.calls(), 0);
}

#[tokio::test]
async fn gives_up_after_three_attempts_without_a_record() {
    let paths = Paths::new();
    let source = ScriptedSource::with(vec![comment("c1", ASCENDING, NOW - 100)]);
    let sink = CountingSink::failing(usize::MAX);
    let mut scheduler = scheduler(&paths, source, sink.clone(), FixedClock::at(NOW));

    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(sink.calls(), 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.replied, 0);
    assert!(scheduler.ledger().records().await.unwrap().is_empty());
    assert_eq!(scheduler.cursor().load().await.unwrap(), Some(NOW - 100));
}

#[tokio::test]
async fn third_attempt_can_still_succeed() {
    let paths = Paths::new();
    let source = ScriptedSource::with(vec![comment("c1", ASCENDING, NOW - 100)]);
    let sink = CountingSink::failing(2);
    let mut scheduler = scheduler(&paths, source, sink.clone(), FixedClock::at(NOW));

    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(sink.calls(), 3);
    assert_eq!(report.replied, 1);
    assert_eq!(scheduler.ledger().records().await.unwrap().len(), 1);
}

#[tokio::test]
async fn cursor_advances_monotonically() {
    let paths = Paths::new();
    let source = ScriptedSource::with(vec![comment("c1", PLAIN, NOW - 100)]);
    let clock = FixedClock::at(NOW);
    let mut scheduler = scheduler(&paths, source.clone(), CountingSink::default(), clock.clone());

    // first run starts eight minutes back
    assert_eq!(scheduler.run_cycle().await.unwrap().cursor, NOW - 100);
    assert_eq!(
        source.windows()[0],
        FetchWindow {
            after: NOW - 481,
            before: NOW - 480 + 180 + 1,
        }
    );

    // nothing new and the floor is still behind the cursor
    source.set(vec![]);
    clock.set(NOW + 10);
    assert_eq!(scheduler.run_cycle().await.unwrap().cursor, NOW - 100);
    assert_eq!(source.windows()[1].after, NOW - 101);

    // an older straggler does not pull it back
    source.set(vec![comment("c0", PLAIN, NOW - 400)]);
    assert_eq!(scheduler.run_cycle().await.unwrap().cursor, NOW - 100);

    // a long quiet stretch drags it up to eight minutes ago
    source.set(vec![]);
    clock.set(NOW + 1_000);
    assert_eq!(scheduler.run_cycle().await.unwrap().cursor, NOW + 520);
    assert_eq!(scheduler.cursor().load().await.unwrap(), Some(NOW + 520));
}

#[tokio::test]
async fn banned_subreddits_and_bots_are_screened_again() {
    let paths = Paths::new();
    std::fs::write(&paths.banned, "{\"subreddit\": \"Pics\"}\n").unwrap();

    let mut banned = comment("c1", ASCENDING, NOW - 300);
    banned.subreddit = "pics".to_string();
    let mut automated = comment("c2", ASCENDING, NOW - 200);
    automated.author = Some("AutoModerator".to_string());
    let allowed = comment("c3", ASCENDING, NOW - 100);

    let source = ScriptedSource::with(vec![banned, automated, allowed]);
    let sink = CountingSink::default();
    let mut scheduler = scheduler(&paths, source, sink.clone(), FixedClock::at(NOW));

    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(report.screened_out, 2);
    assert_eq!(report.replied, 1);
    assert_eq!(sink.calls(), 1);
    assert_eq!(scheduler.ledger().records().await.unwrap()[0].parent_id, "c3");
}

#[tokio::test]
async fn fetch_failure_leaves_the_cursor_alone() {
    let paths = Paths::new();
    let comments = vec![
        comment("c1", ASCENDING, NOW - 300),
        comment("c2", DESCENDING, NOW - 200),
    ];
    let failing = ScriptedSource {
        fail_after: Some(1),
        ..ScriptedSource::with(comments.clone())
    };
    let sink = CountingSink::default();
    let clock = FixedClock::at(NOW);
    let mut scheduler = scheduler(&paths, failing, sink.clone(), clock.clone());

    let error = scheduler.run_cycle().await.unwrap_err();
    assert!(error.is_retryable());
    assert_eq!(scheduler.cursor().load().await.unwrap(), None);
    assert_eq!(sink.calls(), 1);

    // the retried window skips what was already answered
    let mut scheduler = self::scheduler(
        &paths,
        ScriptedSource::with(comments),
        sink.clone(),
        clock,
    );
    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(report.already_replied, 1);
    assert_eq!(report.replied, 1);
    assert_eq!(sink.calls(), 2);
    assert_eq!(scheduler.cursor().load().await.unwrap(), Some(NOW - 200));
}
