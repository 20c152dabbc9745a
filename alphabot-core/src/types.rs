use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A comment as yielded by the comment source.
///
/// Ids are bare base-36 ids without the `t1_`/`t3_` fullname prefix, so
/// `id` and `parent_id` live in the same key space as the reply ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: String,
    pub parent_id: String,
    pub submission_id: String,
    pub subreddit: String,
    pub author: Option<String>,
    pub body: String,
    pub created_utc: i64,
    pub permalink: Option<String>,
}

impl Comment {
    /// Authors whose name contains "bot" or "auto" are assumed to be automated.
    pub fn has_automated_author(&self) -> bool {
        match &self.author {
            Some(name) => {
                let name = name.to_lowercase();
                name.contains("bot") || name.contains("auto")
            }
            None => false,
        }
    }
}

/// Strips a Reddit fullname prefix (`t1_`, `t3_`, ...) from an id.
pub fn bare_id(fullname: &str) -> &str {
    match fullname.split_once('_') {
        Some((kind, id)) if kind.len() == 2 && kind.starts_with('t') => id,
        _ => fullname,
    }
}

const ALPHABET_USED_REPLIES: &[&str] =
    &["Congratulations, your comment used all the letters in the alphabet!"];
const ALPHABETICAL_WORDS_REPLIES: &[&str] =
    &["Congratulations, your comment's words are in alphabetical order!"];
const ALPHABETICAL_WORDS_REVERSE_REPLIES: &[&str] =
    &["Congratulations, your comment's words are in reverse alphabetical order!"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    AlphabetUsed,
    AlphabeticalWords,
    AlphabeticalWordsReverse,
}

impl MatchType {
    /// Candidate replies for this match; never empty.
    pub fn templates(&self) -> &'static [&'static str] {
        match self {
            MatchType::AlphabetUsed => ALPHABET_USED_REPLIES,
            MatchType::AlphabeticalWords => ALPHABETICAL_WORDS_REPLIES,
            MatchType::AlphabeticalWordsReverse => ALPHABETICAL_WORDS_REVERSE_REPLIES,
        }
    }

    /// Picks one template uniformly at random.
    pub fn choose_reply(&self, rng: &mut fastrand::Rng) -> &'static str {
        let templates = self.templates();
        templates[rng.usize(..templates.len())]
    }

    pub fn name(&self) -> &'static str {
        match self {
            MatchType::AlphabetUsed => "alphabet_used",
            MatchType::AlphabeticalWords => "alphabetical_words",
            MatchType::AlphabeticalWordsReverse => "alphabetical_words_reverse",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive timestamp range requested from the comment source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub after: i64,
    pub before: i64,
}

/// What the reply sink hands back after a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyHandle {
    pub parent_id: String,
    pub id: String,
    pub submission_id: String,
    pub subreddit: String,
    pub parent_author: Option<String>,
    pub parent_body: String,
    pub body: String,
}

/// One line of the reply ledger. Field order is the on-disk order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRecord {
    pub parent_id: String,
    pub id: String,
    pub submission_id: String,
    pub comment_type: MatchType,
    pub subreddit: String,
    pub parent_author: Option<String>,
    pub body: String,
    pub parent_body: String,
}

impl ReplyRecord {
    pub fn from_handle(handle: ReplyHandle, comment_type: MatchType) -> Self {
        Self {
            parent_id: handle.parent_id,
            id: handle.id,
            submission_id: handle.submission_id,
            comment_type,
            subreddit: handle.subreddit,
            parent_author: handle.parent_author,
            body: handle.body,
            parent_body: handle.parent_body,
        }
    }
}

/// Lowercase names of subreddits the bot must stay out of.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BannedSubreddits {
    names: HashSet<String>,
}

impl BannedSubreddits {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|name| name.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn contains(&self, subreddit: &str) -> bool {
        self.names.contains(&subreddit.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// True when the comment was posted in a banned subreddit or by an
    /// automated-looking author.
    pub fn screens_out(&self, comment: &Comment) -> bool {
        self.contains(&comment.subreddit) || comment.has_automated_author()
    }
}
