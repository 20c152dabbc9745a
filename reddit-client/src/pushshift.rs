use crate::api::send_checked;
use alphabot_core::{bare_id, BannedSubreddits, Comment, ConfigError, CoreError, FetchWindow, RedditApiError};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

const SEARCH_PATH: &str = "reddit/search/comment/";
const DELETED_AUTHOR: &str = "[deleted]";
/// Page size used to drain a single saturated second.
const SATURATED_SECOND_SIZE: u32 = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushshiftComment {
    pub id: String,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub link_id: String,
    pub subreddit: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: String,
    pub created_utc: f64,
    #[serde(default)]
    pub permalink: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PushshiftResponse {
    data: Vec<PushshiftComment>,
}

impl From<PushshiftComment> for Comment {
    fn from(comment: PushshiftComment) -> Self {
        Self {
            id: comment.id,
            parent_id: bare_id(&comment.parent_id).to_string(),
            submission_id: bare_id(&comment.link_id).to_string(),
            subreddit: comment.subreddit,
            author: comment.author.filter(|name| name != DELETED_AUTHOR),
            body: comment.body,
            created_utc: comment.created_utc as i64,
            permalink: comment.permalink,
        }
    }
}

/// How paging continues after a page came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStep {
    /// The window is exhausted.
    Done,
    /// Search again after this timestamp.
    Continue(i64),
    /// The whole page shares one second, so `after` cannot move without
    /// skipping the rest of that second.
    Saturated(i64),
}

/// Decides where the next page starts from the timestamps of the current
/// one, oldest first.
///
/// Pages overlap by one second so comments sharing the boundary second are
/// not lost; ids already yielded are dropped by the caller.
pub fn next_step(after: i64, created: &[i64], page_size: usize) -> PageStep {
    let (Some(&first), Some(&last)) = (created.first(), created.last()) else {
        return PageStep::Done;
    };
    if created.len() < page_size {
        return PageStep::Done;
    }
    if first == last {
        return PageStep::Saturated(last);
    }
    if last - 1 > after {
        PageStep::Continue(last - 1)
    } else if last > after {
        PageStep::Continue(last)
    } else {
        PageStep::Done
    }
}

struct PageState {
    after: Option<i64>,
    seen: HashSet<String>,
}

/// Comment search against the Pushshift archive.
#[derive(Debug)]
pub struct PushshiftClient {
    http_client: Client,
    search_url: Url,
    page_size: u32,
}

impl PushshiftClient {
    pub fn new(base_url: &str, page_size: u32, user_agent: &str) -> Result<Self, CoreError> {
        let invalid = |e: url::ParseError| ConfigError::InvalidValue {
            field: "pushshift.base_url".to_string(),
            value: format!("{} ({})", base_url, e),
        };
        let base = Url::parse(base_url).map_err(invalid)?;
        let base = if base.path().ends_with('/') {
            base
        } else {
            Url::parse(&format!("{}/", base)).map_err(invalid)?
        };
        let search_url = base.join(SEARCH_PATH).map_err(invalid)?;

        let http_client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            search_url,
            page_size,
        })
    }

    pub fn search_url(&self) -> &Url {
        &self.search_url
    }

    /// Up to `size` comments created strictly between `after` and `before`,
    /// oldest first.
    pub async fn search_comments(
        &self,
        after: i64,
        before: i64,
        size: u32,
    ) -> Result<Vec<PushshiftComment>, CoreError> {
        let after_s = after.to_string();
        let before_s = before.to_string();
        let size_s = size.to_string();
        let params = [
            ("after", after_s.as_str()),
            ("before", before_s.as_str()),
            ("sort_type", "created_utc"),
            ("sort", "asc"),
            ("size", size_s.as_str()),
        ];

        let request_builder = self
            .http_client
            .request(Method::GET, self.search_url.clone())
            .query(&params);

        debug!("Searching comments after {} before {}", after, before);
        let response = send_checked(request_builder, &Method::GET, SEARCH_PATH).await?;

        let page: PushshiftResponse = response.json().await.map_err(|e| {
            error!("Failed to parse comment search: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse comments after {}", after),
            })
        })?;

        info!("Retrieved {} comments after {}", page.data.len(), after);
        Ok(page.data)
    }

    /// Lazily pages through the window, skipping banned subreddits and
    /// automated authors.
    pub fn comments<'a>(
        &'a self,
        window: FetchWindow,
        banned: &'a BannedSubreddits,
    ) -> BoxStream<'a, Result<Comment, CoreError>> {
        let initial = PageState {
            after: Some(window.after),
            seen: HashSet::new(),
        };

        let pages = stream::try_unfold(initial, move |mut state| async move {
            let Some(after) = state.after else {
                return Ok(None);
            };

            let page = self
                .search_comments(after, window.before, self.page_size)
                .await?;
            let created: Vec<i64> = page.iter().map(|c| c.created_utc as i64).collect();

            let mut fresh: Vec<PushshiftComment> = page
                .into_iter()
                .filter(|c| state.seen.insert(c.id.clone()))
                .collect();

            state.after = match next_step(after, &created, self.page_size as usize) {
                PageStep::Done => None,
                PageStep::Continue(next) => Some(next),
                PageStep::Saturated(second) => {
                    let size = SATURATED_SECOND_SIZE.max(self.page_size);
                    let burst = self.search_comments(second - 1, second + 1, size).await?;
                    if burst.len() >= size as usize {
                        warn!(
                            "{} or more comments at {}, any past the first {} are skipped",
                            size, second, size
                        );
                    }
                    fresh.extend(burst.into_iter().filter(|c| state.seen.insert(c.id.clone())));
                    Some(second)
                }
            };
            Ok::<_, CoreError>(Some((fresh, state)))
        });

        pages
            .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, CoreError>)))
            .try_flatten()
            .map_ok(Comment::from)
            .try_filter(move |comment| futures::future::ready(!banned.screens_out(comment)))
            .boxed()
    }
}
