pub mod api;
pub mod auth;
pub mod pushshift;


pub use api::{RedditApiClient, RedditCommentData};
pub use auth::{RedditAuthenticator, RedditToken};
pub use pushshift::{PushshiftClient, PushshiftComment};

use alphabot_core::{
    bare_id, AppConfig, BannedSubreddits, Comment, CommentSource, CoreError, FetchWindow,
    RedditApiError, ReplyHandle, ReplySink,
};
use futures::stream::BoxStream;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Reads comments from Pushshift and replies through the Reddit API.
pub struct RedditClient {
    api: RedditApiClient,
    authenticator: RedditAuthenticator,
    token: Mutex<Option<RedditToken>>,
    pushshift: PushshiftClient,
}

impl RedditClient {
    pub fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        let api = RedditApiClient::new(config.reddit.user_agent.clone())?;
        let authenticator = RedditAuthenticator::new(&config.reddit)?;
        let pushshift = PushshiftClient::new(
            &config.pushshift.base_url,
            config.pushshift.page_size,
            &config.reddit.user_agent,
        )?;

        Ok(Self {
            api,
            authenticator,
            token: Mutex::new(None),
            pushshift,
        })
    }

    /// Returns a live bearer token, logging in again when the cached one
    /// is missing or about to expire.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| !token.is_expired()) {
            return Ok(token.access_token.clone());
        }

        let token = self.authenticator.authenticate().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }
}

impl CommentSource for RedditClient {
    fn fetch<'a>(
        &'a self,
        window: FetchWindow,
        banned: &'a BannedSubreddits,
    ) -> BoxStream<'a, Result<Comment, CoreError>> {
        self.pushshift.comments(window, banned)
    }
}

impl ReplySink for RedditClient {
    async fn reply(&self, parent: &Comment, text: &str) -> Result<ReplyHandle, CoreError> {
        let access_token = self.access_token().await?;
        let parent_fullname = format!("t1_{}", parent.id);

        let submitted = match self
            .api
            .submit_comment(&access_token, &parent_fullname, text)
            .await
        {
            Ok(submitted) => submitted,
            Err(CoreError::RedditApi(RedditApiError::InvalidToken)) => {
                warn!("Access token rejected, logging in again on next attempt");
                self.invalidate_token().await;
                return Err(CoreError::RedditApi(RedditApiError::InvalidToken));
            }
            Err(e) => return Err(e),
        };

        info!(
            "Replied to {} in r/{} with {}",
            parent.id, parent.subreddit, submitted.id
        );
        Ok(reply_handle(parent, submitted))
    }
}

fn reply_handle(parent: &Comment, submitted: RedditCommentData) -> ReplyHandle {
    let submission_id = match bare_id(&submitted.link_id) {
        "" => parent.submission_id.clone(),
        id => id.to_string(),
    };

    ReplyHandle {
        parent_id: parent.id.clone(),
        id: bare_id(&submitted.id).to_string(),
        submission_id,
        subreddit: parent.subreddit.clone(),
        parent_author: parent.author.clone(),
        parent_body: parent.body.clone(),
        body: submitted.body,
    }
}
