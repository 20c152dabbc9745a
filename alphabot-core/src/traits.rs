use crate::{BannedSubreddits, Comment, CoreError, FetchWindow, ReplyHandle};
use futures::stream::BoxStream;

/// Yields the comments created inside a fetch window.
///
/// Implementations must yield comments in ascending `created_utc` order and
/// already leave out comments from banned subreddits and automated authors.
/// The stream is lazy: pages are only requested as the caller pulls.
pub trait CommentSource {
    fn fetch<'a>(
        &'a self,
        window: FetchWindow,
        banned: &'a BannedSubreddits,
    ) -> BoxStream<'a, Result<Comment, CoreError>>;
}

/// Posts a reply underneath a comment.
///
/// The dispatch loop awaits replies on its own task, so the returned future
/// carries no `Send` bound.
#[allow(async_fn_in_trait)]
pub trait ReplySink {
    async fn reply(&self, parent: &Comment, text: &str) -> Result<ReplyHandle, CoreError>;
}

/// Wall clock in epoch seconds.
pub trait Clock {
    fn now(&self) -> i64;
}

impl<T: CommentSource + ?Sized> CommentSource for &T {
    fn fetch<'a>(
        &'a self,
        window: FetchWindow,
        banned: &'a BannedSubreddits,
    ) -> BoxStream<'a, Result<Comment, CoreError>> {
        (**self).fetch(window, banned)
    }
}

impl<T: ReplySink + ?Sized> ReplySink for &T {
    async fn reply(&self, parent: &Comment, text: &str) -> Result<ReplyHandle, CoreError> {
        (**self).reply(parent, text).await
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> i64 {
        (**self).now()
    }
}
