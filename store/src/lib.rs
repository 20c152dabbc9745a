pub mod banned;
pub mod cursor;
pub mod ledger;


pub use banned::BannedSubredditStore;
pub use cursor::{fetch_window, next_cursor, CursorStore, MAX_CURSOR_LAG_SECS};
pub use ledger::ReplyLedger;
