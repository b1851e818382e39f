//! Tweet and profile persistence
//!
//! Maps scraped records into the flat row shapes of the `enhanced_tweets` and
//! `twitter_profiles` tables and upserts them in batches. The cycle driver only
//! sees the `RecordSink` contract: "persist tweets" and "persist profiles".

pub mod error;
pub mod mapper;
pub mod rows;
pub mod schema;
pub mod sqlite;

pub use error::{Error, Result};
pub use mapper::{extract_photo_urls, is_crypto_bio, map_tweet, map_user, unique_authors};
pub use rows::{EnhancedTweetRow, ProfileRow, TweetCategory};
pub use sqlite::SqliteTweetStore;

use std::future::Future;
use std::pin::Pin;

/// Bulk persister for mapped rows.
///
/// Both operations upsert by primary key, update only the mutable columns on
/// conflict, and return the number of rows written. An empty slice is a no-op.
pub trait RecordSink: Send + Sync {
    fn upsert_tweets<'a>(
        &'a self,
        rows: &'a [EnhancedTweetRow],
    ) -> Pin<Box<dyn Future<Output = Result<usize>> + Send + 'a>>;

    fn upsert_profiles<'a>(
        &'a self,
        rows: &'a [ProfileRow],
    ) -> Pin<Box<dyn Future<Output = Result<usize>> + Send + 'a>>;
}
