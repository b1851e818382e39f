//! Replay source: serves captured search results from disk.
//!
//! A capture directory holds a `tweets.json` file containing an array of
//! tweets in the scraping library's JSON shape. Searches filter that set by
//! handle, date window and engagement thresholds. Login still validates the cookie bundle,
//! so a bad account fails here the same way it would against the network.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::cookies::parse_cookie_string;
use crate::{BoxFuture, Credentials, Result, ScrapeError, ScrapeSource, SearchQuery, Tweet};

/// File inside the capture directory holding the tweet array.
pub const TWEETS_FILE: &str = "tweets.json";

/// Captured-record scrape source.
pub struct ReplaySource {
    path: PathBuf,
    tweets: Vec<Tweet>,
}

impl ReplaySource {
    /// Load captured tweets from `dir/tweets.json`.
    pub async fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(TWEETS_FILE);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ScrapeError::Request(format!("reading {}: {e}", path.display())))?;
        let tweets: Vec<Tweet> = serde_json::from_str(&contents)
            .map_err(|e| ScrapeError::Parse(format!("parsing {}: {e}", path.display())))?;
        info!(path = %path.display(), tweets = tweets.len(), "loaded replay capture");
        Ok(Self { path, tweets })
    }

    /// Build a source from an in-memory set of tweets.
    pub fn from_tweets(tweets: Vec<Tweet>) -> Self {
        Self {
            path: PathBuf::new(),
            tweets,
        }
    }

    fn matches(tweet: &Tweet, query: &SearchQuery) -> bool {
        if !query.in_window(tweet.date.date_naive()) {
            return false;
        }
        let handle = query.bare_handle();
        let by_author = tweet.user.username.to_lowercase() == handle;
        let mentions = tweet.raw_content.to_lowercase().contains(&handle);
        if !(by_author || mentions) {
            return false;
        }
        let meets = |threshold: Option<u32>, value: Option<i64>| match threshold {
            Some(min) => value.unwrap_or(0) >= i64::from(min),
            None => true,
        };
        meets(query.min_faves, tweet.like_count)
            && meets(query.min_replies, tweet.reply_count)
            && meets(query.min_retweets, tweet.retweet_count)
    }
}

impl ScrapeSource for ReplaySource {
    fn id(&self) -> &str {
        "replay"
    }

    fn login<'a>(&'a self, credentials: &'a Credentials) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            parse_cookie_string(credentials.cookie.expose())?;
            debug!(username = %credentials.username, "replay session initialised");
            Ok(())
        })
    }

    fn search<'a>(
        &'a self,
        credentials: &'a Credentials,
        query: &'a SearchQuery,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Tweet>>> {
        Box::pin(async move {
            let found: Vec<Tweet> = self
                .tweets
                .iter()
                .filter(|t| Self::matches(t, query))
                .take(limit)
                .cloned()
                .collect();
            debug!(
                username = %credentials.username,
                query = %query,
                capture = %self.path.display(),
                results = found.len(),
                "replayed search"
            );
            Ok(found)
        })
    }
}
