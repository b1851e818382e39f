//! Scrape source abstraction
//!
//! Defines the `ScrapeSource` trait that decouples the scrape cycle from the
//! library that actually talks to the network. The cycle driver only needs two
//! things from a source: initialise a session with a cookie-authenticated
//! account, and run a search for a handle. `ReplaySource` serves previously
//! captured records from disk; network-backed sources implement the same trait.

pub mod cookies;
pub mod query;
pub mod records;
pub mod replay;

pub use cookies::parse_cookie_string;
pub use query::SearchQuery;
pub use records::{Media, MediaPhoto, TextLink, Tweet, TweetUser, UserRef};
pub use replay::ReplaySource;

use common::Secret;
use std::future::Future;
use std::pin::Pin;

/// Credentials handed to a source for one scrape cycle.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub cookie: Secret<String>,
}

/// Errors from scrape source operations.
///
/// The message is what ends up in the account's `last_error` column when the
/// account came from the pool, so keep it short and specific.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("login failed: {0}")]
    Login(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("unparseable response: {0}")]
    Parse(String),
}

/// Result alias for scrape operations.
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Boxed future returned by `ScrapeSource` methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Abstraction over the library that performs the scrape.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn ScrapeSource>`).
pub trait ScrapeSource: Send + Sync {
    /// Identifier for logging (e.g. "replay")
    fn id(&self) -> &str;

    /// Initialise a session for the given account.
    ///
    /// Fails with `ScrapeError::Login` when the cookie bundle is unusable. The
    /// cycle driver treats this exactly like a failed scrape.
    fn login<'a>(&'a self, credentials: &'a Credentials) -> BoxFuture<'a, Result<()>>;

    /// Run a search and return at most `limit` tweets.
    fn search<'a>(
        &'a self,
        credentials: &'a Credentials,
        query: &'a SearchQuery,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Tweet>>>;
}
