//! Account store abstraction
//!
//! The pool never holds a global connection. Selector, lease recorder and
//! provisioner all take an `Arc<dyn AccountStore>`, so tests can inject a
//! scripted store and runners can share one SQLite file.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use common::Secret;

use crate::account::ScraperAccount;
use crate::error::StoreResult;
use crate::lease::StatusUpdate;

/// Boxed future returned by `AccountStore` methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Persistent table of scraper accounts.
///
/// Every mutating method touches at most one row by primary key, except
/// `reclaim_stale`, which updates each stale row independently.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn AccountStore>`).
pub trait AccountStore: Send + Sync {
    /// One `available` account chosen uniformly at random, or `None`.
    fn random_available(&self) -> StoreFuture<'_, Option<ScraperAccount>>;

    /// Look up an account by username.
    fn get<'a>(&'a self, username: &'a str) -> StoreFuture<'a, Option<ScraperAccount>>;

    /// All accounts, ordered by username.
    fn list(&self) -> StoreFuture<'_, Vec<ScraperAccount>>;

    /// Create an `available` account, or replace the cookie of an existing one
    /// without touching its status.
    fn upsert<'a>(&'a self, username: &'a str, cookie: &'a Secret<String>) -> StoreFuture<'a, ()>;

    /// Write a status transition. Returns the number of rows changed (0 or 1).
    fn apply<'a>(&'a self, username: &'a str, update: &'a StatusUpdate) -> StoreFuture<'a, u64>;

    /// Mark the account occupied only if it is still `available`.
    ///
    /// Returns `true` when this caller won the lease.
    fn claim<'a>(&'a self, username: &'a str, at: DateTime<Utc>) -> StoreFuture<'a, bool>;

    /// Release `occupied` accounts whose `lock_time` is older than `cutoff`
    /// (or missing). Returns the released usernames.
    fn reclaim_stale(&self, cutoff: DateTime<Utc>) -> StoreFuture<'_, Vec<String>>;
}
