//! Scraper account pool
//!
//! Leases cookie-authenticated scraper accounts out of a shared SQLite table
//! for one scrape cycle at a time. Several independent runner processes may
//! share the table, so every status change is a single-row write and leasing
//! uses a conditional update.
//!
//! Account lifecycle:
//! 1. Account row created out-of-band with status `available`
//! 2. Selector picks a random available row with a non-empty cookie
//! 3. Provisioner claims it (`available` → `occupied`, `lock_time` = now)
//! 4. The job succeeds → `available`; the job fails → `error` with `last_error`
//! 5. `error` accounts stay out of rotation until an operator resets them
//! 6. Abandoned `occupied` leases are only recovered by an explicit reclaim
//!
//! When the pool yields nothing after bounded retries the provisioner hands
//! out a static fallback identity, which never touches the table.

pub mod account;
pub mod error;
pub mod health;
pub mod lease;
pub mod provisioner;
pub mod selector;
pub mod sqlite;
pub mod store;

pub use account::{AccountStatus, MAX_ERROR_LEN, ScraperAccount, truncate_message};
pub use error::{Error, Result, StoreError, StoreResult};
pub use health::pool_health;
pub use lease::{LeaseEvent, Leases, StatusUpdate, transition};
pub use provisioner::{
    AccountSource, FallbackIdentity, ProvisionedAccount, Provisioner, RetryPolicy,
};
pub use selector::{SelectResult, select_account};
pub use sqlite::SqliteAccountStore;
pub use store::AccountStore;
