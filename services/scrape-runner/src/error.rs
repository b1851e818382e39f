//! Service-specific error types
//!
//! Exit codes:
//! - 0: cycle completed
//! - 1: job failed (login, search or persist), or an admin command failed
//! - 2: no pool account and no usable fallback identity
//! - 3: configuration or startup error

use thiserror::Error;

pub const EXIT_JOB_FAILED: u8 = 1;
pub const EXIT_NO_ACCOUNT: u8 = 2;
pub const EXIT_STARTUP: u8 = 3;

/// Failure inside a scrape job, after credentials were provisioned.
///
/// Its display string is what lands in `last_error` for pool accounts.
#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Scrape(#[from] scrape_source::ScrapeError),

    #[error("persist failed: {0}")]
    Persist(#[from] tweet_store::Error),
}

/// Scrape cycle errors.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error(transparent)]
    Provision(#[from] account_pool::Error),

    #[error("scrape cycle failed for {username}: {source}")]
    Job { username: String, source: JobError },
}

/// `accounts` admin command errors.
#[derive(Error, Debug)]
pub enum AdminError {
    #[error("no account named {0}")]
    UnknownAccount(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] account_pool::StoreError),
}

impl CycleError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CycleError::Provision(account_pool::Error::NoUsableAccount(_)) => EXIT_NO_ACCOUNT,
            CycleError::Job { .. } => EXIT_JOB_FAILED,
        }
    }
}
