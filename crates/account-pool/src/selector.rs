//! Random account selection
//!
//! Selection is a pure read. Leasing the chosen account is a separate step
//! (`Leases::claim`) so that "choose" and "lease" can each be retried.

use tracing::{info, warn};

use crate::account::{AccountStatus, ScraperAccount};
use crate::store::AccountStore;

/// Outcome of one selection attempt.
#[derive(Debug)]
pub enum SelectResult {
    /// An eligible account.
    Found(ScraperAccount),
    /// No account has status `available`.
    Empty,
    /// The chosen account has no cookie. It stays `available`.
    Unusable { username: String },
    /// The store could not be read.
    AccessError(String),
}

impl SelectResult {
    /// Metric/log label.
    pub fn label(&self) -> &'static str {
        match self {
            SelectResult::Found(_) => "found",
            SelectResult::Empty => "empty",
            SelectResult::Unusable { .. } => "unusable",
            SelectResult::AccessError(_) => "access_error",
        }
    }

    /// Collapse to "an account or nothing".
    pub fn into_option(self) -> Option<ScraperAccount> {
        match self {
            SelectResult::Found(account) => Some(account),
            _ => None,
        }
    }
}

/// Pick one available account uniformly at random.
///
/// Storage failures are logged and returned as `AccessError`, never propagated.
pub async fn select_account(store: &dyn AccountStore) -> SelectResult {
    let result = match store.random_available().await {
        Ok(None) => {
            warn!("no available scraper accounts");
            SelectResult::Empty
        }
        // The query already filters on status; a row that disagrees is skipped
        Ok(Some(account)) if account.status != AccountStatus::Available => {
            warn!(
                username = %account.username,
                status = account.status.label(),
                "store returned a non-available account, skipping"
            );
            SelectResult::Empty
        }
        Ok(Some(account)) if !account.has_cookie() => {
            warn!(username = %account.username, "no cookie for scraper account");
            SelectResult::Unusable {
                username: account.username,
            }
        }
        Ok(Some(account)) => {
            info!(username = %account.username, "selected scraper account");
            SelectResult::Found(account)
        }
        Err(e) => {
            warn!(error = %e, "failed to fetch scraper account");
            SelectResult::AccessError(e.to_string())
        }
    };
    metrics::counter!("scraper_pool_selections_total", "result" => result.label()).increment(1);
    result
}
