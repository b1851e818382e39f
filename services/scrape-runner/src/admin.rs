//! Account administration commands
//!
//! The out-of-band path for managing the pool table from the CLI:
//! - `accounts list`       - pool health with per-account status
//! - `accounts add`        - create an account or replace its cookie
//! - `accounts set-status` - operator override, e.g. return an error account to rotation
//! - `accounts reclaim`    - release leases abandoned by crashed runs

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use account_pool::{AccountStatus, AccountStore, Leases, pool_health};
use common::Secret;
use tracing::info;

use crate::error::AdminError;

/// Message recorded when an operator marks an account as error without one.
pub const OPERATOR_ERROR_MESSAGE: &str = "Marked as error by operator";

/// Pool health summary. Never exposes cookies.
pub async fn list_accounts(store: &dyn AccountStore) -> Result<serde_json::Value, AdminError> {
    Ok(pool_health(store).await?)
}

/// Resolve the cookie for `accounts add`: file first, then the env value.
pub fn read_cookie(
    cookie_file: Option<&Path>,
    env_cookie: Option<String>,
) -> Result<Secret<String>, AdminError> {
    let cookie = match (cookie_file, env_cookie) {
        (Some(path), _) => std::fs::read_to_string(path).map_err(|e| {
            AdminError::Invalid(format!("failed to read cookie file {}: {e}", path.display()))
        })?,
        (None, Some(cookie)) => cookie,
        (None, None) => {
            return Err(AdminError::Invalid(
                "a cookie is required: pass --cookie-file or set SCRAPER_ACCOUNT_COOKIE".into(),
            ));
        }
    };
    let cookie = Secret::new(cookie.trim().to_owned());
    if cookie.is_blank() {
        return Err(AdminError::Invalid("cookie is empty".into()));
    }
    Ok(cookie)
}

/// Create an `available` account, or replace the cookie of an existing one.
pub async fn add_account(
    store: &dyn AccountStore,
    username: &str,
    cookie: &Secret<String>,
) -> Result<(), AdminError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AdminError::Invalid("username is empty".into()));
    }
    store.upsert(username, cookie).await?;
    info!(username, "account saved");
    Ok(())
}

/// Force an account into `status` through the lease state machine.
pub async fn set_status(
    store: Arc<dyn AccountStore>,
    username: &str,
    status: AccountStatus,
    message: Option<&str>,
) -> Result<(), AdminError> {
    if store.get(username).await?.is_none() {
        return Err(AdminError::UnknownAccount(username.to_string()));
    }
    let leases = Leases::new(store);
    let written = match status {
        AccountStatus::Available => leases.mark_available(username).await,
        AccountStatus::Occupied => leases.mark_occupied(username).await,
        AccountStatus::Error => {
            leases
                .mark_error(username, message.unwrap_or(OPERATOR_ERROR_MESSAGE))
                .await
        }
    };
    if !written {
        return Err(AdminError::Invalid(format!(
            "status for {username} was not recorded"
        )));
    }
    info!(username, status = status.label(), "account status set by operator");
    Ok(())
}

/// Release leases older than `older_than`. Returns the released usernames.
pub async fn reclaim(
    store: Arc<dyn AccountStore>,
    older_than: Duration,
) -> Result<Vec<String>, AdminError> {
    let released = Leases::new(store).reclaim_stale(older_than).await?;
    info!(released = released.len(), "stale leases reclaimed");
    Ok(released)
}
