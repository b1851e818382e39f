//! Pool health summary

use chrono::SecondsFormat;

use crate::account::AccountStatus;
use crate::error::StoreResult;
use crate::store::AccountStore;

/// Pool health summary for `accounts list`.
///
/// Returns a JSON value with per-account status and overall pool health.
/// Status mapping: all eligible → healthy, some eligible → degraded,
/// none eligible (or empty pool) → unhealthy. An available account without a
/// cookie is not eligible. Cookies are never included.
pub async fn pool_health(store: &dyn AccountStore) -> StoreResult<serde_json::Value> {
    let rows = store.list().await?;

    let mut accounts = Vec::with_capacity(rows.len());
    let mut available_count = 0usize;
    let mut eligible_count = 0usize;
    let mut occupied_count = 0usize;
    let mut error_count = 0usize;

    for account in &rows {
        match account.status {
            AccountStatus::Available => available_count += 1,
            AccountStatus::Occupied => occupied_count += 1,
            AccountStatus::Error => error_count += 1,
        }
        if account.is_eligible() {
            eligible_count += 1;
        }
        accounts.push(serde_json::json!({
            "username": account.username,
            "status": account.status.label(),
            "has_cookie": account.has_cookie(),
            "lock_time": account
                .lock_time
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            "last_error": account.last_error,
        }));
    }

    let total = rows.len();
    let pool_status = if eligible_count == total && total > 0 {
        "healthy"
    } else if eligible_count > 0 {
        "degraded"
    } else {
        "unhealthy"
    };

    Ok(serde_json::json!({
        "status": pool_status,
        "accounts_total": total,
        "accounts_available": available_count,
        "accounts_eligible": eligible_count,
        "accounts_occupied": occupied_count,
        "accounts_error": error_count,
        "accounts": accounts
    }))
}
