//! Lease state machine
//!
//! `transition` is a pure function from a lease event to the column values it
//! writes; it derives `is_occupied` from the status so the two can never
//! disagree. `Leases` applies transitions to the store. It is a passive
//! recorder: it does not check the current status before writing, the caller's
//! job outcome alone decides the next state.
//!
//! Marking failures are logged and swallowed. A failed `mark_available` or
//! `mark_error` leaves the stored status stale; nothing retries it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::account::{AccountStatus, truncate_message};
use crate::error::StoreResult;
use crate::store::AccountStore;

/// Event reported against a leased account.
#[derive(Debug, Clone)]
pub enum LeaseEvent {
    /// Account taken for a scrape cycle.
    Occupy { at: DateTime<Utc> },
    /// Cycle finished without error.
    Release,
    /// Cycle (or its setup) failed.
    Fail { message: String },
}

/// Column values written by one transition.
///
/// `None` for `lock_time` / `last_error` means "leave the stored value as is".
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: AccountStatus,
    pub lock_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl StatusUpdate {
    pub fn is_occupied(&self) -> bool {
        self.status == AccountStatus::Occupied
    }
}

/// Map a lease event to the update it writes. Pure function: no I/O.
pub fn transition(event: LeaseEvent) -> StatusUpdate {
    match event {
        LeaseEvent::Occupy { at } => StatusUpdate {
            status: AccountStatus::Occupied,
            lock_time: Some(at),
            last_error: None,
        },
        LeaseEvent::Release => StatusUpdate {
            status: AccountStatus::Available,
            lock_time: None,
            last_error: None,
        },
        LeaseEvent::Fail { message } => StatusUpdate {
            status: AccountStatus::Error,
            lock_time: None,
            last_error: Some(truncate_message(&message)),
        },
    }
}

/// Records lease transitions against an account store.
#[derive(Clone)]
pub struct Leases {
    store: Arc<dyn AccountStore>,
}

impl Leases {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Unconditionally mark an account occupied and stamp `lock_time`.
    pub async fn mark_occupied(&self, username: &str) -> bool {
        self.record(username, LeaseEvent::Occupy { at: Utc::now() })
            .await
    }

    /// Return an account to rotation after a clean cycle.
    pub async fn mark_available(&self, username: &str) -> bool {
        self.record(username, LeaseEvent::Release).await
    }

    /// Take an account out of rotation, keeping the (truncated) failure message.
    pub async fn mark_error(&self, username: &str, message: &str) -> bool {
        self.record(
            username,
            LeaseEvent::Fail {
                message: message.to_string(),
            },
        )
        .await
    }

    /// Route a job outcome to exactly one of `mark_available` / `mark_error`.
    pub async fn report(&self, username: &str, outcome: std::result::Result<(), &str>) -> bool {
        match outcome {
            Ok(()) => self.mark_available(username).await,
            Err(message) => self.mark_error(username, message).await,
        }
    }

    /// Atomically lease an account if it is still available.
    ///
    /// Returns `Ok(false)` when another runner claimed it first.
    pub async fn claim(&self, username: &str) -> StoreResult<bool> {
        let won = self.store.claim(username, Utc::now()).await?;
        if won {
            info!(username, "claimed scraper account");
            metrics::counter!("scraper_pool_transitions_total", "to" => "occupied").increment(1);
        } else {
            debug!(username, "account already leased by another runner");
        }
        Ok(won)
    }

    /// Release leases held longer than `max_age`.
    ///
    /// There is no automatic expiry; runners call this only when a lease TTL
    /// is configured, and operators can call it by hand after a crash.
    pub async fn reclaim_stale(&self, max_age: Duration) -> StoreResult<Vec<String>> {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let released = self.store.reclaim_stale(cutoff).await?;
        for username in &released {
            warn!(username, "reclaimed stale lease");
        }
        if !released.is_empty() {
            metrics::counter!("scraper_pool_transitions_total", "to" => "reclaimed")
                .increment(released.len() as u64);
        }
        Ok(released)
    }

    async fn record(&self, username: &str, event: LeaseEvent) -> bool {
        let update = transition(event);
        let label = update.status.label();
        match self.store.apply(username, &update).await {
            Ok(1) => {
                match &update.last_error {
                    Some(message) => warn!(username, error = %message, "marked account as error"),
                    None => info!(username, status = label, "marked account"),
                }
                metrics::counter!("scraper_pool_transitions_total", "to" => label).increment(1);
                true
            }
            Ok(_) => {
                warn!(username, status = label, "no account row matched, status not recorded");
                false
            }
            Err(e) => {
                warn!(username, status = label, error = %e, "failed to record account status");
                false
            }
        }
    }
}
