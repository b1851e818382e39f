//! Account provisioning with bounded retry and fallback
//!
//! Resolution order:
//! 1. Explicit credentials, when both fields are given. The pool is not touched.
//! 2. A pool account, claimed atomically. Retried up to `max_retries` times
//!    with exponential backoff (1, 2, 4, 8, 16 s by default).
//! 3. The configured fallback identity, which is never leased.

use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use tracing::{info, warn};

use crate::account::ScraperAccount;
use crate::error::{Error, Result};
use crate::lease::Leases;
use crate::selector::{SelectResult, select_account};
use crate::store::AccountStore;

/// Default number of pool attempts before falling back.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (zero-based): `backoff_base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Static, non-pooled credential used when the pool yields nothing.
#[derive(Debug, Clone)]
pub struct FallbackIdentity {
    pub username: String,
    pub cookie: Secret<String>,
}

/// Where a provisioned account came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountSource {
    Explicit,
    Pool,
    Fallback,
}

impl AccountSource {
    pub fn label(&self) -> &'static str {
        match self {
            AccountSource::Explicit => "explicit",
            AccountSource::Pool => "pool",
            AccountSource::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for AccountSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Credentials handed to one scrape cycle.
#[derive(Debug, Clone)]
pub struct ProvisionedAccount {
    pub username: String,
    pub cookie_string: Secret<String>,
    pub source: AccountSource,
}

impl ProvisionedAccount {
    /// Only pool accounts hold a lease that must be reported back.
    pub fn from_pool(&self) -> bool {
        self.source == AccountSource::Pool
    }
}

/// Hands out scraper credentials for a scrape cycle.
pub struct Provisioner {
    store: Arc<dyn AccountStore>,
    leases: Leases,
    policy: RetryPolicy,
    fallback: Option<FallbackIdentity>,
}

impl Provisioner {
    pub fn new(
        store: Arc<dyn AccountStore>,
        policy: RetryPolicy,
        fallback: Option<FallbackIdentity>,
    ) -> Self {
        let leases = Leases::new(store.clone());
        Self {
            store,
            leases,
            policy,
            fallback,
        }
    }

    /// Lease recorder sharing this provisioner's store.
    pub fn leases(&self) -> &Leases {
        &self.leases
    }

    /// Resolve credentials for one cycle.
    ///
    /// A `Pool` result is already marked occupied; the caller must report the
    /// job outcome through `Leases::report`. Fails with `NoUsableAccount` only
    /// when the pool is exhausted and no fallback with a cookie is configured.
    pub async fn provision(
        &self,
        explicit_username: Option<&str>,
        explicit_cookie: Option<&str>,
    ) -> Result<ProvisionedAccount> {
        let username = explicit_username.filter(|u| !u.trim().is_empty());
        let cookie = explicit_cookie.filter(|c| !c.trim().is_empty());
        match (username, cookie) {
            (Some(username), Some(cookie)) => {
                info!(username, "using explicit credentials");
                return Ok(self.provisioned(ProvisionedAccount {
                    username: username.to_string(),
                    cookie_string: Secret::from(cookie),
                    source: AccountSource::Explicit,
                }));
            }
            (Some(_), None) | (None, Some(_)) => {
                warn!("only one of username/cookie given, ignoring explicit credentials");
            }
            (None, None) => {}
        }

        for attempt in 0..self.policy.max_retries {
            if let Some(account) = self.try_pool(attempt).await {
                return Ok(self.provisioned(ProvisionedAccount {
                    username: account.username,
                    cookie_string: account.cookie_string,
                    source: AccountSource::Pool,
                }));
            }
            let delay = self.policy.delay_for(attempt);
            warn!(
                attempt = attempt + 1,
                max_retries = self.policy.max_retries,
                delay_secs = delay.as_secs_f64(),
                "no pool account, backing off"
            );
            tokio::time::sleep(delay).await;
        }

        match &self.fallback {
            Some(fallback) if !fallback.cookie.is_blank() => {
                warn!(
                    username = %fallback.username,
                    attempts = self.policy.max_retries,
                    "pool exhausted, using fallback identity"
                );
                Ok(self.provisioned(ProvisionedAccount {
                    username: fallback.username.clone(),
                    cookie_string: fallback.cookie.clone(),
                    source: AccountSource::Fallback,
                }))
            }
            Some(fallback) => Err(Error::NoUsableAccount(format!(
                "pool exhausted after {} attempts and fallback {} has no cookie",
                self.policy.max_retries, fallback.username
            ))),
            None => Err(Error::NoUsableAccount(format!(
                "pool exhausted after {} attempts and no fallback configured",
                self.policy.max_retries
            ))),
        }
    }

    /// One select-and-claim attempt. `None` means back off and retry.
    async fn try_pool(&self, attempt: u32) -> Option<ScraperAccount> {
        let account = match select_account(self.store.as_ref()).await {
            SelectResult::Found(account) => account,
            SelectResult::Empty => return None,
            SelectResult::Unusable { username } => {
                warn!(username = %username, attempt = attempt + 1, "skipping account without cookie");
                return None;
            }
            SelectResult::AccessError(e) => {
                warn!(error = %e, attempt = attempt + 1, "account pool unreachable");
                return None;
            }
        };
        match self.leases.claim(&account.username).await {
            Ok(true) => Some(account),
            Ok(false) => {
                info!(username = %account.username, "lost claim race, retrying");
                None
            }
            Err(e) => {
                warn!(username = %account.username, error = %e, "failed to claim account");
                None
            }
        }
    }

    fn provisioned(&self, account: ProvisionedAccount) -> ProvisionedAccount {
        metrics::counter!("scraper_provisions_total", "source" => account.source.label())
            .increment(1);
        account
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountStatus;
    use crate::error::{StoreError, StoreResult};
    use crate::lease::StatusUpdate;
    use crate::store::StoreFuture;
    use chrono::{DateTime, Utc};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    /// Store double that replays scripted selection and claim outcomes.
    #[derive(Default)]
    struct ScriptedStore {
        picks: Mutex<VecDeque<StoreResult<Option<ScraperAccount>>>>,
        claims: Mutex<VecDeque<bool>>,
        claimed: Mutex<Vec<String>>,
        selections: AtomicUsize,
    }

    impl ScriptedStore {
        fn with_picks(picks: Vec<StoreResult<Option<ScraperAccount>>>) -> Self {
            Self {
                picks: Mutex::new(picks.into()),
                ..Default::default()
            }
        }

        fn with_claims(self, claims: Vec<bool>) -> Self {
            *self.claims.lock().unwrap() = claims.into();
            self
        }

        fn selections(&self) -> usize {
            self.selections.load(Ordering::SeqCst)
        }
    }

    impl AccountStore for ScriptedStore {
        fn random_available(&self) -> StoreFuture<'_, Option<ScraperAccount>> {
            self.selections.fetch_add(1, Ordering::SeqCst);
            let next = self.picks.lock().unwrap().pop_front().unwrap_or(Ok(None));
            Box::pin(async move { next })
        }

        fn get<'a>(&'a self, _username: &'a str) -> StoreFuture<'a, Option<ScraperAccount>> {
            Box::pin(async { Ok(None) })
        }

        fn list(&self) -> StoreFuture<'_, Vec<ScraperAccount>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn upsert<'a>(&'a self, _: &'a str, _: &'a Secret<String>) -> StoreFuture<'a, ()> {
            Box::pin(async { Ok(()) })
        }

        fn apply<'a>(&'a self, _: &'a str, _: &'a StatusUpdate) -> StoreFuture<'a, u64> {
            Box::pin(async { Ok(1) })
        }

        fn claim<'a>(&'a self, username: &'a str, _at: DateTime<Utc>) -> StoreFuture<'a, bool> {
            let won = self.claims.lock().unwrap().pop_front().unwrap_or(true);
            if won {
                self.claimed.lock().unwrap().push(username.to_string());
            }
            Box::pin(async move { Ok(won) })
        }

        fn reclaim_stale(&self, _cutoff: DateTime<Utc>) -> StoreFuture<'_, Vec<String>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    fn account(username: &str, cookie: &str) -> ScraperAccount {
        ScraperAccount {
            username: username.into(),
            cookie_string: Secret::from(cookie),
            status: AccountStatus::Available,
            is_occupied: false,
            lock_time: None,
            last_error: None,
        }
    }

    fn fallback() -> Option<FallbackIdentity> {
        Some(FallbackIdentity {
            username: "fallback_user".into(),
            cookie: Secret::from("auth_token=f; ct0=f"),
        })
    }

    fn provisioner(store: Arc<ScriptedStore>, fallback: Option<FallbackIdentity>) -> Provisioner {
        Provisioner::new(store, RetryPolicy::default(), fallback)
    }

    #[test]
    fn default_backoff_schedule_doubles_from_one_second() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..5).map(|a| policy.delay_for(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
    }

    #[test]
    fn only_pool_accounts_report_back() {
        let mut account = ProvisionedAccount {
            username: "u".into(),
            cookie_string: Secret::from("c"),
            source: AccountSource::Pool,
        };
        assert!(account.from_pool());
        account.source = AccountSource::Explicit;
        assert!(!account.from_pool());
        account.source = AccountSource::Fallback;
        assert!(!account.from_pool());
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_credentials_never_touch_the_pool() {
        let store = Arc::new(ScriptedStore::default());
        let p = provisioner(store.clone(), fallback());

        let account = p.provision(Some("me"), Some("auth_token=1; ct0=2")).await.unwrap();
        assert_eq!(account.source, AccountSource::Explicit);
        assert_eq!(account.username, "me");
        assert_eq!(account.cookie_string.expose(), "auth_token=1; ct0=2");
        assert_eq!(store.selections(), 0);
        assert!(store.claimed.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn single_explicit_field_falls_through_to_pool() {
        let store = Arc::new(ScriptedStore::with_picks(vec![Ok(Some(account("a", "c")))]));
        let p = provisioner(store.clone(), fallback());

        let account = p.provision(Some("me"), None).await.unwrap();
        assert_eq!(account.source, AccountSource::Pool);
        assert_eq!(account.username, "a");
        assert_eq!(store.selections(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pool_account_is_claimed_without_waiting() {
        let store = Arc::new(ScriptedStore::with_picks(vec![Ok(Some(account("a", "c")))]));
        let p = provisioner(store.clone(), fallback());
        let start = Instant::now();

        let account = p.provision(None, None).await.unwrap();
        assert!(account.from_pool());
        assert_eq!(account.cookie_string.expose(), "c");
        assert_eq!(*store.claimed.lock().unwrap(), vec!["a".to_string()]);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_after_three_seconds() {
        let store = Arc::new(ScriptedStore::with_picks(vec![
            Ok(None),
            Err(StoreError::Task("connection reset".into())),
            Ok(Some(account("c", "cookie"))),
        ]));
        let p = provisioner(store.clone(), fallback());
        let start = Instant::now();

        let account = p.provision(None, None).await.unwrap();
        assert_eq!(account.username, "c");
        assert_eq!(account.source, AccountSource::Pool);
        assert_eq!(store.selections(), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_pool_falls_back_after_full_schedule() {
        let store = Arc::new(ScriptedStore::default());
        let p = provisioner(store.clone(), fallback());
        let start = Instant::now();

        let account = p.provision(None, None).await.unwrap();
        assert_eq!(account.source, AccountSource::Fallback);
        assert_eq!(account.username, "fallback_user");
        assert_eq!(store.selections(), 5);
        // 1 + 2 + 4 + 8 + 16
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(31) && elapsed < Duration::from_secs(32));
        assert!(store.claimed.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unusable_accounts_are_retried() {
        let store = Arc::new(ScriptedStore::with_picks(vec![
            Ok(Some(account("nocookie", "  "))),
            Ok(Some(account("good", "c"))),
        ]));
        let p = provisioner(store.clone(), fallback());

        let account = p.provision(None, None).await.unwrap();
        assert_eq!(account.username, "good");
        assert_eq!(*store.claimed.lock().unwrap(), vec!["good".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn lost_claim_counts_as_failed_attempt() {
        let store = Arc::new(
            ScriptedStore::with_picks(vec![
                Ok(Some(account("a", "c"))),
                Ok(Some(account("b", "c"))),
            ])
            .with_claims(vec![false, true]),
        );
        let p = provisioner(store.clone(), fallback());
        let start = Instant::now();

        let account = p.provision(None, None).await.unwrap();
        assert_eq!(account.username, "b");
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(1) && elapsed < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_pool_without_fallback_is_an_error() {
        let store = Arc::new(ScriptedStore::default());
        let p = provisioner(store, None);

        let err = p.provision(None, None).await.unwrap_err();
        assert!(matches!(err, Error::NoUsableAccount(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_store_without_fallback_is_no_usable_account() {
        let picks = (0..5)
            .map(|_| Err(StoreError::Task("database is locked".into())))
            .collect();
        let store = Arc::new(ScriptedStore::with_picks(picks));
        let p = provisioner(store.clone(), None);

        let err = p.provision(None, None).await.unwrap_err();
        assert!(matches!(err, Error::NoUsableAccount(_)), "got: {err:?}");
        assert_eq!(store.selections(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_without_cookie_is_an_error() {
        let store = Arc::new(ScriptedStore::default());
        let p = provisioner(
            store,
            Some(FallbackIdentity {
                username: "fallback_user".into(),
                cookie: Secret::from(""),
            }),
        );

        let err = p.provision(None, None).await.unwrap_err();
        assert!(err.to_string().contains("fallback_user has no cookie"));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_policy_controls_attempt_count() {
        let store = Arc::new(ScriptedStore::default());
        let p = Provisioner::new(
            store.clone(),
            RetryPolicy {
                max_retries: 2,
                backoff_base: Duration::from_millis(100),
            },
            fallback(),
        );
        let start = Instant::now();

        p.provision(None, None).await.unwrap();
        assert_eq!(store.selections(), 2);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300) && elapsed < Duration::from_millis(400));
    }

    #[test]
    fn records_provision_metric_by_source() {
        use metrics_exporter_prometheus::PrometheusBuilder;

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();
        rt.block_on(async {
            let p = provisioner(Arc::new(ScriptedStore::default()), fallback());
            p.provision(Some("me"), Some("c")).await.unwrap();
            p.provision(None, None).await.unwrap();
        });

        let output = handle.render();
        assert!(output.contains("scraper_provisions_total{source=\"explicit\"} 1"));
        assert!(output.contains("scraper_provisions_total{source=\"fallback\"} 1"));
        assert!(output.contains("scraper_pool_selections_total{result=\"empty\"} 5"));
    }
}
