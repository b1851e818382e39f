//! Scrape cycle driver
//!
//! One cycle: provision credentials, log the source in, search the target
//! handle, persist tweets and their authors, then report the outcome back to
//! the lease. Only pool accounts are reported; explicit and fallback
//! credentials never touch the pool.

use std::sync::Arc;

use account_pool::{AccountSource, Provisioner};
use chrono::{DateTime, Utc};
use scrape_source::{Credentials, ScrapeSource, SearchQuery};
use tracing::{Instrument, error, info, info_span};
use tweet_store::{RecordSink, map_tweet, map_user, unique_authors};
use uuid::Uuid;

use crate::error::{CycleError, JobError};

/// Search window and attribution shared by every cycle.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub scraped_by: String,
    pub window_start_days: u64,
    pub window_end_days: u64,
    pub limit: usize,
}

/// Everything a cycle needs besides the request.
pub struct CycleDeps {
    pub provisioner: Provisioner,
    pub source: Arc<dyn ScrapeSource>,
    pub sink: Arc<dyn RecordSink>,
    pub settings: CycleSettings,
}

/// One `run` invocation.
#[derive(Debug, Clone, Default)]
pub struct CycleRequest {
    pub handle: String,
    pub username: Option<String>,
    pub cookie: Option<String>,
    pub min_faves: Option<u32>,
    pub min_replies: Option<u32>,
    pub min_retweets: Option<u32>,
}

/// What a completed cycle wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub username: String,
    pub source: AccountSource,
    pub tweets: usize,
    pub profiles: usize,
}

/// Run one scrape cycle inside a `run_id` span.
pub async fn run_cycle(deps: &CycleDeps, request: &CycleRequest) -> Result<CycleReport, CycleError> {
    let run_id = Uuid::new_v4();
    let span = info_span!("scrape_cycle", %run_id, handle = %request.handle);
    let result = drive(deps, request).instrument(span).await;
    let outcome = match &result {
        Ok(_) => "success",
        Err(CycleError::Provision(_)) => "no_account",
        Err(CycleError::Job { .. }) => "job_error",
    };
    metrics::counter!("scraper_cycles_total", "outcome" => outcome).increment(1);
    result
}

async fn drive(deps: &CycleDeps, request: &CycleRequest) -> Result<CycleReport, CycleError> {
    let account = deps
        .provisioner
        .provision(request.username.as_deref(), request.cookie.as_deref())
        .await?;
    info!(username = %account.username, source = %account.source, "provisioned account");

    let credentials = Credentials {
        username: account.username.clone(),
        cookie: account.cookie_string.clone(),
    };
    let outcome = scrape_and_persist(deps, request, &credentials, Utc::now()).await;

    if account.from_pool() {
        let message = outcome.as_ref().err().map(|e| e.to_string());
        deps.provisioner
            .leases()
            .report(&account.username, message.as_deref().map_or(Ok(()), Err))
            .await;
    }

    match outcome {
        Ok((tweets, profiles)) => {
            info!(
                username = %account.username,
                tweets,
                profiles,
                "scrape cycle complete"
            );
            Ok(CycleReport {
                username: account.username,
                source: account.source,
                tweets,
                profiles,
            })
        }
        Err(e) => {
            error!(username = %account.username, error = %e, "scrape cycle failed");
            Err(CycleError::Job {
                username: account.username,
                source: e,
            })
        }
    }
}

/// The job proper. Any error here is a job failure for the lease.
async fn scrape_and_persist(
    deps: &CycleDeps,
    request: &CycleRequest,
    credentials: &Credentials,
    now: DateTime<Utc>,
) -> Result<(usize, usize), JobError> {
    let settings = &deps.settings;

    deps.source.login(credentials).await?;

    let query = SearchQuery::for_window(
        request.handle.clone(),
        now.date_naive(),
        settings.window_start_days,
        settings.window_end_days,
    )
    .with_min_faves(request.min_faves)
    .with_min_replies(request.min_replies)
    .with_min_retweets(request.min_retweets);
    info!(source = deps.source.id(), query = %query, "searching");

    let tweets = deps
        .source
        .search(credentials, &query, settings.limit)
        .await?;
    info!(found = tweets.len(), "search returned");

    let rows: Vec<_> = tweets
        .iter()
        .map(|t| map_tweet(t, &settings.scraped_by, now))
        .collect();
    let tweets_written = deps.sink.upsert_tweets(&rows).await?;

    let profiles: Vec<_> = unique_authors(&tweets)
        .into_iter()
        .map(|u| map_user(u, &settings.scraped_by, now))
        .collect();
    let profiles_written = deps.sink.upsert_profiles(&profiles).await?;

    Ok((tweets_written, profiles_written))
}
