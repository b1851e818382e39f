//! Scrape runner
//!
//! Single-binary scraper job that:
//! 1. Leases a cookie-authenticated account from the shared pool (or falls back)
//! 2. Searches a handle over a recent day window
//! 3. Upserts the tweets and their authors' profiles
//! 4. Returns the account to the pool, or marks it as error
//!
//! The `accounts` subcommands manage the pool table out-of-band.

mod admin;
mod config;
mod cycle;
mod error;
mod metrics;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use account_pool::{AccountStatus, AccountStore, Leases, Provisioner, SqliteAccountStore};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use scrape_source::ReplaySource;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tweet_store::SqliteTweetStore;

use crate::config::Config;
use crate::cycle::{CycleDeps, CycleRequest, CycleSettings, run_cycle};
use crate::error::{EXIT_JOB_FAILED, EXIT_STARTUP};

/// Env var holding the cookie for `accounts add` when no file is given.
const ACCOUNT_COOKIE_ENV: &str = "SCRAPER_ACCOUNT_COOKIE";

#[derive(Parser, Debug)]
#[command(name = "scrape-runner")]
#[command(version)]
#[command(about = "Scrape a handle with a leased scraper account", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (overrides CONFIG_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one scrape cycle
    Run(RunArgs),

    /// Manage the scraper account pool
    #[command(subcommand)]
    Accounts(AccountsCommand),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Handle to search for, e.g. ostrich_hq
    #[arg(long)]
    handle: String,

    /// Explicit account username (requires --cookie; skips the pool)
    #[arg(long)]
    username: Option<String>,

    /// Explicit cookie bundle (requires --username; skips the pool)
    #[arg(long, env = "SCRAPER_COOKIE", hide_env_values = true)]
    cookie: Option<String>,

    #[arg(long)]
    min_faves: Option<u32>,

    #[arg(long)]
    min_replies: Option<u32>,

    #[arg(long)]
    min_retweets: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum AccountsCommand {
    /// Print pool health as JSON
    List,

    /// Add an account, or replace the cookie of an existing one
    Add {
        username: String,

        /// File containing the cookie bundle (otherwise SCRAPER_ACCOUNT_COOKIE)
        #[arg(long, value_name = "PATH")]
        cookie_file: Option<PathBuf>,
    },

    /// Force an account's status
    SetStatus {
        username: String,

        /// available, occupied or error
        status: AccountStatus,

        /// Error message recorded with status=error
        #[arg(long)]
        message: Option<String>,
    },

    /// Release occupied accounts leased longer than the given age
    Reclaim {
        #[arg(long)]
        older_than_secs: u64,
    },
}

/// Resources opened at startup and shared by every command.
struct App {
    config: Config,
    accounts: Arc<SqliteAccountStore>,
    prometheus: Option<PrometheusHandle>,
}

impl App {
    fn start(config_path: &Path) -> Result<Self> {
        info!(path = %config_path.display(), "loading configuration");
        let config = Config::load(config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?;

        info!(
            database = %config.database.path.display(),
            max_retries = config.pool.max_retries,
            backoff_base_secs = config.pool.backoff_base_secs,
            lease_ttl_secs = ?config.pool.lease_ttl_secs,
            fallback = config.fallback.is_some(),
            "configuration loaded"
        );

        // Install Prometheus metrics recorder before any metrics are emitted
        let prometheus = match &config.metrics.textfile_path {
            Some(_) => {
                let handle =
                    metrics::install_recorder().context("failed to install metrics recorder")?;
                Some(handle)
            }
            None => None,
        };

        let accounts = SqliteAccountStore::open(&config.database.path).with_context(|| {
            format!(
                "failed to open account store at {}",
                config.database.path.display()
            )
        })?;

        Ok(Self {
            config,
            accounts: Arc::new(accounts),
            prometheus,
        })
    }

    fn store(&self) -> Arc<dyn AccountStore> {
        self.accounts.clone()
    }

    /// Write the metrics textfile, if configured. Failures are logged only.
    fn export_metrics(&self) {
        if let (Some(handle), Some(path)) = (&self.prometheus, &self.config.metrics.textfile_path)
        {
            if let Err(e) = metrics::write_textfile(handle, path) {
                warn!(path = %path.display(), error = %e, "failed to write metrics textfile");
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before anything reads the environment
    let _ = dotenvy::dotenv();

    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let cli = Cli::parse();
    let config_path = Config::resolve_path(cli.config.as_deref());

    let app = match App::start(&config_path) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %format!("{e:#}"), "startup failed");
            return ExitCode::from(EXIT_STARTUP);
        }
    };

    let code = match cli.command {
        Command::Run(args) => run(&app, args).await,
        Command::Accounts(command) => accounts(&app, command).await,
    };

    app.export_metrics();
    ExitCode::from(code)
}

async fn run(app: &App, args: RunArgs) -> u8 {
    let deps = match build_cycle_deps(app).await {
        Ok(deps) => deps,
        Err(e) => {
            error!(error = %format!("{e:#}"), "failed to initialise scrape cycle");
            return EXIT_STARTUP;
        }
    };

    if let Some(ttl) = app.config.lease_ttl() {
        match Leases::new(app.store()).reclaim_stale(ttl).await {
            Ok(released) if !released.is_empty() => {
                info!(released = released.len(), "reclaimed leases older than lease_ttl_secs");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "failed to reclaim stale leases"),
        }
    }

    let request = CycleRequest {
        handle: args.handle,
        username: args.username,
        cookie: args.cookie,
        min_faves: args.min_faves,
        min_replies: args.min_replies,
        min_retweets: args.min_retweets,
    };

    match run_cycle(&deps, &request).await {
        Ok(report) => {
            println!(
                "{}",
                serde_json::json!({
                    "username": report.username,
                    "source": report.source.label(),
                    "tweets": report.tweets,
                    "profiles": report.profiles,
                })
            );
            0
        }
        Err(e) => {
            error!(error = %e, "run failed");
            e.exit_code()
        }
    }
}

async fn build_cycle_deps(app: &App) -> Result<CycleDeps> {
    let config = &app.config;
    let sink = SqliteTweetStore::open(&config.database.path).with_context(|| {
        format!(
            "failed to open tweet store at {}",
            config.database.path.display()
        )
    })?;
    let source = ReplaySource::load(&config.scrape.replay_dir)
        .await
        .context("failed to load replay capture")?;

    Ok(CycleDeps {
        provisioner: Provisioner::new(
            app.store(),
            config.retry_policy(),
            config.fallback_identity(),
        ),
        source: Arc::new(source),
        sink: Arc::new(sink),
        settings: CycleSettings {
            scraped_by: config.scrape.scraped_by.clone(),
            window_start_days: config.scrape.window_start_days,
            window_end_days: config.scrape.window_end_days,
            limit: config.scrape.limit,
        },
    })
}

async fn accounts(app: &App, command: AccountsCommand) -> u8 {
    let result = match command {
        AccountsCommand::List => admin::list_accounts(app.accounts.as_ref())
            .await
            .map(|health| print_json(&health)),
        AccountsCommand::Add {
            username,
            cookie_file,
        } => {
            let cookie = admin::read_cookie(
                cookie_file.as_deref(),
                std::env::var(ACCOUNT_COOKIE_ENV).ok(),
            );
            match cookie {
                Ok(cookie) => admin::add_account(app.accounts.as_ref(), &username, &cookie).await,
                Err(e) => Err(e),
            }
        }
        AccountsCommand::SetStatus {
            username,
            status,
            message,
        } => admin::set_status(app.store(), &username, status, message.as_deref()).await,
        AccountsCommand::Reclaim { older_than_secs } => {
            admin::reclaim(app.store(), Duration::from_secs(older_than_secs))
                .await
                .map(|released| print_json(&serde_json::json!({ "released": released })))
        }
    };

    match result {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "accounts command failed");
            EXIT_JOB_FAILED
        }
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(_) => println!("{value}"),
    }
}
