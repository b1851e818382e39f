//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The fallback cookie is loaded from SCRAPER_FALLBACK_COOKIE or
//! fallback.cookie_file, never stored in the TOML directly to avoid leaking
//! secrets.

use account_pool::{FallbackIdentity, RetryPolicy};
use common::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Env var holding the fallback identity's cookie bundle.
pub const FALLBACK_COOKIE_ENV: &str = "SCRAPER_FALLBACK_COOKIE";

/// Default config file name when neither `--config` nor CONFIG_PATH is set.
pub const DEFAULT_CONFIG_FILE: &str = "scrape-runner.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub fallback: Option<FallbackConfig>,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// SQLite file shared by the account pool and the tweet store
#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

/// Pool retry and lease settings
#[derive(Debug, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    /// Leases older than this are reclaimed before each run. Unset means never.
    #[serde(default)]
    pub lease_ttl_secs: Option<u64>,
}

/// Static identity used when the pool yields nothing
#[derive(Debug, Deserialize)]
pub struct FallbackConfig {
    pub username: String,
    /// Path to a file containing the cookie bundle (alternative to SCRAPER_FALLBACK_COOKIE)
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,
    #[serde(skip)]
    pub cookie: Option<Secret<String>>,
}

/// Search window and record attribution
#[derive(Debug, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_scraped_by")]
    pub scraped_by: String,
    #[serde(default = "default_window_start_days")]
    pub window_start_days: u64,
    #[serde(default = "default_window_end_days")]
    pub window_end_days: u64,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Capture directory served by the replay source
    #[serde(default = "default_replay_dir")]
    pub replay_dir: PathBuf,
}

/// Metrics export
#[derive(Debug, Default, Deserialize)]
pub struct MetricsConfig {
    /// node_exporter textfile collector target. Unset disables the export.
    #[serde(default)]
    pub textfile_path: Option<PathBuf>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("scraper.db")
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_base_secs() -> u64 {
    1
}

fn default_scraped_by() -> String {
    "scrape_runner".into()
}

fn default_window_start_days() -> u64 {
    2
}

fn default_window_end_days() -> u64 {
    1
}

fn default_limit() -> usize {
    100
}

fn default_replay_dir() -> PathBuf {
    PathBuf::from("captures")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_secs: default_backoff_base_secs(),
            lease_ttl_secs: None,
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            scraped_by: default_scraped_by(),
            window_start_days: default_window_start_days(),
            window_end_days: default_window_end_days(),
            limit: default_limit(),
            replay_dir: default_replay_dir(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Fallback cookie resolution order:
    /// 1. SCRAPER_FALLBACK_COOKIE env var
    /// 2. cookie_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;
        config.resolve_fallback_cookie()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.pool.max_retries == 0 {
            return Err(common::Error::Config(
                "max_retries must be greater than 0".into(),
            ));
        }

        if self.scrape.limit == 0 {
            return Err(common::Error::Config(
                "limit must be greater than 0".into(),
            ));
        }

        // The window is [today - start, today - end), so start must be further back
        if self.scrape.window_start_days <= self.scrape.window_end_days {
            return Err(common::Error::Config(format!(
                "window_start_days ({}) must be greater than window_end_days ({})",
                self.scrape.window_start_days, self.scrape.window_end_days
            )));
        }

        if self.scrape.scraped_by.trim().is_empty() {
            return Err(common::Error::Config("scraped_by must not be empty".into()));
        }

        if self
            .fallback
            .as_ref()
            .is_some_and(|f| f.username.trim().is_empty())
        {
            return Err(common::Error::Config(
                "fallback.username must not be empty".into(),
            ));
        }

        Ok(())
    }

    fn resolve_fallback_cookie(&mut self) -> common::Result<()> {
        let env_cookie = std::env::var(FALLBACK_COOKIE_ENV).ok();
        let Some(fallback) = self.fallback.as_mut() else {
            if env_cookie.is_some() {
                return Err(common::Error::Config(format!(
                    "{FALLBACK_COOKIE_ENV} is set but no [fallback] username is configured"
                )));
            }
            return Ok(());
        };

        // Env var takes precedence over file
        if let Some(cookie) = env_cookie {
            fallback.cookie = Some(Secret::new(cookie));
        } else if let Some(ref cookie_file) = fallback.cookie_file {
            let cookie = std::fs::read_to_string(cookie_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read cookie_file {}: {e}",
                    cookie_file.display()
                ))
            })?;
            let cookie = cookie.trim().to_owned();
            if !cookie.is_empty() {
                fallback.cookie = Some(Secret::new(cookie));
            }
        }
        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        if let Some(p) = cli_path {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.pool.max_retries,
            backoff_base: Duration::from_secs(self.pool.backoff_base_secs),
        }
    }

    pub fn lease_ttl(&self) -> Option<Duration> {
        self.pool.lease_ttl_secs.map(Duration::from_secs)
    }

    /// Fallback identity, if one is configured.
    ///
    /// A configured fallback without a cookie is still returned; the
    /// provisioner refuses to hand it out.
    pub fn fallback_identity(&self) -> Option<FallbackIdentity> {
        self.fallback.as_ref().map(|f| FallbackIdentity {
            username: f.username.clone(),
            cookie: f.cookie.clone().unwrap_or_else(|| Secret::from("")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("scrape-runner.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn valid_toml() -> &'static str {
        r#"
[database]
path = "/var/lib/scraper/scraper.db"

[pool]
max_retries = 3
lease_ttl_secs = 7200

[fallback]
username = "fallback_user"

[scrape]
scraped_by = "nightly_scraper"
limit = 50

[metrics]
textfile_path = "/var/lib/node_exporter/scrape_runner.prom"
"#
    }

    #[test]
    fn test_load_valid_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        unsafe { remove_env(FALLBACK_COOKIE_ENV) };

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database.path, PathBuf::from("/var/lib/scraper/scraper.db"));
        assert_eq!(config.pool.max_retries, 3);
        assert_eq!(config.pool.backoff_base_secs, 1);
        assert_eq!(config.lease_ttl(), Some(Duration::from_secs(7200)));
        assert_eq!(config.scrape.scraped_by, "nightly_scraper");
        assert_eq!(config.scrape.limit, 50);
        assert_eq!(config.scrape.window_start_days, 2);
        assert_eq!(config.scrape.window_end_days, 1);
        assert!(config.metrics.textfile_path.is_some());

        let fallback = config.fallback.as_ref().unwrap();
        assert_eq!(fallback.username, "fallback_user");
        assert!(fallback.cookie.is_none());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");

        unsafe { remove_env(FALLBACK_COOKIE_ENV) };

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database.path, PathBuf::from("scraper.db"));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert!(config.lease_ttl().is_none());
        assert!(config.fallback_identity().is_none());
        assert_eq!(config.scrape.scraped_by, "scrape_runner");
        assert_eq!(config.scrape.limit, 100);
        assert_eq!(config.scrape.replay_dir, PathBuf::from("captures"));
        assert!(config.metrics.textfile_path.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_zero_max_retries_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[pool]\nmax_retries = 0\n");
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("max_retries"));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[scrape]\nlimit = 0\n");
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn test_inverted_window_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[scrape]\nwindow_start_days = 1\nwindow_end_days = 2\n",
        );
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("window_start_days"));
    }

    #[test]
    fn test_fallback_cookie_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        unsafe { set_env(FALLBACK_COOKIE_ENV, "auth_token=env; ct0=env") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env(FALLBACK_COOKIE_ENV) };

        let identity = config.fallback_identity().unwrap();
        assert_eq!(identity.username, "fallback_user");
        assert_eq!(identity.cookie.expose(), "auth_token=env; ct0=env");
    }

    #[test]
    fn test_fallback_cookie_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cookie_path = dir.path().join("fallback_cookie");
        std::fs::write(&cookie_path, "auth_token=file; ct0=file\n").unwrap();
        let path = write_config(
            &dir,
            &format!(
                "[fallback]\nusername = \"fallback_user\"\ncookie_file = \"{}\"\n",
                cookie_path.display()
            ),
        );

        unsafe { remove_env(FALLBACK_COOKIE_ENV) };
        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.fallback_identity().unwrap().cookie.expose(),
            "auth_token=file; ct0=file"
        );
    }

    #[test]
    fn test_env_cookie_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cookie_path = dir.path().join("fallback_cookie");
        std::fs::write(&cookie_path, "auth_token=file; ct0=file").unwrap();
        let path = write_config(
            &dir,
            &format!(
                "[fallback]\nusername = \"fallback_user\"\ncookie_file = \"{}\"\n",
                cookie_path.display()
            ),
        );

        unsafe { set_env(FALLBACK_COOKIE_ENV, "auth_token=env; ct0=env") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env(FALLBACK_COOKIE_ENV) };

        assert_eq!(
            config.fallback_identity().unwrap().cookie.expose(),
            "auth_token=env; ct0=env"
        );
    }

    #[test]
    fn test_missing_cookie_file_is_config_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[fallback]\nusername = \"fallback_user\"\ncookie_file = \"/nonexistent/cookie\"\n",
        );

        unsafe { remove_env(FALLBACK_COOKIE_ENV) };
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("cookie_file"));
    }

    #[test]
    fn test_env_cookie_without_fallback_section_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");

        unsafe { set_env(FALLBACK_COOKIE_ENV, "auth_token=x; ct0=y") };
        let result = Config::load(&path);
        unsafe { remove_env(FALLBACK_COOKIE_ENV) };

        assert!(result.is_err());
    }

    #[test]
    fn test_fallback_without_cookie_has_blank_identity() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[fallback]\nusername = \"fallback_user\"\n");

        unsafe { remove_env(FALLBACK_COOKIE_ENV) };
        let config = Config::load(&path).unwrap();
        assert!(config.fallback_identity().unwrap().cookie.is_blank());
    }

    #[test]
    fn test_resolve_path_precedence() {
        let _lock = ENV_MUTEX.lock().unwrap();

        unsafe { set_env("CONFIG_PATH", "/etc/scraper/env.toml") };
        assert_eq!(
            Config::resolve_path(Some(Path::new("/cli.toml"))),
            PathBuf::from("/cli.toml")
        );
        assert_eq!(
            Config::resolve_path(None),
            PathBuf::from("/etc/scraper/env.toml")
        );

        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(
            Config::resolve_path(None),
            PathBuf::from(DEFAULT_CONFIG_FILE)
        );
    }
}
