//! SQLite account store
//!
//! The `scraper_accounts` table is the only state shared between runner
//! processes. rusqlite is synchronous, so each call runs on the blocking pool
//! via `tokio::task::spawn_blocking`. `busy_timeout` lets concurrent runners
//! wait out each other's write locks instead of failing immediately.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use common::Secret;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{info, warn};

use crate::account::{AccountStatus, ScraperAccount};
use crate::error::{StoreError, StoreResult};
use crate::lease::StatusUpdate;
use crate::store::{AccountStore, StoreFuture};

/// SQL schema for the account pool.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS scraper_accounts (
    username TEXT PRIMARY KEY,
    cookie_string TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'available',
    is_occupied INTEGER NOT NULL DEFAULT 0,
    lock_time TEXT,
    last_error TEXT
);

CREATE INDEX IF NOT EXISTS idx_scraper_accounts_status ON scraper_accounts(status);
"#;

const SELECT_COLUMNS: &str =
    "SELECT username, cookie_string, status, is_occupied, lock_time, last_error FROM scraper_accounts";

/// Account store backed by a SQLite file.
#[derive(Clone)]
pub struct SqliteAccountStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAccountStore {
    /// Open (or create) the pool database at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;
        info!(path = %path.display(), "account store ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory pool, used by tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| StoreError::Task("connection mutex poisoned".into()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Run raw SQL against the pool; lets tests seed rows other tools would write.
    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(sql).unwrap();
    }
}

/// Format a timestamp the way this store writes it.
pub(crate) fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp. Accepts RFC 3339 and the `YYYY-MM-DD HH:MM:SS`
/// form written by MySQL-style tooling (interpreted as UTC).
pub(crate) fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|t| t.and_utc())
}

fn decode_row(row: &Row<'_>) -> rusqlite::Result<ScraperAccount> {
    let username: String = row.get(0)?;
    let cookie: Option<String> = row.get(1)?;
    let status_raw: Option<String> = row.get(2)?;
    let is_occupied: Option<bool> = row.get(3)?;
    let lock_time_raw: Option<String> = row.get(4)?;
    let last_error: Option<String> = row.get(5)?;

    let status = match status_raw.as_deref().map(AccountStatus::parse) {
        Some(Some(status)) => status,
        _ => {
            warn!(
                username = %username,
                status = status_raw.as_deref().unwrap_or(""),
                "unknown stored status, treating account as error"
            );
            AccountStatus::Error
        }
    };
    let lock_time = lock_time_raw.as_deref().and_then(|raw| {
        let parsed = parse_time(raw);
        if parsed.is_none() {
            warn!(username = %username, lock_time = raw, "unparseable lock_time, ignoring");
        }
        parsed
    });

    Ok(ScraperAccount {
        username,
        cookie_string: Secret::new(cookie.unwrap_or_default()),
        status,
        is_occupied: is_occupied.unwrap_or(false),
        lock_time,
        last_error,
    })
}

impl AccountStore for SqliteAccountStore {
    fn random_available(&self) -> StoreFuture<'_, Option<ScraperAccount>> {
        Box::pin(self.with_conn(|conn| {
            let sql = format!("{SELECT_COLUMNS} WHERE status = 'available' ORDER BY RANDOM() LIMIT 1");
            Ok(conn.query_row(&sql, [], decode_row).optional()?)
        }))
    }

    fn get<'a>(&'a self, username: &'a str) -> StoreFuture<'a, Option<ScraperAccount>> {
        let username = username.to_string();
        Box::pin(self.with_conn(move |conn| {
            let sql = format!("{SELECT_COLUMNS} WHERE username = ?1");
            Ok(conn
                .query_row(&sql, params![username], decode_row)
                .optional()?)
        }))
    }

    fn list(&self) -> StoreFuture<'_, Vec<ScraperAccount>> {
        Box::pin(self.with_conn(|conn| {
            let sql = format!("{SELECT_COLUMNS} ORDER BY username");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], decode_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        }))
    }

    fn upsert<'a>(&'a self, username: &'a str, cookie: &'a Secret<String>) -> StoreFuture<'a, ()> {
        let username = username.to_string();
        let cookie = cookie.clone();
        Box::pin(self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO scraper_accounts (username, cookie_string, status, is_occupied)
                 VALUES (?1, ?2, 'available', 0)
                 ON CONFLICT(username) DO UPDATE SET cookie_string = excluded.cookie_string",
                params![username, cookie.expose()],
            )?;
            Ok(())
        }))
    }

    fn apply<'a>(&'a self, username: &'a str, update: &'a StatusUpdate) -> StoreFuture<'a, u64> {
        let username = username.to_string();
        let update = update.clone();
        Box::pin(self.with_conn(move |conn| {
            // lock_time and last_error are only ever set, never cleared
            let changed = conn.execute(
                "UPDATE scraper_accounts
                 SET status = ?1,
                     is_occupied = ?2,
                     lock_time = COALESCE(?3, lock_time),
                     last_error = COALESCE(?4, last_error)
                 WHERE username = ?5",
                params![
                    update.status.label(),
                    update.is_occupied(),
                    update.lock_time.map(format_time),
                    update.last_error,
                    username,
                ],
            )?;
            Ok(changed as u64)
        }))
    }

    fn claim<'a>(&'a self, username: &'a str, at: DateTime<Utc>) -> StoreFuture<'a, bool> {
        let username = username.to_string();
        Box::pin(self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE scraper_accounts
                 SET status = 'occupied', is_occupied = 1, lock_time = ?1
                 WHERE username = ?2 AND status = 'available'",
                params![format_time(at), username],
            )?;
            Ok(changed == 1)
        }))
    }

    fn reclaim_stale(&self, cutoff: DateTime<Utc>) -> StoreFuture<'_, Vec<String>> {
        Box::pin(self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let occupied: Vec<(String, Option<String>)> = {
                let mut stmt = tx.prepare(
                    "SELECT username, lock_time FROM scraper_accounts WHERE status = 'occupied'",
                )?;
                let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };

            let mut released = Vec::new();
            for (username, lock_time) in occupied {
                let stale = match lock_time.as_deref().and_then(parse_time) {
                    Some(t) => t < cutoff,
                    None => true,
                };
                if !stale {
                    continue;
                }
                // Re-check lock_time so a lease renewed meanwhile is left alone
                let changed = tx.execute(
                    "UPDATE scraper_accounts SET status = 'available', is_occupied = 0
                     WHERE username = ?1 AND status = 'occupied' AND lock_time IS ?2",
                    params![username, lock_time],
                )?;
                if changed == 1 {
                    released.push(username);
                }
            }
            tx.commit()?;
            Ok(released)
        }))
    }
}
