//! SQLite-backed record sink
//!
//! Each batch is written inside one transaction. rusqlite is synchronous, so
//! every operation runs on the blocking pool via `tokio::task::spawn_blocking`.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, params};
use tracing::{debug, info};

use crate::RecordSink;
use crate::error::{Error, Result};
use crate::rows::{EnhancedTweetRow, ProfileRow};
use crate::schema::{UPSERT_PROFILE_SQL, UPSERT_TWEET_SQL, initialize_schema};

/// Tweet/profile store backed by a SQLite file.
#[derive(Clone)]
pub struct SqliteTweetStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTweetStore {
    /// Open (or create) the database at `path` and ensure the tables exist.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;
        initialize_schema(&conn)?;
        info!(path = %path.display(), "tweet store ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| Error::Task("connection mutex poisoned".into()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| Error::Task(e.to_string()))?
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }
}

fn write_tweets(conn: &mut Connection, rows: &[EnhancedTweetRow]) -> Result<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(UPSERT_TWEET_SQL)?;
        for r in rows {
            stmt.execute(params![
                r.tweet_id,
                r.author_id,
                r.body,
                r.author_handle,
                r.tweet_create_time.to_rfc3339(),
                r.create_time.to_rfc3339(),
                r.retweet_count,
                r.like_count,
                r.reply_count,
                r.quote_count,
                r.view_count,
                r.update_time.to_rfc3339(),
                r.profile_image_url,
                r.is_hidden,
                r.impressions,
                r.matching_values,
                r.is_mapped,
                r.sentiment,
                r.source,
                r.scraped_by,
                r.number_of_cashtags,
                r.tweet_category.label(),
                r.first_cashtag,
                r.main_cashtag,
                r.number_of_hashtags,
                r.number_of_mentions,
                r.number_of_contracts,
                r.number_of_links,
                r.is_full_body,
                r.sentiment_new,
                r.is_reply,
                r.reply_to,
                r.is_quote,
                r.quoted_to,
                r.images,
            ])?;
        }
    }
    tx.commit()?;
    Ok(rows.len())
}

fn write_profiles(conn: &mut Connection, rows: &[ProfileRow]) -> Result<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(UPSERT_PROFILE_SQL)?;
        for r in rows {
            stmt.execute(params![
                r.author_id,
                r.name,
                r.handle,
                r.bio,
                r.url_in_bio,
                r.profile_image_url,
                r.profile_banner_url,
                r.followers_count,
                r.followings_count,
                r.is_verified,
                r.account_created_at.map(|t| t.to_rfc3339()),
                r.tag,
                r.is_active,
                r.inserted_at.to_rfc3339(),
                r.updated_at.to_rfc3339(),
                r.ai_tag,
                r.is_processed_by_ai,
                r.scraped_by,
                r.professional_category,
                r.lifetime_tweets,
                r.lifetime_views,
                r.processed_by,
                r.is_crypto_user,
                r.smart_followers_count,
                r.confidence_score,
            ])?;
        }
    }
    tx.commit()?;
    Ok(rows.len())
}

impl RecordSink for SqliteTweetStore {
    fn upsert_tweets<'a>(
        &'a self,
        rows: &'a [EnhancedTweetRow],
    ) -> Pin<Box<dyn Future<Output = Result<usize>> + Send + 'a>> {
        Box::pin(async move {
            if rows.is_empty() {
                return Ok(0);
            }
            let batch = rows.to_vec();
            let written = self.with_conn(move |conn| write_tweets(conn, &batch)).await?;
            debug!(rows = written, "upserted enhanced tweets");
            Ok(written)
        })
    }

    fn upsert_profiles<'a>(
        &'a self,
        rows: &'a [ProfileRow],
    ) -> Pin<Box<dyn Future<Output = Result<usize>> + Send + 'a>> {
        Box::pin(async move {
            if rows.is_empty() {
                return Ok(0);
            }
            let batch = rows.to_vec();
            let written = self
                .with_conn(move |conn| write_profiles(conn, &batch))
                .await?;
            debug!(rows = written, "upserted twitter profiles");
            Ok(written)
        })
    }
}
