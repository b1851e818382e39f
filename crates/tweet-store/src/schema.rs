//! Table definitions for scraped records

/// SQL schema for the tweet and profile tables.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS enhanced_tweets (
    tweet_id TEXT PRIMARY KEY,
    author_id TEXT NOT NULL,
    body TEXT NOT NULL,
    author_handle TEXT NOT NULL,
    tweet_create_time TEXT NOT NULL,
    create_time TEXT NOT NULL,
    retweet_count INTEGER NOT NULL DEFAULT 0,
    like_count INTEGER NOT NULL DEFAULT 0,
    reply_count INTEGER NOT NULL DEFAULT 0,
    quote_count INTEGER NOT NULL DEFAULT 0,
    view_count INTEGER NOT NULL DEFAULT 0,
    update_time TEXT NOT NULL,
    profile_image_url TEXT,
    is_hidden INTEGER NOT NULL DEFAULT 0,
    impressions INTEGER NOT NULL DEFAULT 0,
    matching_values TEXT,
    is_mapped INTEGER NOT NULL DEFAULT 0,
    sentiment TEXT,
    source TEXT,
    scraped_by TEXT NOT NULL,
    number_of_cashtags INTEGER NOT NULL DEFAULT 0,
    tweet_category TEXT NOT NULL,
    first_cashtag TEXT,
    main_cashtag TEXT,
    number_of_hashtags INTEGER NOT NULL DEFAULT 0,
    number_of_mentions INTEGER NOT NULL DEFAULT 0,
    number_of_contracts INTEGER NOT NULL DEFAULT 0,
    number_of_links INTEGER NOT NULL DEFAULT 0,
    is_full_body INTEGER NOT NULL DEFAULT 1,
    sentiment_new REAL,
    is_reply INTEGER NOT NULL DEFAULT 0,
    reply_to TEXT,
    is_quote INTEGER NOT NULL DEFAULT 0,
    quoted_to TEXT,
    images TEXT
);

CREATE INDEX IF NOT EXISTS idx_enhanced_tweets_author ON enhanced_tweets(author_id);

CREATE TABLE IF NOT EXISTS twitter_profiles (
    author_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    handle TEXT NOT NULL,
    bio TEXT,
    url_in_bio TEXT,
    profile_image_url TEXT,
    profile_banner_url TEXT,
    followers_count INTEGER NOT NULL DEFAULT 0,
    followings_count INTEGER NOT NULL DEFAULT 0,
    is_verified INTEGER NOT NULL DEFAULT 0,
    account_created_at TEXT,
    tag TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    inserted_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    ai_tag INTEGER NOT NULL DEFAULT 0,
    is_processed_by_ai INTEGER NOT NULL DEFAULT 0,
    scraped_by TEXT NOT NULL,
    professional_category TEXT,
    lifetime_tweets INTEGER NOT NULL DEFAULT 0,
    lifetime_views INTEGER,
    processed_by TEXT,
    is_crypto_user INTEGER NOT NULL DEFAULT 0,
    smart_followers_count INTEGER,
    confidence_score REAL
);

CREATE INDEX IF NOT EXISTS idx_twitter_profiles_handle ON twitter_profiles(handle);
"#;

/// Upsert for `enhanced_tweets`. Identity and enrichment columns are never
/// overwritten on conflict; only engagement counters, body and update time.
pub const UPSERT_TWEET_SQL: &str = r#"
INSERT INTO enhanced_tweets (
    tweet_id, author_id, body, author_handle, tweet_create_time, create_time, retweet_count,
    like_count, reply_count, quote_count, view_count, update_time, profile_image_url,
    is_hidden, impressions, matching_values, is_mapped, sentiment, source, scraped_by,
    number_of_cashtags, tweet_category, first_cashtag, main_cashtag, number_of_hashtags,
    number_of_mentions, number_of_contracts, number_of_links, is_full_body, sentiment_new,
    is_reply, reply_to, is_quote, quoted_to, images
) VALUES (
    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20,
    ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31, ?32, ?33, ?34, ?35
)
ON CONFLICT(tweet_id) DO UPDATE SET
    body = excluded.body,
    retweet_count = excluded.retweet_count,
    like_count = excluded.like_count,
    reply_count = excluded.reply_count,
    quote_count = excluded.quote_count,
    view_count = excluded.view_count,
    update_time = excluded.update_time,
    impressions = excluded.impressions
"#;

/// Upsert for `twitter_profiles`. `inserted_at` and the enrichment columns
/// survive re-scrapes.
pub const UPSERT_PROFILE_SQL: &str = r#"
INSERT INTO twitter_profiles (
    author_id, name, handle, bio, url_in_bio, profile_image_url, profile_banner_url,
    followers_count, followings_count, is_verified, account_created_at, tag, is_active,
    inserted_at, updated_at, ai_tag, is_processed_by_ai, scraped_by, professional_category,
    lifetime_tweets, lifetime_views, processed_by, is_crypto_user, smart_followers_count,
    confidence_score
) VALUES (
    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20,
    ?21, ?22, ?23, ?24, ?25
)
ON CONFLICT(author_id) DO UPDATE SET
    name = excluded.name,
    bio = excluded.bio,
    url_in_bio = excluded.url_in_bio,
    profile_image_url = excluded.profile_image_url,
    profile_banner_url = excluded.profile_banner_url,
    followers_count = excluded.followers_count,
    followings_count = excluded.followings_count,
    is_verified = excluded.is_verified,
    account_created_at = excluded.account_created_at,
    updated_at = excluded.updated_at,
    lifetime_tweets = excluded.lifetime_tweets,
    lifetime_views = excluded.lifetime_views,
    scraped_by = excluded.scraped_by
"#;

/// Create the tables if they do not exist.
pub fn initialize_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
