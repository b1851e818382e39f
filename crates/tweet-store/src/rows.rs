//! Row shapes for the tweet and profile tables

use chrono::{DateTime, Utc};

/// How a tweet relates to other tweets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweetCategory {
    Original,
    Retweet,
    Quote,
    Reply,
}

impl TweetCategory {
    /// Stored column value.
    pub fn label(&self) -> &'static str {
        match self {
            TweetCategory::Original => "original",
            TweetCategory::Retweet => "retweet",
            TweetCategory::Quote => "quote",
            TweetCategory::Reply => "reply",
        }
    }
}

/// One row of `enhanced_tweets`, keyed by `tweet_id`.
///
/// Columns left `None` by the mapper (`matching_values`, `sentiment`,
/// `sentiment_new`) are filled by downstream enrichment jobs.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedTweetRow {
    pub tweet_id: String,
    pub author_id: String,
    pub body: String,
    pub author_handle: String,
    pub tweet_create_time: DateTime<Utc>,
    pub create_time: DateTime<Utc>,
    pub retweet_count: i64,
    pub like_count: i64,
    pub reply_count: i64,
    pub quote_count: i64,
    pub view_count: i64,
    pub update_time: DateTime<Utc>,
    pub profile_image_url: Option<String>,
    pub is_hidden: bool,
    pub impressions: i64,
    pub matching_values: Option<String>,
    pub is_mapped: bool,
    pub sentiment: Option<String>,
    pub source: Option<String>,
    pub scraped_by: String,
    pub number_of_cashtags: i64,
    pub tweet_category: TweetCategory,
    pub first_cashtag: Option<String>,
    pub main_cashtag: Option<String>,
    pub number_of_hashtags: i64,
    pub number_of_mentions: i64,
    pub number_of_contracts: i64,
    pub number_of_links: i64,
    pub is_full_body: bool,
    pub sentiment_new: Option<f64>,
    pub is_reply: bool,
    pub reply_to: Option<String>,
    pub is_quote: bool,
    pub quoted_to: Option<String>,
    pub images: Option<String>,
}

/// One row of `twitter_profiles`, keyed by `author_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRow {
    pub author_id: String,
    pub name: String,
    pub handle: String,
    pub bio: Option<String>,
    pub url_in_bio: Option<String>,
    pub profile_image_url: Option<String>,
    pub profile_banner_url: Option<String>,
    pub followers_count: i64,
    pub followings_count: i64,
    pub is_verified: bool,
    pub account_created_at: Option<DateTime<Utc>>,
    pub tag: Option<String>,
    pub is_active: bool,
    pub inserted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ai_tag: bool,
    pub is_processed_by_ai: bool,
    pub scraped_by: String,
    pub professional_category: Option<String>,
    pub lifetime_tweets: i64,
    pub lifetime_views: Option<i64>,
    pub processed_by: Option<String>,
    pub is_crypto_user: bool,
    pub smart_followers_count: Option<i64>,
    pub confidence_score: Option<f64>,
}
