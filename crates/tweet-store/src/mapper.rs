//! Scraped record → row mapping
//!
//! Pure field-by-field transformation. The only derived values are the tweet
//! category, the entity counts, the joined photo URLs and the crypto-bio flag.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use scrape_source::{Media, Tweet, TweetUser};

use crate::rows::{EnhancedTweetRow, ProfileRow, TweetCategory};

/// Bodies at or above this many characters may have been truncated.
const FULL_BODY_LIMIT: usize = 280;

/// Bio keywords that flag a profile as crypto-related.
///
/// Matched as case-insensitive substrings, so short tokens like "eth" also
/// match inside longer words.
const CRYPTO_KEYWORDS: &[&str] = &[
    "crypto",
    "bitcoin",
    "btc",
    "ethereum",
    "eth",
    "blockchain",
    "defi",
    "nft",
    "web3",
    "trading",
    "token",
];

/// Comma-join photo URLs, or `None` when there are no photos.
pub fn extract_photo_urls(media: Option<&Media>) -> Option<String> {
    let urls: Vec<&str> = media?.photos.iter().map(|p| p.url.as_str()).collect();
    if urls.is_empty() {
        None
    } else {
        Some(urls.join(","))
    }
}

/// Whether a profile bio mentions any crypto keyword.
pub fn is_crypto_bio(bio: &str) -> bool {
    let lower = bio.to_lowercase();
    CRYPTO_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn category(tweet: &Tweet) -> TweetCategory {
    if tweet.is_retweet() {
        TweetCategory::Retweet
    } else if tweet.is_quote() {
        TweetCategory::Quote
    } else if tweet.is_reply() {
        TweetCategory::Reply
    } else {
        TweetCategory::Original
    }
}

fn count<T>(items: &[T]) -> i64 {
    i64::try_from(items.len()).unwrap_or(i64::MAX)
}

/// Map a scraped tweet to an `enhanced_tweets` row.
///
/// Retweets store the retweeted body and author handle; the author id and
/// profile image stay those of the account that retweeted.
pub fn map_tweet(tweet: &Tweet, scraped_by: &str, now: DateTime<Utc>) -> EnhancedTweetRow {
    let (body, author_handle) = match &tweet.retweeted_tweet {
        Some(original) => (original.raw_content.clone(), original.user.username.clone()),
        None => (tweet.raw_content.clone(), tweet.user.username.clone()),
    };
    let first_cashtag = tweet.cashtags.first().cloned();
    let view_count = tweet.view_count.unwrap_or(0);
    let is_full_body = body.chars().count() < FULL_BODY_LIMIT;

    EnhancedTweetRow {
        tweet_id: tweet.id_str.clone(),
        author_id: tweet.user.id_str.clone(),
        body,
        author_handle,
        tweet_create_time: tweet.date,
        create_time: now,
        retweet_count: tweet.retweet_count.unwrap_or(0),
        like_count: tweet.like_count.unwrap_or(0),
        reply_count: tweet.reply_count.unwrap_or(0),
        quote_count: tweet.quote_count.unwrap_or(0),
        view_count,
        update_time: now,
        profile_image_url: tweet.user.profile_image_url.clone(),
        is_hidden: false,
        impressions: view_count,
        matching_values: None,
        is_mapped: false,
        sentiment: None,
        source: tweet.source.clone(),
        scraped_by: scraped_by.to_string(),
        number_of_cashtags: count(&tweet.cashtags),
        tweet_category: category(tweet),
        main_cashtag: first_cashtag.clone(),
        first_cashtag,
        number_of_hashtags: count(&tweet.hashtags),
        number_of_mentions: count(&tweet.mentioned_users),
        // contract addresses are not detected, always 0
        number_of_contracts: 0,
        number_of_links: count(&tweet.links),
        is_full_body,
        sentiment_new: None,
        is_reply: tweet.is_reply(),
        reply_to: tweet.in_reply_to_tweet_id.map(|id| id.to_string()),
        is_quote: tweet.is_quote(),
        quoted_to: tweet.quoted_tweet.as_ref().map(|q| q.id_str.clone()),
        images: extract_photo_urls(tweet.media.as_ref()),
    }
}

/// Map a tweet author to a `twitter_profiles` row.
pub fn map_user(user: &TweetUser, scraped_by: &str, now: DateTime<Utc>) -> ProfileRow {
    let url_in_bio = user.description_links.first().map(|l| l.url.clone());
    let is_crypto_user = user.raw_description.as_deref().is_some_and(is_crypto_bio);

    ProfileRow {
        author_id: user.id_str.clone(),
        name: user.displayname.clone(),
        handle: user.username.clone(),
        bio: user.raw_description.clone(),
        url_in_bio,
        profile_image_url: user.profile_image_url.clone(),
        profile_banner_url: user.profile_banner_url.clone(),
        followers_count: user.followers_count.unwrap_or(0),
        followings_count: user.friends_count.unwrap_or(0),
        is_verified: user.verified.unwrap_or(false),
        account_created_at: user.created,
        tag: None,
        is_active: true,
        inserted_at: now,
        updated_at: now,
        ai_tag: false,
        is_processed_by_ai: false,
        scraped_by: scraped_by.to_string(),
        professional_category: None,
        lifetime_tweets: user.statuses_count.unwrap_or(0),
        lifetime_views: None,
        processed_by: None,
        is_crypto_user,
        smart_followers_count: None,
        confidence_score: None,
    }
}

/// Authors of `tweets`, deduplicated by id, in first-seen order.
pub fn unique_authors(tweets: &[Tweet]) -> Vec<&TweetUser> {
    let mut seen = HashSet::new();
    tweets
        .iter()
        .map(|t| &t.user)
        .filter(|u| seen.insert(u.id_str.as_str()))
        .collect()
}
