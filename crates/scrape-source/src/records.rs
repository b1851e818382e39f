//! Scraped record schema
//!
//! Mirrors the JSON shape emitted by the scraping library (`tweet.dict()`),
//! with every field the library may omit modelled as `Option` or a defaulted
//! collection. Consumers match on presence instead of probing attributes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scraped tweet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    #[serde(rename = "id_str")]
    pub id_str: String,
    pub date: DateTime<Utc>,
    pub user: TweetUser,
    pub raw_content: String,
    #[serde(default)]
    pub retweet_count: Option<i64>,
    #[serde(default)]
    pub like_count: Option<i64>,
    #[serde(default)]
    pub reply_count: Option<i64>,
    #[serde(default)]
    pub quote_count: Option<i64>,
    #[serde(default)]
    pub view_count: Option<i64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub cashtags: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub mentioned_users: Vec<UserRef>,
    #[serde(default)]
    pub links: Vec<TextLink>,
    #[serde(default)]
    pub media: Option<Media>,
    #[serde(default)]
    pub retweeted_tweet: Option<Box<Tweet>>,
    #[serde(default)]
    pub quoted_tweet: Option<Box<Tweet>>,
    #[serde(default)]
    pub in_reply_to_tweet_id: Option<i64>,
}

impl Tweet {
    /// True when the tweet is a retweet of another tweet.
    pub fn is_retweet(&self) -> bool {
        self.retweeted_tweet.is_some()
    }

    /// True when the tweet quotes another tweet.
    pub fn is_quote(&self) -> bool {
        self.quoted_tweet.is_some()
    }

    /// True when the tweet replies to another tweet.
    pub fn is_reply(&self) -> bool {
        self.in_reply_to_tweet_id.is_some()
    }
}

/// The author of a tweet, as embedded in search results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TweetUser {
    #[serde(rename = "id_str")]
    pub id_str: String,
    pub username: String,
    pub displayname: String,
    #[serde(default)]
    pub raw_description: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub profile_banner_url: Option<String>,
    #[serde(default)]
    pub followers_count: Option<i64>,
    #[serde(default)]
    pub friends_count: Option<i64>,
    #[serde(default)]
    pub statuses_count: Option<i64>,
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description_links: Vec<TextLink>,
}

/// A mentioned user reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRef {
    #[serde(rename = "id_str")]
    pub id_str: String,
    pub username: String,
    #[serde(default)]
    pub displayname: Option<String>,
}

/// A link embedded in a tweet body or profile description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextLink {
    pub url: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub tcourl: Option<String>,
}

/// Media attached to a tweet.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Media {
    #[serde(default)]
    pub photos: Vec<MediaPhoto>,
}

/// A photo attachment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaPhoto {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_tweet_with_absent_optionals() {
        let json = r#"{
            "id_str": "1",
            "date": "2025-10-20T12:00:00+00:00",
            "rawContent": "gm",
            "user": {"id_str": "10", "username": "ostrich_hq", "displayname": "Ostrich"}
        }"#;
        let tweet: Tweet = serde_json::from_str(json).unwrap();
        assert_eq!(tweet.id_str, "1");
        assert_eq!(tweet.user.username, "ostrich_hq");
        assert!(tweet.retweet_count.is_none());
        assert!(tweet.cashtags.is_empty());
        assert!(tweet.media.is_none());
        assert!(!tweet.is_retweet() && !tweet.is_quote() && !tweet.is_reply());
    }

    #[test]
    fn deserializes_nested_retweet_and_media() {
        let json = r#"{
            "id_str": "2",
            "date": "2025-10-20T12:00:00Z",
            "rawContent": "RT @orig: hello",
            "likeCount": 4,
            "viewCount": null,
            "cashtags": ["BTC"],
            "media": {"photos": [{"url": "https://img/1.jpg"}], "videos": []},
            "user": {"id_str": "10", "username": "a", "displayname": "A"},
            "retweetedTweet": {
                "id_str": "1",
                "date": "2025-10-19T12:00:00Z",
                "rawContent": "hello",
                "user": {"id_str": "11", "username": "orig", "displayname": "Orig"}
            }
        }"#;
        let tweet: Tweet = serde_json::from_str(json).unwrap();
        assert!(tweet.is_retweet());
        assert_eq!(tweet.like_count, Some(4));
        assert_eq!(tweet.view_count, None);
        assert_eq!(tweet.media.unwrap().photos[0].url, "https://img/1.jpg");
        assert_eq!(tweet.retweeted_tweet.unwrap().user.username, "orig");
    }
}
