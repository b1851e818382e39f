//! Scraper account model

use chrono::{DateTime, Utc};
use common::Secret;

/// Longest `last_error` message stored, in characters.
pub const MAX_ERROR_LEN: usize = 250;

/// Lease status of a scraper account.
///
/// Transitions:
/// - Available → Occupied (claimed for a scrape cycle)
/// - Occupied → Available (cycle finished cleanly, or stale lease reclaimed)
/// - Occupied → Error (cycle failed)
/// - Error → Available (operator reset)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Available,
    Occupied,
    Error,
}

impl AccountStatus {
    /// Stored column value and label for health/logging.
    pub fn label(&self) -> &'static str {
        match self {
            AccountStatus::Available => "available",
            AccountStatus::Occupied => "occupied",
            AccountStatus::Error => "error",
        }
    }

    /// Parse a stored status. Matching is case-insensitive; anything else is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "available" => Some(AccountStatus::Available),
            "occupied" => Some(AccountStatus::Occupied),
            "error" => Some(AccountStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown account status: {s}"))
    }
}

/// One row of the account pool.
#[derive(Debug, Clone)]
pub struct ScraperAccount {
    pub username: String,
    pub cookie_string: Secret<String>,
    pub status: AccountStatus,
    pub is_occupied: bool,
    pub lock_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ScraperAccount {
    /// Whether the cookie bundle is present at all. Content is not validated here.
    pub fn has_cookie(&self) -> bool {
        !self.cookie_string.is_blank()
    }

    /// Available and carrying a cookie.
    pub fn is_eligible(&self) -> bool {
        self.status == AccountStatus::Available && self.has_cookie()
    }
}

/// Truncate `message` to at most `MAX_ERROR_LEN` characters.
///
/// An empty message becomes "Unknown error" so an error row always says something.
pub fn truncate_message(message: &str) -> String {
    if message.is_empty() {
        return "Unknown error".to_string();
    }
    message.chars().take(MAX_ERROR_LEN).collect()
}
