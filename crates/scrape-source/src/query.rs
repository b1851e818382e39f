//! Search query construction
//!
//! A scrape cycle searches one handle over a day window expressed relative to
//! today, e.g. "from two days ago until yesterday". Engagement thresholds are
//! appended as search operators when set.

use std::fmt;

use chrono::{Days, NaiveDate};

/// Search for tweets mentioning a handle within a date window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub handle: String,
    pub since: NaiveDate,
    pub until: NaiveDate,
    pub min_faves: Option<u32>,
    pub min_replies: Option<u32>,
    pub min_retweets: Option<u32>,
}

impl SearchQuery {
    /// Build a query for `handle` covering `[today - start_days_ago, today - end_days_ago)`.
    pub fn for_window(
        handle: impl Into<String>,
        today: NaiveDate,
        start_days_ago: u64,
        end_days_ago: u64,
    ) -> Self {
        let since = today
            .checked_sub_days(Days::new(start_days_ago))
            .unwrap_or(NaiveDate::MIN);
        let until = today
            .checked_sub_days(Days::new(end_days_ago))
            .unwrap_or(NaiveDate::MIN);
        Self {
            handle: handle.into(),
            since,
            until,
            min_faves: None,
            min_replies: None,
            min_retweets: None,
        }
    }

    pub fn with_min_faves(mut self, n: Option<u32>) -> Self {
        self.min_faves = n;
        self
    }

    pub fn with_min_replies(mut self, n: Option<u32>) -> Self {
        self.min_replies = n;
        self
    }

    pub fn with_min_retweets(mut self, n: Option<u32>) -> Self {
        self.min_retweets = n;
        self
    }

    /// True when `date` falls in `[since, until)`, like the search operators.
    pub fn in_window(&self, date: NaiveDate) -> bool {
        self.since <= date && date < self.until
    }

    /// Handle without a leading `@`, lowercased for comparisons.
    pub fn bare_handle(&self) -> String {
        self.handle.trim_start_matches('@').to_lowercase()
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} since:{} until:{}",
            self.handle,
            self.since.format("%Y-%m-%d"),
            self.until.format("%Y-%m-%d")
        )?;
        // Zero thresholds are dropped, matching the search operator semantics
        if let Some(n) = self.min_faves.filter(|n| *n > 0) {
            write!(f, " min_faves:{n}")?;
        }
        if let Some(n) = self.min_replies.filter(|n| *n > 0) {
            write!(f, " min_replies:{n}")?;
        }
        if let Some(n) = self.min_retweets.filter(|n| *n > 0) {
            write!(f, " min_retweets:{n}")?;
        }
        Ok(())
    }
}
