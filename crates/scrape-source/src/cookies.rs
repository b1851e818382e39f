//! Cookie bundle parsing
//!
//! Scraper accounts authenticate with the raw `document.cookie` string copied
//! from a logged-in browser session. A bundle is only usable when it carries
//! both the session token and the CSRF token.

use std::collections::BTreeMap;

use crate::{Result, ScrapeError};

/// Cookies a session cannot be initialised without.
pub const REQUIRED_COOKIES: &[&str] = &["auth_token", "ct0"];

/// Parse a `name=value; name2=value2` cookie string.
///
/// Whitespace around pairs is ignored and empty segments are skipped. Values
/// may themselves contain `=` (e.g. base64 padding). Fails when a segment has
/// no `=` or when any of `REQUIRED_COOKIES` is missing or empty.
pub fn parse_cookie_string(raw: &str) -> Result<BTreeMap<String, String>> {
    let mut cookies = BTreeMap::new();
    for segment in raw.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (name, value) = segment
            .split_once('=')
            .ok_or_else(|| ScrapeError::Login(format!("malformed cookie segment: {segment}")))?;
        cookies.insert(name.trim().to_string(), value.trim().to_string());
    }

    for required in REQUIRED_COOKIES {
        match cookies.get(*required) {
            Some(v) if !v.is_empty() => {}
            _ => {
                return Err(ScrapeError::Login(format!(
                    "cookie bundle missing {required}"
                )));
            }
        }
    }

    Ok(cookies)
}
