//! Common types shared by the scraper crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
