//! Error types for record persistence

/// Errors from persisting mapped rows.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage task failed: {0}")]
    Task(String),
}

/// Result alias for persistence operations.
pub type Result<T> = std::result::Result<T, Error>;
