//! Error types for pool operations

/// Errors from the account store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage task failed: {0}")]
    Task(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors from provisioning.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Pool exhausted and no usable fallback identity configured.
    #[error("no usable account: {0}")]
    NoUsableAccount(String),
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
