//! Common error types for labeldesk

use thiserror::Error;

/// Common result type for labeldesk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across labeldesk crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Named table does not exist in the tabular store
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Network, authorization or API failure reaching the tabular store
    #[error("Store error: {0}")]
    Store(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Store(err.to_string())
    }
}
