//! Error types for the fetch engine.

use thiserror::Error;

/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Errors that can occur while fetching metadata.
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A single transfer exceeded its timeout.
    #[error("Transfer timeout exceeded")]
    Timeout,

    /// The connection pool itself is unusable; aborts the running batch.
    #[error("Connection pool failure: {0}")]
    Pool(String),

    /// Response body larger than the transport accepts.
    #[error("Response body exceeds {0} bytes")]
    BodyTooLarge(usize),

    /// Caller handed the engine a job it cannot run.
    #[error("Internal error: {0}")]
    Misuse(String),

    /// Invalid query.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Returns true if this error means the whole batch must stop.
    pub fn is_pool_failure(&self) -> bool {
        matches!(self, FetchError::Pool(_))
    }
}
