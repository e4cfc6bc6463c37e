//! Transport abstraction for retrieving raw response bodies.

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// Trait for fetching the raw body of a URL.
///
/// A transfer that fails (non-2xx status, connection error, timeout) returns
/// an error for that job only. [`FetchError::Pool`](crate::FetchError::Pool)
/// is reserved for failures of the transport itself and aborts the batch.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches the body of `url`, giving up after `timeout`.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>>;
}
