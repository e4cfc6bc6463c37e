//! HTTP-based transport using reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use url::Url;

use crate::transport::Transport;
use crate::{FetchError, Result};

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("musicmeta/", env!("CARGO_PKG_VERSION"));

/// Default limit for a single response body.
pub const DEFAULT_MAX_BODY: usize = 32 * 1024 * 1024;

/// Upper bound for the buffer reserved from `Content-Length`.
const MAX_PREALLOC: usize = 256 * 1024;

/// A transport that uses plain HTTP requests via reqwest.
///
/// The client keeps no cookies, accepts gzip and follows a bounded number of
/// redirects. Bodies are accumulated chunk by chunk into one buffer, and a
/// body larger than `max_body` fails the transfer.
pub struct HttpTransport {
    client: Client,
    max_body: usize,
}

impl HttpTransport {
    /// Creates a transport following at most `redirects` redirects.
    pub fn new(redirects: usize) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(Policy::limited(redirects))
            .gzip(true)
            .build()?;
        Ok(Self::with_client(client))
    }

    /// Creates a transport with a custom reqwest client.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            max_body: DEFAULT_MAX_BODY,
        }
    }

    /// Sets the largest accepted body size in bytes.
    pub fn with_max_body(mut self, max_body: usize) -> Self {
        self.max_body = max_body;
        self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        let url = Url::parse(url)?;
        let mut response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;

        let announced = response.content_length().unwrap_or(0);
        if announced > self.max_body as u64 {
            return Err(FetchError::BodyTooLarge(self.max_body));
        }

        let mut buffer = Vec::with_capacity((announced as usize).min(MAX_PREALLOC));
        while let Some(chunk) = response.chunk().await? {
            if buffer.len() + chunk.len() > self.max_body {
                return Err(FetchError::BodyTooLarge(self.max_body));
            }
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer)
    }
}
