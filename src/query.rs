//! Query parameters and the running state of one request.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Parameters of a metadata request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Artist name.
    #[serde(default)]
    pub artist: Option<String>,
    /// Album name.
    #[serde(default)]
    pub album: Option<String>,
    /// Song title.
    #[serde(default)]
    pub title: Option<String>,
    /// Language for providers that support localized text.
    #[serde(default = "default_lang")]
    pub lang: String,
    /// Number of items wanted.
    #[serde(default = "default_number")]
    pub number: usize,
    /// Maximum number of providers to try.
    #[serde(default = "default_plugmax")]
    pub plugmax: usize,
    /// Maximum number of concurrent transfers.
    #[serde(default = "default_parallel")]
    pub parallel: usize,
    /// Per-transfer timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Maximum number of redirects followed per transfer.
    #[serde(default = "default_redirects")]
    pub redirects: usize,
    /// Download discovered images instead of returning their URLs.
    #[serde(default = "default_download")]
    pub download: bool,
    /// Providers or groups to use (by name, key or group label).
    #[serde(default)]
    pub from: Vec<String>,
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_number() -> usize {
    1
}

fn default_plugmax() -> usize {
    usize::MAX
}

fn default_parallel() -> usize {
    4
}

fn default_timeout() -> u64 {
    20
}

fn default_redirects() -> usize {
    1
}

fn default_download() -> bool {
    true
}

impl Default for Query {
    fn default() -> Self {
        Self {
            artist: None,
            album: None,
            title: None,
            lang: default_lang(),
            number: default_number(),
            plugmax: default_plugmax(),
            parallel: default_parallel(),
            timeout: default_timeout(),
            redirects: default_redirects(),
            download: default_download(),
            from: Vec::new(),
        }
    }
}

impl Query {
    /// Creates a query with default settings and no search terms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the artist.
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    /// Sets the album.
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    /// Sets the song title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the language.
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    /// Sets the number of wanted items.
    pub fn with_number(mut self, number: usize) -> Self {
        self.number = number;
        self
    }

    /// Sets the maximum number of providers to try.
    pub fn with_plugmax(mut self, plugmax: usize) -> Self {
        self.plugmax = plugmax;
        self
    }

    /// Sets the maximum number of concurrent transfers.
    pub fn with_parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the per-transfer timeout in seconds.
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the redirect limit.
    pub fn with_redirects(mut self, redirects: usize) -> Self {
        self.redirects = redirects;
        self
    }

    /// Enables or disables downloading of discovered images.
    pub fn with_download(mut self, download: bool) -> Self {
        self.download = download;
        self
    }

    /// Restricts the providers to use.
    pub fn with_from(mut self, from: Vec<String>) -> Self {
        self.from = from;
        self
    }

    /// Per-transfer timeout as a [`Duration`].
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Running state of one request.
///
/// Owned by the caller and passed by `&mut` into every component; there is
/// exactly one per request and it is only touched from the controlling task.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    /// Request parameters.
    pub query: Query,
    /// Items accepted so far, across all batches.
    pub accepted: usize,
    /// Providers for which a job has been built.
    pub providers_tried: usize,
}

impl QueryState {
    /// Creates a fresh state for the given query.
    pub fn new(query: Query) -> Self {
        Self {
            query,
            accepted: 0,
            providers_tried: 0,
        }
    }

    /// Target item count.
    pub fn target(&self) -> usize {
        self.query.number
    }

    /// Returns true once enough items have been accepted.
    pub fn target_reached(&self) -> bool {
        self.accepted >= self.query.number
    }

    /// Lowers the accepted counter after items were flagged.
    pub fn reject(&mut self, count: usize) {
        self.accepted = self.accepted.saturating_sub(count);
    }

    /// Returns true if a provider that pages through results should fetch
    /// another page after `iter` pages.
    pub fn should_continue(&self, iter: usize) -> bool {
        iter.saturating_add(self.accepted) < self.query.number && iter < self.query.plugmax
    }
}
