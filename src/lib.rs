//! # musicmeta
//!
//! A music metadata fetcher: cover art, artist biographies, similar songs and
//! artist relations collected from several web providers.
//!
//! Providers are arranged in an ordered table split into groups. Groups are
//! tried one after another, and the providers of one group are downloaded
//! concurrently through a bounded connection pool. Work stops as soon as
//! enough acceptable items were found, so later (usually less reliable)
//! groups are only contacted when needed.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use musicmeta::{Fetcher, GetType, HttpTransport, Query};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let query = Query::new().with_artist("Metallica").with_number(2);
//!     let transport = Arc::new(HttpTransport::new(query.redirects)?);
//!     let fetcher = Fetcher::new(transport).with_lastfm_key("YOUR_KEY");
//!
//!     let results = fetcher.get(GetType::ArtistInfo, query).await?;
//!     for item in results.items() {
//!         println!("{}", item.text());
//!     }
//!     Ok(())
//! }
//! ```

mod error;
mod fetcher;
mod finalize;
mod job;
mod multiplexer;
mod provider;
mod query;
mod result;
mod scheduler;
mod transport;
mod transport_http;

pub mod filters;
pub mod markers;
pub mod providers;

pub use error::{FetchError, Result};
pub use fetcher::{Fetcher, GetType};
pub use finalize::{CoverFinalizer, DownloadCallback, Finalizer, FollowFinalizer, GenericFinalizer};
pub use job::{prepare_url, Job, Parser, Response};
pub use multiplexer::{BatchReport, Multiplexer, POLL_INTERVAL};
pub use provider::{GroupMask, Provider, ProviderConfig, ProviderParser, ProviderTable, TableEntry};
pub use query::{Query, QueryState};
pub use result::{ItemStatus, ResultItem, ResultList};
pub use scheduler::Scheduler;
pub use transport::Transport;
pub use transport_http::{HttpTransport, DEFAULT_MAX_BODY, USER_AGENT};
