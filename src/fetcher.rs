//! High level entry point: one call per metadata request.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::finalize::{CoverFinalizer, DownloadCallback, Finalizer, FollowFinalizer, GenericFinalizer};
use crate::providers::{self, musicbrainz};
use crate::{
    FetchError, Multiplexer, ProviderTable, Query, QueryState, Result, ResultItem, ResultList,
    Scheduler, Transport,
};

/// Kind of metadata to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GetType {
    Cover,
    ArtistInfo,
    SimilarSongs,
    Relations,
}

impl GetType {
    /// Every kind, in display order.
    pub const ALL: [GetType; 4] = [
        GetType::Cover,
        GetType::ArtistInfo,
        GetType::SimilarSongs,
        GetType::Relations,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GetType::Cover => "cover",
            GetType::ArtistInfo => "ainfo",
            GetType::SimilarSongs => "similar",
            GetType::Relations => "relations",
        }
    }

    /// Checks that the query carries what this kind needs.
    pub fn validate(self, query: &Query) -> Result<()> {
        fn present(field: &Option<String>) -> bool {
            field.as_deref().is_some_and(|s| !s.trim().is_empty())
        }

        if query.number == 0 {
            return Err(FetchError::InvalidQuery(
                "number of items must be at least 1".into(),
            ));
        }
        let missing = match self {
            GetType::Cover if !present(&query.artist) || !present(&query.album) => {
                Some("cover art needs an artist and an album")
            }
            GetType::ArtistInfo if !present(&query.artist) => Some("artist info needs an artist"),
            GetType::Relations if !present(&query.artist) => Some("relations need an artist"),
            GetType::SimilarSongs if !present(&query.artist) || !present(&query.title) => {
                Some("similar songs need an artist and a title")
            }
            _ => None,
        };
        match missing {
            Some(msg) => Err(FetchError::InvalidQuery(msg.into())),
            None => Ok(()),
        }
    }
}

impl fmt::Display for GetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fetches metadata through the built-in (or overridden) provider tables.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    lastfm_key: Option<String>,
    tables: HashMap<GetType, ProviderTable>,
    on_download: Option<DownloadCallback>,
}

impl Fetcher {
    /// Creates a fetcher on top of `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            lastfm_key: None,
            tables: HashMap::new(),
            on_download: None,
        }
    }

    /// Sets the last.fm API key; last.fm providers are skipped without one.
    pub fn with_lastfm_key(mut self, key: impl Into<String>) -> Self {
        self.lastfm_key = Some(key.into());
        self
    }

    /// Replaces the provider table used for `get_type`.
    pub fn with_table(mut self, get_type: GetType, table: ProviderTable) -> Self {
        self.tables.insert(get_type, table);
        self
    }

    /// Sets a callback invoked for each cover image as soon as it is downloaded.
    pub fn with_download_callback(mut self, callback: DownloadCallback) -> Self {
        self.on_download = Some(callback);
        self
    }

    /// Returns the provider table used for `get_type`.
    pub fn table(&self, get_type: GetType) -> ProviderTable {
        if let Some(table) = self.tables.get(&get_type) {
            return table.clone();
        }
        let key = self.lastfm_key.as_deref();
        match get_type {
            GetType::Cover => providers::cover_table(key),
            GetType::ArtistInfo => providers::artist_info_table(key),
            GetType::SimilarSongs => providers::similar_songs_table(key),
            GetType::Relations => providers::relations_table(),
        }
    }

    /// Fetches up to `query.number` items of `get_type`.
    ///
    /// An empty list means every provider failed.
    pub async fn get(&self, get_type: GetType, query: Query) -> Result<ResultList> {
        get_type.validate(&query)?;

        let start = Instant::now();
        let mut table = self.table(get_type);
        table.select(&query.from);
        if table.enabled_names().is_empty() {
            warn!("No provider selected for {}", get_type);
            return Ok(ResultList::new());
        }
        debug!(
            "Fetching {} from {}",
            get_type,
            table.enabled_names().join(", ")
        );

        let mux = Multiplexer::new(
            self.transport.as_ref(),
            query.parallel,
            query.timeout_duration(),
        );
        let mut state = QueryState::new(query);
        let finalizer = self.finalizer_for(get_type);
        let results = Scheduler::new(mux)
            .execute(&table, &mut state, finalizer.as_ref())
            .await?
            .unwrap_or_default();

        debug!(
            "{} item(s) from {} provider(s) in {} ms",
            results.len(),
            state.providers_tried,
            start.elapsed().as_millis()
        );
        Ok(results)
    }

    /// Fetches one URL directly, outside any batch.
    pub async fn download_single(&self, url: &str, query: &Query) -> Option<ResultItem> {
        if url.is_empty() {
            return None;
        }
        match self.transport.fetch(url, query.timeout_duration()).await {
            Ok(body) => Some(ResultItem::new(body).with_source(url)),
            Err(e) => {
                warn!("Download of {} failed: {}", url, e);
                None
            }
        }
    }

    fn finalizer_for(&self, get_type: GetType) -> Box<dyn Finalizer> {
        match get_type {
            GetType::Cover => {
                let finalizer = CoverFinalizer::new();
                Box::new(match &self.on_download {
                    Some(callback) => finalizer.with_download_callback(callback.clone()),
                    None => finalizer,
                })
            }
            GetType::Relations => Box::new(FollowFinalizer::new(Arc::new(musicbrainz::parse_relations))),
            GetType::ArtistInfo | GetType::SimilarSongs => Box::new(GenericFinalizer::new()),
        }
    }
}
