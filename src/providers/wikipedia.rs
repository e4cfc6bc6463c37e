//! Wikipedia providers using the MediaWiki API.

use std::collections::HashMap;

use serde::Deserialize;

use crate::markers::clean_text;
use crate::provider::{GroupMask, Provider, ProviderConfig};
use crate::{ItemStatus, Query, Response, ResultItem, ResultList};

fn config() -> ProviderConfig {
    ProviderConfig {
        name: "wikipedia".to_string(),
        key: "w".to_string(),
        color: Some("\x1b[1mwikipedia\x1b[0m".to_string()),
        enabled: true,
        groups: GroupMask::UNSAFE | GroupMask::SLOW,
    }
}

fn api_url(lang: &str, params: &str) -> String {
    let lang = if lang.is_empty() { "en" } else { lang };
    format!(
        "https://{}.wikipedia.org/w/api.php?action=query&format=json&redirects=1&{}",
        urlencoding::encode(lang),
        params
    )
}

#[derive(Deserialize)]
struct WikiResponse {
    query: Option<WikiQuery>,
}

#[derive(Deserialize)]
struct WikiQuery {
    #[serde(default)]
    pages: HashMap<String, WikiPage>,
}

#[derive(Deserialize)]
struct WikiPage {
    extract: Option<String>,
    original: Option<WikiImage>,
}

#[derive(Deserialize)]
struct WikiImage {
    source: String,
}

/// Pages of a response; `None` if the body is not an API answer.
fn pages(response: &Response<'_>) -> Option<Vec<WikiPage>> {
    let parsed: WikiResponse = serde_json::from_slice(response.body).ok()?;
    Some(
        parsed
            .query
            .map(|q| q.pages.into_values().collect())
            .unwrap_or_default(),
    )
}

/// Introductory article text about an artist.
pub struct ArtistInfo {
    config: ProviderConfig,
}

impl ArtistInfo {
    pub fn new() -> Self {
        Self { config: config() }
    }
}

impl Default for ArtistInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for ArtistInfo {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn url(&self, query: &Query) -> Option<String> {
        query.artist.as_ref()?;
        Some(api_url(
            &query.lang,
            "prop=extracts&exintro=1&explaintext=1&titles=${artist}",
        ))
    }

    fn parse(&self, response: &Response<'_>) -> Option<ResultList> {
        let extracts: ResultList = pages(response)?
            .into_iter()
            .filter_map(|page| page.extract)
            .map(|text| clean_text(&text))
            .filter(|text| !text.is_empty())
            .map(|text| ResultItem::new(text).with_source(response.url))
            .collect();

        if extracts.is_empty() {
            return Some(ResultList::failure(ItemStatus::Failed));
        }
        Some(extracts)
    }
}

/// Album cover from the lead image of the album's article.
pub struct Cover {
    config: ProviderConfig,
}

impl Cover {
    pub fn new() -> Self {
        Self { config: config() }
    }
}

impl Default for Cover {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for Cover {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn url(&self, query: &Query) -> Option<String> {
        query.album.as_ref()?;
        Some(api_url(
            &query.lang,
            "prop=pageimages&piprop=original&titles=${album}",
        ))
    }

    fn parse(&self, response: &Response<'_>) -> Option<ResultList> {
        let images: ResultList = pages(response)?
            .into_iter()
            .filter_map(|page| page.original)
            .map(|image| ResultItem::new(image.source).with_source(response.url))
            .collect();

        if images.is_empty() {
            return Some(ResultList::failure(ItemStatus::Failed));
        }
        Some(images)
    }
}
