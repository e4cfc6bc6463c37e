//! MusicBrainz relations (links to homepages, wikis, shops).
//!
//! Relations take two requests. The provider searches for the artist, or the
//! release group when an album is given, and yields the lookup URL of the best
//! match. [`parse_relations`] then reads the URL relations of that lookup.

use serde::Deserialize;

use crate::provider::{GroupMask, Provider, ProviderConfig};
use crate::{ItemStatus, Query, Response, ResultItem, ResultList};

const WS_ROOT: &str = "https://musicbrainz.org/ws/2";
/// Search matches scoring lower are unrelated entities.
const MIN_SCORE: u32 = 90;

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    artists: Vec<Entity>,
    #[serde(default, rename = "release-groups")]
    release_groups: Vec<Entity>,
}

#[derive(Deserialize)]
struct Entity {
    id: String,
    #[serde(default)]
    score: u32,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    relations: Vec<Relation>,
}

#[derive(Deserialize)]
struct Relation {
    #[serde(rename = "type")]
    kind: String,
    url: Option<RelationUrl>,
}

#[derive(Deserialize)]
struct RelationUrl {
    resource: String,
}

/// Finds the MusicBrainz entity a query is about.
pub struct Relations {
    config: ProviderConfig,
}

impl Relations {
    pub fn new() -> Self {
        Self {
            config: ProviderConfig {
                name: "musicbrainz".to_string(),
                key: "m".to_string(),
                color: Some("\x1b[33mmusicbrainz\x1b[0m".to_string()),
                enabled: true,
                groups: GroupMask::SAFE | GroupMask::SLOW,
            },
        }
    }
}

impl Default for Relations {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for Relations {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn url(&self, query: &Query) -> Option<String> {
        query.artist.as_ref()?;
        Some(match query.album {
            Some(_) => format!(
                "{WS_ROOT}/release-group/?query=releasegroup:%22${{album}}%22%20AND%20artist:%22${{artist}}%22&limit=1&fmt=json"
            ),
            None => format!("{WS_ROOT}/artist/?query=artist:%22${{artist}}%22&limit=1&fmt=json"),
        })
    }

    fn parse(&self, response: &Response<'_>) -> Option<ResultList> {
        let parsed: SearchResponse = serde_json::from_slice(response.body).ok()?;
        let best = |entities: &[Entity]| {
            entities
                .first()
                .filter(|e| e.score >= MIN_SCORE)
                .map(|e| e.id.clone())
        };
        let lookup = match (best(&parsed.artists), best(&parsed.release_groups)) {
            (_, Some(group)) => format!("{WS_ROOT}/release-group/{group}?inc=url-rels&fmt=json"),
            (Some(artist), None) => format!("{WS_ROOT}/artist/{artist}?inc=url-rels&fmt=json"),
            (None, None) => return Some(ResultList::failure(ItemStatus::Failed)),
        };
        Some(ResultList::from(vec![
            ResultItem::new(lookup).with_source(response.url)
        ]))
    }
}

/// Parses a lookup answer into `type: url` items.
pub fn parse_relations(response: &Response<'_>) -> Option<ResultList> {
    let parsed: LookupResponse = serde_json::from_slice(response.body).ok()?;
    let relations: ResultList = parsed
        .relations
        .into_iter()
        .filter_map(|rel| {
            let url = rel.url?;
            Some(ResultItem::new(format!("{}: {}", rel.kind, url.resource)).with_source(response.url))
        })
        .collect();

    if relations.is_empty() {
        return Some(ResultList::failure(ItemStatus::Failed));
    }
    Some(relations)
}
