//! last.fm providers (artist biography, cover art, similar songs).
//!
//! All three use the XML web service. URLs keep `${artist}`-style
//! placeholders; the multiplexer fills them in when the job is dispatched.

use crate::markers::{all_between, between, clean_text};
use crate::provider::{GroupMask, Provider, ProviderConfig};
use crate::{ItemStatus, Query, Response, ResultItem, ResultList};

const API_ROOT: &str = "http://ws.audioscrobbler.com/2.0/";

const SUMMARY_BEGIN: &str = "<summary><![CDATA[";
const SUMMARY_END: &str = "]]></summary>";
const CONTENT_BEGIN: &str = "<content><![CDATA[";
const CONTENT_END: &str = "User-contributed text";

/// Cover sizes, best first.
const IMAGE_SIZES: &[&str] = &["mega", "extralarge", "large"];

fn config(key: &str) -> ProviderConfig {
    ProviderConfig {
        name: "last.fm".to_string(),
        key: key.to_string(),
        color: Some("last\x1b[31m.\x1b[0mfm".to_string()),
        enabled: true,
        groups: GroupMask::SAFE | GroupMask::FAST,
    }
}

fn tagged(list: Vec<String>, source: &str) -> ResultList {
    list.into_iter()
        .map(|data| ResultItem::new(data).with_source(source))
        .collect()
}

/// Artist biography: a short summary and the full text.
pub struct ArtistInfo {
    config: ProviderConfig,
    api_key: Option<String>,
}

impl ArtistInfo {
    /// Creates the provider; without an API key it serves no query.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            config: config("l"),
            api_key,
        }
    }
}

impl Provider for ArtistInfo {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn url(&self, query: &Query) -> Option<String> {
        let key = self.api_key.as_deref()?;
        query.artist.as_ref()?;
        Some(format!(
            "{API_ROOT}?method=artist.getinfo&artist=${{artist}}&autocorrect=0&lang={}&api_key={}",
            urlencoding::encode(&query.lang),
            key
        ))
    }

    fn parse(&self, response: &Response<'_>) -> Option<ResultList> {
        let body = response.text();
        let parts = between(&body, SUMMARY_BEGIN, SUMMARY_END).and_then(|summary| {
            between(&body, CONTENT_BEGIN, CONTENT_END).map(|content| (summary, content))
        });

        match parts {
            Ok((summary, content)) => Some(tagged(
                vec![clean_text(summary), clean_text(content)],
                response.url,
            )),
            Err(status) => Some(ResultList::failure(status)),
        }
    }
}

/// Album cover URL from `album.getinfo`.
pub struct Cover {
    config: ProviderConfig,
    api_key: Option<String>,
}

impl Cover {
    /// Creates the provider; without an API key it serves no query.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            config: config("l"),
            api_key,
        }
    }
}

impl Provider for Cover {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn url(&self, query: &Query) -> Option<String> {
        let key = self.api_key.as_deref()?;
        query.artist.as_ref()?;
        query.album.as_ref()?;
        Some(format!(
            "{API_ROOT}?method=album.getinfo&artist=${{artist}}&album=${{album}}&autocorrect=1&api_key={key}"
        ))
    }

    fn parse(&self, response: &Response<'_>) -> Option<ResultList> {
        let body = response.text();
        let url = IMAGE_SIZES.iter().find_map(|size| {
            let begin = format!("<image size=\"{size}\">");
            between(&body, &begin, "</image>")
                .ok()
                .map(str::trim)
                .filter(|url| !url.is_empty())
        });

        match url {
            Some(url) => Some(tagged(vec![url.to_string()], response.url)),
            None => Some(ResultList::failure(ItemStatus::NoBeginTag)),
        }
    }
}

/// Similar songs from `track.getsimilar`.
///
/// Each item is `name\nartist\nmatch\nurl`.
pub struct SimilarSongs {
    config: ProviderConfig,
    api_key: Option<String>,
}

impl SimilarSongs {
    /// Creates the provider; without an API key it serves no query.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            config: config("l"),
            api_key,
        }
    }
}

impl Provider for SimilarSongs {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn url(&self, query: &Query) -> Option<String> {
        let key = self.api_key.as_deref()?;
        query.artist.as_ref()?;
        query.title.as_ref()?;
        Some(format!(
            "{API_ROOT}?method=track.getsimilar&artist=${{artist}}&track=${{title}}&api_key={key}"
        ))
    }

    fn parse(&self, response: &Response<'_>) -> Option<ResultList> {
        let body = response.text();
        let tracks = all_between(&body, "<track>", "</track>");
        if tracks.is_empty() {
            return Some(ResultList::failure(ItemStatus::NoBeginTag));
        }

        let songs: Vec<String> = tracks
            .into_iter()
            .filter_map(|track| {
                let name = between(track, "<name>", "</name>").ok()?;
                let artist = between(track, "<artist>", "</artist>")
                    .and_then(|artist| between(artist, "<name>", "</name>"))
                    .ok()?;
                let score = between(track, "<match>", "</match>").unwrap_or_default();
                let url = between(track, "<url>", "</url>").unwrap_or_default();
                Some(format!(
                    "{}\n{}\n{}\n{}",
                    clean_text(name),
                    clean_text(artist),
                    score.trim(),
                    url.trim()
                ))
            })
            .collect();

        if songs.is_empty() {
            return Some(ResultList::failure(ItemStatus::Failed));
        }
        Some(tagged(songs, response.url))
    }
}
