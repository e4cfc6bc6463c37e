//! Built-in providers and their default tables.
//!
//! Each table lists the reliable sources first, closed by a `safe`
//! boundary, followed by the `unsafe` ones.

pub mod lastfm;
pub mod musicbrainz;
pub mod wikipedia;

use crate::ProviderTable;

/// Group label closing the reliable sources.
pub const SAFE_GROUP: &str = "safe";
/// Group label closing the less reliable sources.
pub const UNSAFE_GROUP: &str = "unsafe";

/// Default table for cover art.
pub fn cover_table(lastfm_key: Option<&str>) -> ProviderTable {
    ProviderTable::new()
        .provider(lastfm::Cover::new(lastfm_key.map(str::to_string)))
        .boundary(SAFE_GROUP)
        .provider(wikipedia::Cover::new())
        .boundary(UNSAFE_GROUP)
}

/// Default table for artist biographies.
pub fn artist_info_table(lastfm_key: Option<&str>) -> ProviderTable {
    ProviderTable::new()
        .provider(lastfm::ArtistInfo::new(lastfm_key.map(str::to_string)))
        .boundary(SAFE_GROUP)
        .provider(wikipedia::ArtistInfo::new())
        .boundary(UNSAFE_GROUP)
}

/// Default table for similar songs.
pub fn similar_songs_table(lastfm_key: Option<&str>) -> ProviderTable {
    ProviderTable::new()
        .provider(lastfm::SimilarSongs::new(lastfm_key.map(str::to_string)))
        .boundary(SAFE_GROUP)
}

/// Default table for artist and album relations.
pub fn relations_table() -> ProviderTable {
    ProviderTable::new()
        .provider(musicbrainz::Relations::new())
        .boundary(SAFE_GROUP)
}
