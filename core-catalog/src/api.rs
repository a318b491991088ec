use crate::error::Result;
use crate::models::{AlbumDetail, AlbumRef, Artist, SearchKind, SearchResults, Track};
use async_trait::async_trait;

/// Read access to a music catalog.
///
/// Implemented by provider crates; the session depends only on this trait so
/// page loading can be exercised against in-memory doubles.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Searches one collection. A blank query yields empty results without
    /// contacting the provider.
    async fn search(&self, query: &str, kind: SearchKind) -> Result<SearchResults>;

    /// Album with its tracks; every track carries the album back-reference.
    async fn get_album(&self, album_id: &str) -> Result<AlbumDetail>;

    async fn get_artist(&self, artist_id: &str) -> Result<Artist>;

    /// Albums and singles released by the artist.
    async fn get_artist_albums(&self, artist_id: &str) -> Result<Vec<AlbumRef>>;

    /// Simplified track listing, without album back-references.
    async fn get_album_tracks(&self, album_id: &str) -> Result<Vec<Track>>;

    async fn get_artist_top_tracks(&self, artist_id: &str) -> Result<Vec<Track>>;

    /// Albums for the "new releases" home shelf.
    async fn new_releases(&self) -> Result<Vec<AlbumRef>>;

    /// Albums for the "featured" home shelf.
    async fn featured(&self) -> Result<Vec<AlbumRef>>;

    async fn tracks_by_year(&self, year: u16) -> Result<Vec<Track>>;
}
