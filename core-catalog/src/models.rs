//! Catalog domain model
//!
//! Provider-neutral shapes for what the session browses and plays. Wire
//! formats are translated into these types by the provider crates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Artwork at one resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Artist as referenced from a track or album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: String,
    pub name: String,
}

/// Enough of an album to render its page header before any refetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    /// Release date as reported by the provider (`YYYY`, `YYYY-MM` or `YYYY-MM-DD`)
    pub release_date: Option<String>,
    pub total_tracks: Option<u32>,
}

impl AlbumRef {
    /// Largest artwork, which providers list first.
    pub fn cover(&self) -> Option<&Image> {
        self.images.first()
    }

    pub fn release_year(&self) -> Option<&str> {
        self.release_date
            .as_deref()
            .and_then(|date| date.get(..4))
            .filter(|year| year.chars().all(|c| c.is_ascii_digit()))
    }

    pub fn primary_artist(&self) -> Option<&ArtistRef> {
        self.artists.first()
    }
}

/// A playable catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    /// Absent on simplified tracks (album track listings).
    pub album: Option<AlbumRef>,
    /// Short preview stream; tracks without one cannot be played.
    pub preview_url: Option<String>,
    pub duration_ms: u64,
}

impl Track {
    pub fn has_preview(&self) -> bool {
        self.preview_url.as_deref().is_some_and(|url| !url.is_empty())
    }

    /// Artist names joined for display.
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
    pub followers: u64,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// Album with its track listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumDetail {
    pub album: AlbumRef,
    pub tracks: Vec<Track>,
}

impl AlbumDetail {
    pub fn total_duration_ms(&self) -> u64 {
        self.tracks.iter().map(|track| track.duration_ms).sum()
    }
}

/// Which catalog collection a search targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    #[default]
    Track,
    Album,
    Artist,
    Playlist,
}

impl SearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchKind::Track => "track",
            SearchKind::Album => "album",
            SearchKind::Artist => "artist",
            SearchKind::Playlist => "playlist",
        }
    }
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Results of one search, typed by the kind that was searched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items", rename_all = "lowercase")]
pub enum SearchResults {
    Track(Vec<Track>),
    Album(Vec<AlbumRef>),
    Artist(Vec<Artist>),
    Playlist(Vec<PlaylistSummary>),
}

impl SearchResults {
    pub fn empty(kind: SearchKind) -> Self {
        match kind {
            SearchKind::Track => SearchResults::Track(Vec::new()),
            SearchKind::Album => SearchResults::Album(Vec::new()),
            SearchKind::Artist => SearchResults::Artist(Vec::new()),
            SearchKind::Playlist => SearchResults::Playlist(Vec::new()),
        }
    }

    pub fn kind(&self) -> SearchKind {
        match self {
            SearchResults::Track(_) => SearchKind::Track,
            SearchResults::Album(_) => SearchKind::Album,
            SearchResults::Artist(_) => SearchKind::Artist,
            SearchResults::Playlist(_) => SearchKind::Playlist,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SearchResults::Track(items) => items.len(),
            SearchResults::Album(items) => items.len(),
            SearchResults::Artist(items) => items.len(),
            SearchResults::Playlist(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
