//! Spotify Web API response types
//!
//! Data structures for deserializing Web API v1 responses and converting
//! them into the catalog model.

use core_catalog::{AlbumRef, Artist, ArtistRef, Image, PlaylistSummary, Track};
use serde::Deserialize;

/// Image object
///
/// See: https://developer.spotify.com/documentation/web-api/reference/get-an-album
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyImage {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimplifiedArtist {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

/// Album as embedded in tracks, searches and artist discographies.
#[derive(Debug, Clone, Deserialize)]
pub struct SimplifiedAlbum {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub total_tracks: Option<u32>,
}

/// Full or simplified track object. Local files come back without an id.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrack {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
    #[serde(default)]
    pub album: Option<SimplifiedAlbum>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

/// Album object from `GET /albums/{id}`
#[derive(Debug, Deserialize)]
pub struct FullAlbum {
    #[serde(flatten)]
    pub album: SimplifiedAlbum,
    pub tracks: Paging<SpotifyTrack>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Followers {
    #[serde(default)]
    pub total: u64,
}

/// Artist object from `GET /artists/{id}` and artist searches
#[derive(Debug, Clone, Deserialize)]
pub struct FullArtist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
    #[serde(default)]
    pub followers: Option<Followers>,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimplifiedPlaylist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<SpotifyImage>>,
}

/// Paging object wrapping every list endpoint
#[derive(Debug, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub next: Option<String>,
}

/// `GET /search` response; only the requested sections are present.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub tracks: Option<Paging<SpotifyTrack>>,
    #[serde(default)]
    pub albums: Option<Paging<SimplifiedAlbum>>,
    #[serde(default)]
    pub artists: Option<Paging<FullArtist>>,
    /// Playlist searches may contain `null` entries.
    #[serde(default)]
    pub playlists: Option<Paging<Option<SimplifiedPlaylist>>>,
}

#[derive(Debug, Deserialize)]
pub struct TopTracksResponse {
    pub tracks: Vec<SpotifyTrack>,
}

/// Regular error object returned with non-2xx statuses
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub status: Option<u16>,
    pub message: String,
}

impl From<SpotifyImage> for Image {
    fn from(image: SpotifyImage) -> Self {
        Image {
            url: image.url,
            width: image.width,
            height: image.height,
        }
    }
}

impl From<SimplifiedArtist> for ArtistRef {
    fn from(artist: SimplifiedArtist) -> Self {
        ArtistRef {
            id: artist.id.unwrap_or_default(),
            name: artist.name,
        }
    }
}

impl From<SimplifiedAlbum> for AlbumRef {
    fn from(album: SimplifiedAlbum) -> Self {
        AlbumRef {
            id: album.id,
            name: album.name,
            images: album.images.into_iter().map(Image::from).collect(),
            artists: album.artists.into_iter().map(ArtistRef::from).collect(),
            release_date: album.release_date,
            total_tracks: album.total_tracks,
        }
    }
}

impl From<FullArtist> for Artist {
    fn from(artist: FullArtist) -> Self {
        Artist {
            id: artist.id,
            name: artist.name,
            images: artist.images.into_iter().map(Image::from).collect(),
            followers: artist.followers.map(|f| f.total).unwrap_or_default(),
            genres: artist.genres,
        }
    }
}

impl From<SimplifiedPlaylist> for PlaylistSummary {
    fn from(playlist: SimplifiedPlaylist) -> Self {
        PlaylistSummary {
            id: playlist.id,
            name: playlist.name,
            description: playlist.description.filter(|d| !d.is_empty()),
            images: playlist
                .images
                .unwrap_or_default()
                .into_iter()
                .map(Image::from)
                .collect(),
        }
    }
}

impl SpotifyTrack {
    /// Converts to a catalog track, or `None` for unplayable local files.
    pub fn into_track(self) -> Option<Track> {
        let id = self.id.filter(|id| !id.is_empty())?;
        Some(Track {
            id,
            name: self.name,
            artists: self.artists.into_iter().map(ArtistRef::from).collect(),
            album: self.album.map(AlbumRef::from),
            preview_url: self.preview_url.filter(|url| !url.is_empty()),
            duration_ms: self.duration_ms,
        })
    }
}

/// Converts a track list, dropping local files.
pub fn into_tracks(tracks: Vec<SpotifyTrack>) -> Vec<Track> {
    tracks.into_iter().filter_map(SpotifyTrack::into_track).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_conversion() {
        let track: SpotifyTrack = serde_json::from_str(
            r#"{
                "id": "t1",
                "name": "CUFF IT",
                "artists": [{"id": "ar1", "name": "Beyoncé"}],
                "album": {
                    "id": "al1",
                    "name": "RENAISSANCE",
                    "images": [{"url": "https://i.scdn.co/image/a", "width": 640, "height": 640}],
                    "release_date": "2022-07-29",
                    "total_tracks": 16
                },
                "preview_url": "https://p.scdn.co/mp3-preview/t1",
                "duration_ms": 225388
            }"#,
        )
        .unwrap();

        let track = track.into_track().unwrap();
        assert_eq!(track.id, "t1");
        assert_eq!(track.artists[0].name, "Beyoncé");
        assert_eq!(track.duration_ms, 225_388);
        let album = track.album.unwrap();
        assert_eq!(album.release_year(), Some("2022"));
        assert_eq!(album.cover().and_then(|i| i.width), Some(640));
    }

    #[test]
    fn test_local_files_are_dropped() {
        let tracks: Vec<SpotifyTrack> = serde_json::from_str(
            r#"[
                {"id": null, "name": "local.mp3", "duration_ms": 1000},
                {"id": "t2", "name": "Remote", "preview_url": null, "duration_ms": 2000}
            ]"#,
        )
        .unwrap();

        let tracks = into_tracks(tracks);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, "t2");
        assert!(!tracks[0].has_preview());
    }

    #[test]
    fn test_artist_without_followers() {
        let artist: FullArtist =
            serde_json::from_str(r#"{"id": "ar1", "name": "Drake", "genres": ["rap"]}"#).unwrap();
        let artist = Artist::from(artist);
        assert_eq!(artist.followers, 0);
        assert_eq!(artist.genres, vec!["rap".to_string()]);
    }
}
