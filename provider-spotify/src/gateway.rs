//! Spotify Web API gateway
//!
//! Implements [`CatalogApi`] on top of an [`HttpClient`] and a shared
//! [`TokenCache`].

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_auth::{Token, TokenCache};
use core_catalog::{
    AlbumDetail, AlbumRef, Artist, CatalogApi, CatalogError, Result, SearchKind, SearchResults,
    Track,
};
use core_runtime::config::CatalogSettings;
use core_runtime::logging::strip_query;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{status_error, transport_error};
use crate::types::{
    into_tracks, FullAlbum, FullArtist, Paging, SearchResponse, SimplifiedAlbum, SpotifyTrack,
    TopTracksResponse,
};

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Album groups listed on an artist page
const ARTIST_ALBUM_GROUPS: &str = "album,single";

/// Spotify catalog gateway
///
/// Every operation is a single authenticated `GET`. A `401` invalidates the
/// rejected token, forces one refresh and retries once; every other failure is
/// surfaced as-is.
///
/// # Example
///
/// ```ignore
/// let gateway = MediaGateway::new(http_client, tokens, CatalogSettings::default());
/// let results = gateway.search("renaissance", SearchKind::Album).await?;
/// ```
pub struct MediaGateway {
    http_client: Arc<dyn HttpClient>,
    tokens: Arc<TokenCache>,
    settings: CatalogSettings,
}

impl MediaGateway {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        tokens: Arc<TokenCache>,
        settings: CatalogSettings,
    ) -> Self {
        Self {
            http_client,
            tokens,
            settings,
        }
    }

    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    fn limit(&self) -> String {
        self.settings.result_limit.to_string()
    }

    fn market(&self) -> String {
        self.settings.market.clone()
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> String {
        let mut url = format!("{}{}", self.settings.api_base_url.trim_end_matches('/'), path);
        for (i, (key, value)) in params.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    async fn send(&self, url: &str, token: &Token) -> Result<HttpResponse> {
        let request = HttpRequest::get(url)
            .bearer_token(token.value())
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT);

        self.http_client
            .execute(request)
            .await
            .map_err(transport_error)
    }

    /// Performs an authenticated GET with at most one forced token refresh.
    #[instrument(skip(self, url), fields(endpoint = %strip_query(url)))]
    async fn get_authorized(&self, url: &str, resource: &str) -> Result<HttpResponse> {
        let token = self.tokens.get_token().await?;
        let response = self.send(url, &token).await?;

        let response = if response.status == 401 {
            warn!("Access token rejected, forcing refresh");
            self.tokens.invalidate(&token);
            let token = self.tokens.get_token().await?;
            self.send(url, &token).await?
        } else {
            response
        };

        if response.is_success() {
            debug!(status = response.status, "Catalog request succeeded");
            Ok(response)
        } else {
            let error = status_error(&response, resource);
            warn!(status = response.status, error = %error, "Catalog request failed");
            Err(error)
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = self.endpoint(path, params);
        let resource = path.trim_start_matches('/');
        let response = self.get_authorized(&url, resource).await?;

        response.json::<T>().map_err(|e| {
            CatalogError::Parse(format!("Failed to parse {} response: {}", resource, e))
        })
    }

    async fn search_albums(&self, query: &str) -> Result<Vec<AlbumRef>> {
        match self.search(query, SearchKind::Album).await? {
            SearchResults::Album(albums) => Ok(albums),
            other => Err(CatalogError::Parse(format!(
                "Album search returned {} results",
                other.kind()
            ))),
        }
    }
}

fn encode_id(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

#[async_trait]
impl CatalogApi for MediaGateway {
    #[instrument(skip(self, kind), fields(kind = %kind))]
    async fn search(&self, query: &str, kind: SearchKind) -> Result<SearchResults> {
        let query = query.trim();
        if query.is_empty() {
            debug!("Blank query, skipping search");
            return Ok(SearchResults::empty(kind));
        }

        let response: SearchResponse = self
            .get_json(
                "/search",
                &[
                    ("q", query.to_string()),
                    ("type", kind.as_str().to_string()),
                    ("limit", self.limit()),
                    ("market", self.market()),
                ],
            )
            .await?;

        let results = match kind {
            SearchKind::Track => SearchResults::Track(into_tracks(
                response.tracks.map(|p| p.items).unwrap_or_default(),
            )),
            SearchKind::Album => SearchResults::Album(
                response
                    .albums
                    .map(|p| p.items)
                    .unwrap_or_default()
                    .into_iter()
                    .map(AlbumRef::from)
                    .collect(),
            ),
            SearchKind::Artist => SearchResults::Artist(
                response
                    .artists
                    .map(|p| p.items)
                    .unwrap_or_default()
                    .into_iter()
                    .map(Artist::from)
                    .collect(),
            ),
            SearchKind::Playlist => SearchResults::Playlist(
                response
                    .playlists
                    .map(|p| p.items)
                    .unwrap_or_default()
                    .into_iter()
                    .flatten()
                    .map(Into::into)
                    .collect(),
            ),
        };

        info!(count = results.len(), "Search completed");
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn get_album(&self, album_id: &str) -> Result<AlbumDetail> {
        let full: FullAlbum = self
            .get_json(
                &format!("/albums/{}", encode_id(album_id)),
                &[("market", self.market())],
            )
            .await?;

        let album = AlbumRef::from(full.album);
        let tracks = into_tracks(full.tracks.items)
            .into_iter()
            .map(|mut track| {
                track.album.get_or_insert_with(|| album.clone());
                track
            })
            .collect();

        Ok(AlbumDetail { album, tracks })
    }

    #[instrument(skip(self))]
    async fn get_artist(&self, artist_id: &str) -> Result<Artist> {
        let artist: FullArtist = self
            .get_json(&format!("/artists/{}", encode_id(artist_id)), &[])
            .await?;
        Ok(artist.into())
    }

    #[instrument(skip(self))]
    async fn get_artist_albums(&self, artist_id: &str) -> Result<Vec<AlbumRef>> {
        let page: Paging<SimplifiedAlbum> = self
            .get_json(
                &format!("/artists/{}/albums", encode_id(artist_id)),
                &[
                    ("market", self.market()),
                    ("limit", self.limit()),
                    ("include_groups", ARTIST_ALBUM_GROUPS.to_string()),
                ],
            )
            .await?;
        Ok(page.items.into_iter().map(AlbumRef::from).collect())
    }

    #[instrument(skip(self))]
    async fn get_album_tracks(&self, album_id: &str) -> Result<Vec<Track>> {
        let page: Paging<SpotifyTrack> = self
            .get_json(
                &format!("/albums/{}/tracks", encode_id(album_id)),
                &[("limit", self.limit())],
            )
            .await?;
        Ok(into_tracks(page.items))
    }

    #[instrument(skip(self))]
    async fn get_artist_top_tracks(&self, artist_id: &str) -> Result<Vec<Track>> {
        let response: TopTracksResponse = self
            .get_json(
                &format!("/artists/{}/top-tracks", encode_id(artist_id)),
                &[("market", self.market())],
            )
            .await?;
        Ok(into_tracks(response.tracks))
    }

    async fn new_releases(&self) -> Result<Vec<AlbumRef>> {
        self.search_albums(&self.settings.new_releases_query).await
    }

    async fn featured(&self) -> Result<Vec<AlbumRef>> {
        self.search_albums(&self.settings.featured_query).await
    }

    #[instrument(skip(self))]
    async fn tracks_by_year(&self, year: u16) -> Result<Vec<Track>> {
        match self
            .search(&format!("year:{}", year), SearchKind::Track)
            .await?
        {
            SearchResults::Track(tracks) => Ok(tracks),
            other => Err(CatalogError::Parse(format!(
                "Track search returned {} results",
                other.kind()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::time::SystemClock;
    use core_auth::{CredentialExchangeError, ExchangedToken, FnExchanger};
    use futures::future::BoxFuture;
    use mockall::{mock, Sequence};
    use std::sync::atomic::{AtomicUsize, Ordering};

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    /// Token cache whose n-th exchange yields `token-n`.
    fn counting_tokens(exchanges: Arc<AtomicUsize>) -> Arc<TokenCache> {
        let exchanger = FnExchanger::new(move || {
            let n = exchanges.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move {
                Ok(ExchangedToken::new(
                    format!("token-{}", n),
                    Duration::from_secs(3600),
                ))
            }) as BoxFuture<'static, core_auth::Result<ExchangedToken>>
        });
        Arc::new(TokenCache::new(Arc::new(exchanger), Arc::new(SystemClock)))
    }

    fn gateway(http_client: MockHttpClient) -> (MediaGateway, Arc<AtomicUsize>) {
        let exchanges = Arc::new(AtomicUsize::new(0));
        let gateway = MediaGateway::new(
            Arc::new(http_client),
            counting_tokens(exchanges.clone()),
            CatalogSettings {
                api_base_url: "https://api.test/v1".to_string(),
                ..CatalogSettings::default()
            },
        );
        (gateway, exchanges)
    }

    fn bearer(request: &HttpRequest) -> Option<&str> {
        request.headers.get("Authorization").map(String::as_str)
    }

    const ALBUM_SEARCH: &str = r#"{
        "albums": {
            "items": [
                {"id": "al1", "name": "RENAISSANCE", "images": [], "artists": [{"id": "ar1", "name": "Beyoncé"}], "release_date": "2022-07-29", "total_tracks": 16}
            ]
        }
    }"#;

    #[tokio::test]
    async fn test_search_sends_query_parameters() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|request| {
                request.url
                    == "https://api.test/v1/search?q=daft%20punk&type=album&limit=5&market=US"
                    && bearer(request) == Some("Bearer token-1")
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, ALBUM_SEARCH)));

        let (gateway, _) = gateway(mock_http);
        let results = gateway.search("  daft punk ", SearchKind::Album).await.unwrap();

        match results {
            SearchResults::Album(albums) => {
                assert_eq!(albums.len(), 1);
                assert_eq!(albums[0].name, "RENAISSANCE");
            }
            other => panic!("unexpected results {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_blank_search_makes_no_request() {
        let (gateway, exchanges) = gateway(MockHttpClient::new());

        let results = gateway.search("   ", SearchKind::Track).await.unwrap();

        assert_eq!(results, SearchResults::Track(vec![]));
        assert_eq!(exchanges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_playlist_search_skips_null_items() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().returning(|_| {
            Ok(HttpResponse::new(
                200,
                r#"{"playlists": {"items": [null, {"id": "p1", "name": "Chill", "description": "", "images": null}]}}"#,
            ))
        });

        let (gateway, _) = gateway(mock_http);
        let results = gateway.search("chill", SearchKind::Playlist).await.unwrap();

        match results {
            SearchResults::Playlist(playlists) => {
                assert_eq!(playlists.len(), 1);
                assert_eq!(playlists[0].description, None);
            }
            other => panic!("unexpected results {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_album_backfills_tracks() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|request| request.url == "https://api.test/v1/albums/al1?market=US")
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{
                        "id": "al1",
                        "name": "RENAISSANCE",
                        "images": [{"url": "https://i.scdn.co/image/a", "width": 640, "height": 640}],
                        "artists": [{"id": "ar1", "name": "Beyoncé"}],
                        "release_date": "2022-07-29",
                        "total_tracks": 2,
                        "tracks": {"items": [
                            {"id": "t1", "name": "I'M THAT GIRL", "artists": [], "preview_url": null, "duration_ms": 208000},
                            {"id": "t2", "name": "COZY", "artists": [], "preview_url": "https://p.scdn.co/mp3-preview/t2", "duration_ms": 210000}
                        ]}
                    }"#,
                ))
            });

        let (gateway, _) = gateway(mock_http);
        let detail = gateway.get_album("al1").await.unwrap();

        assert_eq!(detail.album.total_tracks, Some(2));
        assert_eq!(detail.total_duration_ms(), 418_000);
        for track in &detail.tracks {
            assert_eq!(track.album.as_ref().map(|a| a.id.as_str()), Some("al1"));
        }
    }

    #[tokio::test]
    async fn test_artist_albums_request_album_groups() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|request| {
                request.url
                    == "https://api.test/v1/artists/ar1/albums?market=US&limit=5&include_groups=album%2Csingle"
            })
            .returning(|_| Ok(HttpResponse::new(200, r#"{"items": []}"#)));

        let (gateway, _) = gateway(mock_http);
        assert!(gateway.get_artist_albums("ar1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_refreshes_once_and_retries() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = Sequence::new();
        mock_http
            .expect_execute()
            .withf(|request| bearer(request) == Some("Bearer token-1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(401, "")));
        mock_http
            .expect_execute()
            .withf(|request| bearer(request) == Some("Bearer token-2"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{"id": "ar1", "name": "Drake", "followers": {"total": 42}}"#,
                ))
            });

        let (gateway, exchanges) = gateway(mock_http);
        let artist = gateway.get_artist("ar1").await.unwrap();

        assert_eq!(artist.followers, 42);
        assert_eq!(exchanges.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_unauthorized_is_surfaced() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(2)
            .returning(|_| Ok(HttpResponse::new(401, "")));

        let (gateway, exchanges) = gateway(mock_http);
        let err = gateway.get_artist("ar1").await.unwrap_err();

        assert_eq!(err, CatalogError::Auth);
        assert_eq!(exchanges.load(Ordering::SeqCst), 2);
    }

    async fn top_tracks_error(outcome: BridgeResult<HttpResponse>) -> CatalogError {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .return_once(move |_| outcome);

        let (gateway, _) = gateway(mock_http);
        gateway.get_artist_top_tracks("ar1").await.unwrap_err()
    }

    #[tokio::test]
    async fn test_failures_are_not_retried() {
        assert_eq!(
            top_tracks_error(Ok(HttpResponse::new(404, ""))).await,
            CatalogError::NotFound {
                resource: "artists/ar1/top-tracks".to_string()
            }
        );
        assert_eq!(
            top_tracks_error(Ok(HttpResponse::new(429, "").with_header("Retry-After", "3"))).await,
            CatalogError::RateLimited {
                retry_after: Some(Duration::from_secs(3))
            }
        );
        assert!(matches!(
            top_tracks_error(Ok(HttpResponse::new(503, ""))).await,
            CatalogError::Transient(_)
        ));
        assert!(matches!(
            top_tracks_error(Err(BridgeError::Timeout("15s".to_string()))).await,
            CatalogError::Transient(_)
        ));
        assert!(matches!(
            top_tracks_error(Ok(HttpResponse::new(200, "{not json"))).await,
            CatalogError::Parse(_)
        ));
    }

    #[tokio::test]
    async fn test_token_failure_skips_request() {
        let exchanger = FnExchanger::new(|| {
            Box::pin(async {
                Err(CredentialExchangeError::Rejected {
                    status: 400,
                    message: "invalid_client".to_string(),
                })
            }) as BoxFuture<'static, core_auth::Result<ExchangedToken>>
        });
        let tokens = Arc::new(TokenCache::new(Arc::new(exchanger), Arc::new(SystemClock)));
        let gateway = MediaGateway::new(
            Arc::new(MockHttpClient::new()),
            tokens,
            CatalogSettings::default(),
        );

        let err = gateway.get_album_tracks("al1").await.unwrap_err();
        assert!(matches!(err, CatalogError::CredentialExchange(_)));
    }

    #[tokio::test]
    async fn test_home_feeds_use_seed_queries() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|request| request.url.contains("q=beyonce&type=album"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, ALBUM_SEARCH)));
        mock_http
            .expect_execute()
            .withf(|request| request.url.contains("q=drake&type=album"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, r#"{"albums": {"items": []}}"#)));

        let (gateway, exchanges) = gateway(mock_http);

        assert_eq!(gateway.new_releases().await.unwrap().len(), 1);
        assert!(gateway.featured().await.unwrap().is_empty());
        assert_eq!(exchanges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tracks_by_year_query() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|request| request.url.contains("q=year%3A1999&type=track"))
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{"tracks": {"items": [{"id": "t1", "name": "1999", "duration_ms": 379000}]}}"#,
                ))
            });

        let (gateway, _) = gateway(mock_http);
        let tracks = gateway.tracks_by_year(1999).await.unwrap();
        assert_eq!(tracks[0].name, "1999");
    }
}
