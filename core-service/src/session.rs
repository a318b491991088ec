//! Music session
//!
//! [`MusicSession`] ties navigation, catalog fetches and playback together.
//! Each transition replaces the page view with a `Loading` placeholder tagged
//! by the new visit id, then fetches. A fetch result is applied only if the
//! view still carries the visit and request it was issued for; anything else
//! is a late response for a page the user left and is dropped.

use crate::error::Result;
use crate::navigation::{NavigationController, Page};
use bridge_traits::playback::PlaybackSignal;
use core_auth::{ClientCredentialsExchanger, TokenCache};
use core_catalog::{
    AlbumDetail, AlbumRef, Artist, CatalogApi, CatalogError, SearchKind, SearchResults, Track,
};
use core_playback::{PlaybackController, PlaybackState};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, NavigationEvent};
use futures::future::{try_join, try_join3};
use parking_lot::Mutex;
use provider_spotify::MediaGateway;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// What a page currently shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PageContent {
    Loading,
    Home {
        new_releases: Vec<AlbumRef>,
        featured: Vec<AlbumRef>,
    },
    /// `results` is `None` until a search for `query` completes.
    Search {
        kind: SearchKind,
        query: Option<String>,
        results: Option<SearchResults>,
    },
    Album(AlbumDetail),
    Artist {
        artist: Artist,
        albums: Vec<AlbumRef>,
        top_tracks: Vec<Track>,
    },
    Failed {
        message: String,
        retryable: bool,
    },
}

impl PageContent {
    fn failed(error: &CatalogError) -> Self {
        PageContent::Failed {
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }

    fn empty_search(kind: SearchKind) -> Self {
        PageContent::Search {
            kind,
            query: None,
            results: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView {
    pub visit: u64,
    pub page: Page,
    pub content: PageContent,
}

struct SessionState {
    navigation: NavigationController,
    view: PageView,
    search_kind: SearchKind,
    /// Query of the latest search on the current visit, kept through failures.
    last_query: Option<String>,
    /// Bumped by every fetch; only the latest may write the view.
    request: u64,
}

/// Ticket identifying one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FetchTicket {
    visit: u64,
    request: u64,
}

/// A browsing and listening session.
///
/// # Example
///
/// ```ignore
/// let session = MusicSession::bootstrap(config)?;
/// session.open_home().await;
/// session.open_search().await;
/// session.search("renaissance", SearchKind::Album).await;
/// ```
pub struct MusicSession {
    catalog: Arc<dyn CatalogApi>,
    playback: Arc<PlaybackController>,
    state: Mutex<SessionState>,
    event_bus: EventBus,
}

impl MusicSession {
    /// Starts on the home page with its content not yet loaded.
    pub fn new(
        catalog: Arc<dyn CatalogApi>,
        playback: Arc<PlaybackController>,
        event_bus: EventBus,
    ) -> Self {
        let navigation = NavigationController::new();
        let view = PageView {
            visit: navigation.visit(),
            page: navigation.current_page().clone(),
            content: PageContent::Loading,
        };

        Self {
            catalog,
            playback,
            state: Mutex::new(SessionState {
                navigation,
                view,
                search_kind: SearchKind::default(),
                last_query: None,
                request: 0,
            }),
            event_bus,
        }
    }

    /// Wires the Spotify gateway, token cache and playback controller from a
    /// validated configuration.
    pub fn bootstrap(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);

        let exchanger = Arc::new(ClientCredentialsExchanger::new(
            Arc::clone(&config.http_client),
            config.catalog.token_url.clone(),
            config.credentials.clone(),
        ));
        let tokens = Arc::new(
            TokenCache::new(exchanger, Arc::clone(&config.clock))
                .with_expiry_skew(config.catalog.token_expiry_skew)
                .with_event_bus(event_bus.clone()),
        );
        let gateway = Arc::new(MediaGateway::new(
            Arc::clone(&config.http_client),
            tokens,
            config.catalog.clone(),
        ));
        let playback = Arc::new(
            PlaybackController::new(Arc::clone(&config.playback_adapter), config.playback)
                .with_event_bus(event_bus.clone()),
        );

        info!(market = %config.catalog.market, "Music session ready");
        Ok(Self::new(gateway, playback, event_bus))
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub async fn open_home(&self) {
        self.navigate(Page::Home).await;
    }

    pub async fn open_search(&self) {
        self.navigate(Page::Search).await;
    }

    pub async fn open_album(&self, album: AlbumRef) {
        self.navigate(Page::Album(album)).await;
    }

    pub async fn open_artist(&self, artist_id: impl Into<String>) {
        self.navigate(Page::Artist(artist_id.into())).await;
    }

    /// Returns to the previous page and reloads it. `false` when there is
    /// nothing to go back to.
    pub async fn go_back(&self) -> bool {
        match self.transition(true, |nav| nav.go_back().then_some(())) {
            Some((page, ticket)) => {
                self.load(page, ticket).await;
                true
            }
            None => false,
        }
    }

    /// Fetches the current page again. On the search page the last query is
    /// repeated.
    pub async fn refresh_current_page(&self) {
        let (page, ticket, last_query) = {
            let mut state = self.state.lock();
            let page = state.navigation.current_page().clone();
            if page == Page::Search {
                (page, None, state.last_query.clone())
            } else {
                state.view.content = PageContent::Loading;
                let ticket = Self::next_ticket(&mut state);
                (page, Some(ticket), None)
            }
        };

        match (ticket, last_query) {
            (Some(ticket), _) => self.load(page, ticket).await,
            (None, Some(query)) => {
                let kind = self.state.lock().search_kind;
                self.search(&query, kind).await;
            }
            (None, None) => debug!("No search to repeat"),
        }
    }

    pub fn current_page(&self) -> Page {
        self.state.lock().navigation.current_page().clone()
    }

    pub fn page_view(&self) -> PageView {
        self.state.lock().view.clone()
    }

    pub fn can_go_back(&self) -> bool {
        self.state.lock().navigation.can_go_back()
    }

    /// Back stack, oldest first.
    pub fn history(&self) -> Vec<Page> {
        self.state.lock().navigation.history().to_vec()
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Searches from the search page. Ignored elsewhere and for blank
    /// queries; a kind different from the active one clears previous results.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, kind: SearchKind) {
        let query = query.trim();
        let ticket = {
            let mut state = self.state.lock();
            if *state.navigation.current_page() != Page::Search {
                debug!("Not on the search page, ignoring search");
                return;
            }
            if state.search_kind != kind {
                Self::switch_search_kind(&mut state, kind);
            }
            if query.is_empty() {
                return;
            }
            state.last_query = Some(query.to_string());
            state.view.content = PageContent::Search {
                kind,
                query: Some(query.to_string()),
                results: None,
            };
            Self::next_ticket(&mut state)
        };

        let content = match self.catalog.search(query, kind).await {
            Ok(results) => PageContent::Search {
                kind,
                query: Some(query.to_string()),
                results: Some(results),
            },
            Err(error) => {
                warn!(error = %error, "Search failed");
                PageContent::failed(&error)
            }
        };
        self.apply(ticket, content);
    }

    /// Changes the active search kind, clearing results and discarding any
    /// search still in flight.
    pub fn set_search_kind(&self, kind: SearchKind) {
        let mut state = self.state.lock();
        if state.search_kind != kind {
            Self::switch_search_kind(&mut state, kind);
        }
    }

    pub fn search_kind(&self) -> SearchKind {
        self.state.lock().search_kind
    }

    /// Tracks released in `year`, outside of page navigation.
    pub async fn tracks_by_year(&self, year: u16) -> Result<Vec<Track>> {
        Ok(self.catalog.tracks_by_year(year).await?)
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    /// Plays `track`. On failure the player is idle with the track kept.
    pub async fn select_track(&self, track: Track) -> Result<()> {
        self.playback.play(track).await?;
        Ok(())
    }

    pub fn playback(&self) -> Arc<PlaybackController> {
        Arc::clone(&self.playback)
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.snapshot()
    }

    /// Forwards host playback signals to the controller until the sender is
    /// dropped.
    pub fn spawn_signal_pump(&self, mut signals: mpsc::Receiver<PlaybackSignal>) -> JoinHandle<()> {
        let playback = Arc::clone(&self.playback);
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                playback.handle_signal(signal);
            }
            debug!("Playback signal channel closed");
        })
    }

    /// Releases the audio session.
    pub async fn shutdown(&self) {
        self.playback.stop().await;
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn events(&self) -> EventStream {
        self.event_bus.stream()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn navigate(&self, next: Page) {
        if let Some((page, ticket)) = self.transition(false, |nav| {
            nav.navigate(next);
            Some(())
        }) {
            self.load(page, ticket).await;
        }
    }

    /// Applies a navigation change and resets the view for the new page.
    fn transition(
        &self,
        back: bool,
        change: impl FnOnce(&mut NavigationController) -> Option<()>,
    ) -> Option<(Page, FetchTicket)> {
        let mut state = self.state.lock();
        change(&mut state.navigation)?;

        let page = state.navigation.current_page().clone();
        let visit = state.navigation.visit();
        let depth = state.navigation.depth();
        let content = match page {
            Page::Search => PageContent::empty_search(state.search_kind),
            _ => PageContent::Loading,
        };
        state.view = PageView {
            visit,
            page: page.clone(),
            content,
        };
        state.last_query = None;
        let ticket = Self::next_ticket(&mut state);
        drop(state);

        let label = page.label();
        info!(page = %label, depth, visit, back, "Page changed");
        self.event_bus
            .emit(CoreEvent::Navigation(NavigationEvent::PageChanged {
                page: label,
                depth,
                visit,
                back,
            }))
            .ok();

        Some((page, ticket))
    }

    #[instrument(skip(self, page), fields(page = %page.label(), visit = ticket.visit))]
    async fn load(&self, page: Page, ticket: FetchTicket) {
        let result = match &page {
            Page::Home => try_join(self.catalog.new_releases(), self.catalog.featured())
                .await
                .map(|(new_releases, featured)| PageContent::Home {
                    new_releases,
                    featured,
                }),
            Page::Search => return,
            Page::Album(album) => self
                .catalog
                .get_album(&album.id)
                .await
                .map(PageContent::Album),
            Page::Artist(artist_id) => try_join3(
                self.catalog.get_artist(artist_id),
                self.catalog.get_artist_albums(artist_id),
                self.catalog.get_artist_top_tracks(artist_id),
            )
            .await
            .map(|(artist, albums, top_tracks)| PageContent::Artist {
                artist,
                albums,
                top_tracks,
            }),
        };

        let content = result.unwrap_or_else(|error| {
            warn!(error = %error, "Failed to load page");
            PageContent::failed(&error)
        });
        self.apply(ticket, content);
    }

    /// Writes `content` if `ticket` is still the latest fetch for the
    /// current visit.
    fn apply(&self, ticket: FetchTicket, content: PageContent) -> bool {
        let mut state = self.state.lock();
        if state.view.visit != ticket.visit || state.request != ticket.request {
            debug!(
                visit = ticket.visit,
                current_visit = state.view.visit,
                "Discarding stale page content"
            );
            return false;
        }
        state.view.content = content;
        true
    }

    fn next_ticket(state: &mut SessionState) -> FetchTicket {
        state.request += 1;
        FetchTicket {
            visit: state.view.visit,
            request: state.request,
        }
    }

    fn switch_search_kind(state: &mut SessionState, kind: SearchKind) {
        state.search_kind = kind;
        state.last_query = None;
        if state.view.page == Page::Search {
            state.view.content = PageContent::empty_search(kind);
            state.request += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::playback::{PlaybackAdapter, PlaybackRequest, PlaybackSessionId};
    use core_runtime::config::PlaybackSettings;
    use mockall::mock;
    use std::time::Duration;

    mock! {
        Catalog {}

        #[async_trait]
        impl CatalogApi for Catalog {
            async fn search(&self, query: &str, kind: SearchKind) -> core_catalog::Result<SearchResults>;
            async fn get_album(&self, album_id: &str) -> core_catalog::Result<AlbumDetail>;
            async fn get_artist(&self, artist_id: &str) -> core_catalog::Result<Artist>;
            async fn get_artist_albums(&self, artist_id: &str) -> core_catalog::Result<Vec<AlbumRef>>;
            async fn get_album_tracks(&self, album_id: &str) -> core_catalog::Result<Vec<Track>>;
            async fn get_artist_top_tracks(&self, artist_id: &str) -> core_catalog::Result<Vec<Track>>;
            async fn new_releases(&self) -> core_catalog::Result<Vec<AlbumRef>>;
            async fn featured(&self) -> core_catalog::Result<Vec<AlbumRef>>;
            async fn tracks_by_year(&self, year: u16) -> core_catalog::Result<Vec<Track>>;
        }
    }

    mock! {
        Adapter {}

        #[async_trait]
        impl PlaybackAdapter for Adapter {
            async fn prepare(&self, request: PlaybackRequest) -> BridgeResult<PlaybackSessionId>;
            async fn play(&self, session: PlaybackSessionId) -> BridgeResult<()>;
            async fn pause(&self, session: PlaybackSessionId) -> BridgeResult<()>;
            async fn seek(&self, session: PlaybackSessionId, position: Duration) -> BridgeResult<()>;
            async fn set_volume(&self, session: PlaybackSessionId, volume: f32) -> BridgeResult<()>;
            async fn unload(&self, session: PlaybackSessionId) -> BridgeResult<()>;
        }
    }

    fn session(catalog: MockCatalog) -> MusicSession {
        let playback = PlaybackController::new(
            Arc::new(MockAdapter::new()),
            PlaybackSettings::default(),
        );
        MusicSession::new(Arc::new(catalog), Arc::new(playback), EventBus::new(8))
    }

    #[tokio::test]
    async fn home_shelf_error_fails_whole_page() {
        let mut catalog = MockCatalog::new();
        catalog.expect_new_releases().returning(|| Ok(vec![]));
        catalog
            .expect_featured()
            .returning(|| Err(CatalogError::RateLimited { retry_after: None }));

        let session = session(catalog);
        session.open_home().await;

        match session.page_view().content {
            PageContent::Failed { retryable, .. } => assert!(retryable),
            other => panic!("unexpected content {:?}", other),
        }
    }

    #[tokio::test]
    async fn album_page_requests_album_by_id() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_get_album()
            .withf(|id| id == "al9")
            .times(1)
            .returning(|id| Err(CatalogError::NotFound {
                resource: format!("album {}", id),
            }));

        let session = session(catalog);
        session
            .open_album(AlbumRef {
                id: "al9".to_string(),
                name: "Lost".to_string(),
                images: vec![],
                artists: vec![],
                release_date: None,
                total_tracks: None,
            })
            .await;

        let view = session.page_view();
        assert_eq!(view.visit, 1);
        match view.content {
            PageContent::Failed { retryable, .. } => assert!(!retryable),
            other => panic!("unexpected content {:?}", other),
        }
    }

    #[test]
    fn stale_ticket_is_rejected() {
        let session = session(MockCatalog::new());
        let ticket = {
            let mut state = session.state.lock();
            MusicSession::next_ticket(&mut state)
        };
        let newer = {
            let mut state = session.state.lock();
            MusicSession::next_ticket(&mut state)
        };

        assert!(!session.apply(ticket, PageContent::Loading));
        assert!(session.apply(
            newer,
            PageContent::Failed {
                message: "x".to_string(),
                retryable: false,
            }
        ));
    }
}
