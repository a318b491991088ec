//! # Core Configuration Module
//!
//! Builder-based configuration for the music session runtime.
//!
//! ## Overview
//!
//! [`CoreConfig`] carries the client credentials, catalog and playback
//! settings, and every host bridge the runtime needs. The builder fails fast:
//! a missing required bridge produces [`Error::CapabilityMissing`] with an
//! actionable message, and out-of-range settings produce [`Error::Config`].
//!
//! ## Required Dependencies
//!
//! - `PlaybackAdapter` - native audio sessions
//! - Client credentials (id + secret) for the catalog's token endpoint
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `HttpClient` - desktop default: reqwest (`desktop-shims` feature)
//! - `Clock` - default: [`SystemClock`]
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{ClientCredentials, CoreConfig};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .credentials(ClientCredentials::new("client-id", "client-secret"))
//!     .playback_adapter(Arc::new(MyAudioEngine::new()))
//!     .market("GB")
//!     .build()?;
//! ```
//!
//! Credentials can also come from the environment (`SPOTIFY_CLIENT_ID`,
//! `SPOTIFY_CLIENT_SECRET`, optional `SPOTIFY_MARKET`):
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .from_env()?
//!     .playback_adapter(adapter)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, HttpClient, PlaybackAdapter, SystemClock};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const ENV_CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET";
pub const ENV_MARKET: &str = "SPOTIFY_MARKET";

pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Client id/secret pair for the client-credentials grant.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Config("Client id cannot be empty".to_string()));
        }
        if self.client_secret.trim().is_empty() {
            return Err(Error::Config("Client secret cannot be empty".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Catalog endpoint and query settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSettings {
    /// Base URL every catalog path is appended to
    pub api_base_url: String,
    /// Client-credentials token endpoint
    pub token_url: String,
    /// ISO 3166-1 alpha-2 market code sent with market-aware queries
    pub market: String,
    /// Result limit for search and list endpoints
    pub result_limit: u32,
    /// Album search seeding the home page's new-releases shelf
    pub new_releases_query: String,
    /// Album search seeding the home page's featured shelf
    pub featured_query: String,
    /// Subtracted from a token's declared lifetime when it is stored
    pub token_expiry_skew: Duration,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            market: "US".to_string(),
            result_limit: 5,
            new_releases_query: "beyonce".to_string(),
            featured_query: "drake".to_string(),
            token_expiry_skew: Duration::from_secs(5),
        }
    }
}

impl CatalogSettings {
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [("API base URL", &self.api_base_url), ("Token URL", &self.token_url)] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(Error::Config(format!(
                    "{} must be an absolute http(s) URL, got '{}'",
                    name, url
                )));
            }
        }

        if self.market.len() != 2 || !self.market.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(Error::Config(format!(
                "Market must be a two-letter uppercase country code, got '{}'",
                self.market
            )));
        }

        // The catalog caps list endpoints at 50 items.
        if !(1..=50).contains(&self.result_limit) {
            return Err(Error::Config(
                "Result limit must be between 1 and 50".to_string(),
            ));
        }

        if self.token_expiry_skew > Duration::from_secs(300) {
            return Err(Error::Config(
                "Token expiry skew exceeds maximum of 5 minutes".to_string(),
            ));
        }

        Ok(())
    }
}

/// Playback defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSettings {
    /// Volume applied to the first session, `0.0..=1.0`
    pub initial_volume: f32,
    /// Duration assumed for a preview until the resource reports its own
    pub fallback_duration: Duration,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            initial_volume: 0.7,
            fallback_duration: Duration::from_secs(30),
        }
    }
}

impl PlaybackSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.initial_volume.is_finite() || !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(Error::Config(
                "Initial volume must be within 0.0..=1.0".to_string(),
            ));
        }
        if self.fallback_duration.is_zero() {
            return Err(Error::Config(
                "Fallback duration must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Core configuration for the music session runtime.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    pub credentials: ClientCredentials,
    pub catalog: CatalogSettings,
    pub playback: PlaybackSettings,
    /// Buffer size of the event bus channel
    pub event_buffer_size: usize,
    pub http_client: Arc<dyn HttpClient>,
    pub clock: Arc<dyn Clock>,
    pub playback_adapter: Arc<dyn PlaybackAdapter>,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("credentials", &self.credentials)
            .field("catalog", &self.catalog)
            .field("playback", &self.playback)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("http_client", &"HttpClient { ... }")
            .field("clock", &"Clock { ... }")
            .field("playback_adapter", &"PlaybackAdapter { ... }")
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates settings that do not depend on injected bridges.
    pub fn validate(&self) -> Result<()> {
        self.credentials.validate()?;
        self.catalog.validate()?;
        self.playback.validate()?;

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn playback_adapter_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "PlaybackAdapter".to_string(),
        message: "A PlaybackAdapter is required to play previews. \
                 Inject the host audio engine with .playback_adapter()."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new().map_err(|e| {
        Error::Internal(format!("Failed to initialize default HttpClient: {}", e))
    })?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Mobile/Web: inject a platform-native adapter with .http_client()."
            .to_string(),
    })
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    credentials: Option<ClientCredentials>,
    catalog: CatalogSettings,
    playback: PlaybackSettings,
    event_buffer_size: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    clock: Option<Arc<dyn Clock>>,
    playback_adapter: Option<Arc<dyn PlaybackAdapter>>,
}

impl CoreConfigBuilder {
    pub fn credentials(mut self, credentials: ClientCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Read credentials (and optionally the market) from the process environment.
    pub fn from_env(self) -> Result<Self> {
        self.from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let client_id = lookup(ENV_CLIENT_ID).ok_or(Error::MissingEnv {
            name: ENV_CLIENT_ID,
        })?;
        let client_secret = lookup(ENV_CLIENT_SECRET).ok_or(Error::MissingEnv {
            name: ENV_CLIENT_SECRET,
        })?;

        self.credentials = Some(ClientCredentials::new(client_id, client_secret));
        if let Some(market) = lookup(ENV_MARKET) {
            self.catalog.market = market;
        }
        Ok(self)
    }

    pub fn catalog(mut self, catalog: CatalogSettings) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.catalog.api_base_url = url.into();
        self
    }

    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.catalog.token_url = url.into();
        self
    }

    pub fn market(mut self, market: impl Into<String>) -> Self {
        self.catalog.market = market.into();
        self
    }

    pub fn result_limit(mut self, limit: u32) -> Self {
        self.catalog.result_limit = limit;
        self
    }

    pub fn token_expiry_skew(mut self, skew: Duration) -> Self {
        self.catalog.token_expiry_skew = skew;
        self
    }

    pub fn playback(mut self, playback: PlaybackSettings) -> Self {
        self.playback = playback;
        self
    }

    pub fn initial_volume(mut self, volume: f32) -> Self {
        self.playback.initial_volume = volume;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// If not provided, the reqwest client is used when `desktop-shims` is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn playback_adapter(mut self, adapter: Arc<dyn PlaybackAdapter>) -> Self {
        self.playback_adapter = Some(adapter);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when credentials are missing or a setting is out of range
    /// - [`Error::CapabilityMissing`] when a required bridge was not injected
    pub fn build(self) -> Result<CoreConfig> {
        let credentials = self.credentials.ok_or_else(|| {
            Error::Config(
                "Client credentials are required. Use .credentials() or .from_env().".to_string(),
            )
        })?;

        let playback_adapter = self
            .playback_adapter
            .ok_or_else(playback_adapter_missing_error)?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        let config = CoreConfig {
            credentials,
            catalog: self.catalog,
            playback: self.playback,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            http_client,
            clock,
            playback_adapter,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{HttpRequest, HttpResponse, PlaybackRequest, PlaybackSessionId};
    use std::collections::HashMap;

    struct MockHttpClient;

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Ok(HttpResponse::new(200, "{}"))
        }
    }

    struct MockPlaybackAdapter;

    #[async_trait]
    impl PlaybackAdapter for MockPlaybackAdapter {
        async fn prepare(&self, _request: PlaybackRequest) -> BridgeResult<PlaybackSessionId> {
            Ok(PlaybackSessionId::new())
        }
        async fn play(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
            Ok(())
        }
        async fn pause(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
            Ok(())
        }
        async fn seek(&self, _session: PlaybackSessionId, _position: Duration) -> BridgeResult<()> {
            Ok(())
        }
        async fn set_volume(&self, _session: PlaybackSessionId, _volume: f32) -> BridgeResult<()> {
            Ok(())
        }
        async fn unload(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
            Ok(())
        }
    }

    fn complete_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .credentials(ClientCredentials::new("id", "secret"))
            .http_client(Arc::new(MockHttpClient))
            .playback_adapter(Arc::new(MockPlaybackAdapter))
    }

    #[test]
    fn test_build_with_defaults() {
        let config = complete_builder().build().unwrap();

        assert_eq!(config.catalog.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.catalog.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(config.catalog.market, "US");
        assert_eq!(config.catalog.result_limit, 5);
        assert_eq!(config.catalog.token_expiry_skew, Duration::from_secs(5));
        assert_eq!(config.playback.initial_volume, 0.7);
        assert_eq!(config.playback.fallback_duration, Duration::from_secs(30));
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
    }

    #[test]
    fn test_builder_requires_credentials() {
        let result = CoreConfig::builder()
            .http_client(Arc::new(MockHttpClient))
            .playback_adapter(Arc::new(MockPlaybackAdapter))
            .build();

        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("credentials")),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_builder_requires_playback_adapter() {
        let result = CoreConfig::builder()
            .credentials(ClientCredentials::new("id", "secret"))
            .http_client(Arc::new(MockHttpClient))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "PlaybackAdapter")
            }
            other => panic!("expected missing capability, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_http_client_required_without_desktop_shims() {
        let result = CoreConfig::builder()
            .credentials(ClientCredentials::new("id", "secret"))
            .playback_adapter(Arc::new(MockPlaybackAdapter))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "HttpClient"
        ));
    }

    #[test]
    fn test_rejects_out_of_range_settings() {
        assert!(complete_builder().initial_volume(1.5).build().is_err());
        assert!(complete_builder().initial_volume(f32::NAN).build().is_err());
        assert!(complete_builder().result_limit(0).build().is_err());
        assert!(complete_builder().result_limit(51).build().is_err());
        assert!(complete_builder().market("usa").build().is_err());
        assert!(complete_builder().api_base_url("api.spotify.com").build().is_err());
        assert!(complete_builder().event_buffer_size(0).build().is_err());
        assert!(complete_builder()
            .token_expiry_skew(Duration::from_secs(600))
            .build()
            .is_err());
    }

    #[test]
    fn test_rejects_blank_credentials() {
        let result = complete_builder()
            .credentials(ClientCredentials::new("  ", "secret"))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_credentials_from_lookup() {
        let env: HashMap<&str, &str> = [
            (ENV_CLIENT_ID, "env-id"),
            (ENV_CLIENT_SECRET, "env-secret"),
            (ENV_MARKET, "SE"),
        ]
        .into_iter()
        .collect();

        let config = CoreConfig::builder()
            .from_lookup(|key| env.get(key).map(|v| v.to_string()))
            .unwrap()
            .http_client(Arc::new(MockHttpClient))
            .playback_adapter(Arc::new(MockPlaybackAdapter))
            .build()
            .unwrap();

        assert_eq!(config.credentials, ClientCredentials::new("env-id", "env-secret"));
        assert_eq!(config.catalog.market, "SE");
    }

    #[test]
    fn test_missing_env_secret_is_reported() {
        let result = CoreConfig::builder().from_lookup(|key| {
            (key == ENV_CLIENT_ID).then(|| "only-id".to_string())
        });

        match result {
            Err(Error::MissingEnv { name }) => assert_eq!(name, ENV_CLIENT_SECRET),
            Ok(_) => panic!("expected missing secret"),
            Err(other) => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = complete_builder()
            .credentials(ClientCredentials::new("visible-id", "hidden-secret"))
            .build()
            .unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("visible-id"));
        assert!(!debug.contains("hidden-secret"));
    }
}
