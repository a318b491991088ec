//! Playback bridge traits.
//!
//! The core never decodes audio. It asks the host for a playback session bound
//! to a preview URL and drives it through [`PlaybackAdapter`]; the host reports
//! progress and end-of-media back as [`PlaybackSignal`]s.

use crate::error::Result;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// High-level audio source descriptor provided to playback adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Remote HTTP(S) stream to be fetched by the host.
    RemoteStream {
        url: String,
        headers: HashMap<String, String>,
    },
}

impl AudioSource {
    pub fn remote(url: impl Into<String>) -> Self {
        AudioSource::RemoteStream {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            AudioSource::RemoteStream { url, .. } => url,
        }
    }
}

/// Additional playback options supplied alongside a request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackOptions {
    /// Initial playback position (defaults to start of stream).
    pub start_position: Duration,
    /// Initial volume (0.0 = muted, 1.0 = unity gain).
    pub initial_volume: f32,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            start_position: Duration::from_secs(0),
            initial_volume: 1.0,
        }
    }
}

/// Unique identifier for playback sessions managed by a host adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackSessionId(Uuid);

impl PlaybackSessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlaybackSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlaybackSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Metadata the host may surface in media sessions or notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackMetadata {
    pub track_id: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Artwork URI and similar extras.
    pub extra: HashMap<String, String>,
}

/// Request describing the playback session a host adapter should provision.
#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    pub source: AudioSource,
    pub options: PlaybackOptions,
    pub metadata: PlaybackMetadata,
}

impl PlaybackRequest {
    pub fn new(source: AudioSource) -> Self {
        Self {
            source,
            options: PlaybackOptions::default(),
            metadata: PlaybackMetadata::default(),
        }
    }

    pub fn with_options(mut self, options: PlaybackOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_metadata(mut self, metadata: PlaybackMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Notifications a host emits for a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackSignal {
    /// Periodic position report at the resource's natural tick rate.
    /// `duration` is `None` until the resource knows its length.
    TimeUpdate {
        session: PlaybackSessionId,
        position: Duration,
        duration: Option<Duration>,
    },
    /// The resource reached the end of media.
    Ended { session: PlaybackSessionId },
}

impl PlaybackSignal {
    pub fn session(&self) -> PlaybackSessionId {
        match self {
            PlaybackSignal::TimeUpdate { session, .. } | PlaybackSignal::Ended { session } => {
                *session
            }
        }
    }
}

/// Trait for platform-specific playback adapters that drive native audio engines.
#[async_trait::async_trait]
pub trait PlaybackAdapter: Send + Sync {
    /// Acquire a playback session bound to the request's source. Returns the
    /// identifier subsequent control calls reference.
    async fn prepare(&self, request: PlaybackRequest) -> Result<PlaybackSessionId>;

    /// Begin or resume playback for the provided session.
    async fn play(&self, session: PlaybackSessionId) -> Result<()>;

    /// Pause playback without releasing the session.
    async fn pause(&self, session: PlaybackSessionId) -> Result<()>;

    /// Seek to an absolute position within the stream.
    async fn seek(&self, session: PlaybackSessionId, position: Duration) -> Result<()>;

    /// Adjust playback volume. Volume is normalized to `0.0..=1.0`.
    async fn set_volume(&self, session: PlaybackSessionId, volume: f32) -> Result<()>;

    /// Release every resource held by the session. The session id is dead afterwards.
    async fn unload(&self, session: PlaybackSessionId) -> Result<()>;
}
