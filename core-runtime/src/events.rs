//! # Event Bus System
//!
//! Typed notifications from the session runtime to whoever hosts it, carried
//! over `tokio::sync::broadcast`.
//!
//! ```text
//! ┌────────────┐   emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ TokenCache ├─────────>│           ├────────────>│ Subscriber │
//! ├────────────┤          │ EventBus  │             └────────────┘
//! │ Navigation ├─────────>│ (broadcast│  subscribe  ┌────────────┐
//! ├────────────┤          │  channel) ├────────────>│ Subscriber │
//! │ Playback   ├─────────>│           │             └────────────┘
//! └────────────┘          └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Playback(PlaybackEvent::Completed {
//!         track_id: "3n3Ppam7vgaVa1iaRUc9Lp".to_string(),
//!     }))
//!     .ok();
//!
//! let received = stream.recv().await.unwrap();
//! assert!(matches!(received, CoreEvent::Playback(_)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep
//!   receiving.
//! - **`RecvError::Closed`**: every sender is gone; treat it as shutdown.
//!
//! Emitting with no subscribers returns `Err`; producers ignore it with `.ok()`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Client-credential token lifecycle
    Auth(AuthEvent),
    /// Page-stack transitions
    Navigation(NavigationEvent),
    /// Audio session lifecycle
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Navigation(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { recoverable, .. })
            | CoreEvent::Playback(PlaybackEvent::Error { recoverable, .. }) => {
                if *recoverable {
                    EventSeverity::Warning
                } else {
                    EventSeverity::Error
                }
            }
            CoreEvent::Auth(AuthEvent::TokenRefreshed { .. })
            | CoreEvent::Playback(PlaybackEvent::Started { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events emitted by the client-credentials token cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// A credential exchange started. Coalesced callers do not emit again.
    TokenRefreshing,
    /// A new token was stored.
    TokenRefreshed {
        /// Expiry of the stored token (Unix epoch seconds, skew applied).
        expires_at: i64,
    },
    /// A cached token was dropped after the catalog rejected it.
    TokenInvalidated,
    /// The credential exchange failed; every waiter received the error.
    AuthError {
        message: String,
        /// Whether a later call may succeed (network failures, 5xx).
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::TokenRefreshing => "Exchanging client credentials",
            AuthEvent::TokenRefreshed { .. } => "Access token refreshed",
            AuthEvent::TokenInvalidated => "Access token invalidated",
            AuthEvent::AuthError { .. } => "Credential exchange failed",
        }
    }
}

// ============================================================================
// Navigation Events
// ============================================================================

/// Events emitted when the current page changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum NavigationEvent {
    /// A new page became current.
    PageChanged {
        /// Page label, e.g. `album:1ATL5GLyefJaxhQzSPVrLX`.
        page: String,
        /// Back-stack depth after the transition.
        depth: usize,
        /// Visit id the page's fetches are tagged with.
        visit: u64,
        /// `true` when the transition came from back-navigation.
        back: bool,
    },
}

impl NavigationEvent {
    fn description(&self) -> &str {
        match self {
            NavigationEvent::PageChanged { back: true, .. } => "Navigated back",
            NavigationEvent::PageChanged { .. } => "Navigated to page",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to audio playback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A track became current. `has_preview` is false when nothing will play.
    TrackLoaded {
        track_id: String,
        title: String,
        has_preview: bool,
    },
    /// Playback started on a fresh session.
    Started { track_id: String, title: String },
    Paused { track_id: String, position_ms: u64 },
    Resumed { track_id: String, position_ms: u64 },
    /// The previous session was released.
    Stopped { track_id: String },
    /// Track finished playing naturally.
    Completed { track_id: String },
    /// Position changed through a seek.
    PositionChanged {
        track_id: String,
        position_ms: u64,
        duration_ms: u64,
    },
    VolumeChanged {
        /// Volume in thousandths, `0..=1000`.
        volume_permille: u16,
    },
    Error {
        track_id: Option<String>,
        message: String,
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::TrackLoaded { .. } => "Track selected",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Completed { .. } => "Track completed",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::VolumeChanged { .. } => "Volume changed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender; every `subscribe()` gets an independent
/// receiver that sees events emitted after it subscribed.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering at most `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// when nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Subscribe through an [`EventStream`].
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus};
///
/// let event_bus = EventBus::new(100);
/// let playback_only = event_bus
///     .stream()
///     .filter(|event| matches!(event, CoreEvent::Playback(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive. `None` when nothing matching is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
