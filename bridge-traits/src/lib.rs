//! # Host Bridge Traits
//!
//! Capabilities the music runtime needs from its host but does not implement
//! itself.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - one-shot async HTTP used by the token
//!   exchange and the catalog gateway
//! - [`PlaybackAdapter`](playback::PlaybackAdapter) - native audio sessions bound
//!   to a preview URL
//! - [`Clock`](time::Clock) - time source, injectable for deterministic expiry tests
//! - [`LoggerSink`](time::LoggerSink) - forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate |
//! |----------|---------------------|
//! | Desktop  | `bridge-desktop` (HTTP) |
//! | Others   | injected by the host |
//!
//! The core fails fast with `CapabilityMissing` when a required bridge is
//! absent at bootstrap.
//!
//! ## Error Handling
//!
//! All bridge traits report [`BridgeError`](error::BridgeError). Implementations
//! convert platform-specific failures and keep messages actionable.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared behind `Arc`
//! across tokio tasks.

pub mod error;
pub mod http;
pub mod playback;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use playback::{
    AudioSource, PlaybackAdapter, PlaybackMetadata, PlaybackOptions, PlaybackRequest,
    PlaybackSessionId, PlaybackSignal,
};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
