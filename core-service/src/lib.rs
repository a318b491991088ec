//! Music session façade and bootstrap.
//!
//! This crate wires the host bridges (HTTP, playback, clock) into the token
//! cache, the Spotify catalog gateway and the preview player, and exposes the
//! result as a single [`MusicSession`]. Desktop hosts typically enable the
//! `desktop-shims` feature so the HTTP client defaults to `bridge-desktop`.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::MusicSession;
//!
//! let config = CoreConfig::builder()
//!     .from_env()?
//!     .playback_adapter(adapter)
//!     .build()?;
//! let session = MusicSession::bootstrap(config)?;
//! session.open_home().await;
//! ```

pub mod error;
pub mod navigation;
pub mod session;

pub use error::{CoreError, Result};
pub use navigation::{NavigationController, Page};
pub use session::{MusicSession, PageContent, PageView};

pub use core_catalog::{AlbumRef, SearchKind, SearchResults, Track};
pub use core_playback::{PlaybackState, PlayerPhase};
