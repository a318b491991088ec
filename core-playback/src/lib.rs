//! # Playback Module
//!
//! Preview playback on top of the host's [`PlaybackAdapter`].
//!
//! ## Overview
//!
//! This module handles:
//! - Exactly one live audio session, released before the next is acquired
//! - The `Idle → Loaded → Playing ⇄ Paused → Ended` phase machine
//! - Seek, volume persistence across tracks and a progress stream
//! - Discarding results of superseded track selections
//!
//! [`PlaybackAdapter`]: bridge_traits::playback::PlaybackAdapter

pub mod controller;
pub mod error;
pub mod state;

pub use controller::PlaybackController;
pub use error::{PlaybackError, Result};
pub use state::{PlaybackProgress, PlaybackState, PlayerPhase};
