//! # Spotify Provider
//!
//! Implements `CatalogApi` for the Spotify Web API v1.
//!
//! ## Overview
//!
//! This module provides:
//! - Bearer-authenticated catalog reads using client-credentials tokens
//! - Search across tracks, albums, artists and playlists
//! - Album, artist, discography and top-track lookups
//! - One forced token refresh on `401`, typed errors for everything else

mod error;
pub mod gateway;
pub mod types;

pub use gateway::MediaGateway;
