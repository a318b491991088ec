//! # Catalog Module
//!
//! Provider-neutral catalog model and the [`CatalogApi`] seam.
//!
//! ## Overview
//!
//! - Domain types: [`Track`], [`AlbumRef`], [`Artist`], [`PlaylistSummary`],
//!   [`AlbumDetail`], [`SearchResults`]
//! - [`CatalogApi`]: read operations used by page loading
//! - [`CatalogError`]: failure taxonomy shared by every provider

pub mod api;
pub mod error;
pub mod models;

pub use api::CatalogApi;
pub use error::{CatalogError, Result};
pub use models::{
    AlbumDetail, AlbumRef, Artist, ArtistRef, Image, PlaylistSummary, SearchKind, SearchResults,
    Track,
};
