//! Workspace entry crate.
//!
//! Re-exports [`core_service`] so hosts can depend on `music-session` and
//! toggle `desktop-shims` without wiring each workspace crate individually.

pub use core_service::*;
