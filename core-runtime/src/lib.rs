//! # Core Runtime Module
//!
//! Foundational infrastructure shared by the session runtime crates:
//! - Logging and tracing setup
//! - Configuration (`CoreConfig` builder)
//! - Event bus
//!
//! Every other core crate depends on this one for its conventions; nothing
//! here performs catalog or playback work itself.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
