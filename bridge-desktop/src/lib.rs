//! # Desktop Bridge Implementations
//!
//! Default bridge implementations for desktop hosts (macOS, Windows, Linux).
//!
//! - `HttpClient` using `reqwest` with rustls
//!
//! Playback adapters are always injected by the host application.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use std::sync::Arc;
//!
//! let http_client = Arc::new(ReqwestHttpClient::new()?);
//! let config = CoreConfig::builder().http_client(http_client) /* ... */;
//! ```

mod http;

pub use http::ReqwestHttpClient;
