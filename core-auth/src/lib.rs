//! # Authentication Module
//!
//! Application-level access to the catalog API via the OAuth 2.0
//! client-credentials grant.
//!
//! ## Overview
//!
//! - [`ClientCredentialsExchanger`] swaps the configured client id/secret for
//!   a bearer token at the token endpoint.
//! - [`TokenCache`] keeps the current [`Token`], serves it while it is valid
//!   and coalesces concurrent refreshes into a single exchange.
//! - [`CredentialExchanger`] and [`Clock`](bridge_traits::time::Clock) are
//!   injected, so expiry and coalescing are testable without a network or
//!   real time.

pub mod cache;
pub mod error;
pub mod exchange;
pub mod token;

pub use cache::{TokenCache, DEFAULT_EXPIRY_SKEW};
pub use error::{CredentialExchangeError, Result};
pub use exchange::{ClientCredentialsExchanger, CredentialExchanger, ExchangedToken, FnExchanger};
pub use token::Token;
