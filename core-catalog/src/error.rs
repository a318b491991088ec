//! Error types for catalog access

use core_auth::CredentialExchangeError;
use std::time::Duration;
use thiserror::Error;

/// Catalog request failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Token rejected even after one forced refresh
    #[error("Catalog rejected the access token")]
    Auth,

    #[error("Catalog resource not found: {resource}")]
    NotFound { resource: String },

    /// Provider throttled the client
    #[error("Rate limited by catalog{}", retry_suffix(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    /// Network failure or provider-side error
    #[error("Transient catalog failure: {0}")]
    Transient(String),

    #[error("Failed to obtain access token: {0}")]
    CredentialExchange(#[from] CredentialExchangeError),

    #[error("Catalog rejected the request (status {status}): {message}")]
    BadRequest { status: u16, message: String },

    #[error("Failed to parse catalog response: {0}")]
    Parse(String),
}

impl CatalogError {
    /// Whether the same request may succeed later without changes.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::RateLimited { .. } | CatalogError::Transient(_) => true,
            CatalogError::CredentialExchange(err) => err.is_recoverable(),
            CatalogError::Auth
            | CatalogError::NotFound { .. }
            | CatalogError::BadRequest { .. }
            | CatalogError::Parse(_) => false,
        }
    }
}

fn retry_suffix(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|delay| format!(", retry after {}s", delay.as_secs()))
        .unwrap_or_default()
}

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;
