//! Client-credentials exchange
//!
//! Swaps a client id/secret pair for a bearer token (RFC 6749 §4.4). The
//! [`CredentialExchanger`] trait is the seam [`TokenCache`](crate::TokenCache)
//! depends on, so tests can substitute deterministic doubles.

use crate::error::{CredentialExchangeError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpRequest};
use bytes::Bytes;
use core_runtime::config::ClientCredentials;
use futures::future::BoxFuture;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Token material returned by one exchange, before expiry is resolved
/// against a clock.
#[derive(Clone, PartialEq, Eq)]
pub struct ExchangedToken {
    pub access_token: String,
    /// Declared lifetime of the token
    pub expires_in: Duration,
}

impl ExchangedToken {
    pub fn new(access_token: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            access_token: access_token.into(),
            expires_in,
        }
    }
}

impl fmt::Debug for ExchangedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangedToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Performs one credential exchange per call.
#[async_trait]
pub trait CredentialExchanger: Send + Sync {
    async fn exchange(&self) -> Result<ExchangedToken>;
}

/// Adapts an async function into a [`CredentialExchanger`].
///
/// ```ignore
/// let exchanger = FnExchanger::new(|| {
///     Box::pin(async { Ok(ExchangedToken::new("token", Duration::from_secs(3600))) })
/// });
/// ```
pub struct FnExchanger<F> {
    exchange: F,
}

impl<F> FnExchanger<F>
where
    F: Fn() -> BoxFuture<'static, Result<ExchangedToken>> + Send + Sync,
{
    pub fn new(exchange: F) -> Self {
        Self { exchange }
    }
}

#[async_trait]
impl<F> CredentialExchanger for FnExchanger<F>
where
    F: Fn() -> BoxFuture<'static, Result<ExchangedToken>> + Send + Sync,
{
    async fn exchange(&self) -> Result<ExchangedToken> {
        (self.exchange)().await
    }
}

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// Error body returned by the token endpoint on 4xx.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchanges client credentials against an HTTP token endpoint.
pub struct ClientCredentialsExchanger {
    http_client: Arc<dyn HttpClient>,
    token_url: String,
    credentials: ClientCredentials,
}

impl ClientCredentialsExchanger {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        token_url: impl Into<String>,
        credentials: ClientCredentials,
    ) -> Self {
        Self {
            http_client,
            token_url: token_url.into(),
            credentials,
        }
    }

    fn basic_authorization(&self) -> String {
        let pair = format!(
            "{}:{}",
            self.credentials.client_id, self.credentials.client_secret
        );
        format!("Basic {}", STANDARD.encode(pair))
    }

    fn build_request(&self) -> Result<HttpRequest> {
        let encoded_body = serde_urlencoded::to_string([("grant_type", "client_credentials")])
            .map_err(|e| {
                CredentialExchangeError::InvalidResponse(format!(
                    "Failed to encode token request: {}",
                    e
                ))
            })?;

        Ok(HttpRequest::post(self.token_url.clone())
            .header("Authorization", self.basic_authorization())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Bytes::from(encoded_body)))
    }
}

#[async_trait]
impl CredentialExchanger for ClientCredentialsExchanger {
    #[instrument(skip(self), fields(client_id = %self.credentials.client_id))]
    async fn exchange(&self) -> Result<ExchangedToken> {
        let request = self.build_request()?;

        debug!("Exchanging client credentials");

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| CredentialExchangeError::Network(e.to_string()))?;

        if !response.is_success() {
            let message = match response.json::<TokenErrorResponse>() {
                Ok(body) => match body.error_description {
                    Some(description) => format!("{}: {}", body.error, description),
                    None => body.error,
                },
                Err(_) => response
                    .text()
                    .unwrap_or_else(|_| "Unable to read error response".to_string()),
            };

            warn!(status = response.status, error = %message, "Credential exchange rejected");

            return Err(CredentialExchangeError::Rejected {
                status: response.status,
                message,
            });
        }

        let body: TokenResponse = response.json().map_err(|e| {
            CredentialExchangeError::InvalidResponse(format!("Failed to parse token response: {}", e))
        })?;

        if body.access_token.is_empty() {
            return Err(CredentialExchangeError::InvalidResponse(
                "Token response carried an empty access_token".to_string(),
            ));
        }
        if let Some(token_type) = body.token_type.as_deref() {
            if !token_type.eq_ignore_ascii_case("bearer") {
                return Err(CredentialExchangeError::InvalidResponse(format!(
                    "Unsupported token type '{}'",
                    token_type
                )));
            }
        }
        if body.expires_in <= 0 {
            return Err(CredentialExchangeError::InvalidResponse(format!(
                "Token response declared non-positive lifetime {}",
                body.expires_in
            )));
        }

        debug!(expires_in = body.expires_in, "Credential exchange succeeded");

        Ok(ExchangedToken::new(
            body.access_token,
            Duration::from_secs(body.expires_in as u64),
        ))
    }
}
