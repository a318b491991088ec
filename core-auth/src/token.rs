use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Bearer token issued by the client-credentials grant.
///
/// Immutable once built: a refresh produces a new `Token` rather than
/// touching an existing one. The value is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    expires_at: DateTime<Utc>,
}

impl Token {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Opaque token string sent as `Authorization: Bearer <value>`.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// A token is usable strictly before its expiry instant.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
