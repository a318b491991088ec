use thiserror::Error;

/// Failure of a client-credentials exchange.
///
/// `Clone` so a single failed exchange can be handed to every caller that was
/// waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialExchangeError {
    #[error("Token endpoint unreachable: {0}")]
    Network(String),

    #[error("Token endpoint rejected the credentials ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

impl CredentialExchangeError {
    /// Whether retrying later could succeed without changing configuration.
    pub fn is_recoverable(&self) -> bool {
        match self {
            CredentialExchangeError::Network(_) => true,
            CredentialExchangeError::Rejected { status, .. } => *status == 429 || *status >= 500,
            CredentialExchangeError::InvalidResponse(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CredentialExchangeError>;
