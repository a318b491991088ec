use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Playback session not found: {0}")]
    UnknownSession(String),
}

impl BridgeError {
    /// Whether the failure happened before any response reached the caller.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BridgeError::Timeout(_) | BridgeError::ConnectionFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
