//! # Playback Error Types

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// The host could not acquire or start a session for the track.
    #[error("Failed to load track {track_id}: {source}")]
    LoadFailed {
        track_id: String,
        #[source]
        source: BridgeError,
    },

    /// A control call on the live session failed.
    #[error("Playback operation failed: {0}")]
    Adapter(#[from] BridgeError),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::LoadFailed { source, .. } | PlaybackError::Adapter(source) => {
                source.is_transport()
            }
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
