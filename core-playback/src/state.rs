//! Observable playback state

use core_catalog::Track;
use serde::{Deserialize, Serialize};

/// Lifecycle phase of the current track.
///
/// `Idle → Loaded → Playing ⇄ Paused → Ended`; `play` re-enters `Loaded` from
/// any phase and load failures fall back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerPhase {
    #[default]
    Idle,
    /// A track is current but not audible: its session is being prepared, or
    /// it has no preview.
    Loaded,
    Playing,
    Paused,
    /// The preview finished; the session is kept so playback can restart.
    Ended,
}

/// Position report published on the progress channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackProgress {
    pub position_ms: u64,
    pub duration_ms: u64,
}

impl PlaybackProgress {
    /// Fraction played, `0.0..=1.0`.
    pub fn ratio(&self) -> f64 {
        if self.duration_ms == 0 {
            0.0
        } else {
            (self.position_ms as f64 / self.duration_ms as f64).clamp(0.0, 1.0)
        }
    }
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub phase: PlayerPhase,
    pub current_track: Option<Track>,
    /// True only while a live session is audible.
    pub is_playing: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub volume: f32,
}

impl PlaybackState {
    pub fn progress(&self) -> PlaybackProgress {
        PlaybackProgress {
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
        }
    }
}
