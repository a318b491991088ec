//! Single-resource playback controller
//!
//! [`PlaybackController`] owns the only audio session the host is asked to
//! provision. Selecting a track releases the previous session before a new one
//! is prepared, and a prepare that completes after a newer selection is
//! released on arrival instead of being installed.
//!
//! Two locks are involved:
//! - `state` (`parking_lot`) guards the observable fields and is never held
//!   across `.await`.
//! - `lifecycle` (`tokio`) serializes adapter calls that acquire, release or
//!   drive a session.
//!
//! Every `play` bumps a generation counter before touching the adapter; any
//! step that completes for an older generation leaves the state alone.

use crate::error::{PlaybackError, Result};
use crate::state::{PlaybackProgress, PlaybackState, PlayerPhase};
use bridge_traits::error::BridgeError;
use bridge_traits::playback::{
    AudioSource, PlaybackAdapter, PlaybackMetadata, PlaybackOptions, PlaybackRequest,
    PlaybackSessionId, PlaybackSignal,
};
use core_catalog::Track;
use core_runtime::config::PlaybackSettings;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, info, instrument, warn};

/// A session acquired from the adapter, tagged with the track it plays.
struct LiveSession {
    id: PlaybackSessionId,
    track_id: String,
}

struct PlayerState {
    phase: PlayerPhase,
    track: Option<Track>,
    session: Option<LiveSession>,
    /// Sessions detached by `play`, released by the next lifecycle holder.
    retired: Vec<LiveSession>,
    position_ms: u64,
    duration_ms: u64,
    volume: f32,
}

impl PlayerState {
    fn live_id(&self) -> Option<PlaybackSessionId> {
        self.session.as_ref().map(|live| live.id)
    }

    fn progress(&self) -> PlaybackProgress {
        PlaybackProgress {
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
        }
    }
}

/// Drives one platform audio resource for the current track.
pub struct PlaybackController {
    adapter: Arc<dyn PlaybackAdapter>,
    fallback_duration_ms: u64,
    state: Mutex<PlayerState>,
    generation: AtomicU64,
    lifecycle: AsyncMutex<()>,
    progress: watch::Sender<PlaybackProgress>,
    event_bus: Option<EventBus>,
}

impl PlaybackController {
    pub fn new(adapter: Arc<dyn PlaybackAdapter>, settings: PlaybackSettings) -> Self {
        let (progress, _) = watch::channel(PlaybackProgress::default());
        let volume = if settings.initial_volume.is_finite() {
            settings.initial_volume.clamp(0.0, 1.0)
        } else {
            PlaybackSettings::default().initial_volume
        };

        Self {
            adapter,
            fallback_duration_ms: duration_ms(settings.fallback_duration),
            state: Mutex::new(PlayerState {
                phase: PlayerPhase::Idle,
                track: None,
                session: None,
                retired: Vec::new(),
                position_ms: 0,
                duration_ms: 0,
                volume,
            }),
            generation: AtomicU64::new(0),
            lifecycle: AsyncMutex::new(()),
            progress,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Makes `track` current and starts its preview.
    ///
    /// The track becomes current immediately. Without a preview URL it stays
    /// `Loaded` and nothing is acquired. Returns `Ok` when a newer `play`
    /// superseded this one.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::LoadFailed`] when the host cannot prepare or start the
    /// session; the controller is then `Idle` with the track still current.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn play(&self, track: Track) -> Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let progress = {
            let mut state = self.state.lock();
            if let Some(previous) = state.session.take() {
                state.retired.push(previous);
            }
            state.track = Some(track.clone());
            state.phase = PlayerPhase::Loaded;
            state.position_ms = 0;
            state.duration_ms = self.fallback_duration_ms;
            state.progress()
        };
        self.publish(progress);
        self.emit(PlaybackEvent::TrackLoaded {
            track_id: track.id.clone(),
            title: track.name.clone(),
            has_preview: track.has_preview(),
        });

        let _lifecycle = self.lifecycle.lock().await;
        self.release_retired().await;

        if !self.is_current(generation) {
            debug!("Superseded before load");
            return Ok(());
        }

        let Some(url) = track.preview_url.clone().filter(|url| !url.is_empty()) else {
            info!("Track has no preview");
            return Ok(());
        };

        let request = PlaybackRequest::new(AudioSource::remote(url))
            .with_options(PlaybackOptions {
                start_position: Duration::ZERO,
                initial_volume: self.state.lock().volume,
            })
            .with_metadata(metadata_for(&track));

        let session = match self.adapter.prepare(request).await {
            Ok(session) => session,
            Err(error) => return self.fail_load(generation, &track, error),
        };

        if !self.install(generation, session, &track.id) {
            debug!("Superseded during load, releasing session");
            self.unload(session).await;
            return Ok(());
        }

        let volume = self.state.lock().volume;
        if let Err(error) = self.adapter.set_volume(session, volume).await {
            warn!(error = %error, "Failed to apply volume to new session");
        }

        if let Err(error) = self.adapter.play(session).await {
            if self.detach(session) {
                self.unload(session).await;
            }
            return self.fail_load(generation, &track, error);
        }

        let started = {
            let mut state = self.state.lock();
            let live = state.live_id() == Some(session) && self.is_current(generation);
            if live {
                state.phase = PlayerPhase::Playing;
            }
            live
        };
        if started {
            info!("Playback started");
            self.emit(PlaybackEvent::Started {
                track_id: track.id.clone(),
                title: track.name.clone(),
            });
        }
        Ok(())
    }

    /// Pauses, resumes, or restarts an ended preview from the beginning.
    /// Ignored without a live session.
    #[instrument(skip(self))]
    pub async fn toggle_play_pause(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;

        let (session, track_id, phase, position_ms) = {
            let state = self.state.lock();
            match state.session.as_ref() {
                Some(live) => (live.id, live.track_id.clone(), state.phase, state.position_ms),
                None => {
                    debug!("No live session, ignoring toggle");
                    return Ok(());
                }
            }
        };

        match phase {
            PlayerPhase::Playing => {
                self.adapter.pause(session).await?;
                if self.transition(session, PlayerPhase::Paused, None) {
                    self.emit(PlaybackEvent::Paused {
                        track_id,
                        position_ms,
                    });
                }
            }
            PlayerPhase::Paused => {
                self.adapter.play(session).await?;
                if self.transition(session, PlayerPhase::Playing, None) {
                    self.emit(PlaybackEvent::Resumed {
                        track_id,
                        position_ms,
                    });
                }
            }
            PlayerPhase::Ended => {
                self.adapter.seek(session, Duration::ZERO).await?;
                self.adapter.play(session).await?;
                if self.transition(session, PlayerPhase::Playing, Some(0)) {
                    let title = self
                        .state
                        .lock()
                        .track
                        .as_ref()
                        .map(|track| track.name.clone())
                        .unwrap_or_default();
                    self.emit(PlaybackEvent::Started { track_id, title });
                }
            }
            PlayerPhase::Idle | PlayerPhase::Loaded => {
                debug!(?phase, "Nothing to toggle");
            }
        }
        Ok(())
    }

    /// Seeks to `ratio` of the duration. Only meaningful while playing or
    /// paused; the ratio is clamped to `0.0..=1.0` and non-finite values are
    /// ignored.
    #[instrument(skip(self))]
    pub async fn seek(&self, ratio: f64) -> Result<()> {
        if !ratio.is_finite() {
            debug!("Ignoring non-finite seek ratio");
            return Ok(());
        }
        let ratio = ratio.clamp(0.0, 1.0);

        let _lifecycle = self.lifecycle.lock().await;

        let (session, track_id, duration) = {
            let state = self.state.lock();
            match (state.phase, state.session.as_ref()) {
                (PlayerPhase::Playing | PlayerPhase::Paused, Some(live)) => {
                    (live.id, live.track_id.clone(), state.duration_ms)
                }
                _ => {
                    debug!(phase = ?state.phase, "Seek ignored");
                    return Ok(());
                }
            }
        };

        let position_ms = ((ratio * duration as f64).round() as u64).min(duration);
        self.adapter
            .seek(session, Duration::from_millis(position_ms))
            .await?;

        let progress = {
            let mut state = self.state.lock();
            if state.live_id() != Some(session) {
                return Ok(());
            }
            state.position_ms = position_ms;
            state.progress()
        };
        self.publish(progress);
        self.emit(PlaybackEvent::PositionChanged {
            track_id,
            position_ms,
            duration_ms: progress.duration_ms,
        });
        Ok(())
    }

    /// Sets the volume for the live session and every later one.
    ///
    /// Clamped to `0.0..=1.0`; non-finite levels are ignored.
    #[instrument(skip(self))]
    pub async fn set_volume(&self, level: f32) -> Result<()> {
        if !level.is_finite() {
            debug!("Ignoring non-finite volume");
            return Ok(());
        }
        let volume = level.clamp(0.0, 1.0);

        let session = {
            let mut state = self.state.lock();
            state.volume = volume;
            state.live_id()
        };
        self.emit(PlaybackEvent::VolumeChanged {
            volume_permille: (volume * 1000.0).round() as u16,
        });

        if let Some(session) = session {
            if let Err(error) = self.adapter.set_volume(session, volume).await {
                if self.state.lock().live_id() == Some(session) {
                    return Err(error.into());
                }
                debug!(error = %error, "Volume change raced a session release");
            }
        }
        Ok(())
    }

    /// Applies a host signal. Signals from any session other than the live
    /// one are discarded.
    pub fn handle_signal(&self, signal: PlaybackSignal) {
        let mut state = self.state.lock();
        if state.live_id() != Some(signal.session()) {
            debug!(session = %signal.session(), "Discarding signal from stale session");
            return;
        }

        let mut completed = None;
        match signal {
            PlaybackSignal::TimeUpdate {
                position, duration, ..
            } => {
                if let Some(duration) = duration.filter(|d| !d.is_zero()) {
                    state.duration_ms = duration_ms(duration);
                }
                if matches!(state.phase, PlayerPhase::Playing | PlayerPhase::Paused) {
                    state.position_ms = duration_ms(position).min(state.duration_ms);
                }
            }
            PlaybackSignal::Ended { .. } => {
                state.phase = PlayerPhase::Ended;
                state.position_ms = 0;
                completed = state.session.as_ref().map(|live| live.track_id.clone());
            }
        }

        let progress = state.progress();
        drop(state);

        self.publish(progress);
        if let Some(track_id) = completed {
            info!(track_id = %track_id, "Preview ended");
            self.emit(PlaybackEvent::Completed { track_id });
        }
    }

    /// Releases the live session and clears the current track.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let progress = {
            let mut state = self.state.lock();
            if let Some(live) = state.session.take() {
                state.retired.push(live);
            }
            state.track = None;
            state.phase = PlayerPhase::Idle;
            state.position_ms = 0;
            state.duration_ms = 0;
            state.progress()
        };
        self.publish(progress);

        let _lifecycle = self.lifecycle.lock().await;
        self.release_retired().await;
    }

    pub fn snapshot(&self) -> PlaybackState {
        let state = self.state.lock();
        PlaybackState {
            phase: state.phase,
            current_track: state.track.clone(),
            is_playing: state.phase == PlayerPhase::Playing && state.session.is_some(),
            position_ms: state.position_ms,
            duration_ms: state.duration_ms,
            volume: state.volume,
        }
    }

    /// Position stream. The receiver starts at the latest value.
    pub fn subscribe_progress(&self) -> watch::Receiver<PlaybackProgress> {
        self.progress.subscribe()
    }

    pub fn current_track(&self) -> Option<Track> {
        self.state.lock().track.clone()
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Installs `session` as live if `generation` is still the latest request.
    fn install(&self, generation: u64, session: PlaybackSessionId, track_id: &str) -> bool {
        let mut state = self.state.lock();
        if !self.is_current(generation) {
            return false;
        }
        state.session = Some(LiveSession {
            id: session,
            track_id: track_id.to_string(),
        });
        true
    }

    /// Removes `session` from the live slot. False if it was already detached.
    fn detach(&self, session: PlaybackSessionId) -> bool {
        let mut state = self.state.lock();
        if state.live_id() == Some(session) {
            state.session = None;
            true
        } else {
            false
        }
    }

    /// Moves the live session to `phase` if it is still `session`.
    fn transition(
        &self,
        session: PlaybackSessionId,
        phase: PlayerPhase,
        position_ms: Option<u64>,
    ) -> bool {
        let progress = {
            let mut state = self.state.lock();
            if state.live_id() != Some(session) {
                return false;
            }
            state.phase = phase;
            if let Some(position_ms) = position_ms {
                state.position_ms = position_ms;
            }
            state.progress()
        };
        self.publish(progress);
        true
    }

    fn fail_load(&self, generation: u64, track: &Track, error: BridgeError) -> Result<()> {
        let progress = {
            let mut state = self.state.lock();
            if !self.is_current(generation) {
                debug!(error = %error, "Ignoring load failure of superseded request");
                return Ok(());
            }
            state.phase = PlayerPhase::Idle;
            state.position_ms = 0;
            state.progress()
        };
        self.publish(progress);

        warn!(error = %error, "Failed to load track");
        self.emit(PlaybackEvent::Error {
            track_id: Some(track.id.clone()),
            message: error.to_string(),
            recoverable: error.is_transport(),
        });
        Err(PlaybackError::LoadFailed {
            track_id: track.id.clone(),
            source: error,
        })
    }

    /// Releases every detached session. Caller holds `lifecycle`.
    async fn release_retired(&self) {
        let retired = std::mem::take(&mut self.state.lock().retired);
        for live in retired {
            self.unload(live.id).await;
            self.emit(PlaybackEvent::Stopped {
                track_id: live.track_id,
            });
        }
    }

    async fn unload(&self, session: PlaybackSessionId) {
        if let Err(error) = self.adapter.unload(session).await {
            warn!(session = %session, error = %error, "Failed to release session");
        }
    }

    fn publish(&self, progress: PlaybackProgress) {
        self.progress.send_replace(progress);
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Playback(event)).ok();
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn metadata_for(track: &Track) -> PlaybackMetadata {
    let mut metadata = PlaybackMetadata {
        track_id: Some(track.id.clone()),
        title: Some(track.name.clone()),
        artist: Some(track.artist_names()).filter(|names| !names.is_empty()),
        album: track.album.as_ref().map(|album| album.name.clone()),
        ..PlaybackMetadata::default()
    };
    if let Some(cover) = track.album.as_ref().and_then(|album| album.cover()) {
        metadata
            .extra
            .insert("artwork".to_string(), cover.url.clone());
    }
    metadata
}
