//! Event types for the Sonhário event system
//!
//! The engines broadcast [`SessionEvent`]s on an [`EventBus`] so the host
//! page (or the CLI) can follow preload progress, channel activity and the
//! end of playback without reaching into engine state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Engine lifecycle state, as seen by the UI surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// No session; controls show the start button
    Idle,
    /// Resolving the score's media
    Preloading,
    /// Preload finished; decorative transition before playback
    TransitionIn,
    /// Frame loop is driving the session
    Playing,
}

/// Channel kind tag carried by events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelTag {
    Image,
    Video,
    AmbientAudio,
    SpectralAudio,
}

/// Phase of a spectral (voice) appearance in the remix engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectralPhase {
    Idle,
    FadingIn,
    Peak,
    FadingOut,
}

/// Sonhário session events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// Materials pool fetched from the repository
    MaterialsLoaded {
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// The materials pool could not be fetched; no session can start
    MaterialsUnavailable {
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A score was generated for a new session
    ScoreGenerated {
        session_id: Uuid,
        duration: f64,
        accel_start: f64,
        channel_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// One preload item settled (loaded, failed or timed out)
    PreloadProgress {
        session_id: Uuid,
        loaded: usize,
        total: usize,
    },

    /// Every preload item settled
    PreloadComplete {
        session_id: Uuid,
        failed: usize,
        timed_out: usize,
        timestamp: DateTime<Utc>,
    },

    /// A resource could not be loaded (non-fatal)
    LoadFailed {
        url: String,
        reason: String,
    },

    /// Engine state transition
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: DateTime<Utc>,
    },

    /// A channel's entry time elapsed
    ChannelEntered {
        session_id: Uuid,
        channel_index: usize,
        channel: ChannelTag,
        elapsed: f64,
    },

    /// An audio channel handed off to the next pool member
    AudioChainAdvanced {
        session_id: Uuid,
        channel_index: usize,
        member: usize,
    },

    /// Stepped media acceleration changed the playback rate
    AccelerationStep {
        session_id: Uuid,
        steps: u32,
        playback_rate: f64,
    },

    /// Double-buffer background video swapped buffers
    VideoSwapped {
        material_id: Option<String>,
    },

    /// A/B ambient crossfade started
    CrossfadeStarted {
        from_slot: char,
        to_slot: char,
    },

    /// Spectral appearance changed phase
    SpectralPhaseChanged {
        phase: SpectralPhase,
    },

    /// Session terminated abruptly at its scheduled end (or by stop)
    HardCut {
        session_id: Uuid,
        elapsed: f64,
        timestamp: DateTime<Utc>,
    },
}

impl SessionEvent {
    /// Event type name (matches the serde tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::MaterialsLoaded { .. } => "MaterialsLoaded",
            SessionEvent::MaterialsUnavailable { .. } => "MaterialsUnavailable",
            SessionEvent::ScoreGenerated { .. } => "ScoreGenerated",
            SessionEvent::PreloadProgress { .. } => "PreloadProgress",
            SessionEvent::PreloadComplete { .. } => "PreloadComplete",
            SessionEvent::LoadFailed { .. } => "LoadFailed",
            SessionEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            SessionEvent::ChannelEntered { .. } => "ChannelEntered",
            SessionEvent::AudioChainAdvanced { .. } => "AudioChainAdvanced",
            SessionEvent::AccelerationStep { .. } => "AccelerationStep",
            SessionEvent::VideoSwapped { .. } => "VideoSwapped",
            SessionEvent::CrossfadeStarted { .. } => "CrossfadeStarted",
            SessionEvent::SpectralPhaseChanged { .. } => "SpectralPhaseChanged",
            SessionEvent::HardCut { .. } => "HardCut",
        }
    }
}

/// Broadcast bus for session events
///
/// Cloning is cheap; clones publish into the same channel. Events emitted
/// before a receiver subscribes are not delivered to it.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per receiver
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, returning the number of receivers reached
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SessionEvent,
    ) -> Result<usize, broadcast::error::SendError<SessionEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
