//! Scores: the declarative timeline of one cascata session
//!
//! A [`Score`] is generated once per session and never mutated. Runtime
//! state (phases, indices, gains) lives in the playback session, keyed by
//! the channel's position in [`Score::channels`].

mod generator;

pub use generator::{pick_random_urls, ScoreGenerator};

use crate::config::OverlayBounds;
use snh_common::events::ChannelTag;
use uuid::Uuid;

/// Audio channel subtype
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioRole {
    /// Short ambient loops, fade out ending at the hard cut
    Ambient,
    /// Voice material, louder target, fade out ending before the hard cut
    Spectral,
}

/// Gain envelope of one audio channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioMix {
    pub gain: f32,
    pub fade_in: f64,
    pub fade_out: f64,
    pub end_offset: f64,
}

/// What a channel plays, with its kind-specific tunables
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelKind {
    Image(OverlayBounds),
    Video(OverlayBounds),
    Audio { role: AudioRole, mix: AudioMix },
}

impl ChannelKind {
    pub fn tag(&self) -> ChannelTag {
        match self {
            ChannelKind::Image(_) => ChannelTag::Image,
            ChannelKind::Video(_) => ChannelTag::Video,
            ChannelKind::Audio {
                role: AudioRole::Ambient,
                ..
            } => ChannelTag::AmbientAudio,
            ChannelKind::Audio {
                role: AudioRole::Spectral,
                ..
            } => ChannelTag::SpectralAudio,
        }
    }

    pub fn is_visual(&self) -> bool {
        matches!(self, ChannelKind::Image(_) | ChannelKind::Video(_))
    }
}

/// One channel's participation in a score
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    pub kind: ChannelKind,
    /// Seconds from session start before which the channel is inactive
    pub enter_at: f64,
    /// Candidate resource URLs, distinct within the channel
    pub pool: Vec<String>,
}

/// Finite timeline for one playback session
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub id: Uuid,
    /// Seconds
    pub duration: f64,
    /// Seconds from start when stepped acceleration begins
    pub accel_start: f64,
    /// Ordered by `enter_at`; this is also the per-frame iteration order
    pub channels: Vec<ChannelEvent>,
    /// Images shared by every image channel
    pub shared_images: Vec<String>,
    /// Videos shared by every video channel
    pub shared_videos: Vec<String>,
}

impl Score {
    pub fn count(&self, tag: ChannelTag) -> usize {
        self.channels.iter().filter(|c| c.kind.tag() == tag).count()
    }

    /// Resources the preloader resolves: shared images and videos, plus one
    /// element per audio pool entry
    pub fn resource_count(&self) -> usize {
        let audio: usize = self
            .channels
            .iter()
            .filter(|c| matches!(c.kind, ChannelKind::Audio { .. }))
            .map(|c| c.pool.len())
            .sum();
        self.shared_images.len() + self.shared_videos.len() + audio
    }
}
