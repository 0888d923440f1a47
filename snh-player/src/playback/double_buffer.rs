//! Double-buffered background video
//!
//! Two video elements alternate so the remix background never shows a
//! blank frame between clips:
//!
//! - the **front** buffer plays and is drawn
//! - the **back** buffer loads the next random clip without playing it
//!
//! When the front clip ends and the back buffer can play through, the two
//! swap: the new front seeks to 0 and plays, the old front is cleared and
//! starts loading another clip. If the front ends first, its last frame stays on
//! screen until the swap can happen.
//!
//! Each clip gets its own rate multiplier at load time; the stepped
//! acceleration rate multiplies on top of it.

use super::overlay::letterbox;
use crate::config::Range;
use crate::media::{try_play, MediaBackend, MediaElement, ReadyState, Surface, VideoHandle};
use crate::preload::is_drawable;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

/// A clip the buffers can load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSource {
    pub url: String,
    pub material_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Empty,
    Loading,
    /// Loaded and waiting (back buffer)
    Ready,
    Playing,
}

struct Buffer {
    video: Box<dyn VideoHandle>,
    state: BufferState,
    source: Option<VideoSource>,
    clip_rate: f64,
}

/// Completed front/back swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Swap {
    pub material_id: Option<String>,
}

pub struct DoubleBuffer {
    buffers: [Buffer; 2],
    front: usize,
    sources: Vec<VideoSource>,
    clip_rate: Range,
    accel_rate: f64,
    swaps: u64,
}

impl DoubleBuffer {
    pub fn new<B: MediaBackend>(backend: &B, sources: Vec<VideoSource>, clip_rate: Range) -> Self {
        let buffer = || Buffer {
            video: backend.create_video(),
            state: BufferState::Empty,
            source: None,
            clip_rate: 1.0,
        };
        Self {
            buffers: [buffer(), buffer()],
            front: 0,
            sources,
            clip_rate,
            accel_rate: 1.0,
            swaps: 0,
        }
    }

    pub fn front_state(&self) -> BufferState {
        self.buffers[self.front].state
    }

    pub fn back_state(&self) -> BufferState {
        self.buffers[1 - self.front].state
    }

    pub fn front_source(&self) -> Option<&VideoSource> {
        self.buffers[self.front].source.as_ref()
    }

    pub fn front_video(&self) -> &dyn VideoHandle {
        self.buffers[self.front].video.as_ref()
    }

    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    /// Load the first clip into the front buffer; it plays once ready
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.sources.is_empty() {
            warn!("No background videos available");
            return;
        }
        self.load(self.front, rng);
    }

    /// Advance one frame; returns the swap if one happened
    pub fn update<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Swap> {
        for index in 0..2 {
            let buffer = &self.buffers[index];
            if buffer.state == BufferState::Loading && buffer.video.has_error() {
                warn!(
                    "Background video {} failed, trying another",
                    buffer.source.as_ref().map_or("?", |s| s.url.as_str())
                );
                self.load(index, rng);
            }
        }

        let front = self.front;
        let back = 1 - front;

        // First clip: play as soon as it can, then prime the back buffer
        if self.buffers[front].state == BufferState::Loading
            && self.buffers[front].video.ready_state() >= ReadyState::HaveFutureData
        {
            self.play(front);
            if self.buffers[back].state == BufferState::Empty {
                self.load(back, rng);
            }
        }

        // Ready only once it can play through, not merely start
        if self.buffers[back].state == BufferState::Loading
            && self.buffers[back].video.ready_state() >= ReadyState::HaveEnoughData
        {
            self.buffers[back].state = BufferState::Ready;
            debug!("Back buffer ready");
        }

        let can_swap = self.buffers[front].state == BufferState::Playing
            && self.buffers[front].video.has_ended()
            && self.buffers[back].state == BufferState::Ready
            && self.buffers[back].video.ready_state() >= ReadyState::HaveEnoughData;
        if !can_swap {
            return None;
        }

        self.front = back;
        self.play(back);

        let old = &mut self.buffers[front];
        old.video.pause();
        old.video.set_source(None);
        old.state = BufferState::Empty;
        old.source = None;
        self.load(front, rng);

        self.swaps += 1;
        let material_id = self.buffers[back]
            .source
            .as_ref()
            .and_then(|s| s.material_id.clone());
        info!("Background video swap #{} ({:?})", self.swaps, material_id);
        Some(Swap { material_id })
    }

    /// Apply the stepped acceleration rate to the playing clip
    pub fn set_accel_rate(&mut self, rate: f64) {
        self.accel_rate = rate;
        let front = &mut self.buffers[self.front];
        if front.state == BufferState::Playing {
            front.video.set_playback_rate(front.clip_rate * rate);
        }
    }

    /// Draw the front buffer letter-boxed; an ended clip keeps its last frame
    pub fn draw(&self, surface: &mut dyn Surface) {
        let front = &self.buffers[self.front];
        if !is_drawable(front.video.as_ref()) {
            return;
        }
        let Some(size) = front.video.intrinsic_size() else {
            return;
        };
        if let Some(dst) = letterbox(size, surface.size()) {
            surface.draw_video(front.video.as_ref(), dst);
        }
    }

    /// Pause both buffers
    pub fn pause(&mut self) {
        for buffer in &mut self.buffers {
            buffer.video.pause();
        }
    }

    /// Resume the front clip after a pause
    pub fn resume(&mut self) {
        let front = &mut self.buffers[self.front];
        if front.state == BufferState::Playing && !front.video.has_ended() {
            try_play(front.video.as_mut(), "background video");
        }
    }

    pub fn release(&mut self) {
        for buffer in &mut self.buffers {
            buffer.video.release();
            buffer.state = BufferState::Empty;
            buffer.source = None;
        }
    }

    fn load<R: Rng + ?Sized>(&mut self, index: usize, rng: &mut R) {
        let Some(source) = self.sources.choose(rng).cloned() else {
            return;
        };
        let clip_rate = self.clip_rate.sample(rng);
        let buffer = &mut self.buffers[index];
        buffer.video.set_looping(false);
        buffer.video.set_source(Some(source.url.as_str()));
        buffer.state = BufferState::Loading;
        buffer.clip_rate = clip_rate;
        debug!("Buffer {} loading {} at {:.2}x", index, source.url, clip_rate);
        buffer.source = Some(source);
    }

    fn play(&mut self, index: usize) {
        let rate = self.accel_rate;
        let buffer = &mut self.buffers[index];
        buffer.video.seek(0.0);
        buffer.video.set_playback_rate(buffer.clip_rate * rate);
        try_play(buffer.video.as_mut(), "background video");
        buffer.state = BufferState::Playing;
    }
}
