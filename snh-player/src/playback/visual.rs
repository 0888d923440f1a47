//! Visual channels
//!
//! Image and video channels cycle `Show → Gap → Show → ...` once their entry
//! time has passed. Every `Gap → Show` transition picks a new random asset
//! from the shared pool and recomputes its overlay. Phase lengths are
//! divided by the speed multiplier current when the phase is entered.
//!
//! A channel whose pool is empty stays [`VisualPhase::Idle`] and never
//! draws.

use super::overlay::{image_overlay, video_overlay, Overlay};
use crate::config::{CascataPreset, OverlayBounds, Range};
use crate::media::{try_play, ImageHandle, MediaElement, Surface, VideoHandle};
use crate::preload::is_drawable;
use rand::Rng;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualPhase {
    Idle,
    Show,
    Gap,
}

/// Show/gap lengths before speed scaling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleTiming {
    /// First show of a channel
    pub first_show: f64,
    pub show: f64,
    pub gap: Range,
    /// Gap multiplier per completed cycle (1.0 = constant)
    pub gap_decay: f64,
}

impl From<&CascataPreset> for CycleTiming {
    fn from(preset: &CascataPreset) -> Self {
        Self {
            first_show: preset.first_show,
            show: preset.show,
            gap: preset.gap,
            gap_decay: preset.gap_decay,
        }
    }
}

/// Phase bookkeeping shared by image and video channels
#[derive(Debug, Clone, PartialEq)]
pub struct ShowGapCycle {
    phase: VisualPhase,
    phase_start: f64,
    phase_len: f64,
    cycles: u32,
}

impl Default for ShowGapCycle {
    fn default() -> Self {
        Self {
            phase: VisualPhase::Idle,
            phase_start: 0.0,
            phase_len: 0.0,
            cycles: 0,
        }
    }
}

impl ShowGapCycle {
    pub fn phase(&self) -> VisualPhase {
        self.phase
    }

    /// Completed show/gap cycles
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Current phase length in seconds (already speed-scaled)
    pub fn phase_len(&self) -> f64 {
        self.phase_len
    }

    /// Advance the phase clock; true when a new show begins
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        now: f64,
        speed: f64,
        timing: &CycleTiming,
        rng: &mut R,
    ) -> bool {
        let speed = speed.max(1.0);
        match self.phase {
            VisualPhase::Idle => {
                self.enter(VisualPhase::Show, now, timing.first_show / speed);
                true
            }
            VisualPhase::Show if now - self.phase_start >= self.phase_len => {
                let gap = timing.gap.sample(rng) * timing.gap_decay.powi(self.cycles as i32);
                self.cycles += 1;
                self.enter(VisualPhase::Gap, now, gap / speed);
                false
            }
            VisualPhase::Gap if now - self.phase_start >= self.phase_len => {
                self.enter(VisualPhase::Show, now, timing.show / speed);
                true
            }
            _ => false,
        }
    }

    fn enter(&mut self, phase: VisualPhase, now: f64, len: f64) {
        self.phase = phase;
        self.phase_start = now;
        self.phase_len = len;
    }
}

/// Runtime state of an image channel
#[derive(Debug, Clone)]
pub struct ImageChannel {
    bounds: OverlayBounds,
    cycle: ShowGapCycle,
    current: Option<usize>,
    overlay: Option<Overlay>,
}

impl ImageChannel {
    pub fn new(bounds: OverlayBounds) -> Self {
        Self {
            bounds,
            cycle: ShowGapCycle::default(),
            current: None,
            overlay: None,
        }
    }

    pub fn phase(&self) -> VisualPhase {
        self.cycle.phase()
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn cycle(&self) -> &ShowGapCycle {
        &self.cycle
    }

    pub fn update<R: Rng + ?Sized>(
        &mut self,
        now: f64,
        speed: f64,
        timing: &CycleTiming,
        images: &[Box<dyn ImageHandle>],
        canvas: (f64, f64),
        rng: &mut R,
    ) {
        if images.is_empty() {
            return;
        }
        if self.cycle.step(now, speed, timing, rng) {
            let index = rng.gen_range(0..images.len());
            self.current = Some(index);
            self.overlay = image_overlay(images[index].natural_size(), canvas, &self.bounds, rng);
            debug!("Image channel shows #{} for {:.2}s", index, self.cycle.phase_len());
        } else if self.cycle.phase() == VisualPhase::Show && self.overlay.is_none() {
            if let Some(image) = self.current.and_then(|i| images.get(i)) {
                self.overlay = image_overlay(image.natural_size(), canvas, &self.bounds, rng);
            }
        }
    }

    /// Draw the current image if showing
    pub fn draw(&self, surface: &mut dyn Surface, images: &[Box<dyn ImageHandle>]) {
        if self.cycle.phase() != VisualPhase::Show {
            return;
        }
        let (Some(overlay), Some(image)) = (self.overlay, self.current.and_then(|i| images.get(i)))
        else {
            return;
        };
        surface.draw_image(image.as_ref(), overlay.src, overlay.dst, 1.0);
    }
}

/// Runtime state of a video channel
#[derive(Debug, Clone)]
pub struct VideoChannel {
    bounds: OverlayBounds,
    cycle: ShowGapCycle,
    current: Option<usize>,
    overlay: Option<Overlay>,
}

impl VideoChannel {
    pub fn new(bounds: OverlayBounds) -> Self {
        Self {
            bounds,
            cycle: ShowGapCycle::default(),
            current: None,
            overlay: None,
        }
    }

    pub fn phase(&self) -> VisualPhase {
        self.cycle.phase()
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// `speed` is the capped video multiplier
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        now: f64,
        speed: f64,
        timing: &CycleTiming,
        videos: &mut [Box<dyn VideoHandle>],
        canvas: (f64, f64),
        rng: &mut R,
    ) {
        if videos.is_empty() {
            return;
        }
        if self.cycle.step(now, speed, timing, rng) {
            let index = rng.gen_range(0..videos.len());
            let video = &mut videos[index];
            // Shared clips may be on screen in another channel: only a
            // paused clip is moved to a random offset
            if video.is_paused() {
                if let Some(duration) = video.duration().filter(|d| *d > 0.0) {
                    video.seek(rng.gen::<f64>() * duration);
                }
                try_play(video.as_mut(), "video channel");
            }
            self.current = Some(index);
            self.overlay = video
                .intrinsic_size()
                .and_then(|size| video_overlay(size, canvas, &self.bounds, rng));
            debug!("Video channel shows #{} for {:.2}s", index, self.cycle.phase_len());
        } else if self.cycle.phase() == VisualPhase::Show && self.overlay.is_none() {
            // Stalled at selection time; place it once its size is known
            if let Some(size) = self
                .current
                .and_then(|i| videos.get(i))
                .and_then(|v| v.intrinsic_size())
            {
                self.overlay = video_overlay(size, canvas, &self.bounds, rng);
            }
        }
    }

    /// Draw the current clip if showing and decodable
    pub fn draw(&self, surface: &mut dyn Surface, videos: &[Box<dyn VideoHandle>]) {
        if self.cycle.phase() != VisualPhase::Show {
            return;
        }
        let (Some(overlay), Some(video)) = (self.overlay, self.current.and_then(|i| videos.get(i)))
        else {
            return;
        };
        if is_drawable(video.as_ref()) {
            surface.draw_video(video.as_ref(), overlay.dst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::headless::{HeadlessBackend, RecordingSurface};
    use crate::media::MediaBackend;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn timing() -> CycleTiming {
        CycleTiming {
            first_show: 4.5,
            show: 2.5,
            gap: Range::new(1.0, 1.0),
            gap_decay: 1.0,
        }
    }

    #[test]
    fn test_cycle_phase_lengths() {
        let mut cycle = ShowGapCycle::default();
        let mut rng = StdRng::seed_from_u64(0);
        let t = timing();

        assert!(cycle.step(0.0, 1.0, &t, &mut rng));
        assert_eq!(cycle.phase(), VisualPhase::Show);
        assert_eq!(cycle.phase_len(), 4.5);

        assert!(!cycle.step(4.4, 1.0, &t, &mut rng));
        assert!(!cycle.step(4.5, 1.0, &t, &mut rng));
        assert_eq!(cycle.phase(), VisualPhase::Gap);
        assert_eq!(cycle.cycles(), 1);

        assert!(cycle.step(5.5, 2.0, &t, &mut rng));
        assert_eq!(cycle.phase_len(), 1.25);
    }

    #[test]
    fn test_gap_decay_shortens_gaps() {
        let mut cycle = ShowGapCycle::default();
        let mut rng = StdRng::seed_from_u64(0);
        let t = CycleTiming {
            gap_decay: 0.5,
            ..timing()
        };
        let mut now = 0.0;
        let mut gaps = Vec::new();
        for _ in 0..12 {
            cycle.step(now, 1.0, &t, &mut rng);
            if cycle.phase() == VisualPhase::Gap {
                gaps.push(cycle.phase_len());
            }
            now += 5.0;
        }
        assert!(gaps.len() >= 3);
        assert!(gaps.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn test_empty_image_pool_never_shows() {
        let mut channel = ImageChannel::new(OverlayBounds::default());
        let mut surface = RecordingSurface::new(1600.0, 900.0);
        let mut rng = StdRng::seed_from_u64(0);
        for i in 0..200 {
            let now = i as f64 * 0.1;
            channel.update(now, 1.0, &timing(), &[], (1600.0, 900.0), &mut rng);
            channel.draw(&mut surface, &[]);
        }
        assert_eq!(channel.phase(), VisualPhase::Idle);
        assert_eq!(surface.draws.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_image_draws_only_while_showing() {
        let backend = HeadlessBackend::default();
        let images = vec![backend.load_image("a.png").await.unwrap()];
        let mut channel = ImageChannel::new(OverlayBounds::default());
        let mut surface = RecordingSurface::new(1600.0, 900.0);
        let mut rng = StdRng::seed_from_u64(0);

        channel.update(0.0, 1.0, &timing(), &images, (1600.0, 900.0), &mut rng);
        channel.draw(&mut surface, &images);
        assert_eq!(surface.image_draws(), 1);

        channel.update(4.6, 1.0, &timing(), &images, (1600.0, 900.0), &mut rng);
        channel.draw(&mut surface, &images);
        assert_eq!(channel.phase(), VisualPhase::Gap);
        assert_eq!(surface.image_draws(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_advance_plays_and_draws() {
        let backend = HeadlessBackend::default();
        let mut videos = vec![backend.load_video("v.mp4").await.unwrap()];
        let mut channel = VideoChannel::new(OverlayBounds::default());
        let mut surface = RecordingSurface::new(1600.0, 900.0);
        let mut rng = StdRng::seed_from_u64(0);

        channel.update(0.0, 1.0, &timing(), &mut videos, (1600.0, 900.0), &mut rng);
        assert_eq!(channel.current(), Some(0));
        assert!(!videos[0].is_paused());

        channel.draw(&mut surface, &videos);
        assert_eq!(surface.video_draws(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_advance_leaves_playing_clip_in_place() {
        let backend = HeadlessBackend::default();
        let mut videos = vec![backend.load_video("v.mp4").await.unwrap()];
        videos[0].set_looping(true);
        videos[0].play().unwrap();
        backend.advance(3.0);
        let before = videos[0].current_time();
        assert!((before - 3.0).abs() < 1e-9);

        let mut channel = VideoChannel::new(OverlayBounds::default());
        let mut rng = StdRng::seed_from_u64(0);
        channel.update(0.0, 1.0, &timing(), &mut videos, (1600.0, 900.0), &mut rng);

        assert_eq!(channel.current(), Some(0));
        assert_eq!(videos[0].current_time(), before);
        assert!(!videos[0].is_paused());
    }
}
