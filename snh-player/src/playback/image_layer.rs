//! Probabilistic image overlay (remix)
//!
//! Every `check_interval` seconds the idle layer rolls against `chance`; on
//! a hit it fades a random image in, holds it, and fades it out:
//!
//! ```text
//! Idle ─roll─▶ FadingIn ─▶ Showing ─▶ FadingOut ─▶ Idle
//! ```

use super::overlay::{image_overlay, Overlay};
use crate::config::{OverlayBounds, Range, RemixPreset};
use crate::media::{ImageHandle, Surface};
use rand::Rng;
use tracing::debug;

/// Roll, fade and hold settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageLayerTiming {
    pub chance: f64,
    pub check_interval: f64,
    pub show: Range,
    pub fade: Range,
    /// Whole image, scaled on the canvas' major side
    pub bounds: OverlayBounds,
}

impl From<&RemixPreset> for ImageLayerTiming {
    fn from(preset: &RemixPreset) -> Self {
        Self {
            chance: preset.image_chance,
            check_interval: preset.image_check_interval,
            show: preset.image_show,
            fade: preset.image_fade,
            bounds: OverlayBounds {
                scale: preset.image_scale,
                margin: preset.image_margin,
                crop: Range::new(1.0, 1.0),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageLayerState {
    Idle { next_check: f64 },
    FadingIn { start: f64, until: f64 },
    Showing { until: f64 },
    FadingOut { start: f64, until: f64 },
}

#[derive(Debug, Clone)]
pub struct ImageLayer {
    timing: ImageLayerTiming,
    state: ImageLayerState,
    current: Option<(usize, Overlay)>,
    fade_out: f64,
}

impl ImageLayer {
    pub fn new(timing: ImageLayerTiming) -> Self {
        Self {
            timing,
            state: ImageLayerState::Idle { next_check: 0.0 },
            current: None,
            fade_out: 0.0,
        }
    }

    pub fn state(&self) -> ImageLayerState {
        self.state
    }

    /// First roll one interval after `now`
    pub fn start(&mut self, now: f64) {
        self.reset(now);
    }

    pub fn reset(&mut self, now: f64) {
        self.state = ImageLayerState::Idle {
            next_check: now + self.timing.check_interval,
        };
        self.current = None;
    }

    pub fn update<R: Rng + ?Sized>(
        &mut self,
        now: f64,
        images: &[Box<dyn ImageHandle>],
        canvas: (f64, f64),
        rng: &mut R,
    ) {
        match self.state {
            ImageLayerState::Idle { next_check } => {
                if now < next_check {
                    return;
                }
                self.state = ImageLayerState::Idle {
                    next_check: now + self.timing.check_interval,
                };
                if images.is_empty() || rng.gen::<f64>() >= self.timing.chance {
                    return;
                }
                let index = rng.gen_range(0..images.len());
                let Some(overlay) =
                    image_overlay(images[index].natural_size(), canvas, &self.timing.bounds, rng)
                else {
                    return;
                };
                let fade_in = self.timing.fade.sample(rng);
                self.fade_out = self.timing.fade.sample(rng);
                self.current = Some((index, overlay));
                self.state = ImageLayerState::FadingIn {
                    start: now,
                    until: now + fade_in,
                };
                debug!("Overlay image #{} fading in over {:.2}s", index, fade_in);
            }
            ImageLayerState::FadingIn { until, .. } => {
                if now >= until {
                    let show = self.timing.show.sample(rng);
                    self.state = ImageLayerState::Showing { until: now + show };
                }
            }
            ImageLayerState::Showing { until } => {
                if now >= until {
                    self.state = ImageLayerState::FadingOut {
                        start: now,
                        until: now + self.fade_out,
                    };
                }
            }
            ImageLayerState::FadingOut { until, .. } => {
                if now >= until {
                    self.reset(now);
                }
            }
        }
    }

    /// Opacity at `now`
    pub fn alpha(&self, now: f64) -> f32 {
        let progress = |start: f64, until: f64| {
            if until <= start {
                1.0
            } else {
                ((now - start) / (until - start)).clamp(0.0, 1.0)
            }
        };
        match self.state {
            ImageLayerState::Idle { .. } => 0.0,
            ImageLayerState::FadingIn { start, until } => progress(start, until) as f32,
            ImageLayerState::Showing { .. } => 1.0,
            ImageLayerState::FadingOut { start, until } => (1.0 - progress(start, until)) as f32,
        }
    }

    pub fn draw(&self, surface: &mut dyn Surface, images: &[Box<dyn ImageHandle>], now: f64) {
        let alpha = self.alpha(now);
        if alpha <= 0.0 {
            return;
        }
        if let Some((index, overlay)) = self.current {
            if let Some(image) = images.get(index) {
                surface.draw_image(image.as_ref(), overlay.src, overlay.dst, alpha);
            }
        }
    }
}
