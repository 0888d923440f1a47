//! Remix idle particles
//!
//! Small coloured squares that wander over the canvas before the remix
//! background has a clip to show. There are 13 plus one per non-legacy
//! material (at most 300). They fade out once the first clip plays.
//!
//! Positions are kept in unit coordinates so the set survives a resize.

use crate::geometry::{Rect, Rgba};
use crate::media::Surface;
use rand::Rng;
use snh_common::Material;

const BASE_COUNT: usize = 13;
const MAX_COUNT: usize = 300;
const LEGACY_CATEGORY: &str = "legacy";
/// Seconds from fade start to gone
pub const IDLE_FADE: f64 = 1.5;

#[derive(Debug, Clone)]
struct Particle {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
    /// Fraction of the canvas' minor side
    size: f64,
    color: Rgba,
}

#[derive(Debug, Clone)]
pub struct IdleParticles {
    particles: Vec<Particle>,
    fade_start: Option<f64>,
    last_update: Option<f64>,
}

impl IdleParticles {
    /// One particle set sized for `materials`
    pub fn for_materials<R: Rng + ?Sized>(materials: &[Material], rng: &mut R) -> Self {
        let non_legacy = materials
            .iter()
            .filter(|m| m.category.as_deref() != Some(LEGACY_CATEGORY))
            .count();
        let count = (BASE_COUNT + non_legacy).min(MAX_COUNT);
        let particles = (0..count)
            .map(|_| Particle {
                x: rng.gen(),
                y: rng.gen(),
                vx: rng.gen_range(-0.01..0.01),
                vy: rng.gen_range(-0.01..0.01),
                size: rng.gen_range(0.006..0.028),
                color: Rgba::rgb(
                    rng.gen_range(60..=230),
                    rng.gen_range(60..=230),
                    rng.gen_range(60..=230),
                )
                .with_alpha(rng.gen_range(0.15..0.6)),
            })
            .collect();
        Self {
            particles,
            fade_start: None,
            last_update: None,
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn is_fading(&self) -> bool {
        self.fade_start.is_some()
    }

    /// Start the fade; later calls keep the first start time
    pub fn fade_out(&mut self, now: f64) {
        self.fade_start.get_or_insert(now);
    }

    /// Global opacity at `now`
    pub fn alpha(&self, now: f64) -> f32 {
        match self.fade_start {
            Some(start) => (1.0 - (now - start) / IDLE_FADE).clamp(0.0, 1.0) as f32,
            None => 1.0,
        }
    }

    /// Fully faded out
    pub fn is_done(&self, now: f64) -> bool {
        self.fade_start.is_some() && self.alpha(now) <= 0.0
    }

    /// Wander up to `now`, wrapping at the edges
    pub fn update<R: Rng + ?Sized>(&mut self, now: f64, rng: &mut R) {
        let dt = self.last_update.map_or(0.0, |last| (now - last).max(0.0));
        self.last_update = Some(now);
        for p in &mut self.particles {
            p.vx = (p.vx + rng.gen_range(-0.002..0.002)).clamp(-0.03, 0.03);
            p.vy = (p.vy + rng.gen_range(-0.002..0.002)).clamp(-0.03, 0.03);
            p.x = wrap(p.x + p.vx * dt);
            p.y = wrap(p.y + p.vy * dt);
        }
    }

    pub fn draw(&self, surface: &mut dyn Surface, now: f64) {
        let alpha = self.alpha(now);
        if alpha <= 0.0 {
            return;
        }
        let (w, h) = surface.size();
        let minor = w.min(h);
        for p in &self.particles {
            let side = p.size * minor;
            let color = p.color.with_alpha(p.color.a * alpha);
            surface.fill_rect(Rect::new(p.x * w - side / 2.0, p.y * h - side / 2.0, side, side), color);
        }
    }
}

fn wrap(v: f64) -> f64 {
    let wrapped = v.rem_euclid(1.0);
    // rem_euclid of a tiny negative rounds up to 1.0
    if wrapped >= 1.0 {
        0.0
    } else {
        wrapped
    }
}
