//! Shared fixtures for snh-player integration tests

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::SeedableRng;
use snh_common::events::{EventBus, SessionEvent};
use snh_common::{Clock, ManualClock, Material, MediaKind};
use snh_player::media::headless::{HeadlessBackend, RecordingSurface};
use snh_player::playback::backdrop::Backdrop;
use snh_player::playback::{PlaybackSession, TickOutcome};
use snh_player::preload::Preloader;
use snh_player::score::ScoreGenerator;
use snh_player::CascataPreset;

pub const CANVAS: (f64, f64) = (1600.0, 900.0);
pub const FRAME: f64 = 1.0 / 60.0;

/// `n` approved materials carrying every media kind
pub fn full_pool(n: usize) -> Vec<Material> {
    (0..n)
        .map(|i| {
            Material::new(format!("m{}", i))
                .with_category("sonhos")
                .with_url(MediaKind::Image, format!("img{}.png", i))
                .with_url(MediaKind::Video, format!("vid{}.mp4", i))
                .with_url(MediaKind::AmbientAudio, format!("amb{}.mp3", i))
                .with_url(MediaKind::SpectralAudio, format!("spec{}.mp3", i))
        })
        .collect()
}

/// Cascata preset with a single fixed duration
pub fn preset_with_duration(duration: f64) -> CascataPreset {
    CascataPreset {
        durations: vec![duration],
        ..CascataPreset::default()
    }
}

pub fn backdrop() -> Backdrop {
    Backdrop::new(CANVAS, 45, 1.5, 1.0)
}

/// Generate, preload and wire a session without starting it
pub async fn build_session(
    backend: &HeadlessBackend,
    preset: &CascataPreset,
    materials: &[Material],
    seed: u64,
    bus: EventBus,
) -> PlaybackSession {
    let mut rng = StdRng::seed_from_u64(seed);
    let score = ScoreGenerator::new(preset.clone())
        .generate(materials, &mut rng)
        .unwrap();
    let preloader = Preloader::new(backend.clone(), preset.preload_timeout());
    let (resources, _) = preloader.preload(&score, |_| {}).await;
    PlaybackSession::new(score, resources, preset, bus, StdRng::seed_from_u64(seed + 1))
}

/// Tick from `origin` at 60 fps until the session finishes or `limit` passes
///
/// Frames read a manual clock that moves in step with the backend.
/// Returns the clock reading of the last frame.
pub fn run_frames(
    session: &mut PlaybackSession,
    backend: &HeadlessBackend,
    surface: &mut RecordingSurface,
    backdrop: &mut Backdrop,
    origin: f64,
    limit: f64,
) -> f64 {
    let clock = ManualClock::new();
    clock.set(origin);
    loop {
        let now = clock.now_secs();
        if session.tick(now, surface, backdrop) == TickOutcome::Finished || now - origin >= limit {
            return now;
        }
        backend.advance(FRAME);
        clock.advance(FRAME);
    }
}

pub fn drain(rx: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
