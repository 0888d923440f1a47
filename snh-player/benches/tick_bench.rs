//! Frame tick benchmark
//!
//! Measures one `PlaybackSession::tick` (backdrop, every entered channel,
//! gain sync) against the headless backend and a recording surface.
//!
//! **Goal:** a full frame stays far below the 16.7ms budget of 60fps

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use snh_common::events::EventBus;
use snh_common::{Material, MediaKind};
use snh_player::media::headless::{HeadlessBackend, RecordingSurface};
use snh_player::playback::backdrop::Backdrop;
use snh_player::playback::PlaybackSession;
use snh_player::preload::Preloader;
use snh_player::score::ScoreGenerator;
use snh_player::CascataPreset;

const CANVAS: (f64, f64) = (1600.0, 900.0);
const FRAME: f64 = 1.0 / 60.0;

fn pool(n: usize) -> Vec<Material> {
    (0..n)
        .map(|i| {
            Material::new(format!("m{}", i))
                .with_url(MediaKind::Image, format!("img{}.png", i))
                .with_url(MediaKind::Video, format!("vid{}.mp4", i))
                .with_url(MediaKind::AmbientAudio, format!("amb{}.mp3", i))
                .with_url(MediaKind::SpectralAudio, format!("spec{}.mp3", i))
        })
        .collect()
}

fn build(backend: &HeadlessBackend, preset: &CascataPreset) -> PlaybackSession {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("tokio runtime");
    let mut rng = StdRng::seed_from_u64(7);
    let score = ScoreGenerator::new(preset.clone())
        .generate(&pool(40), &mut rng)
        .expect("score");
    let preloader = Preloader::new(backend.clone(), preset.preload_timeout());
    let (resources, _) = runtime.block_on(preloader.preload(&score, |_| {}));
    PlaybackSession::new(score, resources, preset, EventBus::default(), rng)
}

fn bench_session_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_tick");

    let preset = CascataPreset {
        durations: vec![26.0],
        ..CascataPreset::default()
    };

    // The clock is frozen during measurement so the cut never lands inside it
    for (label, warmup) in [("early", 2.0), ("all_channels_entered", 19.0)] {
        let backend = HeadlessBackend::default();
        let mut session = build(&backend, &preset);
        let mut surface = RecordingSurface::new(CANVAS.0, CANVAS.1);
        let mut backdrop = Backdrop::new(
            CANVAS,
            preset.grid_density,
            preset.pulse_interval,
            preset.transition_fade,
        );

        session.start(0.0);
        let mut now = 0.0;
        while now < warmup {
            session.tick(now, &mut surface, &mut backdrop);
            backend.advance(FRAME);
            now += FRAME;
        }

        group.bench_function(label, |b| {
            b.iter(|| {
                surface.reset();
                black_box(session.tick(black_box(now), &mut surface, &mut backdrop));
                backend.advance(FRAME);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_session_tick);
criterion_main!(benches);
