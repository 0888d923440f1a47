//! Sonhário player (snh-player) - Main entry point
//!
//! Runs one cascata session (or a timed remix) headlessly against the
//! simulated media backend, driven by a fixed-rate frame timer. Materials
//! come from the configured REST repository or a local JSON export.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use snh_common::events::{EventBus, SessionEvent};
use snh_common::{Clock, JsonFileRepository, MaterialQuery, MaterialsRepository, RestRepository, SystemClock};
use snh_player::media::headless::{HeadlessBackend, RecordingSurface};
use snh_player::playback::{CascataEngine, EnginePhase, RemixEngine};
use snh_player::ui::ControlsState;
use snh_player::viewport::CanvasPolicy;
use snh_player::PlayerConfig;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Viewport the headless canvas is fitted into
const VIEWPORT: (f64, f64) = (1920.0, 1080.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EngineKind {
    Cascata,
    Remix,
}

/// Command-line arguments for snh-player
#[derive(Parser, Debug)]
#[command(name = "snh-player")]
#[command(about = "Generative audiovisual playback engine for Sonhário")]
#[command(version)]
struct Args {
    /// Config file (overrides SNH_CONFIG and the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Engine to run
    #[arg(short, long, value_enum, default_value = "cascata")]
    engine: EngineKind,

    /// Local materials export to use instead of the REST repository
    #[arg(short, long)]
    materials: Option<PathBuf>,

    /// RNG seed for a reproducible session
    #[arg(long)]
    seed: Option<u64>,

    /// Frames per second
    #[arg(long, default_value = "60")]
    fps: u32,

    /// How long the remix runs before stopping
    #[arg(long, default_value = "60")]
    remix_seconds: f64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = PlayerConfig::load(args.config.clone()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting snh-player ({:?} engine)", args.engine);

    let local_export = args
        .materials
        .clone()
        .or_else(|| config.repository.local_export.clone());
    match local_export {
        Some(path) => {
            info!("Materials source: {}", path.display());
            run(&args, &config, &JsonFileRepository::new(path)).await
        }
        None => {
            let repo = RestRepository::new(
                &config.repository.base_url,
                &config.repository.api_key,
                &config.repository.table,
            );
            info!("Materials source: {}", repo.endpoint());
            run(&args, &config, &repo).await
        }
    }
}

async fn run<R: MaterialsRepository>(args: &Args, config: &PlayerConfig, repo: &R) -> Result<()> {
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let canvas = CanvasPolicy::from(&config.viewport).canvas_size(VIEWPORT.0, VIEWPORT.1);
    let frame_interval = Duration::from_secs_f64(1.0 / args.fps.max(1) as f64);

    let bus = EventBus::default();
    spawn_event_log(&bus);

    let backend = HeadlessBackend::default();
    let mut surface = RecordingSurface::new(canvas.0, canvas.1);
    info!("Canvas {}x{}", canvas.0, canvas.1);

    match args.engine {
        EngineKind::Cascata => {
            let mut engine = CascataEngine::new(backend.clone(), config.cascata.clone(), canvas, bus, rng);
            let query = MaterialQuery::approved().with_categories(config.repository.categories.clone());
            if let Err(e) = engine.load_materials(repo, &query).await {
                // Give the event log a turn to surface the failure
                tokio::task::yield_now().await;
                return Err(e).context("Cannot start a session");
            }

            let job = engine.begin().context("Failed to generate a score")?;
            let preload = job.run(|progress| debug!("Preloaded {}/{}", progress.loaded, progress.total));
            tokio::pin!(preload);

            let clock = SystemClock::new();
            let mut last = clock.now_secs();
            let mut ticker = tokio::time::interval(frame_interval);
            let mut preloading = true;

            loop {
                tokio::select! {
                    prepared = &mut preload, if preloading => {
                        preloading = false;
                        let report = prepared.report().clone();
                        engine.install(prepared).context("Failed to install preloaded session")?;
                        info!(
                            "Preloaded {}/{} items ({} failed, {} timed out)",
                            report.ready, report.total, report.failed, report.timed_out
                        );
                    }
                    _ = ticker.tick() => {
                        let now = clock.now_secs();
                        backend.advance(now - last);
                        last = now;
                        surface.reset();
                        let phase = engine.frame(now, &mut surface);
                        if !preloading && phase == EnginePhase::Idle {
                            break;
                        }
                    }
                }
            }
            info!("Session finished");
        }
        EngineKind::Remix => {
            let mut engine = RemixEngine::new(backend.clone(), config.remix.clone(), bus, rng);
            if let Err(e) = engine.load_materials(repo).await {
                tokio::task::yield_now().await;
                return Err(e).context("Cannot start the remix");
            }
            let images = engine.load_overlay_images().await;
            info!("{} overlay images ready", images);

            let clock = SystemClock::new();
            let mut last = clock.now_secs();
            engine.start(last).context("Cannot start the remix")?;

            let mut ticker = tokio::time::interval(frame_interval);
            let end = last + args.remix_seconds.max(0.0);
            loop {
                ticker.tick().await;
                let now = clock.now_secs();
                backend.advance(now - last);
                last = now;
                if now >= end {
                    break;
                }
                surface.reset();
                engine.frame(now, &mut surface);
            }
            engine.dispose(last);
            info!("Remix finished after {:.0}s ({} video swaps)", args.remix_seconds, engine.swaps());
        }
    }

    let leaked = backend.live_elements();
    if leaked > 0 {
        warn!("{} media elements still alive after cleanup", leaked);
    }
    Ok(())
}

/// Log bus traffic and fold it into the control surface state
fn spawn_event_log(bus: &EventBus) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        let mut controls = ControlsState::default();
        loop {
            match rx.recv().await {
                Ok(event) => {
                    controls.apply(&event);
                    match &event {
                        SessionEvent::PreloadProgress { .. } => {
                            if let Some(label) = controls.progress_label() {
                                debug!("Loading {}", label);
                            }
                        }
                        SessionEvent::LoadFailed { url, reason } => {
                            warn!("Skipped {}: {}", url, reason);
                        }
                        SessionEvent::MaterialsUnavailable { .. } => {
                            if let Some(message) = controls.error.as_deref() {
                                error!("{}", message);
                            }
                        }
                        other => debug!("Event: {}", other.event_type()),
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event log lagged, {} events dropped", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
