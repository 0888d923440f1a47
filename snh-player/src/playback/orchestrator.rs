//! Cascata orchestrator
//!
//! Drives one finite session at a time through
//!
//! ```text
//! Idle ─begin─▶ Preloading ─install─▶ TransitionIn ─▶ Playing ─hard cut─▶ Idle
//! ```
//!
//! Preloading is the only suspending step. [`CascataEngine::begin`] hands
//! out a [`PreloadJob`] that owns everything it needs, so the host keeps
//! calling [`CascataEngine::frame`] (which pulses the backdrop) while the
//! job runs, then passes the result to [`CascataEngine::install`]. A stop
//! during preload bumps the generation and the stale result is released
//! instead of installed.
//!
//! TransitionIn has two steps: wait for the loading pulse to come to rest,
//! then dissolve the grid. Playback starts (and the session origin is
//! captured) on the frame the dissolve completes.

use super::backdrop::{Backdrop, BackdropMode};
use super::session::{PlaybackSession, TickOutcome};
use crate::config::CascataPreset;
use crate::error::{Error, Result};
use crate::geometry::BLACK;
use crate::media::{MediaBackend, Surface};
use crate::preload::{PreloadProgress, PreloadReport, Preloader, ResourceTable};
use crate::score::{Score, ScoreGenerator};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use snh_common::clock;
use snh_common::events::{EventBus, PlaybackState, SessionEvent};
use snh_common::{Material, MaterialQuery, MaterialsRepository};
use tracing::{debug, error, info, warn};

/// Engine phase; several phases map onto one [`PlaybackState`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnginePhase {
    Idle,
    Preloading,
    /// Preload done, waiting for the loading pulse to rest
    AwaitingRest,
    /// Grid dissolving into particles
    Dissolving { start: f64 },
    Playing,
}

impl EnginePhase {
    pub fn state(&self) -> PlaybackState {
        match self {
            EnginePhase::Idle => PlaybackState::Idle,
            EnginePhase::Preloading => PlaybackState::Preloading,
            EnginePhase::AwaitingRest | EnginePhase::Dissolving { .. } => {
                PlaybackState::TransitionIn
            }
            EnginePhase::Playing => PlaybackState::Playing,
        }
    }
}

/// A generated score waiting to be preloaded
pub struct PreloadJob<B: MediaBackend> {
    preloader: Preloader<B>,
    score: Score,
    generation: u64,
    bus: EventBus,
}

impl<B: MediaBackend> PreloadJob<B> {
    pub fn score(&self) -> &Score {
        &self.score
    }

    /// Resolve every resource; always settles
    pub async fn run<F>(self, mut on_progress: F) -> Prepared
    where
        F: FnMut(PreloadProgress),
    {
        let session_id = self.score.id;
        let bus = self.bus;
        let (resources, report) = self
            .preloader
            .preload(&self.score, |progress| {
                bus.emit_lossy(SessionEvent::PreloadProgress {
                    session_id,
                    loaded: progress.loaded,
                    total: progress.total,
                });
                on_progress(progress);
            })
            .await;

        for err in &report.errors {
            bus.emit_lossy(SessionEvent::LoadFailed {
                url: err.url().to_string(),
                reason: err.to_string(),
            });
        }
        bus.emit_lossy(SessionEvent::PreloadComplete {
            session_id,
            failed: report.failed,
            timed_out: report.timed_out,
            timestamp: clock::now(),
        });

        Prepared {
            score: self.score,
            resources,
            report,
            generation: self.generation,
        }
    }
}

/// Preload result; releases its handles if dropped without being installed
pub struct Prepared {
    score: Score,
    resources: ResourceTable,
    report: PreloadReport,
    generation: u64,
}

impl Prepared {
    pub fn score(&self) -> &Score {
        &self.score
    }

    pub fn report(&self) -> &PreloadReport {
        &self.report
    }
}

impl Drop for Prepared {
    fn drop(&mut self) {
        if self.resources.element_count() > 0 {
            debug!("Releasing unused preload of score {}", self.score.id);
        }
        self.resources.release_all();
    }
}

/// Finite-session engine
pub struct CascataEngine<B: MediaBackend> {
    preset: CascataPreset,
    generator: ScoreGenerator,
    preloader: Preloader<B>,
    bus: EventBus,
    rng: StdRng,
    materials: Vec<Material>,
    phase: EnginePhase,
    generation: u64,
    session: Option<PlaybackSession>,
    backdrop: Backdrop,
    /// Canvas size to apply once the backdrop is back to a grid
    pending_canvas: Option<(f64, f64)>,
    last_frame: Option<f64>,
}

impl<B: MediaBackend> CascataEngine<B> {
    pub fn new(backend: B, preset: CascataPreset, canvas: (f64, f64), bus: EventBus, rng: StdRng) -> Self {
        let backdrop = Backdrop::new(
            canvas,
            preset.grid_density,
            preset.pulse_interval,
            preset.transition_fade,
        );
        Self {
            preloader: Preloader::new(backend, preset.preload_timeout()),
            generator: ScoreGenerator::new(preset.clone()),
            preset,
            bus,
            rng,
            materials: Vec::new(),
            phase: EnginePhase::Idle,
            generation: 0,
            session: None,
            backdrop,
            pending_canvas: None,
            last_frame: None,
        }
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn state(&self) -> PlaybackState {
        self.phase.state()
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn backdrop(&self) -> &Backdrop {
        &self.backdrop
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn preset(&self) -> &CascataPreset {
        &self.preset
    }

    /// Fetch the materials pool
    ///
    /// A failure leaves the previous pool in place and is fatal for
    /// starting a session.
    pub async fn load_materials<R: MaterialsRepository>(
        &mut self,
        repo: &R,
        query: &MaterialQuery,
    ) -> Result<usize> {
        match repo.fetch(query).await {
            Ok(materials) => {
                info!("Loaded {} materials", materials.len());
                self.set_materials(materials);
                Ok(self.materials.len())
            }
            Err(e) => {
                error!("Failed to load materials: {}", e);
                self.bus.emit_lossy(SessionEvent::MaterialsUnavailable {
                    reason: e.to_string(),
                    timestamp: clock::now(),
                });
                Err(Error::MaterialsUnavailable(e.to_string()))
            }
        }
    }

    pub fn set_materials(&mut self, materials: Vec<Material>) {
        self.materials = materials;
        self.bus.emit_lossy(SessionEvent::MaterialsLoaded {
            count: self.materials.len(),
            timestamp: clock::now(),
        });
    }

    /// Generate a score and enter Preloading
    pub fn begin(&mut self) -> Result<PreloadJob<B>> {
        if self.phase != EnginePhase::Idle {
            return Err(Error::InvalidState(format!(
                "cannot start a session while {:?}",
                self.phase.state()
            )));
        }
        if self.materials.is_empty() {
            return Err(Error::MaterialsUnavailable(
                "no materials loaded".to_string(),
            ));
        }

        let score = self.generator.generate(&self.materials, &mut self.rng)?;
        self.generation += 1;
        info!(
            "Generated score {}: {}s, {} channels, acceleration from {:.1}s",
            score.id,
            score.duration,
            score.channels.len(),
            score.accel_start
        );
        self.bus.emit_lossy(SessionEvent::ScoreGenerated {
            session_id: score.id,
            duration: score.duration,
            accel_start: score.accel_start,
            channel_count: score.channels.len(),
            timestamp: clock::now(),
        });
        self.set_phase(EnginePhase::Preloading);

        Ok(PreloadJob {
            preloader: self.preloader.clone(),
            score,
            generation: self.generation,
            bus: self.bus.clone(),
        })
    }

    /// Turn a finished preload into the live session
    pub fn install(&mut self, mut prepared: Prepared) -> Result<()> {
        if prepared.generation != self.generation || self.phase != EnginePhase::Preloading {
            warn!("Discarding stale preload of score {}", prepared.score.id);
            return Err(Error::InvalidState(
                "preload finished after the session was stopped".to_string(),
            ));
        }

        let resources = std::mem::take(&mut prepared.resources);
        let session_rng = StdRng::seed_from_u64(self.rng.gen());
        self.session = Some(PlaybackSession::new(
            prepared.score.clone(),
            resources,
            &self.preset,
            self.bus.clone(),
            session_rng,
        ));
        self.set_phase(EnginePhase::AwaitingRest);
        Ok(())
    }

    /// begin + run + install, without frames in between
    pub async fn prepare<F>(&mut self, on_progress: F) -> Result<PreloadReport>
    where
        F: FnMut(PreloadProgress),
    {
        let job = self.begin()?;
        let prepared = job.run(on_progress).await;
        let report = prepared.report().clone();
        self.install(prepared)?;
        Ok(report)
    }

    /// Run one animation frame
    pub fn frame(&mut self, now: f64, surface: &mut dyn Surface) -> EnginePhase {
        let dt = self.last_frame.map_or(0.0, |last| (now - last).max(0.0));
        self.last_frame = Some(now);

        match self.phase {
            EnginePhase::Idle => self.draw_backdrop(now, surface),
            EnginePhase::Preloading => {
                self.backdrop.pulse(dt);
                self.draw_backdrop(now, surface);
            }
            EnginePhase::AwaitingRest => {
                self.backdrop.pulse(dt);
                if self.backdrop.at_rest() {
                    self.backdrop.begin_dissolve(now, &mut self.rng);
                    self.set_phase(EnginePhase::Dissolving { start: now });
                }
                self.draw_backdrop(now, surface);
            }
            EnginePhase::Dissolving { .. } => {
                self.draw_backdrop(now, surface);
                if self.backdrop.mode() == BackdropMode::Particles {
                    if let Some(session) = self.session.as_mut() {
                        session.start(now);
                    }
                    self.set_phase(EnginePhase::Playing);
                }
            }
            EnginePhase::Playing => {
                let outcome = match self.session.as_mut() {
                    Some(session) => session.tick(now, surface, &mut self.backdrop),
                    None => TickOutcome::Finished,
                };
                if outcome == TickOutcome::Finished {
                    self.cleanup();
                    self.draw_backdrop(now, surface);
                }
            }
        }
        self.phase
    }

    /// User stop: same cleanup as the hard cut, from any phase
    pub fn stop(&mut self, now: f64) {
        if self.phase == EnginePhase::Idle {
            return;
        }
        info!("Stop requested while {:?}", self.phase.state());
        if let Some(session) = self.session.as_mut() {
            session.hard_cut(now);
        }
        self.cleanup();
    }

    /// New canvas size; the grid is rebuilt now unless particles are live
    pub fn resize(&mut self, width: f64, height: f64) {
        match self.phase {
            EnginePhase::Dissolving { .. } | EnginePhase::Playing => {
                self.pending_canvas = Some((width, height));
            }
            _ => self.backdrop.resize((width, height)),
        }
    }

    /// Release the current session's media and return to idle
    pub fn cleanup(&mut self) {
        // Invalidates any preload still in flight
        self.generation += 1;
        if let Some(mut session) = self.session.take() {
            session.release();
        }
        match self.pending_canvas.take() {
            Some(canvas) => self.backdrop.resize(canvas),
            None => self.backdrop.reset(),
        }
        self.set_phase(EnginePhase::Idle);
    }

    fn draw_backdrop(&mut self, now: f64, surface: &mut dyn Surface) {
        surface.clear(BLACK);
        self.backdrop.draw(surface, now);
    }

    fn set_phase(&mut self, phase: EnginePhase) {
        let old_state = self.phase.state();
        self.phase = phase;
        let new_state = phase.state();
        if old_state != new_state {
            info!("Playback state changed: {:?} -> {:?}", old_state, new_state);
            self.bus.emit_lossy(SessionEvent::PlaybackStateChanged {
                old_state,
                new_state,
                timestamp: clock::now(),
            });
        }
    }
}
