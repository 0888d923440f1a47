//! Remix engine
//!
//! Continuous playback with no score and no hard cut, stacked as four
//! layers driven from the same frame callback:
//!
//! 1. double-buffered background video, letter-boxed
//! 2. ambient A/B crossfade through the layer master
//! 3. spectral voice appearances that duck the layer master
//! 4. probabilistic image overlay
//!
//! Until the first clip plays the canvas shows idle particles, which
//! then fade out.
//!
//! Gain graph:
//!
//! ```text
//! master (volume / mute)
//! ├── layer-master (ducked by spectral)
//! │   ├── ambient-A
//! │   └── ambient-B
//! └── spectral
//! ```

use super::audio::{Crossfader, MixGraph, NodeId, SpectralLayer, SpectralTiming};
use super::double_buffer::{BufferState, DoubleBuffer, VideoSource};
use super::idle_particles::IdleParticles;
use super::image_layer::{ImageLayer, ImageLayerTiming};
use super::speed::{AccelSchedule, AccelState};
use crate::config::RemixPreset;
use crate::error::{Error, Result};
use crate::geometry::BLACK;
use crate::media::{ImageHandle, MediaBackend, Surface};
use crate::preload::Preloader;
use crate::score::{pick_random_urls, Score};
use rand::rngs::StdRng;
use snh_common::clock;
use snh_common::events::{EventBus, PlaybackState, SessionEvent};
use snh_common::materials::urls_of;
use snh_common::{Material, MaterialQuery, MaterialsRepository, MediaKind};
use tracing::{debug, error, info};
use uuid::Uuid;

struct Layers {
    video: DoubleBuffer,
    graph: MixGraph,
    master: NodeId,
    layer_master: NodeId,
    ambient: Crossfader,
    spectral: SpectralLayer,
    images: ImageLayer,
}

/// Continuous remix engine
pub struct RemixEngine<B: MediaBackend> {
    backend: B,
    preset: RemixPreset,
    bus: EventBus,
    rng: StdRng,
    materials: Vec<Material>,
    overlay_images: Vec<Box<dyn ImageHandle>>,
    layers: Option<Layers>,
    idle: Option<IdleParticles>,
    running: bool,
    run_id: Uuid,
    origin: f64,
    accel: Option<AccelState>,
    volume: f32,
    muted: bool,
}

impl<B: MediaBackend> RemixEngine<B> {
    pub fn new(backend: B, preset: RemixPreset, bus: EventBus, rng: StdRng) -> Self {
        Self {
            backend,
            preset,
            bus,
            rng,
            materials: Vec::new(),
            overlay_images: Vec::new(),
            layers: None,
            idle: None,
            running: false,
            run_id: Uuid::nil(),
            origin: 0.0,
            accel: None,
            volume: 1.0,
            muted: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn state(&self) -> PlaybackState {
        if self.running {
            PlaybackState::Playing
        } else {
            PlaybackState::Idle
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn overlay_image_count(&self) -> usize {
        self.overlay_images.len()
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Idle particles still on screen
    pub fn idle_particle_count(&self) -> usize {
        self.idle.as_ref().map_or(0, |idle| idle.len())
    }

    pub fn swaps(&self) -> u64 {
        self.layers.as_ref().map_or(0, |l| l.video.swaps())
    }

    pub fn active_ambient_slot(&self) -> Option<char> {
        self.layers.as_ref().map(|l| l.ambient.active_slot())
    }

    /// Fetch the materials of the configured categories
    pub async fn load_materials<R: MaterialsRepository>(&mut self, repo: &R) -> Result<usize> {
        let query = MaterialQuery::approved().with_categories(self.preset.categories.clone());
        match repo.fetch(&query).await {
            Ok(materials) => {
                info!("Remix loaded {} materials", materials.len());
                self.set_materials(materials);
                Ok(self.materials.len())
            }
            Err(e) => {
                error!("Failed to load remix materials: {}", e);
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
        if self.layers.is_none() {
            self.idle = Some(IdleParticles::for_materials(&self.materials, &mut self.rng));
        }
        self.bus.emit_lossy(SessionEvent::MaterialsLoaded {
            count: self.materials.len(),
            timestamp: clock::now(),
        });
    }

    /// Preload the pool the image overlay draws from
    pub async fn load_overlay_images(&mut self) -> usize {
        let urls = pick_random_urls(
            &self.materials,
            MediaKind::Image,
            self.preset.image_pool,
            &mut self.rng,
        );
        let score = Score {
            id: Uuid::new_v4(),
            duration: 0.0,
            accel_start: 0.0,
            channels: Vec::new(),
            shared_images: urls,
            shared_videos: Vec::new(),
        };
        let preloader = Preloader::new(self.backend.clone(), self.preset.preload_timeout());
        let (resources, report) = preloader.preload(&score, |_| {}).await;
        for err in &report.errors {
            self.bus.emit_lossy(SessionEvent::LoadFailed {
                url: err.url().to_string(),
                reason: err.to_string(),
            });
        }
        self.overlay_images = resources.images;
        debug!("{} overlay images ready", self.overlay_images.len());
        self.overlay_images.len()
    }

    /// Start (or restart after a stop) every layer
    pub fn start(&mut self, now: f64) -> Result<()> {
        if self.running {
            return Ok(());
        }
        if self.layers.is_none() {
            self.layers = Some(self.build_layers()?);
        }
        let Some(layers) = self.layers.as_mut() else {
            return Err(Error::InvalidState("remix layers missing".to_string()));
        };

        if layers.video.swaps() == 0 && layers.video.front_source().is_none() {
            layers.video.start(&mut self.rng);
        } else {
            layers.video.resume();
        }
        layers.ambient.start(&mut self.rng);
        layers.spectral.start(now, &mut self.rng);
        layers.images.start(now);

        self.run_id = Uuid::new_v4();
        self.origin = now;
        self.accel = self.preset.accel_start.map(|start| {
            AccelState::new(AccelSchedule::new(
                start,
                self.preset.accel_interval,
                self.preset.accel_step,
            ))
        });
        self.running = true;
        self.apply_master(now);
        info!("Remix started");
        self.bus.emit_lossy(SessionEvent::PlaybackStateChanged {
            old_state: PlaybackState::Idle,
            new_state: PlaybackState::Playing,
            timestamp: clock::now(),
        });
        Ok(())
    }

    /// Run one animation frame
    ///
    /// While stopped only the idle particles (if any) are drawn.
    pub fn frame(&mut self, now: f64, surface: &mut dyn Surface) {
        if !self.running {
            if let Some(idle) = self.idle.as_mut() {
                surface.clear(BLACK);
                idle.update(now, &mut self.rng);
                idle.draw(surface, now);
            }
            return;
        }
        let Some(layers) = self.layers.as_mut() else {
            return;
        };
        let canvas = surface.size();
        surface.clear(BLACK);

        if let Some(swap) = layers.video.update(&mut self.rng) {
            self.bus.emit_lossy(SessionEvent::VideoSwapped {
                material_id: swap.material_id,
            });
        }
        if let Some(accel) = self.accel.as_mut() {
            if let Some(rate) = accel.update(now - self.origin) {
                layers.video.set_accel_rate(rate);
                debug!("Remix acceleration step {}: rate {:.2}", accel.steps(), rate);
                self.bus.emit_lossy(SessionEvent::AccelerationStep {
                    session_id: self.run_id,
                    steps: accel.steps(),
                    playback_rate: rate,
                });
            }
        }
        layers.video.draw(surface);

        if let Some(idle) = self.idle.as_mut() {
            if !idle.is_fading() && layers.video.front_state() == BufferState::Playing {
                debug!("First remix clip playing, fading idle particles");
                idle.fade_out(now);
            }
            idle.update(now, &mut self.rng);
            idle.draw(surface, now);
        }
        if self.idle.as_ref().is_some_and(|idle| idle.is_done(now)) {
            self.idle = None;
        }

        layers
            .images
            .update(now, &self.overlay_images, canvas, &mut self.rng);
        layers.images.draw(surface, &self.overlay_images, now);

        if let Some(handover) = layers.ambient.update(now, &mut layers.graph, &mut self.rng) {
            self.bus.emit_lossy(SessionEvent::CrossfadeStarted {
                from_slot: handover.from,
                to_slot: handover.to,
            });
        }
        if let Some(phase) = layers.spectral.update(now, &mut layers.graph, &mut self.rng) {
            self.bus
                .emit_lossy(SessionEvent::SpectralPhaseChanged { phase });
        }

        layers.ambient.sync_gains(&layers.graph, now);
        layers.spectral.sync_gains(&layers.graph, now);
    }

    /// Pause everything and reset the voice and image layers
    pub fn stop(&mut self, now: f64) {
        if !self.running {
            return;
        }
        self.running = false;
        if let Some(layers) = self.layers.as_mut() {
            layers.video.pause();
            layers.ambient.stop(&mut layers.graph);
            layers.spectral.stop(&mut layers.graph);
            if let Some(param) = layers.graph.param_mut(layers.layer_master) {
                param.set_value(1.0);
            }
            layers.images.reset(now);
        }
        info!("Remix stopped");
        self.bus.emit_lossy(SessionEvent::PlaybackStateChanged {
            old_state: PlaybackState::Playing,
            new_state: PlaybackState::Idle,
            timestamp: clock::now(),
        });
    }

    /// Stop and release every media element
    pub fn dispose(&mut self, now: f64) {
        self.stop(now);
        if let Some(mut layers) = self.layers.take() {
            layers.video.release();
            layers.ambient.release();
            layers.spectral.release();
        }
        self.idle = None;
        self.overlay_images.clear();
        debug!("Remix disposed");
    }

    pub fn set_master_volume(&mut self, volume: f32, now: f64) {
        self.volume = volume.clamp(0.0, 1.0);
        self.apply_master(now);
    }

    /// Returns the new mute state
    pub fn toggle_mute(&mut self, now: f64) -> bool {
        self.muted = !self.muted;
        self.apply_master(now);
        self.muted
    }

    fn apply_master(&mut self, now: f64) {
        let level = if self.muted { 0.0 } else { self.volume };
        if let Some(layers) = self.layers.as_mut() {
            if let Some(param) = layers.graph.param_mut(layers.master) {
                param.set_value(level);
            }
            layers.ambient.sync_gains(&layers.graph, now);
            layers.spectral.sync_gains(&layers.graph, now);
        }
    }

    fn build_layers(&self) -> Result<Layers> {
        let sources: Vec<VideoSource> = self
            .materials
            .iter()
            .filter_map(|m| {
                m.url(MediaKind::Video).map(|url| VideoSource {
                    url: url.to_string(),
                    material_id: Some(m.external_id.clone()),
                })
            })
            .collect();
        if sources.is_empty() {
            return Err(Error::MaterialsUnavailable(
                "no videos available for the remix".to_string(),
            ));
        }

        let mut graph = MixGraph::new();
        let master = graph.add("master", self.volume, None);
        let layer_master = graph.add("layer-master", 1.0, Some(master));

        let ambient = Crossfader::new(
            &self.backend,
            urls_of(&self.materials, MediaKind::AmbientAudio),
            self.preset.crossfade_at,
            self.preset.crossfade_duration,
            &mut graph,
            layer_master,
        );
        let spectral = SpectralLayer::new(
            &self.backend,
            urls_of(&self.materials, MediaKind::SpectralAudio),
            SpectralTiming::from(&self.preset),
            &mut graph,
            Some(master),
            layer_master,
        );

        Ok(Layers {
            video: DoubleBuffer::new(&self.backend, sources, self.preset.clip_rate),
            graph,
            master,
            layer_master,
            ambient,
            spectral,
            images: ImageLayer::new(ImageLayerTiming::from(&self.preset)),
        })
    }
}
