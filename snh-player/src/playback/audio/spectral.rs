//! Spectral appearances
//!
//! Every so often a voice clip rises over the remix's ambient bed:
//!
//! ```text
//! Stopped ─start─▶ Waiting ─due─▶ Arming ─ready─▶ FadingIn ─▶ Peak ─▶ FadingOut ─▶ Waiting
//! ```
//!
//! While the voice fades in, the layer master is ducked; on fade-out both
//! ramps run in reverse. A clip that ends during FadingIn or Peak is
//! followed by another random clip so the voice does not drop out early.

use super::gain::{MixGraph, NodeId};
use crate::config::{Range, RemixPreset};
use crate::media::{try_play, AudioHandle, MediaBackend, MediaElement, ReadyState};
use rand::seq::SliceRandom;
use rand::Rng;
use snh_common::events::SpectralPhase;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpectralState {
    Stopped,
    Waiting { until: f64 },
    /// Clip loading; plays as soon as it can
    Arming,
    FadingIn { until: f64 },
    Peak { until: f64 },
    FadingOut { until: f64 },
}

impl SpectralState {
    pub fn phase(&self) -> SpectralPhase {
        match self {
            SpectralState::Stopped | SpectralState::Waiting { .. } | SpectralState::Arming => {
                SpectralPhase::Idle
            }
            SpectralState::FadingIn { .. } => SpectralPhase::FadingIn,
            SpectralState::Peak { .. } => SpectralPhase::Peak,
            SpectralState::FadingOut { .. } => SpectralPhase::FadingOut,
        }
    }
}

/// Timing and levels of an appearance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralTiming {
    pub interval: Range,
    pub peak: Range,
    pub fade: f64,
    pub peak_gain: f32,
    pub duck_level: f32,
}

impl From<&RemixPreset> for SpectralTiming {
    fn from(preset: &RemixPreset) -> Self {
        Self {
            interval: preset.spectral_interval,
            peak: preset.spectral_peak,
            fade: preset.spectral_fade,
            peak_gain: preset.spectral_peak_gain,
            duck_level: preset.duck_level,
        }
    }
}

/// Voice layer ducking the ambient master
pub struct SpectralLayer {
    handle: Box<dyn AudioHandle>,
    node: NodeId,
    duck: NodeId,
    urls: Vec<String>,
    timing: SpectralTiming,
    state: SpectralState,
    /// A chained clip is loading
    reloading: bool,
}

impl SpectralLayer {
    /// `duck` is the node lowered during appearances
    pub fn new<B: MediaBackend>(
        backend: &B,
        urls: Vec<String>,
        timing: SpectralTiming,
        graph: &mut MixGraph,
        parent: Option<NodeId>,
        duck: NodeId,
    ) -> Self {
        Self {
            handle: backend.create_audio(),
            node: graph.add("spectral", 0.0, parent),
            duck,
            urls,
            timing,
            state: SpectralState::Stopped,
            reloading: false,
        }
    }

    pub fn state(&self) -> SpectralState {
        self.state
    }

    pub fn phase(&self) -> SpectralPhase {
        self.state.phase()
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn handle(&self) -> &dyn AudioHandle {
        self.handle.as_ref()
    }

    /// Schedule the first appearance
    pub fn start<R: Rng + ?Sized>(&mut self, now: f64, rng: &mut R) {
        if self.urls.is_empty() {
            debug!("No spectral clips, voice layer disabled");
            return;
        }
        let wait = self.timing.interval.sample(rng);
        self.state = SpectralState::Waiting { until: now + wait };
        info!("Next spectral appearance in {:.0}s", wait);
    }

    /// Advance one frame; returns the new phase when it changed
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        now: f64,
        graph: &mut MixGraph,
        rng: &mut R,
    ) -> Option<SpectralPhase> {
        let before = self.state.phase();

        match self.state {
            SpectralState::Stopped => {}
            SpectralState::Waiting { until } => {
                if now >= until {
                    self.load(rng);
                    self.state = SpectralState::Arming;
                }
            }
            SpectralState::Arming => {
                if self.handle.has_error() {
                    warn!("Spectral clip failed to load, waiting for the next slot");
                    self.wait(now, rng);
                } else if self.handle.ready_state() >= ReadyState::HaveFutureData {
                    self.handle.seek(0.0);
                    try_play(self.handle.as_mut(), "spectral");
                    ramp(graph, self.node, self.timing.peak_gain, now, self.timing.fade);
                    ramp(graph, self.duck, self.timing.duck_level, now, self.timing.fade);
                    self.state = SpectralState::FadingIn {
                        until: now + self.timing.fade,
                    };
                }
            }
            SpectralState::FadingIn { until } => {
                self.keep_voice_going(rng);
                if now >= until {
                    let peak = self.timing.peak.sample(rng);
                    self.state = SpectralState::Peak { until: now + peak };
                    debug!("Spectral peak for {:.0}s", peak);
                }
            }
            SpectralState::Peak { until } => {
                self.keep_voice_going(rng);
                if now >= until {
                    ramp(graph, self.node, 0.0, now, self.timing.fade);
                    ramp(graph, self.duck, 1.0, now, self.timing.fade);
                    self.state = SpectralState::FadingOut {
                        until: now + self.timing.fade,
                    };
                }
            }
            SpectralState::FadingOut { until } => {
                if now >= until {
                    self.handle.pause();
                    self.reloading = false;
                    self.wait(now, rng);
                }
            }
        }

        let after = self.state.phase();
        if after != before {
            info!("Spectral phase {:?} -> {:?}", before, after);
            Some(after)
        } else {
            None
        }
    }

    pub fn sync_gains(&mut self, graph: &MixGraph, now: f64) {
        self.handle.set_output_gain(graph.effective(self.node, now));
    }

    /// Pause, silence and go back to Stopped
    pub fn stop(&mut self, graph: &mut MixGraph) {
        self.handle.pause();
        self.handle.set_output_gain(0.0);
        if let Some(param) = graph.param_mut(self.node) {
            param.set_value(0.0);
        }
        self.reloading = false;
        self.state = SpectralState::Stopped;
    }

    pub fn release(&mut self) {
        self.handle.release();
        self.state = SpectralState::Stopped;
    }

    fn wait<R: Rng + ?Sized>(&mut self, now: f64, rng: &mut R) {
        self.state = SpectralState::Waiting {
            until: now + self.timing.interval.sample(rng),
        };
    }

    fn load<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if let Some(url) = self.urls.choose(rng) {
            self.handle.set_source(Some(url.as_str()));
            debug!("Spectral clip {}", url);
        }
    }

    fn keep_voice_going<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.reloading {
            if self.handle.ready_state() >= ReadyState::HaveFutureData {
                self.reloading = false;
                try_play(self.handle.as_mut(), "spectral");
            } else if self.handle.has_error() {
                self.load(rng);
            }
        } else if self.handle.has_ended() || self.handle.has_error() {
            self.load(rng);
            self.reloading = true;
        }
    }
}

/// Ramp `node` from its current value to `target` over `duration`
fn ramp(graph: &mut MixGraph, node: NodeId, target: f32, now: f64, duration: f64) {
    let current = graph.value_at(node, now);
    if let Some(param) = graph.param_mut(node) {
        param.cancel_scheduled_values(now);
        param.set_value_at_time(current, now);
        param.linear_ramp_to_value_at_time(target, now + duration);
    }
}
