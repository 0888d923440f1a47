//! A/B ambient crossfade
//!
//! Continuous ambient bed for the remix engine. Two audio elements, slot A
//! and slot B, alternate: once the active slot has played
//! `crossfade_at` seconds (or ended early), the idle slot is loaded with a
//! random ambient clip, and when it can play the two are crossfaded over
//! `crossfade_duration` seconds. The outgoing slot is paused once its ramp
//! is over or it ends, which frees it for the next crossfade.
//!
//! Both slots route through a shared parent node (the layer master) so the
//! spectral layer can duck the whole bed.

use super::gain::{MixGraph, NodeId};
use crate::media::{try_play, AudioHandle, MediaBackend, MediaElement, ReadyState};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

const SLOT_NAMES: [char; 2] = ['A', 'B'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingStart {
    /// First clip of the layer: play at full gain
    Initial,
    /// Incoming clip of a crossfade
    CrossfadeIn,
}

struct Slot {
    handle: Box<dyn AudioHandle>,
    node: NodeId,
    pending: Option<PendingStart>,
}

/// Crossfade hand-over reported by [`Crossfader::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handover {
    pub from: char,
    pub to: char,
}

/// Two-slot ambient crossfader
pub struct Crossfader {
    slots: [Slot; 2],
    active: usize,
    /// Outgoing slot and the time its ramp reaches 0
    releasing: Option<(usize, f64)>,
    urls: Vec<String>,
    crossfade_at: f64,
    crossfade_duration: f64,
    running: bool,
}

impl Crossfader {
    pub fn new<B: MediaBackend>(
        backend: &B,
        urls: Vec<String>,
        crossfade_at: f64,
        crossfade_duration: f64,
        graph: &mut MixGraph,
        master: NodeId,
    ) -> Self {
        let mut slot = |name: char| Slot {
            handle: backend.create_audio(),
            node: graph.add(format!("ambient-{}", name), 0.0, Some(master)),
            pending: None,
        };
        let slots = [slot(SLOT_NAMES[0]), slot(SLOT_NAMES[1])];
        Self {
            slots,
            active: 0,
            releasing: None,
            urls,
            crossfade_at,
            crossfade_duration,
            running: false,
        }
    }

    /// Name of the active slot
    pub fn active_slot(&self) -> char {
        SLOT_NAMES[self.active]
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn node(&self, slot: char) -> Option<NodeId> {
        SLOT_NAMES
            .iter()
            .position(|&n| n == slot)
            .map(|i| self.slots[i].node)
    }

    pub fn handle(&self, slot: char) -> Option<&dyn AudioHandle> {
        SLOT_NAMES
            .iter()
            .position(|&n| n == slot)
            .map(|i| self.slots[i].handle.as_ref())
    }

    /// Load a first clip into the active slot
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.urls.is_empty() {
            debug!("No ambient clips, crossfade layer stays silent");
            return;
        }
        self.running = true;
        self.load(self.active, PendingStart::Initial, rng);
    }

    /// Advance one frame; returns the hand-over when one started
    pub fn update<R: Rng + ?Sized>(&mut self, now: f64, graph: &mut MixGraph, rng: &mut R) -> Option<Handover> {
        if !self.running {
            return None;
        }

        let mut handover = None;
        for index in 0..2 {
            let Some(pending) = self.slots[index].pending else {
                continue;
            };
            if self.slots[index].handle.has_error() {
                warn!("Ambient slot {} failed to load, retrying", SLOT_NAMES[index]);
                self.load(index, pending, rng);
                continue;
            }
            if self.slots[index].handle.ready_state() < ReadyState::HaveFutureData {
                continue;
            }
            self.slots[index].pending = None;
            match pending {
                PendingStart::Initial => {
                    self.ramp(index, 1.0, now, 0.0, graph);
                    self.play(index);
                }
                PendingStart::CrossfadeIn => {
                    let outgoing = self.active;
                    self.ramp(outgoing, 0.0, now, self.crossfade_duration, graph);
                    self.ramp(index, 1.0, now, self.crossfade_duration, graph);
                    self.play(index);
                    self.active = index;
                    self.releasing = Some((outgoing, now + self.crossfade_duration));
                    info!(
                        "Ambient crossfade {} -> {}",
                        SLOT_NAMES[outgoing], SLOT_NAMES[index]
                    );
                    handover = Some(Handover {
                        from: SLOT_NAMES[outgoing],
                        to: SLOT_NAMES[index],
                    });
                }
            }
        }

        if let Some((outgoing, fade_end)) = self.releasing {
            let slot = &mut self.slots[outgoing];
            if slot.handle.has_ended() || now >= fade_end {
                slot.handle.pause();
                self.releasing = None;
                debug!("Ambient slot {} free", SLOT_NAMES[outgoing]);
            }
        }

        let idle = 1 - self.active;
        let active = &self.slots[self.active];
        let ready_for_next = self.releasing.is_none()
            && active.pending.is_none()
            && self.slots[idle].pending.is_none()
            && (active.handle.current_time() >= self.crossfade_at || active.handle.has_ended());
        if ready_for_next {
            self.load(idle, PendingStart::CrossfadeIn, rng);
        }

        handover
    }

    /// Push effective gains to both slots
    pub fn sync_gains(&mut self, graph: &MixGraph, now: f64) {
        for slot in &mut self.slots {
            slot.handle.set_output_gain(graph.effective(slot.node, now));
        }
    }

    /// Pause both slots and zero their gains
    pub fn stop(&mut self, graph: &mut MixGraph) {
        for slot in &mut self.slots {
            slot.handle.pause();
            slot.handle.set_output_gain(0.0);
            slot.pending = None;
            if let Some(param) = graph.param_mut(slot.node) {
                param.set_value(0.0);
            }
        }
        self.releasing = None;
        self.running = false;
    }

    pub fn release(&mut self) {
        for slot in &mut self.slots {
            slot.handle.release();
        }
        self.running = false;
    }

    fn load<R: Rng + ?Sized>(&mut self, index: usize, pending: PendingStart, rng: &mut R) {
        let Some(url) = self.urls.choose(rng) else {
            return;
        };
        let slot = &mut self.slots[index];
        slot.handle.set_source(Some(url.as_str()));
        slot.pending = Some(pending);
        debug!("Ambient slot {} loading {}", SLOT_NAMES[index], url);
    }

    fn play(&mut self, index: usize) {
        let handle = &mut self.slots[index].handle;
        handle.seek(0.0);
        try_play(handle.as_mut(), "ambient");
    }

    fn ramp(&self, index: usize, target: f32, now: f64, duration: f64, graph: &mut MixGraph) {
        let node = self.slots[index].node;
        let current = graph.value_at(node, now);
        if let Some(param) = graph.param_mut(node) {
            param.cancel_scheduled_values(now);
            if duration > 0.0 {
                param.set_value_at_time(current, now);
                param.linear_ramp_to_value_at_time(target, now + duration);
            } else {
                param.set_value_at_time(target, now);
            }
        }
    }
}
