//! Chained audio channel
//!
//! One audio channel of a cascata score: a small pool of preloaded clips
//! played back to back, cycling through the pool, under one gain envelope.
//!
//! # State machine
//!
//! ```text
//! Idle ──activate──▶ Playing(0) ──finished──▶ Playing(1) ──finished──▶ ... Playing(N-1) ──▶ Playing(0)
//! ```
//!
//! The only transition signal is "the active member finished", observed by
//! [`AudioChannel::poll`] once per frame. Members in the error state are
//! skipped on hand-off.
//!
//! # Gain
//!
//! Every member has its own node under the channel node; the envelope is
//! scheduled on the channel node. Ambient channels hang off the shared duck
//! node, so their effective gain is `member × channel × duck × master`.

use super::gain::{MixGraph, NodeId};
use crate::media::{try_play, AudioHandle, MediaElement};
use crate::score::AudioMix;
use tracing::{debug, warn};

/// Playback state of a chained channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Idle,
    Playing(usize),
}

/// One chained audio channel
pub struct AudioChannel {
    label: String,
    handles: Vec<Box<dyn AudioHandle>>,
    member_nodes: Vec<NodeId>,
    channel_node: NodeId,
    mix: AudioMix,
    state: ChainState,
}

impl AudioChannel {
    /// Wire `handles` into `graph` under `parent`
    ///
    /// The channel node starts at 0 so nothing is audible before
    /// activation.
    pub fn new(
        label: impl Into<String>,
        handles: Vec<Box<dyn AudioHandle>>,
        mix: AudioMix,
        graph: &mut MixGraph,
        parent: Option<NodeId>,
    ) -> Self {
        let label = label.into();
        let channel_node = graph.add(label.clone(), 0.0, parent);
        let member_nodes = (0..handles.len())
            .map(|i| graph.add(format!("{}/{}", label, i), 1.0, Some(channel_node)))
            .collect();
        Self {
            label,
            handles,
            member_nodes,
            channel_node,
            mix,
            state: ChainState::Idle,
        }
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn channel_node(&self) -> NodeId {
        self.channel_node
    }

    pub fn handles(&self) -> &[Box<dyn AudioHandle>] {
        &self.handles
    }

    /// Start member 0 and schedule the envelope
    ///
    /// `now` is the clock time, `remaining` the seconds left before the
    /// session's hard cut. A channel with no usable members stays idle.
    pub fn activate(&mut self, now: f64, remaining: f64, graph: &mut MixGraph) {
        if self.state != ChainState::Idle {
            return;
        }
        let Some(first) = self.first_usable(0) else {
            debug!("{}: no usable clips, staying silent", self.label);
            return;
        };

        if let Some(param) = graph.param_mut(self.channel_node) {
            let mix = &self.mix;
            param.cancel_scheduled_values(now);
            param.set_value_at_time(0.0, now);
            param.linear_ramp_to_value_at_time(mix.gain, now + mix.fade_in);

            let fade_out_end = remaining - mix.end_offset;
            let fade_out_start = fade_out_end - mix.fade_out;
            if fade_out_start > mix.fade_in {
                param.set_value_at_time(mix.gain, now + fade_out_start);
                param.linear_ramp_to_value_at_time(0.0, now + fade_out_end);
            }
        }

        self.start_member(first);
        debug!(
            "{}: activated with {} clips, {:.1}s before the cut",
            self.label,
            self.handles.len(),
            remaining
        );
    }

    /// Hand off to the next pool member, wrapping around
    ///
    /// Returns the new active index, or None when the channel is idle or has
    /// no usable member left.
    pub fn on_finished(&mut self) -> Option<usize> {
        let ChainState::Playing(current) = self.state else {
            return None;
        };
        let n = self.handles.len();
        if n == 0 {
            self.state = ChainState::Idle;
            return None;
        }

        match self.first_usable((current + 1) % n) {
            Some(next) => {
                self.start_member(next);
                Some(next)
            }
            None => {
                warn!("{}: every clip failed, channel goes silent", self.label);
                self.state = ChainState::Idle;
                None
            }
        }
    }

    /// Check the active member for a natural end and hand off if so
    pub fn poll(&mut self) -> Option<usize> {
        let ChainState::Playing(current) = self.state else {
            return None;
        };
        let finished = self
            .handles
            .get(current)
            .map(|h| h.has_ended() || h.has_error())
            .unwrap_or(true);
        if finished {
            self.on_finished()
        } else {
            None
        }
    }

    /// Push effective gains from the graph to the elements
    pub fn sync_gains(&mut self, graph: &MixGraph, now: f64) {
        for (handle, node) in self.handles.iter_mut().zip(&self.member_nodes) {
            handle.set_output_gain(graph.effective(*node, now));
        }
    }

    /// Zero the channel at `now` and pause every member
    pub fn silence(&mut self, now: f64, graph: &mut MixGraph) {
        graph.silence(&[self.channel_node], now);
        for handle in &mut self.handles {
            handle.pause();
            handle.set_output_gain(0.0);
        }
    }

    /// Release every member; the channel is unusable afterwards
    pub fn release(&mut self) {
        for handle in &mut self.handles {
            handle.release();
        }
        self.handles.clear();
        self.member_nodes.clear();
        self.state = ChainState::Idle;
    }

    fn first_usable(&self, from: usize) -> Option<usize> {
        let n = self.handles.len();
        (0..n)
            .map(|offset| (from + offset) % n)
            .find(|&i| !self.handles[i].has_error())
    }

    fn start_member(&mut self, index: usize) {
        if let Some(handle) = self.handles.get_mut(index) {
            handle.seek(0.0);
            try_play(handle.as_mut(), &self.label);
        }
        self.state = ChainState::Playing(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::headless::{HeadlessBackend, HeadlessConfig};
    use crate::media::MediaBackend;

    fn mix() -> AudioMix {
        AudioMix {
            gain: 1.0,
            fade_in: 2.0,
            fade_out: 2.0,
            end_offset: 0.0,
        }
    }

    async fn channel_of(backend: &HeadlessBackend, urls: &[&str], graph: &mut MixGraph) -> AudioChannel {
        let mut handles = Vec::new();
        for url in urls {
            handles.push(backend.load_audio(url).await.unwrap());
        }
        AudioChannel::new("ambient-0", handles, mix(), graph, None)
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_wraps_modulo_pool_size() {
        let backend = HeadlessBackend::default();
        let mut graph = MixGraph::new();
        let mut channel = channel_of(&backend, &["a.mp3", "b.mp3", "c.mp3"], &mut graph).await;

        channel.activate(0.0, 20.0, &mut graph);
        assert_eq!(channel.state(), ChainState::Playing(0));

        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(channel.on_finished().unwrap());
        }
        assert_eq!(seen, vec![1, 2, 0, 1, 2, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_hands_off_on_natural_end() {
        let backend = HeadlessBackend::new(HeadlessConfig::default().with_duration("a.mp3", 1.0));
        let mut graph = MixGraph::new();
        let mut channel = channel_of(&backend, &["a.mp3", "b.mp3"], &mut graph).await;

        channel.activate(0.0, 20.0, &mut graph);
        assert_eq!(channel.poll(), None);

        backend.advance(1.5);
        assert_eq!(channel.poll(), Some(1));
        assert!(!channel.handles()[1].is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_envelope_fades_in_and_out() {
        let backend = HeadlessBackend::default();
        let mut graph = MixGraph::new();
        let mut channel = channel_of(&backend, &["a.mp3"], &mut graph).await;

        // Enters 4s into a 20s session
        channel.activate(4.0, 16.0, &mut graph);
        let node = channel.channel_node();
        assert_eq!(graph.value_at(node, 4.0), 0.0);
        assert!((graph.value_at(node, 5.0) - 0.5).abs() < 1e-6);
        assert!((graph.value_at(node, 10.0) - 1.0).abs() < 1e-6);
        assert!((graph.value_at(node, 19.0) - 0.5).abs() < 1e-6);
        assert_eq!(graph.value_at(node, 20.0), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_entry_skips_fade_out() {
        let backend = HeadlessBackend::default();
        let mut graph = MixGraph::new();
        let mut channel = channel_of(&backend, &["a.mp3"], &mut graph).await;

        channel.activate(17.0, 3.0, &mut graph);
        assert!((graph.value_at(channel.channel_node(), 25.0) - 1.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_channel_stays_idle() {
        let mut graph = MixGraph::new();
        let mut channel = AudioChannel::new("spectral-0", Vec::new(), mix(), &mut graph, None);
        channel.activate(0.0, 20.0, &mut graph);
        assert_eq!(channel.state(), ChainState::Idle);
        assert_eq!(channel.on_finished(), None);
        assert_eq!(channel.poll(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_member_skipped() {
        let backend = HeadlessBackend::default();
        let mut graph = MixGraph::new();
        let mut channel = channel_of(&backend, &["a.mp3", "b.mp3", "c.mp3"], &mut graph).await;
        channel.activate(0.0, 20.0, &mut graph);

        backend.fail("b.mp3");
        assert_eq!(channel.on_finished(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_pauses_and_zeroes() {
        let backend = HeadlessBackend::default();
        let mut graph = MixGraph::new();
        let mut channel = channel_of(&backend, &["a.mp3", "b.mp3"], &mut graph).await;
        channel.activate(0.0, 20.0, &mut graph);
        channel.sync_gains(&graph, 10.0);
        assert!(backend.element_by_src("a.mp3").unwrap().gain > 0.9);

        channel.silence(10.0, &mut graph);
        assert!(backend.playing_elements().is_empty());
        assert_eq!(graph.value_at(channel.channel_node(), 15.0), 0.0);
        assert_eq!(backend.element_by_src("a.mp3").unwrap().gain, 0.0);
    }
}
