//! Playback session
//!
//! Everything one cascata session needs, built when its preload finishes
//! and dropped at the hard cut:
//!
//! - the [`Score`] and the handles its preload produced
//! - per-channel runtime state, one [`ChannelState`] variant per kind
//! - the mix graph (master → ambient duck → channels)
//! - the acceleration state and the hard-cut guard
//!
//! [`PlaybackSession::tick`] is called once per frame with the clock
//! reading. Elapsed time is always `now - origin`, where the origin is the
//! reading passed to [`PlaybackSession::start`].

use super::audio::{AudioChannel, MixGraph, NodeId};
use super::backdrop::Backdrop;
use super::speed::{AccelSchedule, AccelState, SpeedCurve};
use super::visual::{CycleTiming, ImageChannel, VideoChannel};
use crate::config::CascataPreset;
use crate::geometry::BLACK;
use crate::media::{try_play, ImageHandle, MediaElement, Surface, VideoHandle};
use crate::preload::ResourceTable;
use crate::score::{AudioRole, ChannelKind, Score};
use rand::rngs::StdRng;
use rand::Rng;
use snh_common::clock;
use snh_common::events::{ChannelTag, EventBus, SessionEvent};
use tracing::{debug, info};

/// Runtime state of one channel, by kind
pub enum ChannelState {
    Image(ImageChannel),
    Video(VideoChannel),
    Audio(AudioChannel),
}

struct ChannelSlot {
    tag: ChannelTag,
    enter_at: f64,
    entered: bool,
    state: ChannelState,
}

/// Result of one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// The hard cut ran (this frame or earlier)
    Finished,
}

pub struct PlaybackSession {
    score: Score,
    images: Vec<Box<dyn ImageHandle>>,
    videos: Vec<Box<dyn VideoHandle>>,
    channels: Vec<ChannelSlot>,
    graph: MixGraph,
    master: NodeId,
    duck: NodeId,
    curve: SpeedCurve,
    timing: CycleTiming,
    accel: AccelState,
    bus: EventBus,
    rng: StdRng,
    origin: Option<f64>,
    last_tick: Option<f64>,
    hard_cut_done: bool,
    released: bool,
}

impl PlaybackSession {
    /// Wire a preloaded score into channels and the mix graph
    pub fn new(
        score: Score,
        resources: ResourceTable,
        preset: &CascataPreset,
        bus: EventBus,
        rng: StdRng,
    ) -> Self {
        let ResourceTable {
            images,
            videos,
            audio,
        } = resources;
        let mut audio = audio.into_iter();

        let mut graph = MixGraph::new();
        let master = graph.add("master", 1.0, None);
        let duck = graph.add("ambient-duck", 1.0, Some(master));

        let mut channels = Vec::with_capacity(score.channels.len());
        for (index, event) in score.channels.iter().enumerate() {
            let handles = audio.next().unwrap_or_default();
            let state = match &event.kind {
                ChannelKind::Image(bounds) => ChannelState::Image(ImageChannel::new(*bounds)),
                ChannelKind::Video(bounds) => ChannelState::Video(VideoChannel::new(*bounds)),
                ChannelKind::Audio { role, mix } => {
                    let (label, parent) = match role {
                        AudioRole::Ambient => (format!("ambient-{}", index), duck),
                        AudioRole::Spectral => (format!("spectral-{}", index), master),
                    };
                    ChannelState::Audio(AudioChannel::new(
                        label,
                        handles,
                        *mix,
                        &mut graph,
                        Some(parent),
                    ))
                }
            };
            channels.push(ChannelSlot {
                tag: event.kind.tag(),
                enter_at: event.enter_at,
                entered: false,
                state,
            });
        }

        let accel = AccelState::new(AccelSchedule::new(
            score.accel_start,
            preset.accel_interval,
            preset.accel_step,
        ));

        Self {
            score,
            images,
            videos,
            channels,
            graph,
            master,
            duck,
            curve: SpeedCurve::new(
                preset.speed_exponent,
                preset.speed_max_mult,
                preset.video_speed_cap,
            ),
            timing: CycleTiming::from(preset),
            accel,
            bus,
            rng,
            origin: None,
            last_tick: None,
            hard_cut_done: false,
            released: false,
        }
    }

    pub fn score(&self) -> &Score {
        &self.score
    }

    /// Clock reading at playback start
    pub fn origin(&self) -> Option<f64> {
        self.origin
    }

    pub fn elapsed(&self, now: f64) -> f64 {
        self.origin.map_or(0.0, |origin| now - origin)
    }

    pub fn is_finished(&self) -> bool {
        self.hard_cut_done
    }

    pub fn accel_steps(&self) -> u32 {
        self.accel.steps()
    }

    pub fn playback_rate(&self) -> f64 {
        self.accel.rate()
    }

    pub fn graph(&self) -> &MixGraph {
        &self.graph
    }

    pub fn master_node(&self) -> NodeId {
        self.master
    }

    pub fn duck_node(&self) -> NodeId {
        self.duck
    }

    pub fn channel_states(&self) -> impl Iterator<Item = &ChannelState> {
        self.channels.iter().map(|slot| &slot.state)
    }

    /// Channels whose entry time has passed
    pub fn entered_count(&self) -> usize {
        self.channels.iter().filter(|slot| slot.entered).count()
    }

    /// Capture the time origin and start the shared clips
    ///
    /// Shared videos loop muted from random offsets so any video channel can
    /// pick one up mid-clip.
    pub fn start(&mut self, now: f64) {
        if self.origin.is_some() {
            return;
        }
        self.origin = Some(now);
        self.last_tick = Some(now);
        for video in &mut self.videos {
            if let Some(duration) = video.duration().filter(|d| *d > 0.0) {
                video.seek(self.rng.gen::<f64>() * duration);
            }
            try_play(video.as_mut(), "shared video");
        }
        info!(
            "Session {} started: {}s, {} channels",
            self.score.id,
            self.score.duration,
            self.channels.len()
        );
    }

    /// Run one frame
    pub fn tick(&mut self, now: f64, surface: &mut dyn Surface, backdrop: &mut Backdrop) -> TickOutcome {
        if self.hard_cut_done {
            return TickOutcome::Finished;
        }
        let Some(origin) = self.origin else {
            return TickOutcome::Continue;
        };

        let elapsed = now - origin;
        let duration = self.score.duration;
        if elapsed >= duration {
            self.hard_cut(now);
            return TickOutcome::Finished;
        }

        let speed = self.curve.multiplier(elapsed, duration);
        let video_speed = self.curve.video_multiplier(elapsed, duration);
        let dt = self.last_tick.map_or(0.0, |last| (now - last).max(0.0));
        self.last_tick = Some(now);

        surface.clear(BLACK);
        backdrop.drift(dt, speed);
        backdrop.draw(surface, now);

        let canvas = surface.size();
        let session_id = self.score.id;
        let Self {
            channels,
            images,
            videos,
            graph,
            timing,
            rng,
            bus,
            ..
        } = self;

        for (index, slot) in channels.iter_mut().enumerate() {
            if elapsed < slot.enter_at {
                continue;
            }
            if !slot.entered {
                slot.entered = true;
                debug!("Channel {} ({:?}) entered at {:.2}s", index, slot.tag, elapsed);
                bus.emit_lossy(SessionEvent::ChannelEntered {
                    session_id,
                    channel_index: index,
                    channel: slot.tag,
                    elapsed,
                });
                if let ChannelState::Audio(channel) = &mut slot.state {
                    channel.activate(now, duration - elapsed, graph);
                }
            }

            match &mut slot.state {
                ChannelState::Image(channel) => {
                    channel.update(now, speed, timing, images, canvas, rng);
                    channel.draw(surface, images);
                }
                ChannelState::Video(channel) => {
                    channel.update(now, video_speed, timing, videos, canvas, rng);
                    channel.draw(surface, videos);
                }
                ChannelState::Audio(channel) => {
                    if let Some(member) = channel.poll() {
                        debug!("Channel {} chained to clip {}", index, member);
                        bus.emit_lossy(SessionEvent::AudioChainAdvanced {
                            session_id,
                            channel_index: index,
                            member,
                        });
                    }
                    channel.sync_gains(graph, now);
                }
            }
        }

        if let Some(rate) = self.accel.update(elapsed) {
            for video in &mut self.videos {
                video.set_playback_rate(rate);
            }
            info!(
                "Acceleration step {} at {:.2}s: rate {:.2}",
                self.accel.steps(),
                elapsed,
                rate
            );
            self.bus.emit_lossy(SessionEvent::AccelerationStep {
                session_id,
                steps: self.accel.steps(),
                playback_rate: rate,
            });
        }

        TickOutcome::Continue
    }

    /// Silence and pause everything; runs once per session
    ///
    /// Returns false when the cut had already run.
    pub fn hard_cut(&mut self, now: f64) -> bool {
        if self.hard_cut_done {
            return false;
        }
        self.hard_cut_done = true;

        for slot in &mut self.channels {
            if let ChannelState::Audio(channel) = &mut slot.state {
                channel.silence(now, &mut self.graph);
            }
        }
        self.graph.silence(&[self.master], now);
        for video in &mut self.videos {
            video.pause();
        }

        let elapsed = self.elapsed(now);
        info!("Hard cut of session {} at {:.2}s", self.score.id, elapsed);
        self.bus.emit_lossy(SessionEvent::HardCut {
            session_id: self.score.id,
            elapsed,
            timestamp: clock::now(),
        });
        true
    }

    /// Release every handle created for this session
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        for slot in &mut self.channels {
            if let ChannelState::Audio(channel) = &mut slot.state {
                channel.release();
            }
        }
        for video in &mut self.videos {
            video.release();
        }
        self.videos.clear();
        self.images.clear();
        debug!("Session {} released", self.score.id);
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::headless::{HeadlessBackend, RecordingSurface};
    use crate::preload::Preloader;
    use crate::score::{AudioMix, ChannelEvent};
    use rand::SeedableRng;
    use std::time::Duration;
    use uuid::Uuid;

    fn score() -> Score {
        let preset = CascataPreset::default();
        Score {
            id: Uuid::nil(),
            duration: 20.0,
            accel_start: 14.8,
            channels: vec![
                ChannelEvent {
                    kind: ChannelKind::Image(preset.overlay),
                    enter_at: 0.0,
                    pool: vec!["a.png".to_string()],
                },
                ChannelEvent {
                    kind: ChannelKind::Audio {
                        role: AudioRole::Ambient,
                        mix: AudioMix {
                            gain: 1.0,
                            fade_in: 2.0,
                            fade_out: 2.0,
                            end_offset: 0.0,
                        },
                    },
                    enter_at: 1.0,
                    pool: vec!["x.mp3".to_string()],
                },
                ChannelEvent {
                    kind: ChannelKind::Video(preset.overlay),
                    enter_at: 4.0,
                    pool: vec!["v.mp4".to_string()],
                },
            ],
            shared_images: vec!["a.png".to_string()],
            shared_videos: vec!["v.mp4".to_string()],
        }
    }

    async fn session(backend: &HeadlessBackend) -> PlaybackSession {
        let preloader = Preloader::new(backend.clone(), Duration::from_secs(15));
        let score = score();
        let (resources, _) = preloader.preload(&score, |_| {}).await;
        PlaybackSession::new(
            score,
            resources,
            &CascataPreset::default(),
            EventBus::default(),
            StdRng::seed_from_u64(7),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_channels_enter_in_order() {
        let backend = HeadlessBackend::default();
        let mut session = session(&backend).await;
        let mut surface = RecordingSurface::new(1600.0, 900.0);
        let mut backdrop = Backdrop::new((1600.0, 900.0), 45, 1.5, 1.0);

        session.start(100.0);
        session.tick(100.5, &mut surface, &mut backdrop);
        assert_eq!(session.entered_count(), 1);
        session.tick(102.0, &mut surface, &mut backdrop);
        assert_eq!(session.entered_count(), 2);
        session.tick(104.0, &mut surface, &mut backdrop);
        assert_eq!(session.entered_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hard_cut_at_duration() {
        let backend = HeadlessBackend::default();
        let mut session = session(&backend).await;
        let mut surface = RecordingSurface::new(1600.0, 900.0);
        let mut backdrop = Backdrop::new((1600.0, 900.0), 45, 1.5, 1.0);

        session.start(0.0);
        assert_eq!(session.tick(19.9, &mut surface, &mut backdrop), TickOutcome::Continue);
        assert!(!session.is_finished());
        assert_eq!(session.tick(20.0, &mut surface, &mut backdrop), TickOutcome::Finished);
        assert!(session.is_finished());
        assert!(backend.playing_elements().is_empty());
        assert!(!session.hard_cut(20.1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_is_idempotent() {
        let backend = HeadlessBackend::default();
        let mut session = session(&backend).await;
        assert_eq!(backend.live_elements(), 2);
        session.release();
        session.release();
        assert_eq!(backend.live_elements(), 0);
    }
}
