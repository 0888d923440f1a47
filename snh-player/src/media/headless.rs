//! Headless media backend
//!
//! Simulated image/video/audio elements for tests, benchmarks and the CLI.
//! Nothing is decoded; each element tracks the state a browser element
//! would expose (source, ready state, position, paused/ended, rate, loop,
//! output gain) and moves forward only when [`HeadlessBackend::advance`]
//! is called.
//!
//! Two load paths exist, mirroring how the engines use media:
//!
//! - `load_*` futures sleep for the configured latency on the tokio clock,
//!   then resolve with a ready element (or fail, or never resolve)
//! - `set_source` on an existing element starts a pending load that settles
//!   after `latency` seconds of [`HeadlessBackend::advance`]
//!
//! Every video/audio element stays registered until released, so
//! [`HeadlessBackend::live_elements`] exposes leaks across sessions.

use super::{
    AudioHandle, ImageHandle, LoadError, LoadResult, MediaBackend, MediaElement,
    PlaybackRejected, ReadyState, Surface, VideoHandle,
};
use crate::geometry::{Rect, Rgba};
use futures::future::{FutureExt, LocalBoxFuture};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

/// Behaviour of the simulated media stack
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Time for a load to settle
    pub latency: Duration,
    pub image_size: (u32, u32),
    pub video_size: (u32, u32),
    /// Default clip lengths (seconds)
    pub video_duration: f64,
    pub audio_duration: f64,
    /// Per-URL clip length overrides
    pub durations: HashMap<String, f64>,
    /// URLs whose loads fail
    pub failing: HashSet<String>,
    /// URLs whose loads never settle
    pub hanging: HashSet<String>,
    /// Decline every `play()` call
    pub reject_play: bool,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(50),
            image_size: (1200, 800),
            video_size: (1280, 720),
            video_duration: 10.0,
            audio_duration: 10.0,
            durations: HashMap::new(),
            failing: HashSet::new(),
            hanging: HashSet::new(),
            reject_play: false,
        }
    }
}

impl HeadlessConfig {
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_duration(mut self, url: impl Into<String>, seconds: f64) -> Self {
        self.durations.insert(url.into(), seconds);
        self
    }

    pub fn failing(mut self, url: impl Into<String>) -> Self {
        self.failing.insert(url.into());
        self
    }

    pub fn hanging(mut self, url: impl Into<String>) -> Self {
        self.hanging.insert(url.into());
        self
    }

    pub fn rejecting_play(mut self) -> Self {
        self.reject_play = true;
        self
    }

    fn clip_length(&self, url: &str, kind: ElementKind) -> f64 {
        self.durations.get(url).copied().unwrap_or(match kind {
            ElementKind::Video => self.video_duration,
            ElementKind::Audio => self.audio_duration,
        })
    }

    fn outcome(&self, url: &str) -> Outcome {
        if self.hanging.contains(url) {
            Outcome::Never
        } else if self.failing.contains(url) {
            Outcome::Fail
        } else {
            Outcome::Ready
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Video,
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Ready,
    Fail,
    Never,
}

#[derive(Debug, Clone)]
struct PendingLoad {
    remaining: f64,
    outcome: Outcome,
}

/// State of one simulated media element
#[derive(Debug, Clone)]
pub struct SimElement {
    pub id: u64,
    pub kind: ElementKind,
    pub src: Option<String>,
    pub ready: ReadyState,
    pub error: bool,
    pub duration: Option<f64>,
    pub time: f64,
    pub paused: bool,
    pub ended: bool,
    pub rate: f64,
    pub looping: bool,
    pub gain: f32,
    pub size: Option<(u32, u32)>,
    pub released: bool,
    pending: Option<PendingLoad>,
}

impl SimElement {
    fn empty(id: u64, kind: ElementKind) -> Self {
        Self {
            id,
            kind,
            src: None,
            ready: ReadyState::HaveNothing,
            error: false,
            duration: None,
            time: 0.0,
            paused: true,
            ended: false,
            rate: 1.0,
            looping: false,
            gain: 1.0,
            size: None,
            released: false,
            pending: None,
        }
    }

    fn make_ready(&mut self, config: &HeadlessConfig) {
        let url = self.src.clone().unwrap_or_default();
        self.ready = ReadyState::HaveEnoughData;
        self.duration = Some(config.clip_length(&url, self.kind));
        if self.kind == ElementKind::Video {
            self.size = Some(config.video_size);
        }
        self.pending = None;
    }

    fn reset(&mut self) {
        self.ready = ReadyState::HaveNothing;
        self.error = false;
        self.duration = None;
        self.time = 0.0;
        self.paused = true;
        self.ended = false;
        self.size = None;
        self.pending = None;
    }

    fn step(&mut self, dt: f64, config: &HeadlessConfig) {
        if self.released {
            return;
        }

        let mut settled = None;
        if let Some(pending) = self.pending.as_mut() {
            if pending.outcome != Outcome::Never {
                pending.remaining -= dt;
                if pending.remaining <= 0.0 {
                    settled = Some(pending.outcome);
                }
            }
        }
        match settled {
            Some(Outcome::Ready) => self.make_ready(config),
            Some(_) => {
                self.error = true;
                self.pending = None;
            }
            None => {}
        }

        if self.paused || self.ended || self.ready < ReadyState::HaveFutureData {
            return;
        }

        self.time += dt * self.rate;
        if let Some(duration) = self.duration.filter(|d| *d > 0.0) {
            if self.time >= duration {
                if self.looping {
                    self.time %= duration;
                } else {
                    self.time = duration;
                    self.ended = true;
                    self.paused = true;
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    config: HeadlessConfig,
    next_id: u64,
    elements: Vec<Rc<RefCell<SimElement>>>,
}

impl Shared {
    fn register(&mut self, kind: ElementKind) -> Rc<RefCell<SimElement>> {
        self.next_id += 1;
        let element = Rc::new(RefCell::new(SimElement::empty(self.next_id, kind)));
        self.elements.push(element.clone());
        element
    }
}

/// Simulated media stack
#[derive(Debug, Clone, Default)]
pub struct HeadlessBackend {
    shared: Rc<RefCell<Shared>>,
}

impl HeadlessBackend {
    pub fn new(config: HeadlessConfig) -> Self {
        Self {
            shared: Rc::new(RefCell::new(Shared {
                config,
                ..Shared::default()
            })),
        }
    }

    /// Change the simulated behaviour (affects loads started afterwards)
    pub fn update_config(&self, f: impl FnOnce(&mut HeadlessConfig)) {
        f(&mut self.shared.borrow_mut().config);
    }

    /// Move every element forward by `dt` seconds of media time
    pub fn advance(&self, dt: f64) {
        let shared = self.shared.borrow();
        for element in &shared.elements {
            element.borrow_mut().step(dt, &shared.config);
        }
    }

    /// Video/audio elements created and not yet released
    pub fn live_elements(&self) -> usize {
        self.shared
            .borrow()
            .elements
            .iter()
            .filter(|e| !e.borrow().released)
            .count()
    }

    /// Snapshot of every element ever created
    pub fn elements(&self) -> Vec<SimElement> {
        self.shared
            .borrow()
            .elements
            .iter()
            .map(|e| e.borrow().clone())
            .collect()
    }

    /// Live elements currently playing (not paused, not ended)
    pub fn playing_elements(&self) -> Vec<SimElement> {
        self.elements()
            .into_iter()
            .filter(|e| !e.released && !e.paused && !e.ended)
            .collect()
    }

    /// Most recent live element whose source is `url`
    pub fn element_by_src(&self, url: &str) -> Option<SimElement> {
        self.elements()
            .into_iter()
            .rev()
            .find(|e| !e.released && e.src.as_deref() == Some(url))
    }

    /// Jump every live element playing `url` to its end
    pub fn finish(&self, url: &str) {
        self.each_with_src(url, |e| {
            e.time = e.duration.unwrap_or(e.time);
            if e.looping {
                e.time = 0.0;
            } else {
                e.ended = true;
                e.paused = true;
            }
        });
    }

    /// Force the ready state of every live element with source `url`
    pub fn set_ready(&self, url: &str, ready: ReadyState) {
        let config = self.shared.borrow().config.clone();
        self.each_with_src(url, |e| {
            if ready >= ReadyState::HaveFutureData {
                e.make_ready(&config);
            }
            e.ready = ready;
        });
    }

    /// Put every live element with source `url` in the error state
    pub fn fail(&self, url: &str) {
        self.each_with_src(url, |e| {
            e.error = true;
            e.pending = None;
        });
    }

    fn each_with_src(&self, url: &str, mut f: impl FnMut(&mut SimElement)) {
        let shared = self.shared.borrow();
        for element in &shared.elements {
            let mut e = element.borrow_mut();
            if !e.released && e.src.as_deref() == Some(url) {
                f(&mut e);
            }
        }
    }

    fn load_media(&self, url: &str, kind: ElementKind) -> LocalBoxFuture<'static, LoadResult<SimMedia>> {
        let shared = self.shared.clone();
        let url = url.to_string();
        async move {
            let (latency, outcome) = {
                let s = shared.borrow();
                (s.config.latency, s.config.outcome(&url))
            };
            if outcome == Outcome::Never {
                futures::future::pending::<()>().await;
            }
            tokio::time::sleep(latency).await;
            if outcome == Outcome::Fail {
                return Err(LoadError::Failed {
                    url,
                    reason: "decode error".to_string(),
                });
            }

            let mut s = shared.borrow_mut();
            let element = s.register(kind);
            {
                let mut e = element.borrow_mut();
                e.src = Some(url);
                e.make_ready(&s.config);
            }
            drop(s);
            Ok(SimMedia { element, shared })
        }
        .boxed_local()
    }

    fn create(&self, kind: ElementKind) -> SimMedia {
        let element = self.shared.borrow_mut().register(kind);
        SimMedia {
            element,
            shared: self.shared.clone(),
        }
    }
}

impl MediaBackend for HeadlessBackend {
    fn load_image(&self, url: &str) -> LocalBoxFuture<'static, LoadResult<Box<dyn ImageHandle>>> {
        let shared = self.shared.clone();
        let url = url.to_string();
        async move {
            let (latency, outcome, size) = {
                let s = shared.borrow();
                (s.config.latency, s.config.outcome(&url), s.config.image_size)
            };
            if outcome == Outcome::Never {
                futures::future::pending::<()>().await;
            }
            tokio::time::sleep(latency).await;
            match outcome {
                Outcome::Fail => Err(LoadError::Failed {
                    url,
                    reason: "image decode error".to_string(),
                }),
                _ => Ok(Box::new(SimImage { url, size }) as Box<dyn ImageHandle>),
            }
        }
        .boxed_local()
    }

    fn load_video(&self, url: &str) -> LocalBoxFuture<'static, LoadResult<Box<dyn VideoHandle>>> {
        self.load_media(url, ElementKind::Video)
            .map(|r| r.map(|m| Box::new(m) as Box<dyn VideoHandle>))
            .boxed_local()
    }

    fn load_audio(&self, url: &str) -> LocalBoxFuture<'static, LoadResult<Box<dyn AudioHandle>>> {
        self.load_media(url, ElementKind::Audio)
            .map(|r| r.map(|m| Box::new(m) as Box<dyn AudioHandle>))
            .boxed_local()
    }

    fn create_video(&self) -> Box<dyn VideoHandle> {
        Box::new(self.create(ElementKind::Video))
    }

    fn create_audio(&self) -> Box<dyn AudioHandle> {
        Box::new(self.create(ElementKind::Audio))
    }
}

/// Decoded still image
#[derive(Debug, Clone)]
pub struct SimImage {
    url: String,
    size: (u32, u32),
}

impl ImageHandle for SimImage {
    fn url(&self) -> &str {
        &self.url
    }

    fn natural_size(&self) -> (u32, u32) {
        self.size
    }
}

/// Handle onto a simulated video or audio element
#[derive(Debug)]
pub struct SimMedia {
    element: Rc<RefCell<SimElement>>,
    shared: Rc<RefCell<Shared>>,
}

impl SimMedia {
    pub fn id(&self) -> u64 {
        self.element.borrow().id
    }
}

impl MediaElement for SimMedia {
    fn src(&self) -> Option<String> {
        self.element.borrow().src.clone()
    }

    fn ready_state(&self) -> ReadyState {
        self.element.borrow().ready
    }

    fn duration(&self) -> Option<f64> {
        self.element.borrow().duration
    }

    fn current_time(&self) -> f64 {
        self.element.borrow().time
    }

    fn seek(&mut self, seconds: f64) {
        let mut e = self.element.borrow_mut();
        let mut t = seconds.max(0.0);
        if let Some(d) = e.duration {
            t = t.min(d);
        }
        e.time = t;
        e.ended = false;
    }

    fn play(&mut self) -> Result<(), PlaybackRejected> {
        let reject = self.shared.borrow().config.reject_play;
        let mut e = self.element.borrow_mut();
        if reject {
            return Err(PlaybackRejected("autoplay blocked".to_string()));
        }
        if e.released || e.src.is_none() {
            return Err(PlaybackRejected("no source".to_string()));
        }
        if e.ended {
            e.time = 0.0;
            e.ended = false;
        }
        e.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.element.borrow_mut().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.element.borrow().paused
    }

    fn has_ended(&self) -> bool {
        self.element.borrow().ended
    }

    fn has_error(&self) -> bool {
        self.element.borrow().error
    }

    fn playback_rate(&self) -> f64 {
        self.element.borrow().rate
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.element.borrow_mut().rate = rate;
    }

    fn set_looping(&mut self, looping: bool) {
        self.element.borrow_mut().looping = looping;
    }

    fn set_source(&mut self, url: Option<&str>) {
        let shared = self.shared.borrow();
        let mut e = self.element.borrow_mut();
        if e.released {
            return;
        }
        e.reset();
        e.src = url.map(str::to_string);
        if let Some(url) = url {
            e.pending = Some(PendingLoad {
                remaining: shared.config.latency.as_secs_f64(),
                outcome: shared.config.outcome(url),
            });
        }
    }

    fn release(&mut self) {
        let mut e = self.element.borrow_mut();
        e.reset();
        e.src = None;
        e.released = true;
    }
}

impl VideoHandle for SimMedia {
    fn intrinsic_size(&self) -> Option<(u32, u32)> {
        self.element.borrow().size
    }
}

impl AudioHandle for SimMedia {
    fn set_output_gain(&mut self, gain: f32) {
        self.element.borrow_mut().gain = gain;
    }
}

/// One recorded image or video draw
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    Image {
        url: String,
        src: Option<Rect>,
        dst: Rect,
        alpha: f32,
    },
    Video {
        src: Option<String>,
        time: f64,
        dst: Rect,
    },
}

/// Surface that records media draws and counts fills
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    width: f64,
    height: f64,
    pub draws: Vec<DrawCall>,
    pub clears: usize,
    pub fills: usize,
}

impl RecordingSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            draws: Vec::new(),
            clears: 0,
            fills: 0,
        }
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    pub fn image_draws(&self) -> usize {
        self.draws
            .iter()
            .filter(|d| matches!(d, DrawCall::Image { .. }))
            .count()
    }

    pub fn video_draws(&self) -> usize {
        self.draws
            .iter()
            .filter(|d| matches!(d, DrawCall::Video { .. }))
            .count()
    }

    pub fn last_video_draw(&self) -> Option<&DrawCall> {
        self.draws
            .iter()
            .rev()
            .find(|d| matches!(d, DrawCall::Video { .. }))
    }

    /// Forget everything recorded so far
    pub fn reset(&mut self) {
        self.draws.clear();
        self.clears = 0;
        self.fills = 0;
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn clear(&mut self, _color: Rgba) {
        self.clears += 1;
    }

    fn fill_rect(&mut self, _rect: Rect, _color: Rgba) {
        self.fills += 1;
    }

    fn draw_image(&mut self, image: &dyn ImageHandle, src: Option<Rect>, dst: Rect, alpha: f32) {
        self.draws.push(DrawCall::Image {
            url: image.url().to_string(),
            src,
            dst,
            alpha,
        });
    }

    fn draw_video(&mut self, video: &dyn VideoHandle, dst: Rect) {
        self.draws.push(DrawCall::Video {
            src: video.src(),
            time: video.current_time(),
            dst,
        });
    }
}
