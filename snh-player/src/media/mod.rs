//! Media element and drawing surface abstractions
//!
//! The engines never talk to a concrete media stack. They see:
//!
//! - [`MediaBackend`]: loads images and primes video/audio elements
//!   (awaitable, one future per resource) and creates empty elements for
//!   layers that reload sources themselves
//! - [`VideoHandle`] / [`AudioHandle`]: element controls, polled once per
//!   frame for readiness, end of playback and errors
//! - [`Surface`]: the canvas the orchestrators draw into
//!
//! Everything here lives on the frame-loop thread, so futures are
//! [`LocalBoxFuture`]s and handles are not `Send`.

pub mod headless;

use crate::geometry::{Rect, Rgba};
use futures::future::LocalBoxFuture;
use thiserror::Error;

/// How much of a media element's data is available
///
/// Ordered like the HTML media `readyState` ladder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    #[default]
    HaveNothing,
    HaveMetadata,
    /// Current frame decodable (drawable)
    HaveCurrentData,
    /// Playback can start (`canplay`)
    HaveFutureData,
    /// Playback can run to the end without stalling (`canplaythrough`)
    HaveEnoughData,
}

/// Non-fatal failure to resolve one resource
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("failed to load {url}: {reason}")]
    Failed { url: String, reason: String },

    #[error("timed out loading {url}")]
    TimedOut { url: String },
}

impl LoadError {
    pub fn url(&self) -> &str {
        match self {
            LoadError::Failed { url, .. } | LoadError::TimedOut { url } => url,
        }
    }
}

/// `play()` was declined (autoplay policy, no source, ...)
#[derive(Error, Debug, Clone, PartialEq)]
#[error("playback rejected: {0}")]
pub struct PlaybackRejected(pub String);

/// A decoded still image
pub trait ImageHandle {
    fn url(&self) -> &str;
    /// Natural pixel size; `(0, 0)` when unknown
    fn natural_size(&self) -> (u32, u32);
}

/// Controls shared by video and audio elements
pub trait MediaElement {
    /// Current source URL, if any
    fn src(&self) -> Option<String>;
    fn ready_state(&self) -> ReadyState;
    /// Clip length in seconds, once metadata is known
    fn duration(&self) -> Option<f64>;
    fn current_time(&self) -> f64;
    fn seek(&mut self, seconds: f64);
    fn play(&mut self) -> Result<(), PlaybackRejected>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    /// Playback reached the end of a non-looping clip
    fn has_ended(&self) -> bool;
    fn has_error(&self) -> bool;
    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&mut self, rate: f64);
    fn set_looping(&mut self, looping: bool);
    /// Replace the source and start loading it; `None` clears the element
    fn set_source(&mut self, url: Option<&str>);
    /// Pause, clear the source and detach the element; the handle is dead
    /// afterwards
    fn release(&mut self);
}

pub trait VideoHandle: MediaElement {
    /// Decoded frame size, once known
    fn intrinsic_size(&self) -> Option<(u32, u32)>;
}

pub trait AudioHandle: MediaElement {
    /// Gain applied to this element's output by the mix graph
    fn set_output_gain(&mut self, gain: f32);
}

/// Outcome of one load future
pub type LoadResult<T> = Result<T, LoadError>;

/// Source of media handles
///
/// Load futures resolve once the resource is decode-ready (image decoded,
/// element able to play through) or has failed. They may also never
/// resolve; callers race them against a timeout.
pub trait MediaBackend: Clone + 'static {
    fn load_image(&self, url: &str) -> LocalBoxFuture<'static, LoadResult<Box<dyn ImageHandle>>>;
    fn load_video(&self, url: &str) -> LocalBoxFuture<'static, LoadResult<Box<dyn VideoHandle>>>;
    fn load_audio(&self, url: &str) -> LocalBoxFuture<'static, LoadResult<Box<dyn AudioHandle>>>;

    /// Empty, muted, non-looping video element
    fn create_video(&self) -> Box<dyn VideoHandle>;
    /// Empty audio element
    fn create_audio(&self) -> Box<dyn AudioHandle>;
}

/// Drawing target
pub trait Surface {
    /// Canvas size in pixels
    fn size(&self) -> (f64, f64);
    fn clear(&mut self, color: Rgba);
    fn fill_rect(&mut self, rect: Rect, color: Rgba);
    /// Draw `src` of the image (whole image when None) into `dst`
    fn draw_image(&mut self, image: &dyn ImageHandle, src: Option<Rect>, dst: Rect, alpha: f32);
    fn draw_video(&mut self, video: &dyn VideoHandle, dst: Rect);
}

/// Start playback, logging and swallowing a rejection
///
/// Returns whether the element accepted the request.
pub fn try_play<E: MediaElement + ?Sized>(element: &mut E, what: &str) -> bool {
    match element.play() {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("{} play() declined: {}", what, e);
            false
        }
    }
}
