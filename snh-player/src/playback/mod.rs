//! Playback engines and their per-frame layers

pub mod audio;
pub mod backdrop;
pub mod double_buffer;
pub mod idle_particles;
pub mod image_layer;
pub mod orchestrator;
pub mod overlay;
pub mod remix;
pub mod session;
pub mod speed;
pub mod visual;

pub use orchestrator::{CascataEngine, EnginePhase, PreloadJob, Prepared};
pub use remix::RemixEngine;
pub use session::{ChannelState, PlaybackSession, TickOutcome};
