//! # Sonhário Player Library (snh-player)
//!
//! Generative audiovisual playback engines for the Sonhário installation.
//!
//! **Purpose:** Turn a pool of user-submitted materials into finite,
//! randomly scored audiovisual sessions ("cascata") or a continuous remix,
//! driven once per animation frame from a single wall-clock origin.
//!
//! **Architecture:** score generation → preload (the only async step) →
//! per-frame orchestration of visual channels, chained audio channels,
//! double-buffered video and the hard cut. Media and drawing go through the
//! traits in [`media`], so the engines run against a browser binding or the
//! bundled headless backend alike.

pub mod config;
pub mod error;
pub mod geometry;
pub mod media;
pub mod playback;
pub mod preload;
pub mod score;
pub mod ui;
pub mod viewport;

pub use config::{CascataPreset, PlayerConfig, RemixPreset};
pub use error::{Error, Result};
pub use playback::{CascataEngine, PlaybackSession, RemixEngine};
pub use score::{ChannelEvent, ChannelKind, Score};
