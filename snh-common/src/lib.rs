//! # Sonhário Common Library
//!
//! Shared code for the Sonhário playback engines including:
//! - Material records and the materials repository clients
//! - Session event types and the event bus
//! - Configuration file resolution and loading
//! - Clock abstraction used as the single playback time origin

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod materials;
pub mod repository;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use materials::{Material, MaterialStatus, MediaKind};
pub use repository::{JsonFileRepository, MaterialQuery, MaterialsRepository, RestRepository};
