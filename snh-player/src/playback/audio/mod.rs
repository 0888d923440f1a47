//! Audio layers
//!
//! - [`gain`]: gain automation and the mix graph every layer routes through
//! - [`chain`]: cascata audio channels (pool members played back to back)
//! - [`crossfade`]: remix A/B ambient bed
//! - [`spectral`]: remix voice appearances ducking the bed

pub mod chain;
pub mod crossfade;
pub mod gain;
pub mod spectral;

pub use chain::{AudioChannel, ChainState};
pub use crossfade::{Crossfader, Handover};
pub use gain::{GainParam, MixGraph, NodeId};
pub use spectral::{SpectralLayer, SpectralState, SpectralTiming};
