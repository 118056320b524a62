//! mp-core: shared types, errors, configuration, and the event bus.
//!
//! This crate is the foundational dependency for the other mp-* crates,
//! providing the input-file model, media-type detection, a unified error
//! type, application configuration, and a broadcast event bus used to fan
//! out batch progress.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use media::*;
