//! af-core: shared types, IDs, errors, and configuration.
//!
//! This crate is the foundational dependency for all other af-* crates,
//! providing the typed job identifier, a unified error type, the audio
//! format enum, and application configuration.

pub mod config;
pub mod error;
pub mod format;
pub mod ids;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use format::AudioFormat;
pub use ids::*;
