//! MorphCast Core - Fundamental types for facial-animation streaming
//!
//! This crate defines the vocabulary shared by every pipeline stage:
//! - Morph names and the static name table
//! - Morph frames (the per-tick value map)
//! - Avatar identities and quality levels
//! - Clocks (wall-clock and manually driven)
//! - Error taxonomy

pub mod clock;
pub mod error;
pub mod frame;
pub mod id;
pub mod morph;
pub mod quality;

pub use clock::*;
pub use error::*;
pub use frame::*;
pub use id::*;
pub use morph::*;
pub use quality::*;
