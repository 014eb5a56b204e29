//! MorphCast Codec - Keyframe/delta compression for morph streams
//!
//! This is NOT a generic compressor. It encodes the CHANGE in morph state:
//! - Keyframes carry the complete frame and reset decoder state
//! - Deltas carry only morphs that moved beyond a threshold
//! - Deltas may carry velocity/acceleration hints for client interpolation
//! - Units are batched into a compact little-endian binary payload

pub mod compressor;
pub mod decompressor;
pub mod encoding;
pub mod prediction;
pub mod unit;

pub use compressor::*;
pub use decompressor::*;
pub use encoding::*;
pub use prediction::*;
pub use unit::*;
