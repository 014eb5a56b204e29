//! MorphCast Viseme - Speech animation
//!
//! Turns discrete phoneme/viseme events into continuous morph curves:
//!
//! - Phoneme tables (primary viseme, weighted co-articulated shapes)
//! - Viseme categories and the transition timing between them
//! - Transition curves (opening, closing, explosive, S-curve)
//! - The transition engine: stress, co-articulation, secondary shapes,
//!   word position, interpolation and cleanup
//! - ARKit blendshape names to rig morph names
//! - Expression layer: emotions, natural blinks, micro-expressions

pub mod arkit;
pub mod category;
pub mod curve;
pub mod engine;
pub mod expression;
pub mod phoneme;

pub use arkit::*;
pub use category::*;
pub use curve::*;
pub use engine::*;
pub use expression::*;
pub use phoneme::*;
