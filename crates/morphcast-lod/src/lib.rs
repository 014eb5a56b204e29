//! MorphCast LOD - Performance-adaptive morph optimization
//!
//! When rendering falls behind, detail morphs are shed first:
//!
//! - Priority tiers: speech visemes survive longest, fine detail goes first
//! - A small result cache for repeated morph combinations
//! - Frame-rate gating against a target update interval
//! - Rolling performance metrics with warning/critical alerts

pub mod cache;
pub mod optimizer;
pub mod rate;
pub mod tier;

pub use cache::*;
pub use optimizer::*;
pub use rate::*;
pub use tier::*;
