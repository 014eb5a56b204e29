//! MorphCast Runtime - Per-avatar session orchestration
//!
//! The orchestrator owns one `AvatarSession` per connected avatar and runs
//! each incoming frame through the pipeline:
//!
//! ```text
//! ARKit mapping -> optimizer (LOD + cache) -> morph cap -> smoothing -> codec
//! ```
//!
//! Background tasks:
//! - the idle scheduler keeps quiet avatars alive (queued speech, blinks)
//! - the metrics broadcaster pushes per-session metrics on an interval

pub mod audio;
pub mod capabilities;
pub mod config;
pub mod metrics;
pub mod monitor;
pub mod orchestrator;
pub mod scheduler;
pub mod session;
pub mod system;
pub mod transport;

pub use audio::*;
pub use capabilities::*;
pub use config::*;
pub use metrics::*;
pub use monitor::*;
pub use orchestrator::*;
pub use scheduler::*;
pub use session::*;
pub use system::*;
pub use transport::*;
