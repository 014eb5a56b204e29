//! MorphCast Wire - Control-plane message format
//!
//! Every JSON message is an envelope `{type, timestamp, id?, data}`:
//! - `animation`, `audio`, `control` flow client -> server
//! - `visemes`, `state`, `error`, `ack`, `metrics` flow server -> client
//! - `ping`/`pong` in both directions
//!
//! Animation replies are binary batch payloads from `morphcast-codec` and
//! never pass through this crate.

pub mod base64;
pub mod envelope;
pub mod error;
pub mod payload;

pub use base64::*;
pub use envelope::*;
pub use error::*;
pub use payload::*;
