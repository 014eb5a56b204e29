//! MorphCast Test Harness - Simulated clients and end-to-end scenarios
//!
//! This crate provides:
//! - Lossy link simulation for binary batches
//! - A simulated client that decodes what a session sends and asks for
//!   keyframes when it loses sync
//! - Scenario runs driving an orchestrator on a manual clock

pub mod chaos;
pub mod client;
pub mod scenario;

pub use chaos::*;
pub use client::*;
pub use scenario::*;
