//! Server capability flags reported by the status endpoint

use serde::Serialize;

use crate::RuntimeConfig;

/// What this server offers clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Capabilities {
    pub max_avatars: usize,
    pub protocols: Vec<&'static str>,
    pub compression: Vec<&'static str>,
    pub target_fps: f64,
    pub webrtc_available: bool,
}

impl Capabilities {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let mut protocols = vec!["websocket"];
        if config.webrtc_enabled {
            protocols.push("webrtc");
        }
        Capabilities {
            max_avatars: config.max_sessions,
            protocols,
            compression: vec!["delta", "keyframe"],
            target_fps: config.target_fps,
            webrtc_available: config.webrtc_enabled,
        }
    }
}
