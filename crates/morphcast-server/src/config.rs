//! Server configuration loaded from environment variables.
//!
//! | Variable                      | Default        | Description                            |
//! |-------------------------------|----------------|----------------------------------------|
//! | `MORPHCAST_BIND`              | `0.0.0.0:8000` | HTTP/WebSocket listen address          |
//! | `MORPHCAST_TARGET_FPS`        | `60`           | Output frame rate                      |
//! | `MORPHCAST_STATS_INTERVAL`    | `1s`           | Metrics broadcast period (humantime)   |
//! | `MORPHCAST_MAX_AVATARS`       | `10`           | Concurrent avatar sessions             |
//! | `MORPHCAST_OUTBOUND_CAPACITY` | `256`          | Per-connection outbound queue length   |
//! | `MORPHCAST_WEBRTC`            | `false`        | Advertise WebRTC data channels         |
//! | `MORPHCAST_LOG_JSON`          | `false`        | JSON log lines instead of compact text |
//! | `RUST_LOG`                    | `info`         | tracing filter                         |

use std::net::SocketAddr;
use std::time::Duration;

use morphcast_runtime::{MonitorConfig, RuntimeConfig};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub target_fps: f64,
    pub stats_interval: Duration,
    pub max_avatars: usize,
    pub outbound_capacity: usize,
    pub webrtc_enabled: bool,
    pub log_json: bool,
}

impl ServerConfig {
    /// Read the environment; absent or unparseable values fall back to defaults
    pub fn from_env() -> Self {
        Self {
            bind: env_parse("MORPHCAST_BIND", default_bind()),
            target_fps: env_parse("MORPHCAST_TARGET_FPS", 60.0),
            stats_interval: env_duration("MORPHCAST_STATS_INTERVAL", Duration::from_secs(1)),
            max_avatars: env_parse("MORPHCAST_MAX_AVATARS", 10),
            outbound_capacity: env_parse("MORPHCAST_OUTBOUND_CAPACITY", 256),
            webrtc_enabled: env_bool("MORPHCAST_WEBRTC"),
            log_json: env_bool("MORPHCAST_LOG_JSON"),
        }
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            max_sessions: self.max_avatars,
            webrtc_enabled: self.webrtc_enabled,
            ..RuntimeConfig::default()
        }
        .with_target_fps(self.target_fps)
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            stats_interval: self.stats_interval,
            ..MonitorConfig::default()
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn env_bool(key: &str) -> bool {
    std::env::var(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_duration(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| humantime::parse_duration(v.trim()).ok())
        .filter(|d| !d.is_zero())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_are_sane() {
        let cfg = ServerConfig::from_env();
        assert_eq!(cfg.bind.to_string(), "0.0.0.0:8000");
        assert_eq!(cfg.target_fps, 60.0);
        assert_eq!(cfg.stats_interval, Duration::from_secs(1));
        assert_eq!(cfg.runtime_config().max_sessions, 10);
        assert!(!cfg.log_json);
    }

    #[test]
    #[serial]
    fn env_override_applied() {
        std::env::set_var("MORPHCAST_TARGET_FPS", "30");
        std::env::set_var("MORPHCAST_STATS_INTERVAL", "250ms");
        std::env::set_var("MORPHCAST_LOG_JSON", "true");
        let cfg = ServerConfig::from_env();
        std::env::remove_var("MORPHCAST_TARGET_FPS");
        std::env::remove_var("MORPHCAST_STATS_INTERVAL");
        std::env::remove_var("MORPHCAST_LOG_JSON");

        assert_eq!(cfg.runtime_config().target_fps, 30.0);
        assert_eq!(cfg.monitor_config().stats_interval, Duration::from_millis(250));
        assert!(cfg.log_json);
    }

    #[test]
    #[serial]
    fn bad_values_fall_back() {
        std::env::set_var("MORPHCAST_BIND", "not-an-address");
        std::env::set_var("MORPHCAST_STATS_INTERVAL", "soon");
        let cfg = ServerConfig::from_env();
        std::env::remove_var("MORPHCAST_BIND");
        std::env::remove_var("MORPHCAST_STATS_INTERVAL");

        assert_eq!(cfg.bind, default_bind());
        assert_eq!(cfg.stats_interval, Duration::from_secs(1));
    }
}
