//! Runtime configuration

use std::time::Duration;

use morphcast_codec::CompressorConfig;
use morphcast_lod::OptimizerConfig;

/// Session orchestrator configuration
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Global output rate
    pub target_fps: f64,
    /// Skip a frame arriving more than this many frame intervals late
    pub frame_skip_threshold: f64,
    /// Concurrent avatar sessions
    pub max_sessions: usize,
    /// Consecutive internal errors tolerated before a session is dropped
    pub retry_budget: u32,
    /// Smoothing factor `alpha = min(1, frame_delta * smoothing_rate)`
    pub smoothing_rate: f64,
    /// Seconds without client frames before the idle scheduler takes over
    pub idle_after: f64,
    /// Frames queued per session for the idle scheduler
    pub max_queued_frames: usize,
    /// Advertise WebRTC data channels
    pub webrtc_enabled: bool,
    pub compressor: CompressorConfig,
    pub optimizer: OptimizerConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            target_fps: 60.0,
            frame_skip_threshold: 2.0,
            max_sessions: 10,
            retry_budget: 5,
            smoothing_rate: 10.0,
            idle_after: 0.5,
            max_queued_frames: 600,
            webrtc_enabled: false,
            compressor: CompressorConfig::default(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Smaller batches and no caching, for interactive use
    pub fn low_latency() -> Self {
        RuntimeConfig {
            compressor: CompressorConfig::low_latency(),
            optimizer: OptimizerConfig {
                enable_caching: false,
                ..OptimizerConfig::default()
            },
            ..Default::default()
        }
    }

    /// Higher thresholds and keyframe spacing for constrained links
    pub fn low_bandwidth() -> Self {
        RuntimeConfig {
            compressor: CompressorConfig::low_bandwidth(),
            ..Default::default()
        }
    }

    pub fn with_target_fps(mut self, fps: f64) -> Self {
        if fps > 0.0 {
            self.target_fps = fps;
            self.optimizer.target_fps = fps;
        }
        self
    }

    /// One frame interval at the target rate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps.max(1.0))
    }
}

/// Performance monitor and metrics broadcaster configuration
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// Broadcast period
    pub stats_interval: Duration,
    /// Target motion-to-photon latency
    pub target_latency_ms: f64,
    /// Frame rate below which alerts fire (scaled by 0.8 / 0.6)
    pub target_fps: f64,
    /// Latency samples kept
    pub history_size: usize,
    /// Frame timestamps kept for FPS
    pub frame_window: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            stats_interval: Duration::from_secs(1),
            target_latency_ms: 80.0,
            target_fps: 30.0,
            history_size: 300,
            frame_window: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_sessions, 10);
        assert_eq!(config.retry_budget, 5);
        assert_eq!(config.frame_skip_threshold, 2.0);
        assert_eq!(MonitorConfig::default().history_size, 300);
    }

    #[test]
    fn test_target_fps_propagates() {
        let config = RuntimeConfig::default().with_target_fps(30.0);
        assert_eq!(config.optimizer.target_fps, 30.0);
        assert_eq!(config.frame_interval(), Duration::from_secs_f64(1.0 / 30.0));
        let unchanged = RuntimeConfig::default().with_target_fps(0.0);
        assert_eq!(unchanged.target_fps, 60.0);
    }
}
