//! Performance Monitor - latency breakdowns, frame rate and alerts
//!
//! Fixed-capacity ring buffers only; nothing is persisted. Time is passed in
//! explicitly (seconds, same clock as the pipeline).

use std::collections::VecDeque;

use serde::Serialize;

use crate::MonitorConfig;

/// Per-frame latency breakdown, milliseconds
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct LatencyBreakdown {
    pub receive: f64,
    pub decompression: f64,
    pub processing: f64,
    pub compression: f64,
    pub send: f64,
    /// Client-reported; zero when unknown
    pub client_render: f64,
}

impl LatencyBreakdown {
    pub fn total(&self) -> f64 {
        self.receive
            + self.decompression
            + self.processing
            + self.compression
            + self.send
            + self.client_render
    }
}

/// Alert severity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
}

/// Metric an alert is about
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertMetric {
    Latency,
    Fps,
    Compression,
    Bandwidth,
}

/// A raised performance alert
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub metric: AlertMetric,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    /// Seconds, pipeline clock
    pub raised_at: f64,
}

/// Alert thresholds, derived from the targets
#[derive(Clone, Copy, Debug)]
pub struct Thresholds {
    pub latency_warning: f64,
    pub latency_critical: f64,
    pub fps_warning: f64,
    pub fps_critical: f64,
    pub compression_warning: f64,
    /// KB/s
    pub bandwidth_warning: f64,
}

impl Thresholds {
    pub fn from_targets(target_latency_ms: f64, target_fps: f64) -> Self {
        Thresholds {
            latency_warning: target_latency_ms * 1.5,
            latency_critical: target_latency_ms * 2.0,
            fps_warning: target_fps * 0.8,
            fps_critical: target_fps * 0.6,
            compression_warning: 0.5,
            bandwidth_warning: 100.0,
        }
    }
}

/// Latency percentiles over the history window
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Percentiles {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub mean: f64,
    pub std: f64,
}

impl Percentiles {
    /// Linear-interpolated percentiles; `None` for an empty sample
    pub fn compute(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Percentiles {
            p50: percentile(&sorted, 50.0),
            p90: percentile(&sorted, 90.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
            mean,
            std: variance.sqrt(),
        })
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Latency direction over the last 20 samples
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyTrend {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

/// Serializable summary for status and metrics messages
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub fps: f64,
    pub target_fps: f64,
    pub dropped_frames: u64,
    pub frames: u64,
    pub latency_ms: f64,
    pub percentiles: Option<Percentiles>,
    pub trend: LatencyTrend,
    pub compression_ratio: f64,
    pub bandwidth_kbps: f64,
    pub alerts: Vec<Alert>,
    pub health_score: f64,
}

const ALERT_TTL: f64 = 300.0;
const ALERT_HISTORY: usize = 100;

/// Ring-buffered performance tracking for one session
#[derive(Clone, Debug)]
pub struct PerformanceMonitor {
    config: MonitorConfig,
    thresholds: Thresholds,
    latency: VecDeque<LatencyBreakdown>,
    frame_times: VecDeque<f64>,
    bytes: VecDeque<(f64, usize)>,
    last_frame: Option<f64>,
    frames: u64,
    dropped: u64,
    compression_ratio: f64,
    percentiles: Option<Percentiles>,
    active_alerts: Vec<Alert>,
    alert_history: VecDeque<Alert>,
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        PerformanceMonitor {
            thresholds: Thresholds::from_targets(config.target_latency_ms, config.target_fps),
            latency: VecDeque::with_capacity(config.history_size),
            frame_times: VecDeque::with_capacity(config.frame_window),
            bytes: VecDeque::new(),
            last_frame: None,
            frames: 0,
            dropped: 0,
            compression_ratio: 1.0,
            percentiles: None,
            active_alerts: Vec::new(),
            alert_history: VecDeque::with_capacity(ALERT_HISTORY),
            config,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Record a processed frame at `now`
    pub fn record_frame(&mut self, now: f64, latency: LatencyBreakdown, payload_bytes: usize) {
        if self.latency.len() == self.config.history_size.max(1) {
            self.latency.pop_front();
        }
        self.latency.push_back(latency);

        if self.frame_times.len() == self.config.frame_window.max(2) {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(now);

        self.bytes.push_back((now, payload_bytes));
        while self.bytes.front().map_or(false, |(t, _)| now - t > 1.0) {
            self.bytes.pop_front();
        }

        if let Some(last) = self.last_frame {
            if now - last > 1.5 / self.config.target_fps.max(1.0) {
                self.dropped += 1;
            }
        }
        self.last_frame = Some(now);
        self.frames += 1;

        if self.latency.len() % 10 == 0 {
            self.update_percentiles();
        }
        self.check_alerts(now, latency.total());
    }

    /// Count a frame the pipeline chose not to process at `now`.
    /// The next processed frame measures its gap from here.
    pub fn record_skip(&mut self, now: f64) {
        self.dropped += 1;
        self.last_frame = Some(now);
    }

    pub fn set_compression_ratio(&mut self, ratio: f64) {
        self.compression_ratio = ratio;
    }

    pub fn compression_ratio(&self) -> f64 {
        self.compression_ratio
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    /// Frames per second over the timestamp window
    pub fn fps(&self) -> f64 {
        let (Some(first), Some(last)) = (self.frame_times.front(), self.frame_times.back()) else {
            return 0.0;
        };
        let span = last - first;
        if self.frame_times.len() < 2 || span <= 0.0 {
            return 0.0;
        }
        (self.frame_times.len() - 1) as f64 / span
    }

    /// Outgoing payload rate over the last second, KB/s
    pub fn bandwidth_kbps(&self) -> f64 {
        self.bytes.iter().map(|(_, b)| *b).sum::<usize>() as f64 / 1024.0
    }

    pub fn last_latency(&self) -> Option<LatencyBreakdown> {
        self.latency.back().copied()
    }

    pub fn percentiles(&self) -> Option<Percentiles> {
        self.percentiles
    }

    pub fn active_alerts(&self) -> &[Alert] {
        &self.active_alerts
    }

    fn update_percentiles(&mut self) {
        let totals: Vec<f64> = self.latency.iter().map(|l| l.total()).collect();
        self.percentiles = Percentiles::compute(&totals);
    }

    fn check_alerts(&mut self, now: f64, latency: f64) {
        self.active_alerts.retain(|a| now - a.raised_at < ALERT_TTL);
        let t = self.thresholds;

        if latency > t.latency_critical {
            self.raise(now, AlertLevel::Critical, AlertMetric::Latency, latency, t.latency_critical);
        } else if latency > t.latency_warning {
            self.raise(now, AlertLevel::Warning, AlertMetric::Latency, latency, t.latency_warning);
        }

        // FPS is meaningless until the window has filled a little
        if self.frame_times.len() >= 10 {
            let fps = self.fps();
            if fps < t.fps_critical {
                self.raise(now, AlertLevel::Critical, AlertMetric::Fps, fps, t.fps_critical);
            } else if fps < t.fps_warning {
                self.raise(now, AlertLevel::Warning, AlertMetric::Fps, fps, t.fps_warning);
            }
        }

        if self.compression_ratio < t.compression_warning {
            let ratio = self.compression_ratio;
            self.raise(now, AlertLevel::Warning, AlertMetric::Compression, ratio, t.compression_warning);
        }

        let bandwidth = self.bandwidth_kbps();
        if bandwidth > t.bandwidth_warning {
            self.raise(now, AlertLevel::Warning, AlertMetric::Bandwidth, bandwidth, t.bandwidth_warning);
        }
    }

    fn raise(&mut self, now: f64, level: AlertLevel, metric: AlertMetric, value: f64, threshold: f64) {
        if self
            .active_alerts
            .iter()
            .any(|a| a.metric == metric && a.level == level)
        {
            return;
        }
        let message = match metric {
            AlertMetric::Latency => format!("latency {:.1}ms", value),
            AlertMetric::Fps => format!("fps {:.1}", value),
            AlertMetric::Compression => format!("compression {:.1}%", value * 100.0),
            AlertMetric::Bandwidth => format!("bandwidth {:.1} KB/s", value),
        };
        tracing::warn!(?level, ?metric, value, threshold, "performance alert: {}", message);

        let alert = Alert {
            level,
            metric,
            message,
            value,
            threshold,
            raised_at: now,
        };
        if self.alert_history.len() == ALERT_HISTORY {
            self.alert_history.pop_front();
        }
        self.alert_history.push_back(alert.clone());
        self.active_alerts.push(alert);
    }

    /// Latency direction: last 10 samples against the 10 before
    pub fn trend(&self) -> LatencyTrend {
        if self.latency.len() <= 10 {
            return LatencyTrend::InsufficientData;
        }
        let totals: Vec<f64> = self.latency.iter().map(|l| l.total()).collect();
        let split = totals.len() - 10;
        let recent = mean(&totals[split..]);
        let older = mean(&totals[split.saturating_sub(10)..split]);
        if recent > older * 1.1 {
            LatencyTrend::Increasing
        } else if recent < older * 0.9 {
            LatencyTrend::Decreasing
        } else {
            LatencyTrend::Stable
        }
    }

    /// Overall health in [0, 1]
    pub fn health_score(&self) -> f64 {
        let mut score = 1.0;
        if let Some(p) = self.percentiles.filter(|p| p.mean > 0.0) {
            score *= (self.config.target_latency_ms / p.mean).min(1.0);
        }
        score *= (self.fps() / self.config.target_fps.max(1.0)).min(1.0);
        for alert in &self.active_alerts {
            score *= match alert.level {
                AlertLevel::Critical => 0.7,
                AlertLevel::Warning => 0.9,
            };
        }
        score.clamp(0.0, 1.0)
    }

    pub fn summary(&self) -> PerformanceSummary {
        PerformanceSummary {
            fps: self.fps(),
            target_fps: self.config.target_fps,
            dropped_frames: self.dropped,
            frames: self.frames,
            latency_ms: self.last_latency().map_or(0.0, |l| l.total()),
            percentiles: self.percentiles,
            trend: self.trend(),
            compression_ratio: self.compression_ratio,
            bandwidth_kbps: self.bandwidth_kbps(),
            alerts: self.active_alerts.clone(),
            health_score: self.health_score(),
        }
    }

    /// Forget all history
    pub fn clear(&mut self) {
        *self = PerformanceMonitor::new(self.config.clone());
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        PerformanceMonitor::new(MonitorConfig::default())
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
