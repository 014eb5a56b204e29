//! Avatar sessions and the per-frame pipeline

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use morphcast_codec::{BatchEncoder, DeltaCompressor};
use morphcast_core::{AvatarId, MorphFrame, MorphKey, MorphcastError, MorphcastResult, QualityLevel};
use morphcast_lod::{LodLevel, MorphOptimizer, PerformanceAlert};
use morphcast_viseme::{arkit_to_rig, ArkitMapper, ExpressionLayer};
use morphcast_wire::{Envelope, Message, MetricsData, StateData};
use serde::Serialize;
use tracing::debug;

use crate::{FrameSink, LatencyBreakdown, MonitorConfig, Outbound, PerformanceMonitor, RuntimeConfig};

/// Session lifecycle. `Disconnected` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Connected,
    Active,
    Paused,
    Disconnected,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Connected => "connected",
            SessionState::Active => "active",
            SessionState::Paused => "paused",
            SessionState::Disconnected => "disconnected",
        }
    }

    /// Frames are accepted in these states
    pub fn accepts_frames(self) -> bool {
        matches!(self, SessionState::Connected | SessionState::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consecutive internal-error counter
#[derive(Clone, Copy, Debug)]
pub struct ErrorBudget {
    consecutive: u32,
    limit: u32,
}

impl ErrorBudget {
    pub fn new(limit: u32) -> Self {
        ErrorBudget {
            consecutive: 0,
            limit,
        }
    }

    /// Count a failure; true once the budget is exhausted
    pub fn record_failure(&mut self) -> bool {
        self.consecutive += 1;
        self.consecutive > self.limit
    }

    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// Figures for one processed frame
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameMetrics {
    pub latency_ms: f64,
    pub compression_ratio: f64,
    pub morphs_active: usize,
    pub frame_number: u64,
    pub fps: f64,
}

/// Result of pushing one frame through a session
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// Rate gate or lateness; counted as dropped
    Skipped,
    /// `payload` is `None` while a batch is still filling
    Processed {
        payload: Option<Bytes>,
        metrics: FrameMetrics,
    },
}

impl FrameOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, FrameOutcome::Skipped)
    }

    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            FrameOutcome::Processed { payload, .. } => payload.as_ref(),
            FrameOutcome::Skipped => None,
        }
    }
}

/// One connected avatar
pub struct AvatarSession {
    id: AvatarId,
    quality: QualityLevel,
    state: SessionState,
    compressor: DeltaCompressor,
    optimizer: MorphOptimizer,
    expression: ExpressionLayer,
    arkit: ArkitMapper,
    frame_count: u64,
    tick_count: u64,
    last_frame_time: Option<f64>,
    last_input_time: Option<f64>,
    idle_driving: bool,
    created_at: f64,
    monitor: PerformanceMonitor,
    smoothing: Option<MorphFrame>,
    queue: VecDeque<MorphFrame>,
    budget: ErrorBudget,
    sink: Arc<dyn FrameSink>,
}

impl fmt::Debug for AvatarSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvatarSession")
            .field("id", &self.id)
            .field("quality", &self.quality)
            .field("state", &self.state)
            .field("frame_count", &self.frame_count)
            .field("queued", &self.queue.len())
            .finish()
    }
}

impl AvatarSession {
    pub fn new(id: AvatarId, config: &RuntimeConfig, sink: Arc<dyn FrameSink>, now: f64) -> Self {
        AvatarSession {
            id,
            quality: QualityLevel::default(),
            state: SessionState::Connected,
            compressor: DeltaCompressor::with_config(config.compressor.clone()),
            optimizer: MorphOptimizer::new(config.optimizer.clone()),
            expression: ExpressionLayer::new(now),
            arkit: ArkitMapper::new(),
            frame_count: 0,
            tick_count: 0,
            last_frame_time: None,
            last_input_time: None,
            idle_driving: false,
            created_at: now,
            monitor: PerformanceMonitor::new(MonitorConfig {
                target_fps: config.target_fps,
                ..MonitorConfig::default()
            }),
            smoothing: None,
            queue: VecDeque::new(),
            budget: ErrorBudget::new(config.retry_budget),
            sink,
        }
    }

    pub fn id(&self) -> &AvatarId {
        &self.id
    }

    pub fn quality(&self) -> QualityLevel {
        self.quality
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn created_at(&self) -> f64 {
        self.created_at
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    pub fn compressor(&self) -> &DeltaCompressor {
        &self.compressor
    }

    pub fn optimizer(&self) -> &MorphOptimizer {
        &self.optimizer
    }

    pub fn expression_mut(&mut self) -> &mut ExpressionLayer {
        &mut self.expression
    }

    pub fn budget_mut(&mut self) -> &mut ErrorBudget {
        &mut self.budget
    }

    pub fn compression_enabled(&self) -> bool {
        self.quality.profile().compression
    }

    pub fn set_state(&mut self, state: SessionState) {
        if self.state != SessionState::Disconnected {
            self.state = state;
        }
    }

    /// Treat the next frame as on schedule (after resume)
    pub fn rearm(&mut self) {
        self.last_frame_time = None;
    }

    pub fn set_quality(&mut self, quality: QualityLevel) {
        self.quality = quality;
    }

    /// Client-declared priority morphs, ARKit names mapped to rig names
    pub fn add_priority_morphs<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        let keys: Vec<MorphKey> = names
            .into_iter()
            .map(|name| MorphKey::new(arkit_to_rig(name).unwrap_or(name)))
            .collect();
        self.compressor.add_priority_morphs(keys);
    }

    pub fn force_keyframe(&mut self) {
        self.compressor.force_keyframe();
    }

    /// Encode any partially filled batch
    pub fn flush(&mut self) -> MorphcastResult<Option<Bytes>> {
        Ok(self.compressor.flush()?)
    }

    /// Send the partial batch, then drop codec, smoothing, counters and
    /// history. State is dropped even when the final batch cannot be sent.
    pub fn reset(&mut self) -> MorphcastResult<()> {
        let pending = self.compressor.flush();
        self.clear();
        if let Some(pending) = pending? {
            self.send(Outbound::Binary(pending))?;
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.compressor.reset();
        self.optimizer.reset();
        self.monitor.clear();
        self.frame_count = 0;
        self.tick_count = 0;
        self.last_frame_time = None;
        self.smoothing = None;
        self.queue.clear();
        self.idle_driving = false;
    }

    /// Queue frames for the idle scheduler; returns how many were accepted
    pub fn enqueue(&mut self, frames: impl IntoIterator<Item = MorphFrame>, limit: usize) -> usize {
        let mut accepted = 0;
        for frame in frames {
            if self.queue.len() >= limit {
                break;
            }
            self.queue.push_back(frame);
            accepted += 1;
        }
        accepted
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Should the idle scheduler drive this session at `now`?
    pub fn wants_idle_tick(&self, now: f64, idle_after: f64) -> bool {
        self.state == SessionState::Active
            && (!self.queue.is_empty()
                || self.last_input_time.map_or(true, |t| now - t >= idle_after))
    }

    /// Next scheduler frame: queued speech with expressions layered on, or an idle frame
    pub fn next_idle_frame(&mut self, now: f64) -> MorphFrame {
        // The gap since the last client frame is not lateness
        if !self.idle_driving {
            self.idle_driving = true;
            self.rearm();
        }
        match self.queue.pop_front() {
            Some(frame) => self.expression.apply(&frame, now),
            None => self.expression.idle_frame(now),
        }
    }

    /// Mark client input; the idle scheduler backs off
    pub fn touch_input(&mut self, now: f64) {
        self.last_input_time = Some(now);
        self.idle_driving = false;
    }

    pub fn send(&self, item: Outbound) -> MorphcastResult<()> {
        self.sink.send(item)
    }

    /// Pipeline for one frame arriving at `now`
    pub fn process(&mut self, raw: &MorphFrame, now: f64, config: &RuntimeConfig) -> MorphcastResult<FrameOutcome> {
        if !self.state.accepts_frames() {
            return Err(MorphcastError::NotActive(self.id.clone()));
        }
        if self.state == SessionState::Connected {
            self.state = SessionState::Active;
        }
        let start = Instant::now();
        let target_fps = config.target_fps.max(1.0);
        let nominal = 1.0 / target_fps;

        let frame_delta = self.last_frame_time.map_or(nominal, |last| (now - last).max(0.0));
        self.last_frame_time = Some(now);

        let profile = self.quality.profile();
        let tick = self.tick_count;
        self.tick_count += 1;
        let late = frame_delta > nominal * config.frame_skip_threshold;
        if late || tick % profile.tick_divisor(target_fps) != 0 {
            debug!(avatar = %self.id, frame_delta, late, "skipping frame");
            self.monitor.record_skip(now);
            return Ok(FrameOutcome::Skipped);
        }

        let mapped = self.arkit.map_frame(raw);
        let alert = self.optimizer.record_frame(frame_delta);
        if let Some(threshold) = alert.change_threshold() {
            self.compressor.set_change_threshold(threshold);
        }
        let level = LodLevel::from_fps(self.optimizer.metrics().fps).with_floor(profile.lod_level);
        let mut optimized = self.optimizer.optimize_at_level(&mapped, level);
        optimized.truncate_strongest(profile.morph_limit);
        let processing_ms = start.elapsed().as_secs_f64() * 1000.0;

        let smoothed = self.smooth(optimized, frame_delta, config.smoothing_rate);

        let compress_start = Instant::now();
        let (payload, compression_ratio) = if profile.compression {
            let payload = self.compressor.compress_frame(&smoothed, now)?;
            (payload, self.compressor.stats().compression_ratio())
        } else {
            if let Some(pending) = self.compressor.flush()? {
                self.sink.send(Outbound::Binary(pending))?;
            }
            self.compressor.force_keyframe();
            let unit = self.compressor.compress_unit(&smoothed, now);
            let payload = BatchEncoder::encode(&[unit]).map_err(|e| {
                self.compressor.force_keyframe();
                e
            })?;
            (Some(payload), 0.0)
        };
        let compression_ms = compress_start.elapsed().as_secs_f64() * 1000.0;

        self.frame_count += 1;
        let latency = LatencyBreakdown {
            processing: processing_ms,
            compression: compression_ms,
            ..Default::default()
        };
        self.monitor.set_compression_ratio(compression_ratio);
        self.monitor
            .record_frame(now, latency, payload.as_ref().map_or(0, |p| p.len()));

        if matches!(alert, PerformanceAlert::Critical { .. }) {
            debug!(avatar = %self.id, "critical frame rate, raised change threshold");
        }

        Ok(FrameOutcome::Processed {
            payload,
            metrics: FrameMetrics {
                latency_ms: latency.total(),
                compression_ratio,
                morphs_active: smoothed.len(),
                frame_number: self.frame_count,
                fps: self.monitor.fps(),
            },
        })
    }

    /// Exponential smoothing against the previous output
    fn smooth(&mut self, frame: MorphFrame, frame_delta: f64, rate: f64) -> MorphFrame {
        let alpha = (frame_delta * rate).min(1.0);
        let smoothed: MorphFrame = match &self.smoothing {
            Some(previous) => frame
                .iter()
                .map(|(key, value)| match previous.get(key) {
                    Some(old) => (key.clone(), alpha * value + (1.0 - alpha) * old),
                    None => (key.clone(), value),
                })
                .collect(),
            None => frame,
        };
        self.smoothing = Some(smoothed.clone());
        smoothed
    }

    /// `metrics` payload for this session
    pub fn metrics_data(&self) -> MetricsData {
        let summary = self.monitor.summary();
        MetricsData {
            fps: summary.fps,
            latency_ms: summary.latency_ms,
            bandwidth_kbps: summary.bandwidth_kbps * 8.0,
            draw_calls: 0,
            triangles: 0,
            compression_ratio: summary.compression_ratio,
            dropped_frames: summary.dropped_frames,
            cpu_usage: None,
            memory_mb: None,
            system: None,
        }
    }

    /// `state` message for this session
    pub fn state_message(&self) -> Envelope {
        Envelope::new(Message::State(StateData {
            avatar_id: self.id.to_string(),
            state: self.state.to_string(),
            quality: self.quality,
            compression_enabled: self.compression_enabled(),
            metrics: Some(self.metrics_data()),
        }))
    }
}
