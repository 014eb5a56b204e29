//! Morph Optimizer - LOD filtering, caching and performance tracking
//!
//! `optimize_morphs` is the per-frame entry point:
//!
//! 1. cache lookup (keyed by rounded input + LOD level)
//! 2. tier filter for the LOD level implied by the current FPS
//! 3. noise floor (`|v| <= 0.005` dropped)
//! 4. cache store
//!
//! Frame timings feed rolling metrics; sustained low FPS raises alerts.

use std::collections::VecDeque;
use std::time::Instant;

use morphcast_core::MorphFrame;
use serde::Serialize;

use crate::{CacheKey, FrameRateController, LodLevel, MorphCache, MorphLodFilter, DEFAULT_CACHE_CAPACITY};

/// Optimizer configuration
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Target render rate
    pub target_fps: f64,
    /// Apply tier filtering
    pub enable_lod: bool,
    /// Memoize results
    pub enable_caching: bool,
    /// Gate `process_frame` on the target interval
    pub enable_frame_skipping: bool,
    pub cache_capacity: usize,
    /// Values with `|v|` at or below this are dropped
    pub noise_floor: f64,
    /// Below this FPS performance is critical
    pub critical_fps: f64,
    /// Below this FPS performance is degraded
    pub warning_fps: f64,
    /// Change threshold recommended to the compressor when critical
    pub critical_change_threshold: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            enable_lod: true,
            enable_caching: true,
            enable_frame_skipping: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            noise_floor: 0.005,
            critical_fps: 20.0,
            warning_fps: 45.0,
            critical_change_threshold: 0.02,
        }
    }
}

impl OptimizerConfig {
    /// No filtering or caching; every input is passed through the noise floor
    pub fn passthrough() -> Self {
        Self {
            enable_lod: false,
            enable_caching: false,
            enable_frame_skipping: false,
            ..Default::default()
        }
    }
}

/// Rolling performance metrics
#[derive(Debug, Clone)]
pub struct PerformanceMetrics {
    frame_times: VecDeque<f64>,
    morph_times: VecDeque<f64>,
    active_counts: VecDeque<usize>,
    /// Derived from frame times
    pub fps: f64,
    /// Seconds
    pub avg_frame_time: f64,
    /// Seconds
    pub avg_morph_time: f64,
}

const FRAME_WINDOW: usize = 60;
const MORPH_WINDOW: usize = 60;
const COUNT_WINDOW: usize = 30;

fn push_bounded<T>(buf: &mut VecDeque<T>, value: T, cap: usize) {
    if buf.len() == cap {
        buf.pop_front();
    }
    buf.push_back(value);
}

impl PerformanceMetrics {
    pub fn new(initial_fps: f64) -> Self {
        Self {
            frame_times: VecDeque::with_capacity(FRAME_WINDOW),
            morph_times: VecDeque::with_capacity(MORPH_WINDOW),
            active_counts: VecDeque::with_capacity(COUNT_WINDOW),
            fps: initial_fps,
            avg_frame_time: 0.0,
            avg_morph_time: 0.0,
        }
    }

    pub fn record_frame_time(&mut self, seconds: f64) {
        push_bounded(&mut self.frame_times, seconds, FRAME_WINDOW);
        self.update();
    }

    pub fn record_morph_time(&mut self, seconds: f64, active: usize) {
        push_bounded(&mut self.morph_times, seconds, MORPH_WINDOW);
        push_bounded(&mut self.active_counts, active, COUNT_WINDOW);
        self.update();
    }

    fn update(&mut self) {
        if self.frame_times.len() > 1 {
            let total: f64 = self.frame_times.iter().sum();
            if total > 0.0 {
                self.fps = self.frame_times.len() as f64 / total;
            }
            self.avg_frame_time = total / self.frame_times.len() as f64;
        }
        if !self.morph_times.is_empty() {
            self.avg_morph_time = self.morph_times.iter().sum::<f64>() / self.morph_times.len() as f64;
        }
    }

    pub fn avg_active_morphs(&self) -> f64 {
        if self.active_counts.is_empty() {
            return 0.0;
        }
        self.active_counts.iter().sum::<usize>() as f64 / self.active_counts.len() as f64
    }
}

/// Performance state after a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PerformanceAlert {
    Normal,
    /// FPS below the warning level
    Warning { fps: f64 },
    /// FPS below the critical level; the compressor should send less
    Critical { fps: f64, change_threshold: f64 },
}

impl PerformanceAlert {
    /// Change threshold the compressor should switch to, if any
    pub fn change_threshold(&self) -> Option<f64> {
        match self {
            PerformanceAlert::Critical { change_threshold, .. } => Some(*change_threshold),
            _ => None,
        }
    }
}

/// Snapshot of optimizer performance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub fps: f64,
    pub avg_frame_time_ms: f64,
    pub avg_morph_time_ms: f64,
    pub avg_active_morphs: f64,
    pub cache_hit_rate: f64,
    pub lod_enabled: bool,
    pub current_lod_level: LodLevel,
}

/// Per-session morph optimizer
#[derive(Debug, Clone)]
pub struct MorphOptimizer {
    config: OptimizerConfig,
    metrics: PerformanceMetrics,
    filter: MorphLodFilter,
    cache: MorphCache,
    rate: FrameRateController,
}

impl MorphOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        let mut rate = FrameRateController::new(config.target_fps);
        rate.set_frame_skipping(config.enable_frame_skipping);
        Self {
            metrics: PerformanceMetrics::new(config.target_fps),
            filter: MorphLodFilter,
            cache: MorphCache::new(config.cache_capacity),
            rate,
            config,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn cache(&self) -> &MorphCache {
        &self.cache
    }

    /// Optimize `raw` for a renderer currently running at `current_fps`
    pub fn optimize_morphs(&mut self, raw: &MorphFrame, current_fps: f64) -> MorphFrame {
        self.optimize_at_level(raw, LodLevel::from_fps(current_fps))
    }

    /// Optimize at an explicit LOD level
    pub fn optimize_at_level(&mut self, raw: &MorphFrame, level: LodLevel) -> MorphFrame {
        let start = Instant::now();
        let level = if self.config.enable_lod { level } else { LodLevel::High };

        let key = self.config.enable_caching.then(|| CacheKey::new(raw, level));
        if let Some(cached) = key.as_ref().and_then(|k| self.cache.get(k)) {
            return cached;
        }

        let mut morphs = self.filter.filter(raw, level);
        let floor = self.config.noise_floor;
        morphs.retain(|_, v| v.abs() > floor);

        if let Some(key) = key {
            self.cache.put(key, morphs.clone());
        }

        self.metrics
            .record_morph_time(start.elapsed().as_secs_f64(), morphs.len());
        morphs
    }

    /// Record how long a whole frame took and check the thresholds
    pub fn record_frame(&mut self, frame_time: f64) -> PerformanceAlert {
        self.metrics.record_frame_time(frame_time);
        let fps = self.metrics.fps;
        if fps < self.config.critical_fps {
            tracing::error!(fps, "critical frame rate");
            self.config.enable_lod = true;
            self.rate.set_frame_skipping(true);
            PerformanceAlert::Critical {
                fps,
                change_threshold: self.config.critical_change_threshold,
            }
        } else if fps < self.config.warning_fps {
            tracing::warn!(fps, "degraded frame rate");
            self.config.enable_lod = true;
            PerformanceAlert::Warning { fps }
        } else {
            PerformanceAlert::Normal
        }
    }

    /// Gate, optimize and time one frame arriving at `now`.
    ///
    /// Returns `None` when the frame is off schedule.
    pub fn process_frame(&mut self, raw: &MorphFrame, now: f64) -> Option<(MorphFrame, PerformanceAlert)> {
        let start = Instant::now();
        let (update, _) = self.rate.should_update(now);
        if !update {
            return None;
        }
        let fps = self.metrics.fps;
        let optimized = self.optimize_morphs(raw, fps);
        let alert = self.record_frame(start.elapsed().as_secs_f64());
        Some((optimized, alert))
    }

    /// Whether processing that took `processing_time` should drop the next frame
    pub fn should_skip_frame(&self, processing_time: f64) -> bool {
        self.rate.should_skip_frame(processing_time)
    }

    pub fn report(&self) -> PerformanceReport {
        PerformanceReport {
            fps: self.metrics.fps,
            avg_frame_time_ms: self.metrics.avg_frame_time * 1000.0,
            avg_morph_time_ms: self.metrics.avg_morph_time * 1000.0,
            avg_active_morphs: self.metrics.avg_active_morphs(),
            cache_hit_rate: self.cache.hit_rate(),
            lod_enabled: self.config.enable_lod,
            current_lod_level: LodLevel::from_fps(self.metrics.fps),
        }
    }

    /// Drop cached results, metrics and rate state
    pub fn reset(&mut self) {
        self.cache.clear();
        self.metrics = PerformanceMetrics::new(self.config.target_fps);
        self.rate.reset();
    }
}

impl Default for MorphOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}
