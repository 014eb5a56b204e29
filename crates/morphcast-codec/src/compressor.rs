//! Delta Compressor - keyframe/delta selection and batching
//!
//! Every source frame becomes exactly one unit. Keyframes are emitted on a
//! fixed interval (or on request); everything else is a delta against the
//! previous source frame. Units accumulate into a batch that is encoded once
//! full.

use std::collections::BTreeSet;

use bytes::Bytes;

use morphcast_core::{MorphFrame, MorphKey};

use crate::{
    BatchEncoder, CodecResult, CompressedUnit, MotionPredictor, PredictionConfig, UnitKind,
};

/// Perceptually critical morphs, compared with the tighter priority threshold.
/// Sorted for binary search.
pub const PRIORITY_MORPHS: &[&str] = &[
    "Brow_Down_L",
    "Brow_Down_R",
    "Brow_Inner_Up",
    "Eye_Blink_L",
    "Eye_Blink_R",
    "Eye_L_Blink",
    "Eye_L_Wide",
    "Eye_R_Blink",
    "Eye_R_Wide",
    "Jaw_Open",
    "Mouth_Open",
    "V_Open",
];

/// Is `key` in the priority set?
pub fn is_priority_morph(key: &MorphKey) -> bool {
    PRIORITY_MORPHS.binary_search(&key.as_str()).is_ok()
}

/// Compressor configuration
#[derive(Debug, Clone)]
pub struct CompressorConfig {
    /// Minimum change for a regular morph to be sent in a delta
    pub change_threshold: f64,
    /// Minimum change for a priority morph
    pub priority_threshold: f64,
    /// Keyframe entries at or below this magnitude are dropped
    pub keyframe_floor: f64,
    /// Keyframe every N frames
    pub force_keyframe_interval: u32,
    /// Units per encoded batch
    pub batch_size: usize,
    /// Attach motion hints to deltas
    pub enable_prediction: bool,
    /// Motion hint thresholds
    pub prediction: PredictionConfig,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            change_threshold: 0.001,
            priority_threshold: 0.0001,
            keyframe_floor: 0.001,
            force_keyframe_interval: 30,
            batch_size: 3,
            enable_prediction: true,
            prediction: PredictionConfig::default(),
        }
    }
}

impl CompressorConfig {
    /// Fewer, larger batches and a coarser threshold for constrained links
    pub fn low_bandwidth() -> Self {
        Self {
            change_threshold: 0.01,
            force_keyframe_interval: 60,
            batch_size: 5,
            ..Default::default()
        }
    }

    /// One unit per payload
    pub fn low_latency() -> Self {
        Self {
            batch_size: 1,
            ..Default::default()
        }
    }
}

/// Persistent encoder state
#[derive(Debug, Clone, Default)]
pub struct CompressionState {
    /// Last source frame (what a fully synced client has reconstructed)
    pub previous_frame: MorphFrame,
    /// Frames compressed since the last reset
    pub frame_count: u64,
    /// Keyframe interval
    pub force_interval: u32,
    /// Next unit must be a keyframe
    pub force_next_keyframe: bool,
}

/// Compression statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompressionStats {
    pub total_frames: u64,
    pub keyframes: u64,
    pub deltas: u64,
    pub morphs_sent: u64,
    pub morphs_possible: u64,
    pub batches_emitted: u64,
    pub bytes_emitted: u64,
}

impl CompressionStats {
    /// Share of morph values not sent (0 = no savings)
    pub fn compression_ratio(&self) -> f64 {
        if self.morphs_possible == 0 {
            return 0.0;
        }
        (1.0 - self.morphs_sent as f64 / self.morphs_possible as f64).max(0.0)
    }

    pub fn avg_morphs_per_frame(&self) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        self.morphs_sent as f64 / self.total_frames as f64
    }

    /// Approximate value bytes per frame
    pub fn avg_frame_size(&self) -> f64 {
        self.avg_morphs_per_frame() * 8.0
    }
}

/// Keyframe/delta compressor
#[derive(Debug)]
pub struct DeltaCompressor {
    config: CompressorConfig,
    state: CompressionState,
    predictor: MotionPredictor,
    batch: Vec<CompressedUnit>,
    stats: CompressionStats,
    /// Client-declared additions to `PRIORITY_MORPHS`
    extra_priority: BTreeSet<MorphKey>,
}

impl DeltaCompressor {
    pub fn new() -> Self {
        Self::with_config(CompressorConfig::default())
    }

    pub fn with_config(config: CompressorConfig) -> Self {
        let state = CompressionState {
            force_interval: config.force_keyframe_interval.max(1),
            ..Default::default()
        };
        Self {
            predictor: MotionPredictor::new(config.prediction.clone()),
            batch: Vec::with_capacity(config.batch_size.max(1)),
            config,
            state,
            stats: CompressionStats::default(),
            extra_priority: BTreeSet::new(),
        }
    }

    pub fn config(&self) -> &CompressorConfig {
        &self.config
    }

    pub fn state(&self) -> &CompressionState {
        &self.state
    }

    pub fn stats(&self) -> &CompressionStats {
        &self.stats
    }

    pub fn predictor(&self) -> &MotionPredictor {
        &self.predictor
    }

    /// Units waiting for the batch to fill
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    pub fn set_change_threshold(&mut self, threshold: f64) {
        self.config.change_threshold = threshold.max(0.0);
    }

    /// Extend the priority set. Survives `reset`.
    pub fn add_priority_morphs(&mut self, keys: impl IntoIterator<Item = MorphKey>) {
        self.extra_priority.extend(keys);
    }

    pub fn is_priority(&self, key: &MorphKey) -> bool {
        is_priority_morph(key) || self.extra_priority.contains(key)
    }

    /// Make the next unit a keyframe regardless of interval
    pub fn force_keyframe(&mut self) {
        self.state.force_next_keyframe = true;
    }

    /// Compress one frame into a unit (no batching)
    pub fn compress_unit(&mut self, frame: &MorphFrame, now: f64) -> CompressedUnit {
        let index = self.state.frame_count;
        let is_keyframe =
            self.state.force_next_keyframe || index % u64::from(self.state.force_interval) == 0;

        let (unit, possible) = if is_keyframe {
            let mut morphs = frame.clone();
            morphs.retain(|_, v| v.abs() > self.config.keyframe_floor);
            (CompressedUnit::keyframe(index, now, morphs), frame.len())
        } else {
            self.delta_unit(frame, index, now)
        };

        self.stats.total_frames += 1;
        match unit.kind {
            UnitKind::Keyframe => self.stats.keyframes += 1,
            UnitKind::Delta => self.stats.deltas += 1,
        }
        self.stats.morphs_sent += unit.morphs.len() as u64;
        self.stats.morphs_possible += possible as u64;

        self.state.previous_frame = frame.clone();
        self.state.frame_count += 1;
        self.state.force_next_keyframe = false;

        unit
    }

    fn delta_unit(&mut self, frame: &MorphFrame, index: u64, now: f64) -> (CompressedUnit, usize) {
        let mut unit = CompressedUnit::delta(index, now, MorphFrame::new());
        let previous = &self.state.previous_frame;
        let mut possible = frame.len();

        for (key, new) in frame.iter() {
            let old = previous.get(key).unwrap_or(0.0);
            if self.should_send(key, old, new) {
                unit.morphs.insert(key.clone(), new);
                if self.config.enable_prediction {
                    self.predictor.observe(key, old, new);
                }
            }
        }

        // Morphs that vanished from the frame are cleared explicitly
        for (key, old) in previous.iter() {
            if frame.contains(key) || old == 0.0 {
                continue;
            }
            possible += 1;
            unit.morphs.insert(key.clone(), 0.0);
            if self.config.enable_prediction {
                self.predictor.observe(key, old, 0.0);
            }
        }

        if self.config.enable_prediction {
            unit.predictions = self.predictor.hints(unit.morphs.keys());
        }

        (unit, possible)
    }

    fn should_send(&self, key: &MorphKey, old: f64, new: f64) -> bool {
        let change = (new - old).abs();
        change > self.config.change_threshold
            || (change > self.config.priority_threshold && self.is_priority(key))
            || (new == 0.0 && old != 0.0)
    }

    /// Compress a frame into the batch; returns the encoded batch once full
    pub fn compress_frame(&mut self, frame: &MorphFrame, now: f64) -> CodecResult<Option<Bytes>> {
        let unit = self.compress_unit(frame, now);
        self.batch.push(unit);
        if self.batch.len() >= self.config.batch_size.max(1) {
            return self.encode_batch().map(Some);
        }
        Ok(None)
    }

    /// Encode whatever is batched, even if the batch is not full
    pub fn flush(&mut self) -> CodecResult<Option<Bytes>> {
        if self.batch.is_empty() {
            return Ok(None);
        }
        self.encode_batch().map(Some)
    }

    /// A batch that fails to encode is dropped. The client never sees its
    /// units, so the next unit is forced to a keyframe.
    fn encode_batch(&mut self) -> CodecResult<Bytes> {
        let units = std::mem::take(&mut self.batch);
        let payload = match BatchEncoder::encode(&units) {
            Ok(payload) => payload,
            Err(e) => {
                self.state.force_next_keyframe = true;
                return Err(e);
            }
        };
        self.stats.batches_emitted += 1;
        self.stats.bytes_emitted += payload.len() as u64;
        Ok(payload)
    }

    /// Drop all encoder state; the next unit is a keyframe
    pub fn reset(&mut self) {
        self.state = CompressionState {
            force_interval: self.config.force_keyframe_interval.max(1),
            ..Default::default()
        };
        self.predictor.reset();
        self.batch.clear();
        self.stats = CompressionStats::default();
    }
}

impl Default for DeltaCompressor {
    fn default() -> Self {
        Self::new()
    }
}
