//! Delta Decompressor - ordered unit application and client interpolation
//!
//! Units MUST be applied in production order. A delta that does not follow
//! the last applied frame means a unit was lost; the decoder then refuses
//! further deltas until a keyframe arrives, and reports the gap so the caller
//! can ask the encoder for one.

use std::collections::BTreeMap;

use morphcast_core::{MorphFrame, MorphKey, MorphcastError};

use crate::{BatchDecoder, CodecResult, CompressedUnit, MotionHint, UnitKind};

/// Result of applying one unit
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    /// Unit applied; `morphs` is the full reconstructed frame
    Applied {
        frame: u64,
        timestamp: f64,
        morphs: MorphFrame,
    },
    /// Decoder state diverged; a keyframe is required
    ResyncRequired { expected: u64, got: u64 },
}

impl DecodeOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, DecodeOutcome::Applied { .. })
    }

    /// Convert a gap into the corresponding error
    pub fn into_result(self) -> Result<MorphFrame, MorphcastError> {
        match self {
            DecodeOutcome::Applied { morphs, .. } => Ok(morphs),
            DecodeOutcome::ResyncRequired { expected, got } => {
                Err(MorphcastError::CodecStateCorruption { expected, got })
            }
        }
    }
}

/// Client-side decoder
#[derive(Debug, Clone)]
pub struct DeltaDecompressor {
    /// Frame the client is moving away from
    previous: MorphFrame,
    /// Latest reconstructed frame (interpolation target)
    reconstructed: MorphFrame,
    /// Motion hints from the latest delta
    predictions: BTreeMap<MorphKey, MotionHint>,
    last_frame: Option<u64>,
    last_timestamp: f64,
    needs_keyframe: bool,
    interpolation_enabled: bool,
}

impl DeltaDecompressor {
    pub fn new() -> Self {
        Self::with_interpolation(true)
    }

    pub fn with_interpolation(enabled: bool) -> Self {
        Self {
            previous: MorphFrame::new(),
            reconstructed: MorphFrame::new(),
            predictions: BTreeMap::new(),
            last_frame: None,
            last_timestamp: 0.0,
            needs_keyframe: true,
            interpolation_enabled: enabled,
        }
    }

    /// Latest reconstructed frame
    pub fn current(&self) -> &MorphFrame {
        &self.reconstructed
    }

    pub fn predictions(&self) -> &BTreeMap<MorphKey, MotionHint> {
        &self.predictions
    }

    /// True until a keyframe has been applied after start or a gap
    pub fn needs_keyframe(&self) -> bool {
        self.needs_keyframe
    }

    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }

    /// Decode a batch payload and apply every unit in order
    pub fn decompress_batch(&mut self, data: &[u8]) -> CodecResult<Vec<DecodeOutcome>> {
        let units = BatchDecoder::decode(data)?;
        Ok(units.iter().map(|unit| self.decompress_frame(unit)).collect())
    }

    /// Apply a single unit
    pub fn decompress_frame(&mut self, unit: &CompressedUnit) -> DecodeOutcome {
        match unit.kind {
            UnitKind::Keyframe => {
                let mut next = unit.morphs.clone();
                for key in self.reconstructed.keys() {
                    if !next.contains(key) {
                        next.insert(key.clone(), 0.0);
                    }
                }
                self.predictions.clear();
                self.needs_keyframe = false;
                self.advance(unit, next)
            }
            UnitKind::Delta => {
                let expected = self.last_frame.map(|f| f + 1).unwrap_or(0);
                if self.needs_keyframe || unit.frame != expected {
                    self.needs_keyframe = true;
                    return DecodeOutcome::ResyncRequired {
                        expected,
                        got: unit.frame,
                    };
                }

                let mut next = self.reconstructed.clone();
                for (key, value) in unit.morphs.iter() {
                    next.insert(key.clone(), value);
                }
                if !unit.predictions.is_empty() {
                    self.predictions = unit.predictions.clone();
                }
                self.advance(unit, next)
            }
        }
    }

    fn advance(&mut self, unit: &CompressedUnit, next: MorphFrame) -> DecodeOutcome {
        self.previous = std::mem::replace(&mut self.reconstructed, next);
        self.last_frame = Some(unit.frame);
        self.last_timestamp = unit.timestamp;
        DecodeOutcome::Applied {
            frame: unit.frame,
            timestamp: unit.timestamp,
            morphs: self.reconstructed.clone(),
        }
    }

    /// Blended frame for render time `now` at the given render rate
    pub fn interpolate(&self, now: f64, target_fps: f64) -> MorphFrame {
        if !self.interpolation_enabled || target_fps <= 0.0 {
            return self.reconstructed.clone();
        }
        let t = (now - self.last_timestamp) * target_fps;
        self.interpolate_at(t)
    }

    /// Blended frame at progress `t` in [0, 1] from previous to current
    pub fn interpolate_at(&self, t: f64) -> MorphFrame {
        let t = if t.is_nan() { 1.0 } else { t.clamp(0.0, 1.0) };
        let smooth = t * t * (3.0 - 2.0 * t);
        let weight = (1.0 - t) * 0.5;

        let mut out = MorphFrame::new();
        let keys = self.previous.keys().chain(self.reconstructed.keys());
        for key in keys {
            if out.contains(key) {
                continue;
            }
            let current = self.previous.get(key).unwrap_or(0.0);
            let target = self.reconstructed.get(key).unwrap_or(0.0);
            let linear = current + (target - current) * smooth;
            let value = match self.predictions.get(key) {
                Some(hint) => linear * (1.0 - weight) + hint.extrapolate(current, t) * weight,
                None => linear,
            };
            out.insert(key.clone(), value);
        }
        out
    }

    pub fn reset(&mut self) {
        *self = Self::with_interpolation(self.interpolation_enabled);
    }
}

impl Default for DeltaDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompressorConfig, DeltaCompressor};
    use proptest::prelude::*;

    fn frame(pairs: &[(&str, f64)]) -> MorphFrame {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn applied(outcome: DecodeOutcome) -> MorphFrame {
        outcome.into_result().unwrap()
    }

    #[test]
    fn test_keyframe_zeroes_missing_morphs() {
        let mut decoder = DeltaDecompressor::new();
        decoder.decompress_frame(&CompressedUnit::keyframe(0, 0.0, frame(&[("V_AA", 0.5), ("V_EE", 0.3)])));
        let out = applied(decoder.decompress_frame(&CompressedUnit::keyframe(
            1,
            0.1,
            frame(&[("V_AA", 0.7)]),
        )));
        assert_eq!(out, frame(&[("V_AA", 0.7), ("V_EE", 0.0)]));
    }

    #[test]
    fn test_delta_touches_only_listed_keys() {
        let mut decoder = DeltaDecompressor::new();
        decoder.decompress_frame(&CompressedUnit::keyframe(0, 0.0, frame(&[("V_AA", 0.5), ("V_EE", 0.3)])));
        let out = applied(decoder.decompress_frame(&CompressedUnit::delta(1, 0.1, frame(&[("V_EE", 0.9)]))));
        assert_eq!(out, frame(&[("V_AA", 0.5), ("V_EE", 0.9)]));
    }

    #[test]
    fn test_gap_requires_keyframe() {
        let mut decoder = DeltaDecompressor::new();

        // No keyframe yet
        let outcome = decoder.decompress_frame(&CompressedUnit::delta(0, 0.0, frame(&[("V_AA", 0.5)])));
        assert_eq!(outcome, DecodeOutcome::ResyncRequired { expected: 0, got: 0 });

        decoder.decompress_frame(&CompressedUnit::keyframe(0, 0.0, frame(&[("V_AA", 0.5)])));
        assert!(!decoder.needs_keyframe());

        // Frame 1 lost
        let outcome = decoder.decompress_frame(&CompressedUnit::delta(2, 0.2, frame(&[("V_AA", 0.1)])));
        assert_eq!(outcome, DecodeOutcome::ResyncRequired { expected: 1, got: 2 });
        assert!(decoder.needs_keyframe());
        assert_eq!(decoder.current(), &frame(&[("V_AA", 0.5)]));

        // Still latched even for a delta that would follow
        let outcome = decoder.decompress_frame(&CompressedUnit::delta(1, 0.1, frame(&[("V_AA", 0.2)])));
        assert!(!outcome.is_applied());

        let out = applied(decoder.decompress_frame(&CompressedUnit::keyframe(3, 0.3, frame(&[("V_AA", 0.4)]))));
        assert_eq!(out, frame(&[("V_AA", 0.4)]));
        assert!(decoder.decompress_frame(&CompressedUnit::delta(4, 0.4, MorphFrame::new())).is_applied());
    }

    #[test]
    fn test_resync_maps_to_error() {
        let err = DecodeOutcome::ResyncRequired { expected: 3, got: 5 }
            .into_result()
            .unwrap_err();
        assert_eq!(err, MorphcastError::CodecStateCorruption { expected: 3, got: 5 });
    }

    #[test]
    fn test_interpolation_boundaries() {
        let mut decoder = DeltaDecompressor::new();
        decoder.decompress_frame(&CompressedUnit::keyframe(0, 0.0, frame(&[("V_Open", 0.2), ("V_AA", 0.6)])));
        let mut delta = CompressedUnit::delta(1, 1.0, frame(&[("V_Open", 0.8)]));
        delta.predictions.insert(
            MorphKey::new("V_Open"),
            MotionHint {
                velocity: 0.6,
                acceleration: 0.1,
            },
        );
        decoder.decompress_frame(&delta);

        let start = decoder.interpolate_at(0.0);
        assert!((start.value_of("V_Open") - 0.2).abs() < 1e-12);
        assert!((start.value_of("V_AA") - 0.6).abs() < 1e-12);

        let end = decoder.interpolate_at(1.0);
        assert!((end.value_of("V_Open") - 0.8).abs() < 1e-12);

        let mid = decoder.interpolate(1.0 + 0.5 / 30.0, 30.0);
        let v = mid.value_of("V_Open");
        assert!(v > 0.2 && v < 0.8);

        // Far past the update the target is held
        assert_eq!(decoder.interpolate(10.0, 30.0), decoder.interpolate_at(1.0));
    }

    #[test]
    fn test_decompress_batch_threads_state() {
        let mut compressor = DeltaCompressor::with_config(CompressorConfig::default());
        compressor.compress_frame(&frame(&[("V_AA", 0.5)]), 0.0).unwrap();
        compressor.compress_frame(&frame(&[("V_AA", 0.5), ("V_EE", 0.2)]), 0.1).unwrap();
        let payload = compressor.compress_frame(&frame(&[("V_EE", 0.2)]), 0.2).unwrap().unwrap();

        let mut decoder = DeltaDecompressor::new();
        let outcomes = decoder.decompress_batch(&payload).unwrap();
        assert_eq!(outcomes.len(), 3);
        let last = outcomes.into_iter().last().unwrap().into_result().unwrap();
        assert_eq!(last, frame(&[("V_AA", 0.0), ("V_EE", 0.2)]));
    }

    #[test]
    fn test_malformed_batch_is_an_error() {
        let mut decoder = DeltaDecompressor::new();
        assert!(decoder.decompress_batch(&[0x01, 0x05]).is_err());
    }

    fn quantized_frames() -> impl Strategy<Value = Vec<Vec<u8>>> {
        proptest::collection::vec(proptest::collection::vec(0u8..=100, 6), 1..40)
    }

    proptest! {
        // Values on a 0.01 grid: every change is either zero or above the threshold
        #[test]
        fn prop_roundtrip_identity(frames in quantized_frames(), batch_size in 1usize..5) {
            let mut compressor = DeltaCompressor::with_config(CompressorConfig {
                batch_size,
                force_keyframe_interval: 7,
                ..Default::default()
            });
            let mut decoder = DeltaDecompressor::new();
            let mut expected = Vec::new();
            let mut decoded = Vec::new();

            for (i, raw) in frames.iter().enumerate() {
                let f: MorphFrame = raw
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| **v > 0)
                    .map(|(j, v)| (format!("m{}", j), f64::from(*v) / 100.0))
                    .collect();
                expected.push(f.clone());
                if let Some(payload) = compressor.compress_frame(&f, i as f64 * 0.016).unwrap() {
                    decoded.extend(decoder.decompress_batch(&payload).unwrap());
                }
            }
            if let Some(payload) = compressor.flush().unwrap() {
                decoded.extend(decoder.decompress_batch(&payload).unwrap());
            }

            prop_assert_eq!(decoded.len(), expected.len());
            for (outcome, original) in decoded.into_iter().zip(expected) {
                let rebuilt = outcome.into_result().unwrap();
                for (key, value) in original.iter() {
                    prop_assert_eq!(rebuilt.get(key), Some(value));
                }
                for (key, value) in rebuilt.iter() {
                    if !original.contains(key) {
                        prop_assert_eq!(value, 0.0);
                    }
                }
            }
        }
    }
}
