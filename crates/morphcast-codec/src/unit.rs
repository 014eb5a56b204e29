//! Compressed units - one keyframe or delta per source frame

use std::collections::BTreeMap;

use morphcast_core::{MorphFrame, MorphKey};

/// Unit kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum UnitKind {
    /// Complete state snapshot
    Keyframe = 0,
    /// Changed morphs only
    Delta = 1,
}

impl UnitKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(UnitKind::Keyframe),
            1 => Some(UnitKind::Delta),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnitKind::Keyframe => "keyframe",
            UnitKind::Delta => "delta",
        }
    }
}

/// Per-morph motion hint sent alongside a delta
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct MotionHint {
    /// Change per frame
    pub velocity: f64,
    /// Change of velocity per frame
    pub acceleration: f64,
}

impl MotionHint {
    /// Linear + quadratic extrapolation from `current` after `t` frames
    #[inline]
    pub fn extrapolate(&self, current: f64, t: f64) -> f64 {
        current + self.velocity * t + 0.5 * self.acceleration * t * t
    }
}

/// One compressed unit
#[derive(Clone, Debug, PartialEq)]
pub struct CompressedUnit {
    /// Keyframe or delta
    pub kind: UnitKind,
    /// Source frame index (monotonic per compressor)
    pub frame: u64,
    /// Capture time in seconds
    pub timestamp: f64,
    /// Absolute morph values carried by this unit
    pub morphs: MorphFrame,
    /// Motion hints (deltas only)
    pub predictions: BTreeMap<MorphKey, MotionHint>,
}

impl CompressedUnit {
    pub fn keyframe(frame: u64, timestamp: f64, morphs: MorphFrame) -> Self {
        CompressedUnit {
            kind: UnitKind::Keyframe,
            frame,
            timestamp,
            morphs,
            predictions: BTreeMap::new(),
        }
    }

    pub fn delta(frame: u64, timestamp: f64, morphs: MorphFrame) -> Self {
        CompressedUnit {
            kind: UnitKind::Delta,
            frame,
            timestamp,
            morphs,
            predictions: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn is_keyframe(&self) -> bool {
        self.kind == UnitKind::Keyframe
    }

    /// Is this a delta that changes nothing?
    pub fn is_empty(&self) -> bool {
        self.kind == UnitKind::Delta && self.morphs.is_empty()
    }

    /// Exact size of this unit inside a batch payload
    pub fn encoded_len(&self) -> usize {
        let key_len = |k: &MorphKey| match k {
            MorphKey::Known(_) => 2,
            MorphKey::Custom(name) => 2 + 2 + name.len(),
        };
        let mut size = 1 + 8 + 8 + 2 + 2; // kind, frame, timestamp, counts
        for (k, _) in self.morphs.iter() {
            size += key_len(k) + 8;
        }
        for k in self.predictions.keys() {
            size += key_len(k) + 16;
        }
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_kind_bytes() {
        assert_eq!(UnitKind::from_byte(0), Some(UnitKind::Keyframe));
        assert_eq!(UnitKind::from_byte(1), Some(UnitKind::Delta));
        assert_eq!(UnitKind::from_byte(2), None);
        assert_eq!(UnitKind::Delta.as_str(), "delta");
    }

    #[test]
    fn test_motion_hint_extrapolate() {
        let hint = MotionHint {
            velocity: 0.1,
            acceleration: 0.2,
        };
        assert_eq!(hint.extrapolate(0.5, 0.0), 0.5);
        assert!((hint.extrapolate(0.5, 1.0) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_encoded_len_counts_custom_names() {
        let mut morphs = MorphFrame::new();
        morphs.insert("V_AA", 0.5);
        morphs.insert("jawOpen", 0.5);
        let unit = CompressedUnit::keyframe(0, 0.0, morphs);
        // header 21 + known (2 + 8) + custom (2 + 2 + 7 + 8)
        assert_eq!(unit.encoded_len(), 21 + 10 + 19);
    }
}
