//! Quality levels and their presets
//!
//! Each level bundles a morph-count cap, an output update rate, and the
//! compression/LOD policy applied by the session pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::MorphcastError;

/// Named quality level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum QualityLevel {
    Low = 0,
    Medium = 1,
    #[default]
    High = 2,
    Ultra = 3,
}

impl QualityLevel {
    pub const ALL: [QualityLevel; 4] = [
        QualityLevel::Low,
        QualityLevel::Medium,
        QualityLevel::High,
        QualityLevel::Ultra,
    ];

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(QualityLevel::Low),
            1 => Some(QualityLevel::Medium),
            2 => Some(QualityLevel::High),
            3 => Some(QualityLevel::Ultra),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityLevel::Low => "low",
            QualityLevel::Medium => "medium",
            QualityLevel::High => "high",
            QualityLevel::Ultra => "ultra",
        }
    }

    /// Preset bundled with this level
    pub fn profile(self) -> QualityProfile {
        match self {
            QualityLevel::Low => QualityProfile {
                morph_limit: 10,
                update_rate: 30.0,
                compression: true,
                lod_level: 2,
            },
            QualityLevel::Medium => QualityProfile {
                morph_limit: 25,
                update_rate: 45.0,
                compression: true,
                lod_level: 1,
            },
            QualityLevel::High => QualityProfile {
                morph_limit: 52,
                update_rate: 60.0,
                compression: true,
                lod_level: 0,
            },
            QualityLevel::Ultra => QualityProfile {
                morph_limit: 52,
                update_rate: 90.0,
                compression: false,
                lod_level: 0,
            },
        }
    }
}

impl FromStr for QualityLevel {
    type Err = MorphcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(QualityLevel::Low),
            "medium" => Ok(QualityLevel::Medium),
            "high" => Ok(QualityLevel::High),
            "ultra" => Ok(QualityLevel::Ultra),
            other => Err(MorphcastError::InvalidMessage(format!(
                "unknown quality level: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality preset parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualityProfile {
    /// Maximum number of morphs sent per frame
    pub morph_limit: usize,
    /// Output update rate (frames per second)
    pub update_rate: f64,
    /// Whether delta compression applies
    pub compression: bool,
    /// Minimum LOD degradation step (0 = full detail)
    pub lod_level: u8,
}

impl QualityProfile {
    /// Tick divisor for the rate gate against a global output rate.
    /// The update rate is clamped to `target_fps`, so the divisor is at least 1.
    pub fn tick_divisor(&self, target_fps: f64) -> u64 {
        if target_fps <= 0.0 || self.update_rate <= 0.0 {
            return 1;
        }
        let rate = self.update_rate.min(target_fps);
        ((target_fps / rate).floor() as u64).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_byte_roundtrip() {
        for level in QualityLevel::ALL {
            assert_eq!(QualityLevel::from_byte(level.to_byte()), Some(level));
        }
        assert_eq!(QualityLevel::from_byte(9), None);
    }

    #[test]
    fn test_quality_parse() {
        assert_eq!("ULTRA".parse::<QualityLevel>().unwrap(), QualityLevel::Ultra);
        assert!("custom".parse::<QualityLevel>().is_err());
    }

    #[test]
    fn test_tick_divisor_clamps_fast_presets() {
        assert_eq!(QualityLevel::Low.profile().tick_divisor(60.0), 2);
        assert_eq!(QualityLevel::Medium.profile().tick_divisor(60.0), 1);
        assert_eq!(QualityLevel::High.profile().tick_divisor(60.0), 1);
        // 90 fps against a 60 fps target would otherwise divide by zero
        assert_eq!(QualityLevel::Ultra.profile().tick_divisor(60.0), 1);
    }

    #[test]
    fn test_only_ultra_disables_compression() {
        for level in QualityLevel::ALL {
            assert_eq!(level.profile().compression, level != QualityLevel::Ultra);
        }
    }
}
