//! Priority tiers and LOD levels

use morphcast_core::{MorphFrame, MorphKey};
use serde::{Deserialize, Serialize};

/// Morph importance tier (lower survives longer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum MorphTier {
    /// Critical for speech
    Speech = 1,
    /// Primary expressions (smile, frown, blink, brows)
    Expression = 2,
    /// Secondary movement (squint, sneer, press)
    Secondary = 3,
    /// Fine detail (dimples, lip raise/lower, gaze)
    Detail = 4,
}

impl MorphTier {
    /// Tier of a morph; `None` for morphs outside the table
    pub fn of(key: &MorphKey) -> Option<Self> {
        use MorphTier::*;
        let tier = match key.as_str() {
            "V_AA" | "V_EE" | "V_OH" | "V_U" | "V_Open" | "V_Explosive" | "V_FF" | "V_DD"
            | "V_SS" | "V_CH" => Speech,
            "Mouth_Smile_L" | "Mouth_Smile_R" | "Mouth_Frown_L" | "Mouth_Frown_R"
            | "Eye_Blink_L" | "Eye_Blink_R" | "Brow_Raise_L" | "Brow_Raise_R" | "Brow_Drop_L"
            | "Brow_Drop_R" => Expression,
            "Eye_Squint_L" | "Eye_Squint_R" | "Cheek_Squint_L" | "Cheek_Squint_R"
            | "Nose_Sneer_L" | "Nose_Sneer_R" | "Mouth_Press_L" | "Mouth_Press_R" => Secondary,
            "Mouth_Dimple_L" | "Mouth_Dimple_R" | "Mouth_Upper_Up_L" | "Mouth_Upper_Up_R"
            | "Mouth_Lower_Down_L" | "Mouth_Lower_Down_R" | "Eye_Look_Up_L" | "Eye_Look_Up_R"
            | "Eye_Look_Down_L" | "Eye_Look_Down_R" => Detail,
            _ => return None,
        };
        Some(tier)
    }
}

/// Level of detail, chosen from the measured frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LodLevel {
    /// All tiers
    #[default]
    High,
    /// Tiers 1-3
    Medium,
    /// Tiers 1-2
    Low,
    /// Speech only
    Minimal,
}

impl LodLevel {
    /// fps >= 60 high, >= 45 medium, >= 30 low, else minimal
    pub fn from_fps(fps: f64) -> Self {
        if fps >= 60.0 {
            LodLevel::High
        } else if fps >= 45.0 {
            LodLevel::Medium
        } else if fps >= 30.0 {
            LodLevel::Low
        } else {
            LodLevel::Minimal
        }
    }

    /// Highest tier kept at this level
    pub fn max_tier(self) -> MorphTier {
        match self {
            LodLevel::High => MorphTier::Detail,
            LodLevel::Medium => MorphTier::Secondary,
            LodLevel::Low => MorphTier::Expression,
            LodLevel::Minimal => MorphTier::Speech,
        }
    }

    /// Coarser of this level and the one implied by a quality preset's
    /// LOD offset (0 = no reduction)
    pub fn with_floor(self, offset: u8) -> Self {
        let floor = match offset {
            0 => LodLevel::High,
            1 => LodLevel::Medium,
            2 => LodLevel::Low,
            _ => LodLevel::Minimal,
        };
        self.max(floor)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LodLevel::High => "high",
            LodLevel::Medium => "medium",
            LodLevel::Low => "low",
            LodLevel::Minimal => "minimal",
        }
    }

    /// Is `key` kept at this level? Morphs outside the tier table always are.
    pub fn allows(self, key: &MorphKey) -> bool {
        MorphTier::of(key).map_or(true, |tier| tier <= self.max_tier())
    }
}

/// Tier-based morph filter
#[derive(Debug, Clone, Copy, Default)]
pub struct MorphLodFilter;

impl MorphLodFilter {
    /// Keep the morphs allowed at `level`
    pub fn filter(&self, frame: &MorphFrame, level: LodLevel) -> MorphFrame {
        let mut out = frame.clone();
        out.retain(|key, _| level.allows(key));
        out
    }

    /// Keep the morphs allowed at the level implied by `fps`
    pub fn filter_for_fps(&self, frame: &MorphFrame, fps: f64) -> MorphFrame {
        self.filter(frame, LodLevel::from_fps(fps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tier_lookup() {
        assert_eq!(MorphTier::of(&"V_AA".into()), Some(MorphTier::Speech));
        assert_eq!(MorphTier::of(&"Brow_Drop_R".into()), Some(MorphTier::Expression));
        assert_eq!(MorphTier::of(&"Mouth_Press_L".into()), Some(MorphTier::Secondary));
        assert_eq!(MorphTier::of(&"Eye_Look_Up_L".into()), Some(MorphTier::Detail));
        assert_eq!(MorphTier::of(&"Detail_Morph_3".into()), None);
    }

    #[test]
    fn test_level_from_fps() {
        assert_eq!(LodLevel::from_fps(60.0), LodLevel::High);
        assert_eq!(LodLevel::from_fps(59.9), LodLevel::Medium);
        assert_eq!(LodLevel::from_fps(45.0), LodLevel::Medium);
        assert_eq!(LodLevel::from_fps(30.0), LodLevel::Low);
        assert_eq!(LodLevel::from_fps(12.0), LodLevel::Minimal);
        assert_eq!(LodLevel::Low.as_str(), "low");
    }

    #[test]
    fn test_level_floor() {
        assert_eq!(LodLevel::High.with_floor(0), LodLevel::High);
        assert_eq!(LodLevel::High.with_floor(2), LodLevel::Low);
        assert_eq!(LodLevel::Minimal.with_floor(1), LodLevel::Minimal);
    }

    #[test]
    fn test_filter_keeps_custom_morphs() {
        let frame: MorphFrame = [
            ("V_AA", 0.5),
            ("Mouth_Smile_L", 0.5),
            ("Eye_Squint_L", 0.5),
            ("Mouth_Dimple_L", 0.5),
            ("customShape", 0.5),
        ]
        .into_iter()
        .collect();

        let filter = MorphLodFilter;
        assert_eq!(filter.filter_for_fps(&frame, 60.0).len(), 5);
        assert_eq!(filter.filter_for_fps(&frame, 50.0).len(), 4);
        assert_eq!(filter.filter_for_fps(&frame, 30.0).len(), 3);

        let minimal = filter.filter_for_fps(&frame, 10.0);
        assert_eq!(minimal.len(), 2);
        assert!(minimal.contains(&"customShape".into()));
    }

    const NAMES: &[&str] = &[
        "V_AA",
        "V_OH",
        "Mouth_Smile_L",
        "Eye_Blink_R",
        "Eye_Squint_L",
        "Nose_Sneer_R",
        "Mouth_Dimple_L",
        "Eye_Look_Down_R",
        "customShape",
    ];

    proptest! {
        #[test]
        fn prop_lod_monotonic(
            values in proptest::collection::vec(0.0f64..1.0, NAMES.len()),
            low_fps in 0.0f64..120.0,
            extra in 0.0f64..60.0,
        ) {
            let frame: MorphFrame = NAMES.iter().copied().zip(values).collect();
            let filter = MorphLodFilter;
            let slow = filter.filter_for_fps(&frame, low_fps);
            let fast = filter.filter_for_fps(&frame, low_fps + extra);
            for key in slow.keys() {
                prop_assert!(fast.contains(key));
            }
        }
    }
}
