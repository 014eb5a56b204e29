//! Morph identifiers
//!
//! Known morph names are interned into a compact `MorphId` (an index into a
//! sorted static table). Names outside the table travel as `Custom` keys so
//! that rigs with extra blendshapes keep working.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Every morph name the pipeline knows about.
/// INVARIANT: sorted in byte order so `MorphId` order equals name order.
pub const MORPH_NAMES: &[&str] = &[
    "Brow_Down_L",
    "Brow_Down_R",
    "Brow_Drop_L",
    "Brow_Drop_R",
    "Brow_Inner_Up",
    "Brow_Raise_Inner",
    "Brow_Raise_L",
    "Brow_Raise_R",
    "Cheek_Puff",
    "Cheek_Squint_L",
    "Cheek_Squint_R",
    "Eye_Blink_L",
    "Eye_Blink_R",
    "Eye_L_Blink",
    "Eye_L_Wide",
    "Eye_Look_Down_L",
    "Eye_Look_Down_R",
    "Eye_Look_In_L",
    "Eye_Look_In_R",
    "Eye_Look_Out_L",
    "Eye_Look_Out_R",
    "Eye_Look_Up_L",
    "Eye_Look_Up_R",
    "Eye_R_Blink",
    "Eye_R_Wide",
    "Eye_Squint_L",
    "Eye_Squint_R",
    "Eye_Wide_L",
    "Eye_Wide_R",
    "Jaw_Forward",
    "Jaw_L",
    "Jaw_Open",
    "Jaw_R",
    "Mouth_Dimple_L",
    "Mouth_Dimple_R",
    "Mouth_Frown_L",
    "Mouth_Frown_R",
    "Mouth_L",
    "Mouth_Lower_Down_L",
    "Mouth_Lower_Down_R",
    "Mouth_Open",
    "Mouth_Press_L",
    "Mouth_Press_R",
    "Mouth_Pucker_L",
    "Mouth_Pucker_R",
    "Mouth_R",
    "Mouth_Roll_Lower",
    "Mouth_Roll_Upper",
    "Mouth_Shrug_Lower",
    "Mouth_Shrug_Upper",
    "Mouth_Smile_L",
    "Mouth_Smile_R",
    "Mouth_Stretch_L",
    "Mouth_Stretch_R",
    "Mouth_Upper_Up_L",
    "Mouth_Upper_Up_R",
    "Nose_Sneer_L",
    "Nose_Sneer_R",
    "Tongue_Out",
    "V_AA",
    "V_CH",
    "V_DD",
    "V_Dental_Lip",
    "V_EE",
    "V_EH",
    "V_ER",
    "V_Explosive",
    "V_FF",
    "V_G",
    "V_H",
    "V_IH",
    "V_KK",
    "V_L",
    "V_M",
    "V_NN",
    "V_Narrow",
    "V_None",
    "V_OH",
    "V_Open",
    "V_RR",
    "V_Round",
    "V_SH",
    "V_SS",
    "V_TH",
    "V_Tight",
    "V_U",
    "V_V",
    "V_Wide",
];

/// Longest custom morph name accepted from clients, in bytes
pub const MAX_MORPH_NAME_LEN: usize = 256;

/// Non-empty, at most `MAX_MORPH_NAME_LEN` bytes, no control characters
pub fn is_valid_morph_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_MORPH_NAME_LEN && !name.chars().any(char::is_control)
}

/// Interned morph identifier - index into `MORPH_NAMES`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MorphId(u16);

impl MorphId {
    /// Look up a name in the static table
    pub fn lookup(name: &str) -> Option<Self> {
        MORPH_NAMES
            .binary_search(&name)
            .ok()
            .map(|idx| MorphId(idx as u16))
    }

    /// Rebuild from a wire index, rejecting out-of-table values
    #[inline]
    pub fn from_index(index: u16) -> Option<Self> {
        if (index as usize) < MORPH_NAMES.len() {
            Some(MorphId(index))
        } else {
            None
        }
    }

    #[inline]
    pub fn index(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn name(self) -> &'static str {
        MORPH_NAMES[self.0 as usize]
    }
}

impl fmt::Debug for MorphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Morph({}={})", self.0, self.name())
    }
}

/// Morph key - a known interned id or a custom name
#[derive(Clone)]
pub enum MorphKey {
    Known(MorphId),
    Custom(Arc<str>),
}

impl MorphKey {
    /// Intern a name, falling back to a custom key
    pub fn new(name: &str) -> Self {
        match MorphId::lookup(name) {
            Some(id) => MorphKey::Known(id),
            None => MorphKey::Custom(Arc::from(name)),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MorphKey::Known(id) => id.name(),
            MorphKey::Custom(name) => name,
        }
    }

    pub fn id(&self) -> Option<MorphId> {
        match self {
            MorphKey::Known(id) => Some(*id),
            MorphKey::Custom(_) => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, MorphKey::Known(_))
    }
}

impl PartialEq for MorphKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MorphKey::Known(a), MorphKey::Known(b)) => a == b,
            _ => self.as_str() == other.as_str(),
        }
    }
}

impl Eq for MorphKey {}

impl PartialOrd for MorphKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MorphKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (MorphKey::Known(a), MorphKey::Known(b)) => a.cmp(b),
            _ => self.as_str().cmp(other.as_str()),
        }
    }
}

impl Hash for MorphKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl From<&str> for MorphKey {
    fn from(name: &str) -> Self {
        MorphKey::new(name)
    }
}

impl From<String> for MorphKey {
    fn from(name: String) -> Self {
        MorphKey::new(&name)
    }
}

impl From<MorphId> for MorphKey {
    fn from(id: MorphId) -> Self {
        MorphKey::Known(id)
    }
}

impl fmt::Debug for MorphKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for MorphKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MorphKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MorphKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(MorphKey::new(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_sorted() {
        for pair in MORPH_NAMES.windows(2) {
            assert!(pair[0] < pair[1], "{} >= {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_morph_name_validity() {
        assert!(is_valid_morph_name("V_Open"));
        assert!(is_valid_morph_name(&"a".repeat(MAX_MORPH_NAME_LEN)));
        assert!(!is_valid_morph_name(&"a".repeat(MAX_MORPH_NAME_LEN + 1)));
        assert!(!is_valid_morph_name(""));
        assert!(!is_valid_morph_name("jaw\nOpen"));
    }

    #[test]
    fn test_lookup_roundtrip() {
        for (idx, name) in MORPH_NAMES.iter().enumerate() {
            let id = MorphId::lookup(name).unwrap();
            assert_eq!(id.index() as usize, idx);
            assert_eq!(id.name(), *name);
        }
        assert!(MorphId::lookup("jawOpen").is_none());
        assert!(MorphId::from_index(MORPH_NAMES.len() as u16).is_none());
    }

    #[test]
    fn test_custom_key_equality() {
        let known = MorphKey::new("V_AA");
        let custom = MorphKey::Custom(Arc::from("V_AA"));
        assert!(known.is_known());
        assert_eq!(known, custom);
        assert_eq!(known.cmp(&custom), Ordering::Equal);

        let other = MorphKey::new("Detail_Morph_3");
        assert!(!other.is_known());
        assert_eq!(other.as_str(), "Detail_Morph_3");
    }

    #[test]
    fn test_key_order_matches_name_order() {
        let mut keys: Vec<MorphKey> = ["V_U", "jawOpen", "Brow_Down_L", "Zeta", "V_AA"]
            .iter()
            .map(|n| MorphKey::new(n))
            .collect();
        keys.sort();
        let names: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["Brow_Down_L", "V_AA", "V_U", "Zeta", "jawOpen"]);
    }
}
