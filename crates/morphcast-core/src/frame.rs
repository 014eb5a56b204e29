//! Morph frames - the per-tick value map
//!
//! A frame maps morph keys to intensities in [0, 1]. Writes clamp into range
//! and NaN is refused, so every stage downstream may assume finite values.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::MorphKey;

/// Lowest canonical morph intensity
pub const MORPH_MIN: f64 = 0.0;

/// Highest canonical morph intensity
pub const MORPH_MAX: f64 = 1.0;

/// A single frame of morph values
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MorphFrame {
    values: BTreeMap<MorphKey, f64>,
}

impl MorphFrame {
    /// Create an empty frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, clamped to [0, 1].
    /// Returns false (and stores nothing) for NaN.
    pub fn insert(&mut self, key: impl Into<MorphKey>, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        self.values
            .insert(key.into(), value.clamp(MORPH_MIN, MORPH_MAX));
        true
    }

    pub fn get(&self, key: &MorphKey) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Value by name, zero when absent
    pub fn value_of(&self, name: &str) -> f64 {
        self.values.get(&MorphKey::new(name)).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, key: &MorphKey) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &MorphKey) -> Option<f64> {
        self.values.remove(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MorphKey, f64)> + '_ {
        self.values.iter().map(|(k, v)| (k, *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &MorphKey> + '_ {
        self.values.keys()
    }

    /// Keep only entries matching the predicate
    pub fn retain(&mut self, mut keep: impl FnMut(&MorphKey, f64) -> bool) {
        self.values.retain(|k, v| keep(k, *v));
    }

    /// The strongest morph, ties resolved by key order
    pub fn dominant(&self) -> Option<(&MorphKey, f64)> {
        self.values
            .iter()
            .fold(None, |best: Option<(&MorphKey, f64)>, (k, v)| match best {
                Some((_, bv)) if bv >= *v => best,
                _ => Some((k, *v)),
            })
    }

    /// Keep the `limit` strongest morphs
    pub fn truncate_strongest(&mut self, limit: usize) {
        if self.values.len() <= limit {
            return;
        }
        let mut ranked: Vec<(MorphKey, f64)> =
            self.values.iter().map(|(k, v)| (k.clone(), *v)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        self.values = ranked.into_iter().collect();
    }

    /// Largest absolute per-morph difference against another frame
    pub fn max_abs_diff(&self, other: &MorphFrame) -> f64 {
        let mut max = 0.0_f64;
        for (k, v) in self.iter() {
            max = max.max((v - other.get(k).unwrap_or(0.0)).abs());
        }
        for (k, v) in other.iter() {
            if !self.contains(k) {
                max = max.max(v.abs());
            }
        }
        max
    }
}

impl<K: Into<MorphKey>> FromIterator<(K, f64)> for MorphFrame {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut frame = MorphFrame::new();
        for (k, v) in iter {
            frame.insert(k, v);
        }
        frame
    }
}

impl<K: Into<MorphKey>> Extend<(K, f64)> for MorphFrame {
    fn extend<I: IntoIterator<Item = (K, f64)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<'de> Deserialize<'de> for MorphFrame {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<MorphKey, f64>::deserialize(deserializer)?;
        Ok(raw.into_iter().collect())
    }
}

impl IntoIterator for MorphFrame {
    type Item = (MorphKey, f64);
    type IntoIter = btree_map::IntoIter<MorphKey, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_insert_clamps_and_rejects_nan() {
        let mut frame = MorphFrame::new();
        assert!(frame.insert("V_AA", 1.7));
        assert!(frame.insert("Mouth_Smile_L", -0.4));
        assert!(frame.insert("jawOpen", f64::INFINITY));
        assert!(!frame.insert("V_EE", f64::NAN));

        assert_eq!(frame.value_of("V_AA"), 1.0);
        assert_eq!(frame.value_of("Mouth_Smile_L"), 0.0);
        assert_eq!(frame.value_of("jawOpen"), 1.0);
        assert!(!frame.contains(&MorphKey::new("V_EE")));
    }

    #[test]
    fn test_dominant_and_truncate() {
        let mut frame: MorphFrame = [("V_AA", 0.3), ("V_EE", 0.9), ("V_U", 0.5)]
            .into_iter()
            .collect();
        let (key, value) = frame.dominant().unwrap();
        assert_eq!(key.as_str(), "V_EE");
        assert_eq!(value, 0.9);

        frame.truncate_strongest(2);
        assert_eq!(frame.len(), 2);
        assert!(!frame.contains(&MorphKey::new("V_AA")));
    }

    #[test]
    fn test_serde_as_name_map() {
        let frame: MorphFrame = [("V_Open", 0.5), ("customMorph", 0.25)].into_iter().collect();
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"V_Open":0.5,"customMorph":0.25}"#);
        let back: MorphFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame);
    }

    proptest! {
        #[test]
        fn prop_values_always_in_range(values in proptest::collection::vec(-10.0f64..10.0, 0..32)) {
            let frame: MorphFrame = values
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("m{}", i), *v))
                .collect();
            for (_, v) in frame.iter() {
                prop_assert!((MORPH_MIN..=MORPH_MAX).contains(&v));
            }
        }
    }
}
