//! Morph Cache - memoized optimizer output for repeated combinations
//!
//! Keys round every value to two decimals, so near-identical inputs share an
//! entry. The LOD level is part of the key; a cached result never carries
//! morphs the current level would drop.

use std::collections::HashMap;

use morphcast_core::{MorphFrame, MorphKey};

use crate::LodLevel;

/// Default number of cached combinations
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Cache key: LOD level plus the input rounded to 0.01
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    level: LodLevel,
    entries: Vec<(MorphKey, i64)>,
}

impl CacheKey {
    pub fn new(frame: &MorphFrame, level: LodLevel) -> Self {
        Self {
            level,
            entries: frame
                .iter()
                .map(|(k, v)| (k.clone(), (v * 100.0).round() as i64))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    frame: MorphFrame,
    accesses: u64,
}

/// Bounded cache evicting the least-accessed entry
#[derive(Debug, Clone)]
pub struct MorphCache {
    entries: HashMap<CacheKey, CacheEntry>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl MorphCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    /// Cached frame for `key`, counting a hit or miss
    pub fn get(&mut self, key: &CacheKey) -> Option<MorphFrame> {
        match self.entries.get_mut(key) {
            Some(entry) => {
                self.hits += 1;
                entry.accesses += 1;
                Some(entry.frame.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store a result, evicting the least-accessed entry when full
    pub fn put(&mut self, key: CacheKey, frame: MorphFrame) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            let victim = self
                .entries
                .iter()
                .min_by(|a, b| a.1.accesses.cmp(&b.1.accesses).then_with(|| a.0.cmp(b.0)))
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                self.entries.remove(&victim);
            }
        }
        self.entries.insert(key, CacheEntry { frame, accesses: 1 });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

impl Default for MorphCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(v: f64) -> MorphFrame {
        [("V_AA", v)].into_iter().collect()
    }

    #[test]
    fn test_key_rounds_to_two_decimals() {
        let a = CacheKey::new(&frame(0.501), LodLevel::High);
        let b = CacheKey::new(&frame(0.504), LodLevel::High);
        let c = CacheKey::new(&frame(0.51), LodLevel::High);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, CacheKey::new(&frame(0.501), LodLevel::Low));
    }

    #[test]
    fn test_hit_and_miss_counting() {
        let mut cache = MorphCache::default();
        let key = CacheKey::new(&frame(0.3), LodLevel::High);
        assert!(cache.get(&key).is_none());
        cache.put(key.clone(), frame(0.3));
        assert_eq!(cache.get(&key), Some(frame(0.3)));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hit_rate(), 0.5);
    }

    #[test]
    fn test_evicts_least_accessed() {
        let mut cache = MorphCache::new(2);
        let hot = CacheKey::new(&frame(0.1), LodLevel::High);
        let cold = CacheKey::new(&frame(0.2), LodLevel::High);
        cache.put(hot.clone(), frame(0.1));
        cache.put(cold.clone(), frame(0.2));
        cache.get(&hot);
        cache.get(&hot);

        let new = CacheKey::new(&frame(0.3), LodLevel::High);
        cache.put(new.clone(), frame(0.3));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&cold).is_none());
        assert!(cache.get(&hot).is_some());
        assert!(cache.get(&new).is_some());
    }

    #[test]
    fn test_clear() {
        let mut cache = MorphCache::new(4);
        let key = CacheKey::new(&frame(0.1), LodLevel::High);
        cache.put(key.clone(), frame(0.1));
        cache.get(&key);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.hit_rate(), 0.0);
    }
}
