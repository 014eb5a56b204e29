//! Motion Prediction - velocity/acceleration tracking per morph
//!
//! The encoder observes every morph that goes out in a delta and keeps a
//! first/second difference per morph. Significant motion is attached to the
//! delta as a hint so the client can extrapolate between network updates.

use std::collections::{BTreeMap, HashMap};

use morphcast_core::MorphKey;

use crate::MotionHint;

/// Prediction configuration
#[derive(Debug, Clone)]
pub struct PredictionConfig {
    /// Minimum |velocity| worth sending
    pub velocity_threshold: f64,
    /// Minimum |acceleration| worth sending
    pub acceleration_threshold: f64,
    /// Decimal places kept on the wire
    pub precision: u32,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            velocity_threshold: 0.01,
            acceleration_threshold: 0.02,
            precision: 4,
        }
    }
}

/// Per-morph motion state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionState {
    pub velocity: f64,
    pub acceleration: f64,
}

/// Motion predictor
#[derive(Debug, Default)]
pub struct MotionPredictor {
    config: PredictionConfig,
    states: HashMap<MorphKey, MotionState>,
}

impl MotionPredictor {
    pub fn new(config: PredictionConfig) -> Self {
        Self {
            config,
            states: HashMap::new(),
        }
    }

    /// Record a change of `key` from `old` to `new`
    pub fn observe(&mut self, key: &MorphKey, old: f64, new: f64) -> MotionState {
        let velocity = new - old;
        match self.states.get_mut(key) {
            Some(state) => {
                state.acceleration = velocity - state.velocity;
                state.velocity = velocity;
                *state
            }
            None => {
                let state = MotionState {
                    velocity,
                    acceleration: 0.0,
                };
                self.states.insert(key.clone(), state);
                state
            }
        }
    }

    pub fn state(&self, key: &MorphKey) -> Option<MotionState> {
        self.states.get(key).copied()
    }

    /// Hint for `key` if its motion is significant, rounded for the wire
    pub fn hint(&self, key: &MorphKey) -> Option<MotionHint> {
        let state = self.states.get(key)?;
        let significant = state.velocity.abs() > self.config.velocity_threshold
            || state.acceleration.abs() > self.config.acceleration_threshold;
        if !significant {
            return None;
        }
        Some(MotionHint {
            velocity: round_to(state.velocity, self.config.precision),
            acceleration: round_to(state.acceleration, self.config.precision),
        })
    }

    /// Hints for every significant morph among `keys`
    pub fn hints<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a MorphKey>,
    ) -> BTreeMap<MorphKey, MotionHint> {
        keys.into_iter()
            .filter_map(|k| self.hint(k).map(|h| (k.clone(), h)))
            .collect()
    }

    pub fn tracked(&self) -> usize {
        self.states.len()
    }

    pub fn reset(&mut self) {
        self.states.clear();
    }
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}
