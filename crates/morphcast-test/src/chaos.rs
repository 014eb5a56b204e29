//! Lossy link simulation
//!
//! Drops binary batches independently and in bursts. Control-plane JSON is
//! never dropped.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Link conditions
#[derive(Clone, Debug)]
pub struct LinkConfig {
    /// Independent loss rate (0.0 - 1.0)
    pub loss_rate: f64,
    /// Probability that a loss starts a burst
    pub burst_loss_prob: f64,
    /// Burst length range, in batches
    pub burst_length: (u32, u32),
    pub seed: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            loss_rate: 0.01,
            burst_loss_prob: 0.1,
            burst_length: (2, 5),
            seed: 7,
        }
    }
}

impl LinkConfig {
    /// Lossless
    pub fn perfect() -> Self {
        LinkConfig {
            loss_rate: 0.0,
            burst_loss_prob: 0.0,
            ..Default::default()
        }
    }

    pub fn poor() -> Self {
        LinkConfig {
            loss_rate: 0.05,
            burst_loss_prob: 0.2,
            burst_length: (3, 8),
            ..Default::default()
        }
    }

    pub fn hostile() -> Self {
        LinkConfig {
            loss_rate: 0.15,
            burst_loss_prob: 0.3,
            burst_length: (5, 15),
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Link statistics
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkStats {
    pub sent: u64,
    pub delivered: u64,
    pub lost: u64,
    pub bursts: u64,
}

impl LinkStats {
    pub fn loss_rate(&self) -> f64 {
        if self.sent == 0 {
            0.0
        } else {
            self.lost as f64 / self.sent as f64
        }
    }
}

/// Seeded lossy link
pub struct LossyLink {
    config: LinkConfig,
    rng: StdRng,
    burst_remaining: u32,
    stats: LinkStats,
}

impl LossyLink {
    pub fn new(config: LinkConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        LossyLink {
            config,
            rng,
            burst_remaining: 0,
            stats: LinkStats::default(),
        }
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Decide the fate of one batch; true if it gets through
    pub fn deliver(&mut self) -> bool {
        self.stats.sent += 1;
        if self.burst_remaining > 0 {
            self.burst_remaining -= 1;
            self.stats.lost += 1;
            return false;
        }
        if self.config.loss_rate > 0.0 && self.rng.gen_bool(self.config.loss_rate.min(1.0)) {
            self.stats.lost += 1;
            if self.config.burst_loss_prob > 0.0
                && self.rng.gen_bool(self.config.burst_loss_prob.min(1.0))
            {
                let (min, max) = self.config.burst_length;
                // The loss that started the burst counts as its first batch
                self.burst_remaining = self.rng.gen_range(min..=max.max(min)).saturating_sub(1);
                self.stats.bursts += 1;
            }
            return false;
        }
        self.stats.delivered += 1;
        true
    }
}
