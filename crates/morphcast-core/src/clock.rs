//! Clocks for the animation pipeline
//!
//! Pipeline stages take time as `f64` seconds from a `Clock`, never from the
//! OS directly, so tests can drive time by hand.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Source of monotonic time in seconds
pub trait Clock: Send + Sync {
    /// Current time in seconds
    fn now(&self) -> f64;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

/// Monotonic clock anchored at construction
#[derive(Debug, Clone)]
pub struct SystemClock {
    reference: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            reference: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.reference.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock for tests and simulation
#[derive(Debug, Default)]
pub struct ManualClock {
    value: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        ManualClock {
            value: Mutex::new(start),
        }
    }

    /// Move the clock forward by `dt` seconds
    pub fn advance(&self, dt: f64) -> f64 {
        let mut value = self.value.lock();
        *value += dt.max(0.0);
        *value
    }

    /// Jump to an absolute time; earlier values are ignored
    pub fn set(&self, t: f64) {
        let mut value = self.value.lock();
        if t > *value {
            *value = t;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.value.lock()
    }
}

/// Milliseconds since the Unix epoch (envelope timestamps)
pub fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_monotonic() {
        let clock = ManualClock::new(1.0);
        assert_eq!(clock.advance(0.5), 1.5);
        assert_eq!(clock.advance(-3.0), 1.5);
        clock.set(0.2);
        assert_eq!(clock.now(), 1.5);
        clock.set(4.0);
        assert_eq!(clock.now(), 4.0);
    }

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_shared_clock() {
        let clock = Arc::new(ManualClock::new(0.0));
        let shared: Arc<dyn Clock> = clock.clone();
        clock.advance(2.0);
        assert_eq!(shared.now(), 2.0);
    }
}
