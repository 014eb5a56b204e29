//! Frame-rate gating against a target update interval

/// Skip when processing runs this many frame intervals behind
pub const DEFAULT_SKIP_THRESHOLD: f64 = 1.5;

/// Frame-rate controller
#[derive(Debug, Clone)]
pub struct FrameRateController {
    target_fps: f64,
    target_frame_time: f64,
    last_frame_time: Option<f64>,
    skip_threshold: f64,
    frame_skipping: bool,
}

impl FrameRateController {
    pub fn new(target_fps: f64) -> Self {
        let target_fps = if target_fps > 0.0 { target_fps } else { 60.0 };
        Self {
            target_fps,
            target_frame_time: 1.0 / target_fps,
            last_frame_time: None,
            skip_threshold: DEFAULT_SKIP_THRESHOLD,
            frame_skipping: true,
        }
    }

    pub fn target_fps(&self) -> f64 {
        self.target_fps
    }

    pub fn target_frame_time(&self) -> f64 {
        self.target_frame_time
    }

    pub fn set_frame_skipping(&mut self, enabled: bool) {
        self.frame_skipping = enabled;
    }

    pub fn frame_skipping(&self) -> bool {
        self.frame_skipping
    }

    /// Should a frame arriving at `now` be processed?
    ///
    /// Returns the decision and the time since the last accepted frame. The
    /// first frame is always accepted. With frame skipping disabled every
    /// frame is accepted, but only on-schedule frames move the reference time.
    pub fn should_update(&mut self, now: f64) -> (bool, f64) {
        let Some(last) = self.last_frame_time else {
            self.last_frame_time = Some(now);
            return (true, self.target_frame_time);
        };
        let elapsed = now - last;
        if elapsed >= self.target_frame_time {
            self.last_frame_time = Some(now);
            return (true, elapsed);
        }
        (!self.frame_skipping, elapsed)
    }

    /// Processing took long enough that the next frame should be dropped
    pub fn should_skip_frame(&self, processing_time: f64) -> bool {
        processing_time > self.target_frame_time * self.skip_threshold
    }

    /// Forget the reference time (after a pause)
    pub fn reset(&mut self) {
        self.last_frame_time = None;
    }
}

impl Default for FrameRateController {
    fn default() -> Self {
        Self::new(60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gates_to_target_interval() {
        let mut rate = FrameRateController::new(30.0);
        assert!(rate.should_update(0.0).0);
        // 100 fps input: only every fourth frame is on schedule
        let accepted = (1..=12)
            .filter(|i| rate.should_update(*i as f64 * 0.01).0)
            .count();
        assert_eq!(accepted, 3);
    }

    #[test]
    fn test_reports_elapsed() {
        let mut rate = FrameRateController::new(10.0);
        rate.should_update(1.0);
        let (ok, elapsed) = rate.should_update(1.05);
        assert!(!ok);
        assert!((elapsed - 0.05).abs() < 1e-12);
        let (ok, elapsed) = rate.should_update(1.2);
        assert!(ok);
        assert!((elapsed - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_skipping_disabled_accepts_all() {
        let mut rate = FrameRateController::new(10.0);
        rate.set_frame_skipping(false);
        rate.should_update(0.0);
        assert!(rate.should_update(0.01).0);
        // Reference time did not move, so the next on-schedule check uses 0.0
        let (_, elapsed) = rate.should_update(0.1);
        assert!((elapsed - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_should_skip_frame() {
        let rate = FrameRateController::new(60.0);
        assert!(!rate.should_skip_frame(0.02));
        assert!(rate.should_skip_frame(0.03));
    }

    #[test]
    fn test_reset_accepts_next_frame() {
        let mut rate = FrameRateController::new(1.0);
        rate.should_update(0.0);
        assert!(!rate.should_update(0.5).0);
        rate.reset();
        assert!(rate.should_update(0.6).0);
    }
}
