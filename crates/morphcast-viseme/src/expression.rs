//! Expression Layer - emotions, natural blinks and micro-expressions
//!
//! Everything here is driven by an explicit clock value (`now`, seconds) so
//! callers decide the time base and tests stay deterministic.

use std::fmt;
use std::str::FromStr;

use morphcast_core::{MorphFrame, MorphcastError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Emotion preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    #[default]
    Neutral,
    Happy,
    Sad,
    Angry,
    Surprised,
    Fear,
    Disgust,
    Contempt,
}

impl Emotion {
    pub const ALL: [Emotion; 8] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Surprised,
        Emotion::Fear,
        Emotion::Disgust,
        Emotion::Contempt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Surprised => "surprised",
            Emotion::Fear => "fear",
            Emotion::Disgust => "disgust",
            Emotion::Contempt => "contempt",
        }
    }

    /// Morph targets for this emotion at full weight
    pub fn preset(self) -> &'static [(&'static str, f64)] {
        match self {
            Emotion::Neutral => &[],
            Emotion::Happy => &[
                ("Mouth_Smile_L", 0.7),
                ("Mouth_Smile_R", 0.7),
                ("Mouth_Dimple_L", 0.3),
                ("Mouth_Dimple_R", 0.3),
                ("Eye_Squint_L", 0.2),
                ("Eye_Squint_R", 0.2),
                ("Cheek_Squint_L", 0.4),
                ("Cheek_Squint_R", 0.4),
                ("Brow_Raise_L", 0.1),
                ("Brow_Raise_R", 0.1),
            ],
            Emotion::Sad => &[
                ("Mouth_Frown_L", 0.6),
                ("Mouth_Frown_R", 0.6),
                ("Mouth_Press_L", 0.3),
                ("Mouth_Press_R", 0.3),
                ("Brow_Drop_L", 0.4),
                ("Brow_Drop_R", 0.4),
                ("Brow_Raise_Inner", 0.5),
                ("Eye_Look_Down_L", 0.2),
                ("Eye_Look_Down_R", 0.2),
            ],
            Emotion::Angry => &[
                ("Brow_Drop_L", 0.8),
                ("Brow_Drop_R", 0.8),
                ("Eye_Squint_L", 0.4),
                ("Eye_Squint_R", 0.4),
                ("Nose_Sneer_L", 0.3),
                ("Nose_Sneer_R", 0.3),
                ("Mouth_Press_L", 0.4),
                ("Mouth_Press_R", 0.4),
                ("Jaw_Forward", 0.2),
            ],
            Emotion::Surprised => &[
                ("Brow_Raise_L", 0.9),
                ("Brow_Raise_R", 0.9),
                ("Eye_Wide_L", 0.8),
                ("Eye_Wide_R", 0.8),
                ("V_Open", 0.4),
                ("V_OH", 0.3),
            ],
            Emotion::Fear => &[
                ("Brow_Raise_Inner", 0.7),
                ("Brow_Raise_L", 0.4),
                ("Brow_Raise_R", 0.4),
                ("Eye_Wide_L", 0.6),
                ("Eye_Wide_R", 0.6),
                ("Mouth_Stretch_L", 0.5),
                ("Mouth_Stretch_R", 0.5),
                ("V_Open", 0.2),
            ],
            Emotion::Disgust => &[
                ("Nose_Sneer_L", 0.7),
                ("Nose_Sneer_R", 0.7),
                ("Mouth_Upper_Up_L", 0.4),
                ("Mouth_Upper_Up_R", 0.4),
                ("Eye_Squint_L", 0.3),
                ("Eye_Squint_R", 0.3),
                ("Brow_Drop_L", 0.2),
                ("Brow_Drop_R", 0.2),
            ],
            Emotion::Contempt => &[
                ("Mouth_Smile_L", 0.0),
                ("Mouth_Smile_R", 0.5),
                ("Mouth_Press_L", 0.3),
                ("Mouth_Press_R", 0.1),
                ("Eye_Squint_L", 0.1),
                ("Eye_Squint_R", 0.2),
                ("Brow_Raise_L", 0.0),
                ("Brow_Raise_R", 0.2),
            ],
        }
    }
}

impl FromStr for Emotion {
    type Err = MorphcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| MorphcastError::InvalidMessage(format!("unknown emotion: {}", s)))
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Additive emotion overlay: `min(1, current + value * weight * 0.5)`
pub fn apply_emotion(frame: &mut MorphFrame, emotion: Emotion, weight: f64) {
    if weight <= 0.0 {
        return;
    }
    for (name, value) in emotion.preset() {
        let current = frame.value_of(name);
        frame.insert(*name, (current + value * weight * 0.5).min(1.0));
    }
}

/// Blink timing
#[derive(Debug, Clone)]
pub struct BlinkConfig {
    /// Random wait between blinks (seconds)
    pub min_interval: f64,
    pub max_interval: f64,
    /// (time, closure) keypoints, last time is the blink length
    pub pattern: [(f64, f64); 4],
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            min_interval: 2.0,
            max_interval: 6.0,
            pattern: [(0.0, 0.0), (0.05, 0.7), (0.1, 1.0), (0.15, 0.0)],
        }
    }
}

impl BlinkConfig {
    pub fn duration(&self) -> f64 {
        self.pattern[self.pattern.len() - 1].0
    }

    /// Eyelid closure `elapsed` seconds into a blink
    pub fn closure_at(&self, elapsed: f64) -> Option<f64> {
        self.pattern.windows(2).find_map(|w| {
            let ((t1, v1), (t2, v2)) = (w[0], w[1]);
            (t1..=t2)
                .contains(&elapsed)
                .then(|| v1 + (v2 - v1) * (elapsed - t1) / (t2 - t1))
        })
    }
}

/// Natural blink generator
#[derive(Debug, Clone)]
pub struct BlinkGenerator {
    config: BlinkConfig,
    rng: StdRng,
    last_blink: f64,
    next_interval: f64,
}

impl BlinkGenerator {
    pub fn new(now: f64) -> Self {
        Self::with_rng(BlinkConfig::default(), StdRng::from_entropy(), now)
    }

    /// Deterministic generator for replay and tests
    pub fn seeded(seed: u64, now: f64) -> Self {
        Self::with_rng(BlinkConfig::default(), StdRng::seed_from_u64(seed), now)
    }

    pub fn with_rng(config: BlinkConfig, mut rng: StdRng, now: f64) -> Self {
        let next_interval = Self::draw(&config, &mut rng);
        Self {
            config,
            rng,
            last_blink: now,
            next_interval,
        }
    }

    fn draw(config: &BlinkConfig, rng: &mut StdRng) -> f64 {
        if config.max_interval > config.min_interval {
            rng.gen_range(config.min_interval..config.max_interval)
        } else {
            config.min_interval
        }
    }

    /// Seconds until the next blink starts
    pub fn next_interval(&self) -> f64 {
        self.next_interval
    }

    /// Closure value at `now`, if a blink is in progress
    pub fn sample(&mut self, now: f64) -> Option<f64> {
        let since = now - self.last_blink;
        if since <= self.next_interval {
            return None;
        }
        let elapsed = since - self.next_interval;
        if elapsed < self.config.duration() {
            return self.config.closure_at(elapsed);
        }
        self.last_blink = now;
        self.next_interval = Self::draw(&self.config, &mut self.rng);
        None
    }
}

/// Micro-expression kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MicroExpression {
    SubtleSmile,
    EyeFlash,
    LipTighten,
    NoseWrinkle,
}

impl MicroExpression {
    pub fn as_str(self) -> &'static str {
        match self {
            MicroExpression::SubtleSmile => "subtle_smile",
            MicroExpression::EyeFlash => "eye_flash",
            MicroExpression::LipTighten => "lip_tighten",
            MicroExpression::NoseWrinkle => "nose_wrinkle",
        }
    }

    /// Seconds
    pub fn duration(self) -> f64 {
        match self {
            MicroExpression::SubtleSmile => 0.5,
            MicroExpression::EyeFlash => 0.2,
            MicroExpression::LipTighten => 0.3,
            MicroExpression::NoseWrinkle => 0.25,
        }
    }

    pub fn peak(self) -> f64 {
        match self {
            MicroExpression::SubtleSmile => 0.3,
            MicroExpression::EyeFlash => 0.15,
            MicroExpression::LipTighten => 0.2,
            MicroExpression::NoseWrinkle => 0.15,
        }
    }

    pub fn morphs(self) -> &'static [(&'static str, f64)] {
        match self {
            MicroExpression::SubtleSmile => &[
                ("Mouth_Smile_L", 0.2),
                ("Mouth_Smile_R", 0.2),
                ("Eye_Squint_L", 0.1),
                ("Eye_Squint_R", 0.1),
            ],
            MicroExpression::EyeFlash => &[
                ("Eye_Wide_L", 0.3),
                ("Eye_Wide_R", 0.3),
                ("Brow_Raise_L", 0.2),
                ("Brow_Raise_R", 0.2),
            ],
            MicroExpression::LipTighten => &[("Mouth_Press_L", 0.4), ("Mouth_Press_R", 0.4)],
            MicroExpression::NoseWrinkle => &[("Nose_Sneer_L", 0.3), ("Nose_Sneer_R", 0.3)],
        }
    }

    /// Bell-curve intensity at `progress` in [0, 1]
    pub fn envelope(self, progress: f64) -> f64 {
        (-(progress - 0.5).powi(2) / 0.1).exp() * self.peak()
    }
}

/// Emotion, blink and micro-expression state for one avatar
#[derive(Debug, Clone)]
pub struct ExpressionLayer {
    emotion: Emotion,
    intensity: f64,
    blink: BlinkGenerator,
    active: Vec<(MicroExpression, f64)>,
}

impl ExpressionLayer {
    pub fn new(now: f64) -> Self {
        Self::with_blink(BlinkGenerator::new(now))
    }

    pub fn with_blink(blink: BlinkGenerator) -> Self {
        Self {
            emotion: Emotion::Neutral,
            intensity: 0.0,
            blink,
            active: Vec::new(),
        }
    }

    pub fn emotion(&self) -> (Emotion, f64) {
        (self.emotion, self.intensity)
    }

    pub fn set_emotion(&mut self, emotion: Emotion, intensity: f64) {
        self.emotion = emotion;
        self.intensity = intensity.clamp(0.0, 1.0);
    }

    /// Start a micro-expression at `now`
    pub fn trigger(&mut self, kind: MicroExpression, now: f64) {
        self.active.push((kind, now));
    }

    pub fn active_micro_expressions(&self) -> usize {
        self.active.len()
    }

    /// Summed micro-expression contribution at `now`; expired ones are dropped
    pub fn micro_contribution(&mut self, now: f64) -> MorphFrame {
        self.active.retain(|(kind, start)| now - start < kind.duration());

        let mut out = MorphFrame::new();
        for (kind, start) in &self.active {
            let progress = (now - start) / kind.duration();
            let intensity = kind.envelope(progress);
            for (name, value) in kind.morphs() {
                let current = out.value_of(name);
                out.insert(*name, current + value * intensity);
            }
        }
        out
    }

    /// Layer emotion, blink and micro-expressions over `base`
    pub fn apply(&mut self, base: &MorphFrame, now: f64) -> MorphFrame {
        let mut frame = base.clone();
        if self.emotion != Emotion::Neutral {
            apply_emotion(&mut frame, self.emotion, self.intensity);
        }
        if let Some(closure) = self.blink.sample(now) {
            for eye in ["Eye_Blink_L", "Eye_Blink_R"] {
                let current = frame.value_of(eye);
                frame.insert(eye, current.max(closure));
            }
        }
        for (key, value) in self.micro_contribution(now).iter() {
            let current = frame.get(key).unwrap_or(0.0);
            frame.insert(key.clone(), (current + value).min(1.0));
        }
        frame
    }

    /// Idle frame: natural blink and the current emotion only
    pub fn idle_frame(&mut self, now: f64) -> MorphFrame {
        let mut frame = MorphFrame::new();
        if self.emotion != Emotion::Neutral {
            apply_emotion(&mut frame, self.emotion, self.intensity);
        }
        if let Some(closure) = self.blink.sample(now) {
            frame.insert("Eye_Blink_L", closure);
            frame.insert("Eye_Blink_R", closure);
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotion_parse() {
        assert_eq!("Happy".parse::<Emotion>().unwrap(), Emotion::Happy);
        assert!("bored".parse::<Emotion>().is_err());
        assert_eq!(Emotion::Surprised.to_string(), "surprised");
    }

    #[test]
    fn test_apply_emotion_saturates() {
        let mut frame: MorphFrame = [("Mouth_Smile_L", 0.9)].into_iter().collect();
        apply_emotion(&mut frame, Emotion::Happy, 0.6);
        assert_eq!(frame.value_of("Mouth_Smile_L"), 1.0);
        assert!((frame.value_of("Mouth_Dimple_L") - 0.3 * 0.6 * 0.5).abs() < 1e-12);

        let mut untouched = MorphFrame::new();
        apply_emotion(&mut untouched, Emotion::Angry, 0.0);
        assert!(untouched.is_empty());
    }

    #[test]
    fn test_blink_pattern() {
        let config = BlinkConfig::default();
        assert_eq!(config.duration(), 0.15);
        assert_eq!(config.closure_at(0.0), Some(0.0));
        assert!((config.closure_at(0.075).unwrap() - 0.85).abs() < 1e-9);
        assert!((config.closure_at(0.1).unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(config.closure_at(0.2), None);
    }

    #[test]
    fn test_blink_generator_cycle() {
        let mut blink = BlinkGenerator::seeded(42, 0.0);
        let interval = blink.next_interval();
        assert!((2.0..6.0).contains(&interval));

        assert_eq!(blink.sample(interval * 0.5), None);
        let closing = blink.sample(interval + 0.1).unwrap();
        assert!((closing - 1.0).abs() < 1e-6);

        // Past the blink the timer re-arms from now
        assert_eq!(blink.sample(interval + 0.2), None);
        assert!((2.0..6.0).contains(&blink.next_interval()));
        assert_eq!(blink.sample(interval + 0.3), None);
    }

    #[test]
    fn test_micro_expression_envelope() {
        let kind = MicroExpression::SubtleSmile;
        assert!((kind.envelope(0.5) - 0.3).abs() < 1e-12);
        assert!(kind.envelope(0.0) < kind.envelope(0.25));
    }

    #[test]
    fn test_micro_expressions_expire() {
        let mut layer = ExpressionLayer::with_blink(BlinkGenerator::seeded(1, 0.0));
        layer.trigger(MicroExpression::LipTighten, 1.0);
        let mid = layer.micro_contribution(1.15);
        assert!((mid.value_of("Mouth_Press_L") - 0.4 * 0.2).abs() < 1e-12);

        let after = layer.micro_contribution(1.4);
        assert!(after.is_empty());
        assert_eq!(layer.active_micro_expressions(), 0);
    }

    #[test]
    fn test_idle_frame_carries_emotion_only() {
        let mut layer = ExpressionLayer::with_blink(BlinkGenerator::seeded(3, 0.0));
        assert!(layer.idle_frame(0.5).is_empty());

        layer.set_emotion(Emotion::Sad, 1.0);
        layer.trigger(MicroExpression::EyeFlash, 0.5);
        let frame = layer.idle_frame(0.6);
        assert!((frame.value_of("Mouth_Frown_L") - 0.3).abs() < 1e-12);
        assert!(!frame.contains(&"Eye_Wide_L".into()));
    }

    #[test]
    fn test_apply_layers_blink_over_base() {
        let blink = BlinkGenerator::seeded(9, 0.0);
        let start = blink.next_interval();
        let mut layer = ExpressionLayer::with_blink(blink);
        let base: MorphFrame = [("V_AA", 0.5)].into_iter().collect();

        let frame = layer.apply(&base, start + 0.1);
        assert_eq!(frame.value_of("V_AA"), 0.5);
        assert!((frame.value_of("Eye_Blink_L") - 1.0).abs() < 1e-6);
    }
}
