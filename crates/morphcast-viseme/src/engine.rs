//! Viseme Transition Engine - phoneme events to continuous morph frames
//!
//! Pipeline, per sequence:
//!
//! 1. one `VisemeFrame` per event (base `{viseme: 1.0}` or supplied morphs)
//! 2. stress scaling
//! 3. co-articulation against the neighbours' stressed morphs
//! 4. additive secondary shapes
//! 5. word-position emphasis
//! 6. curve-shaped interpolation between consecutive frames
//! 7. cleanup (drop tiny values, clamp)
//!
//! Stages 1-6 work on unclamped values; clamping happens once at the end.

use std::collections::BTreeMap;

use morphcast_core::{MorphFrame, MorphKey};
use serde::{Deserialize, Serialize};

use crate::{resample, transition_curve, PhonemeMapper, PhonemeTiming};

type Morphs = BTreeMap<MorphKey, f64>;

/// Stress level of a phoneme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressLevel {
    PrimaryStress,
    SecondaryStress,
    Unstressed,
    Reduced,
}

impl StressLevel {
    pub fn multiplier(self) -> f64 {
        match self {
            StressLevel::PrimaryStress => 1.2,
            StressLevel::SecondaryStress => 1.1,
            StressLevel::Unstressed => 0.85,
            StressLevel::Reduced => 0.6,
        }
    }
}

/// Position of a phoneme inside its word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordPosition {
    Start,
    Middle,
    End,
}

/// Input event for the transition engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhonemeEvent {
    #[serde(default)]
    pub phoneme: Option<String>,
    /// Target viseme morph name
    pub viseme: MorphKey,
    /// Seconds
    pub duration: f64,
    /// Seconds from sequence start
    pub timestamp: f64,
    #[serde(default)]
    pub word_position: Option<WordPosition>,
    /// Explicit base morphs (weighted phoneme mapping); `{viseme: 1.0}` if absent
    #[serde(default)]
    pub morphs: Option<MorphFrame>,
}

impl PhonemeEvent {
    pub fn new(viseme: &str, duration: f64, timestamp: f64) -> Self {
        Self {
            phoneme: None,
            viseme: MorphKey::new(viseme),
            duration,
            timestamp,
            word_position: None,
            morphs: None,
        }
    }

    pub fn with_phoneme(mut self, phoneme: &str) -> Self {
        self.phoneme = Some(phoneme.to_string());
        self
    }

    pub fn at(mut self, position: WordPosition) -> Self {
        self.word_position = Some(position);
        self
    }
}

/// One keyed viseme shape inside a sequence
#[derive(Debug, Clone, PartialEq)]
pub struct VisemeFrame {
    pub viseme: MorphKey,
    pub morphs: BTreeMap<MorphKey, f64>,
    pub duration: f64,
    pub timestamp: f64,
    pub phoneme: Option<String>,
    pub word_position: Option<WordPosition>,
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Output frame rate
    pub target_fps: f64,
    /// Influence of the previous viseme
    pub carryover_weight: f64,
    /// Influence of the next viseme
    pub anticipatory_weight: f64,
    /// Output values below this are dropped
    pub cleanup_floor: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            carryover_weight: 0.35,
            anticipatory_weight: 0.25,
            cleanup_floor: 0.01,
        }
    }
}

impl EngineConfig {
    /// Same weights, different output rate
    pub fn with_fps(target_fps: f64) -> Self {
        Self {
            target_fps,
            ..Default::default()
        }
    }
}

/// Additive secondary shapes per viseme
fn secondary_shapes(viseme: &str) -> &'static [(&'static str, f64)] {
    match viseme {
        "V_Explosive" => &[("Cheek_Puff", 0.15), ("Mouth_Press_L", 0.1), ("Mouth_Press_R", 0.1)],
        "V_FF" => &[("Mouth_Lower_Down_L", 0.2), ("Mouth_Lower_Down_R", 0.2)],
        "V_EE" => &[("Mouth_Stretch_L", 0.3), ("Mouth_Stretch_R", 0.3), ("V_Wide", 0.2)],
        "V_U" => &[("Mouth_Pucker_L", 0.2), ("Mouth_Pucker_R", 0.2), ("V_Narrow", 0.3)],
        "V_OH" => &[("Jaw_Forward", 0.1), ("V_Round", 0.2)],
        _ => &[],
    }
}

/// Viseme transition engine
#[derive(Debug, Clone, Default)]
pub struct VisemeTransitionEngine {
    config: EngineConfig,
}

impl VisemeTransitionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Full pipeline: events (and optional per-event stress) to output frames
    pub fn process_phoneme_sequence(
        &self,
        events: &[PhonemeEvent],
        stress: Option<&[StressLevel]>,
    ) -> Vec<MorphFrame> {
        let mut frames: Vec<VisemeFrame> = events
            .iter()
            .enumerate()
            .map(|(i, event)| {
                let mut frame = Self::base_frame(event);
                if let Some(level) = stress.and_then(|s| s.get(i)) {
                    let m = level.multiplier();
                    frame.morphs.values_mut().for_each(|v| *v *= m);
                }
                frame
            })
            .collect();

        let stressed: Vec<Morphs> = frames.iter().map(|f| f.morphs.clone()).collect();
        for (i, frame) in frames.iter_mut().enumerate() {
            let prev = i.checked_sub(1).and_then(|p| stressed.get(p));
            let next = stressed.get(i + 1);
            let mut morphs = self.coarticulate(prev, &stressed[i], next);
            Self::add_secondary_shapes(frame.viseme.as_str(), &mut morphs);
            if let Some(position) = frame.word_position {
                Self::apply_word_position(position, &mut morphs);
            }
            frame.morphs = morphs;
        }

        self.interpolate_frames(&frames)
            .into_iter()
            .map(|morphs| self.cleanup(morphs))
            .collect()
    }

    fn base_frame(event: &PhonemeEvent) -> VisemeFrame {
        let morphs = match &event.morphs {
            Some(explicit) => explicit.iter().map(|(k, v)| (k.clone(), v)).collect(),
            None => BTreeMap::from([(event.viseme.clone(), 1.0)]),
        };
        VisemeFrame {
            viseme: event.viseme.clone(),
            morphs,
            duration: event.duration,
            timestamp: event.timestamp,
            phoneme: event.phoneme.clone(),
            word_position: event.word_position,
        }
    }

    /// Blend `current` toward its neighbours.
    ///
    /// Shared keys blend linearly; keys only a neighbour has are added at a
    /// fraction of the neighbour weight (half for carryover, 0.3 for
    /// anticipation).
    pub fn coarticulate(&self, prev: Option<&Morphs>, current: &Morphs, next: Option<&Morphs>) -> Morphs {
        let mut result = current.clone();
        let passes = [
            (prev, self.config.carryover_weight, 0.5),
            (next, self.config.anticipatory_weight, 0.3),
        ];
        for (neighbour, weight, absent_scale) in passes {
            let Some(neighbour) = neighbour else { continue };
            for (key, &value) in neighbour {
                result
                    .entry(key.clone())
                    .and_modify(|v| *v = *v * (1.0 - weight) + value * weight)
                    .or_insert(value * weight * absent_scale);
            }
        }
        result
    }

    fn add_secondary_shapes(viseme: &str, morphs: &mut Morphs) {
        for (name, value) in secondary_shapes(viseme) {
            *morphs.entry(MorphKey::new(name)).or_insert(0.0) += value;
        }
    }

    fn apply_word_position(position: WordPosition, morphs: &mut Morphs) {
        match position {
            WordPosition::Start => morphs.values_mut().for_each(|v| *v *= 1.15),
            WordPosition::Middle => {}
            WordPosition::End => {
                morphs.values_mut().for_each(|v| *v *= 0.9);
                *morphs.entry(MorphKey::new("V_None")).or_insert(0.0) += 0.1;
            }
        }
    }

    /// Curve-shaped interpolation between consecutive frames, final frame
    /// appended unchanged.
    pub fn interpolate_frames(&self, frames: &[VisemeFrame]) -> Vec<Morphs> {
        let Some(last) = frames.last() else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for pair in frames.windows(2) {
            let (current, next) = (&pair[0], &pair[1]);
            let duration = next.timestamp - current.timestamp;
            let steps = ((duration * self.config.target_fps).floor().max(1.0)) as usize;

            let curve = transition_curve(current.viseme.as_str(), next.viseme.as_str(), duration);
            let curve = resample(&curve, steps);

            for t in curve.into_iter().take(steps) {
                let mut morphs = Morphs::new();
                for key in current.morphs.keys().chain(next.morphs.keys()) {
                    if morphs.contains_key(key) {
                        continue;
                    }
                    let from = current.morphs.get(key).copied().unwrap_or(0.0);
                    let to = next.morphs.get(key).copied().unwrap_or(0.0);
                    morphs.insert(key.clone(), from + (to - from) * t);
                }
                out.push(morphs);
            }
        }
        out.push(last.morphs.clone());
        out
    }

    fn cleanup(&self, morphs: Morphs) -> MorphFrame {
        morphs
            .into_iter()
            .filter(|(_, v)| *v >= self.config.cleanup_floor)
            .collect()
    }

    /// Map a timed phoneme sequence and run it through the pipeline
    pub fn process_phonemes(
        &self,
        mapper: &PhonemeMapper,
        sequence: &[PhonemeTiming],
        stress: Option<&[StressLevel]>,
    ) -> Vec<MorphFrame> {
        let events = mapper.events(sequence, 0.0);
        self.process_phoneme_sequence(&events, stress)
    }

    /// "Hello World" with natural timing and stress
    pub fn test_sequence(&self) -> Vec<MorphFrame> {
        use StressLevel::*;
        use WordPosition::*;

        let events = [
            PhonemeEvent::new("V_H", 0.08, 0.0).with_phoneme("HH").at(Start),
            PhonemeEvent::new("V_EH", 0.12, 0.08).with_phoneme("EH").at(Middle),
            PhonemeEvent::new("V_L", 0.10, 0.20).with_phoneme("L").at(Middle),
            PhonemeEvent::new("V_OH", 0.15, 0.30).with_phoneme("OW").at(End),
            PhonemeEvent::new("V_None", 0.20, 0.45).with_phoneme("SIL"),
            PhonemeEvent::new("V_U", 0.08, 0.65).with_phoneme("W").at(Start),
            PhonemeEvent::new("V_ER", 0.12, 0.73).with_phoneme("ER").at(Middle),
            PhonemeEvent::new("V_L", 0.08, 0.85).with_phoneme("L").at(Middle),
            PhonemeEvent::new("V_DD", 0.10, 0.93).with_phoneme("D").at(End),
        ];
        let stress = [
            PrimaryStress,
            Unstressed,
            Unstressed,
            Unstressed,
            Unstressed,
            PrimaryStress,
            PrimaryStress,
            Unstressed,
            Unstressed,
        ];
        self.process_phoneme_sequence(&events, Some(&stress))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dominant(frame: &MorphFrame) -> &str {
        frame.dominant().map(|(k, _)| k.as_str()).unwrap_or("")
    }

    fn morphs(pairs: &[(&str, f64)]) -> Morphs {
        pairs.iter().map(|(k, v)| (MorphKey::new(k), *v)).collect()
    }

    #[test]
    fn test_hh_to_eh_dominant_morphs() {
        let engine = VisemeTransitionEngine::default();
        let mapper = PhonemeMapper::new();
        let events = [
            PhonemeEvent::new(mapper.viseme_for("HH"), 0.08, 0.0).with_phoneme("HH"),
            PhonemeEvent::new(mapper.viseme_for("EH"), 0.12, 0.08).with_phoneme("EH"),
        ];
        let frames = engine.process_phoneme_sequence(&events, None);

        // floor(0.08 * 60) = 4 interpolated frames plus the final one
        assert_eq!(frames.len(), 5);
        assert_eq!(dominant(&frames[0]), "V_H");
        assert_eq!(dominant(frames.last().unwrap()), "V_EH");
    }

    #[test]
    fn test_stress_scales_base_morphs() {
        let engine = VisemeTransitionEngine::default();
        let events = [PhonemeEvent::new("V_AA", 0.1, 0.0)];
        let reduced = engine.process_phoneme_sequence(&events, Some(&[StressLevel::Reduced]));
        assert_eq!(reduced.len(), 1);
        assert!((reduced[0].value_of("V_AA") - 0.6).abs() < 1e-12);

        // Over-stressed values clamp on output
        let primary = engine.process_phoneme_sequence(&events, Some(&[StressLevel::PrimaryStress]));
        assert_eq!(primary[0].value_of("V_AA"), 1.0);
    }

    #[test]
    fn test_coarticulation_weights() {
        let engine = VisemeTransitionEngine::default();
        let prev = morphs(&[("V_AA", 1.0)]);
        let current = morphs(&[("V_EH", 1.0), ("V_AA", 0.2)]);
        let next = morphs(&[("V_U", 1.0)]);

        let out = engine.coarticulate(Some(&prev), &current, Some(&next));
        assert!((out[&MorphKey::new("V_AA")] - (0.2 * 0.65 + 0.35)).abs() < 1e-12);
        assert_eq!(out[&MorphKey::new("V_EH")], 1.0);
        assert!((out[&MorphKey::new("V_U")] - 0.25 * 0.3).abs() < 1e-12);

        let carry_only = engine.coarticulate(Some(&next), &current, None);
        assert!((carry_only[&MorphKey::new("V_U")] - 0.35 * 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_coarticulation_uses_unmodified_neighbours() {
        // Three identical frames: the middle one must see the stressed value
        // of its neighbours, not values already blended in this pass.
        let engine = VisemeTransitionEngine::default();
        let events = [
            PhonemeEvent::new("V_AA", 0.0, 0.0),
            PhonemeEvent::new("V_EE", 0.0, 0.0),
            PhonemeEvent::new("V_AA", 0.0, 0.0),
        ];
        let frames = engine.process_phoneme_sequence(&events, None);
        let last = frames.last().unwrap();
        // The stressed V_EE frame carries no V_AA, so the final V_AA is untouched
        assert_eq!(last.value_of("V_AA"), 1.0);
        assert!((last.value_of("V_EE") - 0.175).abs() < 1e-12);
    }

    #[test]
    fn test_secondary_shapes_and_word_end() {
        let engine = VisemeTransitionEngine::default();
        let events = [PhonemeEvent::new("V_OH", 0.1, 0.0).at(WordPosition::End)];
        let frames = engine.process_phoneme_sequence(&events, None);
        let frame = &frames[0];
        assert!((frame.value_of("V_OH") - 0.9).abs() < 1e-12);
        assert!((frame.value_of("V_Round") - 0.18).abs() < 1e-12);
        assert!((frame.value_of("Jaw_Forward") - 0.09).abs() < 1e-12);
        assert!((frame.value_of("V_None") - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_word_start_emphasis() {
        let engine = VisemeTransitionEngine::default();
        let events = [PhonemeEvent::new("V_L", 0.1, 0.0).at(WordPosition::Start)];
        let frame = &engine.process_phoneme_sequence(&events, Some(&[StressLevel::Unstressed]))[0];
        assert!((frame.value_of("V_L") - 0.85 * 1.15).abs() < 1e-12);
    }

    #[test]
    fn test_step_count_follows_timestamps() {
        let engine = VisemeTransitionEngine::new(EngineConfig::with_fps(30.0));
        let events = [
            PhonemeEvent::new("V_AA", 0.2, 0.0),
            PhonemeEvent::new("V_None", 0.2, 0.2),
            PhonemeEvent::new("V_AA", 0.2, 0.2),
        ];
        let frames = engine.process_phoneme_sequence(&events, None);
        // floor(0.2 * 30) = 6, then a zero-length gap still yields one step
        assert_eq!(frames.len(), 6 + 1 + 1);
    }

    #[test]
    fn test_explicit_morphs_replace_base() {
        let engine = VisemeTransitionEngine::default();
        let mut event = PhonemeEvent::new("V_AA", 0.1, 0.0);
        event.morphs = Some([("V_AA", 0.5), ("V_Open", 0.2)].into_iter().collect());
        let frame = &engine.process_phoneme_sequence(&[event], None)[0];
        assert_eq!(frame.value_of("V_AA"), 0.5);
        assert_eq!(frame.value_of("V_Open"), 0.2);
    }

    #[test]
    fn test_hello_world_sequence() {
        let engine = VisemeTransitionEngine::default();
        let frames = engine.test_sequence();
        assert!(frames.len() > 50);
        assert!(frames.iter().all(|f| f.iter().all(|(_, v)| (0.01..=1.0).contains(&v))));
    }

    #[test]
    fn test_process_phonemes_uses_weighted_blend() {
        let engine = VisemeTransitionEngine::default();
        let sequence = [PhonemeTiming::new("AA", 0.1), PhonemeTiming::new("M", 0.1)];
        let frames = engine.process_phonemes(&PhonemeMapper::new(), &sequence, None);
        assert_eq!(dominant(&frames[0]), "V_AA");
        assert!(frames[0].value_of("V_Open") > 0.0);
        assert_eq!(dominant(frames.last().unwrap()), "V_Explosive");
    }

    #[test]
    fn test_empty_sequence() {
        let engine = VisemeTransitionEngine::default();
        assert!(engine.process_phoneme_sequence(&[], None).is_empty());
    }

    #[test]
    fn test_event_json() {
        let json = r#"{"phoneme":"HH","viseme":"V_H","duration":0.08,"timestamp":0.0,"word_position":"start"}"#;
        let event: PhonemeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.word_position, Some(WordPosition::Start));
        assert!(event.morphs.is_none());
    }

    proptest! {
        #[test]
        fn prop_output_is_clean(
            visemes in proptest::collection::vec(
                prop::sample::select(vec!["V_AA", "V_EE", "V_M", "V_None", "V_U", "V_TH", "V_KK"]),
                1..8,
            ),
            gap in 0.02f64..0.2,
        ) {
            let engine = VisemeTransitionEngine::default();
            let events: Vec<PhonemeEvent> = visemes
                .iter()
                .enumerate()
                .map(|(i, v)| PhonemeEvent::new(v, gap, i as f64 * gap))
                .collect();
            let frames = engine.process_phoneme_sequence(&events, None);
            prop_assert!(!frames.is_empty());
            for frame in &frames {
                for (_, v) in frame.iter() {
                    prop_assert!((0.01..=1.0).contains(&v));
                }
            }
        }
    }
}
