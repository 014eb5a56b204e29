//! Phoneme tables - ARPAbet phonemes and simple viseme codes to rig visemes
//!
//! Two tables are kept:
//! - a primary table giving one viseme per phoneme (drives the transition
//!   engine's category logic)
//! - a weighted table giving a small co-articulated blend per phoneme

use morphcast_core::MorphFrame;
use serde::{Deserialize, Serialize};

use crate::{PhonemeEvent, WordPosition};

/// Neutral viseme used for silence and unknown phonemes
pub const NEUTRAL_VISEME: &str = "V_None";

/// Influence of the previous phoneme in weighted mapping
pub const CONTEXT_PREV_WEIGHT: f64 = 0.25;

/// Influence of the next phoneme in weighted mapping
pub const CONTEXT_NEXT_WEIGHT: f64 = 0.15;

/// Primary viseme for an ARPAbet phoneme (upper case)
pub fn primary_viseme(phoneme: &str) -> Option<&'static str> {
    let viseme = match phoneme {
        // Vowels
        "AA" | "AE" | "AH" | "AY" => "V_AA",
        "AO" | "AW" | "OW" | "OY" => "V_OH",
        "EH" | "EY" => "V_EH",
        "ER" => "V_ER",
        "IH" => "V_IH",
        "IY" | "Y" => "V_EE",
        "UH" | "UW" | "W" => "V_U",
        // Consonants
        "B" | "M" | "P" => "V_Explosive",
        "CH" | "JH" | "SH" | "ZH" => "V_CH",
        "D" | "T" => "V_DD",
        "DH" | "TH" => "V_TH",
        "F" | "V" => "V_FF",
        "G" | "K" => "V_KK",
        "HH" => "V_H",
        "L" => "V_L",
        "N" | "NG" => "V_NN",
        "R" => "V_RR",
        "S" | "Z" => "V_SS",
        "SIL" => NEUTRAL_VISEME,
        _ => return None,
    };
    Some(viseme)
}

/// Viseme for a single-letter viseme code (A..H, X)
pub fn simple_viseme(code: &str) -> Option<&'static str> {
    let viseme = match code {
        "A" | "D" => "V_AA",
        "B" => "V_Explosive",
        "C" => "V_IH",
        "E" => "V_EH",
        "F" | "G" => "V_FF",
        "H" => "V_L",
        "X" => NEUTRAL_VISEME,
        _ => return None,
    };
    Some(viseme)
}

/// Weighted viseme blend for an ARPAbet phoneme (upper case)
pub fn weighted_visemes(phoneme: &str) -> Option<&'static [(&'static str, f64)]> {
    let blend: &'static [(&'static str, f64)] = match phoneme {
        // Vowels
        "AA" => &[("V_AA", 1.0), ("V_Open", 0.3)],
        "AE" => &[("V_AA", 0.8), ("V_EH", 0.2)],
        "AH" => &[("V_AA", 0.7), ("V_Open", 0.2)],
        "AO" => &[("V_OH", 1.0), ("V_U", 0.1)],
        "AW" => &[("V_OH", 0.8), ("V_U", 0.3)],
        "AY" => &[("V_AA", 0.6), ("V_EE", 0.4)],
        "EH" => &[("V_EH", 1.0)],
        "ER" => &[("V_ER", 1.0), ("V_RR", 0.3)],
        "EY" => &[("V_EH", 0.7), ("V_EE", 0.3)],
        "IH" => &[("V_IH", 1.0), ("V_EE", 0.2)],
        "IY" => &[("V_EE", 1.0), ("V_Wide", 0.3)],
        "OW" => &[("V_OH", 0.9), ("V_U", 0.3)],
        "OY" => &[("V_OH", 0.7), ("V_EE", 0.3)],
        "UH" => &[("V_U", 0.8), ("V_OH", 0.2)],
        "UW" => &[("V_U", 1.0), ("V_Narrow", 0.3)],
        // Consonants
        "B" => &[("V_Explosive", 1.0), ("V_Tight", 0.3)],
        "CH" => &[("V_CH", 1.0), ("V_Dental_Lip", 0.2)],
        "D" => &[("V_DD", 1.0), ("V_Dental_Lip", 0.3)],
        "DH" => &[("V_TH", 1.0), ("V_Dental_Lip", 0.5)],
        "F" => &[("V_FF", 1.0), ("V_Dental_Lip", 0.7)],
        "G" => &[("V_KK", 1.0), ("V_Open", 0.1)],
        "HH" => &[("V_AA", 0.3), ("V_Open", 0.2)],
        "JH" => &[("V_CH", 0.9), ("V_DD", 0.2)],
        "K" => &[("V_KK", 1.0), ("V_Tight", 0.2)],
        "L" => &[("V_L", 1.0), ("V_DD", 0.2)],
        "M" => &[("V_Explosive", 1.0), ("V_Tight", 0.5)],
        "N" => &[("V_NN", 1.0), ("V_DD", 0.2)],
        "NG" => &[("V_NN", 0.8), ("V_KK", 0.3)],
        "P" => &[("V_Explosive", 1.0), ("V_Tight", 0.4)],
        "R" => &[("V_RR", 1.0), ("V_ER", 0.2)],
        "S" => &[("V_SS", 1.0), ("V_Dental_Lip", 0.2)],
        "SH" => &[("V_CH", 0.8), ("V_SS", 0.3)],
        "T" => &[("V_DD", 1.0), ("V_Dental_Lip", 0.4)],
        "TH" => &[("V_TH", 1.0), ("V_Dental_Lip", 0.6)],
        "V" => &[("V_FF", 0.9), ("V_Dental_Lip", 0.6)],
        "W" => &[("V_U", 0.8), ("V_OH", 0.3)],
        "Y" => &[("V_EE", 0.8), ("V_IH", 0.2)],
        "Z" => &[("V_SS", 0.9), ("V_Dental_Lip", 0.2)],
        "ZH" => &[("V_CH", 0.7), ("V_SS", 0.3)],
        "SIL" => &[(NEUTRAL_VISEME, 0.0)],
        _ => return None,
    };
    Some(blend)
}

/// One timed phoneme as produced by a recognizer or TTS engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhonemeTiming {
    pub phoneme: String,
    /// Seconds
    pub duration: f64,
    #[serde(default = "default_intensity")]
    pub intensity: f64,
    #[serde(default)]
    pub word_position: Option<WordPosition>,
}

fn default_intensity() -> f64 {
    1.0
}

impl PhonemeTiming {
    pub fn new(phoneme: impl Into<String>, duration: f64) -> Self {
        Self {
            phoneme: phoneme.into(),
            duration,
            intensity: 1.0,
            word_position: None,
        }
    }
}

/// Phoneme to viseme mapper
#[derive(Debug, Clone, Copy, Default)]
pub struct PhonemeMapper;

impl PhonemeMapper {
    pub fn new() -> Self {
        PhonemeMapper
    }

    /// Viseme name for an ARPAbet phoneme or a simple viseme code
    pub fn viseme_for(&self, phoneme: &str) -> &'static str {
        let upper = phoneme.to_ascii_uppercase();
        primary_viseme(&upper)
            .or_else(|| simple_viseme(&upper))
            .unwrap_or(NEUTRAL_VISEME)
    }

    /// Single-viseme frame at `intensity`; unknown input maps to a zero neutral
    pub fn map_phoneme(&self, phoneme: &str, intensity: f64) -> MorphFrame {
        let upper = phoneme.to_ascii_uppercase();
        let mut frame = MorphFrame::new();
        match primary_viseme(&upper).or_else(|| simple_viseme(&upper)) {
            Some(viseme) => frame.insert(viseme, intensity),
            None => frame.insert(NEUTRAL_VISEME, 0.0),
        };
        frame
    }

    /// Weighted blend at `intensity`, pulled toward the neighbouring
    /// phonemes on the visemes they share.
    pub fn map_weighted(
        &self,
        phoneme: &str,
        intensity: f64,
        prev: Option<&str>,
        next: Option<&str>,
    ) -> MorphFrame {
        let upper = phoneme.to_ascii_uppercase();
        let Some(blend) = weighted_visemes(&upper) else {
            return [(NEUTRAL_VISEME, 0.0)].into_iter().collect();
        };

        let mut values: Vec<(&'static str, f64)> =
            blend.iter().map(|(name, v)| (*name, v * intensity)).collect();

        let mut pull = |neighbour: Option<&str>, weight: f64| {
            let Some(other) = neighbour.and_then(|p| weighted_visemes(&p.to_ascii_uppercase())) else {
                return;
            };
            for (name, value) in values.iter_mut() {
                if let Some((_, v)) = other.iter().find(|(n, _)| n == name) {
                    *value = *value * (1.0 - weight) + v * weight;
                }
            }
        };
        pull(prev, CONTEXT_PREV_WEIGHT);
        pull(next, CONTEXT_NEXT_WEIGHT);

        values.into_iter().collect()
    }

    /// Build transition-engine events from a timed phoneme sequence.
    ///
    /// Timestamps accumulate from `start`; each event carries the weighted
    /// blend (with neighbour context) as its base morphs.
    pub fn events(&self, sequence: &[PhonemeTiming], start: f64) -> Vec<PhonemeEvent> {
        let mut timestamp = start;
        sequence
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let prev = i.checked_sub(1).map(|p| sequence[p].phoneme.as_str());
                let next = sequence.get(i + 1).map(|n| n.phoneme.as_str());
                let event = PhonemeEvent {
                    phoneme: Some(item.phoneme.clone()),
                    viseme: self.viseme_for(&item.phoneme).into(),
                    duration: item.duration,
                    timestamp,
                    word_position: item.word_position,
                    morphs: Some(self.map_weighted(&item.phoneme, item.intensity, prev, next)),
                };
                timestamp += item.duration;
                event
            })
            .collect()
    }
}

/// Merge frames keeping the maximum value per morph
pub fn combine_max<'a>(frames: impl IntoIterator<Item = &'a MorphFrame>) -> MorphFrame {
    let mut combined = MorphFrame::new();
    for frame in frames {
        for (key, value) in frame.iter() {
            let current = combined.get(key).unwrap_or(f64::MIN);
            if value > current {
                combined.insert(key.clone(), value);
            }
        }
    }
    combined
}
