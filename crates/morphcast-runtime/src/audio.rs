//! Audio to phoneme boundary
//!
//! Speech recognition is external. The runtime only needs timed phonemes,
//! so anything that can produce them plugs in through `PhonemeSource`.

use morphcast_viseme::PhonemeTiming;

/// Turns mono PCM into a timed phoneme sequence
pub trait PhonemeSource: Send + Sync {
    fn phonemes(&self, samples: &[f32], sample_rate: u32) -> Vec<PhonemeTiming>;
}

/// Energy and zero-crossing heuristic.
///
/// Quiet windows become `SIL`. Voiced windows pick a vowel or fricative
/// from the zero-crossing rate. Repeats are merged.
#[derive(Debug, Clone)]
pub struct EnergyPhonemeSource {
    /// Analysis window in seconds
    pub window: f64,
    /// RMS below this is silence
    pub silence_rms: f32,
    /// Zero crossings per sample above this read as a fricative
    pub fricative_zcr: f32,
    /// Zero crossings per sample above this read as a front vowel
    pub front_vowel_zcr: f32,
}

impl Default for EnergyPhonemeSource {
    fn default() -> Self {
        EnergyPhonemeSource {
            window: 0.02,
            silence_rms: 0.02,
            fricative_zcr: 0.3,
            front_vowel_zcr: 0.1,
        }
    }
}

impl EnergyPhonemeSource {
    fn classify(&self, window: &[f32]) -> &'static str {
        let energy = window.iter().map(|s| s * s).sum::<f32>() / window.len() as f32;
        if energy.sqrt() < self.silence_rms {
            return "SIL";
        }
        let crossings = window
            .windows(2)
            .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
            .count();
        let zcr = crossings as f32 / window.len() as f32;
        if zcr > self.fricative_zcr {
            "S"
        } else if zcr > self.front_vowel_zcr {
            "EH"
        } else {
            "AA"
        }
    }
}

impl PhonemeSource for EnergyPhonemeSource {
    fn phonemes(&self, samples: &[f32], sample_rate: u32) -> Vec<PhonemeTiming> {
        if samples.is_empty() || sample_rate == 0 {
            return Vec::new();
        }
        let window_len = ((self.window * sample_rate as f64) as usize).max(1);
        let mut out: Vec<PhonemeTiming> = Vec::new();
        for window in samples.chunks(window_len) {
            let phoneme = self.classify(window);
            let duration = window.len() as f64 / sample_rate as f64;
            match out.last_mut() {
                Some(last) if last.phoneme == phoneme => last.duration += duration,
                _ => out.push(PhonemeTiming::new(phoneme, duration)),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, rate: u32, secs: f32, amp: f32) -> Vec<f32> {
        let n = (rate as f32 * secs) as usize;
        (0..n)
            .map(|i| amp * (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_silence() {
        let source = EnergyPhonemeSource::default();
        let out = source.phonemes(&vec![0.0; 4800], 48000);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].phoneme, "SIL");
        assert!((out[0].duration - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_low_tone_is_open_vowel() {
        let source = EnergyPhonemeSource::default();
        let out = source.phonemes(&tone(200.0, 48000, 0.1, 0.5), 48000);
        assert!(out.iter().all(|p| p.phoneme == "AA"));
    }

    #[test]
    fn test_silence_then_speech_merges_runs() {
        let source = EnergyPhonemeSource::default();
        let mut samples = vec![0.0; 960 * 3];
        samples.extend(tone(200.0, 48000, 0.06, 0.5));
        let out = source.phonemes(&samples, 48000);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].phoneme, "SIL");
        assert_eq!(out[1].phoneme, "AA");
    }

    #[test]
    fn test_empty_input() {
        let source = EnergyPhonemeSource::default();
        assert!(source.phonemes(&[], 48000).is_empty());
        assert!(source.phonemes(&[0.5], 0).is_empty());
    }
}
