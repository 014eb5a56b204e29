//! Typed message payloads

use std::collections::BTreeMap;

use morphcast_core::{is_valid_morph_name, MorphcastError, QualityLevel};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{decode_base64, WireError, WireResult};

fn default_true() -> bool {
    true
}

/// Incoming animation frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationData {
    /// Morph (or ARKit blendshape) name -> value
    pub blendshapes: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_number: Option<u64>,
    #[serde(default = "default_true")]
    pub delta: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_morphs: Option<Vec<String>>,
}

impl AnimationData {
    pub fn new(blendshapes: BTreeMap<String, f64>) -> Self {
        Self {
            blendshapes,
            frame_number: None,
            delta: true,
            priority_morphs: None,
        }
    }

    /// Names must be usable morph keys and every value must lie in [-1, 1]
    pub fn validate(&self) -> WireResult<()> {
        let names = self.blendshapes.keys().chain(self.priority_morphs.iter().flatten());
        if let Some(bad) = names.into_iter().find(|n| !is_valid_morph_name(n)) {
            return Err(WireError::InvalidName { len: bad.len() });
        }
        for (name, &value) in &self.blendshapes {
            if !(-1.0..=1.0).contains(&value) {
                return Err(WireError::OutOfRange {
                    name: name.clone(),
                    value,
                });
            }
        }
        Ok(())
    }
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_channels() -> u16 {
    1
}

fn default_format() -> String {
    "pcm_f32le".to_string()
}

/// Incoming audio chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioData {
    /// Base64 PCM
    pub chunk: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
    #[serde(default = "default_format")]
    pub format: String,
}

impl AudioData {
    pub fn new(chunk: impl Into<String>) -> Self {
        Self {
            chunk: chunk.into(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            format: default_format(),
        }
    }

    /// Decode the chunk into mono samples in [-1, 1].
    ///
    /// Interleaved channels are averaged. Supports `pcm_f32le` and `pcm_s16le`.
    pub fn decode_samples(&self) -> WireResult<Vec<f32>> {
        let raw = decode_base64(&self.chunk).ok_or(WireError::InvalidBase64)?;
        let samples: Vec<f32> = match self.format.as_str() {
            "pcm_f32le" => raw
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            "pcm_s16le" => raw
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
                .collect(),
            other => return Err(WireError::UnsupportedFormat(other.to_string())),
        };
        let channels = self.channels.max(1) as usize;
        if channels == 1 {
            return Ok(samples);
        }
        Ok(samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect())
    }
}

/// Control actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Start,
    Stop,
    Pause,
    Resume,
    Reset,
    Quality,
    Keyframe,
}

impl ControlAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlAction::Start => "start",
            ControlAction::Stop => "stop",
            ControlAction::Pause => "pause",
            ControlAction::Resume => "resume",
            ControlAction::Reset => "reset",
            ControlAction::Quality => "quality",
            ControlAction::Keyframe => "keyframe",
        }
    }
}

/// Control command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlData {
    pub action: ControlAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

impl ControlData {
    pub fn new(action: ControlAction) -> Self {
        Self {
            action,
            avatar_id: None,
            params: None,
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.as_ref()?.get(key)
    }

    /// The `level` parameter of a `quality` action
    pub fn quality_level(&self) -> Result<QualityLevel, MorphcastError> {
        match self.param("level") {
            Some(Value::String(s)) => s.parse(),
            Some(other) => Err(MorphcastError::InvalidMessage(format!(
                "quality level must be a string, got {}",
                other
            ))),
            None => Err(MorphcastError::InvalidMessage(
                "quality action requires params.level".into(),
            )),
        }
    }
}

/// One viseme cue in a `visemes` reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisemeCue {
    pub viseme: String,
    pub weight: f64,
    /// Milliseconds
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phoneme: Option<String>,
}

fn default_blend_mode() -> String {
    "override".to_string()
}

/// Viseme sequence reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisemeData {
    pub visemes: Vec<VisemeCue>,
    pub duration_ms: u64,
    #[serde(default)]
    pub offset_ms: u64,
    #[serde(default = "default_blend_mode")]
    pub blend_mode: String,
}

impl VisemeData {
    pub fn new(visemes: Vec<VisemeCue>) -> Self {
        let duration_ms = visemes.iter().map(|v| v.duration).sum();
        Self {
            visemes,
            duration_ms,
            offset_ms: 0,
            blend_mode: default_blend_mode(),
        }
    }
}

/// Per-session performance figures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsData {
    pub fps: f64,
    pub latency_ms: f64,
    pub bandwidth_kbps: f64,
    #[serde(default)]
    pub draw_calls: u32,
    #[serde(default)]
    pub triangles: u32,
    pub compression_ratio: f64,
    #[serde(default)]
    pub dropped_frames: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<f64>,
    /// Process-wide sample attached by the metrics broadcaster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<Value>,
}

/// Avatar state update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateData {
    pub avatar_id: String,
    /// connected, active, paused or disconnected
    pub state: String,
    pub quality: QualityLevel,
    pub compression_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsData>,
}

/// Error report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default = "default_true")]
    pub recoverable: bool,
}

impl From<&MorphcastError> for ErrorData {
    fn from(e: &MorphcastError) -> Self {
        let details = match e {
            MorphcastError::CodecStateCorruption { expected, got } => {
                Some(serde_json::json!({ "expected": expected, "got": got }))
            }
            _ => None,
        };
        ErrorData {
            code: e.code().to_string(),
            message: e.to_string(),
            details,
            recoverable: e.is_recoverable(),
        }
    }
}

fn default_status() -> String {
    "ok".to_string()
}

/// Acknowledgment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckData {
    pub ack_id: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl AckData {
    pub fn ok(ack_id: impl Into<String>) -> Self {
        Self {
            ack_id: ack_id.into(),
            status: default_status(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode_base64;
    use serde_json::json;

    #[test]
    fn test_animation_defaults_and_range() {
        let data: AnimationData =
            serde_json::from_value(json!({ "blendshapes": { "jawOpen": 0.5 } })).unwrap();
        assert!(data.delta);
        assert!(data.validate().is_ok());

        let bad = AnimationData::new([("jawOpen".to_string(), 1.5)].into_iter().collect());
        assert_eq!(
            bad.validate(),
            Err(WireError::OutOfRange {
                name: "jawOpen".into(),
                value: 1.5
            })
        );
        let negative = AnimationData::new([("browDownLeft".to_string(), -1.0)].into_iter().collect());
        assert!(negative.validate().is_ok());
    }

    #[test]
    fn test_animation_rejects_unusable_names() {
        let long = "x".repeat(70_000);
        let data = AnimationData::new([(long, 0.5)].into_iter().collect());
        assert_eq!(data.validate(), Err(WireError::InvalidName { len: 70_000 }));
        let err: MorphcastError = data.validate().unwrap_err().into();
        assert_eq!(err.code(), "INVALID_MESSAGE");

        let empty = AnimationData::new([(String::new(), 0.5)].into_iter().collect());
        assert!(empty.validate().is_err());

        let mut priority = AnimationData::new([("jawOpen".to_string(), 0.5)].into_iter().collect());
        priority.priority_morphs = Some(vec!["bad\u{0}name".to_string()]);
        assert_eq!(priority.validate(), Err(WireError::InvalidName { len: 8 }));
    }

    #[test]
    fn test_audio_defaults() {
        let data: AudioData = serde_json::from_value(json!({ "chunk": "" })).unwrap();
        assert_eq!(data.sample_rate, 48000);
        assert_eq!(data.channels, 1);
        assert_eq!(data.format, "pcm_f32le");
    }

    #[test]
    fn test_audio_decode_f32_and_s16() {
        let pcm: Vec<u8> = [0.5f32, -0.25].iter().flat_map(|s| s.to_le_bytes()).collect();
        let data = AudioData::new(encode_base64(&pcm));
        assert_eq!(data.decode_samples().unwrap(), vec![0.5, -0.25]);

        let pcm: Vec<u8> = [16384i16, -16384].iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut data = AudioData::new(encode_base64(&pcm));
        data.format = "pcm_s16le".into();
        assert_eq!(data.decode_samples().unwrap(), vec![0.5, -0.5]);

        data.channels = 2;
        assert_eq!(data.decode_samples().unwrap(), vec![0.0]);

        data.format = "opus".into();
        assert!(matches!(data.decode_samples(), Err(WireError::UnsupportedFormat(_))));
        assert_eq!(
            AudioData::new("!!").decode_samples(),
            Err(WireError::InvalidBase64)
        );
    }

    #[test]
    fn test_control_quality_param() {
        let control = ControlData::new(ControlAction::Quality).with_param("level", "low");
        assert_eq!(control.quality_level().unwrap(), QualityLevel::Low);

        let missing = ControlData::new(ControlAction::Quality);
        assert!(missing.quality_level().is_err());
        let numeric = ControlData::new(ControlAction::Quality).with_param("level", 3);
        assert!(numeric.quality_level().is_err());

        let parsed: Result<ControlData, _> = serde_json::from_value(json!({ "action": "explode" }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_viseme_defaults() {
        let data = VisemeData::new(vec![
            VisemeCue {
                viseme: "AA".into(),
                weight: 0.8,
                duration: 100,
                phoneme: None,
            },
            VisemeCue {
                viseme: "EE".into(),
                weight: 0.5,
                duration: 150,
                phoneme: None,
            },
        ]);
        assert_eq!(data.duration_ms, 250);
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["offset_ms"], 0);
        assert_eq!(value["blend_mode"], "override");
    }

    #[test]
    fn test_error_from_core() {
        let err = MorphcastError::CodecStateCorruption { expected: 4, got: 7 };
        let data = ErrorData::from(&err);
        assert_eq!(data.code, "RESYNC_REQUIRED");
        assert!(data.recoverable);
        assert_eq!(data.details.unwrap()["got"], 7);

        let fatal = ErrorData::from(&MorphcastError::CapacityExceeded(10));
        assert!(!fatal.recoverable);
    }

    #[test]
    fn test_ack_default_status() {
        let ack: AckData = serde_json::from_value(json!({ "ack_id": "c1" })).unwrap();
        assert_eq!(ack, AckData::ok("c1"));
    }
}
