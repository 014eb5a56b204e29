//! Message envelope and the JSON codec

use std::fmt;

use morphcast_core::{unix_millis, MorphcastError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    AckData, AnimationData, AudioData, ControlData, ErrorData, MetricsData, StateData, VisemeData,
    WireError, WireResult,
};

/// Envelope `type` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Animation,
    Audio,
    Control,
    Visemes,
    State,
    Error,
    Ack,
    Metrics,
    Ping,
    Pong,
}

impl MessageType {
    pub const ALL: [MessageType; 10] = [
        MessageType::Animation,
        MessageType::Audio,
        MessageType::Control,
        MessageType::Visemes,
        MessageType::State,
        MessageType::Error,
        MessageType::Ack,
        MessageType::Metrics,
        MessageType::Ping,
        MessageType::Pong,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Animation => "animation",
            MessageType::Audio => "audio",
            MessageType::Control => "control",
            MessageType::Visemes => "visemes",
            MessageType::State => "state",
            MessageType::Error => "error",
            MessageType::Ack => "ack",
            MessageType::Metrics => "metrics",
            MessageType::Ping => "ping",
            MessageType::Pong => "pong",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed message body
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Animation(AnimationData),
    Audio(AudioData),
    Control(ControlData),
    Visemes(VisemeData),
    State(StateData),
    Error(ErrorData),
    Ack(AckData),
    Metrics(MetricsData),
    Ping,
    Pong,
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Animation(_) => MessageType::Animation,
            Message::Audio(_) => MessageType::Audio,
            Message::Control(_) => MessageType::Control,
            Message::Visemes(_) => MessageType::Visemes,
            Message::State(_) => MessageType::State,
            Message::Error(_) => MessageType::Error,
            Message::Ack(_) => MessageType::Ack,
            Message::Metrics(_) => MessageType::Metrics,
            Message::Ping => MessageType::Ping,
            Message::Pong => MessageType::Pong,
        }
    }

    fn data(&self) -> WireResult<Value> {
        let value = match self {
            Message::Animation(d) => serde_json::to_value(d)?,
            Message::Audio(d) => serde_json::to_value(d)?,
            Message::Control(d) => serde_json::to_value(d)?,
            Message::Visemes(d) => serde_json::to_value(d)?,
            Message::State(d) => serde_json::to_value(d)?,
            Message::Error(d) => serde_json::to_value(d)?,
            Message::Ack(d) => serde_json::to_value(d)?,
            Message::Metrics(d) => serde_json::to_value(d)?,
            Message::Ping | Message::Pong => Value::Object(Default::default()),
        };
        Ok(value)
    }

    fn from_data(kind: MessageType, data: Value) -> WireResult<Self> {
        fn typed<T: for<'de> Deserialize<'de>>(kind: MessageType, data: Value) -> WireResult<T> {
            serde_json::from_value(data).map_err(|e| WireError::InvalidPayload {
                kind: kind.as_str(),
                reason: e.to_string(),
            })
        }

        let message = match kind {
            MessageType::Animation => {
                let data: AnimationData = typed(kind, data)?;
                data.validate()?;
                Message::Animation(data)
            }
            MessageType::Audio => Message::Audio(typed(kind, data)?),
            MessageType::Control => Message::Control(typed(kind, data)?),
            MessageType::Visemes => Message::Visemes(typed(kind, data)?),
            MessageType::State => Message::State(typed(kind, data)?),
            MessageType::Error => Message::Error(typed(kind, data)?),
            MessageType::Ack => Message::Ack(typed(kind, data)?),
            MessageType::Metrics => Message::Metrics(typed(kind, data)?),
            MessageType::Ping => Message::Ping,
            MessageType::Pong => Message::Pong,
        };
        Ok(message)
    }
}

#[derive(Serialize, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default)]
    data: Value,
}

/// A complete control-plane message
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub id: Option<String>,
    pub message: Message,
}

impl Envelope {
    /// Wrap a message, stamped with the current time
    pub fn new(message: Message) -> Self {
        Self {
            timestamp: unix_millis(),
            id: None,
            message,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn message_type(&self) -> MessageType {
        self.message.message_type()
    }

    /// Error envelope for a pipeline error
    pub fn error(err: &MorphcastError) -> Self {
        Self::new(Message::Error(ErrorData::from(err)))
    }

    /// Parse a JSON text message. A missing timestamp is filled with now.
    pub fn parse(text: &str) -> WireResult<Self> {
        let raw: RawEnvelope = serde_json::from_str(text)?;
        Self::from_raw(raw)
    }

    /// Parse an already-decoded JSON value
    pub fn from_value(value: Value) -> WireResult<Self> {
        let raw: RawEnvelope = serde_json::from_value(value)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawEnvelope) -> WireResult<Self> {
        let kind = raw.kind.ok_or(WireError::MissingType)?;
        let kind = MessageType::parse(&kind).ok_or(WireError::UnknownType(kind))?;
        Ok(Self {
            timestamp: raw.timestamp.unwrap_or_else(unix_millis),
            id: raw.id,
            message: Message::from_data(kind, raw.data)?,
        })
    }

    pub fn to_value(&self) -> WireResult<Value> {
        let raw = RawEnvelope {
            kind: Some(self.message_type().as_str().to_string()),
            timestamp: Some(self.timestamp),
            id: self.id.clone(),
            data: self.message.data()?,
        };
        Ok(serde_json::to_value(raw)?)
    }

    /// Serialize to JSON text
    pub fn to_json(&self) -> WireResult<String> {
        Ok(serde_json::to_string(&self.to_value()?)?)
    }
}

impl From<Message> for Envelope {
    fn from(message: Message) -> Self {
        Envelope::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ControlAction, VisemeCue};
    use morphcast_core::QualityLevel;
    use serde_json::json;

    #[test]
    fn test_parse_animation() {
        let text = r#"{"type":"animation","timestamp":1700000000000,"id":"f1",
            "data":{"blendshapes":{"jawOpen":0.4,"eyeBlinkLeft":1.0},"frame_number":12}}"#;
        let envelope = Envelope::parse(text).unwrap();
        assert_eq!(envelope.timestamp, 1_700_000_000_000);
        assert_eq!(envelope.id.as_deref(), Some("f1"));
        match envelope.message {
            Message::Animation(data) => {
                assert_eq!(data.blendshapes["jawOpen"], 0.4);
                assert_eq!(data.frame_number, Some(12));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Envelope::parse(r#"{"data":{}}"#), Err(WireError::MissingType));
        assert_eq!(
            Envelope::parse(r#"{"type":"subscribe"}"#),
            Err(WireError::UnknownType("subscribe".into()))
        );
        assert!(matches!(Envelope::parse("{not json"), Err(WireError::Json(_))));
        assert!(matches!(
            Envelope::parse(r#"{"type":"control","data":{"action":"dance"}}"#),
            Err(WireError::InvalidPayload { kind: "control", .. })
        ));
        assert!(matches!(
            Envelope::parse(r#"{"type":"animation","data":{"blendshapes":{"jawOpen":2.0}}}"#),
            Err(WireError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_ping_without_data() {
        let envelope = Envelope::parse(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(envelope.message, Message::Ping);
        assert!(envelope.timestamp > 0);
    }

    #[test]
    fn test_serialize_shape() {
        let envelope = Envelope::new(Message::State(StateData {
            avatar_id: "a1".into(),
            state: "active".into(),
            quality: QualityLevel::Low,
            compression_enabled: true,
            metrics: None,
        }))
        .with_id("s1");
        let value = envelope.to_value().unwrap();
        assert_eq!(value["type"], "state");
        assert_eq!(value["id"], "s1");
        assert_eq!(value["data"]["quality"], "low");
        assert!(value["timestamp"].is_i64());
    }

    #[test]
    fn test_reparse_server_messages() {
        let messages = vec![
            Message::Visemes(VisemeData::new(vec![VisemeCue {
                viseme: "V_AA".into(),
                weight: 1.0,
                duration: 120,
                phoneme: Some("AA".into()),
            }])),
            Message::Ack(AckData::ok("c7")),
            Message::Control(ControlData::new(ControlAction::Pause)),
            Message::Metrics(MetricsData {
                fps: 59.5,
                compression_ratio: 0.7,
                ..Default::default()
            }),
            Message::Pong,
        ];
        for message in messages {
            let envelope = Envelope::new(message);
            let text = envelope.to_json().unwrap();
            assert_eq!(Envelope::parse(&text).unwrap(), envelope);
        }
    }

    #[test]
    fn test_error_envelope() {
        let envelope = Envelope::error(&MorphcastError::UnknownAvatar("x".into()));
        let value = envelope.to_value().unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["data"]["code"], "UNKNOWN_AVATAR");
        assert_eq!(value["data"]["recoverable"], json!(true));
    }
}
