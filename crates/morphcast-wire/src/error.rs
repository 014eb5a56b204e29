//! Wire errors

use morphcast_core::MorphcastError;
use thiserror::Error;

/// Envelope and payload errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WireError {
    #[error("Malformed JSON: {0}")]
    Json(String),

    #[error("Message missing 'type' field")]
    MissingType,

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Invalid {kind} payload: {reason}")]
    InvalidPayload { kind: &'static str, reason: String },

    #[error("Blendshape {name} value {value} out of range [-1, 1]")]
    OutOfRange { name: String, value: f64 },

    #[error("Invalid blendshape name ({len} bytes)")]
    InvalidName { len: usize },

    #[error("Invalid base64 audio chunk")]
    InvalidBase64,

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for wire operations
pub type WireResult<T> = Result<T, WireError>;

impl From<serde_json::Error> for WireError {
    fn from(e: serde_json::Error) -> Self {
        WireError::Json(e.to_string())
    }
}

impl From<WireError> for MorphcastError {
    fn from(e: WireError) -> Self {
        MorphcastError::InvalidMessage(e.to_string())
    }
}
