//! Error types for MorphCast

use thiserror::Error;

use crate::AvatarId;

/// Core MorphCast errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MorphcastError {
    // Protocol errors
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    // Session errors
    #[error("Unknown avatar: {0}")]
    UnknownAvatar(AvatarId),

    #[error("Avatar {0} is not active")]
    NotActive(AvatarId),

    #[error("Avatar limit reached ({0} sessions)")]
    CapacityExceeded(usize),

    // Transport errors
    #[error("Send to avatar {avatar} failed: {reason}")]
    TransportSendFailure { avatar: AvatarId, reason: String },

    // Codec errors
    #[error("Decoder state diverged: expected frame {expected}, got {got}")]
    CodecStateCorruption { expected: u64, got: u64 },

    #[error("Codec error: {0}")]
    Codec(String),

    // Process errors
    #[error("Initialization failed: {0}")]
    InitializationFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MorphcastError {
    /// Wire error code reported to clients
    pub fn code(&self) -> &'static str {
        match self {
            MorphcastError::InvalidMessage(_) => "INVALID_MESSAGE",
            MorphcastError::UnknownAvatar(_) => "UNKNOWN_AVATAR",
            MorphcastError::NotActive(_) => "NOT_ACTIVE",
            MorphcastError::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            MorphcastError::TransportSendFailure { .. } => "TRANSPORT_ERROR",
            MorphcastError::CodecStateCorruption { .. } => "RESYNC_REQUIRED",
            MorphcastError::Codec(_) => "CODEC_ERROR",
            MorphcastError::InitializationFailure(_) => "INITIALIZATION_FAILED",
            MorphcastError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the client may keep using the connection
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            MorphcastError::InitializationFailure(_) | MorphcastError::CapacityExceeded(_)
        )
    }

    /// Errors raised inside pipeline stages (counted against the retry budget)
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            MorphcastError::Internal(_) | MorphcastError::Codec(_)
        )
    }
}

/// Result type for MorphCast operations
pub type MorphcastResult<T> = Result<T, MorphcastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let avatar = AvatarId::new("a1");
        assert_eq!(
            MorphcastError::UnknownAvatar(avatar.clone()).code(),
            "UNKNOWN_AVATAR"
        );
        assert_eq!(
            MorphcastError::NotActive(avatar.clone()).to_string(),
            "Avatar a1 is not active"
        );
        assert!(MorphcastError::InvalidMessage("bad".into()).is_recoverable());
        assert!(!MorphcastError::InitializationFailure("monitor".into()).is_recoverable());
        assert!(MorphcastError::Internal("boom".into()).is_internal());
        assert!(!MorphcastError::NotActive(avatar).is_internal());
    }
}
