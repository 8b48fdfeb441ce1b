//! Shared error type across voxrelay crates.

use thiserror::Error;

/// Stable error codes (used in logs and client events).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Capture device missing or access denied.
    CaptureUnavailable,
    /// No supported output format for the capture stream.
    EncodingUnavailable,
    /// Inbound message is not a well-formed envelope.
    MalformedEnvelope,
    /// Chunk unplayable under every candidate format.
    DecodeFailed,
    /// Connection dropped or could not be established.
    TransportClosed,
    /// Invalid configuration.
    Config,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and events.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::CaptureUnavailable => "CAPTURE_UNAVAILABLE",
            ErrorCode::EncodingUnavailable => "ENCODING_UNAVAILABLE",
            ErrorCode::MalformedEnvelope => "MALFORMED_ENVELOPE",
            ErrorCode::DecodeFailed => "DECODE_FAILED",
            ErrorCode::TransportClosed => "TRANSPORT_CLOSED",
            ErrorCode::Config => "CONFIG",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, VoxError>;

/// Unified error type used by core, gateway, and client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VoxError {
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),
    #[error("no supported encoding format")]
    EncodingUnavailable,
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("decode failed: {0}")]
    DecodeFailed(String),
    #[error("transport closed: {0}")]
    TransportClosed(String),
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl VoxError {
    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            VoxError::CaptureUnavailable(_) => ErrorCode::CaptureUnavailable,
            VoxError::EncodingUnavailable => ErrorCode::EncodingUnavailable,
            VoxError::MalformedEnvelope(_) => ErrorCode::MalformedEnvelope,
            VoxError::DecodeFailed(_) => ErrorCode::DecodeFailed,
            VoxError::TransportClosed(_) => ErrorCode::TransportClosed,
            VoxError::Config(_) => ErrorCode::Config,
            VoxError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Conditions that need user intervention; everything else is per-chunk or
    /// per-connection and the pipeline keeps going.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VoxError::CaptureUnavailable(_) | VoxError::EncodingUnavailable
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_capture_and_encoding_are_fatal() {
        assert!(VoxError::CaptureUnavailable("denied".into()).is_fatal());
        assert!(VoxError::EncodingUnavailable.is_fatal());
        assert!(!VoxError::MalformedEnvelope("x".into()).is_fatal());
        assert!(!VoxError::DecodeFailed("x".into()).is_fatal());
        assert!(!VoxError::TransportClosed("x".into()).is_fatal());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            VoxError::MalformedEnvelope("x".into()).code().as_str(),
            "MALFORMED_ENVELOPE"
        );
        assert_eq!(VoxError::EncodingUnavailable.code().as_str(), "ENCODING_UNAVAILABLE");
    }
}
