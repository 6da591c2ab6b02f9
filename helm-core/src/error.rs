//! Domain-specific error types for the HELM protocol.
//!
//! All fallible operations return `Result<T, HelmError>`.
//! No panics on invalid input — every error is typed and recoverable
//! or explicitly connection-fatal.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the HELM protocol.
#[derive(Debug, Error)]
pub enum HelmError {
    // ── Framing Errors (connection-fatal) ────────────────────────
    /// The stream closed before a full 8-byte frame header arrived.
    #[error("short frame header: got {got} of 8 bytes before EOF")]
    ShortHeader { got: usize },

    /// The stream closed before the declared payload arrived.
    #[error("short frame body: got {got} of {expected} bytes before EOF")]
    ShortBody { expected: usize, got: usize },

    /// A frame declared a payload longer than the hard cap.
    ///
    /// The connection must be dropped without reading the body.
    #[error("oversized frame: {length} bytes declared (max {max})")]
    OversizedFrame { length: usize, max: usize },

    /// An outbound payload exceeds the maximum frame size.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    // ── Protocol Errors (recoverable per-frame) ──────────────────
    /// The wire integer did not map to any known `MessageType`.
    #[error("unknown message type: {0}")]
    UnknownMessageType(u32),

    /// A payload of a known type failed to decode.
    #[error("malformed {kind} payload: {reason}")]
    MalformedPayload { kind: &'static str, reason: String },

    /// A frame violated protocol rules (e.g. out-of-phase transition).
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    // ── Session Errors ───────────────────────────────────────────
    /// A non-auth frame arrived on an unauthenticated session.
    #[error("authentication required")]
    AuthenticationRequired,

    /// Credential verification failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The server refused the connection (e.g. connection cap reached).
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),

    // ── Serialization Errors ─────────────────────────────────────
    /// Encoding of a payload failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// UTF-8 conversion failed.
    #[error("invalid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    // ── Capability Errors (recoverable per-request) ──────────────
    /// A capability handler failed; reported to the peer as an
    /// `Error` frame, never fatal to the connection.
    #[error("capability error: {0}")]
    Capability(String),

    /// A file path fell outside the allowed directory set.
    #[error("path not allowed: {0}")]
    PathNotAllowed(String),
}

impl HelmError {
    /// Whether this error must terminate the connection.
    ///
    /// Framing and transport errors are fatal; malformed payloads,
    /// unknown message types and capability failures cost only the
    /// single request.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            HelmError::ShortHeader { .. }
                | HelmError::ShortBody { .. }
                | HelmError::OversizedFrame { .. }
                | HelmError::Transport(_)
                | HelmError::ChannelClosed
                | HelmError::ResourceExhausted(_)
        )
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<serde_json::Error> for HelmError {
    fn from(e: serde_json::Error) -> Self {
        HelmError::Encoding(e.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for HelmError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        HelmError::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = HelmError::OversizedFrame {
            length: 20_000_000,
            max: 10_485_760,
        };
        assert!(e.to_string().contains("20000000"));
        assert!(e.to_string().contains("10485760"));

        let e = HelmError::UnknownMessageType(99);
        assert!(e.to_string().contains("99"));
    }

    #[test]
    fn fatality_classification() {
        assert!(
            HelmError::OversizedFrame {
                length: 1,
                max: 0
            }
            .is_connection_fatal()
        );
        assert!(HelmError::ShortHeader { got: 3 }.is_connection_fatal());
        assert!(!HelmError::UnknownMessageType(42).is_connection_fatal());
        assert!(
            !HelmError::MalformedPayload {
                kind: "mouse_move",
                reason: "wrong size".into()
            }
            .is_connection_fatal()
        );
        assert!(!HelmError::Capability("no screen".into()).is_connection_fatal());
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let e: HelmError = io_err.into();
        assert!(matches!(e, HelmError::Transport(_)));
        assert!(e.is_connection_fatal());
    }
}
