//! The atomic wire unit.
//!
//! Every message on the wire is one frame:
//!
//! ```text
//! type:    u32  big-endian  (4)
//! length:  u32  big-endian  (4)
//! payload: [u8; length]
//! ```
//!
//! Frames are transient: constructed, sent or dispatched, and dropped.
//! Nothing below the message catalog ever sees a partial frame.

use bytes::Bytes;

use crate::error::HelmError;
use crate::message::MessageType;

/// Size of the fixed frame header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Hard cap on a frame's declared payload length (10 MiB).
///
/// A peer declaring more is terminated immediately; the body is never
/// read.
pub const MAX_PAYLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Maximum total size of an encoded frame.
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// A single decoded protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    msg_type: MessageType,
    payload: Bytes,
}

impl Frame {
    /// Build a frame, enforcing the payload cap.
    pub fn new(msg_type: MessageType, payload: impl Into<Bytes>) -> Result<Self, HelmError> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(HelmError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(Self { msg_type, payload })
    }

    /// An empty keep-alive ping.
    pub fn ping() -> Self {
        Self {
            msg_type: MessageType::Ping,
            payload: Bytes::new(),
        }
    }

    /// An empty keep-alive pong.
    pub fn pong() -> Self {
        Self {
            msg_type: MessageType::Pong,
            payload: Bytes::new(),
        }
    }

    /// A graceful disconnect intent.
    pub fn disconnect() -> Self {
        Self {
            msg_type: MessageType::Disconnect,
            payload: Bytes::new(),
        }
    }

    /// An `Error` frame carrying a human-readable UTF-8 message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            msg_type: MessageType::Error,
            payload: Bytes::from(message.into().into_bytes()),
        }
    }

    /// A `Success` frame carrying a human-readable UTF-8 message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            msg_type: MessageType::Success,
            payload: Bytes::from(message.into().into_bytes()),
        }
    }

    pub fn msg_type(&self) -> MessageType {
        self.msg_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the frame, taking ownership of the payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// The payload interpreted as UTF-8 text (for `Error`/`Success`/
    /// `Info` frames).
    pub fn payload_text(&self) -> Result<String, HelmError> {
        Ok(String::from_utf8(self.payload.to_vec())?)
    }

    /// Total encoded size: header plus payload.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Serialize to a contiguous byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&(self.msg_type as u32).to_be_bytes());
        out.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_header_big_endian() {
        let frame = Frame::new(MessageType::KeyEvent, Bytes::from_static(b"abc")).unwrap();
        let bytes = frame.to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE + 3);
        assert_eq!(&bytes[0..4], &[0, 0, 0, 4]); // KeyEvent = 4
        assert_eq!(&bytes[4..8], &[0, 0, 0, 3]); // length = 3
        assert_eq!(&bytes[8..], b"abc");
    }

    #[test]
    fn empty_payload_is_valid() {
        let frame = Frame::ping();
        assert_eq!(frame.to_bytes(), vec![0, 0, 0, 13, 0, 0, 0, 0]);
        assert_eq!(frame.encoded_len(), HEADER_SIZE);
    }

    #[test]
    fn rejects_payload_over_cap() {
        let big = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        let err = Frame::new(MessageType::Screenshot, big).unwrap_err();
        assert!(matches!(err, HelmError::PayloadTooLarge { .. }));
    }

    #[test]
    fn payload_at_cap_is_accepted() {
        let exact = vec![0u8; MAX_PAYLOAD_SIZE];
        assert!(Frame::new(MessageType::Screenshot, exact).is_ok());
    }

    #[test]
    fn error_frame_carries_text() {
        let frame = Frame::error("Authentication required");
        assert_eq!(frame.msg_type(), MessageType::Error);
        assert_eq!(frame.payload_text().unwrap(), "Authentication required");
    }
}
