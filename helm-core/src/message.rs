//! Protocol message types.
//!
//! Wire values are stable integers shared with every deployed peer —
//! never renumber. Uses proper enums with `TryFrom`; an unrecognized
//! integer is an error, not a panic.

use crate::error::HelmError;
use std::fmt;

/// Every frame type understood by the HELM protocol.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Credentials from operator to host. The only frame accepted on
    /// an unauthenticated session.
    Auth = 0,
    /// The sole reply to `Auth`, success or failure.
    AuthResponse = 1,
    /// Packed mouse movement event.
    MouseMove = 2,
    /// Mouse button press/release.
    MouseClick = 3,
    /// Keyboard press/release.
    KeyEvent = 4,
    /// Screen capture request / opaque image bytes in response.
    Screenshot = 5,
    /// File operation request/response envelope.
    FileTransfer = 6,
    /// Clipboard contents push.
    ClipboardUpdate = 7,
    /// System command execution request.
    SystemCommand = 8,
    /// Generic success acknowledgement.
    Success = 9,
    /// Generic error with a human-readable UTF-8 message.
    Error = 10,
    /// System information request/response.
    Info = 11,
    /// Graceful disconnect intent.
    Disconnect = 12,
    /// Keep-alive ping.
    Ping = 13,
    /// Keep-alive pong.
    Pong = 14,
}

impl TryFrom<u32> for MessageType {
    type Error = HelmError;

    fn try_from(value: u32) -> Result<Self, HelmError> {
        match value {
            0 => Ok(MessageType::Auth),
            1 => Ok(MessageType::AuthResponse),
            2 => Ok(MessageType::MouseMove),
            3 => Ok(MessageType::MouseClick),
            4 => Ok(MessageType::KeyEvent),
            5 => Ok(MessageType::Screenshot),
            6 => Ok(MessageType::FileTransfer),
            7 => Ok(MessageType::ClipboardUpdate),
            8 => Ok(MessageType::SystemCommand),
            9 => Ok(MessageType::Success),
            10 => Ok(MessageType::Error),
            11 => Ok(MessageType::Info),
            12 => Ok(MessageType::Disconnect),
            13 => Ok(MessageType::Ping),
            14 => Ok(MessageType::Pong),
            other => Err(HelmError::UnknownMessageType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl MessageType {
    /// Returns `true` if this frame type may only be processed on an
    /// authenticated session. Everything except `Auth` itself is
    /// gated.
    pub fn requires_auth(&self) -> bool {
        !matches!(self, MessageType::Auth)
    }
}
