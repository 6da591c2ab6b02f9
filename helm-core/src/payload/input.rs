//! Mouse and keyboard event payloads.
//!
//! `MouseMove` is a packed fixed-size payload (movement events are
//! high-frequency); clicks and key events are low-frequency and ride
//! on JSON.
//!
//! ## MouseMove wire format (6 bytes, big-endian)
//!
//! ```text
//! x:       i16  (2)
//! y:       i16  (2)
//! button:  u8   (1)
//! pressed: u8   (1)   0 or 1
//! ```

use serde::{Deserialize, Serialize};

use crate::error::HelmError;
use crate::frame::Frame;
use crate::message::MessageType;

/// Mouse buttons on the wire: 0 = left, 1 = middle, 2 = right.
pub const BUTTON_LEFT: u8 = 0;
pub const BUTTON_MIDDLE: u8 = 1;
pub const BUTTON_RIGHT: u8 = 2;

// ── MouseMove ────────────────────────────────────────────────────

/// High-frequency pointer movement event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseMove {
    pub x: i16,
    pub y: i16,
    pub button: u8,
    pub pressed: bool,
}

impl MouseMove {
    /// Encoded size on the wire.
    pub const SIZE: usize = 6;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..2].copy_from_slice(&self.x.to_be_bytes());
        buf[2..4].copy_from_slice(&self.y.to_be_bytes());
        buf[4] = self.button;
        buf[5] = self.pressed as u8;
        buf
    }

    /// Decode, rejecting payloads of any other size.
    pub fn decode(data: &[u8]) -> Result<Self, HelmError> {
        if data.len() != Self::SIZE {
            return Err(HelmError::MalformedPayload {
                kind: "mouse_move",
                reason: format!("expected {} bytes, got {}", Self::SIZE, data.len()),
            });
        }
        Ok(Self {
            x: i16::from_be_bytes(data[0..2].try_into().expect("2-byte slice")),
            y: i16::from_be_bytes(data[2..4].try_into().expect("2-byte slice")),
            button: data[4],
            pressed: data[5] != 0,
        })
    }

    pub fn into_frame(self) -> Result<Frame, HelmError> {
        Frame::new(MessageType::MouseMove, self.encode().to_vec())
    }
}

// ── MouseClick ───────────────────────────────────────────────────

/// Mouse button press/release at absolute coordinates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MouseClick {
    pub x: i32,
    pub y: i32,
    /// 0 = left, 1 = middle, 2 = right.
    pub button: u8,
    /// `true` for press, `false` for release.
    pub pressed: bool,
}

impl MouseClick {
    pub fn to_bytes(&self) -> Result<Vec<u8>, HelmError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HelmError> {
        serde_json::from_slice(bytes).map_err(|e| HelmError::MalformedPayload {
            kind: "mouse_click",
            reason: e.to_string(),
        })
    }

    pub fn into_frame(self) -> Result<Frame, HelmError> {
        Frame::new(MessageType::MouseClick, self.to_bytes()?)
    }
}

// ── KeyEvent ─────────────────────────────────────────────────────

/// Keyboard press/release. `key` is a platform-neutral key name; the
/// injection layer owns the OS key-code mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    pub pressed: bool,
}

impl KeyEvent {
    pub fn to_bytes(&self) -> Result<Vec<u8>, HelmError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HelmError> {
        serde_json::from_slice(bytes).map_err(|e| HelmError::MalformedPayload {
            kind: "key_event",
            reason: e.to_string(),
        })
    }

    pub fn into_frame(self) -> Result<Frame, HelmError> {
        Frame::new(MessageType::KeyEvent, self.to_bytes()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_move_roundtrip() {
        let ev = MouseMove {
            x: -100,
            y: 32767,
            button: BUTTON_RIGHT,
            pressed: true,
        };
        let decoded = MouseMove::decode(&ev.encode()).unwrap();
        assert_eq!(decoded, ev);
    }

    #[test]
    fn mouse_move_wire_layout() {
        let ev = MouseMove {
            x: 100,
            y: 200,
            button: BUTTON_LEFT,
            pressed: false,
        };
        assert_eq!(ev.encode(), [0, 100, 0, 200, 0, 0]);
    }

    #[test]
    fn mouse_move_rejects_wrong_size() {
        let err = MouseMove::decode(&[0, 1, 2, 3, 4]).unwrap_err();
        assert!(matches!(
            err,
            HelmError::MalformedPayload {
                kind: "mouse_move",
                ..
            }
        ));
        // Longer than expected is rejected too, never truncated.
        assert!(MouseMove::decode(&[0u8; 7]).is_err());
    }

    #[test]
    fn mouse_click_roundtrip() {
        let click = MouseClick {
            x: 640,
            y: 480,
            button: BUTTON_MIDDLE,
            pressed: true,
        };
        let back = MouseClick::from_bytes(&click.to_bytes().unwrap()).unwrap();
        assert_eq!(back, click);
    }

    #[test]
    fn key_event_roundtrip() {
        let ev = KeyEvent {
            key: "ctrl".into(),
            pressed: false,
        };
        let back = KeyEvent::from_bytes(&ev.to_bytes().unwrap()).unwrap();
        assert_eq!(back, ev);
    }

    #[test]
    fn key_event_rejects_garbage() {
        assert!(KeyEvent::from_bytes(b"\xff\xfe").is_err());
        assert!(KeyEvent::from_bytes(br#"{"key":"a"}"#).is_err());
    }
}
