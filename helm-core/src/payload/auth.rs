//! Authentication handshake payloads.
//!
//! Both sides exchange compact JSON objects; key order is
//! irrelevant. Credentials are transmitted once, on the `Auth` frame,
//! and never stored by the transport layer.
//!
//! The host answers **every** `Auth` frame with an `AuthResponse` —
//! success or failure — never a bare `Error` frame. The operator's
//! state machine treats `AuthResponse` as the sole
//! authentication-completion signal.

use serde::{Deserialize, Serialize};

use crate::error::HelmError;
use crate::frame::Frame;
use crate::message::MessageType;

/// Credentials sent from operator to host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
}

impl AuthRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, HelmError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HelmError> {
        serde_json::from_slice(bytes).map_err(|e| HelmError::MalformedPayload {
            kind: "auth",
            reason: e.to_string(),
        })
    }

    /// Build the `Auth` frame carrying these credentials.
    pub fn into_frame(self) -> Result<Frame, HelmError> {
        Frame::new(MessageType::Auth, self.to_bytes()?)
    }
}

/// The host's verdict on an `Auth` frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

impl AuthResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: "Authentication successful".into(),
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, HelmError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HelmError> {
        serde_json::from_slice(bytes).map_err(|e| HelmError::MalformedPayload {
            kind: "auth_response",
            reason: e.to_string(),
        })
    }

    pub fn into_frame(self) -> Result<Frame, HelmError> {
        Frame::new(MessageType::AuthResponse, self.to_bytes()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_request_roundtrip() {
        let req = AuthRequest::new("operator", "hunter2");
        let bytes = req.to_bytes().unwrap();
        let back = AuthRequest::from_bytes(&bytes).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn auth_request_key_order_is_irrelevant() {
        let back =
            AuthRequest::from_bytes(br#"{"password":"p","username":"u"}"#).unwrap();
        assert_eq!(back.username, "u");
        assert_eq!(back.password, "p");
    }

    #[test]
    fn malformed_auth_is_typed() {
        let err = AuthRequest::from_bytes(b"not json").unwrap_err();
        assert!(matches!(
            err,
            HelmError::MalformedPayload { kind: "auth", .. }
        ));
        let err = AuthRequest::from_bytes(br#"{"username":"u"}"#).unwrap_err();
        assert!(matches!(err, HelmError::MalformedPayload { .. }));
    }

    #[test]
    fn response_frame_has_auth_response_type() {
        let frame = AuthResponse::denied("Invalid username or password")
            .into_frame()
            .unwrap();
        assert_eq!(frame.msg_type(), MessageType::AuthResponse);
        let back = AuthResponse::from_bytes(frame.payload()).unwrap();
        assert!(!back.success);
        assert_eq!(back.message, "Invalid username or password");
    }
}
