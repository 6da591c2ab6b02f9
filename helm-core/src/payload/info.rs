//! System information payload.

use serde::{Deserialize, Serialize};

use crate::error::HelmError;
use crate::frame::Frame;
use crate::message::MessageType;

/// Host system description returned for an `Info` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemInfo {
    pub hostname: String,
    /// OS family, e.g. "linux", "windows".
    pub platform: String,
    pub os_release: String,
    pub cpu_count: u32,
    pub uptime_secs: u64,
}

impl SystemInfo {
    pub fn to_bytes(&self) -> Result<Vec<u8>, HelmError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HelmError> {
        serde_json::from_slice(bytes).map_err(|e| HelmError::MalformedPayload {
            kind: "system_info",
            reason: e.to_string(),
        })
    }

    pub fn into_frame(self) -> Result<Frame, HelmError> {
        Frame::new(MessageType::Info, self.to_bytes()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let info = SystemInfo {
            hostname: "workbench".into(),
            platform: "linux".into(),
            os_release: "6.8".into(),
            cpu_count: 16,
            uptime_secs: 86_400,
        };
        let back = SystemInfo::from_bytes(&info.to_bytes().unwrap()).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn malformed_is_typed() {
        let err = SystemInfo::from_bytes(b"{}").unwrap_err();
        assert!(matches!(
            err,
            HelmError::MalformedPayload {
                kind: "system_info",
                ..
            }
        ));
    }
}
