//! File operation payloads.
//!
//! A `FileTransfer` frame carries one tagged JSON request; responses
//! are either a `FileTransfer` frame with the matching response body
//! (directory listings, file bytes header) or a plain
//! `Success`/`Error` frame. All paths are interpreted by the host's
//! file capability, which scopes them to an allow-list directory set —
//! the protocol layer forwards them opaquely.

use serde::{Deserialize, Serialize};

use crate::error::HelmError;
use crate::frame::Frame;
use crate::message::MessageType;

// ── FileRequest ──────────────────────────────────────────────────

/// The file-operation catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileRequest {
    ListDir {
        path: String,
    },
    GetFile {
        path: String,
        #[serde(default)]
        offset: u64,
    },
    PutFile {
        path: String,
        /// File contents. Bounded by the 10 MiB frame cap.
        data: Vec<u8>,
    },
    Delete {
        path: String,
    },
    Move {
        src: String,
        dst: String,
    },
    Copy {
        src: String,
        dst: String,
    },
    Mkdir {
        path: String,
    },
}

impl FileRequest {
    pub fn to_bytes(&self) -> Result<Vec<u8>, HelmError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HelmError> {
        serde_json::from_slice(bytes).map_err(|e| HelmError::MalformedPayload {
            kind: "file_transfer",
            reason: e.to_string(),
        })
    }

    pub fn into_frame(self) -> Result<Frame, HelmError> {
        Frame::new(MessageType::FileTransfer, self.to_bytes()?)
    }
}

// ── FileEntry ────────────────────────────────────────────────────

/// One row of a directory listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    /// Unix timestamp (seconds) of last modification.
    pub modified: u64,
}

impl FileEntry {
    /// Serialize a listing for a `FileTransfer` response frame.
    pub fn serialize_listing(entries: &[FileEntry]) -> Result<Vec<u8>, HelmError> {
        Ok(serde_json::to_vec(entries)?)
    }

    pub fn deserialize_listing(bytes: &[u8]) -> Result<Vec<FileEntry>, HelmError> {
        serde_json::from_slice(bytes).map_err(|e| HelmError::MalformedPayload {
            kind: "file_listing",
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_requests_roundtrip() {
        let reqs = [
            FileRequest::ListDir { path: "/home".into() },
            FileRequest::GetFile {
                path: "/home/a.txt".into(),
                offset: 4096,
            },
            FileRequest::Move {
                src: "/home/a".into(),
                dst: "/home/b".into(),
            },
            FileRequest::Mkdir { path: "/home/new".into() },
        ];
        for req in reqs {
            let back = FileRequest::from_bytes(&req.to_bytes().unwrap()).unwrap();
            assert_eq!(back, req);
        }
    }

    #[test]
    fn wire_tag_is_snake_case() {
        let bytes = FileRequest::ListDir { path: "/tmp".into() }
            .to_bytes()
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains(r#""type":"list_dir""#));
    }

    #[test]
    fn offset_defaults_to_zero() {
        let req = FileRequest::from_bytes(br#"{"type":"get_file","path":"/x"}"#).unwrap();
        assert_eq!(
            req,
            FileRequest::GetFile {
                path: "/x".into(),
                offset: 0
            }
        );
    }

    #[test]
    fn unknown_tag_is_malformed() {
        let err = FileRequest::from_bytes(br#"{"type":"format_disk","path":"/"}"#).unwrap_err();
        assert!(matches!(err, HelmError::MalformedPayload { .. }));
    }

    #[test]
    fn listing_roundtrip() {
        let entries = vec![FileEntry {
            name: "a.txt".into(),
            path: "/home/a.txt".into(),
            is_dir: false,
            size: 42,
            modified: 1_700_000_000,
        }];
        let bytes = FileEntry::serialize_listing(&entries).unwrap();
        assert_eq!(FileEntry::deserialize_listing(&bytes).unwrap(), entries);
    }
}
