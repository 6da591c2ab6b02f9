//! Typed payload encoders/decoders layered on the frame codec.
//!
//! Each sub-module defines the structured payloads for one protocol
//! domain. Everything here is pure encode/decode — no I/O. Decoding
//! rejects out-of-shape input with [`MalformedPayload`] rather than
//! reading out of bounds.
//!
//! [`MalformedPayload`]: crate::error::HelmError::MalformedPayload

pub mod auth;
pub mod file;
pub mod info;
pub mod input;

pub use auth::{AuthRequest, AuthResponse};
pub use file::{FileEntry, FileRequest};
pub use info::SystemInfo;
pub use input::{KeyEvent, MouseClick, MouseMove};
