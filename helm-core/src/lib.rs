//! # helm-core
//!
//! Core protocol library for the Helm remote-control suite.
//!
//! This crate contains:
//! - **Frame**: `Frame` and the `type | length | payload` wire layout
//! - **Messages**: the `MessageType` catalog shared by both peers
//! - **Payloads**: structured bodies for auth, input, file, and info frames
//! - **Codec**: `FrameCodec` for framed TCP I/O via `tokio_util`
//! - **Transport**: `Connection` for managed socket I/O with activity tracking
//! - **State**: the operator-side session state machine
//! - **Server**: session registry, frame dispatch, and the serve loop
//! - **Users**: the salted-digest credential store
//! - **Error**: `HelmError` — typed, `thiserror`-based error hierarchy

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod payload;
pub mod server;
pub mod state;
pub mod transport;
pub mod users;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::FrameCodec;
pub use error::HelmError;
pub use frame::{Frame, HEADER_SIZE, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE};
pub use message::MessageType;
pub use payload::{
    AuthRequest, AuthResponse, FileEntry, FileRequest, KeyEvent, MouseClick, MouseMove,
    SystemInfo,
};
pub use server::{
    Capabilities, ConnectionId, DispatchOutcome, ServerContext, Session, SessionRegistry,
    serve_connection,
};
pub use state::{
    ClientPhase, ClientState, HeartbeatAction, ReconnectDecision, SessionSignal,
    DEAD_INTERVAL, HEARTBEAT_INTERVAL,
};
pub use transport::{CloseReason, Connection, ConnectionEvent, ConnectionInfo, FrameSender};
pub use users::UserStore;
