//! Host-side session management and frame dispatch.

pub mod dispatch;
pub mod session;

pub use dispatch::{Capabilities, DispatchOutcome, ServerContext, serve_connection};
pub use session::{ConnectionId, Session, SessionRegistry};
