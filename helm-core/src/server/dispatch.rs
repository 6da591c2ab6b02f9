//! Per-connection serve loop and frame dispatch.
//!
//! The dispatcher's only jobs are routing and the authentication
//! gate; payload semantics live behind the [`Capabilities`] trait.
//! Handler failures are converted to `Error` response frames at this
//! boundary — they cost the single request, never the connection or
//! the handling task.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::HelmError;
use crate::frame::Frame;
use crate::message::MessageType;
use crate::payload::{AuthRequest, AuthResponse, FileRequest, KeyEvent, MouseClick, MouseMove, SystemInfo};
use crate::server::session::{Session, SessionRegistry};
use crate::transport::{Connection, ConnectionEvent};
use crate::users::UserStore;

// ── Capabilities ─────────────────────────────────────────────────

/// The external collaborators behind the protocol boundary.
///
/// Implementations interpret payload semantics (capture a screen,
/// inject input, touch the filesystem); the dispatcher never does.
#[async_trait]
pub trait Capabilities: Send + Sync {
    /// Capture the screen; returns opaque image bytes.
    async fn screenshot(&self) -> Result<Vec<u8>, HelmError>;

    async fn mouse_move(&self, event: MouseMove) -> Result<(), HelmError>;

    async fn mouse_click(&self, event: MouseClick) -> Result<(), HelmError>;

    async fn key_event(&self, event: KeyEvent) -> Result<(), HelmError>;

    /// Execute a file operation; returns the response body for a
    /// `FileTransfer` frame.
    async fn file_request(&self, request: FileRequest) -> Result<Vec<u8>, HelmError>;

    async fn clipboard_update(&self, data: &[u8]) -> Result<(), HelmError>;

    /// Run a system command; returns its output.
    async fn system_command(&self, command: &str) -> Result<String, HelmError>;

    async fn system_info(&self) -> Result<SystemInfo, HelmError>;
}

// ── ServerContext ────────────────────────────────────────────────

/// Everything a connection-handling task needs, passed explicitly —
/// no ambient globals.
#[derive(Clone)]
pub struct ServerContext {
    pub registry: Arc<SessionRegistry>,
    pub users: Arc<UserStore>,
    pub capabilities: Arc<dyn Capabilities>,
}

// ── Dispatch ─────────────────────────────────────────────────────

/// What the serve loop should do with the dispatch result.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Send this response; connection stays open.
    Respond(Frame),
    /// Nothing to send (e.g. an inbound `Pong`).
    Continue,
    /// Graceful end of the connection.
    Close,
    /// Send this response, then terminate the connection.
    RespondAndClose(Frame),
}

/// Route one decoded frame.
///
/// Invariant: no frame reaches a capability handler while the session
/// is unauthenticated, except `Auth` itself.
pub async fn dispatch_frame(
    frame: Frame,
    session: &mut Session,
    ctx: &ServerContext,
    now: Instant,
) -> DispatchOutcome {
    session.touch(now);
    let msg_type = frame.msg_type();

    if msg_type.requires_auth() && !session.is_authenticated() {
        tracing::warn!("{}: unauthenticated {msg_type} frame", session.id());
        return DispatchOutcome::RespondAndClose(Frame::error("Authentication required"));
    }

    if msg_type == MessageType::Auth {
        return handle_auth(&frame, session, ctx, now);
    }

    match route_capability(frame, session, ctx).await {
        Ok(outcome) => outcome,
        // Recoverable by contract: malformed payloads and handler
        // failures cost one request.
        Err(e) => {
            tracing::debug!("{}: {msg_type} failed: {e}", session.id());
            DispatchOutcome::Respond(Frame::error(e.to_string()))
        }
    }
}

/// Handle an `Auth` frame.
///
/// Always answered with `AuthResponse` — success, bad credentials,
/// or malformed payload alike. The operator treats `AuthResponse` as
/// the sole authentication-completion signal, so a bare `Error` here
/// would wedge its state machine.
fn handle_auth(
    frame: &Frame,
    session: &mut Session,
    ctx: &ServerContext,
    now: Instant,
) -> DispatchOutcome {
    let respond = |resp: AuthResponse| match resp.into_frame() {
        Ok(f) => DispatchOutcome::Respond(f),
        Err(e) => DispatchOutcome::RespondAndClose(Frame::error(e.to_string())),
    };

    if session.is_authenticated() {
        return respond(AuthResponse::denied("Session is already authenticated"));
    }

    let request = match AuthRequest::from_bytes(frame.payload()) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("{}: malformed auth payload: {e}", session.id());
            return respond(AuthResponse::denied("Invalid authentication data"));
        }
    };

    if !ctx.users.verify(&request.username, &request.password) {
        tracing::warn!("{}: failed login for {:?}", session.id(), request.username);
        return respond(AuthResponse::denied("Invalid username or password"));
    }

    if let Err(e) = session.authenticate(&request.username, now) {
        return respond(AuthResponse::denied(e.to_string()));
    }
    ctx.registry.mark_authenticated(session.id(), &request.username);
    tracing::info!("{}: authenticated as {}", session.id(), request.username);
    respond(AuthResponse::ok())
}

/// Route an authenticated frame to its capability handler.
async fn route_capability(
    frame: Frame,
    session: &Session,
    ctx: &ServerContext,
) -> Result<DispatchOutcome, HelmError> {
    let caps = &ctx.capabilities;
    let outcome = match frame.msg_type() {
        MessageType::Disconnect => {
            tracing::info!("{}: disconnect requested", session.id());
            DispatchOutcome::Close
        }
        MessageType::Ping => DispatchOutcome::Respond(Frame::pong()),
        MessageType::Pong => DispatchOutcome::Continue,
        MessageType::MouseMove => {
            let event = MouseMove::decode(frame.payload())?;
            caps.mouse_move(event).await?;
            DispatchOutcome::Respond(Frame::success("Mouse moved"))
        }
        MessageType::MouseClick => {
            let event = MouseClick::from_bytes(frame.payload())?;
            caps.mouse_click(event).await?;
            DispatchOutcome::Respond(Frame::success("Mouse click handled"))
        }
        MessageType::KeyEvent => {
            let event = KeyEvent::from_bytes(frame.payload())?;
            caps.key_event(event).await?;
            DispatchOutcome::Respond(Frame::success("Key event handled"))
        }
        MessageType::Screenshot => {
            let image = caps.screenshot().await?;
            DispatchOutcome::Respond(Frame::new(MessageType::Screenshot, image)?)
        }
        MessageType::FileTransfer => {
            let request = FileRequest::from_bytes(frame.payload())?;
            let body = caps.file_request(request).await?;
            DispatchOutcome::Respond(Frame::new(MessageType::FileTransfer, body)?)
        }
        MessageType::ClipboardUpdate => {
            caps.clipboard_update(frame.payload()).await?;
            DispatchOutcome::Respond(Frame::success("Clipboard updated"))
        }
        MessageType::SystemCommand => {
            let command = frame.payload_text()?;
            let output = caps.system_command(&command).await?;
            DispatchOutcome::Respond(Frame::new(MessageType::Success, output.into_bytes())?)
        }
        MessageType::Info => {
            let info = caps.system_info().await?;
            DispatchOutcome::Respond(info.into_frame()?)
        }
        // Response-only types have no business arriving here.
        MessageType::Auth
        | MessageType::AuthResponse
        | MessageType::Success
        | MessageType::Error => {
            DispatchOutcome::Respond(Frame::error("Unexpected message type"))
        }
    };
    Ok(outcome)
}

// ── Serve loop ───────────────────────────────────────────────────

/// Handle one accepted connection to completion.
///
/// Owns the connection's [`Session`]; the registry entry is removed
/// exactly once on every exit path, and the transport's I/O tasks are
/// awaited before returning so nothing touches the socket afterwards.
pub async fn serve_connection<S>(ctx: ServerContext, stream: S) -> Result<(), HelmError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let mut conn = Connection::new(stream);
    let mut session = ctx.registry.open_session(Instant::now());
    let id = session.id();
    tracing::debug!("{id}: connection opened");

    loop {
        let Some(event) = conn.recv().await else {
            break;
        };
        match event {
            ConnectionEvent::Frame(frame) => {
                match dispatch_frame(frame, &mut session, &ctx, Instant::now()).await {
                    DispatchOutcome::Respond(resp) => {
                        if conn.send(resp).await.is_err() {
                            break;
                        }
                    }
                    DispatchOutcome::Continue => {}
                    DispatchOutcome::Close => break,
                    DispatchOutcome::RespondAndClose(resp) => {
                        let _ = conn.send(resp).await;
                        break;
                    }
                }
            }
            ConnectionEvent::ProtocolError(e) => {
                tracing::warn!("{id}: {e}");
                if conn.send(Frame::error(e.to_string())).await.is_err() {
                    break;
                }
            }
            ConnectionEvent::Closed(reason) => {
                tracing::info!(
                    "{id} ({}): closed: {reason}",
                    session.username().unwrap_or("unauthenticated"),
                );
                break;
            }
        }
    }

    ctx.registry.remove(id);
    conn.shutdown().await;
    tracing::debug!("{id}: torn down");
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────
