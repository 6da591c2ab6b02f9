//! Drives one operator session over a managed connection.
//!
//! [`OperatorSession`] owns the transport and the pure state machine;
//! everything the display layer needs arrives on an event channel,
//! and outbound commands arrive on a command channel. Reconnection
//! and heartbeat policy live in the state machine; this module only
//! executes its verdicts.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use helm_core::{
    AuthRequest, AuthResponse, ClientPhase, ClientState, Connection, ConnectionEvent,
    ConnectionInfo, Frame, HeartbeatAction, MessageType, ReconnectDecision, SessionSignal,
};

/// What the session reports to the display layer.
#[derive(Debug)]
pub enum SessionEvent {
    /// A state-machine side effect to perform.
    Signal(SessionSignal),
    /// The session moved to a new phase.
    Phase(ClientPhase),
    /// An application frame from the host.
    Frame(Frame),
    /// Human-readable status line.
    Notice(String),
}

/// Outbound command handle.
pub type CommandSender = mpsc::UnboundedSender<Frame>;

/// How one connection attempt ended.
enum DriveEnd {
    /// Socket lost, heartbeat death, or connect failure; reconnect
    /// policy applies.
    Lost,
    /// Credentials rejected; terminal, no reconnect.
    AuthRejected,
    /// We or the host ended the session deliberately.
    Closed,
}

pub struct OperatorSession {
    info: ConnectionInfo,
    username: String,
    password: String,
    state: ClientState,
    events: mpsc::UnboundedSender<SessionEvent>,
    commands: mpsc::UnboundedReceiver<Frame>,
}

impl OperatorSession {
    /// Build a session plus its command and event handles.
    pub fn new(
        info: ConnectionInfo,
        username: impl Into<String>,
        password: impl Into<String>,
        max_reconnect_attempts: u32,
        backoff_base: Duration,
    ) -> (
        Self,
        CommandSender,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let session = Self {
            info,
            username: username.into(),
            password: password.into(),
            state: ClientState::with_limits(Instant::now(), max_reconnect_attempts, backoff_base),
            events: event_tx,
            commands: command_rx,
        };
        (session, command_tx, event_rx)
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn emit_signals(&self, signals: Vec<SessionSignal>) {
        for signal in signals {
            self.emit(SessionEvent::Signal(signal));
        }
    }

    fn emit_phase(&self) {
        self.emit(SessionEvent::Phase(self.state.phase()));
    }

    /// Run until the session ends: authentication rejected, operator
    /// quit, or the reconnect budget is spent.
    pub async fn run(mut self) {
        loop {
            if self.state.begin_connect().is_err() {
                break;
            }
            self.emit_phase();

            let end = match Connection::connect(&self.info).await {
                Ok(conn) => self.drive(conn).await,
                Err(e) => {
                    self.emit(SessionEvent::Notice(format!(
                        "connect to {} failed: {e}",
                        self.info
                    )));
                    DriveEnd::Lost
                }
            };

            match end {
                DriveEnd::AuthRejected => break,
                DriveEnd::Lost | DriveEnd::Closed => {
                    let (decision, signals) = self.state.connection_lost();
                    self.emit_signals(signals);
                    self.emit_phase();
                    match decision {
                        ReconnectDecision::RetryAfter(delay) => {
                            self.emit(SessionEvent::Notice(format!(
                                "reconnecting in {:.1}s (attempt {})",
                                delay.as_secs_f64(),
                                self.state.reconnect_attempts(),
                            )));
                            tokio::time::sleep(delay).await;
                        }
                        ReconnectDecision::GiveUp => break,
                    }
                }
            }
        }
        debug!("session ended in phase {}", self.state.phase());
    }

    /// Drive one established connection to its end.
    async fn drive(&mut self, mut conn: Connection) -> DriveEnd {
        if self.state.socket_established(Instant::now()).is_err() {
            conn.shutdown().await;
            return DriveEnd::Lost;
        }
        self.emit_phase();

        let auth = AuthRequest::new(self.username.clone(), self.password.clone());
        let auth_frame = match auth.into_frame() {
            Ok(f) => f,
            Err(e) => {
                warn!("cannot encode credentials: {e}");
                conn.shutdown().await;
                return DriveEnd::Lost;
            }
        };
        if conn.send(auth_frame).await.is_err() {
            conn.shutdown().await;
            return DriveEnd::Lost;
        }

        let mut tick = tokio::time::interval(Duration::from_secs(1));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(frame) if self.state.phase() == ClientPhase::Active => {
                        if conn.send(frame).await.is_err() {
                            conn.shutdown().await;
                            return DriveEnd::Lost;
                        }
                    }
                    Some(_) => {
                        self.emit(SessionEvent::Notice(
                            "not connected; command dropped".into(),
                        ));
                    }
                    // Command side hung up: the operator is done.
                    None => {
                        let _ = self.state.begin_close();
                        let _ = conn.send(Frame::disconnect()).await;
                        conn.shutdown().await;
                        return DriveEnd::Closed;
                    }
                },
                event = conn.recv() => match event {
                    Some(ConnectionEvent::Frame(frame)) => {
                        let was_active = self.state.phase() == ClientPhase::Active;
                        if let Some(end) = self.on_frame(frame) {
                            conn.shutdown().await;
                            return end;
                        }
                        // Just activated: fetch host info right away.
                        if !was_active
                            && self.state.phase() == ClientPhase::Active
                            && let Ok(request) = Frame::new(MessageType::Info, Vec::new())
                        {
                            let _ = conn.send(request).await;
                        }
                    }
                    Some(ConnectionEvent::ProtocolError(e)) => {
                        self.emit(SessionEvent::Notice(format!("protocol error: {e}")));
                    }
                    Some(ConnectionEvent::Closed(reason)) => {
                        self.emit(SessionEvent::Notice(format!("connection closed: {reason}")));
                        conn.shutdown().await;
                        return DriveEnd::Lost;
                    }
                    None => {
                        conn.shutdown().await;
                        return DriveEnd::Lost;
                    }
                },
                _ = tick.tick() => {
                    match self.state.poll_heartbeat(Instant::now()) {
                        HeartbeatAction::Idle => {}
                        HeartbeatAction::SendPing => {
                            if conn.send(Frame::ping()).await.is_err() {
                                conn.shutdown().await;
                                return DriveEnd::Lost;
                            }
                        }
                        HeartbeatAction::ConnectionDead => {
                            self.emit(SessionEvent::Notice(
                                "host silent past the dead interval".into(),
                            ));
                            conn.shutdown().await;
                            return DriveEnd::Lost;
                        }
                    }
                }
            }
        }
    }

    /// Handle one inbound frame. `Some` ends the connection attempt.
    fn on_frame(&mut self, frame: Frame) -> Option<DriveEnd> {
        let now = Instant::now();
        match frame.msg_type() {
            MessageType::AuthResponse => {
                let resp = match AuthResponse::from_bytes(frame.payload()) {
                    Ok(r) => r,
                    Err(e) => {
                        self.emit(SessionEvent::Notice(format!("bad auth response: {e}")));
                        return None;
                    }
                };
                match self.state.auth_result(resp.success, &resp.message, now) {
                    Ok(signals) => {
                        self.emit_signals(signals);
                        self.emit_phase();
                        if resp.success {
                            None
                        } else {
                            Some(DriveEnd::AuthRejected)
                        }
                    }
                    Err(e) => {
                        self.emit(SessionEvent::Notice(format!("{e}")));
                        None
                    }
                }
            }
            MessageType::Pong => {
                self.state.frame_received(now);
                None
            }
            MessageType::Disconnect => {
                self.emit(SessionEvent::Notice("host ended the session".into()));
                let _ = self.state.begin_close();
                Some(DriveEnd::Closed)
            }
            _ => {
                self.state.frame_received(now);
                self.emit(SessionEvent::Frame(frame));
                None
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
