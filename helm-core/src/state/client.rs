//! Operator-side session state machine.
//!
//! Models the full lifecycle of the operator's connection to a host,
//! with validated transitions that return `Result` instead of
//! panicking:
//!
//! ```text
//!  Disconnected ──► Connecting ──► Authenticating ──► Active
//!       ▲               │                │               │
//!       │               ▼                ▼               ▼
//!       └───────── Reconnecting ◄────────┴───────────────┘
//!                       │                       (or Closing)
//!       ◄───────────────┘  attempts exhausted
//! ```
//!
//! The machine is pure state: it performs no I/O and takes the
//! current time as an argument, so heartbeat and backoff behavior is
//! testable with an injected clock. Side effects for the display
//! layer are emitted as [`SessionSignal`]s.

use std::time::{Duration, Instant};

use crate::error::HelmError;

/// Send a `Ping` after this much inbound silence while `Active`.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Declare the connection dead after this much inbound silence
/// (2x the heartbeat interval).
pub const DEAD_INTERVAL: Duration = Duration::from_secs(60);

/// Default linear backoff unit: delay = `base * attempts`.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(2);

/// Default reconnection attempt budget.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 3;

// ── ClientPhase ──────────────────────────────────────────────────

/// The current phase of the operator's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientPhase {
    /// No active connection. Initial state, and terminal after auth
    /// failure or reconnect exhaustion.
    #[default]
    Disconnected,
    /// TCP connection initiated but not yet established.
    Connecting,
    /// Socket up; `Auth` sent, waiting for `AuthResponse`.
    Authenticating,
    /// Authenticated and exchanging application frames.
    Active,
    /// Lost the connection; waiting out the backoff delay.
    Reconnecting,
    /// Operator requested disconnect; draining.
    Closing,
}

impl std::fmt::Display for ClientPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

// ── Signals & decisions ──────────────────────────────────────────

/// Side effects the state machine asks its surroundings to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    /// Entering `Active`: begin periodic screenshot polling.
    StartScreenRefresh,
    /// Entering `Active`: fetch host system information.
    RequestSystemInfo,
    /// Entering `Disconnected`: drop the displayed screen.
    ClearScreen,
    /// Entering `Disconnected`: reflect the state in the UI.
    ShowDisconnected,
    /// Credentials were rejected; surface to the operator.
    AuthFailed(String),
    /// The reconnect budget is spent; surface as fatal.
    ReconnectExhausted,
}

/// What to do after a lost connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Sleep this long, then transition to `Connecting`.
    RetryAfter(Duration),
    /// Budget spent; the machine is now terminally `Disconnected`.
    GiveUp,
}

/// Heartbeat verdict for the current instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Nothing to do.
    Idle,
    /// Silence exceeded [`HEARTBEAT_INTERVAL`]; send one `Ping`.
    SendPing,
    /// Silence exceeded [`DEAD_INTERVAL`]; treat the link as dead.
    ConnectionDead,
}

// ── ClientState ──────────────────────────────────────────────────

/// Pure state machine for the operator's session.
#[derive(Debug)]
pub struct ClientState {
    phase: ClientPhase,
    reconnect_attempts: u32,
    max_reconnect_attempts: u32,
    backoff_base: Duration,
    last_message_at: Instant,
    /// One ping per silence window; reset by any inbound frame.
    ping_outstanding: bool,
    /// Set by `begin_close`; a socket drop after this is not a fault.
    close_requested: bool,
}

impl ClientState {
    pub fn new(now: Instant) -> Self {
        Self::with_limits(now, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_BACKOFF_BASE)
    }

    pub fn with_limits(now: Instant, max_reconnect_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            phase: ClientPhase::Disconnected,
            reconnect_attempts: 0,
            max_reconnect_attempts,
            backoff_base,
            last_message_at: now,
            ping_outstanding: false,
            close_requested: false,
        }
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn last_message_at(&self) -> Instant {
        self.last_message_at
    }

    // ── Transitions ──────────────────────────────────────────────

    /// `Disconnected | Reconnecting` → `Connecting`.
    pub fn begin_connect(&mut self) -> Result<(), HelmError> {
        match self.phase {
            ClientPhase::Disconnected | ClientPhase::Reconnecting => {
                self.phase = ClientPhase::Connecting;
                self.close_requested = false;
                Ok(())
            }
            _ => Err(HelmError::ProtocolViolation(
                "cannot connect: not in Disconnected or Reconnecting state",
            )),
        }
    }

    /// `Connecting` → `Authenticating`. The caller sends `Auth` now.
    pub fn socket_established(&mut self, now: Instant) -> Result<(), HelmError> {
        match self.phase {
            ClientPhase::Connecting => {
                self.phase = ClientPhase::Authenticating;
                self.last_message_at = now;
                self.ping_outstanding = false;
                Ok(())
            }
            _ => Err(HelmError::ProtocolViolation(
                "cannot authenticate: not in Connecting state",
            )),
        }
    }

    /// `Authenticating` → `Active` or `Disconnected`, depending on the
    /// `AuthResponse` verdict.
    ///
    /// Rejected credentials are not a transient fault: no reconnect is
    /// scheduled, and the failure is surfaced via
    /// [`SessionSignal::AuthFailed`].
    pub fn auth_result(
        &mut self,
        success: bool,
        message: &str,
        now: Instant,
    ) -> Result<Vec<SessionSignal>, HelmError> {
        if self.phase != ClientPhase::Authenticating {
            return Err(HelmError::ProtocolViolation(
                "unexpected AuthResponse: not in Authenticating state",
            ));
        }
        if success {
            self.phase = ClientPhase::Active;
            self.reconnect_attempts = 0;
            self.last_message_at = now;
            self.ping_outstanding = false;
            Ok(vec![
                SessionSignal::StartScreenRefresh,
                SessionSignal::RequestSystemInfo,
            ])
        } else {
            self.phase = ClientPhase::Disconnected;
            Ok(vec![
                SessionSignal::AuthFailed(message.to_string()),
                SessionSignal::ClearScreen,
                SessionSignal::ShowDisconnected,
            ])
        }
    }

    /// Record an inbound frame. Any application frame substitutes for
    /// a pong.
    pub fn frame_received(&mut self, now: Instant) {
        self.last_message_at = now;
        self.ping_outstanding = false;
    }

    /// Heartbeat verdict while `Active`; [`HeartbeatAction::Idle`] in
    /// every other phase.
    pub fn poll_heartbeat(&mut self, now: Instant) -> HeartbeatAction {
        if self.phase != ClientPhase::Active {
            return HeartbeatAction::Idle;
        }
        let silence = now.duration_since(self.last_message_at);
        if silence > DEAD_INTERVAL {
            HeartbeatAction::ConnectionDead
        } else if silence > HEARTBEAT_INTERVAL && !self.ping_outstanding {
            self.ping_outstanding = true;
            HeartbeatAction::SendPing
        } else {
            HeartbeatAction::Idle
        }
    }

    /// The operator asked to disconnect. Valid from any connected
    /// phase; the subsequent socket closure routes to `Disconnected`
    /// rather than `Reconnecting`.
    pub fn begin_close(&mut self) -> Result<(), HelmError> {
        match self.phase {
            ClientPhase::Connecting
            | ClientPhase::Authenticating
            | ClientPhase::Active => {
                self.phase = ClientPhase::Closing;
                self.close_requested = true;
                Ok(())
            }
            _ => Err(HelmError::ProtocolViolation(
                "cannot close: no connection in progress",
            )),
        }
    }

    /// The connection ended (socket error, EOF, heartbeat death, or
    /// connect failure). Decides between scheduling a reconnect and
    /// going terminally `Disconnected`.
    ///
    /// Returns the decision plus any signals to surface. The attempt
    /// counter never exceeds the budget.
    pub fn connection_lost(&mut self) -> (ReconnectDecision, Vec<SessionSignal>) {
        if self.close_requested || self.phase == ClientPhase::Closing {
            self.phase = ClientPhase::Disconnected;
            self.close_requested = false;
            return (
                ReconnectDecision::GiveUp,
                vec![SessionSignal::ClearScreen, SessionSignal::ShowDisconnected],
            );
        }

        if self.reconnect_attempts >= self.max_reconnect_attempts {
            self.phase = ClientPhase::Disconnected;
            return (
                ReconnectDecision::GiveUp,
                vec![
                    SessionSignal::ReconnectExhausted,
                    SessionSignal::ClearScreen,
                    SessionSignal::ShowDisconnected,
                ],
            );
        }

        self.reconnect_attempts += 1;
        self.phase = ClientPhase::Reconnecting;
        let delay = self.backoff_base * self.reconnect_attempts;
        (ReconnectDecision::RetryAfter(delay), Vec::new())
    }
}

// ── Tests ────────────────────────────────────────────────────────
