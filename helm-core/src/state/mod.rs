//! Session state machines.

pub mod client;

pub use client::{
    ClientPhase, ClientState, HeartbeatAction, ReconnectDecision, SessionSignal,
    DEAD_INTERVAL, HEARTBEAT_INTERVAL,
};
