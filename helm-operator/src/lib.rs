//! # helm-operator — Remote-Control Operator Client
//!
//! Connects to a helm-host daemon, authenticates, and drives it:
//! input injection, screenshots, file access, command execution.
//! Session lifecycle (authentication, heartbeats, linear-backoff
//! reconnection) is handled by the state machine in `helm-core`;
//! this crate supplies the transport driver and the console surface.

pub mod config;
pub mod session;
