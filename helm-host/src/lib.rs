//! # helm-host — Remote-Control Host Daemon
//!
//! Listens for operator connections, authenticates them against the
//! local credential store, and serves remote-control commands through
//! the capability layer: file access scoped to an allow-list, command
//! execution, clipboard, and system information.
//!
//! ## Modes
//!
//! - **Run**: `helm-host --config helm-host.toml`
//! - **Bootstrap config**: `helm-host --gen-config`
//! - **Account management**: `helm-host --add-user <name>`

pub mod capability;
pub mod config;
pub mod service;
