//! Host daemon core loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use helm_core::{serve_connection, ServerContext};

use crate::config::HostConfig;

/// The top-level host service.
///
/// Owns the listener and the shared [`ServerContext`]; each accepted
/// socket gets its own serve task.
pub struct HostService {
    config: HostConfig,
    ctx: ServerContext,
    running: Arc<AtomicBool>,
}

impl HostService {
    pub fn new(config: HostConfig, ctx: ServerContext) -> Self {
        Self {
            config,
            ctx,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle that stops the accept loop from another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Accept operator connections until stopped.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.running.store(true, Ordering::SeqCst);

        let addr = self.config.listen_addr();
        let listener = TcpListener::bind(&addr).await?;
        info!("listening on {addr}");

        while self.running.load(Ordering::SeqCst) {
            let accept = tokio::select! {
                result = listener.accept() => result,
                _ = wait_for_stop(&self.running) => break,
            };

            let (stream, peer) = match accept {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };

            // Session cap counts registered sessions, authenticated
            // or not; excess connections are refused outright.
            if self.ctx.registry.len() >= self.config.network.max_connections as usize {
                warn!("refusing {peer}: session limit reached");
                drop(stream);
                continue;
            }

            info!("operator connected from {peer}");
            let ctx = self.ctx.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(ctx, stream).await {
                    warn!("session from {peer} ended with error: {e}");
                }
            });
        }

        info!("accept loop stopped");
        Ok(())
    }
}

async fn wait_for_stop(running: &AtomicBool) {
    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}
