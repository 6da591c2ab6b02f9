//! Managed duplex connection over the frame codec.
//!
//! A [`Connection`] splits the stream into a dedicated reader task and
//! writer task. Decoded frames arrive on a single-consumer event
//! channel, so slow frame handling never stalls header parsing; writes
//! funnel through one task, so response bytes never interleave.
//!
//! Closure of any kind — peer EOF, transport error, framing violation,
//! local shutdown — is reported as exactly one
//! [`ConnectionEvent::Closed`]. Recoverable per-frame decode errors
//! (unknown type) are surfaced as [`ConnectionEvent::ProtocolError`]
//! without dropping the connection.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use crate::codec::FrameCodec;
use crate::error::HelmError;
use crate::frame::Frame;

/// Cloneable handle for queueing outbound frames.
pub type FrameSender = mpsc::Sender<Frame>;

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed the stream cleanly.
    PeerClosed,
    /// A framing violation (short/oversized frame).
    Framing(String),
    /// The socket failed (reset, abort, write error).
    Transport(String),
    /// We tore the connection down ourselves.
    LocalClose,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "peer closed"),
            Self::Framing(msg) => write!(f, "framing error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::LocalClose => write!(f, "closed locally"),
        }
    }
}

/// What the reader task delivers to the connection's consumer.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A complete decoded frame, in receipt order.
    Frame(Frame),
    /// A recoverable decode error; the connection is still up.
    ProtocolError(HelmError),
    /// Terminal. Sent exactly once, after which no more events follow.
    Closed(CloseReason),
}

/// A managed duplex frame connection.
pub struct Connection {
    tx: FrameSender,
    rx: mpsc::Receiver<ConnectionEvent>,
    shutdown: CancellationToken,
    last_activity: Arc<Mutex<Instant>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    /// Wrap an established stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (mut sink, mut source) = Framed::new(stream, FrameCodec).split();

        let (user_tx, mut outbound_rx) = mpsc::channel::<Frame>(100);
        let (event_tx, event_rx) = mpsc::channel::<ConnectionEvent>(100);

        let shutdown = CancellationToken::new();
        let last_activity = Arc::new(Mutex::new(Instant::now()));

        // A writer failure records its reason here before cancelling,
        // so the reader (the sole Closed emitter) can report it.
        let pending_reason: Arc<Mutex<Option<CloseReason>>> = Arc::new(Mutex::new(None));

        // Writer task: outbound queue -> socket. Serializes all
        // writes; a partial-write error fails the whole connection.
        // Exits on cancellation even while sender clones are alive,
        // so `shutdown` can always join it.
        let writer = {
            let shutdown = shutdown.clone();
            let pending_reason = Arc::clone(&pending_reason);
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            // Flush frames queued before the cancel.
                            while let Ok(frame) = outbound_rx.try_recv() {
                                if sink.send(frame).await.is_err() {
                                    return;
                                }
                            }
                            break;
                        }
                        frame = outbound_rx.recv() => match frame {
                            Some(frame) => {
                                if let Err(e) = sink.send(frame).await {
                                    tracing::debug!("connection write failed: {e}");
                                    *pending_reason.lock().expect("reason lock") =
                                        Some(CloseReason::Transport(e.to_string()));
                                    shutdown.cancel();
                                    return;
                                }
                            }
                            None => break,
                        },
                    }
                }
                // Flush and let the socket close.
                let _ = sink.close().await;
            })
        };

        // Reader task: socket -> event channel. The only producer of
        // `Closed`, emitted once on every exit path.
        let reader = {
            let shutdown = shutdown.clone();
            let last_activity = Arc::clone(&last_activity);
            let pending_reason = Arc::clone(&pending_reason);
            tokio::spawn(async move {
                let reason = loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            break pending_reason
                                .lock()
                                .expect("reason lock")
                                .take()
                                .unwrap_or(CloseReason::LocalClose);
                        }
                        next = source.next() => match next {
                            Some(Ok(frame)) => {
                                *last_activity.lock().expect("activity lock") = Instant::now();
                                if event_tx.send(ConnectionEvent::Frame(frame)).await.is_err() {
                                    // Consumer gone; nobody to notify.
                                    return;
                                }
                            }
                            Some(Err(e)) if !e.is_connection_fatal() => {
                                if event_tx.send(ConnectionEvent::ProtocolError(e)).await.is_err() {
                                    return;
                                }
                            }
                            Some(Err(e)) => {
                                let reason = match &e {
                                    HelmError::Transport(io) => {
                                        CloseReason::Transport(io.to_string())
                                    }
                                    other => CloseReason::Framing(other.to_string()),
                                };
                                break reason;
                            }
                            None => break CloseReason::PeerClosed,
                        },
                    }
                };
                let _ = event_tx.send(ConnectionEvent::Closed(reason)).await;
            })
        };

        Self {
            tx: user_tx,
            rx: event_rx,
            shutdown,
            last_activity,
            reader,
            writer,
        }
    }

    /// Establish a TCP connection to `info` and wrap it.
    pub async fn connect(info: &ConnectionInfo) -> Result<Self, HelmError> {
        let stream = TcpStream::connect(info.addr()).await?;
        Ok(Self::new(stream))
    }

    /// Queue a frame for transmission.
    pub async fn send(&self, frame: Frame) -> Result<(), HelmError> {
        self.tx.send(frame).await.map_err(|_| HelmError::ChannelClosed)
    }

    /// Receive the next connection event.
    ///
    /// Returns `None` only after `Closed` has been delivered (or the
    /// consumer raced connection teardown).
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.rx.recv().await
    }

    /// A cloneable outbound handle for use from other tasks.
    pub fn sender(&self) -> FrameSender {
        self.tx.clone()
    }

    /// When the last inbound frame arrived.
    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock().expect("activity lock")
    }

    /// Signal teardown without waiting for it.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Tear the connection down and wait for both I/O tasks to exit,
    /// so no stale task touches the socket afterwards.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        drop(self.tx);
        let _ = self.reader.await;
        let _ = self.writer.await;
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("closed", &self.shutdown.is_cancelled())
            .finish()
    }
}

// ── ConnectionInfo ───────────────────────────────────────────────

/// Host/port pair for dialing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    host: String,
    port: u16,
}

impl ConnectionInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.addr())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageType;
    use std::time::Duration;

    /// A connected pair over an in-memory duplex stream.
    fn pair() -> (Connection, Connection) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (Connection::new(a), Connection::new(b))
    }

    async fn recv_frame(conn: &mut Connection) -> Frame {
        match tokio::time::timeout(Duration::from_secs(5), conn.recv())
            .await
            .expect("timeout")
            .expect("connection closed")
        {
            ConnectionEvent::Frame(f) => f,
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn frames_cross_in_receipt_order() {
        let (left, mut right) = pair();

        left.send(Frame::ping()).await.unwrap();
        left.send(Frame::error("one")).await.unwrap();
        left.send(Frame::pong()).await.unwrap();

        assert_eq!(recv_frame(&mut right).await.msg_type(), MessageType::Ping);
        assert_eq!(recv_frame(&mut right).await.msg_type(), MessageType::Error);
        assert_eq!(recv_frame(&mut right).await.msg_type(), MessageType::Pong);
    }

    #[tokio::test]
    async fn peer_drop_delivers_closed_once() {
        let (left, mut right) = pair();
        left.shutdown().await;

        let mut closed = 0;
        while let Some(event) = right.recv().await {
            if let ConnectionEvent::Closed(_) = event {
                closed += 1;
            }
        }
        assert_eq!(closed, 1);
    }

    #[tokio::test]
    async fn local_shutdown_unblocks_reader() {
        let (left, _right) = pair();
        // No traffic; shutdown must still complete promptly.
        tokio::time::timeout(Duration::from_secs(2), left.shutdown())
            .await
            .expect("shutdown did not unblock the read loop");
    }

    #[tokio::test]
    async fn inbound_frame_refreshes_activity() {
        let (left, mut right) = pair();
        let before = right.last_activity();
        tokio::time::sleep(Duration::from_millis(20)).await;

        left.send(Frame::ping()).await.unwrap();
        recv_frame(&mut right).await;

        assert!(right.last_activity() > before);
    }

    #[tokio::test]
    async fn shutdown_joins_writer_despite_live_sender_clone() {
        let (left, _right) = pair();
        // A clone obtained via `sender()` outlives the connection;
        // shutdown must still join the writer task.
        let tx = left.sender();
        tokio::time::timeout(Duration::from_secs(2), left.shutdown())
            .await
            .expect("shutdown did not join the writer while a sender clone is alive");
        // The writer is gone, so the surviving clone can only fail.
        assert!(tx.send(Frame::ping()).await.is_err());
    }

    #[tokio::test]
    async fn frames_queued_before_shutdown_are_flushed() {
        let (left, mut right) = pair();
        left.send(Frame::error("last words")).await.unwrap();
        left.shutdown().await;

        let frame = recv_frame(&mut right).await;
        assert_eq!(frame.msg_type(), MessageType::Error);
        assert_eq!(frame.payload_text().unwrap(), "last words");
    }
}
