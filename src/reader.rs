//! Framed stream reader for the upstream tracker connection.
//!
//! [`TrackerReader`] owns the single TCP connection to the eye tracker. On
//! connect it writes the configured initialization commands (the device sends
//! no acknowledgement), then runs its receive loop on a dedicated tokio task:
//! read up to `buffer_size` bytes, feed them through the [`FrameScanner`],
//! and publish each decoded record into a guarded single-slot holder.
//!
//! Consumers call [`TrackerReader::latest`] from any task; it locks, clones
//! the slot out and returns, never touching the socket. Last write wins; no
//! history, no queue. The slot is deliberately a `Mutex<Option<_>>` rather
//! than a channel: bounded memory, and stale-but-recent data is exactly the
//! semantics gaze consumers want.
//!
//! No read timeout is imposed; a silent-but-open upstream parks the loop in
//! `read()` until bytes arrive or the peer closes. Callers needing bounded
//! waits must impose them at the socket layer.

use crate::config::TrackerSettings;
use crate::error::{AppResult, GazeError};
use crate::frame::{FrameScanner, FrameSpec};
use crate::sample::GazeSample;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Connection lifecycle of a [`TrackerReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// No connection; the initial state, after a peer close, or after
    /// `disconnect()`.
    Disconnected,
    /// `connect()` is in progress.
    Connecting,
    /// Connected; the receive loop is running.
    Streaming,
    /// The receive loop hit a socket error and stopped.
    Faulted,
}

/// State shared between the receive loop (sole writer) and consumers.
struct Shared {
    latest: Mutex<Option<GazeSample>>,
    state: Mutex<ReaderState>,
}

impl Shared {
    fn set_state(&self, state: ReaderState) {
        *self.state.lock() = state;
    }
}

/// Reads the tracker's byte stream, frames it, and exposes the latest record.
pub struct TrackerReader {
    settings: TrackerSettings,
    frame_spec: FrameSpec,
    shared: Arc<Shared>,
    chunk_tap: Option<mpsc::Sender<Bytes>>,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl TrackerReader {
    /// Create a reader for the given endpoint and frame layout.
    pub fn new(settings: TrackerSettings, frame_spec: FrameSpec) -> Self {
        Self {
            settings,
            frame_spec,
            shared: Arc::new(Shared {
                latest: Mutex::new(None),
                state: Mutex::new(ReaderState::Disconnected),
            }),
            chunk_tap: None,
            shutdown: None,
            task: None,
        }
    }

    /// Attach a verbatim chunk feed.
    ///
    /// Every raw chunk read from the tracker is sent here before framing.
    /// This is how the relay configuration taps the stream without any
    /// re-framing. The sender moves into the receive loop on `connect()`, so
    /// the receiver sees the channel close when the loop exits.
    pub fn with_chunk_tap(mut self, tap: mpsc::Sender<Bytes>) -> Self {
        self.chunk_tap = Some(tap);
        self
    }

    /// Connect to the tracker, send the initialization commands, and start
    /// the receive loop.
    ///
    /// On failure the reader stays `Disconnected` and no loop is started.
    pub async fn connect(&mut self) -> AppResult<()> {
        if matches!(self.state(), ReaderState::Streaming) {
            return Ok(());
        }
        self.shared.set_state(ReaderState::Connecting);

        let addr = self.settings.addr();
        let mut stream = match TcpStream::connect(&addr).await {
            Ok(stream) => stream,
            Err(e) => {
                self.shared.set_state(ReaderState::Disconnected);
                return Err(GazeError::Connection(format!(
                    "failed to connect to tracker at {}: {}",
                    addr, e
                )));
            }
        };

        for cmd in &self.settings.init_commands {
            if let Err(e) = stream.write_all(cmd.as_bytes()).await {
                self.shared.set_state(ReaderState::Disconnected);
                return Err(GazeError::Connection(format!(
                    "failed to send initialization command {:?}: {}",
                    cmd.trim_end(),
                    e
                )));
            }
            debug!(command = cmd.trim_end(), "Sent tracker init command");
        }

        info!(addr = %addr, "Connected to tracker");
        self.shared.set_state(ReaderState::Streaming);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown = Some(shutdown_tx);
        self.task = Some(tokio::spawn(receive_loop(
            stream,
            self.settings.buffer_size,
            FrameScanner::new(self.frame_spec.clone()),
            Arc::clone(&self.shared),
            self.chunk_tap.take(),
            shutdown_rx,
        )));
        Ok(())
    }

    /// Snapshot of the most recent decoded record, or `None` if no frame has
    /// been extracted yet. Never blocks on I/O.
    pub fn latest(&self) -> Option<GazeSample> {
        self.shared.latest.lock().clone()
    }

    /// Current connection state.
    pub fn state(&self) -> ReaderState {
        *self.shared.state.lock()
    }

    /// Stop the receive loop, close the socket, and clear the latest record.
    /// Idempotent.
    pub async fn disconnect(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        *self.shared.latest.lock() = None;
        self.shared.set_state(ReaderState::Disconnected);
    }
}

/// The receive loop. Owns the socket and the frame buffer; everything it
/// shares with consumers goes through `shared` under its locks, held only for
/// a copy in or out.
async fn receive_loop(
    mut stream: TcpStream,
    buffer_size: usize,
    mut scanner: FrameScanner,
    shared: Arc<Shared>,
    chunk_tap: Option<mpsc::Sender<Bytes>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; buffer_size];
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("Receive loop stopping on disconnect signal");
                shared.set_state(ReaderState::Disconnected);
                break;
            }
            read = stream.read(&mut buf) => match read {
                Ok(0) => {
                    warn!("Tracker closed the connection");
                    shared.set_state(ReaderState::Disconnected);
                    break;
                }
                Ok(n) => {
                    debug!(bytes = n, "Received tracker data");
                    if let Some(tap) = &chunk_tap {
                        // Relay consumers get the raw bytes, frames or not.
                        // A tap receiver that stops draining must not mask
                        // the disconnect signal, so the send is raced
                        // against it.
                        tokio::select! {
                            _ = shutdown.changed() => {
                                debug!("Receive loop stopping on disconnect signal");
                                shared.set_state(ReaderState::Disconnected);
                                break;
                            }
                            sent = tap.send(Bytes::copy_from_slice(&buf[..n])) => {
                                if sent.is_err() {
                                    debug!("Chunk tap receiver dropped");
                                }
                            }
                        }
                    }
                    for record in scanner.push(&buf[..n]) {
                        match GazeSample::parse(&record) {
                            Ok(sample) => {
                                *shared.latest.lock() = Some(sample);
                            }
                            // A bad frame never stops the loop; scanning
                            // resumes at the next marker.
                            Err(_) => debug!(record = %record, "Dropping record with no fields"),
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "Tracker socket error");
                    shared.set_state(ReaderState::Faulted);
                    break;
                }
            }
        }
    }
    // Socket and buffer drop here; the latest record survives a connection
    // loss and is only cleared by disconnect().
}
