//! Fan-out relay server.
//!
//! [`RelayServer`] listens for downstream TCP clients and forwards every raw
//! chunk it is handed to all of them, verbatim. It never reads from clients
//! and never re-frames the stream: any TCP client that connects receives
//! exactly the bytes the upstream tracker produced, from the moment it
//! joined (no backlog, no replay).
//!
//! A failing client is isolated: its write error is logged, it is removed
//! from the set after the broadcast pass, and the remaining clients are
//! unaffected. The client-set lock is held only to snapshot or mutate
//! membership, never across a network write, so a slow client cannot block
//! accepts or other broadcasts.

use crate::config::RelaySettings;
use crate::error::{AppResult, GazeError};
use bytes::Bytes;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// One connected downstream client.
///
/// Only the write half is kept: the relay never reads from clients, and a
/// dead client is discovered by its write failing. The write half sits behind
/// its own async mutex so broadcasts can write without holding the set lock.
#[derive(Clone)]
struct RelayClient {
    id: u64,
    addr: SocketAddr,
    writer: Arc<tokio::sync::Mutex<OwnedWriteHalf>>,
}

/// Parts of the server owned by `start()`/`stop()`.
struct Control {
    local_addr: Option<SocketAddr>,
    shutdown: Option<watch::Sender<bool>>,
    accept_task: Option<JoinHandle<()>>,
}

/// Broadcasts an upstream byte stream to every connected client.
pub struct RelayServer {
    settings: RelaySettings,
    clients: Arc<Mutex<Vec<RelayClient>>>,
    running: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
    control: Mutex<Control>,
}

impl RelayServer {
    /// Create a relay for the given listener settings. Nothing is bound until
    /// [`RelayServer::start`].
    pub fn new(settings: RelaySettings) -> Self {
        Self {
            settings,
            clients: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            next_id: Arc::new(AtomicU64::new(0)),
            control: Mutex::new(Control {
                local_addr: None,
                shutdown: None,
                accept_task: None,
            }),
        }
    }

    /// Bind the listener and start accepting clients.
    ///
    /// Returns once the socket is listening; the accept loop runs on its own
    /// task for the server's lifetime. A bind failure is fatal
    /// ([`GazeError::Bind`]); the caller must choose another port or abort.
    pub async fn start(&self) -> AppResult<()> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let listener = self.bind().await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "Relay listening");

        self.running.store(true, Ordering::SeqCst);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.clients),
            Arc::clone(&self.running),
            Arc::clone(&self.next_id),
            shutdown_rx,
        ));

        let mut control = self.control.lock();
        control.local_addr = Some(local_addr);
        control.shutdown = Some(shutdown_tx);
        control.accept_task = Some(task);
        Ok(())
    }

    async fn bind(&self) -> AppResult<TcpListener> {
        let addr_str = self.settings.addr();
        let wrap = |source: std::io::Error| GazeError::Bind {
            addr: addr_str.clone(),
            source,
        };

        let addr = tokio::net::lookup_host(&addr_str)
            .await
            .map_err(wrap)?
            .next()
            .ok_or_else(|| {
                GazeError::Configuration(format!("relay address {} did not resolve", addr_str))
            })?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4().map_err(wrap)?
        } else {
            TcpSocket::new_v6().map_err(wrap)?
        };
        socket.set_reuseaddr(true).map_err(wrap)?;
        socket.bind(addr).map_err(wrap)?;
        socket.listen(self.settings.max_clients).map_err(wrap)
    }

    /// The bound listener address, once started. Useful when configured with
    /// port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.control.lock().local_addr
    }

    /// Number of currently connected clients.
    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Write a chunk to every connected client.
    ///
    /// Takes a snapshot of the client set, releases the set lock, then writes
    /// to each member in turn; every member of the snapshot is attempted even
    /// if earlier ones fail. Clients whose write failed are removed and
    /// closed after the pass. With no clients connected this is a no-op.
    pub async fn broadcast(&self, chunk: &Bytes) {
        if chunk.is_empty() {
            return;
        }
        let snapshot: Vec<RelayClient> = self.clients.lock().clone();
        if snapshot.is_empty() {
            return;
        }

        let mut failed: Vec<u64> = Vec::new();
        for client in &snapshot {
            let mut writer = client.writer.lock().await;
            if let Err(e) = writer.write_all(chunk).await {
                warn!(client = %client.addr, error = %e, "Dropping relay client after failed send");
                failed.push(client.id);
            }
        }

        if !failed.is_empty() {
            // Removal drops the write half, which closes the connection.
            self.clients
                .lock()
                .retain(|client| !failed.contains(&client.id));
            debug!(remaining = self.client_count(), "Removed failed relay clients");
        }
    }

    /// Stop accepting, disconnect every client, and close the listener.
    /// Safe to call more than once; later calls are no-ops.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let (shutdown, task) = {
            let mut control = self.control.lock();
            (control.shutdown.take(), control.accept_task.take())
        };
        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(true);
        }
        if let Some(task) = task {
            // The accept loop drops the listener on exit.
            let _ = task.await;
        }

        let dropped = {
            let mut clients = self.clients.lock();
            let n = clients.len();
            clients.clear();
            n
        };
        info!(clients = dropped, "Relay stopped");
    }
}

/// Accepts downstream clients until told to stop.
///
/// Accept errors while the server is running are logged and accepting
/// continues; a transient error must not kill the server. Once stopped,
/// errors are expected and suppressed.
async fn accept_loop(
    listener: TcpListener,
    clients: Arc<Mutex<Vec<RelayClient>>>,
    running: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("Accept loop stopping");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let (read_half, write_half) = stream.into_split();
                    // The relay never reads from clients.
                    drop(read_half);
                    let client = RelayClient {
                        id: next_id.fetch_add(1, Ordering::SeqCst),
                        addr,
                        writer: Arc::new(tokio::sync::Mutex::new(write_half)),
                    };
                    let count = {
                        let mut clients = clients.lock();
                        clients.push(client);
                        clients.len()
                    };
                    info!(client = %addr, connected = count, "Relay client connected");
                }
                Err(e) => {
                    if running.load(Ordering::SeqCst) {
                        error!(error = %e, "Error accepting relay client");
                    } else {
                        break;
                    }
                }
            }
        }
    }
}
