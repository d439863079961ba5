//! Flow Socket Server
//!
//! Local stream-socket endpoint for cross-component control traffic.
//!
//! ## Lifecycle
//! - `start`: prepare the socket directory, remove any stale socket file, bind,
//!   restrict permissions, then spawn `worker_count` accept workers and a
//!   sweep task
//! - Each accepted connection joins the shared [`ConnectionPool`] and is served
//!   by its own handler task until a protocol error, timeout or shutdown
//! - `stop`: broadcast shutdown, join the workers and sweep task, wait for the
//!   handlers to leave the pool, remove the socket file
//!
//! ## Dispatch
//! | Frame | Action |
//! |---|---|
//! | Heartbeat | refresh heartbeat, reply with an empty heartbeat |
//! | Registration | bind connection to the component, mark it running |
//! | Command / Event | reply with a response acknowledging the sequence |
//! | Response | logged |
//! | Discovery | reply with the running components |

use super::connection::{Connection, FrameReader};
use super::metrics::{ServerStats, ServerStatsSnapshot};
use super::pool::{ConnectionPool, PoolStats};
use crate::discovery::ComponentDirectory;
use crate::{Result, TransportError};
use bytes::Bytes;
use flow_codec::payload::{ack_payload, discovery_payload, parse_ack, parse_registration};
use flow_codec::{Frame, MessageType, ProtocolError};
use flow_config::TransportConfig;
use flow_types::ComponentId;
use serde::Serialize;
use std::os::unix::fs::PermissionsExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// State shared by the accept workers and connection handlers
struct ServerShared {
    config: TransportConfig,
    pool: Arc<ConnectionPool>,
    stats: ServerStats,
    running: AtomicBool,
    directory: Option<Arc<ComponentDirectory>>,
}

/// Combined server and pool statistics
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TransportStats {
    pub server: ServerStatsSnapshot,
    pub pool: PoolStats,
}

/// Unix socket server for flow registry frames
pub struct FlowSocketServer {
    shared: Arc<ServerShared>,
    shutdown_tx: parking_lot::Mutex<Option<watch::Sender<bool>>>,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl FlowSocketServer {
    pub fn new(config: TransportConfig) -> Self {
        Self::build(config, None)
    }

    /// Server that records registrations and heartbeats in `directory`
    pub fn with_directory(config: TransportConfig, directory: Arc<ComponentDirectory>) -> Self {
        Self::build(config, Some(directory))
    }

    fn build(config: TransportConfig, directory: Option<Arc<ComponentDirectory>>) -> Self {
        Self {
            shared: Arc::new(ServerShared {
                config,
                pool: Arc::new(ConnectionPool::new()),
                stats: ServerStats::new(),
                running: AtomicBool::new(false),
                directory,
            }),
            shutdown_tx: parking_lot::Mutex::new(None),
            tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.shared.config
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.shared.pool
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Bind the socket and spawn the accept workers and sweep task
    #[instrument(skip(self), fields(socket = %self.shared.config.socket_path.display()))]
    pub async fn start(&self) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        if self.is_running() {
            return Err(TransportError::AlreadyRunning {
                path: self.shared.config.socket_path.display().to_string(),
            });
        }

        let listener = Arc::new(self.bind()?);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shared.running.store(true, Ordering::Release);

        for worker_id in 0..self.shared.config.worker_count {
            let listener = Arc::clone(&listener);
            let shared = Arc::clone(&self.shared);
            let shutdown_rx = shutdown_rx.clone();
            tasks.push(tokio::spawn(accept_loop(worker_id, listener, shared, shutdown_rx)));
        }

        tasks.push(tokio::spawn(sweep_loop(Arc::clone(&self.shared), shutdown_rx)));
        *self.shutdown_tx.lock() = Some(shutdown_tx);

        info!(
            "🚀 Flow socket server listening on {:?} ({} workers)",
            self.shared.config.socket_path, self.shared.config.worker_count
        );
        Ok(())
    }

    fn bind(&self) -> Result<UnixListener> {
        let path = &self.shared.config.socket_path;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TransportError::network_with_source("Failed to create socket directory", e)
            })?;
        }

        // Remove a stale socket left by a previous run
        if path.exists() {
            std::fs::remove_file(path).map_err(|e| {
                TransportError::network_with_source("Failed to remove existing socket", e)
            })?;
        }

        let listener = UnixListener::bind(path)
            .map_err(|e| TransportError::network_with_source("Failed to bind Unix socket", e))?;

        std::fs::set_permissions(
            path,
            std::fs::Permissions::from_mode(self.shared.config.socket_permissions),
        )
        .map_err(|e| TransportError::network_with_source("Failed to set socket permissions", e))?;

        Ok(listener)
    }

    /// Stop accepting, close every connection and remove the socket file
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(true);
        }

        for handle in tasks.drain(..) {
            if let Err(e) = handle.await {
                error!("Server task panicked: {}", e);
            }
        }

        // Handlers leave the pool through their membership guards
        self.shared.pool.close_all();
        let deadline = Instant::now() + self.shared.config.io_timeout();
        while !self.shared.pool.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        if !self.shared.pool.is_empty() {
            warn!("{} connections still open after shutdown", self.shared.pool.len());
        }

        let path = &self.shared.config.socket_path;
        if path.exists() {
            std::fs::remove_file(path).map_err(|e| {
                TransportError::network_with_source("Failed to remove socket file", e)
            })?;
        }

        info!("🛑 Flow socket server stopped");
        Ok(())
    }

    /// Send a frame to a connected component, returning the sequence used.
    ///
    /// Connections that fail the write are marked inactive and the next one
    /// bound to the same component is tried.
    pub async fn send(
        &self,
        component: ComponentId,
        message_type: MessageType,
        payload: impl Into<Bytes>,
    ) -> Result<u64> {
        if !self.is_running() {
            return Err(TransportError::NotRunning);
        }

        let payload = payload.into();
        let max = self.shared.config.max_payload_size;
        if payload.len() > max {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max,
            }
            .into());
        }

        let connections = self.shared.pool.find_by_component(component);
        if connections.is_empty() {
            return Err(TransportError::unknown_destination(component, "no live connection"));
        }

        for conn in connections {
            match conn.send(message_type, payload.clone()).await {
                Ok(sequence) => {
                    self.shared.stats.record_send(flow_codec::HEADER_SIZE + payload.len());
                    return Ok(sequence);
                }
                Err(e) => {
                    warn!("Send to {} via connection {} failed: {}", component, conn.id(), e);
                    self.shared.pool.mark_inactive(conn.id());
                }
            }
        }

        Err(TransportError::unknown_destination(component, "all connections unreachable"))
    }

    /// Send a frame to every bound connection, returning how many succeeded
    pub async fn broadcast(&self, message_type: MessageType, payload: impl Into<Bytes>) -> Result<usize> {
        if !self.is_running() {
            return Err(TransportError::NotRunning);
        }

        let payload = payload.into();
        let mut delivered = 0;
        for conn in self.shared.pool.bound() {
            match conn.send(message_type, payload.clone()).await {
                Ok(_) => {
                    self.shared.stats.record_send(flow_codec::HEADER_SIZE + payload.len());
                    delivered += 1;
                }
                Err(e) => {
                    debug!("Broadcast to connection {} failed: {}", conn.id(), e);
                    self.shared.pool.mark_inactive(conn.id());
                }
            }
        }
        Ok(delivered)
    }

    /// Reclaim inactive connections and those with stale heartbeats
    pub fn sweep(&self) -> usize {
        sweep_pool(&self.shared)
    }

    pub fn is_healthy(&self) -> bool {
        self.is_running() && self.shared.config.socket_path.exists()
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            server: self.shared.stats.snapshot(),
            pool: self.shared.pool.stats(),
        }
    }
}

impl Drop for FlowSocketServer {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = std::fs::remove_file(&self.shared.config.socket_path);
        }
    }
}

async fn accept_loop(
    worker_id: usize,
    listener: Arc<UnixListener>,
    shared: Arc<ServerShared>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    debug!("Accept worker {} started", worker_id);

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    shared.stats.record_accept();
                    let shared = Arc::clone(&shared);
                    let shutdown_rx = shutdown_rx.clone();
                    tokio::spawn(handle_connection(shared, stream, shutdown_rx));
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            },
        }
    }

    debug!("Accept worker {} exiting", worker_id);
}

async fn sweep_loop(shared: Arc<ServerShared>, mut shutdown_rx: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(shared.config.sweep_interval());
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = interval.tick() => {
                sweep_pool(&shared);
            }
        }
    }
}

fn sweep_pool(shared: &ServerShared) -> usize {
    let removed = shared.pool.sweep_stale(shared.config.heartbeat_timeout());
    if !removed.is_empty() {
        info!("🧹 Swept {} stale connections", removed.len());
    }
    removed.len()
}

async fn handle_connection(
    shared: Arc<ServerShared>,
    stream: UnixStream,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let (read_half, write_half) = stream.into_split();
    let conn = Arc::new(Connection::new(
        shared.pool.next_id(),
        write_half,
        shared.config.local_component.code(),
        shared.config.io_timeout(),
    ));
    let _membership = shared.pool.join(Arc::clone(&conn));
    let mut reader = FrameReader::new(
        read_half,
        shared.config.receive_buffer_size,
        shared.config.max_payload_size,
    );

    debug!("🔌 Connection {} opened", conn.id());

    // An inactive connection keeps its handler until the sweep closes it
    while shared.running.load(Ordering::Acquire) {
        let result = tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = conn.closed() => break,
            result = reader.read_frame_timeout(shared.config.io_timeout()) => result,
        };

        let frame = match result {
            Ok(frame) => frame,
            Err(e) if e.is_disconnect() => {
                debug!("Connection {} closed by peer", conn.id());
                break;
            }
            Err(e) => {
                shared.stats.record_error(&e);
                warn!("❌ Terminating connection {}: {}", conn.id(), e);
                break;
            }
        };

        shared.stats.record_receive(frame.encoded_len());
        if let Err(e) = dispatch(&shared, &conn, frame).await {
            shared.stats.record_error(&e);
            warn!("❌ Terminating connection {}: {}", conn.id(), e);
            break;
        }
    }

    conn.mark_inactive();
    debug!("🔌 Connection {} closed", conn.id());
}

async fn dispatch(shared: &ServerShared, conn: &Connection, frame: Frame) -> Result<()> {
    let message_type = match frame.message_type() {
        Ok(message_type) => message_type,
        Err(e) => {
            shared.stats.record_unknown_type();
            warn!("Ignoring frame on connection {}: {}", conn.id(), e);
            return Ok(());
        }
    };

    match message_type {
        MessageType::Heartbeat => {
            conn.touch();
            if let (Some(component), Some(directory)) = (conn.component(), &shared.directory) {
                directory.update_heartbeat(component);
            }
            reply(shared, conn, MessageType::Heartbeat, Bytes::new()).await
        }
        MessageType::Registration => {
            let component = match parse_registration(frame.payload()) {
                Ok(component) => component,
                Err(e) => {
                    warn!("Ignoring registration on connection {}: {}", conn.id(), e);
                    return Ok(());
                }
            };

            conn.bind(component);
            conn.touch();
            if let Some(directory) = &shared.directory {
                directory.register_running(component, None);
            }
            info!("🤝 Connection {} registered as {}", conn.id(), component);
            Ok(())
        }
        MessageType::Command | MessageType::Event => {
            debug!(
                "📥 {} seq={} ({} bytes) from source {}",
                message_type,
                frame.sequence(),
                frame.payload().len(),
                frame.source()
            );
            let ack = Bytes::copy_from_slice(&ack_payload(frame.sequence()));
            reply(shared, conn, MessageType::Response, ack).await
        }
        MessageType::Response => {
            match parse_ack(frame.payload()) {
                Ok(sequence) => debug!("✅ Connection {} acknowledged seq={}", conn.id(), sequence),
                Err(e) => debug!("Response on connection {}: {}", conn.id(), e),
            }
            Ok(())
        }
        MessageType::Discovery => {
            let running = shared
                .directory
                .as_ref()
                .map(|directory| directory.running_components())
                .unwrap_or_default();
            reply(shared, conn, MessageType::Discovery, discovery_payload(&running)).await
        }
    }
}

async fn reply(
    shared: &ServerShared,
    conn: &Connection,
    message_type: MessageType,
    payload: impl Into<Bytes>,
) -> Result<()> {
    let payload = payload.into();
    let len = flow_codec::HEADER_SIZE + payload.len();
    conn.send(message_type, payload).await?;
    shared.stats.record_send(len);
    Ok(())
}
