//! Framed Unix socket connections
//!
//! A stream is split on accept: the read half stays with the connection's
//! handler task inside a [`FrameReader`], the write half moves into the pooled
//! [`Connection`] so replies and outbound sends can share it.

use crate::{Result, TransportError};
use bytes::{Bytes, BytesMut};
use flow_codec::{Frame, FrameHeader, MessageType, ProtocolError, HEADER_SIZE};
use flow_types::ComponentId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::unix::OwnedWriteHalf;
use tokio::sync::Notify;
use tracing::debug;

/// Reads whole frames through a fixed-size receive buffer
pub struct FrameReader<R> {
    inner: R,
    buffer: Box<[u8]>,
    max_payload_size: usize,
    bytes_read: u64,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// `buffer_size` must hold one header plus `max_payload_size` bytes
    pub fn new(inner: R, buffer_size: usize, max_payload_size: usize) -> Self {
        let buffer_size = buffer_size.max(HEADER_SIZE + max_payload_size);
        Self {
            inner,
            buffer: vec![0u8; buffer_size].into_boxed_slice(),
            max_payload_size,
            bytes_read: 0,
        }
    }

    /// Read one header and its payload, verifying the checksum.
    ///
    /// End of stream before the first header byte is a disconnect; anywhere
    /// later it is a truncated frame.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        let got = self.fill(0, HEADER_SIZE).await?;
        if got == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "peer closed the stream",
            )
            .into());
        }
        if got < HEADER_SIZE {
            return Err(truncated(HEADER_SIZE, got, "frame header"));
        }
        let header = FrameHeader::decode(&self.buffer[..HEADER_SIZE], self.max_payload_size)?;

        let end = HEADER_SIZE + header.payload_len();
        if end > self.buffer.len() {
            return Err(ProtocolError::PayloadTooLarge {
                size: header.payload_len(),
                max: self.buffer.len() - HEADER_SIZE,
            }
            .into());
        }

        let got = self.fill(HEADER_SIZE, end).await?;
        if got < end {
            return Err(truncated(end, got, "frame payload"));
        }
        self.bytes_read += end as u64;

        let payload = Bytes::copy_from_slice(&self.buffer[HEADER_SIZE..end]);
        Ok(Frame::from_parts(header, payload)?)
    }

    /// Read into `buffer[filled..end]` until full or end of stream, returning
    /// the new fill level
    async fn fill(&mut self, mut filled: usize, end: usize) -> Result<usize> {
        while filled < end {
            let n = self.inner.read(&mut self.buffer[filled..end]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// [`read_frame`](Self::read_frame) bounded by `timeout`
    pub async fn read_frame_timeout(&mut self, timeout: Duration) -> Result<Frame> {
        match tokio::time::timeout(timeout, self.read_frame()).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::timeout(
                "read_frame",
                timeout.as_millis() as u64,
            )),
        }
    }

    /// Total bytes consumed by complete frames
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

fn truncated(need: usize, got: usize, context: &str) -> TransportError {
    ProtocolError::MessageTooSmall {
        need,
        got,
        context: context.to_string(),
    }
    .into()
}

/// Encode `frame` and write it in a single call
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> Result<()> {
    let mut buf = BytesMut::with_capacity(frame.encoded_len());
    frame.encode_into(&mut buf);

    writer
        .write_all(&buf)
        .await
        .map_err(|e| TransportError::network_with_source("Failed to write frame", e))?;
    writer
        .flush()
        .await
        .map_err(|e| TransportError::network_with_source("Failed to flush", e))?;
    Ok(())
}

/// One accepted connection as seen by the pool
pub struct Connection {
    id: u64,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    /// Bound component code (0 = unbound)
    component: AtomicU32,
    last_heartbeat: Mutex<Instant>,
    sequence: AtomicU64,
    active: AtomicBool,
    closed: Notify,
    /// Source code stamped on outgoing frames
    local_source: u32,
    write_timeout: Duration,
    opened_at: Instant,
}

impl Connection {
    pub fn new(id: u64, writer: OwnedWriteHalf, local_source: u32, write_timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            id,
            writer: tokio::sync::Mutex::new(writer),
            component: AtomicU32::new(flow_codec::UNBOUND_SOURCE),
            last_heartbeat: Mutex::new(now),
            sequence: AtomicU64::new(0),
            active: AtomicBool::new(true),
            closed: Notify::new(),
            local_source,
            write_timeout,
            opened_at: now,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Component bound through the registration handshake
    pub fn component(&self) -> Option<ComponentId> {
        ComponentId::from_code(self.component.load(Ordering::Acquire)).ok()
    }

    /// Bind (or rebind) this connection to a component
    pub fn bind(&self, component: ComponentId) {
        self.component.store(component.code(), Ordering::Release);
    }

    /// Refresh the heartbeat clock
    pub fn touch(&self) {
        *self.last_heartbeat.lock() = Instant::now();
    }

    pub fn heartbeat_age(&self) -> Duration {
        self.last_heartbeat.lock().elapsed()
    }

    pub fn uptime(&self) -> Duration {
        self.opened_at.elapsed()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop using this connection for outbound sends; the handler keeps
    /// reading until the next sweep
    pub fn mark_inactive(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Mark inactive and wake the handler so it exits
    pub fn close(&self) {
        self.active.store(false, Ordering::Release);
        self.closed.notify_one();
    }

    /// Resolves once [`close`](Self::close) has been called
    pub async fn closed(&self) {
        self.closed.notified().await;
    }

    /// Next outgoing sequence number
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::AcqRel)
    }

    /// Build and send a frame, returning the sequence it was sent with
    pub async fn send(&self, message_type: MessageType, payload: impl Into<Bytes>) -> Result<u64> {
        let sequence = self.next_sequence();
        let frame = Frame::new(message_type, self.local_source, sequence, payload);
        self.send_frame(&frame).await?;
        Ok(sequence)
    }

    /// Write a pre-built frame under the connection's write lock
    pub async fn send_frame(&self, frame: &Frame) -> Result<()> {
        if !self.is_active() {
            return Err(TransportError::connection("Connection is inactive", Some(self.id)));
        }

        let mut writer = self.writer.lock().await;
        match tokio::time::timeout(self.write_timeout, write_frame(&mut *writer, frame)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::timeout(
                "write_frame",
                self.write_timeout.as_millis() as u64,
            )),
        }?;

        debug!(
            "📤 Sent {} frame seq={} ({} bytes) on connection {}",
            frame.message_type().map(|t| t.name()).unwrap_or("unknown"),
            frame.sequence(),
            frame.encoded_len(),
            self.id
        );
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("component", &self.component())
            .field("active", &self.is_active())
            .finish()
    }
}
