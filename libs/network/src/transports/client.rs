//! Flow Socket Client
//!
//! Component-side connection to a [`FlowSocketServer`](super::FlowSocketServer).
//! Request/reply helpers rely on the server handling a connection's frames in
//! order.

use super::connection::{write_frame, FrameReader};
use crate::{Result, TransportError};
use bytes::Bytes;
use flow_codec::payload::{parse_ack, parse_discovery, registration_payload};
use flow_codec::{Frame, MessageType, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE, UNBOUND_SOURCE};
use flow_types::ComponentId;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tracing::debug;

/// Client connection speaking the flow frame protocol
pub struct FlowClient {
    path: PathBuf,
    reader: FrameReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    source: u32,
    sequence: u64,
    timeout: Duration,
}

impl FlowClient {
    /// Connect to a server socket; `timeout` bounds the connect and every reply
    pub async fn connect(path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let stream = match tokio::time::timeout(timeout, UnixStream::connect(&path)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(TransportError::network_with_source(
                    format!("Failed to connect to Unix socket: {:?}", path),
                    e,
                ))
            }
            Err(_) => return Err(TransportError::timeout("connect", timeout.as_millis() as u64)),
        };

        debug!("Connected to Unix socket: {:?}", path);

        let (read_half, writer) = stream.into_split();
        Ok(Self {
            path,
            reader: FrameReader::new(
                read_half,
                HEADER_SIZE + DEFAULT_MAX_PAYLOAD_SIZE,
                DEFAULT_MAX_PAYLOAD_SIZE,
            ),
            writer,
            source: UNBOUND_SOURCE,
            sequence: 0,
            timeout,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Component this client registered as
    pub fn component(&self) -> Option<ComponentId> {
        ComponentId::from_code(self.source).ok()
    }

    /// Bind this connection to `component` on the server.
    ///
    /// Completes a heartbeat round trip afterwards, so the binding is in
    /// effect when this returns.
    pub async fn register(&mut self, component: ComponentId) -> Result<()> {
        self.source = component.code();
        self.send_frame(
            MessageType::Registration,
            Bytes::copy_from_slice(&registration_payload(component)),
        )
        .await?;
        self.heartbeat().await?;
        Ok(())
    }

    /// Send a heartbeat and wait for the empty reply, returning the round trip
    pub async fn heartbeat(&mut self) -> Result<Duration> {
        let started = Instant::now();
        self.send_frame(MessageType::Heartbeat, Bytes::new()).await?;

        let reply = self.recv_frame().await?;
        expect_type(&reply, MessageType::Heartbeat)?;
        if !reply.payload().is_empty() {
            return Err(TransportError::unexpected_reply(
                "empty heartbeat",
                format!("{} byte payload", reply.payload().len()),
            ));
        }
        Ok(started.elapsed())
    }

    /// Send a command and wait for its acknowledgement
    pub async fn send_command(&mut self, payload: impl Into<Bytes>) -> Result<u64> {
        self.request_ack(MessageType::Command, payload.into()).await
    }

    /// Send an event and wait for its acknowledgement
    pub async fn send_event(&mut self, payload: impl Into<Bytes>) -> Result<u64> {
        self.request_ack(MessageType::Event, payload.into()).await
    }

    /// Ask the server which components are running
    pub async fn discover(&mut self) -> Result<Vec<ComponentId>> {
        self.send_frame(MessageType::Discovery, Bytes::new()).await?;
        let reply = self.recv_frame().await?;
        expect_type(&reply, MessageType::Discovery)?;
        Ok(parse_discovery(reply.payload())?)
    }

    async fn request_ack(&mut self, message_type: MessageType, payload: Bytes) -> Result<u64> {
        let sequence = self.send_frame(message_type, payload).await?;
        let reply = self.recv_frame().await?;
        expect_type(&reply, MessageType::Response)?;

        let acknowledged = parse_ack(reply.payload())?;
        if acknowledged != sequence {
            return Err(TransportError::unexpected_reply(
                format!("ack for seq={}", sequence),
                format!("ack for seq={}", acknowledged),
            ));
        }
        Ok(sequence)
    }

    /// Send one frame, returning its sequence number
    pub async fn send_frame(&mut self, message_type: MessageType, payload: impl Into<Bytes>) -> Result<u64> {
        let sequence = self.sequence;
        self.sequence += 1;

        let frame = Frame::new(message_type, self.source, sequence, payload);
        write_frame(&mut self.writer, &frame).await?;
        Ok(sequence)
    }

    /// Receive one frame within the client timeout
    pub async fn recv_frame(&mut self) -> Result<Frame> {
        self.reader.read_frame_timeout(self.timeout).await
    }

    /// Write raw bytes without framing
    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

fn expect_type(frame: &Frame, expected: MessageType) -> Result<()> {
    match frame.message_type() {
        Ok(actual) if actual == expected => Ok(()),
        Ok(actual) => Err(TransportError::unexpected_reply(expected.name(), actual.name())),
        Err(e) => Err(e.into()),
    }
}
