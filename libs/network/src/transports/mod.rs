//! Local Socket Transport
//!
//! Framed Unix domain socket transport between cooperating components on one
//! host: a pooled multi-worker [`FlowSocketServer`] and the component-side
//! [`FlowClient`].

pub mod client;
pub mod connection;
pub mod metrics;
pub mod pool;
pub mod server;


pub use client::FlowClient;
pub use connection::{write_frame, Connection, FrameReader};
pub use metrics::{ServerStats, ServerStatsSnapshot};
pub use pool::{ConnectionPool, PoolMembership, PoolStats};
pub use server::{FlowSocketServer, TransportStats};
