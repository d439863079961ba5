//! Flow Registry Network Infrastructure
//!
//! Connection pooling, the local socket server and client, and peer discovery
//! for the flow registry.
//!
//! ## Architecture Role
//!
//! ```text
//! flow-codec → [flow-network] → flow-registry
//!                   │
//!     ┌─────────────┼──────────────┐
//!     ↓             ↓              ↓
//! transports     discovery       error
//! server/client  directory scan  TransportError
//! pool           health checks
//! ```

pub mod discovery;
pub mod error;
pub mod transports;

// Re-export commonly used types
pub use discovery::{ComponentDirectory, ComponentInfo, DiscoveryService, HealthReport};
pub use error::{Result, TransportError};
pub use transports::{
    ConnectionPool, FlowClient, FlowSocketServer, PoolStats, ServerStatsSnapshot, TransportStats,
};
