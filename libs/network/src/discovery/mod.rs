//! Peer Discovery and Health
//!
//! Components find each other through a shared socket directory: every
//! component serves on `<name>.sock` inside it. [`DiscoveryService`] polls the
//! directory, records peers in a [`ComponentDirectory`], and fails or
//! deregisters peers whose heartbeats stop.
//!
//! ```text
//! socket_dir/
//! ├── transport.sock      ← local component (skipped)
//! ├── consensus.sock      → ComponentId::Consensus
//! ├── scheduler.sock      → ComponentId::Scheduler
//! └── dashboard.sock      ← unrecognized (skipped)
//! ```

pub mod directory;
pub mod service;

pub use directory::{ComponentDirectory, ComponentInfo};
pub use service::{DiscoveryService, HealthReport};
