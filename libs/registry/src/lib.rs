//! # Flow Registry
//!
//! Local, single-host coordination layer: cooperating components register,
//! look up and exchange control messages about flows identified by a 32-byte
//! content key.
//!
//! ## Components
//!
//! - [`PreFilterBank`]: rotating bloom filters; a negative answer skips
//!   every other structure
//! - [`FlowCache`]: bounded LRU/LFU/FIFO/Random cache in front of the registry
//! - [`ExactRegistry`]: Robin Hood hash table holding every live record
//! - [`FlowSocketServer`](flow_network::FlowSocketServer) and
//!   [`DiscoveryService`](flow_network::DiscoveryService): framed Unix socket
//!   transport and peer health
//! - [`MetricsCollector`]: latency histograms and counters
//! - [`FlowRegistry`]: owns one of each and wires the paths together
//!
//! ## Usage
//!
//! ```rust,no_run
//! use flow_registry::{FlowRegistry, FlowRegistryConfig};
//! use flow_types::{ComponentId, FlowKey, FlowRecord, FlowType};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = FlowRegistry::new(FlowRegistryConfig::default())?;
//! registry.start().await?;
//!
//! let key = FlowKey::from_bytes(b"ingest/batch-42");
//! registry.register(FlowRecord::new(key, ComponentId::Transport, FlowType::DataTransfer, 4096, 2)?)?;
//! assert!(registry.lookup(&key).is_some());
//!
//! registry.coordinate(ComponentId::Scheduler, b"rebalance".to_vec()).await?;
//! registry.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod exact;
pub mod ffi;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod prefilter;

pub use cache::{CacheStats, FlowCache};
pub use error::{RegistryError, Result};
pub use exact::{ExactRegistry, RegistryStats, RobinHoodTable};
pub use logging::init_logging;
pub use metrics::{Histogram, MetricsCollector, MetricsReporter, PerformanceStats};
pub use orchestrator::{FlowRegistry, RegistryReport};
pub use prefilter::{AddOutcome, BloomFilter, PreFilterBank, PreFilterStats};

pub use flow_config::{EvictionPolicy, FlowRegistryConfig};
