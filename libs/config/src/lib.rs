//! # Flow Registry Configuration
//!
//! Typed configuration for every flow registry component, plus the default
//! values they fall back to.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use flow_config::FlowRegistryConfig;
//! use std::path::Path;
//!
//! let config = FlowRegistryConfig::load(Some(Path::new("flow_registry.toml")), Some("dev"))?;
//! println!("serving on {:?}", config.transport.socket_path);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod defaults;
pub mod error;
pub mod settings;

pub use error::ConfigError;
pub use settings::{
    CacheConfig, DiscoveryConfig, EvictionPolicy, FlowRegistryConfig, LoggingConfig,
    MetricsConfig, PreFilterConfig, RegistryConfig, TransportConfig,
};
