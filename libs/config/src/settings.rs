//! Flow Registry Configuration
//!
//! Provides configuration loading for the flow registry. Values are layered:
//!
//! 1. Built-in defaults (see [`crate::defaults`])
//! 2. A TOML file
//! 3. An optional `config/environments/<env>.toml` override
//! 4. `FLOW_REGISTRY__<SECTION>__<FIELD>` environment variables

use crate::defaults;
use crate::error::ConfigError;
use anyhow::{Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use flow_types::ComponentId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cache eviction discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Least recently used (list tail)
    #[default]
    Lru,
    /// Least frequently used (full scan)
    Lfu,
    /// Oldest insertion (list tail, no reordering on access)
    Fifo,
    /// Uniformly random live entry
    Random,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowRegistryConfig {
    pub registry: RegistryConfig,
    pub prefilter: PreFilterConfig,
    pub cache: CacheConfig,
    pub transport: TransportConfig,
    pub discovery: DiscoveryConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// Exact registry (Robin-Hood table) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub initial_capacity: usize,
    pub max_load_factor: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            initial_capacity: defaults::registry::INITIAL_CAPACITY,
            max_load_factor: defaults::registry::MAX_LOAD_FACTOR,
        }
    }
}

/// Pre-filter bank settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreFilterConfig {
    pub expected_entries: usize,
    pub false_positive_rate: f64,
    pub max_filters: usize,
}

impl Default for PreFilterConfig {
    fn default() -> Self {
        Self {
            expected_entries: defaults::prefilter::EXPECTED_ENTRIES,
            false_positive_rate: defaults::prefilter::FALSE_POSITIVE_RATE,
            max_filters: defaults::prefilter::MAX_FILTERS,
        }
    }
}

/// Flow cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub max_memory_bytes: usize,
    /// Entry time-to-live; `None` disables expiry
    pub ttl_ms: Option<u64>,
    pub policy: EvictionPolicy,
    pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: defaults::cache::MAX_ENTRIES,
            max_memory_bytes: defaults::cache::MAX_MEMORY_BYTES,
            ttl_ms: None,
            policy: EvictionPolicy::default(),
            sweep_interval_ms: defaults::cache::SWEEP_INTERVAL_MS,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

/// Local socket server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub socket_path: PathBuf,
    /// Component this process acts as; stamped on outgoing frames
    pub local_component: ComponentId,
    pub worker_count: usize,
    pub io_timeout_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub sweep_interval_ms: u64,
    pub receive_buffer_size: usize,
    pub max_payload_size: usize,
    pub socket_permissions: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(defaults::transport::SOCKET_PATH),
            local_component: ComponentId::Transport,
            worker_count: defaults::transport::WORKER_COUNT,
            io_timeout_ms: defaults::transport::IO_TIMEOUT_MS,
            heartbeat_timeout_ms: defaults::transport::HEARTBEAT_TIMEOUT_MS,
            sweep_interval_ms: defaults::transport::SWEEP_INTERVAL_MS,
            receive_buffer_size: defaults::transport::RECEIVE_BUFFER_SIZE,
            max_payload_size: defaults::transport::MAX_PAYLOAD_SIZE,
            socket_permissions: defaults::transport::SOCKET_PERMISSIONS,
        }
    }
}

impl TransportConfig {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

/// Peer discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    pub socket_dir: PathBuf,
    pub scan_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            socket_dir: PathBuf::from(defaults::discovery::SOCKET_DIR),
            scan_interval_ms: defaults::discovery::SCAN_INTERVAL_MS,
            heartbeat_timeout_ms: defaults::discovery::HEARTBEAT_TIMEOUT_MS,
        }
    }
}

impl DiscoveryConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    /// How long a component may stay unhealthy before it is deregistered
    pub fn deregister_after(&self) -> Duration {
        self.heartbeat_timeout() * defaults::discovery::DEREGISTER_MULTIPLIER
    }
}

/// Metrics reporting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub report_interval_ms: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            report_interval_ms: defaults::metrics::REPORT_INTERVAL_MS,
        }
    }
}

impl MetricsConfig {
    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. "info" or "flow_network=debug"
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl FlowRegistryConfig {
    /// Load configuration from files with environment overrides
    pub fn load(base_path: Option<&Path>, environment: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(base) = base_path {
            debug!("Loading base config: {:?}", base);
            builder = builder.add_source(File::from(base).required(true));
        }

        // Add environment-specific overrides if specified
        if let Some(env) = environment {
            let env_file = PathBuf::from("config/environments").join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        // Override with environment variables (FLOW_REGISTRY__SECTION__FIELD)
        builder = builder.add_source(
            Environment::with_prefix(defaults::ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let mut settings: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        settings.expand_paths()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse an inline TOML document (no file or environment layering)
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .context("Failed to parse TOML configuration")?;

        let mut settings: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        settings.expand_paths()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Expand environment variables in socket paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.transport.socket_path = expand_path(&self.transport.socket_path)
            .context("Failed to expand transport socket path")?;
        self.discovery.socket_dir = expand_path(&self.discovery.socket_dir)
            .context("Failed to expand discovery socket directory")?;
        Ok(())
    }

    /// Reject sizes, rates and paths the components cannot work with
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.registry.initial_capacity == 0 {
            return Err(ConfigError::invalid("registry.initial_capacity", "must be greater than 0"));
        }
        if !(self.registry.max_load_factor > 0.0 && self.registry.max_load_factor < 1.0) {
            return Err(ConfigError::invalid(
                "registry.max_load_factor",
                format!("{} is outside (0, 1)", self.registry.max_load_factor),
            ));
        }

        if self.prefilter.expected_entries == 0 {
            return Err(ConfigError::invalid("prefilter.expected_entries", "must be greater than 0"));
        }
        if !(self.prefilter.false_positive_rate > 0.0 && self.prefilter.false_positive_rate < 1.0) {
            return Err(ConfigError::invalid(
                "prefilter.false_positive_rate",
                format!("{} is outside (0, 1)", self.prefilter.false_positive_rate),
            ));
        }
        if self.prefilter.max_filters == 0 {
            return Err(ConfigError::invalid("prefilter.max_filters", "must be at least 1"));
        }

        if self.cache.max_entries == 0 {
            return Err(ConfigError::invalid("cache.max_entries", "must be greater than 0"));
        }
        if self.cache.max_memory_bytes < defaults::cache::MIN_MEMORY_BYTES {
            return Err(ConfigError::invalid(
                "cache.max_memory_bytes",
                format!(
                    "{} is below the minimum of {} bytes",
                    self.cache.max_memory_bytes,
                    defaults::cache::MIN_MEMORY_BYTES
                ),
            ));
        }
        if self.cache.ttl_ms == Some(0) {
            return Err(ConfigError::invalid("cache.ttl_ms", "use no value to disable expiry"));
        }
        if self.cache.sweep_interval_ms == 0 {
            return Err(ConfigError::invalid("cache.sweep_interval_ms", "must be greater than 0"));
        }

        self.validate_transport()?;

        if self.discovery.enabled {
            if self.discovery.socket_dir.as_os_str().is_empty() {
                return Err(ConfigError::invalid("discovery.socket_dir", "must not be empty"));
            }
            if self.discovery.scan_interval_ms == 0 || self.discovery.heartbeat_timeout_ms == 0 {
                return Err(ConfigError::invalid(
                    "discovery",
                    "scan_interval_ms and heartbeat_timeout_ms must be greater than 0",
                ));
            }
        }

        if self.metrics.enabled && self.metrics.report_interval_ms == 0 {
            return Err(ConfigError::invalid("metrics.report_interval_ms", "must be greater than 0"));
        }

        Ok(())
    }

    fn validate_transport(&self) -> std::result::Result<(), ConfigError> {
        let transport = &self.transport;

        if transport.socket_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("transport.socket_path", "must not be empty"));
        }
        if transport.socket_path.file_name().is_none() {
            return Err(ConfigError::invalid(
                "transport.socket_path",
                format!("{:?} does not name a file", transport.socket_path),
            ));
        }
        // sockaddr_un.sun_path is 108 bytes including the terminator
        if transport.socket_path.as_os_str().len() >= 108 {
            return Err(ConfigError::invalid(
                "transport.socket_path",
                "path exceeds the 107-byte Unix socket limit",
            ));
        }
        if transport.worker_count == 0 {
            return Err(ConfigError::invalid("transport.worker_count", "must be at least 1"));
        }
        if transport.io_timeout_ms == 0
            || transport.heartbeat_timeout_ms == 0
            || transport.sweep_interval_ms == 0
        {
            return Err(ConfigError::invalid(
                "transport",
                "io_timeout_ms, heartbeat_timeout_ms and sweep_interval_ms must be greater than 0",
            ));
        }
        if transport.max_payload_size == 0 || transport.max_payload_size > u32::MAX as usize {
            return Err(ConfigError::invalid(
                "transport.max_payload_size",
                "must be between 1 and u32::MAX",
            ));
        }
        if transport.receive_buffer_size < transport.max_payload_size + flow_codec::HEADER_SIZE {
            return Err(ConfigError::invalid(
                "transport.receive_buffer_size",
                format!(
                    "{} cannot hold a {}-byte header plus a {}-byte payload",
                    transport.receive_buffer_size,
                    flow_codec::HEADER_SIZE,
                    transport.max_payload_size
                ),
            ));
        }
        if transport.socket_permissions > 0o777 {
            return Err(ConfigError::invalid(
                "transport.socket_permissions",
                format!("{:o} is not a permission mode", transport.socket_permissions),
            ));
        }

        Ok(())
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::env(&raw).context("Failed to expand environment variables")?;
    Ok(PathBuf::from(expanded.as_ref()))
}
