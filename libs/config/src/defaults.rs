//! Default configuration values
//!
//! Shared by the serde defaults in [`crate::settings`] so every section can be
//! omitted from a configuration file.

/// Exact registry defaults
pub mod registry {
    /// Initial slot count (rounded up to a power of two)
    pub const INITIAL_CAPACITY: usize = 1024;

    /// Resize once (live + tombstones) / capacity would exceed this
    pub const MAX_LOAD_FACTOR: f64 = 0.75;
}

/// Pre-filter bank defaults
pub mod prefilter {
    /// Design capacity of each bloom filter
    pub const EXPECTED_ENTRIES: usize = 1_000_000;

    /// Target false-positive rate per filter
    pub const FALSE_POSITIVE_RATE: f64 = 0.01;

    /// Filters kept before the oldest is dropped
    pub const MAX_FILTERS: usize = 4;
}

/// Flow cache defaults
pub mod cache {
    pub const MAX_ENTRIES: usize = 100_000;

    /// 64MB
    pub const MAX_MEMORY_BYTES: usize = 64 * 1024 * 1024;

    /// Smallest accepted memory limit; one cached flow record must fit
    pub const MIN_MEMORY_BYTES: usize = 4 * 1024;

    /// Expired-entry sweep interval (milliseconds)
    pub const SWEEP_INTERVAL_MS: u64 = 1_000;
}

/// Transport server defaults
pub mod transport {
    pub const SOCKET_PATH: &str = "/tmp/flow_registry/transport.sock";

    /// Accept workers
    pub const WORKER_COUNT: usize = 4;

    /// Per-connection receive timeout (milliseconds)
    pub const IO_TIMEOUT_MS: u64 = 30_000;

    /// Connections silent for longer than this are reclaimed (milliseconds)
    pub const HEARTBEAT_TIMEOUT_MS: u64 = 30_000;

    /// Stale connection sweep interval (milliseconds)
    pub const SWEEP_INTERVAL_MS: u64 = 5_000;

    /// 64KB
    pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

    /// Must hold one header plus the largest payload
    pub const RECEIVE_BUFFER_SIZE: usize = 72 * 1024;

    /// Owner read/write only
    pub const SOCKET_PERMISSIONS: u32 = 0o600;
}

/// Discovery defaults
pub mod discovery {
    pub const SOCKET_DIR: &str = "/tmp/flow_registry";

    pub const SCAN_INTERVAL_MS: u64 = 1_000;

    pub const HEARTBEAT_TIMEOUT_MS: u64 = 10_000;

    /// Unhealthy components are deregistered after this many heartbeat timeouts
    pub const DEREGISTER_MULTIPLIER: u32 = 3;
}

/// Metrics defaults
pub mod metrics {
    /// Consolidated report interval (milliseconds)
    pub const REPORT_INTERVAL_MS: u64 = 60_000;
}

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "FLOW_REGISTRY";
