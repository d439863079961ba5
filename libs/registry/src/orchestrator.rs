//! Flow Registry Orchestrator
//!
//! Owns one of each component and wires the lookup and registration paths
//! through them:
//!
//! ```text
//! lookup:    pre-filter ──negative──▶ miss
//!                │
//!                ▼
//!              cache ──hit──▶ record
//!                │
//!                ▼
//!          exact registry ──hit──▶ populate cache ▶ record
//!
//! register:  exact registry ▶ pre-filter ▶ cache
//! coordinate: directory availability ▶ socket server send
//! ```
//!
//! Each component keeps its own lock; registration is not transactional
//! across them, so a concurrent lookup may observe a record in the registry
//! before it reaches the cache.

use crate::cache::{CacheStats, FlowCache};
use crate::exact::{ExactRegistry, RegistryStats};
use crate::metrics::{MetricsCollector, MetricsReporter, PerformanceStats};
use crate::prefilter::{PreFilterBank, PreFilterStats};
use crate::{RegistryError, Result};
use bytes::Bytes;
use flow_codec::MessageType;
use flow_config::FlowRegistryConfig;
use flow_network::{ComponentDirectory, DiscoveryService, FlowSocketServer, TransportStats};
use flow_types::{ComponentId, FlowKey, FlowRecord};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Every component's statistics in one serializable document
#[derive(Debug, Clone, Serialize)]
pub struct RegistryReport {
    pub performance: PerformanceStats,
    pub registry: RegistryStats,
    pub prefilter: PreFilterStats,
    pub cache: CacheStats,
    pub transport: TransportStats,
    pub healthy: bool,
}

/// Local flow registry: lookup, registration and component coordination
pub struct FlowRegistry {
    config: FlowRegistryConfig,
    registry: ExactRegistry,
    prefilter: RwLock<PreFilterBank>,
    cache: Arc<Mutex<FlowCache<FlowRecord>>>,
    directory: Arc<ComponentDirectory>,
    server: FlowSocketServer,
    discovery: DiscoveryService,
    metrics: Arc<MetricsCollector>,
    reporter: MetricsReporter,
    maintenance_tx: Mutex<Option<watch::Sender<bool>>>,
    maintenance: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
}

impl FlowRegistry {
    /// Build every component from a validated configuration
    pub fn new(config: FlowRegistryConfig) -> Result<Self> {
        config.validate()?;

        let directory = Arc::new(ComponentDirectory::new());
        let metrics = Arc::new(MetricsCollector::new());

        Ok(Self {
            registry: ExactRegistry::new(&config.registry),
            prefilter: RwLock::new(PreFilterBank::new(&config.prefilter)),
            cache: Arc::new(Mutex::new(FlowCache::new(&config.cache))),
            server: FlowSocketServer::with_directory(
                config.transport.clone(),
                Arc::clone(&directory),
            ),
            discovery: DiscoveryService::new(
                config.discovery.clone(),
                config.transport.local_component,
                Arc::clone(&directory),
            ),
            reporter: MetricsReporter::new(Arc::clone(&metrics), config.metrics.report_interval()),
            directory,
            metrics,
            maintenance_tx: Mutex::new(None),
            maintenance: tokio::sync::Mutex::new(None),
            running: AtomicBool::new(false),
            config,
        })
    }

    pub fn config(&self) -> &FlowRegistryConfig {
        &self.config
    }

    pub fn directory(&self) -> &Arc<ComponentDirectory> {
        &self.directory
    }

    pub fn server(&self) -> &FlowSocketServer {
        &self.server
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start the metrics reporter, socket server, discovery and cache
    /// maintenance, in that order
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(RegistryError::AlreadyRunning("flow registry"));
        }

        if let Err(e) = self.start_components().await {
            error!("❌ Flow registry failed to start: {}", e);
            self.stop_components().await;
            self.running.store(false, Ordering::Release);
            return Err(e);
        }

        info!(
            "✅ Flow registry started as {} on {:?}",
            self.config.transport.local_component, self.config.transport.socket_path
        );
        Ok(())
    }

    async fn start_components(&self) -> Result<()> {
        if self.config.metrics.enabled {
            self.reporter.start().await?;
        }
        self.server.start().await?;
        if self.config.discovery.enabled {
            self.discovery.start().await?;
        }
        self.start_maintenance().await;
        Ok(())
    }

    /// Stop every component in reverse start order
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        self.stop_components().await;
        info!("🛑 Flow registry stopped");
        Ok(())
    }

    /// Best effort: a failing component does not keep the others running
    async fn stop_components(&self) {
        self.stop_maintenance().await;
        if let Err(e) = self.discovery.stop().await {
            warn!("Discovery stop failed: {}", e);
        }
        if let Err(e) = self.server.stop().await {
            warn!("Socket server stop failed: {}", e);
        }
        if let Err(e) = self.reporter.stop().await {
            warn!("Metrics reporter stop failed: {}", e);
        }
    }

    async fn start_maintenance(&self) {
        let mut task = self.maintenance.lock().await;
        if task.is_some() {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let cache = Arc::clone(&self.cache);
        let period = self.config.cache.sweep_interval();

        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = interval.tick() => {
                        let expired = cache.lock().sweep_expired();
                        if expired > 0 {
                            debug!("Swept {} expired cache entries", expired);
                        }
                    }
                }
            }
        }));
        *self.maintenance_tx.lock() = Some(shutdown_tx);
    }

    async fn stop_maintenance(&self) {
        if let Some(tx) = self.maintenance_tx.lock().take() {
            let _ = tx.send(true);
        }
        if let Some(handle) = self.maintenance.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Cache maintenance task panicked: {}", e);
            }
        }
    }

    /// Find the record registered under `key`
    pub fn lookup(&self, key: &FlowKey) -> Option<FlowRecord> {
        let started = Instant::now();

        if !self.prefilter.read().contains(key) {
            self.metrics.record_prefilter_rejection(started.elapsed());
            return None;
        }

        // Held across the registry read so a concurrent register/unregister
        // reaches the cache only after this fill
        let mut cache = self.cache.lock();
        if let Some(record) = cache.get(key).copied() {
            drop(cache);
            self.metrics.record_lookup(started.elapsed(), true);
            return Some(record);
        }

        let found = self.registry.find(key);
        if let Some(record) = found {
            cache.put(*key, record);
        }
        drop(cache);

        self.metrics.record_lookup(started.elapsed(), found.is_some());
        found
    }

    /// Register (or overwrite) a flow: registry, then pre-filter, then cache
    pub fn register(&self, record: FlowRecord) -> Result<()> {
        let started = Instant::now();
        record.validate()?;

        self.registry.insert(record);

        {
            let mut bank = self.prefilter.write();
            let outcome = bank.add(&record.key);
            if outcome.dropped {
                // The dropped filter may have been the only one holding live keys
                let keys = self.registry.keys();
                bank.rebuild(&keys);
                debug!("Pre-filter rebuilt from {} registry keys", keys.len());
            }
        }

        self.cache.lock().put(record.key, record);
        self.metrics.record_registration(started.elapsed());
        Ok(())
    }

    /// Remove a flow from the registry and cache.
    ///
    /// The pre-filter keeps the key; later lookups fall through to a registry
    /// miss.
    pub fn unregister(&self, key: &FlowKey) -> Option<FlowRecord> {
        let removed = self.registry.remove(key);
        self.cache.lock().remove(key);
        removed
    }

    /// Send a command frame to a running component
    pub async fn coordinate(&self, component: ComponentId, payload: impl Into<Bytes>) -> Result<()> {
        let started = Instant::now();

        if !self
            .directory
            .is_available(component, self.config.discovery.heartbeat_timeout())
        {
            self.metrics.record_coordination(started.elapsed(), false);
            return Err(RegistryError::unknown_destination(
                component,
                "not registered or unhealthy",
            ));
        }

        let sent = self
            .server
            .send(component, MessageType::Command, payload)
            .await;
        self.metrics.record_coordination(started.elapsed(), sent.is_ok());

        match sent {
            Ok(sequence) => {
                debug!("Coordinated with {} (seq={})", component, sequence);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drop expired cache entries now rather than waiting for maintenance
    pub fn sweep_expired(&self) -> usize {
        self.cache.lock().sweep_expired()
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        self.metrics.snapshot()
    }

    pub fn report(&self) -> RegistryReport {
        RegistryReport {
            performance: self.metrics.snapshot(),
            registry: self.registry.stats(),
            prefilter: self.prefilter.read().stats(),
            cache: self.cache.lock().stats(),
            transport: self.server.stats(),
            healthy: self.health(),
        }
    }

    pub fn registry_stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    pub fn prefilter_stats(&self) -> PreFilterStats {
        self.prefilter.read().stats()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Socket server, registry and cache are all healthy
    pub fn health(&self) -> bool {
        self.server.is_healthy() && self.registry.is_healthy() && self.cache.lock().is_healthy()
    }
}
