//! Directory polling and heartbeat enforcement

use super::directory::{ComponentDirectory, ComponentInfo};
use crate::{Result, TransportError};
use flow_config::DiscoveryConfig;
use flow_types::{ComponentId, ComponentStatus};
use std::path::Path;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of one [`DiscoveryService::check_health`] pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    /// Newly marked failed
    pub failed: Vec<ComponentId>,
    /// Removed after staying unhealthy too long
    pub deregistered: Vec<ComponentId>,
}

/// Polls the socket directory and expires silent peers
pub struct DiscoveryService {
    config: DiscoveryConfig,
    local: ComponentId,
    directory: Arc<ComponentDirectory>,
    shutdown_tx: parking_lot::Mutex<Option<watch::Sender<bool>>>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl DiscoveryService {
    pub fn new(config: DiscoveryConfig, local: ComponentId, directory: Arc<ComponentDirectory>) -> Self {
        Self {
            config,
            local,
            directory,
            shutdown_tx: parking_lot::Mutex::new(None),
            task: tokio::sync::Mutex::new(None),
        }
    }

    pub fn directory(&self) -> &Arc<ComponentDirectory> {
        &self.directory
    }

    /// Scan the socket directory once, registering components seen for the
    /// first time. Returns how many were added.
    pub async fn scan_once(&self) -> Result<usize> {
        scan_directory(&self.config, self.local, &self.directory).await
    }

    /// Fail components with stale heartbeats; deregister those unhealthy for
    /// longer than the deregistration window
    pub fn check_health(&self) -> HealthReport {
        check_directory_health(&self.config, &self.directory)
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Spawn the polling task
    #[instrument(skip(self), fields(socket_dir = %self.config.socket_dir.display()))]
    pub async fn start(&self) -> Result<()> {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return Err(TransportError::AlreadyRunning {
                path: self.config.socket_dir.display().to_string(),
            });
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let config = self.config.clone();
        let local = self.local;
        let directory = Arc::clone(&self.directory);

        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.scan_interval());

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = interval.tick() => {
                        if let Err(e) = scan_directory(&config, local, &directory).await {
                            // Retried on the next tick
                            warn!("Discovery scan failed: {}", e);
                        }
                        let report = check_directory_health(&config, &directory);
                        if !report.failed.is_empty() || !report.deregistered.is_empty() {
                            debug!("Health check: {:?}", report);
                        }
                    }
                }
            }

            debug!("Discovery task exiting");
        }));
        *self.shutdown_tx.lock() = Some(shutdown_tx);

        info!("🔍 Discovery started (scan every {:?})", self.config.scan_interval());
        Ok(())
    }

    /// Signal the polling task and wait for it to exit
    pub async fn stop(&self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(true);
        }

        if let Some(handle) = self.task.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Discovery task panicked: {}", e);
            }
            info!("🔍 Discovery stopped");
        }
        Ok(())
    }
}

async fn scan_directory(
    config: &DiscoveryConfig,
    local: ComponentId,
    directory: &ComponentDirectory,
) -> Result<usize> {
    let mut entries = tokio::fs::read_dir(&config.socket_dir).await.map_err(|e| {
        TransportError::network_with_source(
            format!("Failed to read socket directory {:?}", config.socket_dir),
            e,
        )
    })?;

    let mut added = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("sock") {
            continue;
        }

        let Some(id) = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse::<ComponentId>().ok())
        else {
            debug!("Skipping unrecognized socket {:?}", path);
            continue;
        };

        if id == local || directory.contains(id) {
            continue;
        }

        if directory.is_retired(id, &path, modified_at(&path).await) {
            debug!("Skipping stale socket of retired component {} at {:?}", id, path);
            continue;
        }

        info!("🔍 Discovered component {} at {:?}", id, path);
        directory.register(ComponentInfo::running(id, Some(path)));
        added += 1;
    }

    Ok(added)
}

fn check_directory_health(config: &DiscoveryConfig, directory: &ComponentDirectory) -> HealthReport {
    let timeout = config.heartbeat_timeout();
    let deregister_after = config.deregister_after();
    let now = Instant::now();
    let mut report = HealthReport::default();
    let mut retired = Vec::new();

    directory.retain_mut(|info| {
        if info.status != ComponentStatus::Failed && info.heartbeat_age() > timeout {
            warn!(
                "💔 Component {} missed heartbeats for {:?}, marking failed",
                info.id,
                info.heartbeat_age()
            );
            info.status = ComponentStatus::Failed;
            info.unhealthy_since = Some(now);
            report.failed.push(info.id);
        }

        match info.unhealthy_since {
            Some(since) if now.duration_since(since) > deregister_after => {
                info!("🗑️ Deregistering component {} (unhealthy since {:?} ago)", info.id, since.elapsed());
                report.deregistered.push(info.id);
                let socket_path = info
                    .socket_path
                    .clone()
                    .unwrap_or_else(|| config.socket_dir.join(info.id.socket_file_name()));
                retired.push((info.id, socket_path));
                false
            }
            _ => true,
        }
    });

    for (id, socket_path) in retired {
        let modified = std::fs::metadata(&socket_path)
            .and_then(|meta| meta.modified())
            .ok();
        directory.retire(id, socket_path, modified);
    }

    report.failed.sort();
    report.deregistered.sort();
    report
}

async fn modified_at(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path)
        .await
        .and_then(|meta| meta.modified())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn config(dir: &std::path::Path, timeout_ms: u64) -> DiscoveryConfig {
        DiscoveryConfig {
            enabled: true,
            socket_dir: dir.to_path_buf(),
            scan_interval_ms: 10,
            heartbeat_timeout_ms: timeout_ms,
        }
    }

    #[tokio::test]
    async fn test_scan_registers_recognized_sockets() {
        let dir = tempdir().unwrap();
        for name in ["consensus.sock", "scheduler.sock", "transport.sock", "dashboard.sock", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let directory = Arc::new(ComponentDirectory::new());
        let service = DiscoveryService::new(config(dir.path(), 1000), ComponentId::Transport, directory.clone());

        assert_eq!(service.scan_once().await.unwrap(), 2);
        assert_eq!(
            directory.running_components(),
            vec![ComponentId::Consensus, ComponentId::Scheduler]
        );
        assert!(!directory.contains(ComponentId::Transport));
        assert_eq!(
            directory.get(ComponentId::Consensus).unwrap().socket_path,
            Some(dir.path().join("consensus.sock"))
        );

        // Already known
        assert_eq!(service.scan_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_scan_missing_directory_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        let service = DiscoveryService::new(
            config(&missing, 1000),
            ComponentId::Transport,
            Arc::new(ComponentDirectory::new()),
        );
        assert!(service.scan_once().await.is_err());
    }

    #[tokio::test]
    async fn test_health_check_fails_then_deregisters() {
        let dir = tempdir().unwrap();
        let directory = Arc::new(ComponentDirectory::new());
        let service = DiscoveryService::new(config(dir.path(), 20), ComponentId::Transport, directory.clone());

        directory.register_running(ComponentId::Security, None);
        assert_eq!(service.check_health(), HealthReport::default());

        tokio::time::sleep(Duration::from_millis(30)).await;
        let report = service.check_health();
        assert_eq!(report.failed, vec![ComponentId::Security]);
        assert!(report.deregistered.is_empty());
        assert_eq!(
            directory.get(ComponentId::Security).unwrap().status,
            ComponentStatus::Failed
        );

        // Deregistered after 3x the heartbeat timeout
        tokio::time::sleep(Duration::from_millis(70)).await;
        let report = service.check_health();
        assert!(report.failed.is_empty());
        assert_eq!(report.deregistered, vec![ComponentId::Security]);
        assert!(directory.is_empty());
    }

    #[tokio::test]
    async fn test_deregistered_socket_not_rediscovered() {
        let dir = tempdir().unwrap();
        let socket = dir.path().join("consensus.sock");
        std::fs::write(&socket, b"").unwrap();

        let directory = Arc::new(ComponentDirectory::new());
        let service = DiscoveryService::new(config(dir.path(), 20), ComponentId::Transport, directory.clone());
        assert_eq!(service.scan_once().await.unwrap(), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(service.check_health().failed, vec![ComponentId::Consensus]);
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(service.check_health().deregistered, vec![ComponentId::Consensus]);

        // The stale socket file stays behind
        assert_eq!(service.scan_once().await.unwrap(), 0);
        assert!(!directory.contains(ComponentId::Consensus));
        assert!(!directory.is_available(ComponentId::Consensus, Duration::from_secs(1)));

        // A restarted peer recreates its socket
        std::fs::remove_file(&socket).unwrap();
        std::fs::write(&socket, b"").unwrap();
        let recreated = std::fs::OpenOptions::new().write(true).open(&socket).unwrap();
        recreated
            .set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();
        assert_eq!(service.scan_once().await.unwrap(), 1);
        assert!(directory.is_available(ComponentId::Consensus, Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_deregistered_component_returns_on_registration() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("security.sock"), b"").unwrap();

        let directory = Arc::new(ComponentDirectory::new());
        let service = DiscoveryService::new(config(dir.path(), 20), ComponentId::Transport, directory.clone());
        service.scan_once().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        service.check_health();
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(service.check_health().deregistered, vec![ComponentId::Security]);

        directory.register_running(ComponentId::Security, None);
        assert!(directory.is_available(ComponentId::Security, Duration::from_secs(1)));
        directory.deregister(ComponentId::Security);
        assert_eq!(service.scan_once().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_polling_task_start_stop() {
        let dir = tempdir().unwrap();
        let directory = Arc::new(ComponentDirectory::new());
        let service = DiscoveryService::new(config(dir.path(), 1000), ComponentId::Transport, directory.clone());

        service.start().await.unwrap();
        assert!(service.start().await.is_err());
        assert!(service.is_running().await);

        std::fs::write(dir.path().join("container.sock"), b"").unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while !directory.contains(ComponentId::Container) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(directory.contains(ComponentId::Container));

        service.stop().await.unwrap();
        assert!(!service.is_running().await);
        // Restartable
        service.start().await.unwrap();
        service.stop().await.unwrap();
    }
}
