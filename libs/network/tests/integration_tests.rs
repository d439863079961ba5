//! Socket servers, clients and discovery sharing one socket directory

use flow_config::{DiscoveryConfig, TransportConfig};
use flow_network::{ComponentDirectory, DiscoveryService, FlowClient, FlowSocketServer};
use flow_types::{ComponentId, ComponentStatus};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(2);

fn transport_config(dir: &Path, component: ComponentId) -> TransportConfig {
    TransportConfig {
        socket_path: dir.join(component.socket_file_name()),
        local_component: component,
        worker_count: 1,
        io_timeout_ms: 2_000,
        ..TransportConfig::default()
    }
}

fn discovery_config(dir: &Path, heartbeat_timeout_ms: u64) -> DiscoveryConfig {
    DiscoveryConfig {
        enabled: true,
        socket_dir: dir.to_path_buf(),
        scan_interval_ms: 20,
        heartbeat_timeout_ms,
    }
}

#[tokio::test]
async fn test_sibling_servers_discover_each_other() {
    let dir = tempdir().unwrap();

    let transport_dir = Arc::new(ComponentDirectory::new());
    let transport = FlowSocketServer::with_directory(
        transport_config(dir.path(), ComponentId::Transport),
        Arc::clone(&transport_dir),
    );
    let consensus = FlowSocketServer::new(transport_config(dir.path(), ComponentId::Consensus));
    transport.start().await.unwrap();
    consensus.start().await.unwrap();

    let discovery = DiscoveryService::new(
        discovery_config(dir.path(), 60_000),
        ComponentId::Transport,
        Arc::clone(&transport_dir),
    );
    assert_eq!(discovery.scan_once().await.unwrap(), 1);
    assert_eq!(discovery.scan_once().await.unwrap(), 0);

    let info = transport_dir.get(ComponentId::Consensus).unwrap();
    assert_eq!(info.status, ComponentStatus::Running);
    assert_eq!(
        info.socket_path.as_deref(),
        Some(dir.path().join("consensus.sock").as_path())
    );
    assert!(!transport_dir.contains(ComponentId::Transport));

    // Connected components show up in the discovery reply too
    let mut scheduler = FlowClient::connect(dir.path().join("transport.sock"), CLIENT_TIMEOUT)
        .await
        .unwrap();
    scheduler.register(ComponentId::Scheduler).await.unwrap();
    let mut running = scheduler.discover().await.unwrap();
    running.sort();
    assert_eq!(running, vec![ComponentId::Consensus, ComponentId::Scheduler]);

    consensus.stop().await.unwrap();
    transport.stop().await.unwrap();
}

#[tokio::test]
async fn test_silent_peer_fails_then_deregisters() {
    let dir = tempdir().unwrap();
    let directory = Arc::new(ComponentDirectory::new());
    let server = FlowSocketServer::with_directory(
        transport_config(dir.path(), ComponentId::Transport),
        Arc::clone(&directory),
    );
    server.start().await.unwrap();

    let discovery = DiscoveryService::new(
        discovery_config(dir.path(), 40),
        ComponentId::Transport,
        Arc::clone(&directory),
    );

    let mut networking = FlowClient::connect(dir.path().join("transport.sock"), CLIENT_TIMEOUT)
        .await
        .unwrap();
    networking.register(ComponentId::Networking).await.unwrap();
    assert!(discovery.check_health().failed.is_empty());

    tokio::time::sleep(Duration::from_millis(60)).await;
    let report = discovery.check_health();
    assert_eq!(report.failed, vec![ComponentId::Networking]);
    assert!(!directory.is_available(ComponentId::Networking, Duration::from_millis(40)));

    // A heartbeat brings it back
    networking.heartbeat().await.unwrap();
    assert_eq!(
        directory.get(ComponentId::Networking).unwrap().status,
        ComponentStatus::Running
    );
    assert!(directory.is_available(ComponentId::Networking, Duration::from_millis(40)));

    // Silence past three timeouts removes it entirely
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(discovery.check_health().failed, vec![ComponentId::Networking]);
    tokio::time::sleep(Duration::from_millis(200)).await;
    let report = discovery.check_health();
    assert_eq!(report.deregistered, vec![ComponentId::Networking]);
    assert!(!directory.contains(ComponentId::Networking));

    server.stop().await.unwrap();
}
