//! Component directory
//!
//! Thread-safe table of known peer components and their health.

use flow_types::{ComponentId, ComponentStatus, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};

/// What the registry knows about one peer component
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub id: ComponentId,
    /// Socket the component serves on; `None` when it was learned from an
    /// inbound registration only
    pub socket_path: Option<PathBuf>,
    pub pid: Option<u32>,
    pub status: ComponentStatus,
    pub last_heartbeat: Instant,
    pub capabilities: Vec<String>,
    /// Set when the component was marked failed
    pub unhealthy_since: Option<Instant>,
}

impl ComponentInfo {
    /// A running component with a fresh heartbeat
    pub fn running(id: ComponentId, socket_path: Option<PathBuf>) -> Self {
        Self {
            id,
            socket_path,
            pid: None,
            status: ComponentStatus::Running,
            last_heartbeat: Instant::now(),
            capabilities: Vec::new(),
            unhealthy_since: None,
        }
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn heartbeat_age(&self) -> Duration {
        self.last_heartbeat.elapsed()
    }

    /// Running with a heartbeat no older than `timeout`
    pub fn is_available(&self, timeout: Duration) -> bool {
        self.status == ComponentStatus::Running && self.heartbeat_age() <= timeout
    }
}

/// Socket artifact of a component dropped for staying unhealthy
#[derive(Debug, Clone, PartialEq, Eq)]
struct Retired {
    socket_path: PathBuf,
    modified: Option<SystemTime>,
}

/// Known components keyed by id
#[derive(Debug, Default)]
pub struct ComponentDirectory {
    components: RwLock<HashMap<ComponentId, ComponentInfo>>,
    retired: RwLock<HashMap<ComponentId, Retired>>,
}

impl ComponentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a component record
    pub fn register(&self, info: ComponentInfo) {
        info!("📋 Component registered: {} ({})", info.id, info.status);
        self.retired.write().remove(&info.id);
        self.components.write().insert(info.id, info);
    }

    /// Mark a component running with a fresh heartbeat, creating it if needed.
    ///
    /// A known socket path is kept when the new one is `None`.
    pub fn register_running(&self, id: ComponentId, socket_path: Option<PathBuf>) {
        self.retired.write().remove(&id);
        let mut components = self.components.write();
        match components.get_mut(&id) {
            Some(info) => {
                if socket_path.is_some() {
                    info.socket_path = socket_path;
                }
                revive(info);
            }
            None => {
                info!("📋 Component registered: {} (running)", id);
                components.insert(id, ComponentInfo::running(id, socket_path));
            }
        }
    }

    /// Refresh a component's heartbeat. A failed component that heartbeats
    /// again is restarted. Returns `false` for unknown components.
    pub fn update_heartbeat(&self, id: ComponentId) -> bool {
        match self.components.write().get_mut(&id) {
            Some(info) => {
                revive(info);
                true
            }
            None => false,
        }
    }

    /// Mark a component failed, recording when it became unhealthy
    pub fn mark_failed(&self, id: ComponentId) -> bool {
        match self.components.write().get_mut(&id) {
            Some(info) => {
                if info.status != ComponentStatus::Failed {
                    warn!("💔 Component {} marked failed", id);
                    info.status = ComponentStatus::Failed;
                    info.unhealthy_since = Some(Instant::now());
                }
                true
            }
            None => false,
        }
    }

    /// Apply a lifecycle transition. Returns `Ok(false)` for unknown components.
    pub fn set_status(&self, id: ComponentId, status: ComponentStatus) -> Result<bool> {
        let mut components = self.components.write();
        let Some(info) = components.get_mut(&id) else {
            return Ok(false);
        };

        info.status = info.status.transition(status)?;
        if status == ComponentStatus::Failed {
            info.unhealthy_since.get_or_insert_with(Instant::now);
        } else {
            info.unhealthy_since = None;
        }
        debug!("Component {} → {}", id, status);
        Ok(true)
    }

    pub fn get(&self, id: ComponentId) -> Option<ComponentInfo> {
        self.components.read().get(&id).cloned()
    }

    /// All components ordered by id
    pub fn list(&self) -> Vec<ComponentInfo> {
        let mut all: Vec<_> = self.components.read().values().cloned().collect();
        all.sort_by_key(|info| info.id);
        all
    }

    /// Ids of components currently in the running state
    pub fn running_components(&self) -> Vec<ComponentId> {
        let mut ids: Vec<_> = self
            .components
            .read()
            .values()
            .filter(|info| info.status == ComponentStatus::Running)
            .map(|info| info.id)
            .collect();
        ids.sort();
        ids
    }

    pub fn deregister(&self, id: ComponentId) -> Option<ComponentInfo> {
        let removed = self.components.write().remove(&id);
        if removed.is_some() {
            info!("🗑️ Component deregistered: {}", id);
        }
        removed
    }

    /// Running and heartbeat no older than `timeout`
    pub fn is_available(&self, id: ComponentId, timeout: Duration) -> bool {
        self.components
            .read()
            .get(&id)
            .map(|info| info.is_available(timeout))
            .unwrap_or(false)
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.components.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.components.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.read().is_empty()
    }

    /// Remember the socket artifact of a component dropped for silence.
    ///
    /// Directory scans skip it until the artifact changes or the component
    /// registers again.
    pub fn retire(&self, id: ComponentId, socket_path: PathBuf, modified: Option<SystemTime>) {
        debug!("Retiring {} at {:?}", id, socket_path);
        self.retired.write().insert(id, Retired { socket_path, modified });
    }

    /// Whether `socket_path` with modification time `modified` is the
    /// artifact left by a retired component
    pub fn is_retired(&self, id: ComponentId, socket_path: &Path, modified: Option<SystemTime>) -> bool {
        self.retired
            .read()
            .get(&id)
            .map(|retired| retired.socket_path == socket_path && retired.modified == modified)
            .unwrap_or(false)
    }

    /// Apply `f` to every record under one write lock
    pub(crate) fn retain_mut<F>(&self, mut f: F)
    where
        F: FnMut(&mut ComponentInfo) -> bool,
    {
        self.components.write().retain(|_, info| f(info));
    }
}

/// Fresh heartbeat, walking a failed or stopped component back to running
fn revive(info: &mut ComponentInfo) {
    info.last_heartbeat = Instant::now();
    if info.status == ComponentStatus::Running {
        return;
    }

    if matches!(info.status, ComponentStatus::Failed | ComponentStatus::Stopped) {
        info.status = ComponentStatus::Starting;
    }
    if info.status.can_transition_to(ComponentStatus::Running) {
        info!("💚 Component {} running again", info.id);
        info.status = ComponentStatus::Running;
        info.unhealthy_since = None;
    }
}
