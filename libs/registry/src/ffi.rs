//! C Bindings
//!
//! C-compatible surface over [`FlowRegistry`]. Each handle owns its own tokio
//! runtime; async operations are driven with `block_on`, so none of these
//! functions may be called from inside a tokio runtime.

use crate::{FlowRegistry, RegistryError};
use flow_config::FlowRegistryConfig;
use flow_network::TransportError;
use flow_types::{current_timestamp_ns, ComponentId, FlowKey, FlowRecord, FlowType, TypeError};
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::ptr;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::error;

/// Opaque handle to a flow registry and its runtime
pub struct FlowRegistryHandle {
    registry: FlowRegistry,
    runtime: Arc<Runtime>,
}

/// C-compatible result codes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowRegistryResult {
    Success = 0,
    InvalidArgument = 1,
    NotFound = 2,
    UnknownDestination = 3,
    TransportError = 4,
    ConfigError = 5,
    AlreadyRunning = 6,
    NotRunning = 7,
    InternalError = 99,
}

impl From<&RegistryError> for FlowRegistryResult {
    fn from(error: &RegistryError) -> Self {
        if error.is_unknown_destination() {
            return Self::UnknownDestination;
        }
        match error {
            RegistryError::InvalidRecord(_) => Self::InvalidArgument,
            RegistryError::Config(_) | RegistryError::ConfigLoad { .. } => Self::ConfigError,
            RegistryError::AlreadyRunning(_)
            | RegistryError::Transport(TransportError::AlreadyRunning { .. }) => {
                Self::AlreadyRunning
            }
            RegistryError::NotRunning | RegistryError::Transport(TransportError::NotRunning) => {
                Self::NotRunning
            }
            RegistryError::Transport(_) => Self::TransportError,
            _ => Self::InternalError,
        }
    }
}

/// C-compatible flow record
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowRecordC {
    pub key: [u8; 32],
    /// Component code, 1-7
    pub component: u32,
    pub flow_type: u8,
    /// 0-7
    pub priority: u8,
    /// Nanoseconds since the Unix epoch; 0 stamps the current time
    pub timestamp_ns: u64,
    pub size: u64,
}

impl From<&FlowRecord> for FlowRecordC {
    fn from(record: &FlowRecord) -> Self {
        Self {
            key: *record.key.as_bytes(),
            component: record.component.code(),
            flow_type: record.flow_type as u8,
            priority: record.priority,
            timestamp_ns: record.timestamp_ns,
            size: record.size,
        }
    }
}

impl TryFrom<&FlowRecordC> for FlowRecord {
    type Error = TypeError;

    fn try_from(record: &FlowRecordC) -> Result<Self, Self::Error> {
        let timestamp_ns = if record.timestamp_ns == 0 {
            current_timestamp_ns()
        } else {
            record.timestamp_ns
        };

        let record = FlowRecord {
            key: FlowKey::from_bytes(&record.key),
            component: ComponentId::from_code(record.component)?,
            flow_type: FlowType::from_tag(record.flow_type)?,
            timestamp_ns,
            size: record.size,
            priority: record.priority,
        };
        record.validate()?;
        Ok(record)
    }
}

/// Create a flow registry.
///
/// Returns null if the configuration cannot be loaded or the runtime cannot
/// be created.
///
/// # Safety
///
/// - `config_path` may be null for the default configuration, otherwise it
///   must be a valid null-terminated C string
/// - The returned handle must be freed with `flow_registry_destroy`
#[no_mangle]
pub unsafe extern "C" fn flow_registry_create(config_path: *const c_char) -> *mut FlowRegistryHandle {
    let config = if config_path.is_null() {
        FlowRegistryConfig::default()
    } else {
        let path = match CStr::from_ptr(config_path).to_str() {
            Ok(path) => path,
            Err(_) => return ptr::null_mut(),
        };
        match FlowRegistryConfig::load(Some(Path::new(path)), None) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load flow registry configuration: {:#}", e);
                return ptr::null_mut();
            }
        }
    };

    let runtime = match Runtime::new() {
        Ok(runtime) => Arc::new(runtime),
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ptr::null_mut();
        }
    };

    let registry = match FlowRegistry::new(config) {
        Ok(registry) => registry,
        Err(e) => {
            error!("Failed to create flow registry: {}", e);
            return ptr::null_mut();
        }
    };

    Box::into_raw(Box::new(FlowRegistryHandle { registry, runtime }))
}

/// Stop (if running) and free a flow registry
///
/// # Safety
///
/// - `handle` must be null or a handle returned by `flow_registry_create`
/// - `handle` must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn flow_registry_destroy(handle: *mut FlowRegistryHandle) {
    if handle.is_null() {
        return;
    }

    let handle = Box::from_raw(handle);
    if let Err(e) = handle.runtime.block_on(handle.registry.stop()) {
        error!("Flow registry stop during destroy failed: {}", e);
    }
    drop(handle);
}

/// Start the socket server, discovery and background tasks
///
/// # Safety
///
/// `handle` must be a valid handle returned by `flow_registry_create`
#[no_mangle]
pub unsafe extern "C" fn flow_registry_start(handle: *mut FlowRegistryHandle) -> FlowRegistryResult {
    let Some(handle) = handle.as_ref() else {
        return FlowRegistryResult::InvalidArgument;
    };
    result_code(handle.runtime.block_on(handle.registry.start()))
}

/// # Safety
///
/// `handle` must be a valid handle returned by `flow_registry_create`
#[no_mangle]
pub unsafe extern "C" fn flow_registry_stop(handle: *mut FlowRegistryHandle) -> FlowRegistryResult {
    let Some(handle) = handle.as_ref() else {
        return FlowRegistryResult::InvalidArgument;
    };
    result_code(handle.runtime.block_on(handle.registry.stop()))
}

/// Look up a flow by key; `key` of any length is normalized to 32 bytes
///
/// # Safety
///
/// - `handle` must be a valid handle returned by `flow_registry_create`
/// - `key` must point to at least `key_len` readable bytes
/// - `out` must point to writable memory for one `FlowRecordC`
#[no_mangle]
pub unsafe extern "C" fn flow_registry_lookup(
    handle: *mut FlowRegistryHandle,
    key: *const u8,
    key_len: usize,
    out: *mut FlowRecordC,
) -> FlowRegistryResult {
    let Some(handle) = handle.as_ref() else {
        return FlowRegistryResult::InvalidArgument;
    };
    if key.is_null() || out.is_null() {
        return FlowRegistryResult::InvalidArgument;
    }

    let key = FlowKey::from_bytes(std::slice::from_raw_parts(key, key_len));
    match handle.registry.lookup(&key) {
        Some(record) => {
            *out = FlowRecordC::from(&record);
            FlowRegistryResult::Success
        }
        None => FlowRegistryResult::NotFound,
    }
}

/// Register or overwrite a flow
///
/// # Safety
///
/// - `handle` must be a valid handle returned by `flow_registry_create`
/// - `record` must point to a valid `FlowRecordC`
#[no_mangle]
pub unsafe extern "C" fn flow_registry_register(
    handle: *mut FlowRegistryHandle,
    record: *const FlowRecordC,
) -> FlowRegistryResult {
    let (Some(handle), Some(record)) = (handle.as_ref(), record.as_ref()) else {
        return FlowRegistryResult::InvalidArgument;
    };

    match FlowRecord::try_from(record) {
        Ok(record) => result_code(handle.registry.register(record)),
        Err(_) => FlowRegistryResult::InvalidArgument,
    }
}

/// Send a command frame carrying `data` to a running component
///
/// # Safety
///
/// - `handle` must be a valid handle returned by `flow_registry_create`
/// - `data` must point to at least `data_len` readable bytes (may be null
///   when `data_len` is 0)
#[no_mangle]
pub unsafe extern "C" fn flow_registry_coordinate(
    handle: *mut FlowRegistryHandle,
    component: u32,
    data: *const u8,
    data_len: usize,
) -> FlowRegistryResult {
    let Some(handle) = handle.as_ref() else {
        return FlowRegistryResult::InvalidArgument;
    };
    let Ok(component) = ComponentId::from_code(component) else {
        return FlowRegistryResult::InvalidArgument;
    };
    let payload = match (data.is_null(), data_len) {
        (_, 0) => Vec::new(),
        (true, _) => return FlowRegistryResult::InvalidArgument,
        (false, len) => std::slice::from_raw_parts(data, len).to_vec(),
    };

    result_code(
        handle
            .runtime
            .block_on(handle.registry.coordinate(component, payload)),
    )
}

/// 1 if healthy, 0 if not, -1 for a null handle
///
/// # Safety
///
/// `handle` must be null or a valid handle returned by `flow_registry_create`
#[no_mangle]
pub unsafe extern "C" fn flow_registry_health(handle: *mut FlowRegistryHandle) -> c_int {
    match handle.as_ref() {
        Some(handle) => c_int::from(handle.registry.health()),
        None => -1,
    }
}

fn result_code(result: crate::Result<()>) -> FlowRegistryResult {
    match result {
        Ok(()) => FlowRegistryResult::Success,
        Err(e) => FlowRegistryResult::from(&e),
    }
}
