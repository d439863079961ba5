//! # Flow Registry Types
//!
//! Plain data shared by every flow-registry crate. Nothing in here does I/O or
//! takes a lock; the codec, network and registry crates build on these types.
//!
//! ## Contents
//!
//! - [`FlowKey`]: 32-byte content key, normalized from arbitrary-length input
//! - [`FlowRecord`] / [`FlowType`]: the unit of work tracked by the registry
//! - [`ComponentId`] / [`ComponentStatus`]: the seven cooperating roles and
//!   their lifecycle
//! - [`current_timestamp_ns`]: wall-clock nanoseconds used for record and
//!   frame timestamps
//!
//! ## Architecture Role
//!
//! ```text
//! flow-types → flow-codec → flow-network → flow-registry
//!     ↑             ↓             ↓              ↓
//! Pure Data    Frame Rules    Sockets/Pool   Registry/Cache/Filter
//! ```

pub mod component;
pub mod errors;
pub mod flow;
pub mod key;
pub mod time;

pub use component::{ComponentId, ComponentStatus};
pub use errors::{Result, TypeError};
pub use flow::{FlowRecord, FlowType, MAX_PRIORITY};
pub use key::{FlowKey, FLOW_KEY_SIZE};
pub use time::current_timestamp_ns;
