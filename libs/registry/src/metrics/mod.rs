//! Registry metrics
//!
//! - [`Histogram`]: fixed power-of-two latency ladder, lock-free recording
//! - [`MetricsCollector`]: lifetime counters plus lookup, registration and
//!   coordination histograms; JSON snapshot and Prometheus text export
//! - [`MetricsReporter`]: background task logging a periodic summary

pub mod collector;
pub mod histogram;
pub mod reporter;

pub use collector::{LatencySummary, MetricsCollector, PerformanceStats};
pub use histogram::{Histogram, HistogramSnapshot};
pub use reporter::MetricsReporter;
