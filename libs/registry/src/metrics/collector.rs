//! Operation counters and latency histograms for the registry

use super::histogram::{Histogram, HistogramSnapshot};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const METRIC_PREFIX: &str = "flow_registry";

/// Percentile summary of one latency histogram
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    pub mean_ns: f64,
    pub p50_ns: u64,
    pub p95_ns: u64,
    pub p99_ns: u64,
}

impl From<&HistogramSnapshot> for LatencySummary {
    fn from(snapshot: &HistogramSnapshot) -> Self {
        Self {
            count: snapshot.count,
            mean_ns: snapshot.mean_ns(),
            p50_ns: snapshot.percentile(0.50),
            p95_ns: snapshot.percentile(0.95),
            p99_ns: snapshot.percentile(0.99),
        }
    }
}

/// Serializable snapshot of every collector metric
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub uptime_secs: f64,
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub prefilter_rejections: u64,
    pub registrations: u64,
    pub coordinations: u64,
    pub coordination_failures: u64,
    pub hit_rate: f64,
    pub lookups_per_sec: f64,
    pub registrations_per_sec: f64,
    pub coordinations_per_sec: f64,
    pub lookup_latency: LatencySummary,
    pub registration_latency: LatencySummary,
    pub coordination_latency: LatencySummary,
}

impl PerformanceStats {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Lifetime counters plus one histogram per operation
#[derive(Debug)]
pub struct MetricsCollector {
    started: Instant,
    lookup_latency: Histogram,
    registration_latency: Histogram,
    coordination_latency: Histogram,
    lookups: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    prefilter_rejections: AtomicU64,
    registrations: AtomicU64,
    coordinations: AtomicU64,
    coordination_failures: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            lookup_latency: Histogram::new(),
            registration_latency: Histogram::new(),
            coordination_latency: Histogram::new(),
            lookups: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            prefilter_rejections: AtomicU64::new(0),
            registrations: AtomicU64::new(0),
            coordinations: AtomicU64::new(0),
            coordination_failures: AtomicU64::new(0),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn record_lookup(&self, latency: Duration, hit: bool) {
        self.lookup_latency.record(latency);
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Miss answered by the pre-filter alone
    pub fn record_prefilter_rejection(&self, latency: Duration) {
        self.prefilter_rejections.fetch_add(1, Ordering::Relaxed);
        self.record_lookup(latency, false);
    }

    pub fn record_registration(&self, latency: Duration) {
        self.registration_latency.record(latency);
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coordination(&self, latency: Duration, delivered: bool) {
        self.coordination_latency.record(latency);
        self.coordinations.fetch_add(1, Ordering::Relaxed);
        if !delivered {
            self.coordination_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn lookup_latency(&self) -> &Histogram {
        &self.lookup_latency
    }

    pub fn registration_latency(&self) -> &Histogram {
        &self.registration_latency
    }

    pub fn coordination_latency(&self) -> &Histogram {
        &self.coordination_latency
    }

    pub fn snapshot(&self) -> PerformanceStats {
        let elapsed = self.uptime().as_secs_f64();
        let per_sec = |n: u64| if elapsed > 0.0 { n as f64 / elapsed } else { 0.0 };

        let lookups = self.lookups.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);
        let registrations = self.registrations.load(Ordering::Relaxed);
        let coordinations = self.coordinations.load(Ordering::Relaxed);

        PerformanceStats {
            uptime_secs: elapsed,
            lookups,
            hits,
            misses: self.misses.load(Ordering::Relaxed),
            prefilter_rejections: self.prefilter_rejections.load(Ordering::Relaxed),
            registrations,
            coordinations,
            coordination_failures: self.coordination_failures.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            lookups_per_sec: per_sec(lookups),
            registrations_per_sec: per_sec(registrations),
            coordinations_per_sec: per_sec(coordinations),
            lookup_latency: LatencySummary::from(&self.lookup_latency.snapshot()),
            registration_latency: LatencySummary::from(&self.registration_latency.snapshot()),
            coordination_latency: LatencySummary::from(&self.coordination_latency.snapshot()),
        }
    }

    /// Prometheus text exposition of every counter and histogram
    pub fn export_prometheus(&self) -> String {
        let mut out = String::new();

        let counters = [
            ("lookups_total", "Lookups served", &self.lookups),
            ("hits_total", "Lookups that found a record", &self.hits),
            ("misses_total", "Lookups that found nothing", &self.misses),
            (
                "prefilter_rejections_total",
                "Misses answered by the pre-filter",
                &self.prefilter_rejections,
            ),
            ("registrations_total", "Flows registered", &self.registrations),
            ("coordinations_total", "Coordination messages sent", &self.coordinations),
            (
                "coordination_failures_total",
                "Coordination messages not delivered",
                &self.coordination_failures,
            ),
        ];
        for (name, help, counter) in counters {
            let _ = writeln!(out, "# HELP {METRIC_PREFIX}_{name} {help}");
            let _ = writeln!(out, "# TYPE {METRIC_PREFIX}_{name} counter");
            let _ = writeln!(out, "{METRIC_PREFIX}_{name} {}", counter.load(Ordering::Relaxed));
        }

        let histograms = [
            ("lookup_latency_ns", "Lookup latency", &self.lookup_latency),
            ("registration_latency_ns", "Registration latency", &self.registration_latency),
            ("coordination_latency_ns", "Coordination latency", &self.coordination_latency),
        ];
        for (name, help, histogram) in histograms {
            write_histogram(&mut out, name, help, &histogram.snapshot());
        }

        out
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn write_histogram(out: &mut String, name: &str, help: &str, snapshot: &HistogramSnapshot) {
    let metric = format!("{METRIC_PREFIX}_{name}");
    let _ = writeln!(out, "# HELP {metric} {help}");
    let _ = writeln!(out, "# TYPE {metric} histogram");
    for (bound, cumulative) in snapshot.cumulative() {
        match bound {
            Some(le) => {
                let _ = writeln!(out, "{metric}_bucket{{le=\"{le}\"}} {cumulative}");
            }
            None => {
                let _ = writeln!(out, "{metric}_bucket{{le=\"+Inf\"}} {cumulative}");
            }
        }
    }
    let _ = writeln!(out, "{metric}_sum {}", snapshot.sum_ns);
    let _ = writeln!(out, "{metric}_count {}", snapshot.count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_hit_rate() {
        let collector = MetricsCollector::new();
        collector.record_lookup(Duration::from_nanos(500), true);
        collector.record_lookup(Duration::from_nanos(500), true);
        collector.record_lookup(Duration::from_nanos(500), true);
        collector.record_prefilter_rejection(Duration::from_nanos(80));
        collector.record_registration(Duration::from_micros(2));
        collector.record_coordination(Duration::from_micros(40), true);
        collector.record_coordination(Duration::from_micros(40), false);

        let stats = collector.snapshot();
        assert_eq!(stats.lookups, 4);
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.prefilter_rejections, 1);
        assert_eq!(stats.registrations, 1);
        assert_eq!(stats.coordinations, 2);
        assert_eq!(stats.coordination_failures, 1);
        assert_eq!(stats.hit_rate, 0.75);
        assert_eq!(stats.lookup_latency.count, 4);
        assert!(stats.lookups_per_sec > 0.0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let collector = MetricsCollector::new();
        collector.record_lookup(Duration::from_micros(1), true);

        let json = collector.snapshot().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["lookups"], 1);
        assert_eq!(value["lookup_latency"]["count"], 1);
    }

    #[test]
    fn test_prometheus_export() {
        let collector = MetricsCollector::new();
        collector.record_lookup(Duration::from_nanos(100), true);
        collector.record_lookup(Duration::from_nanos(1_000), false);

        let text = collector.export_prometheus();
        assert!(text.contains("# TYPE flow_registry_lookups_total counter"));
        assert!(text.contains("flow_registry_lookups_total 2"));
        assert!(text.contains("# TYPE flow_registry_lookup_latency_ns histogram"));
        assert!(text.contains("flow_registry_lookup_latency_ns_bucket{le=\"64\"} 0"));
        assert!(text.contains("flow_registry_lookup_latency_ns_bucket{le=\"128\"} 1"));
        assert!(text.contains("flow_registry_lookup_latency_ns_bucket{le=\"1024\"} 2"));
        assert!(text.contains("flow_registry_lookup_latency_ns_bucket{le=\"+Inf\"} 2"));
        assert!(text.contains("flow_registry_lookup_latency_ns_sum 1100"));
        assert!(text.contains("flow_registry_lookup_latency_ns_count 2"));
    }
}
