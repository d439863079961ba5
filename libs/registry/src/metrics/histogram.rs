//! Lock-free latency histogram over a power-of-two ladder

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Number of buckets; the last one is unbounded
pub const BUCKET_COUNT: usize = 32;
/// Upper bound of the first bucket in nanoseconds
pub const FIRST_BOUND_NS: u64 = 64;

/// Upper bound of bucket `index` (`64 << index`), `None` for the overflow bucket
pub fn bucket_bound(index: usize) -> Option<u64> {
    (index < BUCKET_COUNT - 1).then(|| FIRST_BOUND_NS << index)
}

/// Bucket holding a sample of `ns` nanoseconds
pub fn bucket_index(ns: u64) -> usize {
    if ns <= FIRST_BOUND_NS {
        return 0;
    }
    // Smallest i with ns <= 64 << i
    let bits = 64 - (ns - 1).leading_zeros() as usize;
    (bits - 6).min(BUCKET_COUNT - 1)
}

/// Latency histogram with atomic per-bucket counts
#[derive(Debug)]
pub struct Histogram {
    buckets: [AtomicU64; BUCKET_COUNT],
    sum_ns: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            sum_ns: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn record(&self, latency: Duration) {
        self.record_ns(latency.as_nanos().min(u64::MAX as u128) as u64);
    }

    pub fn record_ns(&self, ns: u64) {
        self.buckets[bucket_index(ns)].fetch_add(1, Ordering::Relaxed);
        self.sum_ns.fetch_add(ns, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum_ns(&self) -> u64 {
        self.sum_ns.load(Ordering::Relaxed)
    }

    pub fn mean_ns(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum_ns() as f64 / count as f64
        }
    }

    /// Upper bound of the bucket where the cumulative count first reaches
    /// `q * count`. Samples in the overflow bucket report the last finite bound.
    pub fn percentile(&self, q: f64) -> u64 {
        self.snapshot().percentile(q)
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            buckets: self
                .buckets
                .iter()
                .map(|bucket| bucket.load(Ordering::Relaxed))
                .collect(),
            sum_ns: self.sum_ns(),
            count: self.count(),
        }
    }

    pub fn reset(&self) {
        for bucket in &self.buckets {
            bucket.store(0, Ordering::Relaxed);
        }
        self.sum_ns.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of a [`Histogram`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistogramSnapshot {
    pub buckets: Vec<u64>,
    pub sum_ns: u64,
    pub count: u64,
}

impl HistogramSnapshot {
    pub fn mean_ns(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_ns as f64 / self.count as f64
        }
    }

    pub fn percentile(&self, q: f64) -> u64 {
        if self.count == 0 {
            return 0;
        }

        let target = ((q.clamp(0.0, 1.0) * self.count as f64).ceil() as u64).max(1);
        let mut cumulative = 0;
        for (index, &n) in self.buckets.iter().enumerate() {
            cumulative += n;
            if cumulative >= target {
                return bound_or_last(index);
            }
        }
        bound_or_last(BUCKET_COUNT - 1)
    }

    /// `(upper bound, cumulative count)` pairs; `None` marks `+Inf`
    pub fn cumulative(&self) -> Vec<(Option<u64>, u64)> {
        let mut running = 0;
        self.buckets
            .iter()
            .enumerate()
            .map(|(index, &n)| {
                running += n;
                (bucket_bound(index), running)
            })
            .collect()
    }
}

fn bound_or_last(index: usize) -> u64 {
    bucket_bound(index).unwrap_or(FIRST_BOUND_NS << (BUCKET_COUNT - 2))
}
