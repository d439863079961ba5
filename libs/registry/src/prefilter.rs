//! Pre-filter Bank
//!
//! Bank of bloom filters answering "definitely absent" before the cache or the
//! exact registry is touched. New keys go into the newest filter; when it
//! reaches its design capacity a fresh filter is appended, and the oldest is
//! dropped once the bank holds more than `max_filters`.
//!
//! A `false` from [`PreFilterBank::contains`] is a guarantee only while no
//! filter has been dropped since the key was added. Callers that need the
//! guarantee across drops re-seed the bank with [`PreFilterBank::rebuild`].

use flow_config::PreFilterConfig;
use flow_types::FlowKey;
use serde::Serialize;
use std::collections::VecDeque;
use std::f64::consts::LN_2;

/// Single bloom filter with double hashing
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
    capacity: usize,
    inserted: usize,
}

impl BloomFilter {
    /// Size a filter for `expected_entries` at `false_positive_rate`:
    /// `m = ceil(-n ln p / (ln 2)^2)`, `k = max(1, round(m / n * ln 2))`
    pub fn new(expected_entries: usize, false_positive_rate: f64) -> Self {
        let n = expected_entries.max(1) as f64;
        let p = false_positive_rate.clamp(f64::MIN_POSITIVE, 0.999_999);

        let num_bits = ((-n * p.ln()) / (LN_2 * LN_2)).ceil().max(64.0) as u64;
        let num_hashes = ((num_bits as f64 / n) * LN_2).round().max(1.0) as u32;

        Self {
            bits: vec![0u64; num_bits.div_ceil(64) as usize],
            num_bits,
            num_hashes,
            capacity: expected_entries.max(1),
            inserted: 0,
        }
    }

    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Reached design capacity
    pub fn is_full(&self) -> bool {
        self.inserted >= self.capacity
    }

    /// Bit indices for `key`: `h1 + i*h2 + i^2 (mod m)` over the two digest halves
    fn indices(&self, key: &FlowKey) -> impl Iterator<Item = u64> {
        let digest = key.digest();
        let h1 = u64::from_le_bytes(half_word(&digest, 0));
        let h2 = u64::from_le_bytes(half_word(&digest, 16));
        let m = self.num_bits;

        (0..self.num_hashes as u64).map(move |i| {
            h1.wrapping_add(i.wrapping_mul(h2))
                .wrapping_add(i.wrapping_mul(i))
                % m
        })
    }

    pub fn add(&mut self, key: &FlowKey) {
        let indices: Vec<u64> = self.indices(key).collect();
        for bit in indices {
            self.bits[(bit / 64) as usize] |= 1 << (bit % 64);
        }
        self.inserted += 1;
    }

    pub fn contains(&self, key: &FlowKey) -> bool {
        self.indices(key)
            .all(|bit| self.bits[(bit / 64) as usize] & (1 << (bit % 64)) != 0)
    }

    /// Fraction of bits set
    pub fn fill_ratio(&self) -> f64 {
        let set: u64 = self.bits.iter().map(|word| word.count_ones() as u64).sum();
        set as f64 / self.num_bits as f64
    }

    /// False-positive rate implied by the current fill: `fill^k`
    pub fn estimated_false_positive_rate(&self) -> f64 {
        self.fill_ratio().powi(self.num_hashes as i32)
    }
}

fn half_word(digest: &[u8; 32], offset: usize) -> [u8; 8] {
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[offset..offset + 8]);
    word
}

/// What an [`PreFilterBank::add`] did to the bank
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddOutcome {
    /// A new filter was appended before inserting
    pub rotated: bool,
    /// The oldest filter was discarded
    pub dropped: bool,
}

/// Pre-filter statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreFilterStats {
    pub filter_count: usize,
    pub total_inserted: usize,
    pub fill_ratios: Vec<f64>,
    /// Probability that at least one filter reports a false positive
    pub estimated_false_positive_rate: f64,
    pub rotations: u64,
    pub drops: u64,
    pub rebuilds: u64,
}

/// Rotating bank of bloom filters
#[derive(Debug, Clone)]
pub struct PreFilterBank {
    filters: VecDeque<BloomFilter>,
    expected_entries: usize,
    false_positive_rate: f64,
    max_filters: usize,
    rotations: u64,
    drops: u64,
    rebuilds: u64,
}

impl PreFilterBank {
    pub fn new(config: &PreFilterConfig) -> Self {
        let expected_entries = config.expected_entries.max(1);
        let mut filters = VecDeque::with_capacity(config.max_filters.max(1) + 1);
        filters.push_back(BloomFilter::new(expected_entries, config.false_positive_rate));

        Self {
            filters,
            expected_entries,
            false_positive_rate: config.false_positive_rate,
            max_filters: config.max_filters.max(1),
            rotations: 0,
            drops: 0,
            rebuilds: 0,
        }
    }

    /// Add a key to the newest filter, rotating first if it is full
    pub fn add(&mut self, key: &FlowKey) -> AddOutcome {
        let mut outcome = AddOutcome::default();

        if self.filters.back().map_or(true, BloomFilter::is_full) {
            self.filters
                .push_back(BloomFilter::new(self.expected_entries, self.false_positive_rate));
            self.rotations += 1;
            outcome.rotated = true;

            if self.filters.len() > self.max_filters {
                self.filters.pop_front();
                self.drops += 1;
                outcome.dropped = true;
            }
        }

        if let Some(newest) = self.filters.back_mut() {
            newest.add(key);
        }
        outcome
    }

    /// `false` means the key was never added (or its filter was dropped)
    pub fn contains(&self, key: &FlowKey) -> bool {
        self.filters.iter().any(|filter| filter.contains(key))
    }

    /// Replace the bank with a single filter holding exactly `keys`.
    ///
    /// The filter is sized for at least twice the key count so the rebuilt
    /// set does not rotate straight back out.
    pub fn rebuild<'a, I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = &'a FlowKey>,
        I::IntoIter: ExactSizeIterator,
    {
        let keys = keys.into_iter();
        let capacity = self.expected_entries.max(keys.len().saturating_mul(2));

        let mut filter = BloomFilter::new(capacity, self.false_positive_rate);
        for key in keys {
            filter.add(key);
        }

        self.filters.clear();
        self.filters.push_back(filter);
        self.rebuilds += 1;
    }

    pub fn clear(&mut self) {
        self.filters.clear();
        self.filters
            .push_back(BloomFilter::new(self.expected_entries, self.false_positive_rate));
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    pub fn stats(&self) -> PreFilterStats {
        let no_false_positive: f64 = self
            .filters
            .iter()
            .map(|filter| 1.0 - filter.estimated_false_positive_rate())
            .product();

        PreFilterStats {
            filter_count: self.filters.len(),
            total_inserted: self.filters.iter().map(BloomFilter::inserted).sum(),
            fill_ratios: self.filters.iter().map(BloomFilter::fill_ratio).collect(),
            estimated_false_positive_rate: 1.0 - no_false_positive,
            rotations: self.rotations,
            drops: self.drops,
            rebuilds: self.rebuilds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(expected_entries: usize, max_filters: usize) -> PreFilterConfig {
        PreFilterConfig {
            expected_entries,
            false_positive_rate: 0.01,
            max_filters,
        }
    }

    #[test]
    fn test_sizing_formula() {
        let filter = BloomFilter::new(1000, 0.01);
        // m = ceil(1000 * 4.605 / 0.4805) = 9586, k = round(9.586 * 0.693) = 7
        assert_eq!(filter.num_bits(), 9586);
        assert_eq!(filter.num_hashes(), 7);
    }

    #[test]
    fn test_no_false_negatives() {
        let mut filter = BloomFilter::new(10_000, 0.01);
        for n in 0..10_000u64 {
            filter.add(&FlowKey::from_u64(n));
        }
        for n in 0..10_000u64 {
            assert!(filter.contains(&FlowKey::from_u64(n)));
        }
    }

    #[test]
    fn test_false_positive_rate_near_target() {
        let mut filter = BloomFilter::new(10_000, 0.01);
        for n in 0..10_000u64 {
            filter.add(&FlowKey::from_u64(n));
        }

        let trials = 100_000u64;
        let false_positives = (1_000_000..1_000_000 + trials)
            .filter(|n| filter.contains(&FlowKey::from_u64(*n)))
            .count();
        let rate = false_positives as f64 / trials as f64;
        assert!(rate < 0.02, "false positive rate {rate}");
    }

    #[test]
    fn test_rotation_and_drop() {
        let mut bank = PreFilterBank::new(&config(10, 2));

        for n in 0..10u64 {
            assert_eq!(bank.add(&FlowKey::from_u64(n)), AddOutcome::default());
        }

        let outcome = bank.add(&FlowKey::from_u64(10));
        assert!(outcome.rotated);
        assert!(!outcome.dropped);
        assert_eq!(bank.filter_count(), 2);

        for n in 11..20u64 {
            bank.add(&FlowKey::from_u64(n));
        }

        let outcome = bank.add(&FlowKey::from_u64(20));
        assert!(outcome.rotated);
        assert!(outcome.dropped);
        assert_eq!(bank.filter_count(), 2);

        // Keys in surviving filters are still reported
        for n in 10..21u64 {
            assert!(bank.contains(&FlowKey::from_u64(n)));
        }

        let stats = bank.stats();
        assert_eq!(stats.rotations, 2);
        assert_eq!(stats.drops, 1);
        assert_eq!(stats.total_inserted, 11);
    }

    #[test]
    fn test_rebuild_restores_dropped_keys() {
        let mut bank = PreFilterBank::new(&config(10, 1));
        let keys: Vec<FlowKey> = (0..25u64).map(FlowKey::from_u64).collect();
        for key in &keys {
            bank.add(key);
        }
        assert!(bank.stats().drops > 0);

        bank.rebuild(&keys);
        assert_eq!(bank.filter_count(), 1);
        for key in &keys {
            assert!(bank.contains(key));
        }
        assert_eq!(bank.stats().rebuilds, 1);
    }

    #[test]
    fn test_empty_bank_rejects() {
        let bank = PreFilterBank::new(&config(1000, 4));
        assert!(!bank.contains(&FlowKey::from_u64(1)));
        assert_eq!(bank.stats().estimated_false_positive_rate, 0.0);
    }
}
