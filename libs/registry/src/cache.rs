//! Flow Cache
//!
//! Bounded map in front of the exact registry. Nodes live in an arena and are
//! threaded onto an intrusive doubly linked list (front = most recently
//! promoted); freed arena slots are recycled through a free list so steady
//! state churn does not allocate.
//!
//! Limits are enforced on insert: the entry count and an estimated memory
//! footprint. The victim is chosen by [`EvictionPolicy`].

use flow_config::{CacheConfig, EvictionPolicy};
use flow_types::FlowKey;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Lookups before the hit rate counts toward health
const HEALTH_MIN_LOOKUPS: u64 = 100;
const HEALTH_MIN_HIT_RATE: f64 = 0.5;
/// Random arena probes before falling back to the tail
const RANDOM_SAMPLE_ATTEMPTS: usize = 16;

#[derive(Debug)]
struct Node<V> {
    key: FlowKey,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
    access_count: u64,
    inserted_at: Instant,
    last_access: Instant,
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub memory_bytes: usize,
    pub max_memory_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub hit_rate: f64,
}

/// Arena-backed eviction cache keyed by [`FlowKey`]
pub struct FlowCache<V> {
    nodes: Vec<Option<Node<V>>>,
    free: Vec<usize>,
    index: HashMap<FlowKey, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    max_entries: usize,
    max_memory_bytes: usize,
    ttl: Option<Duration>,
    policy: EvictionPolicy,
    rng: StdRng,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl<V> FlowCache<V> {
    pub fn new(config: &CacheConfig) -> Self {
        let max_entries = config.max_entries.max(1);
        Self {
            nodes: Vec::with_capacity(max_entries.min(1 << 16)),
            free: Vec::new(),
            index: HashMap::with_capacity(max_entries.min(1 << 16)),
            head: None,
            tail: None,
            max_entries,
            max_memory_bytes: config.max_memory_bytes,
            ttl: config.ttl(),
            policy: config.policy,
            rng: StdRng::from_entropy(),
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
        }
    }

    /// Estimated bytes charged per entry: node plus map slot overhead
    pub fn entry_size() -> usize {
        std::mem::size_of::<Node<V>>()
            + std::mem::size_of::<FlowKey>()
            + std::mem::size_of::<usize>()
            + 16
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn memory_bytes(&self) -> usize {
        self.len() * Self::entry_size()
    }

    pub fn contains_key(&self, key: &FlowKey) -> bool {
        self.index.contains_key(key)
    }

    /// Look up `key`, promoting it under every policy except FIFO.
    ///
    /// An expired entry is evicted and reported as a miss.
    pub fn get(&mut self, key: &FlowKey) -> Option<&V> {
        let Some(&idx) = self.index.get(key) else {
            self.misses += 1;
            return None;
        };

        let now = Instant::now();
        if self.is_expired(idx, now) {
            self.detach(idx);
            self.expirations += 1;
            self.misses += 1;
            return None;
        }

        self.hits += 1;
        if let Some(node) = self.nodes[idx].as_mut() {
            node.access_count += 1;
            node.last_access = now;
        }
        if self.policy != EvictionPolicy::Fifo {
            self.move_to_front(idx);
        }

        self.nodes[idx].as_ref().map(|node| &node.value)
    }

    /// Insert or overwrite, returning the previous value for `key`
    pub fn put(&mut self, key: FlowKey, value: V) -> Option<V> {
        let now = Instant::now();

        if let Some(&idx) = self.index.get(&key) {
            let previous = self.nodes[idx].as_mut().map(|node| {
                node.inserted_at = now;
                node.last_access = now;
                std::mem::replace(&mut node.value, value)
            });
            if self.policy != EvictionPolicy::Fifo {
                self.move_to_front(idx);
            }
            return previous;
        }

        while !self.is_empty() && self.would_exceed_limits() {
            match self.select_victim() {
                Some(victim) => {
                    self.detach(victim);
                    self.evictions += 1;
                }
                None => break,
            }
        }

        let node = Node {
            key,
            value,
            prev: None,
            next: None,
            access_count: 0,
            inserted_at: now,
            last_access: now,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = Some(node);
                idx
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };

        self.index.insert(key, idx);
        self.push_front(idx);
        None
    }

    pub fn remove(&mut self, key: &FlowKey) -> Option<V> {
        let idx = *self.index.get(key)?;
        self.detach(idx).map(|node| node.value)
    }

    /// Drop every entry past its TTL, returning how many were removed
    pub fn sweep_expired(&mut self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }

        let now = Instant::now();
        let expired: Vec<usize> = self
            .index
            .values()
            .copied()
            .filter(|&idx| self.is_expired(idx, now))
            .collect();

        for &idx in &expired {
            self.detach(idx);
        }
        self.expirations += expired.len() as u64;
        expired.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    /// Keys from most to least recently promoted
    pub fn keys(&self) -> Vec<FlowKey> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            match self.nodes[idx].as_ref() {
                Some(node) => {
                    keys.push(node.key);
                    cursor = node.next;
                }
                None => break,
            }
        }
        keys
    }

    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            max_entries: self.max_entries,
            memory_bytes: self.memory_bytes(),
            max_memory_bytes: self.max_memory_bytes,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            expirations: self.expirations,
            hit_rate: self.hit_rate(),
        }
    }

    /// Within both limits, and hitting more often than not once warmed up
    pub fn is_healthy(&self) -> bool {
        let within_limits =
            self.len() <= self.max_entries && self.memory_bytes() <= self.max_memory_bytes;
        let lookups = self.hits + self.misses;
        within_limits && (lookups < HEALTH_MIN_LOOKUPS || self.hit_rate() > HEALTH_MIN_HIT_RATE)
    }

    fn would_exceed_limits(&self) -> bool {
        let next = self.len() + 1;
        next > self.max_entries || next * Self::entry_size() > self.max_memory_bytes
    }

    fn is_expired(&self, idx: usize, now: Instant) -> bool {
        match (self.ttl, self.nodes[idx].as_ref()) {
            (Some(ttl), Some(node)) => now.duration_since(node.inserted_at) > ttl,
            _ => false,
        }
    }

    fn select_victim(&mut self) -> Option<usize> {
        match self.policy {
            EvictionPolicy::Lru | EvictionPolicy::Fifo => self.tail,
            EvictionPolicy::Lfu => self
                .index
                .values()
                .copied()
                .filter_map(|idx| {
                    self.nodes[idx]
                        .as_ref()
                        .map(|node| (node.access_count, node.last_access, idx))
                })
                .min()
                .map(|(_, _, idx)| idx),
            EvictionPolicy::Random => {
                for _ in 0..RANDOM_SAMPLE_ATTEMPTS {
                    let idx = self.rng.gen_range(0..self.nodes.len());
                    if self.nodes[idx].is_some() {
                        return Some(idx);
                    }
                }
                self.tail
            }
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match self.nodes[idx].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.nodes[p].as_mut() {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.nodes[n].as_mut() {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(node) = self.nodes[h].as_mut() {
                node.prev = Some(idx);
            }
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    /// Unlink, free the arena slot and drop the index entry
    fn detach(&mut self, idx: usize) -> Option<Node<V>> {
        self.unlink(idx);
        let node = self.nodes[idx].take()?;
        self.free.push(idx);
        self.index.remove(&node.key);
        Some(node)
    }
}

impl<V> std::fmt::Debug for FlowCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowCache")
            .field("entries", &self.len())
            .field("max_entries", &self.max_entries)
            .field("policy", &self.policy)
            .finish()
    }
}
