//! Exact Registry
//!
//! Open-addressing Robin Hood hash table keyed by [`FlowKey`], plus the
//! lock-guarded [`ExactRegistry`] the orchestrator uses.
//!
//! ## Slot states
//! - `Empty`: never used since the last rehash
//! - `Tombstone`: removed entry, keeping its probe length so lookups can still
//!   stop early
//! - `Occupied`: live entry with its cached 64-bit hash and probe length
//!
//! Every slot on a live entry's probe path holds a probe length at least as
//! large as that slot's distance along the path. Lookups stop as soon as
//! their own distance exceeds the slot's, and every mutation below preserves
//! that rule.

use flow_config::RegistryConfig;
use flow_types::{FlowKey, FlowRecord};
use parking_lot::RwLock;
use serde::Serialize;

const MIN_CAPACITY: usize = 16;

/// Registry is unhealthy once occupancy reaches this fraction
pub const HEALTHY_LOAD_FACTOR: f64 = 0.9;

/// Registry is unhealthy once any probe reaches this length
pub const HEALTHY_MAX_PROBE: u32 = 100;

#[derive(Debug, Clone)]
struct Entry<V> {
    hash: u64,
    key: FlowKey,
    value: V,
    psl: u32,
}

#[derive(Debug, Clone)]
enum Slot<V> {
    Empty,
    Tombstone { psl: u32 },
    Occupied(Entry<V>),
}

enum Placement {
    Take,
    TakeTombstone,
    Swap,
    Skip,
}

/// Robin Hood table statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RegistryStats {
    pub entries: usize,
    pub capacity: usize,
    pub tombstones: usize,
    /// (entries + tombstones) / capacity
    pub load_factor: f64,
    pub max_probe_length: u32,
    pub average_probe_length: f64,
    pub resizes: u64,
}

/// Single-threaded Robin Hood table
#[derive(Debug, Clone)]
pub struct RobinHoodTable<V> {
    slots: Vec<Slot<V>>,
    len: usize,
    tombstones: usize,
    max_load_factor: f64,
    resizes: u64,
}

impl<V> RobinHoodTable<V> {
    /// `capacity` is rounded up to a power of two (minimum 16)
    pub fn with_capacity(capacity: usize, max_load_factor: f64) -> Self {
        let capacity = capacity.max(MIN_CAPACITY).next_power_of_two();
        Self {
            slots: empty_slots(capacity),
            len: 0,
            tombstones: 0,
            max_load_factor,
            resizes: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    fn find_index(&self, key: &FlowKey, hash: u64) -> Option<usize> {
        let mask = self.mask();
        let mut idx = hash as usize & mask;

        for distance in 0..self.slots.len() as u32 {
            match &self.slots[idx] {
                Slot::Empty => return None,
                Slot::Tombstone { psl } => {
                    if distance > *psl {
                        return None;
                    }
                }
                Slot::Occupied(entry) => {
                    if distance > entry.psl {
                        return None;
                    }
                    if entry.hash == hash && entry.key == *key {
                        return Some(idx);
                    }
                }
            }
            idx = (idx + 1) & mask;
        }
        None
    }

    /// Insert or overwrite, returning the previous value for `key`
    pub fn insert(&mut self, key: FlowKey, value: V) -> Option<V> {
        let hash = key.hash64();

        if let Some(idx) = self.find_index(&key, hash) {
            if let Slot::Occupied(entry) = &mut self.slots[idx] {
                return Some(std::mem::replace(&mut entry.value, value));
            }
        }

        let occupied_after = (self.len + self.tombstones + 1) as f64;
        if occupied_after / self.capacity() as f64 > self.max_load_factor {
            self.grow();
        }

        self.place(Entry {
            hash,
            key,
            value,
            psl: 0,
        });
        self.len += 1;
        None
    }

    fn place(&mut self, mut entry: Entry<V>) {
        let mask = self.mask();
        let mut idx = entry.hash as usize & mask;
        entry.psl = 0;

        loop {
            let placement = match &self.slots[idx] {
                Slot::Empty => Placement::Take,
                Slot::Tombstone { psl } if *psl <= entry.psl => Placement::TakeTombstone,
                Slot::Tombstone { .. } => Placement::Skip,
                Slot::Occupied(existing) if existing.psl < entry.psl => Placement::Swap,
                Slot::Occupied(_) => Placement::Skip,
            };

            match placement {
                Placement::Take => {
                    self.slots[idx] = Slot::Occupied(entry);
                    return;
                }
                Placement::TakeTombstone => {
                    self.tombstones -= 1;
                    self.slots[idx] = Slot::Occupied(entry);
                    return;
                }
                Placement::Swap => {
                    if let Slot::Occupied(existing) = &mut self.slots[idx] {
                        std::mem::swap(existing, &mut entry);
                    }
                }
                Placement::Skip => {}
            }

            idx = (idx + 1) & mask;
            entry.psl += 1;
        }
    }

    /// Rehash live entries. Doubles capacity unless most of the occupancy
    /// is tombstones, in which case the table is rebuilt at the same size.
    fn grow(&mut self) {
        let live_load = (self.len + 1) as f64 / self.capacity() as f64;
        let new_capacity = if live_load > self.max_load_factor / 2.0 {
            self.capacity() * 2
        } else {
            self.capacity()
        };
        self.rehash(new_capacity);
    }

    fn rehash(&mut self, new_capacity: usize) {
        let old = std::mem::replace(&mut self.slots, empty_slots(new_capacity));
        self.tombstones = 0;
        self.resizes += 1;

        for slot in old {
            if let Slot::Occupied(entry) = slot {
                self.place(entry);
            }
        }
    }

    pub fn get(&self, key: &FlowKey) -> Option<&V> {
        let idx = self.find_index(key, key.hash64())?;
        match &self.slots[idx] {
            Slot::Occupied(entry) => Some(&entry.value),
            _ => None,
        }
    }

    pub fn contains(&self, key: &FlowKey) -> bool {
        self.find_index(key, key.hash64()).is_some()
    }

    /// Remove `key`, leaving a tombstone that keeps its probe length
    pub fn remove(&mut self, key: &FlowKey) -> Option<V> {
        let idx = self.find_index(key, key.hash64())?;
        let psl = match &self.slots[idx] {
            Slot::Occupied(entry) => entry.psl,
            _ => return None,
        };

        match std::mem::replace(&mut self.slots[idx], Slot::Tombstone { psl }) {
            Slot::Occupied(entry) => {
                self.len -= 1;
                self.tombstones += 1;
                Some(entry.value)
            }
            // Unreachable: the slot was checked above
            other => {
                self.slots[idx] = other;
                None
            }
        }
    }

    pub fn keys(&self) -> Vec<FlowKey> {
        self.iter().map(|(key, _)| *key).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FlowKey, &V)> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied(entry) => Some((&entry.key, &entry.value)),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        let capacity = self.capacity();
        self.slots = empty_slots(capacity);
        self.len = 0;
        self.tombstones = 0;
    }

    pub fn stats(&self) -> RegistryStats {
        let mut max_probe = 0;
        let mut total_probe = 0u64;
        for slot in &self.slots {
            if let Slot::Occupied(entry) = slot {
                max_probe = max_probe.max(entry.psl);
                total_probe += entry.psl as u64;
            }
        }

        RegistryStats {
            entries: self.len,
            capacity: self.capacity(),
            tombstones: self.tombstones,
            load_factor: (self.len + self.tombstones) as f64 / self.capacity() as f64,
            max_probe_length: max_probe,
            average_probe_length: if self.len == 0 {
                0.0
            } else {
                total_probe as f64 / self.len as f64
            },
            resizes: self.resizes,
        }
    }
}

fn empty_slots<V>(capacity: usize) -> Vec<Slot<V>> {
    let mut slots = Vec::with_capacity(capacity);
    slots.resize_with(capacity, || Slot::Empty);
    slots
}

/// Thread-safe exact registry of flow records
#[derive(Debug)]
pub struct ExactRegistry {
    table: RwLock<RobinHoodTable<FlowRecord>>,
}

impl ExactRegistry {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            table: RwLock::new(RobinHoodTable::with_capacity(
                config.initial_capacity,
                config.max_load_factor,
            )),
        }
    }

    /// Store a record under its key, returning the record it replaced
    pub fn insert(&self, record: FlowRecord) -> Option<FlowRecord> {
        self.table.write().insert(record.key, record)
    }

    pub fn find(&self, key: &FlowKey) -> Option<FlowRecord> {
        self.table.read().get(key).copied()
    }

    pub fn remove(&self, key: &FlowKey) -> Option<FlowRecord> {
        self.table.write().remove(key)
    }

    pub fn contains(&self, key: &FlowKey) -> bool {
        self.table.read().contains(key)
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    /// Snapshot of every live key
    pub fn keys(&self) -> Vec<FlowKey> {
        self.table.read().keys()
    }

    pub fn stats(&self) -> RegistryStats {
        self.table.read().stats()
    }

    pub fn is_healthy(&self) -> bool {
        let stats = self.stats();
        stats.load_factor < HEALTHY_LOAD_FACTOR && stats.max_probe_length < HEALTHY_MAX_PROBE
    }
}
