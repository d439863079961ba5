//! Property tests: registry and cache against `HashMap` models

use flow_config::{CacheConfig, EvictionPolicy};
use flow_registry::{FlowCache, PreFilterBank, RobinHoodTable};
use flow_types::FlowKey;
use proptest::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Op {
    Insert(u16, u32),
    Remove(u16),
    Get(u16),
}

fn op() -> impl Strategy<Value = Op> {
    // Small key space so overwrites, removals and tombstone reuse are common
    prop_oneof![
        4 => (0u16..512, any::<u32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        2 => (0u16..512).prop_map(Op::Remove),
        2 => (0u16..512).prop_map(Op::Get),
    ]
}

fn key(k: u16) -> FlowKey {
    FlowKey::from_u64(k as u64)
}

proptest! {
    #[test]
    fn registry_matches_hashmap(ops in prop::collection::vec(op(), 1..2_000)) {
        let mut table = RobinHoodTable::with_capacity(16, 0.75);
        let mut model: HashMap<u16, u32> = HashMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    prop_assert_eq!(table.insert(key(k), v), model.insert(k, v));
                }
                Op::Remove(k) => {
                    prop_assert_eq!(table.remove(&key(k)), model.remove(&k));
                }
                Op::Get(k) => {
                    prop_assert_eq!(table.get(&key(k)).copied(), model.get(&k).copied());
                }
            }
            prop_assert_eq!(table.len(), model.len());
        }

        for (k, v) in &model {
            prop_assert_eq!(table.get(&key(*k)), Some(v));
        }
        let stats = table.stats();
        prop_assert!(stats.load_factor <= 0.75 + f64::EPSILON);
        prop_assert!(stats.max_probe_length < 100);
    }

    #[test]
    fn cache_never_exceeds_capacity(
        ops in prop::collection::vec(op(), 1..1_000),
        capacity in 1usize..64,
        policy in prop_oneof![
            Just(EvictionPolicy::Lru),
            Just(EvictionPolicy::Lfu),
            Just(EvictionPolicy::Fifo),
            Just(EvictionPolicy::Random),
        ],
    ) {
        let config = CacheConfig {
            max_entries: capacity,
            policy,
            ..CacheConfig::default()
        };
        let mut cache = FlowCache::new(&config);
        let mut latest: HashMap<u16, u32> = HashMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    cache.put(key(k), v);
                    latest.insert(k, v);
                }
                Op::Remove(k) => {
                    cache.remove(&key(k));
                    latest.remove(&k);
                }
                Op::Get(k) => {
                    // A cached value is always the latest write
                    if let Some(v) = cache.get(&key(k)) {
                        prop_assert_eq!(Some(v), latest.get(&k));
                    }
                }
            }
            prop_assert!(cache.len() <= capacity);
            prop_assert_eq!(cache.keys().len(), cache.len());
        }
    }

    #[test]
    fn prefilter_has_no_false_negatives(keys in prop::collection::vec(any::<[u8; 16]>(), 1..500)) {
        let mut bank = PreFilterBank::new(&flow_config::PreFilterConfig {
            expected_entries: 64,
            false_positive_rate: 0.01,
            max_filters: 16,
        });

        for raw in &keys {
            bank.add(&FlowKey::from_bytes(raw));
        }
        for raw in &keys {
            prop_assert!(bank.contains(&FlowKey::from_bytes(raw)));
        }
    }
}
