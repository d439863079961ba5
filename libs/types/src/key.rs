//! Content keys
//!
//! Every structure in the registry is keyed by a fixed 32-byte [`FlowKey`].
//! Callers may hand in keys of any length:
//!
//! - exactly 32 bytes: used verbatim
//! - shorter: zero-padded on the right
//! - longer: replaced by their BLAKE3 digest
//!
//! Normalization happens once at the edge so the hash table, filters and cache
//! never see variable-length input.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of a normalized flow key in bytes
pub const FLOW_KEY_SIZE: usize = 32;

/// Normalized 32-byte content key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct FlowKey([u8; FLOW_KEY_SIZE]);

impl FlowKey {
    /// Normalize arbitrary key bytes into a flow key
    pub fn from_bytes(raw: &[u8]) -> Self {
        if raw.len() > FLOW_KEY_SIZE {
            return Self(*blake3::hash(raw).as_bytes());
        }

        let mut key = [0u8; FLOW_KEY_SIZE];
        key[..raw.len()].copy_from_slice(raw);
        Self(key)
    }

    /// Wrap an already-normalized 32-byte key
    pub const fn from_array(key: [u8; FLOW_KEY_SIZE]) -> Self {
        Self(key)
    }

    /// Key derived from a sequence number (little-endian, zero-padded)
    pub fn from_u64(value: u64) -> Self {
        Self::from_bytes(&value.to_le_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; FLOW_KEY_SIZE] {
        &self.0
    }

    /// BLAKE3 digest of the normalized key.
    ///
    /// Shared source of hash bits for the exact registry (home slot) and the
    /// pre-filter (bit indices).
    pub fn digest(&self) -> [u8; 32] {
        *blake3::hash(&self.0).as_bytes()
    }

    /// 64-bit hash taken from the first 8 digest bytes
    pub fn hash64(&self) -> u64 {
        let digest = self.digest();
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(word)
    }

    /// Hex encoding of the key
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; FLOW_KEY_SIZE]> for FlowKey {
    fn from(key: [u8; FLOW_KEY_SIZE]) -> Self {
        Self(key)
    }
}

impl AsRef<[u8]> for FlowKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First 8 bytes are enough to tell keys apart in logs
        write!(f, "FlowKey({}…)", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
