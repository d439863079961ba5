//! CRC32 payload checksums
//!
//! Hardware-accelerated via `crc32fast`. The checksum covers the payload only;
//! the header is validated structurally (magic, version, length).

/// Calculate the CRC32 checksum of a payload
pub fn calculate_crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Verify a payload against an expected checksum
pub fn verify_payload_checksum(payload: &[u8], expected: u32) -> bool {
    calculate_crc32(payload) == expected
}
