// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/blake2b.rs
// Version: 1.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file implements the work hash rule on top of Blake2b, located in the
// core subdirectory of the work server source tree. It provides the hashing
// functions shared by the CPU backend, result verification and diagnostics.
//
// Tree Location:
// - src/core/blake2b.rs (work hash rule)
// - Depends on: blake2 crate
//
// Byte order: the nonce occupies input bytes 0..8 in little-endian order, the
// block hash follows as raw bytes 8..40, and the 8-byte digest is read as a
// little-endian u64. The OpenCL kernel uses the same layout.

use crate::core::types::BlockHash;
use blake2::digest::consts::U8;
use blake2::{Blake2b, Blake2b512, Digest};

/// Blake2b parameterised for an 8-byte digest
type Blake2b64 = Blake2b<U8>;

/// Size of the hash input: nonce (8) + block hash (32)
pub const WORK_INPUT_LEN: usize = 40;

/// Blake2b with the default 64-byte output
pub fn blake2b_512(data: &[u8]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out.copy_from_slice(&Blake2b512::digest(data));
    out
}

/// Build the 40-byte hash input for a nonce
pub fn work_input(nonce: u64, block_hash: &BlockHash) -> [u8; WORK_INPUT_LEN] {
    let mut input = [0u8; WORK_INPUT_LEN];
    input[..8].copy_from_slice(&nonce.to_le_bytes());
    input[8..].copy_from_slice(block_hash.as_bytes());
    input
}

/// 8-byte digest of the work input
pub fn work_digest(input: &[u8; WORK_INPUT_LEN]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&Blake2b64::digest(input));
    out
}

/// Numeric work value of a nonce for a block hash
pub fn work_value(nonce: u64, block_hash: &BlockHash) -> u64 {
    u64::from_le_bytes(work_digest(&work_input(nonce, block_hash)))
}

/// Whether a nonce reaches the threshold
pub fn meets_threshold(nonce: u64, block_hash: &BlockHash, threshold: u64) -> bool {
    work_value(nonce, block_hash) >= threshold
}

/// Reusable input buffer for scanning consecutive nonces of one block hash
pub struct WorkHasher {
    input: [u8; WORK_INPUT_LEN],
}

impl WorkHasher {
    pub fn new(block_hash: &BlockHash) -> Self {
        Self {
            input: work_input(0, block_hash),
        }
    }

    /// Work value of `nonce`, rewriting only the nonce bytes
    #[inline]
    pub fn value(&mut self, nonce: u64) -> u64 {
        self.input[..8].copy_from_slice(&nonce.to_le_bytes());
        u64::from_le_bytes(work_digest(&self.input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blake2::Blake2bVar;
    use blake2::digest::{Update, VariableOutput};

    #[test]
    fn test_work_input_layout() {
        let hash = BlockHash::new([0xAB; 32]);
        let input = work_input(0x0102030405060708, &hash);
        assert_eq!(&input[..8], &[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
        assert!(input[8..].iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_digest_matches_variable_output() {
        // The typed 8-byte hasher must equal Blake2b with outlen=8, not a truncated 64-byte hash
        let hash = BlockHash::new([7u8; 32]);
        let input = work_input(42, &hash);

        let mut var = Blake2bVar::new(8).unwrap();
        var.update(&input);
        let mut expected = [0u8; 8];
        var.finalize_variable(&mut expected).unwrap();

        assert_eq!(work_digest(&input), expected);
        assert_ne!(&blake2b_512(&input)[..8], &expected);
    }

    #[test]
    fn test_hasher_matches_free_function() {
        let hash = BlockHash::new([3u8; 32]);
        let mut hasher = WorkHasher::new(&hash);
        for nonce in [0u64, 1, 2, u64::MAX] {
            assert_eq!(hasher.value(nonce), work_value(nonce, &hash));
        }
    }

    #[test]
    fn test_threshold_edges() {
        let hash = BlockHash::new([0u8; 32]);
        assert!(meets_threshold(5, &hash, 0));
        let value = work_value(5, &hash);
        assert!(meets_threshold(5, &hash, value));
        if value < u64::MAX {
            assert!(!meets_threshold(5, &hash, value + 1));
        }
    }
}

// Changelog:
// - v1.0.0 (2025-07-02): Replaced SHA3x triple hashing with Blake2b work hashing.
//   - Typed 8-byte Blake2b output, little-endian nonce and digest.
//   - WorkHasher reuses the input buffer across nonces.
