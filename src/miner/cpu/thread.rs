// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/cpu/thread.rs
// Version: 2.1.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file contains the per-worker loop of the CPU backend, located in the
// cpu subdirectory of the miner module. A worker pulls nonce sub-ranges from a
// shared queue, hashes them, and reports the first nonce reaching the
// threshold.

use crate::core::{BlockHash, WorkHasher};
use crossbeam::channel::{Receiver, Sender};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

/// Outcome of scanning one sub-range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanResult {
    pub found: Option<u64>,
    /// Nonces actually hashed before returning
    pub scanned: u64,
}

/// Flags that end a scan early
#[derive(Debug, Clone, Copy)]
pub struct StopFlags<'a> {
    /// Raised once any worker of the batch reports a match
    pub found: &'a AtomicBool,
    /// Raised when the owning work request is cancelled
    pub request: &'a AtomicBool,
}

impl StopFlags<'_> {
    #[inline]
    pub fn raised(&self) -> bool {
        self.found.load(Ordering::Relaxed) || self.request.load(Ordering::Relaxed)
    }
}

/// Scan `range` in ascending order, stopping at the first match or as soon as
/// a stop flag is raised. The flags are checked before every nonce.
pub fn scan_range(range: Range<u64>, block_hash: &BlockHash, threshold: u64, stop: StopFlags<'_>) -> ScanResult {
    let mut hasher = WorkHasher::new(block_hash);
    let mut scanned = 0u64;

    for nonce in range {
        if stop.raised() {
            break;
        }
        scanned += 1;
        if hasher.value(nonce) >= threshold {
            return ScanResult {
                found: Some(nonce),
                scanned,
            };
        }
    }

    ScanResult {
        found: None,
        scanned,
    }
}

/// Worker body: drain sub-ranges until the queue is empty or a result is in
pub fn worker_loop(
    worker_id: usize,
    jobs: Receiver<Range<u64>>,
    results: Sender<u64>,
    block_hash: BlockHash,
    threshold: u64,
    stop: StopFlags<'_>,
    hashes: &AtomicU64,
) {
    let mut chunks = 0usize;

    while let Ok(range) = jobs.recv() {
        if stop.raised() {
            break;
        }
        let result = scan_range(range, &block_hash, threshold, stop);
        hashes.fetch_add(result.scanned, Ordering::Relaxed);
        chunks += 1;

        if let Some(nonce) = result.found {
            debug!("Worker {}: found nonce {:016X} after {} chunks", worker_id, nonce, chunks);
            // Receiver may already be gone if another worker won
            let _ = results.send(nonce);
            break;
        }
    }
}


// Changelog:
// - v2.1.0 (2025-07-15): Workers also stop when their work request is cancelled.
// - v2.0.0 (2025-07-02): Rewritten for work generation.
//   - Workers pull deterministic sub-ranges from a crossbeam queue instead of random nonces.
//   - Cancellation is checked on every nonce.
