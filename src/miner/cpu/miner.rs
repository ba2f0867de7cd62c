// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/cpu/miner.rs
// Version: 3.1.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file contains the CPU backend, located in the cpu subdirectory of the
// miner module. A batch is split into sub-ranges that a pool of scoped worker
// threads drains; the first worker to find a nonce wins and the rest stop.

use super::thread::{StopFlags, worker_loop};
use crate::core::BlockHash;
use crate::miner::backend::{BackendKind, Batch, BatchOutcome, BatchSearch};
use crossbeam::channel;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};

/// Smallest sub-range handed to a worker
pub const MIN_CHUNK_SIZE: u64 = 10_000;

/// Sub-ranges per worker, so faster cores pick up more work
pub const CHUNK_FANOUT: u64 = 4;

#[derive(Debug, Clone)]
pub struct CpuBackend {
    threads: usize,
    min_chunk: u64,
    fanout: u64,
    hashes: Arc<AtomicU64>,
    /// Cancellation flag of the request this backend is searching for
    request_cancel: Arc<AtomicBool>,
}

impl CpuBackend {
    /// Backend with `threads` workers; 0 uses every logical core
    pub fn new(threads: usize) -> Self {
        let threads = if threads == 0 { num_cpus::get() } else { threads };

        info!("🧮 CPU backend using {} worker threads", threads);

        Self {
            threads,
            min_chunk: MIN_CHUNK_SIZE,
            fanout: CHUNK_FANOUT,
            hashes: Arc::new(AtomicU64::new(0)),
            request_cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a hash counter with the caller's statistics
    pub fn with_hash_counter(mut self, hashes: Arc<AtomicU64>) -> Self {
        self.hashes = hashes;
        self
    }

    /// Stop workers as soon as `cancel` is raised
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.request_cancel = cancel;
        self
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// max(min_chunk, batch / (threads * fanout))
    pub fn chunk_size(&self, batch_size: u64) -> u64 {
        let divisor = (self.threads as u64).saturating_mul(self.fanout).max(1);
        (batch_size / divisor).max(self.min_chunk)
    }

    /// Search a batch; returns the first nonce any worker reports, or None when
    /// the batch holds no match or the request was cancelled
    pub fn search(&self, batch: Batch, block_hash: &BlockHash, threshold: u64) -> Option<u64> {
        if batch.size == 0 {
            return None;
        }

        let chunk = self.chunk_size(batch.size);
        let (job_tx, job_rx) = channel::unbounded();
        for range in batch.chunks(chunk) {
            // Receiver is alive, send cannot fail
            let _ = job_tx.send(range);
        }
        drop(job_tx);

        let workers = self.threads.min(batch.size.div_ceil(chunk) as usize).max(1);
        let (result_tx, result_rx) = channel::bounded(workers);
        let found = AtomicBool::new(false);
        let stop = StopFlags {
            found: &found,
            request: self.request_cancel.as_ref(),
        };

        debug!(
            "CPU batch {}..{}: {} workers, chunk {}",
            batch.start,
            batch.end(),
            workers,
            chunk
        );

        std::thread::scope(|scope| {
            for worker_id in 0..workers {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                let hashes = self.hashes.as_ref();
                let block_hash = *block_hash;
                scope.spawn(move || {
                    worker_loop(worker_id, jobs, results, block_hash, threshold, stop, hashes);
                });
            }
            drop(result_tx);

            // Err means every worker exited without a match
            let nonce = result_rx.recv().ok();
            found.store(true, Ordering::Relaxed);
            nonce
        })
    }
}

impl BatchSearch for CpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn search_batch(&mut self, batch: Batch, block_hash: &BlockHash, threshold: u64) -> BatchOutcome {
        match self.search(batch, block_hash, threshold) {
            Some(nonce) => BatchOutcome::Found(nonce),
            None => BatchOutcome::NoMatch,
        }
    }
}


// Changelog:
// - v3.1.0 (2025-07-15): Per-request cancel flag checked by every worker.
// - v3.0.0 (2025-07-02): Replaced the pool-driven CpuMiner with CpuBackend.
//   - Scoped worker threads share a crossbeam queue of nonce sub-ranges.
//   - First result wins and raises a shared cancel flag.
