// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/server/jobs.rs
// Version: 1.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file tracks in-flight work_generate jobs by block hash, located in the
// server module. Each hash owns a cancel flag that the engine loop and the CPU
// workers poll; work_cancel raises it.
//
// Tree Location:
// - src/server/jobs.rs (in-flight job registry)
// - Depends on: core::types

use crate::core::BlockHash;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

struct JobEntry {
    cancel: Arc<AtomicBool>,
    waiters: usize,
}

/// In-flight jobs keyed by block hash. Concurrent requests for the same hash
/// share one flag, so a single cancel ends all of them.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<BlockHash, JobEntry>>,
}

/// Keeps a job registered until dropped
pub struct JobHandle<'a> {
    registry: &'a JobRegistry,
    block_hash: BlockHash,
    cancel: Arc<AtomicBool>,
}

impl JobHandle<'_> {
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }
}

impl Drop for JobHandle<'_> {
    fn drop(&mut self) {
        let mut jobs = self.registry.lock();
        if let Some(entry) = jobs.get_mut(&self.block_hash) {
            // A cancelled entry may already have been replaced by a newer job
            if Arc::ptr_eq(&entry.cancel, &self.cancel) {
                entry.waiters -= 1;
                if entry.waiters == 0 {
                    jobs.remove(&self.block_hash);
                }
            }
        }
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<BlockHash, JobEntry>> {
        // The map stays consistent even if a holder panicked
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, block_hash: BlockHash) -> JobHandle<'_> {
        let mut jobs = self.lock();
        let entry = jobs.entry(block_hash).or_insert_with(|| JobEntry {
            cancel: Arc::new(AtomicBool::new(false)),
            waiters: 0,
        });
        entry.waiters += 1;
        JobHandle {
            registry: self,
            block_hash,
            cancel: Arc::clone(&entry.cancel),
        }
    }

    /// Raise the cancel flag of the job for `block_hash`. Returns false when
    /// no job is in flight for it.
    pub fn cancel(&self, block_hash: &BlockHash) -> bool {
        match self.lock().remove(block_hash) {
            Some(entry) => {
                entry.cancel.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, block_hash: &BlockHash) -> bool {
        self.lock().contains_key(block_hash)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}


// Changelog:
// - v1.0.0 (2025-07-15): Initial job registry with per-hash cancel flags.
