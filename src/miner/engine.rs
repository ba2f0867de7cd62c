// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/engine.rs
// Version: 1.2.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file contains the work search engine, located in the miner module. It
// walks the nonce space in batches from a cursor, hands each batch to the
// accelerator or the CPU backend, retries timed-out accelerator batches,
// degrades to the CPU on accelerator faults and verifies every result on the
// CPU before returning it.
//
// Tree Location:
// - src/miner/engine.rs (batch search loop)
// - Depends on: tokio (blocking pool), cpu, gpu, stats

use crate::core::{BlockHash, SearchConfig, format_difficulty, meets_threshold};
use crate::miner::backend::{BackendKind, Batch, BatchOutcome, BatchSearch};
use crate::miner::cpu::CpuBackend;
use crate::miner::gpu::{AcceleratorBackend, ComputeDevice, NoDevice};
use crate::miner::stats::{SearchProgress, WorkStats};
use crate::utils::FormatUtils;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkError {
    #[error("nonce space exhausted without reaching the threshold")]
    NotFound,

    #[error("Work request limit exceeded")]
    LimitExceeded,

    #[error("nonce {0:016X} failed CPU verification")]
    Verification(u64),

    #[error("search task failed: {0}")]
    Task(String),

    #[error("work request cancelled")]
    Cancelled,
}

pub struct WorkSearchEngine<D: ComputeDevice = NoDevice> {
    config: SearchConfig,
    cpu: CpuBackend,
    accelerator: Option<Arc<Mutex<AcceleratorBackend<D>>>>,
    accelerator_name: Option<String>,
    stats: Arc<WorkStats>,
}

impl WorkSearchEngine<NoDevice> {
    /// Engine that only ever searches on the CPU
    pub fn cpu_only(config: SearchConfig, cpu: CpuBackend, stats: Arc<WorkStats>) -> Self {
        Self::new(config, cpu, None, stats)
    }
}

impl<D: ComputeDevice + 'static> WorkSearchEngine<D> {
    pub fn new(
        config: SearchConfig,
        cpu: CpuBackend,
        accelerator: Option<AcceleratorBackend<D>>,
        stats: Arc<WorkStats>,
    ) -> Self {
        let cpu = cpu.with_hash_counter(stats.hash_counter());
        let accelerator_name = accelerator.as_ref().map(|gpu| gpu.device_name());

        info!(
            "🚀 Work engine ready: backend={}, threshold={}, gpu batch={}, cpu batch={}",
            accelerator_name.as_deref().unwrap_or("cpu"),
            format_difficulty(config.threshold),
            config.gpu_batch_size,
            config.cpu_batch_size
        );

        Self {
            config,
            cpu,
            accelerator: accelerator.map(|gpu| Arc::new(Mutex::new(gpu))),
            accelerator_name,
            stats,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn threshold(&self) -> u64 {
        self.config.threshold
    }

    pub fn stats(&self) -> Arc<WorkStats> {
        Arc::clone(&self.stats)
    }

    /// Backend each request starts on
    pub fn primary_backend(&self) -> BackendKind {
        if self.accelerator.is_some() {
            BackendKind::Accelerator
        } else {
            BackendKind::Cpu
        }
    }

    /// Human readable backend description for status replies
    pub fn backend_label(&self) -> String {
        match &self.accelerator_name {
            Some(name) => format!("gpu ({})", name),
            None => format!("cpu ({} threads)", self.cpu.threads()),
        }
    }

    /// Search from nonce 0 for a nonce reaching the configured threshold
    pub async fn generate_work(&self, block_hash: BlockHash) -> Result<u64, WorkError> {
        self.generate_work_from(block_hash, 0).await
    }

    /// Search batches from `start` upward until a nonce verifies or the nonce
    /// space cannot hold another full batch
    pub async fn generate_work_from(&self, block_hash: BlockHash, start: u64) -> Result<u64, WorkError> {
        let never = Arc::new(AtomicBool::new(false));
        self.search(block_hash, self.config.threshold, start, never).await
    }

    /// Search from nonce 0 against a request-specific threshold. Raising
    /// `cancel` ends the search with `WorkError::Cancelled`.
    pub async fn generate_work_with(
        &self,
        block_hash: BlockHash,
        threshold: u64,
        cancel: Arc<AtomicBool>,
    ) -> Result<u64, WorkError> {
        self.search(block_hash, threshold, 0, cancel).await
    }

    async fn search(
        &self,
        block_hash: BlockHash,
        threshold: u64,
        start: u64,
        cancel: Arc<AtomicBool>,
    ) -> Result<u64, WorkError> {
        let mut backend = self.primary_backend();
        let mut cursor = start;
        let mut timeouts = 0u32;
        let mut progress = SearchProgress::new(block_hash);

        info!(
            "🔍 Generating work for {} from nonce {} on {} (threshold {})",
            block_hash,
            start,
            backend,
            format_difficulty(threshold)
        );

        loop {
            if cancel.load(Ordering::Relaxed) {
                info!("🛑 Work for {} cancelled after {} nonces", block_hash, progress.searched());
                return Err(WorkError::Cancelled);
            }

            let size = match backend {
                BackendKind::Accelerator => self.config.gpu_batch_size as u64,
                BackendKind::Cpu => self.config.cpu_batch_size,
            };
            let Some(batch) = Batch::new(cursor, size) else {
                warn!("Nonce space exhausted for {} at cursor {}", block_hash, cursor);
                return Err(WorkError::NotFound);
            };

            match self.run_batch(backend, batch, block_hash, threshold, &cancel).await? {
                BatchOutcome::Found(nonce) => {
                    if batch.range().contains(&nonce) && meets_threshold(nonce, &block_hash, threshold) {
                        info!(
                            "✅ Found work {:016X} for {} in {} ({} nonces)",
                            nonce,
                            block_hash,
                            FormatUtils::format_duration(progress.elapsed()),
                            progress.searched().saturating_add(nonce - batch.start + 1)
                        );
                        return Ok(nonce);
                    }
                    error!("❌ {} backend returned nonce {:016X} that fails verification", backend, nonce);
                    if backend == BackendKind::Cpu {
                        return Err(WorkError::Verification(nonce));
                    }
                    self.degrade(&mut backend, "result failed verification");
                }
                // A cancelled CPU batch ends early and reports no match
                BatchOutcome::NoMatch if cancel.load(Ordering::Relaxed) => {}
                BatchOutcome::NoMatch => {
                    progress.record_batch(backend, batch.start, batch.size);
                    cursor = batch.end();
                    timeouts = 0;
                }
                BatchOutcome::TimedOut => {
                    timeouts += 1;
                    if timeouts > self.config.gpu_retries {
                        self.degrade(&mut backend, "batch kept timing out");
                    } else {
                        debug!("Retrying batch at {} (attempt {})", batch.start, timeouts + 1);
                    }
                }
                BatchOutcome::Fault(reason) => {
                    self.degrade(&mut backend, &reason);
                }
            }
        }
    }

    /// Switch the current request to the CPU; the cursor stays on the failed batch
    fn degrade(&self, backend: &mut BackendKind, reason: &str) {
        self.stats.record_accelerator_fault();
        warn!("⚠️ Accelerator fault ({}), continuing on CPU", reason);
        *backend = BackendKind::Cpu;
    }

    async fn run_batch(
        &self,
        backend: BackendKind,
        batch: Batch,
        block_hash: BlockHash,
        threshold: u64,
        cancel: &Arc<AtomicBool>,
    ) -> Result<BatchOutcome, WorkError> {
        let outcome = match (backend, &self.accelerator) {
            (BackendKind::Accelerator, Some(accelerator)) => {
                let accelerator = Arc::clone(accelerator);
                let outcome = tokio::task::spawn_blocking(move || match accelerator.lock() {
                    Ok(mut gpu) => gpu.search_batch(batch, &block_hash, threshold),
                    Err(_) => BatchOutcome::Fault("accelerator lock poisoned".to_string()),
                })
                .await
                .map_err(|e| WorkError::Task(e.to_string()))?;

                match outcome {
                    BatchOutcome::NoMatch => self.stats.add_hashes(batch.size),
                    BatchOutcome::Found(nonce) if nonce >= batch.start => {
                        self.stats.add_hashes(nonce - batch.start + 1)
                    }
                    _ => {}
                }
                outcome
            }
            (BackendKind::Accelerator, None) => BatchOutcome::Fault("no accelerator configured".to_string()),
            (BackendKind::Cpu, _) => {
                let mut cpu = self.cpu.clone().with_cancel_flag(Arc::clone(cancel));
                tokio::task::spawn_blocking(move || cpu.search_batch(batch, &block_hash, threshold))
                    .await
                    .map_err(|e| WorkError::Task(e.to_string()))?
            }
        };

        Ok(outcome)
    }
}


// Changelog:
// - v1.2.0 (2025-07-15): Per-request threshold and cancellation.
// - v1.1.0 (2025-07-08): Timed-out GPU batches are retried before degrading.
//   - Accelerator results are re-verified on the CPU.
// - v1.0.0 (2025-07-02): Initial batch search loop with CPU fallback.
