// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/gpu/accelerator.rs
// Version: 1.0.1
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file contains the accelerator backend, located in the gpu subdirectory
// of the miner module. It owns a ComputeDevice, keeps one set of device
// buffers keyed by batch size, and turns a dispatch into a BatchOutcome.

use super::{ComputeDevice, DispatchStatus, KernelParams};
use crate::core::BlockHash;
use crate::miner::backend::{BackendKind, Batch, BatchOutcome, BatchSearch};
use log::{debug, info, warn};
use std::time::{Duration, Instant};

const LOG_TARGET: &str = "nano_pow::accelerator";

struct CachedBuffers<B> {
    batch_size: u32,
    buffers: B,
}

pub struct AcceleratorBackend<D: ComputeDevice> {
    device: D,
    cache: Option<CachedBuffers<D::Buffers>>,
    timeout: Duration,
    allocations: u64,
}

impl<D: ComputeDevice> AcceleratorBackend<D> {
    pub fn new(device: D, timeout: Duration) -> Self {
        info!(target: LOG_TARGET, "🎮 Accelerator backend on {} (timeout {:?})", device.name(), timeout);
        Self {
            device,
            cache: None,
            timeout,
            allocations: 0,
        }
    }

    pub fn device_name(&self) -> String {
        self.device.name()
    }

    /// Number of buffer allocations made so far
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Make sure buffers for `batch_size` exist, reallocating only when the size changes
    fn ensure_buffers(&mut self, batch_size: u32) -> anyhow::Result<()> {
        if matches!(&self.cache, Some(cached) if cached.batch_size == batch_size) {
            return Ok(());
        }
        // Release the old set before allocating the new one
        self.cache = None;
        let buffers = self.device.allocate(batch_size)?;
        self.allocations += 1;
        debug!(target: LOG_TARGET, "Allocated device buffers for batch size {}", batch_size);
        self.cache = Some(CachedBuffers { batch_size, buffers });
        Ok(())
    }

    fn run(&mut self, params: &KernelParams) -> anyhow::Result<DispatchStatus> {
        self.ensure_buffers(params.count)?;
        let Self { device, cache, timeout, .. } = self;
        let cached = cache
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("buffer cache empty after allocation"))?;
        device.reset_valid_count(&mut cached.buffers)?;
        device.dispatch(&mut cached.buffers, params, *timeout)
    }

    /// Evaluate `count` lanes from `start` and return every lane's work value
    pub fn lane_values(&mut self, start: u64, count: u32, block_hash: &BlockHash) -> anyhow::Result<Vec<u64>> {
        let params = KernelParams {
            start,
            count,
            block_hash: block_hash.to_le_words(),
            threshold: u64::MAX,
            record_values: true,
        };
        match self.run(&params)? {
            DispatchStatus::Completed => {}
            DispatchStatus::TimedOut => anyhow::bail!("dispatch of {} lanes timed out", count),
        }
        let cached = self
            .cache
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("buffer cache empty after dispatch"))?;
        self.device.read_lane_values(&cached.buffers, count)
    }

    fn search(&mut self, batch: Batch, block_hash: &BlockHash, threshold: u64) -> anyhow::Result<BatchOutcome> {
        let count = u32::try_from(batch.size)
            .map_err(|_| anyhow::anyhow!("batch of {} nonces exceeds the device lane limit", batch.size))?;
        if count == 0 {
            return Ok(BatchOutcome::NoMatch);
        }

        let params = KernelParams {
            start: batch.start,
            count,
            block_hash: block_hash.to_le_words(),
            threshold,
            record_values: false,
        };

        let started = Instant::now();
        match self.run(&params)? {
            DispatchStatus::Completed => {}
            DispatchStatus::TimedOut => {
                warn!(target: LOG_TARGET, "⚠️ GPU batch at {} timed out after {:?}", batch.start, self.timeout);
                return Ok(BatchOutcome::TimedOut);
            }
        }

        let cached = self
            .cache
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("buffer cache empty after dispatch"))?;
        let output = self.device.read_output(&cached.buffers)?;

        if output.valid_count == 0 {
            return Ok(BatchOutcome::NoMatch);
        }
        match output.valid_indices.first() {
            Some(&index) if index < count => {
                debug!(target: LOG_TARGET,
                    "GPU batch at {} reported {} valid lanes in {:.2}ms",
                    batch.start,
                    output.valid_count,
                    started.elapsed().as_secs_f64() * 1000.0
                );
                Ok(BatchOutcome::Found(batch.start + index as u64))
            }
            // The batch holds a match we cannot locate; the engine re-runs it on the CPU
            _ => {
                warn!(target: LOG_TARGET, "GPU reported {} valid lanes without a usable index", output.valid_count);
                Ok(BatchOutcome::Fault(format!(
                    "{} valid lanes reported without a usable index",
                    output.valid_count
                )))
            }
        }
    }
}

impl<D: ComputeDevice> BatchSearch for AcceleratorBackend<D> {
    fn kind(&self) -> BackendKind {
        BackendKind::Accelerator
    }

    fn search_batch(&mut self, batch: Batch, block_hash: &BlockHash, threshold: u64) -> BatchOutcome {
        match self.search(batch, block_hash, threshold) {
            Ok(outcome) => outcome,
            Err(e) => BatchOutcome::Fault(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::work_value;
    use crate::miner::gpu::{KernelOutput, VALID_INDICES_CAPACITY};

    /// Evaluates lanes on the host and records calls
    #[derive(Default)]
    struct HostDevice {
        resets: u32,
        dispatches: u32,
        time_out: bool,
        fail_allocate: bool,
        stale_count: Option<u32>,
        /// Report a valid lane with an index past the batch
        lost_index: bool,
        /// `record_values` flag of every dispatch
        recorded: Vec<bool>,
    }

    struct HostBuffers {
        size: u32,
        values: Vec<u64>,
        valid_count: u32,
        valid_indices: Vec<u32>,
    }

    impl ComputeDevice for HostDevice {
        type Buffers = HostBuffers;

        fn name(&self) -> String {
            "host".to_string()
        }

        fn allocate(&mut self, batch_size: u32) -> anyhow::Result<HostBuffers> {
            if self.fail_allocate {
                anyhow::bail!("out of device memory");
            }
            Ok(HostBuffers {
                size: batch_size,
                values: vec![0; batch_size as usize],
                valid_count: self.stale_count.unwrap_or(0),
                valid_indices: Vec::new(),
            })
        }

        fn reset_valid_count(&mut self, buffers: &mut HostBuffers) -> anyhow::Result<()> {
            self.resets += 1;
            buffers.valid_count = 0;
            buffers.valid_indices.clear();
            Ok(())
        }

        fn dispatch(&mut self, buffers: &mut HostBuffers, params: &KernelParams, _timeout: Duration) -> anyhow::Result<DispatchStatus> {
            self.dispatches += 1;
            self.recorded.push(params.record_values);
            if self.time_out {
                return Ok(DispatchStatus::TimedOut);
            }
            assert_eq!(buffers.size, params.count);
            let mut bytes = [0u8; 32];
            for (i, word) in params.block_hash.iter().enumerate() {
                bytes[i * 8..(i + 1) * 8].copy_from_slice(&word.to_le_bytes());
            }
            let hash = BlockHash::new(bytes);
            for lane in 0..params.count {
                let value = work_value(params.start + lane as u64, &hash);
                if params.record_values {
                    buffers.values[lane as usize] = value;
                }
                if value >= params.threshold {
                    if (buffers.valid_count as usize) < VALID_INDICES_CAPACITY {
                        buffers.valid_indices.push(lane);
                    }
                    buffers.valid_count += 1;
                }
            }
            Ok(DispatchStatus::Completed)
        }

        fn read_output(&mut self, buffers: &HostBuffers) -> anyhow::Result<KernelOutput> {
            if self.lost_index {
                return Ok(KernelOutput {
                    valid_count: 1,
                    valid_indices: vec![buffers.size],
                });
            }
            Ok(KernelOutput {
                valid_count: buffers.valid_count,
                valid_indices: buffers.valid_indices.clone(),
            })
        }

        fn read_lane_values(&mut self, buffers: &HostBuffers, count: u32) -> anyhow::Result<Vec<u64>> {
            Ok(buffers.values[..count as usize].to_vec())
        }
    }

    const HASH: BlockHash = BlockHash::new([0x5A; 32]);

    fn backend(device: HostDevice) -> AcceleratorBackend<HostDevice> {
        AcceleratorBackend::new(device, Duration::from_millis(500))
    }

    #[test]
    fn test_found_nonce_is_offset_from_batch_start() {
        let mut gpu = backend(HostDevice::default());
        let threshold = u64::MAX - u64::MAX / 32;
        let batch = Batch::new(1_000, 4_096).unwrap();
        match gpu.search_batch(batch, &HASH, threshold) {
            BatchOutcome::Found(nonce) => {
                assert!(batch.range().contains(&nonce));
                assert!(work_value(nonce, &HASH) >= threshold);
            }
            other => panic!("expected a hit, got {:?}", other),
        }
    }

    #[test]
    fn test_buffers_reused_for_same_batch_size() {
        let mut gpu = backend(HostDevice::default());
        for start in [0u64, 256, 512] {
            gpu.search_batch(Batch::new(start, 256).unwrap(), &HASH, u64::MAX);
        }
        assert_eq!(gpu.allocations(), 1);
        gpu.search_batch(Batch::new(0, 128).unwrap(), &HASH, u64::MAX);
        assert_eq!(gpu.allocations(), 2);
        assert_eq!(gpu.device.resets, 4);
        assert_eq!(gpu.device.dispatches, 4);
    }

    #[test]
    fn test_stale_count_is_reset_before_dispatch() {
        let mut gpu = backend(HostDevice {
            stale_count: Some(7),
            ..HostDevice::default()
        });
        let outcome = gpu.search_batch(Batch::new(0, 64).unwrap(), &HASH, u64::MAX);
        assert_eq!(outcome, BatchOutcome::NoMatch);
    }

    #[test]
    fn test_timeout_and_fault_outcomes() {
        let mut gpu = backend(HostDevice {
            time_out: true,
            ..HostDevice::default()
        });
        assert_eq!(gpu.search_batch(Batch::new(0, 64).unwrap(), &HASH, 0), BatchOutcome::TimedOut);

        let mut gpu = backend(HostDevice {
            fail_allocate: true,
            ..HostDevice::default()
        });
        assert!(matches!(
            gpu.search_batch(Batch::new(0, 64).unwrap(), &HASH, 0),
            BatchOutcome::Fault(_)
        ));
    }

    #[test]
    fn test_oversized_batch_is_a_fault() {
        let mut gpu = backend(HostDevice::default());
        let batch = Batch::new(0, u32::MAX as u64 + 1).unwrap();
        assert!(matches!(gpu.search_batch(batch, &HASH, 0), BatchOutcome::Fault(_)));
    }

    #[test]
    fn test_lane_values_match_host_hash() {
        let mut gpu = backend(HostDevice::default());
        let values = gpu.lane_values(10, 8, &HASH).unwrap();
        for (i, value) in values.iter().enumerate() {
            assert_eq!(*value, work_value(10 + i as u64, &HASH));
        }
    }

    #[test]
    fn test_only_diagnostic_dispatch_records_lane_values() {
        let mut gpu = backend(HostDevice::default());
        gpu.search_batch(Batch::new(0, 64).unwrap(), &HASH, u64::MAX);
        gpu.lane_values(0, 64, &HASH).unwrap();
        gpu.search_batch(Batch::new(64, 64).unwrap(), &HASH, u64::MAX);
        assert_eq!(gpu.device.recorded, vec![false, true, false]);
    }

    #[test]
    fn test_unlocatable_match_is_a_fault() {
        let mut gpu = backend(HostDevice {
            lost_index: true,
            ..HostDevice::default()
        });
        assert!(matches!(
            gpu.search_batch(Batch::new(0, 64).unwrap(), &HASH, 0),
            BatchOutcome::Fault(_)
        ));
    }
}

// Changelog:
// - v1.0.1 (2025-07-15): A valid count without a usable lane index is now a fault.
//   - Lane values are written by the kernel only for diagnostic dispatches.
// - v1.0.0 (2025-07-02): Initial accelerator backend.
//   - Single buffer set keyed by batch size, valid count zeroed before every dispatch.
//   - Timeouts and device errors are reported as batch outcomes for the engine.
