// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: tests/integration_test.rs
// Version: 1.2.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file contains integration tests for the work search engine, located in
// the tests directory. It drives the engine end to end with the CPU backend and
// with scripted accelerator devices that fail, stall or report bad lanes.
//
// Tree Location:
// - tests/integration_test.rs (engine integration tests)
// - Depends on: nano-pow-server, tokio, anyhow

#[cfg(test)]
mod tests {
    use nano_pow_server::core::{BlockHash, SearchConfig, meets_threshold, work_value};
    use nano_pow_server::miner::gpu::{
        AcceleratorBackend, ComputeDevice, DispatchStatus, KernelOutput, KernelParams,
    };
    use nano_pow_server::miner::{Batch, CpuBackend, WorkError, WorkSearchEngine, WorkStats};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
    use std::time::{Duration, Instant};

    const HASH: &str = "E89208DD038FBB269987689621D52292FE9B863A173550C797762D7329D0E0F7";

    fn config(threshold: u64) -> SearchConfig {
        SearchConfig {
            threshold,
            gpu_batch_size: 8_192,
            cpu_batch_size: 40_000,
            gpu_timeout: Duration::from_millis(20),
            gpu_retries: 2,
        }
    }

    /// How the scripted device misbehaves
    #[derive(Clone, Copy)]
    enum Script {
        /// Every dispatch returns an error
        Fail,
        /// Every dispatch exceeds its wait budget
        Stall,
        /// Reports lane 0 as valid whatever its value
        Lie,
        /// Evaluates lanes honestly on the host
        Honest,
        /// Reports one valid lane at an index outside the batch
        LostIndex,
    }

    struct ScriptedDevice {
        script: Script,
        dispatches: Arc<AtomicU32>,
    }

    struct Lanes {
        valid: Vec<u32>,
    }

    impl ComputeDevice for ScriptedDevice {
        type Buffers = Lanes;

        fn name(&self) -> String {
            "scripted".to_string()
        }

        fn allocate(&mut self, _batch_size: u32) -> anyhow::Result<Lanes> {
            Ok(Lanes { valid: Vec::new() })
        }

        fn reset_valid_count(&mut self, buffers: &mut Lanes) -> anyhow::Result<()> {
            buffers.valid.clear();
            Ok(())
        }

        fn dispatch(&mut self, buffers: &mut Lanes, params: &KernelParams, _timeout: Duration) -> anyhow::Result<DispatchStatus> {
            self.dispatches.fetch_add(1, Ordering::SeqCst);
            match self.script {
                Script::Fail => anyhow::bail!("device lost"),
                Script::Stall => Ok(DispatchStatus::TimedOut),
                Script::Lie => {
                    buffers.valid.push(0);
                    Ok(DispatchStatus::Completed)
                }
                Script::LostIndex => {
                    buffers.valid.push(params.count);
                    Ok(DispatchStatus::Completed)
                }
                Script::Honest => {
                    let mut bytes = [0u8; 32];
                    for (i, word) in params.block_hash.iter().enumerate() {
                        bytes[i * 8..(i + 1) * 8].copy_from_slice(&word.to_le_bytes());
                    }
                    let hash = BlockHash::new(bytes);
                    buffers.valid = (0..params.count)
                        .filter(|lane| work_value(params.start + *lane as u64, &hash) >= params.threshold)
                        .take(1024)
                        .collect();
                    Ok(DispatchStatus::Completed)
                }
            }
        }

        fn read_output(&mut self, buffers: &Lanes) -> anyhow::Result<KernelOutput> {
            Ok(KernelOutput {
                valid_count: buffers.valid.len() as u32,
                valid_indices: buffers.valid.clone(),
            })
        }

        fn read_lane_values(&mut self, _buffers: &Lanes, count: u32) -> anyhow::Result<Vec<u64>> {
            Ok(vec![0; count as usize])
        }
    }

    fn scripted_engine(script: Script, threshold: u64) -> (WorkSearchEngine<ScriptedDevice>, Arc<AtomicU32>) {
        scripted_engine_with(script, config(threshold), CpuBackend::new(2))
    }

    fn scripted_engine_with(
        script: Script,
        cfg: SearchConfig,
        cpu: CpuBackend,
    ) -> (WorkSearchEngine<ScriptedDevice>, Arc<AtomicU32>) {
        let dispatches = Arc::new(AtomicU32::new(0));
        let device = ScriptedDevice {
            script,
            dispatches: Arc::clone(&dispatches),
        };
        let accelerator = AcceleratorBackend::new(device, cfg.gpu_timeout);
        let engine = WorkSearchEngine::new(cfg, cpu, Some(accelerator), Arc::new(WorkStats::new()));
        (engine, dispatches)
    }

    #[tokio::test]
    async fn test_generated_work_meets_threshold() {
        let hash: BlockHash = HASH.parse().unwrap();
        let threshold = u64::MAX - u64::MAX / 4_096;
        let engine = WorkSearchEngine::cpu_only(config(threshold), CpuBackend::new(4), Arc::new(WorkStats::new()));

        let nonce = engine.generate_work(hash).await.unwrap();
        assert!(work_value(nonce, &hash) >= threshold);
        assert!(meets_threshold(nonce, &hash, threshold));
    }

    #[tokio::test]
    async fn test_no_false_negative_in_single_batch() {
        let hash = BlockHash::new([0x6D; 32]);
        let threshold = u64::MAX - u64::MAX / 2_000;
        let range = 0..40_000u64;
        let expected: Vec<u64> = range.clone().filter(|n| work_value(*n, &hash) >= threshold).collect();
        assert!(!expected.is_empty(), "fixture should contain a match");

        let engine = WorkSearchEngine::cpu_only(config(threshold), CpuBackend::new(3), Arc::new(WorkStats::new()));
        let nonce = engine.generate_work(hash).await.unwrap();
        assert!(expected.contains(&nonce), "{} is not one of the valid nonces", nonce);
    }

    #[tokio::test]
    async fn test_unreachable_threshold_near_end_of_space() {
        let hash = BlockHash::new([0x01; 32]);
        let engine = WorkSearchEngine::cpu_only(config(u64::MAX), CpuBackend::new(2), Arc::new(WorkStats::new()));
        let result = engine.generate_work_from(hash, u64::MAX - 100_000).await;
        assert_eq!(result, Err(WorkError::NotFound));
    }

    #[test]
    fn test_validation_is_idempotent() {
        let hash: BlockHash = HASH.parse().unwrap();
        let first = work_value(0xDEAD_BEEF, &hash);
        for _ in 0..5 {
            assert_eq!(work_value(0xDEAD_BEEF, &hash), first);
        }
        assert!(meets_threshold(0xDEAD_BEEF, &hash, first));
        assert!(first == u64::MAX || !meets_threshold(0xDEAD_BEEF, &hash, first + 1));
    }

    #[test]
    fn test_workers_stop_soon_after_first_match() {
        // Every nonce matches, so scanning should stop almost immediately
        let hashes = Arc::new(AtomicU64::new(0));
        let cpu = CpuBackend::new(4).with_hash_counter(Arc::clone(&hashes));
        let hash = BlockHash::new([0x77; 32]);
        let batch = Batch::new(0, 50_000_000).unwrap();

        let started = Instant::now();
        let nonce = cpu.search(batch, &hash, 0).unwrap();
        assert!(batch.range().contains(&nonce));
        assert!(hashes.load(Ordering::Relaxed) < 1_000_000);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_honest_accelerator_result_is_used() {
        let hash: BlockHash = HASH.parse().unwrap();
        let threshold = u64::MAX - u64::MAX / 1_024;
        let (engine, dispatches) = scripted_engine(Script::Honest, threshold);

        let nonce = engine.generate_work(hash).await.unwrap();
        assert!(meets_threshold(nonce, &hash, threshold));
        assert!(dispatches.load(Ordering::SeqCst) >= 1);
        assert_eq!(engine.stats().snapshot().accelerator_faults, 0);
    }

    #[tokio::test]
    async fn test_accelerator_error_falls_back_to_cpu() {
        let hash: BlockHash = HASH.parse().unwrap();
        let threshold = u64::MAX - u64::MAX / 1_024;
        let (engine, dispatches) = scripted_engine(Script::Fail, threshold);

        let nonce = engine.generate_work(hash).await.unwrap();
        assert!(meets_threshold(nonce, &hash, threshold));
        assert_eq!(dispatches.load(Ordering::SeqCst), 1);
        assert_eq!(engine.stats().snapshot().accelerator_faults, 1);
    }

    #[tokio::test]
    async fn test_timeouts_are_retried_then_degrade() {
        let hash: BlockHash = HASH.parse().unwrap();
        let threshold = u64::MAX - u64::MAX / 1_024;
        let (engine, dispatches) = scripted_engine(Script::Stall, threshold);

        let nonce = engine.generate_work(hash).await.unwrap();
        assert!(meets_threshold(nonce, &hash, threshold));
        // First attempt plus two retries on the same batch
        assert_eq!(dispatches.load(Ordering::SeqCst), 3);
        assert_eq!(engine.stats().snapshot().accelerator_faults, 1);
    }

    #[tokio::test]
    async fn test_bad_accelerator_result_is_rejected() {
        let hash: BlockHash = HASH.parse().unwrap();
        let threshold = u64::MAX - u64::MAX / 1_024;
        assert!(!meets_threshold(0, &hash, threshold), "fixture needs nonce 0 to be invalid");
        let (engine, _) = scripted_engine(Script::Lie, threshold);

        let nonce = engine.generate_work(hash).await.unwrap();
        assert_ne!(nonce, 0);
        assert!(meets_threshold(nonce, &hash, threshold));
        assert_eq!(engine.stats().snapshot().accelerator_faults, 1);
    }

    #[tokio::test]
    async fn test_unlocatable_match_reruns_batch_on_cpu() {
        // Every nonce is valid; a lost lane index must not skip the batch
        let hash: BlockHash = HASH.parse().unwrap();
        let cfg = SearchConfig {
            cpu_batch_size: 8_192,
            ..config(0)
        };
        let (engine, dispatches) = scripted_engine_with(Script::LostIndex, cfg, CpuBackend::new(1));

        let start = u64::MAX - 10_000;
        assert_eq!(engine.generate_work_from(hash, start).await, Ok(start));
        assert_eq!(dispatches.load(Ordering::SeqCst), 1);
        assert_eq!(engine.stats().snapshot().accelerator_faults, 1);
    }

    #[tokio::test]
    async fn test_cancel_flag_stops_search() {
        let hash = BlockHash::new([0x3C; 32]);
        let engine = Arc::new(WorkSearchEngine::cpu_only(
            config(u64::MAX),
            CpuBackend::new(2),
            Arc::new(WorkStats::new()),
        ));
        let cancel = Arc::new(AtomicBool::new(false));

        let search = {
            let engine = Arc::clone(&engine);
            let cancel = Arc::clone(&cancel);
            tokio::spawn(async move { engine.generate_work_with(hash, u64::MAX, cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.store(true, Ordering::Relaxed);

        let result = tokio::time::timeout(Duration::from_secs(5), search).await.unwrap().unwrap();
        assert_eq!(result, Err(WorkError::Cancelled));
    }

    #[tokio::test]
    async fn test_degradation_is_per_request() {
        let hash: BlockHash = HASH.parse().unwrap();
        let threshold = u64::MAX - u64::MAX / 1_024;
        let (engine, dispatches) = scripted_engine(Script::Fail, threshold);

        engine.generate_work(hash).await.unwrap();
        engine.generate_work(hash).await.unwrap();
        // The second request tries the accelerator again
        assert_eq!(dispatches.load(Ordering::SeqCst), 2);
        assert_eq!(engine.stats().snapshot().accelerator_faults, 2);
    }
}

// Changelog:
// - v1.2.0 (2025-07-15): Lost lane index and request cancellation coverage.
// - v1.1.0 (2025-07-08): Scripted accelerator devices for fallback, retry and verification.
// - v1.0.0 (2025-07-02): Replaced pool/share tests with work engine tests.
