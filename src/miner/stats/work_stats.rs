// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/stats/work_stats.rs
// Version: 1.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file implements service-wide counters for the work server, located in
// the stats subdirectory of the miner module. Counters are lock-free atomics
// shared between the engine, the CPU workers and the request handler.
//
// Tree Location:
// - src/miner/stats/work_stats.rs (service counters)
// - Depends on: serde, utils::format

use crate::utils::format::FormatUtils;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

pub struct WorkStats {
    pub requests: AtomicU64,
    pub works_generated: AtomicU64,
    pub failures: AtomicU64,
    pub active_jobs: AtomicU64,
    pub accelerator_faults: AtomicU64,
    /// Shared with the CPU backend, which adds to it from worker threads
    hashes: Arc<AtomicU64>,
    generation_millis: AtomicU64,
    start_time: Instant,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub works_generated: u64,
    pub failures: u64,
    pub hashes: u64,
    pub active_jobs: u64,
    pub accelerator_faults: u64,
    pub uptime_secs: u64,
}

/// Decrements the active job count when dropped
pub struct ActiveJob<'a> {
    stats: &'a WorkStats,
}

impl Drop for ActiveJob<'_> {
    fn drop(&mut self) {
        self.stats.active_jobs.fetch_sub(1, Ordering::Relaxed);
    }
}

impl WorkStats {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            works_generated: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            active_jobs: AtomicU64::new(0),
            accelerator_faults: AtomicU64::new(0),
            hashes: Arc::new(AtomicU64::new(0)),
            generation_millis: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn hash_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.hashes)
    }

    pub fn add_hashes(&self, count: u64) {
        self.hashes.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn begin_job(&self) -> ActiveJob<'_> {
        self.active_jobs.fetch_add(1, Ordering::Relaxed);
        ActiveJob { stats: self }
    }

    pub fn record_work(&self, elapsed: Duration) {
        self.works_generated.fetch_add(1, Ordering::Relaxed);
        self.generation_millis
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accelerator_fault(&self) {
        self.accelerator_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            works_generated: self.works_generated.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            hashes: self.hashes.load(Ordering::Relaxed),
            active_jobs: self.active_jobs.load(Ordering::Relaxed),
            accelerator_faults: self.accelerator_faults.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Mean wall time per generated work
    pub fn average_generation_time(&self) -> Option<Duration> {
        let works = self.works_generated.load(Ordering::Relaxed);
        if works == 0 {
            return None;
        }
        Some(Duration::from_millis(
            self.generation_millis.load(Ordering::Relaxed) / works,
        ))
    }

    pub fn average_hashrate(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.hashes.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        let snapshot = self.snapshot();
        info!(
            "📊 Requests: {} | Works: {} (avg {}) | Failures: {} | Hashes: {} | Avg: {} | GPU faults: {}",
            snapshot.requests,
            snapshot.works_generated,
            self.average_generation_time()
                .map(FormatUtils::format_duration)
                .unwrap_or_else(|| "-".to_string()),
            snapshot.failures,
            FormatUtils::format_number(snapshot.hashes),
            FormatUtils::format_hashrate(self.average_hashrate()),
            snapshot.accelerator_faults
        );
    }
}

impl Default for WorkStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_job_guard() {
        let stats = WorkStats::new();
        {
            let _a = stats.begin_job();
            let _b = stats.begin_job();
            assert_eq!(stats.snapshot().active_jobs, 2);
        }
        assert_eq!(stats.snapshot().active_jobs, 0);
    }

    #[test]
    fn test_shared_hash_counter() {
        let stats = WorkStats::new();
        stats.hash_counter().fetch_add(500, Ordering::Relaxed);
        stats.add_hashes(12);
        assert_eq!(stats.snapshot().hashes, 512);
    }

    #[test]
    fn test_average_generation_time() {
        let stats = WorkStats::new();
        assert_eq!(stats.average_generation_time(), None);
        stats.record_work(Duration::from_millis(100));
        stats.record_work(Duration::from_millis(300));
        assert_eq!(stats.average_generation_time(), Some(Duration::from_millis(200)));
    }
}

// Changelog:
// - v1.0.0 (2025-07-02): Replaced share/thread statistics with work server counters.
//   - Counters back the status action and the periodic summary log.
