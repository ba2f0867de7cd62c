// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/stats/progress.rs
// Version: 1.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// Per-request search progress with milestone logging.

use crate::core::BlockHash;
use crate::miner::backend::BackendKind;
use crate::utils::format::FormatUtils;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Nonces between progress lines
pub const MILESTONE: u64 = 1_000_000;

pub struct SearchProgress {
    block_hash: BlockHash,
    searched: u64,
    next_milestone: u64,
    started: Instant,
}

impl SearchProgress {
    pub fn new(block_hash: BlockHash) -> Self {
        Self {
            block_hash,
            searched: 0,
            next_milestone: MILESTONE,
            started: Instant::now(),
        }
    }

    pub fn searched(&self) -> u64 {
        self.searched
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn hashrate(&self) -> f64 {
        let secs = self.started.elapsed().as_secs_f64();
        if secs > 0.0 { self.searched as f64 / secs } else { 0.0 }
    }

    /// Account for a finished batch; returns true when a milestone was crossed
    pub fn record_batch(&mut self, backend: BackendKind, start: u64, size: u64) -> bool {
        self.searched = self.searched.saturating_add(size);
        debug!("[{}] batch {}..{} done on {}", self.short_hash(), start, start.saturating_add(size), backend);

        if self.searched < self.next_milestone {
            return false;
        }
        while self.next_milestone <= self.searched {
            self.next_milestone = self.next_milestone.saturating_add(MILESTONE);
        }
        info!(
            "⛏️ [{}] {} nonces searched, {}",
            self.short_hash(),
            FormatUtils::format_number(self.searched),
            FormatUtils::format_hashrate(self.hashrate())
        );
        true
    }

    fn short_hash(&self) -> String {
        let full = self.block_hash.to_string();
        full[..12].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_milestones() {
        let mut progress = SearchProgress::new(BlockHash::new([0u8; 32]));
        assert!(!progress.record_batch(BackendKind::Cpu, 0, 600_000));
        assert!(progress.record_batch(BackendKind::Cpu, 600_000, 600_000));
        assert!(!progress.record_batch(BackendKind::Cpu, 1_200_000, 600_000));
        // One large batch crossing several milestones logs once
        assert!(progress.record_batch(BackendKind::Accelerator, 1_800_000, 5_000_000));
        assert_eq!(progress.searched(), 6_800_000);
        assert!(progress.record_batch(BackendKind::Cpu, 6_800_000, 200_000));
    }
}
