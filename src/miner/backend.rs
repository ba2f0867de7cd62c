// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/backend.rs
// Version: 1.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// Shared batch types and the search capability implemented by both the CPU
// backend and the GPU accelerator backend.

use crate::core::types::BlockHash;
use std::fmt;
use std::ops::Range;

/// Half-open range of nonces evaluated in one dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub start: u64,
    pub size: u64,
}

impl Batch {
    /// Batch starting at `start`, or None when it would run past u64::MAX
    pub fn new(start: u64, size: u64) -> Option<Self> {
        start.checked_add(size)?;
        Some(Self { start, size })
    }

    pub fn end(&self) -> u64 {
        self.start + self.size
    }

    pub fn range(&self) -> Range<u64> {
        self.start..self.end()
    }

    /// Contiguous sub-ranges of at most `chunk` nonces covering the batch
    pub fn chunks(&self, chunk: u64) -> impl Iterator<Item = Range<u64>> {
        let chunk = chunk.max(1);
        let end = self.end();
        (self.start..end)
            .step_by(chunk as usize)
            .map(move |start| start..start.saturating_add(chunk).min(end))
    }
}

/// Result of searching one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// A nonce reported as reaching the threshold
    Found(u64),
    NoMatch,
    /// The accelerator did not finish inside its wait budget
    TimedOut,
    /// The backend cannot be used; carries the reason for logging
    Fault(String),
}

/// Execution strategy for a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Accelerator,
    Cpu,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Accelerator => f.write_str("gpu"),
            BackendKind::Cpu => f.write_str("cpu"),
        }
    }
}

/// Evaluate a batch of nonces against a threshold
///
/// Implementations block the calling thread; the engine runs them on the
/// blocking pool.
pub trait BatchSearch {
    fn kind(&self) -> BackendKind;

    fn search_batch(&mut self, batch: Batch, block_hash: &BlockHash, threshold: u64) -> BatchOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_overflow() {
        assert!(Batch::new(u64::MAX - 10, 10).is_some());
        assert!(Batch::new(u64::MAX - 10, 11).is_none());
    }

    #[test]
    fn test_chunks_cover_batch_without_gaps() {
        let batch = Batch::new(100, 1_005).unwrap();
        let chunks: Vec<_> = batch.chunks(100).collect();
        assert_eq!(chunks.len(), 11);
        assert_eq!(chunks[0], 100..200);
        assert_eq!(chunks[10], 1_100..1_105);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        let total: u64 = chunks.iter().map(|c| c.end - c.start).sum();
        assert_eq!(total, batch.size);
    }

    #[test]
    fn test_chunks_near_top_of_range() {
        let batch = Batch::new(u64::MAX - 25, 25).unwrap();
        let chunks: Vec<_> = batch.chunks(10).collect();
        assert_eq!(chunks.last().unwrap().end, u64::MAX);
    }
}
