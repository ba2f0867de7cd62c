// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/types.rs
// Version: 1.1.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file defines core data structures for the work server, located in the
// core subdirectory. It includes the command-line arguments, the block hash
// type received from clients, and the search configuration derived from them.
//
// Tree Location:
// - src/core/types.rs (core data structures)
// - Depends on: clap, hex, thiserror

use crate::core::difficulty::{DEFAULT_THRESHOLD, parse_difficulty};
use clap::Parser;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default TCP port of the work server
pub const DEFAULT_PORT: u16 = 7077;

/// Placeholder some wallets send instead of a real frontier hash
pub const FRONTIER_SENTINEL: &str = ":FRONTIER";

/// Length of a block hash in bytes
pub const BLOCK_HASH_LEN: usize = 32;

/// Accelerator batch size (nonces per kernel dispatch)
pub const DEFAULT_GPU_BATCH_SIZE: u32 = 2_000_000;

/// CPU batch size (nonces per fan-out)
pub const DEFAULT_CPU_BATCH_SIZE: u64 = 1_000_000;

/// Wait budget for one kernel dispatch
pub const DEFAULT_GPU_TIMEOUT_MS: u64 = 500;

/// Command-line arguments for the work server
#[derive(Parser, Debug, Clone)]
#[command(
    name = "nano-pow-server",
    author = "Nano PoW Team",
    version,
    about = "Local Blake2b proof-of-work server with CPU and OpenCL backends",
    long_about = "Nano PoW Server generates proof-of-work for block hashes submitted over a\n\
                  local TCP connection. Work is searched on an OpenCL GPU when one is available\n\
                  (build with --features gpu) and on all CPU cores otherwise.\n\n\
                  Examples:\n\
                    Default: nano-pow-server\n\
                    Custom port: nano-pow-server --port 7000\n\
                    CPU only: nano-pow-server --cpu-only --threads 8\n\
                    Diagnostics: nano-pow-server --self-test"
)]
pub struct Args {
    /// TCP port to listen on
    #[arg(
        long,
        env = "NANO_POW_PORT",
        default_value_t = DEFAULT_PORT,
        value_name = "PORT",
        help = "Port for work requests"
    )]
    pub port: u16,

    /// Address to bind, loopback by default since the service has no authentication
    #[arg(
        long,
        env = "NANO_POW_BIND",
        default_value = "127.0.0.1",
        value_name = "ADDRESS",
        help = "Bind address"
    )]
    pub bind: String,

    /// Number of CPU worker threads
    /// 0 = auto-detect (recommended), or specify exact count
    #[arg(
        short,
        long,
        env = "NANO_POW_THREADS",
        default_value = "0",
        value_name = "COUNT",
        help = "Number of CPU threads (0 = auto-detect)"
    )]
    pub threads: usize,

    /// Difficulty threshold as 16 hex digits
    #[arg(
        long,
        env = "NANO_POW_DIFFICULTY",
        default_value = "fffffff93c41ec94",
        value_name = "HEX",
        help = "Work threshold (16 hex digits)"
    )]
    pub difficulty: String,

    /// Never initialise the GPU, even when built with the gpu feature
    #[arg(long, default_value = "false", help = "Disable GPU acceleration")]
    pub cpu_only: bool,

    #[arg(long, default_value_t = DEFAULT_GPU_BATCH_SIZE, value_name = "NONCES")]
    pub gpu_batch_size: u32,

    #[arg(long, default_value_t = DEFAULT_CPU_BATCH_SIZE, value_name = "NONCES")]
    pub cpu_batch_size: u64,

    /// Wait budget for a single GPU batch before it is retried
    #[arg(long, default_value_t = DEFAULT_GPU_TIMEOUT_MS, value_name = "MS")]
    pub gpu_timeout_ms: u64,

    /// Maximum number of concurrent work_generate jobs
    #[arg(long, default_value = "4", value_name = "COUNT")]
    pub request_limit: usize,

    /// Idle bound on a single socket read
    #[arg(long, default_value = "10", value_name = "SECONDS")]
    pub read_timeout_secs: u64,

    /// Run hash self-tests and exit without starting the server
    #[arg(long, alias = "gpu-self-test", default_value = "false")]
    pub self_test: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info", value_name = "FILTER")]
    pub log_level: String,
}

impl Args {
    /// Validate argument combinations before anything is started
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("--port must be non-zero".to_string());
        }
        if self.gpu_batch_size == 0 || self.cpu_batch_size == 0 {
            return Err("batch sizes must be non-zero".to_string());
        }
        if self.request_limit == 0 {
            return Err("--request-limit must be at least 1".to_string());
        }
        if self.gpu_timeout_ms == 0 {
            return Err("--gpu-timeout-ms must be non-zero".to_string());
        }
        parse_difficulty(&self.difficulty).map_err(|e| format!("--difficulty: {}", e))?;
        self.listen_addr()?;
        Ok(())
    }

    /// Socket address the listener binds to
    pub fn listen_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|e| format!("invalid bind address {}:{}: {}", self.bind, self.port, e))
    }

    /// Resolved worker thread count
    pub fn worker_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    /// Build the engine configuration from the parsed arguments
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            threshold: parse_difficulty(&self.difficulty).unwrap_or(DEFAULT_THRESHOLD),
            gpu_batch_size: self.gpu_batch_size,
            cpu_batch_size: self.cpu_batch_size,
            gpu_timeout: Duration::from_millis(self.gpu_timeout_ms),
            ..SearchConfig::default()
        }
    }
}

/// Tunables of the work search loop
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Minimum digest value a nonce must reach
    pub threshold: u64,
    pub gpu_batch_size: u32,
    pub cpu_batch_size: u64,
    pub gpu_timeout: Duration,
    /// Accelerator timeouts tolerated on one batch before it counts as a fault
    pub gpu_retries: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            gpu_batch_size: DEFAULT_GPU_BATCH_SIZE,
            cpu_batch_size: DEFAULT_CPU_BATCH_SIZE,
            gpu_timeout: Duration::from_millis(DEFAULT_GPU_TIMEOUT_MS),
            gpu_retries: 2,
        }
    }
}

/// Reasons a block hash string is refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashParseError {
    #[error("expected 64 hex characters, got {0}")]
    Length(usize),

    #[error("non-hex character in block hash")]
    NotHex,
}

/// 32-byte block hash that work is generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHash([u8; BLOCK_HASH_LEN]);

impl BlockHash {
    pub const fn new(bytes: [u8; BLOCK_HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; BLOCK_HASH_LEN] {
        &self.0
    }

    /// Hash as four little-endian words, the layout the OpenCL kernel reads
    pub fn to_le_words(&self) -> [u64; 4] {
        let mut words = [0u64; 4];
        for (i, chunk) in self.0.chunks_exact(8).enumerate() {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            words[i] = u64::from_le_bytes(word);
        }
        words
    }
}

impl FromStr for BlockHash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != BLOCK_HASH_LEN * 2 {
            return Err(HashParseError::Length(s.chars().count()));
        }
        let mut bytes = [0u8; BLOCK_HASH_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| HashParseError::NotHex)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}


// Changelog:
// - v1.1.0 (2025-07-08): Added --request-limit and --read-timeout-secs.
//   - Port, bind address, threads and difficulty are also read from NANO_POW_* variables.
// - v1.0.0 (2025-07-02): Initial work server types.
//   - BlockHash parsing/display, SearchConfig and command-line arguments.
