// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/lib.rs
// Version: 1.1.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file serves as the main library entry point for the work server,
// located at the root of the source tree. It exports the hashing core, the
// search backends, the TCP server and shared utilities.
//
// Tree Location:
// - src/lib.rs (root library file)
// - Exports modules: core, miner, server, utils

pub mod core;
pub mod miner;
pub mod server;
pub mod utils;

// Re-export commonly used types at the crate root for convenience
pub use crate::core::{Args, BlockHash, SearchConfig, work_value};
pub use crate::miner::{CpuBackend, WorkError, WorkSearchEngine, WorkStats};
pub use crate::server::{RequestHandler, WorkServer};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

// Changelog:
// - v1.1.0 (2025-07-08): Exported the server module and WorkStats.
// - v1.0.0 (2025-07-02): Library root for the work server.
//   - Replaced the benchmark, help and pool modules of the miner with server.
