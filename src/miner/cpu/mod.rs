// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/cpu/mod.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file is the module declaration for the CPU backend, located in the cpu
// subdirectory of the miner module.
//
// Tree Location:
// - src/miner/cpu/mod.rs (CPU backend module entry point)
// - Submodules: miner, thread

pub mod miner;
pub mod thread;

pub use miner::{CHUNK_FANOUT, CpuBackend, MIN_CHUNK_SIZE};
pub use thread::{ScanResult, StopFlags, scan_range};

// Changelog:
// - v2.0.0 (2025-07-02): Re-exports CpuBackend and the range scanner.
// - v1.0.0 (2025-06-14): Extracted from monolithic main.rs.
