// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/stats/mod.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file is the module declaration for statistics tracking in the work
// server, located in the stats subdirectory of the miner module.
//
// Tree Location:
// - src/miner/stats/mod.rs (stats module entry point)
// - Submodules: work_stats, progress

pub mod progress;
pub mod work_stats;

pub use progress::SearchProgress;
pub use work_stats::{ActiveJob, StatsSnapshot, WorkStats};

// Changelog:
// - v2.0.0 (2025-07-02): Service counters and per-request progress replace
//   miner, thread and GPU statistics.
// - v1.0.0 (2025-06-14): Extracted from monolithic main.rs.
