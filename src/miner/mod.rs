// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/mod.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file is the module declaration for work generation, located in the
// miner subdirectory. It declares the search engine, both backends and the
// statistics tracking, and re-exports key types.
//
// Tree Location:
// - src/miner/mod.rs (miner module entry point)
// - Submodules: backend, cpu, engine, gpu, self_test, stats

pub mod backend;
pub mod cpu;
pub mod engine;
pub mod gpu;
pub mod stats;

pub use backend::{BackendKind, Batch, BatchOutcome, BatchSearch};
pub use cpu::CpuBackend;
pub use engine::{WorkError, WorkSearchEngine};
pub use gpu::{AcceleratorBackend, ComputeDevice, NoDevice};
pub use stats::{StatsSnapshot, WorkStats};

// Changelog:
// - v2.0.0 (2025-07-02): Work search engine with CPU and accelerator backends.
//   - Added backend seam, engine and self-test modules.
// - v1.1.0 (2025-06-24): Added GPU mining module.
// - v1.0.0 (2025-06-14): Extracted from monolithic main.rs.
