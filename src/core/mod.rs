// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/mod.rs
// Version: 1.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file is the module declaration for the core functionality of the work
// server, located in the core subdirectory. It declares submodules and re-exports
// key types for use throughout the project.

pub mod blake2b;
pub mod difficulty;
pub mod types;

// Re-export the most commonly used items
pub use blake2b::{WorkHasher, meets_threshold, work_value};
pub use difficulty::{DEFAULT_THRESHOLD, format_difficulty, parse_difficulty};
pub use types::{Args, BlockHash, FRONTIER_SENTINEL, HashParseError, SearchConfig};
