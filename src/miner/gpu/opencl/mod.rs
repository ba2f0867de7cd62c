// Nano PoW Server - Free and Open Source Software Statement
//
// File: src/miner/gpu/opencl/mod.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// OpenCL module for GPU work generation - provides the Blake2b ComputeDevice

pub mod device;
pub mod engine;

pub use device::OpenClDevice;
pub use engine::OpenClEngine;
