// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/gpu/mod.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file is the module entry point for GPU work generation. It defines the
// ComputeDevice seam between the accelerator backend and a concrete device,
// so the batch logic can run against OpenCL or a test double.
//
// Features:
// - ComputeDevice trait (buffers, dispatch with a wait budget, result readback)
// - AcceleratorBackend with batch-size keyed buffer reuse
// - OpenCL implementation behind the "gpu" feature flag

pub mod accelerator;

#[cfg(feature = "gpu")]
pub mod opencl;

pub use accelerator::AcceleratorBackend;

#[cfg(feature = "gpu")]
pub use opencl::{OpenClDevice, OpenClEngine};

use std::time::Duration;

/// Slots in the valid-index output buffer
pub const VALID_INDICES_CAPACITY: usize = 1024;

/// Arguments of one kernel dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelParams {
    /// Nonce evaluated by lane 0
    pub start: u64,
    /// Number of lanes
    pub count: u32,
    /// Block hash as little-endian words
    pub block_hash: [u64; 4],
    pub threshold: u64,
    /// Write every lane's work value to the lane value buffer
    pub record_values: bool,
}

/// How a dispatch ended within its wait budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Completed,
    TimedOut,
}

/// Valid-lane report written by the kernel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelOutput {
    /// Lanes that reached the threshold, possibly more than were recorded
    pub valid_count: u32,
    /// Recorded lane indices, at most VALID_INDICES_CAPACITY
    pub valid_indices: Vec<u32>,
}

/// A device able to evaluate the work hash for a contiguous run of nonces
pub trait ComputeDevice: Send {
    /// Device-side buffers for one batch size
    type Buffers: Send;

    fn name(&self) -> String;

    fn allocate(&mut self, batch_size: u32) -> anyhow::Result<Self::Buffers>;

    /// Zero the valid-lane counter before a dispatch
    fn reset_valid_count(&mut self, buffers: &mut Self::Buffers) -> anyhow::Result<()>;

    /// Run the kernel, waiting at most `timeout` for completion
    fn dispatch(
        &mut self,
        buffers: &mut Self::Buffers,
        params: &KernelParams,
        timeout: Duration,
    ) -> anyhow::Result<DispatchStatus>;

    fn read_output(&mut self, buffers: &Self::Buffers) -> anyhow::Result<KernelOutput>;

    /// Per-lane work values of the last dispatch, used by the self-test
    fn read_lane_values(&mut self, buffers: &Self::Buffers, count: u32) -> anyhow::Result<Vec<u64>>;
}

/// Device type for builds and runs without an accelerator; it has no values
#[derive(Debug)]
pub enum NoDevice {}

impl ComputeDevice for NoDevice {
    type Buffers = ();

    fn name(&self) -> String {
        match *self {}
    }

    fn allocate(&mut self, _batch_size: u32) -> anyhow::Result<()> {
        match *self {}
    }

    fn reset_valid_count(&mut self, _buffers: &mut ()) -> anyhow::Result<()> {
        match *self {}
    }

    fn dispatch(&mut self, _buffers: &mut (), _params: &KernelParams, _timeout: Duration) -> anyhow::Result<DispatchStatus> {
        match *self {}
    }

    fn read_output(&mut self, _buffers: &()) -> anyhow::Result<KernelOutput> {
        match *self {}
    }

    fn read_lane_values(&mut self, _buffers: &(), _count: u32) -> anyhow::Result<Vec<u64>> {
        match *self {}
    }
}

// Changelog:
// - v2.0.0 (2025-07-02): Replaced GpuManager/GpuMiner with the ComputeDevice seam.
//   - NoDevice stands in when no accelerator is compiled in or selected.
// - v1.0.0 (2025-06-24): Initial GPU module structure
