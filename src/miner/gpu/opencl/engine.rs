// Nano PoW Server - Free and Open Source Software Statement
//
// File: src/miner/gpu/opencl/engine.rs
// Version: 3.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// OpenCL engine running the Blake2b work kernel with a bounded wait per dispatch

use super::device::OpenClDevice;
use crate::miner::gpu::{ComputeDevice, DispatchStatus, KernelOutput, KernelParams, VALID_INDICES_CAPACITY};
use anyhow::{Error, Result};
use log::{debug, error, info};
use opencl3::{
    command_queue::CommandQueue,
    context::Context,
    event::Event,
    kernel::{ExecuteKernel, Kernel},
    memory::{Buffer, CL_MEM_READ_ONLY, CL_MEM_READ_WRITE, CL_MEM_WRITE_ONLY},
    program::Program,
    types::{CL_TRUE, cl_int, cl_mem_flags, cl_uint, cl_ulong},
};
use std::ptr;
use std::time::{Duration, Instant};

const LOG_TARGET: &str = "nano_pow::opencl::engine";

const KERNEL_NAME: &str = "blake2b_pow";

/// Execution status value of a finished command
const CL_COMPLETE: cl_int = 0;

/// Interval between completion checks while waiting on a dispatch
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Device buffers for one batch size
pub struct OpenClBuffers {
    batch_size: u32,
    block_hash: Buffer<cl_ulong>,
    hash_values: Buffer<cl_ulong>,
    valid_indices: Buffer<cl_uint>,
    valid_count: Buffer<cl_uint>,
}

/// OpenCL engine for Blake2b work generation
pub struct OpenClEngine {
    device: OpenClDevice,
    context: Context,
    _program: Program,
    kernel: Kernel,
    queue: CommandQueue,
}

impl OpenClEngine {
    /// Create a context on `device` and build the work kernel
    pub fn new(device: OpenClDevice) -> Result<Self> {
        info!(target: LOG_TARGET, "Initializing OpenCL engine for {}", device.info_string());

        let context = Context::from_device(device.device())
            .map_err(|e| Error::msg(format!("Failed to create context: {}", e)))?;

        let kernel_source = include_str!("../../../../kernels/opencl/blake2b_pow.cl");

        let mut program = Program::create_from_source(&context, kernel_source)
            .map_err(|e| Error::msg(format!("Failed to create program: {}", e)))?;

        if let Err(e) = program.build(context.devices(), "") {
            error!(target: LOG_TARGET, "Failed to build OpenCL program: {}", e);
            for device_id in context.devices() {
                if let Ok(log) = program.get_build_log(*device_id) {
                    error!(target: LOG_TARGET, "Build log for device {:?}: {}", device_id, log);
                }
            }
            return Err(Error::msg(format!("Program build failed: {}", e)));
        }

        let kernel = Kernel::create(&program, KERNEL_NAME)
            .map_err(|e| Error::msg(format!("Failed to create kernel: {}", e)))?;

        let queue = CommandQueue::create_default(&context, 0)
            .map_err(|e| Error::msg(format!("Failed to create command queue: {}", e)))?;

        info!(target: LOG_TARGET,
            "✅ OpenCL engine initialized for {} (CU: {})",
            device.name(),
            device.max_compute_units
        );

        Ok(Self {
            device,
            context,
            _program: program,
            kernel,
            queue,
        })
    }

    /// Detect devices and initialise the best one
    pub fn detect() -> Result<Self> {
        let devices = OpenClDevice::detect_devices()?;
        let device = OpenClDevice::select_best(devices)
            .ok_or_else(|| Error::msg("no suitable OpenCL GPU device"))?;
        Self::new(device)
    }

    pub fn device(&self) -> &OpenClDevice {
        &self.device
    }

    /// Poll `event` until it completes or the deadline passes
    fn wait_for(&self, event: &Event, timeout: Duration) -> Result<DispatchStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            let status = event
                .command_execution_status()
                .map_err(|e| Error::msg(format!("Failed to query kernel status: {}", e)))?
                .0;
            if status == CL_COMPLETE {
                return Ok(DispatchStatus::Completed);
            }
            if status < 0 {
                return Err(Error::msg(format!("Kernel execution failed with status {}", status)));
            }
            if Instant::now() >= deadline {
                return Ok(DispatchStatus::TimedOut);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl ComputeDevice for OpenClEngine {
    type Buffers = OpenClBuffers;

    fn name(&self) -> String {
        self.device.name().to_string()
    }

    fn allocate(&mut self, batch_size: u32) -> Result<OpenClBuffers> {
        let create = |flags: cl_mem_flags, len: usize, what: &str| {
            unsafe { Buffer::<cl_ulong>::create(&self.context, flags, len, ptr::null_mut()) }
                .map_err(|e| Error::msg(format!("Failed to create {} buffer: {}", what, e)))
        };
        let block_hash = create(CL_MEM_READ_ONLY, 4, "block hash")?;
        let hash_values = create(CL_MEM_WRITE_ONLY, batch_size as usize, "hash values")?;

        let valid_indices = unsafe {
            Buffer::<cl_uint>::create(&self.context, CL_MEM_READ_WRITE, VALID_INDICES_CAPACITY, ptr::null_mut())
        }
        .map_err(|e| Error::msg(format!("Failed to create valid indices buffer: {}", e)))?;
        let valid_count = unsafe { Buffer::<cl_uint>::create(&self.context, CL_MEM_READ_WRITE, 1, ptr::null_mut()) }
            .map_err(|e| Error::msg(format!("Failed to create valid count buffer: {}", e)))?;

        debug!(target: LOG_TARGET, "Allocated buffers for {} lanes on {}", batch_size, self.device.name());

        Ok(OpenClBuffers {
            batch_size,
            block_hash,
            hash_values,
            valid_indices,
            valid_count,
        })
    }

    fn reset_valid_count(&mut self, buffers: &mut OpenClBuffers) -> Result<()> {
        let zero: [cl_uint; 1] = [0];
        unsafe {
            self.queue
                .enqueue_write_buffer(&mut buffers.valid_count, CL_TRUE, 0, &zero, &[])
                .map_err(|e| Error::msg(format!("Failed to reset valid count: {}", e)))?;
        }
        Ok(())
    }

    fn dispatch(&mut self, buffers: &mut OpenClBuffers, params: &KernelParams, timeout: Duration) -> Result<DispatchStatus> {
        if params.count > buffers.batch_size {
            return Err(Error::msg(format!(
                "dispatch of {} lanes exceeds buffers sized for {}",
                params.count, buffers.batch_size
            )));
        }

        unsafe {
            self.queue
                .enqueue_write_buffer(&mut buffers.block_hash, CL_TRUE, 0, &params.block_hash, &[])
                .map_err(|e| Error::msg(format!("Failed to write block hash: {}", e)))?;
        }

        let record_values: cl_uint = params.record_values.into();
        let event = unsafe {
            ExecuteKernel::new(&self.kernel)
                .set_arg(&params.start)
                .set_arg(&buffers.block_hash)
                .set_arg(&buffers.hash_values)
                .set_arg(&buffers.valid_indices)
                .set_arg(&buffers.valid_count)
                .set_arg(&params.count)
                .set_arg(&params.threshold)
                .set_arg(&record_values)
                .set_global_work_size(params.count as usize)
                .enqueue_nd_range(&self.queue)
                .map_err(|e| Error::msg(format!("Failed to execute kernel: {}", e)))?
        };

        self.queue
            .flush()
            .map_err(|e| Error::msg(format!("Failed to flush queue: {}", e)))?;

        self.wait_for(&event, timeout)
    }

    fn read_output(&mut self, buffers: &OpenClBuffers) -> Result<KernelOutput> {
        let mut count: [cl_uint; 1] = [0];
        unsafe {
            self.queue
                .enqueue_read_buffer(&buffers.valid_count, CL_TRUE, 0, &mut count, &[])
                .map_err(|e| Error::msg(format!("Failed to read valid count: {}", e)))?;
        }

        let recorded = (count[0] as usize).min(VALID_INDICES_CAPACITY);
        let mut valid_indices = vec![0 as cl_uint; recorded];
        if recorded > 0 {
            unsafe {
                self.queue
                    .enqueue_read_buffer(&buffers.valid_indices, CL_TRUE, 0, &mut valid_indices, &[])
                    .map_err(|e| Error::msg(format!("Failed to read valid indices: {}", e)))?;
            }
        }

        Ok(KernelOutput {
            valid_count: count[0],
            valid_indices,
        })
    }

    fn read_lane_values(&mut self, buffers: &OpenClBuffers, count: u32) -> Result<Vec<u64>> {
        let len = count.min(buffers.batch_size) as usize;
        let mut values = vec![0 as cl_ulong; len];
        unsafe {
            self.queue
                .enqueue_read_buffer(&buffers.hash_values, CL_TRUE, 0, &mut values, &[])
                .map_err(|e| Error::msg(format!("Failed to read hash values: {}", e)))?;
        }
        Ok(values)
    }
}

// Changelog:
// - v3.0.0 (2025-07-02): Rewritten as a ComputeDevice for Blake2b work generation.
//   - Buffers are allocated once per batch size and reused across dispatches.
//   - Dispatch waits on the kernel event with a deadline instead of queue.finish().
//   - Removed autotuning and intensity scaling.
