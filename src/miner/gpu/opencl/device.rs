// Nano PoW Server - Free and Open Source Software Statement
//
// File: src/miner/gpu/opencl/device.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// OpenCL device discovery for work generation

use anyhow::{Error, Result};
use log::{debug, error, info, warn};
use opencl3::{
    device::{CL_DEVICE_TYPE_GPU, Device},
    platform::get_platforms,
};

const LOG_TARGET: &str = "nano_pow::opencl::device";

/// Smallest global memory a device needs for the default batch (2M lanes of u64 plus slack)
const MIN_GLOBAL_MEM: u64 = 64 * 1024 * 1024;

/// An OpenCL GPU and the properties used to pick one
#[derive(Debug, Clone)]
pub struct OpenClDevice {
    pub name: String,
    pub device_id: u32,
    pub platform_name: String,
    pub max_compute_units: u32,
    pub global_mem_size: u64,
    pub host_unified_memory: bool,
    pub device: Device,
}

impl OpenClDevice {
    pub fn new(device: Device, device_id: u32, platform_name: String) -> Self {
        let name = device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string());
        let max_compute_units = device.max_compute_units().unwrap_or(1);
        let global_mem_size = device.global_mem_size().unwrap_or(0);
        let host_unified_memory = device.host_unified_memory().unwrap_or(false);

        debug!(target: LOG_TARGET,
            "OpenCL device {}: {} (CU: {}, unified: {})",
            device_id, name, max_compute_units, host_unified_memory
        );

        Self {
            name,
            device_id,
            platform_name,
            max_compute_units,
            global_mem_size,
            host_unified_memory,
            device,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Detect all OpenCL GPU devices across platforms
    pub fn detect_devices() -> Result<Vec<OpenClDevice>> {
        debug!(target: LOG_TARGET, "Starting OpenCL device detection");

        let platforms = get_platforms().map_err(|e| {
            error!(target: LOG_TARGET, "Failed to get OpenCL platforms: {}", e);
            Error::msg(format!("OpenCL platform detection failed: {}", e))
        })?;

        if platforms.is_empty() {
            warn!(target: LOG_TARGET, "No OpenCL platforms found");
            return Ok(Vec::new());
        }

        let mut all_devices = Vec::new();
        let mut device_counter = 0;

        for platform in platforms {
            let platform_name = platform
                .name()
                .unwrap_or_else(|_| "Unknown Platform".to_string());

            match platform.get_devices(CL_DEVICE_TYPE_GPU) {
                Ok(devices) => {
                    for device_cl_id in devices {
                        let device = OpenClDevice::new(Device::new(device_cl_id), device_counter, platform_name.clone());
                        info!(target: LOG_TARGET,
                            "Detected OpenCL device {}: {} (Platform: {})",
                            device_counter,
                            device.name(),
                            platform_name
                        );
                        all_devices.push(device);
                        device_counter += 1;
                    }
                }
                Err(e) => {
                    debug!(target: LOG_TARGET, "No GPU devices found on platform {}: {}", platform_name, e);
                }
            }
        }

        if all_devices.is_empty() {
            warn!(target: LOG_TARGET, "No OpenCL GPU devices detected");
        }

        Ok(all_devices)
    }

    /// Pick the device to generate work on: dedicated before integrated, then most compute units
    pub fn select_best(devices: Vec<OpenClDevice>) -> Option<OpenClDevice> {
        devices
            .into_iter()
            .filter(|d| d.is_suitable())
            .max_by_key(|d| (!d.host_unified_memory, d.max_compute_units))
    }

    pub fn is_suitable(&self) -> bool {
        self.max_compute_units >= 1 && self.global_mem_size >= MIN_GLOBAL_MEM
    }

    pub fn info_string(&self) -> String {
        format!(
            "{} (CU: {}, MEM: {:.1} GB, {})",
            self.name,
            self.max_compute_units,
            self.global_mem_size as f64 / (1024.0 * 1024.0 * 1024.0),
            if self.host_unified_memory { "integrated" } else { "dedicated" }
        )
    }
}

// Changelog:
// - v2.0.0 (2025-07-02): Trimmed to detection and selection for the work server.
//   - Integrated/dedicated classification uses host unified memory only.
// - v1.0.1: Added device type detection.
