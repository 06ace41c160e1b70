// SPDX-License-Identifier: GPL-3.0-only

//! Adapter selection and device creation
//!
//! The configured index picks one enumerated adapter. A hardware adapter is
//! used directly; a software adapter is replaced by wgpu's own fallback
//! adapter; an index with no adapter behind it falls back to the default
//! high-performance adapter. Exactly one path is taken and its failure is
//! final.

pub mod resources;

use crate::errors::{GpuResource, OpenError, OpenResult};
use tracing::{debug, error, info};

pub use resources::{GpuResources, WgpuKernelCompiler};
pub use wgpu;

/// Description of one enumerated adapter
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterCandidate {
    pub name: String,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl AdapterCandidate {
    pub fn from_info(info: &wgpu::AdapterInfo) -> Self {
        Self {
            name: info.name.clone(),
            device_type: info.device_type,
            backend: info.backend,
        }
    }

    /// CPU-emulated adapter
    pub fn is_software(&self) -> bool {
        self.device_type == wgpu::DeviceType::Cpu
    }
}

/// Route taken to obtain the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterPath {
    /// The enumerated hardware adapter at this position
    Enumerated(usize),
    /// wgpu's software fallback adapter
    Software,
    /// Default high-performance adapter
    DefaultHardware,
}

impl AdapterPath {
    /// Decide the path for `index` given the enumeration result
    pub fn choose(index: Option<usize>, candidates: &[AdapterCandidate]) -> Self {
        match index.and_then(|i| candidates.get(i).map(|c| (i, c))) {
            Some((_, candidate)) if candidate.is_software() => AdapterPath::Software,
            Some((i, _)) => AdapterPath::Enumerated(i),
            None => AdapterPath::DefaultHardware,
        }
    }
}

impl std::fmt::Display for AdapterPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterPath::Enumerated(i) => write!(f, "adapter {}", i),
            AdapterPath::Software => write!(f, "software adapter"),
            AdapterPath::DefaultHardware => write!(f, "default adapter"),
        }
    }
}

/// Information about the created GPU device
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used (Vulkan, Metal, DX12, etc.)
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
    pub path: AdapterPath,
    /// Whether the device was created with `SHADER_F16`
    pub reduced_precision: bool,
}

/// A device with its single submission queue
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub info: GpuDeviceInfo,
}

/// Instance over every native backend
pub fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

/// Enumerate adapters in the order indices refer to
pub fn enumerate_adapters(instance: &wgpu::Instance) -> Vec<wgpu::Adapter> {
    instance.enumerate_adapters(wgpu::Backends::all())
}

/// Describe every adapter the instance can see
pub fn list_adapters() -> Vec<AdapterCandidate> {
    let instance = create_instance();
    enumerate_adapters(&instance)
        .iter()
        .map(|adapter| AdapterCandidate::from_info(&adapter.get_info()))
        .collect()
}

/// Select an adapter for `adapter_index` and create the device on it
pub fn create_device(adapter_index: Option<usize>) -> OpenResult<GpuDevice> {
    let instance = create_instance();
    let mut adapters = enumerate_adapters(&instance);
    let candidates: Vec<AdapterCandidate> = adapters
        .iter()
        .map(|adapter| AdapterCandidate::from_info(&adapter.get_info()))
        .collect();

    let path = AdapterPath::choose(adapter_index, &candidates);
    debug!(
        index = ?adapter_index,
        adapters = candidates.len(),
        %path,
        "Adapter path chosen"
    );

    let adapter = match path {
        AdapterPath::Enumerated(i) => adapters.swap_remove(i),
        AdapterPath::Software => request_adapter(&instance, true)?,
        AdapterPath::DefaultHardware => request_adapter(&instance, false)?,
    };

    let gpu = pollster::block_on(open_device(adapter, path)).inspect_err(|e| {
        error!(%path, error = %e, "Failed to create GPU device");
    })?;

    info!(
        %path,
        adapter = %gpu.info.adapter_name,
        backend = ?gpu.info.backend,
        reduced_precision = gpu.info.reduced_precision,
        "GPU device created"
    );
    Ok(gpu)
}

fn request_adapter(instance: &wgpu::Instance, software: bool) -> OpenResult<wgpu::Adapter> {
    let power_preference = if software {
        wgpu::PowerPreference::default()
    } else {
        wgpu::PowerPreference::HighPerformance
    };

    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference,
        compatible_surface: None,
        force_fallback_adapter: software,
    }))
    .map_err(|e| {
        error!(software, error = %e, "Failed to obtain adapter");
        OpenError::AdapterUnavailable(e.to_string())
    })
}

async fn open_device(adapter: wgpu::Adapter, path: AdapterPath) -> OpenResult<GpuDevice> {
    let adapter_info = adapter.get_info();

    let downlevel = adapter.get_downlevel_capabilities();
    if !downlevel.flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
        return Err(OpenError::DeviceCreation(format!(
            "{} does not support compute shaders",
            adapter_info.name
        )));
    }

    // Request half precision whenever offered; selection decides whether to use it
    let required_features = adapter.features() & wgpu::Features::SHADER_F16;

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("cas_device"),
            required_features,
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        })
        .await
        .map_err(|e| OpenError::DeviceCreation(e.to_string()))?;

    let info = GpuDeviceInfo {
        adapter_name: adapter_info.name.clone(),
        backend: adapter_info.backend,
        device_type: adapter_info.device_type,
        path,
        reduced_precision: device.features().contains(wgpu::Features::SHADER_F16),
    };

    Ok(GpuDevice {
        device,
        queue,
        info,
    })
}

/// Run `create` inside validation and out-of-memory error scopes
///
/// wgpu reports creation failures asynchronously; the scopes turn them into
/// an ordinary error for the step that caused them.
pub fn checked<T>(
    device: &wgpu::Device,
    resource: GpuResource,
    create: impl FnOnce() -> T,
) -> OpenResult<T> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());

    match (out_of_memory, validation) {
        (Some(_), _) => {
            error!(%resource, "Out of memory");
            Err(OpenError::OutOfMemory(resource))
        }
        (None, Some(e)) => {
            error!(%resource, error = %e, "Failed to create GPU resource");
            Err(OpenError::ResourceCreation {
                resource,
                reason: e.to_string(),
            })
        }
        (None, None) => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, device_type: wgpu::DeviceType) -> AdapterCandidate {
        AdapterCandidate {
            name: name.into(),
            device_type,
            backend: wgpu::Backend::Vulkan,
        }
    }

    #[test]
    fn test_hardware_index_is_used_directly() {
        let adapters = [
            candidate("discrete", wgpu::DeviceType::DiscreteGpu),
            candidate("integrated", wgpu::DeviceType::IntegratedGpu),
        ];
        assert_eq!(
            AdapterPath::choose(Some(1), &adapters),
            AdapterPath::Enumerated(1)
        );
    }

    #[test]
    fn test_software_index_selects_software_path() {
        let software = candidate("llvmpipe", wgpu::DeviceType::Cpu);
        let hardware = candidate("discrete", wgpu::DeviceType::DiscreteGpu);

        let orders = [
            vec![software.clone(), hardware.clone()],
            vec![hardware.clone(), software.clone()],
        ];
        for adapters in &orders {
            let index = adapters.iter().position(|a| a.is_software());
            assert_eq!(AdapterPath::choose(index, adapters), AdapterPath::Software);
        }
    }

    #[test]
    fn test_missing_index_uses_default_adapter() {
        assert_eq!(AdapterPath::choose(Some(0), &[]), AdapterPath::DefaultHardware);
        let adapters = [candidate("discrete", wgpu::DeviceType::DiscreteGpu)];
        assert_eq!(
            AdapterPath::choose(Some(5), &adapters),
            AdapterPath::DefaultHardware
        );
        assert_eq!(
            AdapterPath::choose(None, &adapters),
            AdapterPath::DefaultHardware
        );
    }

    #[test]
    fn test_create_device() {
        // This test requires a GPU, so it may be skipped in CI
        match create_device(Some(0)) {
            Ok(gpu) => {
                println!("Created device: {:?}", gpu.info);
                assert!(!gpu.info.adapter_name.is_empty());
            }
            Err(e) => println!("Skipping test (no GPU): {}", e),
        }
    }
}
