// SPDX-License-Identifier: GPL-3.0-only

//! GPU initialization utilities for presentation surfaces.
//!
//! Every surface generation gets its own instance, adapter and device; none
//! of these objects are shared across render threads.

use crate::errors::{RenderError, RenderResult};
use tracing::{debug, info};

pub use wgpu;

/// Information about the created GPU device
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used (Vulkan, Metal, GL, ...)
    pub backend: wgpu::Backend,
}

/// Instance honoring `WGPU_BACKEND` and friends from the environment
pub fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor::from_env_or_default())
}

/// Pick an adapter (compatible with `surface` when given) and open a device.
///
/// # Arguments
///
/// * `label` - A label for the device (for debugging)
/// * `low_power` - Prefer an integrated GPU over a discrete one
pub async fn create_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
    label: &str,
    low_power: bool,
) -> RenderResult<(wgpu::Adapter, wgpu::Device, wgpu::Queue, GpuDeviceInfo)> {
    info!(label = label, low_power, "Creating GPU device");

    let power_preference = if low_power {
        wgpu::PowerPreference::LowPower
    } else {
        wgpu::PowerPreference::HighPerformance
    };

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: surface,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| RenderError::DeviceCreation(format!("No suitable GPU adapter: {}", e)))?;

    let adapter_info = adapter.get_info();
    info!(
        adapter = %adapter_info.name,
        backend = ?adapter_info.backend,
        "GPU adapter selected"
    );

    // A textured quad needs nothing beyond the downlevel baseline
    let required_limits =
        wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits());
    debug!(
        max_texture = required_limits.max_texture_dimension_2d,
        "Requesting device limits"
    );

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: wgpu::Features::empty(),
            required_limits,
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            ..Default::default()
        })
        .await
        .map_err(|e| RenderError::DeviceCreation(format!("Failed to create GPU device: {}", e)))?;

    let info = GpuDeviceInfo {
        adapter_name: adapter_info.name.clone(),
        backend: adapter_info.backend,
    };

    Ok((adapter, device, queue, info))
}
