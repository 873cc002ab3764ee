// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{anyhow, Context, Result};
use prism_core::renderer::{RenderSystemDescriptor, Vendor};

/// Optional features enabled when the adapter offers them.
const WANTED_FEATURES: wgpu::Features = wgpu::Features::INDIRECT_FIRST_INSTANCE
    .union(wgpu::Features::POLYGON_MODE_LINE)
    .union(wgpu::Features::POLYGON_MODE_POINT)
    .union(wgpu::Features::DEPTH32FLOAT_STENCIL8)
    .union(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES);

/// The adapter, logical device and queue of a headless wgpu device.
#[derive(Debug)]
pub(crate) struct WgpuContext {
    pub(crate) adapter: wgpu::Adapter,
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) adapter_info: wgpu::AdapterInfo,
    pub(crate) features: wgpu::Features,
    pub(crate) limits: wgpu::Limits,
}

impl WgpuContext {
    /// Opens a device on `backends`, blocking until the adapter answers.
    ///
    /// ## Arguments
    /// * `backends` - The wgpu backends the adapter may come from.
    /// * `descriptor` - Debug mode, power preference and preferred vendor.
    ///
    /// ## Errors
    /// Fails when no adapter is available or the device request is rejected.
    pub(crate) fn new(backends: wgpu::Backends, descriptor: &RenderSystemDescriptor) -> Result<Self> {
        pollster::block_on(Self::new_async(backends, descriptor))
    }

    async fn new_async(
        backends: wgpu::Backends,
        descriptor: &RenderSystemDescriptor,
    ) -> Result<Self> {
        log::info!("WgpuContext: requesting an adapter on {backends:?}...");

        let mut flags = wgpu::InstanceFlags::default();
        if descriptor.debug {
            flags |= wgpu::InstanceFlags::DEBUG | wgpu::InstanceFlags::VALIDATION;
        }
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            flags,
            ..Default::default()
        });

        let power_preference = if descriptor.prefer_low_power {
            wgpu::PowerPreference::LowPower
        } else {
            wgpu::PowerPreference::HighPerformance
        };
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| anyhow!("No adapter for {backends:?}: {e}"))?;

        let adapter_info = adapter.get_info();
        if !backends.contains(adapter_info.backend.into()) {
            return Err(anyhow!(
                "Adapter returned wrong backend: requested {:?}, got {:?}",
                backends,
                adapter_info.backend
            ));
        }
        log::info!(
            "WgpuContext: using adapter \"{}\" ({:?}, {:?})",
            adapter_info.name,
            adapter_info.backend,
            adapter_info.device_type
        );
        if let Some(vendor) = descriptor.preferred_vendor {
            if vendor.pci_id() != adapter_info.vendor {
                log::warn!(
                    "WgpuContext: preferred vendor {} is not available, using {}",
                    vendor.name(),
                    vendor_name(adapter_info.vendor)
                );
            }
        }

        let features = adapter.features() & WANTED_FEATURES;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Prism Device"),
                required_features: features,
                required_limits: adapter.limits(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to create logical device")?;
        log::info!("WgpuContext: logical device and command queue created");

        device.on_uncaptured_error(std::sync::Arc::new(|e| {
            log::error!("wgpu uncaptured error: {e}");
        }));

        let limits = device.limits();
        log::debug!("WgpuContext: active features {features:?}");
        log::debug!("WgpuContext: device limits {limits:?}");

        Ok(Self {
            adapter,
            device,
            queue,
            adapter_info,
            features,
            limits,
        })
    }

    /// Returns `true` if the adapter can use `format` with `usages`.
    pub(crate) fn supports_format(
        &self,
        format: wgpu::TextureFormat,
        usages: wgpu::TextureUsages,
    ) -> bool {
        format
            .required_features()
            .difference(self.features)
            .is_empty()
            && self
                .adapter
                .get_texture_format_features(format)
                .allowed_usages
                .contains(usages)
    }
}

/// Human-readable name of a PCI vendor ID.
pub(crate) fn vendor_name(pci_id: u32) -> String {
    Vendor::from_pci_id(pci_id)
        .map(|vendor| vendor.name().to_string())
        .unwrap_or_else(|| format!("Vendor 0x{pci_id:04x}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_name() {
        assert_eq!(vendor_name(0x10de), "NVIDIA Corporation");
        assert_eq!(vendor_name(0x1234), "Vendor 0x1234");
    }
}
