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

//! Concrete rendering backends for Prism.
//!
//! The `null` backend emulates a device on the CPU and is always available. The
//! `wgpu` backend (feature `wgpu`, enabled by default) drives real hardware
//! through Vulkan, Metal, Direct3D 12 or OpenGL.

#![warn(missing_docs)]

pub mod graphics;

pub use graphics::null::NullRenderSystem;
#[cfg(feature = "wgpu")]
pub use graphics::wgpu::WgpuRenderSystem;

use prism_core::renderer::{ModuleRegistry, RenderSystem, RendererModule};

/// Registers every backend compiled into this crate.
///
/// Hardware modules are registered when wgpu can reach them on this platform.
pub fn register_modules(registry: &mut ModuleRegistry) {
    registry.register(RendererModule::Null, |_, descriptor| {
        Ok(Box::new(NullRenderSystem::new(descriptor)) as Box<dyn RenderSystem>)
    });

    #[cfg(feature = "wgpu")]
    for module in RendererModule::platform_defaults()
        .into_iter()
        .filter(|m| graphics::wgpu::is_supported_module(*m))
    {
        registry.register(module, |request, descriptor| {
            Ok(Box::new(WgpuRenderSystem::new(request, descriptor)?) as Box<dyn RenderSystem>)
        });
    }
}

/// A registry with every backend of this crate registered.
pub fn default_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    register_modules(&mut registry);
    registry
}
