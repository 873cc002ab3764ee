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

//! Hardware rendering through wgpu.
//!
//! Each hardware [`RendererModule`] maps to one wgpu backend. Devices are
//! headless: swap chains render into off-screen textures. Command buffers
//! record the shared opcode stream and are replayed into a `wgpu::CommandEncoder`
//! at submission.

mod command;
mod context;
mod conversions;
mod device;
mod executor;
mod mips;
mod resources;
mod staging;
mod system;

pub use self::command::WgpuCommandQueue;
pub use self::executor::WgpuStatistics;
pub use self::system::WgpuRenderSystem;

use prism_core::renderer::RendererModule;

/// The wgpu backend that implements `module`, if any.
pub(crate) fn backend_for(module: RendererModule) -> Option<wgpu::Backends> {
    match module {
        RendererModule::OpenGL => Some(wgpu::Backends::GL),
        RendererModule::Vulkan => Some(wgpu::Backends::VULKAN),
        RendererModule::Metal => Some(wgpu::Backends::METAL),
        RendererModule::Direct3D12 => Some(wgpu::Backends::DX12),
        RendererModule::Null | RendererModule::Direct3D11 => None,
    }
}

/// Returns `true` if wgpu can drive `module`.
pub fn is_supported_module(module: RendererModule) -> bool {
    backend_for(module).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_mapping() {
        assert_eq!(
            backend_for(RendererModule::Vulkan),
            Some(wgpu::Backends::VULKAN)
        );
        assert_eq!(backend_for(RendererModule::OpenGL), Some(wgpu::Backends::GL));
        assert_eq!(
            backend_for(RendererModule::Direct3D12),
            Some(wgpu::Backends::DX12)
        );
        assert_eq!(backend_for(RendererModule::Metal), Some(wgpu::Backends::METAL));
    }

    #[test]
    fn test_unsupported_modules() {
        assert!(!is_supported_module(RendererModule::Null));
        assert!(!is_supported_module(RendererModule::Direct3D11));
        assert!(is_supported_module(RendererModule::Vulkan));
    }
}
