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

//! Renderer modules and their name aliases.

use crate::renderer::error::RenderError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A rendering backend that can be loaded at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererModule {
    /// CPU emulation without any GPU.
    Null,
    /// OpenGL.
    OpenGL,
    /// Vulkan.
    Vulkan,
    /// Metal.
    Metal,
    /// Direct3D 11.
    Direct3D11,
    /// Direct3D 12.
    Direct3D12,
}

impl RendererModule {
    /// Every module in a stable order.
    pub const ALL: [RendererModule; 6] = [
        RendererModule::Null,
        RendererModule::OpenGL,
        RendererModule::Vulkan,
        RendererModule::Metal,
        RendererModule::Direct3D11,
        RendererModule::Direct3D12,
    ];

    /// Canonical module name.
    pub fn name(self) -> &'static str {
        match self {
            RendererModule::Null => "Null",
            RendererModule::OpenGL => "OpenGL",
            RendererModule::Vulkan => "Vulkan",
            RendererModule::Metal => "Metal",
            RendererModule::Direct3D11 => "Direct3D11",
            RendererModule::Direct3D12 => "Direct3D12",
        }
    }

    /// Modules to try, in order of preference, on the current platform.
    pub fn platform_defaults() -> Vec<RendererModule> {
        #[cfg(target_os = "windows")]
        {
            vec![
                RendererModule::Direct3D12,
                RendererModule::Vulkan,
                RendererModule::Direct3D11,
                RendererModule::OpenGL,
                RendererModule::Null,
            ]
        }
        #[cfg(any(target_os = "macos", target_os = "ios"))]
        {
            vec![RendererModule::Metal, RendererModule::OpenGL, RendererModule::Null]
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "ios")))]
        {
            vec![
                RendererModule::Vulkan,
                RendererModule::OpenGL,
                RendererModule::Null,
            ]
        }
    }
}

impl fmt::Display for RendererModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A module name as given by a user, with an optional OpenGL profile version
/// (`gl330` selects OpenGL 3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleRequest {
    /// The requested module.
    pub module: RendererModule,
    /// Requested profile version as three digits, OpenGL only.
    pub version: Option<u32>,
}

impl ModuleRequest {
    /// Requests a module without a specific version.
    pub fn new(module: RendererModule) -> Self {
        Self {
            module,
            version: None,
        }
    }

    /// Returns `(major, minor)` of the requested version.
    pub fn version_major_minor(&self) -> Option<(u32, u32)> {
        self.version.map(|v| (v / 100, (v / 10) % 10))
    }
}

impl FromStr for ModuleRequest {
    type Err = RenderError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let lower = name.trim().to_ascii_lowercase();
        let module = match lower.as_str() {
            "null" => Some(RendererModule::Null),
            "gl" | "opengl" => Some(RendererModule::OpenGL),
            "vk" | "vulkan" => Some(RendererModule::Vulkan),
            "mt" | "mtl" | "metal" => Some(RendererModule::Metal),
            "d3d11" | "dx11" | "direct3d11" => Some(RendererModule::Direct3D11),
            "d3d12" | "dx12" | "direct3d12" => Some(RendererModule::Direct3D12),
            _ => None,
        };
        if let Some(module) = module {
            return Ok(ModuleRequest::new(module));
        }

        let versioned = lower
            .strip_prefix("opengl")
            .or_else(|| lower.strip_prefix("gl"))
            .filter(|digits| digits.len() == 3 && digits.bytes().all(|b| b.is_ascii_digit()));
        match versioned.and_then(|digits| digits.parse::<u32>().ok()) {
            Some(version) => Ok(ModuleRequest {
                module: RendererModule::OpenGL,
                version: Some(version),
            }),
            None => Err(RenderError::UnknownModule(name.to_string())),
        }
    }
}

impl FromStr for RendererModule {
    type Err = RenderError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        name.parse::<ModuleRequest>().map(|request| request.module)
    }
}

/// A hardware vendor that adapter selection may prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    /// Advanced Micro Devices.
    Amd,
    /// Intel.
    Intel,
    /// NVIDIA.
    Nvidia,
}

impl Vendor {
    /// PCI vendor ID.
    pub fn pci_id(self) -> u32 {
        match self {
            Vendor::Amd => 0x1002,
            Vendor::Intel => 0x8086,
            Vendor::Nvidia => 0x10de,
        }
    }

    /// Human-readable vendor name.
    pub fn name(self) -> &'static str {
        match self {
            Vendor::Amd => "Advanced Micro Devices, Inc.",
            Vendor::Intel => "Intel Corporation",
            Vendor::Nvidia => "NVIDIA Corporation",
        }
    }

    /// Looks up a vendor by PCI vendor ID.
    pub fn from_pci_id(id: u32) -> Option<Vendor> {
        [Vendor::Amd, Vendor::Intel, Vendor::Nvidia]
            .into_iter()
            .find(|v| v.pci_id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(name: &str) -> Result<ModuleRequest, RenderError> {
        name.parse()
    }

    #[test]
    fn test_module_aliases() {
        let cases = [
            ("gl", RendererModule::OpenGL),
            ("OpenGL", RendererModule::OpenGL),
            ("vk", RendererModule::Vulkan),
            ("mt", RendererModule::Metal),
            ("mtl", RendererModule::Metal),
            ("dx11", RendererModule::Direct3D11),
            ("direct3d12", RendererModule::Direct3D12),
            ("null", RendererModule::Null),
        ];
        for (alias, module) in cases {
            assert_eq!(parse(alias).unwrap().module, module, "alias {alias}");
        }
    }

    #[test]
    fn test_versioned_opengl() {
        let request = parse("gl330").unwrap();
        assert_eq!(request.module, RendererModule::OpenGL);
        assert_eq!(request.version, Some(330));
        assert_eq!(request.version_major_minor(), Some((3, 3)));
        assert_eq!(parse("opengl450").unwrap().version, Some(450));
    }

    #[test]
    fn test_invalid_names() {
        assert!(matches!(parse("gl33"), Err(RenderError::UnknownModule(_))));
        assert!(parse("vk110").is_err());
        assert!(parse("software").is_err());
    }

    #[test]
    fn test_platform_defaults_end_with_null() {
        assert_eq!(
            RendererModule::platform_defaults().last(),
            Some(&RendererModule::Null)
        );
    }

    #[test]
    fn test_vendor_lookup() {
        assert_eq!(Vendor::from_pci_id(0x10de), Some(Vendor::Nvidia));
        assert_eq!(Vendor::from_pci_id(0x1234), None);
    }
}
