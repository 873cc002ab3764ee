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

//! Renderer information, capabilities and render-system configuration.

use super::{Format, SwapChainDescriptor, Vendor};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default size of a staging-buffer pool chunk.
pub const DEFAULT_STAGING_CHUNK_SIZE: u64 = 0x10000;

/// Descriptive information about a loaded renderer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RendererInfo {
    /// Name of the renderer and its API version (`"Vulkan 1.3"`).
    pub renderer_name: String,
    /// Name of the rendering device.
    pub device_name: String,
    /// Name of the device vendor.
    pub vendor_name: String,
    /// Shading language understood by the renderer.
    pub shading_language_name: String,
    /// Enabled API extensions.
    pub extension_names: Vec<String>,
}

/// Origin of the screen space coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScreenOrigin {
    /// Origin at the upper-left corner (Direct3D, Metal, Vulkan).
    #[default]
    UpperLeft,
    /// Origin at the lower-left corner (OpenGL).
    LowerLeft,
}

/// Range of normalized device depth coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClippingRange {
    /// Depth from -1 to 1 (OpenGL).
    MinusOneToOne,
    /// Depth from 0 to 1.
    #[default]
    ZeroToOne,
}

/// A shading language and version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ShadingLanguage {
    Glsl(u32),
    Essl(u32),
    Hlsl(u32),
    Msl(u32),
    SpirV,
    Wgsl,
}

/// Optional features of a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderingFeatures {
    /// Render targets other than the swap chain.
    pub has_render_targets: bool,
    /// 3D textures.
    pub has_3d_textures: bool,
    /// Cube textures.
    pub has_cube_textures: bool,
    /// Array textures.
    pub has_array_textures: bool,
    /// Cube array textures.
    pub has_cube_array_textures: bool,
    /// Multisampled textures.
    pub has_multi_sample_textures: bool,
    /// Sampler states.
    pub has_samplers: bool,
    /// Constant buffers.
    pub has_constant_buffers: bool,
    /// Storage buffers.
    pub has_storage_buffers: bool,
    /// Individual uniforms outside of constant buffers.
    pub has_uniforms: bool,
    /// Geometry shaders.
    pub has_geometry_shaders: bool,
    /// Tessellation shaders.
    pub has_tessellation_shaders: bool,
    /// Compute shaders.
    pub has_compute_shaders: bool,
    /// Hardware instancing.
    pub has_instancing: bool,
    /// Instancing with a first instance offset.
    pub has_offset_instancing: bool,
    /// Indirect draws.
    pub has_indirect_drawing: bool,
    /// Multiple viewports.
    pub has_viewport_arrays: bool,
    /// Conditional rendering.
    pub has_conditional_rendering: bool,
    /// Stream output.
    pub has_stream_outputs: bool,
    /// Logic fragment operations.
    pub has_logic_op: bool,
    /// Pipeline statistics queries.
    pub has_pipeline_statistics: bool,
}

/// Numeric limits of a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderingLimits {
    /// Largest 1D texture.
    pub max_1d_texture_size: u32,
    /// Largest 2D texture side.
    pub max_2d_texture_size: u32,
    /// Largest 3D texture side.
    pub max_3d_texture_size: u32,
    /// Largest cube face.
    pub max_cube_texture_size: u32,
    /// Most array layers.
    pub max_texture_array_layers: u32,
    /// Most color attachments per render target.
    pub max_color_attachments: u32,
    /// Most samples per pixel.
    pub max_samples: u32,
    /// Most viewports bound at once.
    pub max_viewports: u32,
    /// Largest viewport side.
    pub max_viewport_size: [u32; 2],
    /// Largest buffer in bytes.
    pub max_buffer_size: u64,
    /// Largest constant buffer in bytes.
    pub max_constant_buffer_size: u64,
    /// Most compute work groups per dispatch and axis.
    pub max_compute_work_groups: [u32; 3],
    /// Alignment of constant buffer offsets.
    pub min_constant_buffer_alignment: u64,
    /// Alignment of storage buffer offsets.
    pub min_storage_buffer_alignment: u64,
    /// Alignment of buffer-to-texture copy rows.
    pub texture_row_alignment: u32,
}

impl Default for RenderingLimits {
    fn default() -> Self {
        Self {
            max_1d_texture_size: 16384,
            max_2d_texture_size: 16384,
            max_3d_texture_size: 2048,
            max_cube_texture_size: 16384,
            max_texture_array_layers: 2048,
            max_color_attachments: 8,
            max_samples: 8,
            max_viewports: 16,
            max_viewport_size: [16384, 16384],
            max_buffer_size: u32::MAX as u64,
            max_constant_buffer_size: 65536,
            max_compute_work_groups: [65535, 65535, 65535],
            min_constant_buffer_alignment: 256,
            min_storage_buffer_alignment: 256,
            texture_row_alignment: 1,
        }
    }
}

/// Everything a renderer supports.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderingCapabilities {
    /// Screen-space origin.
    pub screen_origin: ScreenOrigin,
    /// Depth clipping range.
    pub clipping_range: ClippingRange,
    /// Supported shading languages.
    pub shading_languages: Vec<ShadingLanguage>,
    /// Supported texture formats.
    pub texture_formats: Vec<Format>,
    /// Optional features.
    pub features: RenderingFeatures,
    /// Numeric limits.
    pub limits: RenderingLimits,
}

/// Configuration of a render system, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSystemDescriptor {
    /// Module name or alias (`"vulkan"`, `"gl330"`, `"null"`).
    pub module: String,
    /// Enables backend validation and verbose logging.
    pub debug: bool,
    /// Preferred hardware vendor when several adapters are present.
    pub preferred_vendor: Option<Vendor>,
    /// Prefers a low-power adapter over a high-performance one.
    pub prefer_low_power: bool,
    /// Size of a staging-buffer pool chunk in bytes.
    pub staging_chunk_size: u64,
    /// Default swap-chain configuration.
    pub swap_chain: SwapChainDescriptor,
}

impl Default for RenderSystemDescriptor {
    fn default() -> Self {
        Self {
            module: "null".to_string(),
            debug: false,
            preferred_vendor: None,
            prefer_low_power: false,
            staging_chunk_size: DEFAULT_STAGING_CHUNK_SIZE,
            swap_chain: SwapChainDescriptor::default(),
        }
    }
}

impl RenderSystemDescriptor {
    /// A default descriptor for the given module name.
    pub fn for_module(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            ..Default::default()
        }
    }

    /// Loads a descriptor from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Loads a descriptor from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }

    /// Saves the descriptor to a JSON file.
    pub fn to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults_from_partial_json() {
        let desc = RenderSystemDescriptor::from_json(
            r#"{ "module": "vulkan", "preferred_vendor": "nvidia" }"#,
        )
        .unwrap();
        assert_eq!(desc.module, "vulkan");
        assert_eq!(desc.preferred_vendor, Some(Vendor::Nvidia));
        assert_eq!(desc.staging_chunk_size, DEFAULT_STAGING_CHUNK_SIZE);
        assert!(!desc.debug);
    }

    #[test]
    fn test_descriptor_file_roundtrip() {
        let path = std::env::temp_dir().join(format!(
            "prism_render_system_{}.json",
            std::process::id()
        ));
        let desc = RenderSystemDescriptor {
            debug: true,
            staging_chunk_size: 4096,
            ..RenderSystemDescriptor::for_module("d3d12")
        };
        desc.to_file(&path).unwrap();
        let loaded = RenderSystemDescriptor::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, desc);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(RenderSystemDescriptor::from_json("{ module: }").is_err());
    }
}
