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

//! Swap-chain descriptors.

use super::{Format, RendererInfo};
use crate::math::Extent2D;
use serde::{Deserialize, Serialize};

/// Describes a swap chain.
///
/// Swap chains present into off-screen targets; `fullscreen` and the surface title
/// are kept as metadata for hosts that attach a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapChainDescriptor {
    /// Optional debug label.
    pub label: Option<String>,
    /// Resolution of the back buffers.
    pub resolution: Extent2D,
    /// Bits per color pixel (32 for RGBA8, 24 for RGB8 surfaces).
    pub color_bits: u32,
    /// Bits of the depth buffer, `0` for none.
    pub depth_bits: u32,
    /// Bits of the stencil buffer, `0` for none.
    pub stencil_bits: u32,
    /// Requested samples per pixel.
    pub samples: u32,
    /// Number of back buffers.
    pub swap_buffers: u32,
    /// Requests exclusive fullscreen mode.
    pub fullscreen: bool,
}

impl Default for SwapChainDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            resolution: Extent2D::new(800, 600),
            color_bits: 32,
            depth_bits: 24,
            stencil_bits: 8,
            samples: 1,
            swap_buffers: 2,
            fullscreen: false,
        }
    }
}

impl SwapChainDescriptor {
    /// Color format matching `color_bits`.
    pub fn color_format(&self) -> Format {
        match self.color_bits {
            0 => Format::Undefined,
            _ => Format::BGRA8UNorm,
        }
    }

    /// Depth-stencil format matching `depth_bits` and `stencil_bits`.
    pub fn depth_stencil_format(&self) -> Format {
        Format::from_depth_stencil_bits(self.depth_bits, self.stencil_bits)
    }
}

/// Clamps a requested sample count to a power of two supported by the device.
pub fn clamp_samples(requested: u32, max_samples: u32) -> u32 {
    let limit = requested.min(max_samples).max(1);
    1 << (31 - limit.leading_zeros())
}

/// Title for a surface showing the given renderer.
pub fn default_surface_title(info: &RendererInfo) -> String {
    format!("Prism Renderer ( {} )", info.renderer_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_clamping() {
        assert_eq!(clamp_samples(0, 8), 1);
        assert_eq!(clamp_samples(4, 8), 4);
        assert_eq!(clamp_samples(6, 8), 4);
        assert_eq!(clamp_samples(16, 8), 8);
        assert_eq!(clamp_samples(8, 1), 1);
    }

    #[test]
    fn test_default_formats() {
        let desc = SwapChainDescriptor::default();
        assert_eq!(desc.color_format(), Format::BGRA8UNorm);
        assert_eq!(desc.depth_stencil_format(), Format::D24UNormS8UInt);
    }

    #[test]
    fn test_descriptor_fills_missing_json_fields() {
        let desc: SwapChainDescriptor =
            serde_json::from_str(r#"{ "resolution": { "width": 64, "height": 32 } }"#).unwrap();
        assert_eq!(desc.resolution, Extent2D::new(64, 32));
        assert_eq!(desc.swap_buffers, 2);
    }

    #[test]
    fn test_surface_title() {
        let info = RendererInfo {
            renderer_name: "Null".to_string(),
            ..Default::default()
        };
        assert_eq!(default_surface_title(&info), "Prism Renderer ( Null )");
    }
}
