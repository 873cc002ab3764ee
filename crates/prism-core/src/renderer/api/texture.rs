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

//! Texture and sampler descriptors with mip-chain arithmetic.

use super::{BindFlags, Format, MiscFlags};
use crate::math::{Extent3D, Offset3D};
use crate::renderer::error::ResourceError;
use std::borrow::Cow;

/// The dimensionality and layout of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureType {
    /// One-dimensional texture.
    Texture1D,
    /// Two-dimensional texture.
    #[default]
    Texture2D,
    /// Volume texture.
    Texture3D,
    /// Cube map with six faces.
    TextureCube,
    /// Array of 1D textures.
    Texture1DArray,
    /// Array of 2D textures.
    Texture2DArray,
    /// Array of cube maps.
    TextureCubeArray,
    /// Multisampled 2D texture.
    Texture2DMS,
    /// Array of multisampled 2D textures.
    Texture2DMSArray,
}

impl TextureType {
    /// Returns `true` for array textures (including cube maps).
    pub fn is_array(self) -> bool {
        matches!(
            self,
            TextureType::Texture1DArray
                | TextureType::Texture2DArray
                | TextureType::TextureCube
                | TextureType::TextureCubeArray
                | TextureType::Texture2DMSArray
        )
    }

    /// Returns `true` for multisampled textures.
    pub fn is_multisample(self) -> bool {
        matches!(
            self,
            TextureType::Texture2DMS | TextureType::Texture2DMSArray
        )
    }

    /// Returns `true` for cube maps and cube map arrays.
    pub fn is_cube(self) -> bool {
        matches!(self, TextureType::TextureCube | TextureType::TextureCubeArray)
    }

    /// Returns `true` if mip extents shrink along the depth axis.
    fn has_depth_mips(self) -> bool {
        self == TextureType::Texture3D
    }
}

/// Number of mip levels of a full chain for a texture of the given type and extent.
///
/// Multisampled textures have exactly one level.
pub fn num_mip_levels(ty: TextureType, extent: Extent3D) -> u32 {
    if ty.is_multisample() {
        return 1;
    }
    let depth = if ty.has_depth_mips() { extent.depth } else { 1 };
    let max_dim = extent.width.max(extent.height).max(depth).max(1);
    32 - max_dim.leading_zeros()
}

/// Describes a texture to create.
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Texture type.
    pub ty: TextureType,
    /// How the texture will be bound.
    pub bind_flags: BindFlags,
    /// Miscellaneous flags.
    pub misc_flags: MiscFlags,
    /// Texel format.
    pub format: Format,
    /// Extent of the first mip level. `depth` is 1 for non-volume textures.
    pub extent: Extent3D,
    /// Number of array layers (6 per cube for cube maps).
    pub array_layers: u32,
    /// Number of mip levels, `0` for the full chain.
    pub mip_levels: u32,
    /// Samples per texel for multisampled textures.
    pub samples: u32,
}

impl Default for TextureDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: None,
            ty: TextureType::Texture2D,
            bind_flags: BindFlags::SAMPLED | BindFlags::COLOR_ATTACHMENT,
            misc_flags: MiscFlags::EMPTY,
            format: Format::RGBA8UNorm,
            extent: Extent3D::new(1, 1, 1),
            array_layers: 1,
            mip_levels: 1,
            samples: 1,
        }
    }
}

impl TextureDescriptor<'_> {
    /// Detaches the descriptor from borrowed data so a backend can keep it.
    pub fn into_owned(self) -> TextureDescriptor<'static> {
        TextureDescriptor {
            label: self.label.map(|label| Cow::Owned(label.into_owned())),
            ty: self.ty,
            bind_flags: self.bind_flags,
            misc_flags: self.misc_flags,
            format: self.format,
            extent: self.extent,
            array_layers: self.array_layers,
            mip_levels: self.mip_levels,
            samples: self.samples,
        }
    }

    /// The effective number of mip levels.
    pub fn num_mip_levels(&self) -> u32 {
        let full = num_mip_levels(self.ty, self.extent);
        if self.mip_levels == 0 || self.misc_flags.contains(MiscFlags::GENERATE_MIPS) {
            full
        } else {
            self.mip_levels.min(full)
        }
    }

    /// Extent of the given mip level, or `None` if the level does not exist.
    pub fn mip_extent(&self, level: u32) -> Option<Extent3D> {
        if level >= self.num_mip_levels() {
            return None;
        }
        let shrink = |v: u32| (v >> level).max(1);
        let depth = if self.ty.has_depth_mips() {
            shrink(self.extent.depth)
        } else {
            self.extent.depth
        };
        Some(Extent3D::new(
            shrink(self.extent.width),
            shrink(self.extent.height),
            depth,
        ))
    }

    /// Number of array layers, never less than one.
    pub fn layers(&self) -> u32 {
        self.array_layers.max(1)
    }

    /// Size in bytes of one array layer of the given mip level.
    pub fn mip_layer_size(&self, level: u32) -> u64 {
        self.mip_extent(level)
            .map_or(0, |e| e.volume() * self.format.bytes_per_pixel() as u64)
    }

    /// Total size in bytes of every mip level of every layer.
    pub fn texture_size_in_bytes(&self) -> u64 {
        (0..self.num_mip_levels())
            .map(|level| self.mip_layer_size(level) * self.layers() as u64)
            .sum()
    }

    /// Checks the descriptor before it reaches a backend.
    pub fn validate(&self) -> Result<(), ResourceError> {
        if self.extent.is_empty() {
            return Err(ResourceError::InvalidDescriptor(
                "texture extent must be non-zero".to_string(),
            ));
        }
        if self.format == Format::Undefined {
            return Err(ResourceError::UnsupportedFormat(self.format));
        }
        if self.ty.is_cube() && (self.extent.width != self.extent.height || self.layers() % 6 != 0)
        {
            return Err(ResourceError::InvalidDescriptor(
                "cube textures need square faces and a multiple of 6 layers".to_string(),
            ));
        }
        if !self.ty.is_multisample() && self.samples > 1 {
            return Err(ResourceError::InvalidDescriptor(format!(
                "{:?} cannot have {} samples",
                self.ty, self.samples
            )));
        }
        Ok(())
    }

    /// Checks that `region` addresses existing texels, layers and mip levels.
    pub fn validate_region(&self, region: &TextureRegion) -> Result<(), ResourceError> {
        let sub = &region.subresource;
        let layer_end = sub.base_array_layer + sub.num_array_layers.max(1);
        if layer_end > self.layers() {
            return Err(ResourceError::OutOfBounds {
                offset: sub.base_array_layer as u64,
                size: sub.num_array_layers as u64,
                limit: self.layers() as u64,
            });
        }
        let extent = self
            .mip_extent(sub.base_mip_level)
            .ok_or(ResourceError::OutOfBounds {
                offset: sub.base_mip_level as u64,
                size: 1,
                limit: self.num_mip_levels() as u64,
            })?;
        let axes = [
            (region.offset.x, region.extent.width, extent.width),
            (region.offset.y, region.extent.height, extent.height),
            (region.offset.z, region.extent.depth, extent.depth),
        ];
        for (offset, size, limit) in axes {
            if offset < 0 || offset as u64 + size as u64 > limit as u64 {
                return Err(ResourceError::OutOfBounds {
                    offset: offset.max(0) as u64,
                    size: size as u64,
                    limit: limit as u64,
                });
            }
        }
        Ok(())
    }
}

/// A range of array layers and mip levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureSubresource {
    /// First array layer.
    pub base_array_layer: u32,
    /// Number of array layers.
    pub num_array_layers: u32,
    /// First mip level.
    pub base_mip_level: u32,
    /// Number of mip levels.
    pub num_mip_levels: u32,
}

impl Default for TextureSubresource {
    fn default() -> Self {
        Self {
            base_array_layer: 0,
            num_array_layers: 1,
            base_mip_level: 0,
            num_mip_levels: 1,
        }
    }
}

/// A single texel position inside one subresource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureLocation {
    /// Texel offset.
    pub offset: Offset3D,
    /// Array layer.
    pub array_layer: u32,
    /// Mip level.
    pub mip_level: u32,
}

/// A box of texels within a subresource range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureRegion {
    /// Layers and mip level addressed by the region.
    pub subresource: TextureSubresource,
    /// Texel offset of the region.
    pub offset: Offset3D,
    /// Texel extent of the region.
    pub extent: Extent3D,
}

impl TextureRegion {
    /// A region covering the whole first mip level of a single layer.
    pub fn whole(extent: Extent3D) -> Self {
        Self {
            subresource: TextureSubresource::default(),
            offset: Offset3D::default(),
            extent,
        }
    }
}

/// Texture addressing mode outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum SamplerAddressMode {
    #[default]
    Repeat,
    Mirror,
    Clamp,
    Border,
}

/// Texture filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum SamplerFilter {
    Nearest,
    #[default]
    Linear,
}

/// Comparison function for depth tests and comparison samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum CompareOp {
    NeverPass,
    #[default]
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    AlwaysPass,
}

/// Describes a sampler state.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Addressing along U, V and W.
    pub address_mode: [SamplerAddressMode; 3],
    /// Minification filter.
    pub min_filter: SamplerFilter,
    /// Magnification filter.
    pub mag_filter: SamplerFilter,
    /// Filter between mip levels.
    pub mip_filter: SamplerFilter,
    /// Minimum level of detail.
    pub min_lod: f32,
    /// Maximum level of detail.
    pub max_lod: f32,
    /// Comparison function for comparison samplers.
    pub compare: Option<CompareOp>,
    /// Maximum anisotropy, `1` disables anisotropic filtering.
    pub max_anisotropy: u16,
}

impl Default for SamplerDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: None,
            address_mode: [SamplerAddressMode::Repeat; 3],
            min_filter: SamplerFilter::Linear,
            mag_filter: SamplerFilter::Linear,
            mip_filter: SamplerFilter::Linear,
            min_lod: 0.0,
            max_lod: 1000.0,
            compare: None,
            max_anisotropy: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_mip_chain_counts() {
        assert_eq!(
            num_mip_levels(TextureType::Texture2D, Extent3D::new(256, 128, 1)),
            9
        );
        assert_eq!(
            num_mip_levels(TextureType::Texture2D, Extent3D::new(1, 1, 1)),
            1
        );
        assert_eq!(
            num_mip_levels(TextureType::Texture3D, Extent3D::new(4, 4, 64)),
            7
        );
        // Array layers do not contribute to the chain.
        assert_eq!(
            num_mip_levels(TextureType::Texture2DArray, Extent3D::new(4, 4, 64)),
            3
        );
        assert_eq!(
            num_mip_levels(TextureType::Texture2DMS, Extent3D::new(512, 512, 1)),
            1
        );
    }

    #[test]
    fn test_mip_extent_clamps_to_one() {
        let desc = TextureDescriptor {
            extent: Extent3D::new(8, 2, 1),
            mip_levels: 0,
            ..Default::default()
        };
        assert_eq!(desc.num_mip_levels(), 4);
        assert_eq!(desc.mip_extent(2), Some(Extent3D::new(2, 1, 1)));
        assert_eq!(desc.mip_extent(3), Some(Extent3D::new(1, 1, 1)));
        assert_eq!(desc.mip_extent(4), None);
    }

    #[test]
    fn test_texture_size_sums_levels_and_layers() {
        let desc = TextureDescriptor {
            ty: TextureType::Texture2DArray,
            extent: Extent3D::new(4, 4, 1),
            array_layers: 2,
            mip_levels: 0,
            ..Default::default()
        };
        // (16 + 4 + 1) texels * 4 bytes * 2 layers
        assert_eq!(desc.texture_size_in_bytes(), 168);
    }

    #[test]
    fn test_region_validation() {
        let desc = TextureDescriptor {
            extent: Extent3D::new(16, 16, 1),
            mip_levels: 0,
            ..Default::default()
        };
        let mut region = TextureRegion::whole(Extent3D::new(16, 16, 1));
        assert!(desc.validate_region(&region).is_ok());

        region.subresource.base_mip_level = 1;
        assert!(desc.validate_region(&region).is_err());

        region.extent = Extent3D::new(8, 8, 1);
        assert!(desc.validate_region(&region).is_ok());

        region.offset = Offset3D::new(-1, 0, 0);
        assert!(desc.validate_region(&region).is_err());
    }

    #[test]
    fn test_cube_validation() {
        let desc = TextureDescriptor {
            ty: TextureType::TextureCube,
            extent: Extent3D::new(16, 8, 1),
            array_layers: 6,
            ..Default::default()
        };
        assert!(desc.validate().is_err());
        let desc = TextureDescriptor {
            extent: Extent3D::new(16, 16, 1),
            ..desc
        };
        assert!(desc.validate().is_ok());
    }
}
