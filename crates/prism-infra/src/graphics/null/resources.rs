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

//! CPU-side storage of the null device's objects.

use prism_core::math::ColorRgba;
use prism_core::renderer::staging::{ResourceState, TrackedResource};
use prism_core::renderer::{
    AttachmentFormatDescriptor, BufferDescriptor, ClearFlags, ClearValue, Format,
    PipelineKind, PrimitiveTopology, QueryType, RenderPassId, ResourceBinding, ResourceError,
    ShaderProgramId, ShaderReflection, ShaderType, TextureDescriptor, TextureId, TextureRegion,
};
use std::ops::Range;

#[derive(Debug)]
pub(crate) struct NullBuffer {
    pub(crate) descriptor: BufferDescriptor<'static>,
    pub(crate) data: Vec<u8>,
    state: ResourceState,
}

impl NullBuffer {
    pub(crate) fn new(descriptor: BufferDescriptor<'static>) -> Self {
        let data = vec![0; descriptor.internal_size() as usize];
        Self {
            descriptor,
            data,
            state: ResourceState::Common,
        }
    }

    /// Size visible to the application, without the stream-output counter.
    pub(crate) fn size(&self) -> u64 {
        self.descriptor.size
    }
}

impl TrackedResource for NullBuffer {
    fn resource_state(&self) -> ResourceState {
        self.state
    }

    fn set_resource_state(&mut self, state: ResourceState) {
        self.state = state;
    }
}

/// A texture stored as one byte vector per mip level, array layers back to back.
#[derive(Debug)]
pub(crate) struct NullTexture {
    pub(crate) descriptor: TextureDescriptor<'static>,
    levels: Vec<Vec<u8>>,
    /// Allocated by a render target for an attachment without a texture.
    pub(crate) internal: bool,
}

impl NullTexture {
    pub(crate) fn new(descriptor: TextureDescriptor<'static>) -> Self {
        let layers = descriptor.layers() as u64;
        let levels = (0..descriptor.num_mip_levels())
            .map(|level| vec![0; (descriptor.mip_layer_size(level) * layers) as usize])
            .collect();
        Self {
            descriptor,
            levels,
            internal: false,
        }
    }

    pub(crate) fn format(&self) -> Format {
        self.descriptor.format
    }

    pub(crate) fn num_levels(&self) -> u32 {
        self.levels.len() as u32
    }

    fn bytes_per_pixel(&self) -> usize {
        self.descriptor.format.bytes_per_pixel() as usize
    }

    /// Byte ranges of every texel row covered by `region`, in tightly packed order.
    fn row_ranges(&self, region: &TextureRegion) -> Result<Vec<Range<usize>>, ResourceError> {
        self.descriptor.validate_region(region)?;
        let level = region.subresource.base_mip_level;
        let extent = self
            .descriptor
            .mip_extent(level)
            .ok_or(ResourceError::NotFound)?;
        let bpp = self.bytes_per_pixel();
        let (width, height, depth) = (
            extent.width as usize,
            extent.height as usize,
            extent.depth as usize,
        );
        let row_len = region.extent.width as usize * bpp;
        let first_layer = region.subresource.base_array_layer as usize;
        let num_layers = region.subresource.num_array_layers.max(1) as usize;

        let mut rows = Vec::new();
        for layer in first_layer..first_layer + num_layers {
            for z in 0..region.extent.depth as usize {
                let z = z + region.offset.z as usize;
                for y in 0..region.extent.height as usize {
                    let y = y + region.offset.y as usize;
                    let texel = ((layer * depth + z) * height + y) * width + region.offset.x as usize;
                    rows.push(texel * bpp..texel * bpp + row_len);
                }
            }
        }
        Ok(rows)
    }

    /// Number of bytes a tightly packed copy of `region` occupies.
    pub(crate) fn region_size(&self, region: &TextureRegion) -> u64 {
        region.extent.volume()
            * region.subresource.num_array_layers.max(1) as u64
            * self.bytes_per_pixel() as u64
    }

    pub(crate) fn read_region(&self, region: &TextureRegion) -> Result<Vec<u8>, ResourceError> {
        let rows = self.row_ranges(region)?;
        let level = &self.levels[region.subresource.base_mip_level as usize];
        let mut out = Vec::with_capacity(self.region_size(region) as usize);
        for row in rows {
            out.extend_from_slice(&level[row]);
        }
        Ok(out)
    }

    pub(crate) fn write_region(
        &mut self,
        region: &TextureRegion,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let expected = self.region_size(region);
        if data.len() as u64 != expected {
            return Err(ResourceError::InvalidAccess(format!(
                "texture region needs {expected} bytes of texel data, got {}",
                data.len()
            )));
        }
        let rows = self.row_ranges(region)?;
        let level = &mut self.levels[region.subresource.base_mip_level as usize];
        let mut src = 0;
        for row in rows {
            let len = row.len();
            level[row].copy_from_slice(&data[src..src + len]);
            src += len;
        }
        Ok(())
    }

    /// Texels of one array layer of a mip level.
    pub(crate) fn layer_mut(&mut self, level: u32, layer: u32) -> Option<&mut [u8]> {
        let layer_size = self.descriptor.mip_layer_size(level) as usize;
        let start = layer as usize * layer_size;
        self.levels
            .get_mut(level as usize)?
            .get_mut(start..start + layer_size)
    }

    /// Fills one layer of a mip level with a clear value.
    pub(crate) fn clear_layer(
        &mut self,
        level: u32,
        layer: u32,
        flags: ClearFlags,
        value: &ClearValue,
    ) -> Result<(), ResourceError> {
        let format = self.format();
        let bpp = self.bytes_per_pixel();
        let limit = self.descriptor.layers() as u64;
        let texels = self.layer_mut(level, layer).ok_or(ResourceError::OutOfBounds {
            offset: layer as u64,
            size: 1,
            limit,
        })?;
        if format.is_depth_or_stencil() {
            for texel in texels.chunks_exact_mut(bpp) {
                write_depth_stencil(format, texel, flags, value)?;
            }
        } else if flags.contains(ClearFlags::COLOR) {
            let encoded = encode_color(format, value.color)?;
            for texel in texels.chunks_exact_mut(bpp) {
                texel.copy_from_slice(&encoded);
            }
        }
        Ok(())
    }

    /// Downsamples `levels` of the given layers with a box filter.
    ///
    /// ## Errors
    /// * `ResourceError::UnsupportedFormat` - For formats other than 8-bit RGBA/BGRA.
    pub(crate) fn generate_mips(
        &mut self,
        levels: Range<u32>,
        layers: Range<u32>,
    ) -> Result<(), ResourceError> {
        let format = self.format();
        if !matches!(
            format,
            Format::RGBA8UNorm | Format::RGBA8UNormSrgb | Format::BGRA8UNorm | Format::BGRA8UNormSrgb
        ) {
            return Err(ResourceError::UnsupportedFormat(format));
        }
        let end = levels.end.min(self.num_levels());
        for level in levels.start.max(1)..end {
            let (Some(src), Some(dst)) = (
                self.descriptor.mip_extent(level - 1),
                self.descriptor.mip_extent(level),
            ) else {
                break;
            };
            let (src_levels, dst_levels) = self.levels.split_at_mut(level as usize);
            let src_data = &src_levels[level as usize - 1];
            let dst_data = &mut dst_levels[0];
            let src_layer_size = src.volume() as usize * 4;
            let dst_layer_size = dst.volume() as usize * 4;

            for layer in layers.clone() {
                let src_layer =
                    &src_data[layer as usize * src_layer_size..][..src_layer_size];
                let dst_layer =
                    &mut dst_data[layer as usize * dst_layer_size..][..dst_layer_size];
                box_filter(src_layer, src, dst_layer, dst);
            }
        }
        Ok(())
    }
}

fn box_filter(
    src: &[u8],
    src_extent: prism_core::math::Extent3D,
    dst: &mut [u8],
    dst_extent: prism_core::math::Extent3D,
) {
    let (sw, sh, sd) = (
        src_extent.width as usize,
        src_extent.height as usize,
        src_extent.depth as usize,
    );
    let (dw, dh, dd) = (
        dst_extent.width as usize,
        dst_extent.height as usize,
        dst_extent.depth as usize,
    );
    let depth_scale = if dd < sd { 2 } else { 1 };
    for z in 0..dd {
        for y in 0..dh {
            for x in 0..dw {
                let mut sum = [0u32; 4];
                let mut count = 0;
                for sz in [z * depth_scale, (z * depth_scale + depth_scale - 1).min(sd - 1)] {
                    for sy in [(y * 2).min(sh - 1), (y * 2 + 1).min(sh - 1)] {
                        for sx in [(x * 2).min(sw - 1), (x * 2 + 1).min(sw - 1)] {
                            let texel = ((sz * sh + sy) * sw + sx) * 4;
                            for (c, s) in sum.iter_mut().enumerate() {
                                *s += src[texel + c] as u32;
                            }
                            count += 1;
                        }
                    }
                }
                let texel = ((z * dh + y) * dw + x) * 4;
                for (c, s) in sum.iter().enumerate() {
                    dst[texel + c] = ((s + count / 2) / count) as u8;
                }
            }
        }
    }
}

/// Encodes a clear color as one texel of a color format.
pub(crate) fn encode_color(format: Format, color: ColorRgba) -> Result<Vec<u8>, ResourceError> {
    match format {
        Format::RGBA8UNorm | Format::RGBA8UNormSrgb => Ok(color.to_unorm8().to_vec()),
        Format::BGRA8UNorm | Format::BGRA8UNormSrgb => {
            let [r, g, b, a] = color.to_unorm8();
            Ok(vec![b, g, r, a])
        }
        Format::R32Float => Ok(color.r.to_le_bytes().to_vec()),
        Format::RGBA32Float => Ok(bytemuck::cast_slice(&color.to_array()).to_vec()),
        other => Err(ResourceError::UnsupportedFormat(other)),
    }
}

fn unorm(value: f32, max: u32) -> u32 {
    (f64::from(value.clamp(0.0, 1.0)) * f64::from(max)).round() as u32
}

/// Writes the depth and/or stencil part of a clear value into one texel.
pub(crate) fn write_depth_stencil(
    format: Format,
    texel: &mut [u8],
    flags: ClearFlags,
    value: &ClearValue,
) -> Result<(), ResourceError> {
    let depth = flags.contains(ClearFlags::DEPTH);
    let stencil = flags.contains(ClearFlags::STENCIL);
    match format {
        Format::D16UNorm => {
            if depth {
                texel.copy_from_slice(&(unorm(value.depth, 0xffff) as u16).to_le_bytes());
            }
        }
        Format::D32Float => {
            if depth {
                texel.copy_from_slice(&value.depth.to_le_bytes());
            }
        }
        Format::D24UNormS8UInt => {
            let mut packed = u32::from_le_bytes([texel[0], texel[1], texel[2], texel[3]]);
            if depth {
                packed = (packed & 0xff00_0000) | unorm(value.depth, 0x00ff_ffff);
            }
            if stencil {
                packed = (packed & 0x00ff_ffff) | ((value.stencil & 0xff) << 24);
            }
            texel.copy_from_slice(&packed.to_le_bytes());
        }
        Format::D32FloatS8X24UInt => {
            if depth {
                texel[..4].copy_from_slice(&value.depth.to_le_bytes());
            }
            if stencil {
                texel[4] = (value.stencil & 0xff) as u8;
            }
        }
        other => return Err(ResourceError::UnsupportedFormat(other)),
    }
    Ok(())
}

#[derive(Debug)]
pub(crate) struct NullSampler {
    pub(crate) label: Option<String>,
}

#[derive(Debug)]
pub(crate) struct NullShader {
    pub(crate) ty: ShaderType,
    pub(crate) valid: bool,
    pub(crate) reflection: ShaderReflection,
}

#[derive(Debug)]
pub(crate) struct NullPipelineLayout {
    pub(crate) num_bindings: usize,
}

#[derive(Debug)]
pub(crate) struct NullPipeline {
    pub(crate) kind: PipelineKind,
    pub(crate) program: ShaderProgramId,
    pub(crate) topology: PrimitiveTopology,
}

/// Primitives assembled from `vertices` vertices.
pub(crate) fn num_primitives(topology: PrimitiveTopology, vertices: u64) -> u64 {
    match topology {
        PrimitiveTopology::PointList => vertices,
        PrimitiveTopology::LineList => vertices / 2,
        PrimitiveTopology::LineStrip => vertices.saturating_sub(1),
        PrimitiveTopology::TriangleList => vertices / 3,
        PrimitiveTopology::TriangleStrip => vertices.saturating_sub(2),
        PrimitiveTopology::Patches(points) => vertices / u64::from(points.max(1)),
    }
}

#[derive(Debug)]
pub(crate) struct NullRenderPass {
    pub(crate) colors: Vec<AttachmentFormatDescriptor>,
    pub(crate) depth_stencil: Option<AttachmentFormatDescriptor>,
}

/// A texture subresource used as a render-target attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AttachmentRef {
    pub(crate) texture: TextureId,
    pub(crate) mip_level: u32,
    pub(crate) array_layer: u32,
}

#[derive(Debug)]
pub(crate) struct NullRenderTarget {
    pub(crate) colors: Vec<AttachmentRef>,
    pub(crate) depth_stencil: Option<AttachmentRef>,
    pub(crate) render_pass: Option<RenderPassId>,
}

impl NullRenderTarget {
    /// Every attachment of the target.
    pub(crate) fn attachments(&self) -> impl Iterator<Item = &AttachmentRef> {
        self.colors.iter().chain(self.depth_stencil.iter())
    }
}

#[derive(Debug)]
pub(crate) struct NullResourceHeap {
    pub(crate) resources: Vec<ResourceBinding>,
    pub(crate) bindings_per_set: usize,
}

impl NullResourceHeap {
    pub(crate) fn num_descriptor_sets(&self) -> usize {
        if self.bindings_per_set == 0 {
            usize::from(!self.resources.is_empty())
        } else {
            self.resources.len() / self.bindings_per_set
        }
    }
}

#[derive(Debug)]
pub(crate) struct NullQueryHeap {
    pub(crate) ty: QueryType,
    pub(crate) results: Vec<u64>,
    /// Counter value when each active query began.
    pub(crate) begun: Vec<Option<u64>>,
}

impl NullQueryHeap {
    pub(crate) fn new(ty: QueryType, num_queries: u32) -> Self {
        Self {
            ty,
            results: vec![0; num_queries as usize],
            begun: vec![None; num_queries as usize],
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct NullFence {
    pub(crate) signaled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use prism_core::math::{Extent3D, Offset3D};
    use prism_core::renderer::{MiscFlags, TextureSubresource, TextureType};

    fn rgba_texture(width: u32, height: u32, layers: u32) -> NullTexture {
        NullTexture::new(TextureDescriptor {
            ty: if layers > 1 {
                TextureType::Texture2DArray
            } else {
                TextureType::Texture2D
            },
            extent: Extent3D::new(width, height, 1),
            array_layers: layers,
            mip_levels: 0,
            misc_flags: MiscFlags::EMPTY,
            ..Default::default()
        })
    }

    #[test]
    fn test_region_write_then_read_subrect() {
        let mut texture = rgba_texture(4, 4, 1);
        let region = TextureRegion {
            subresource: TextureSubresource::default(),
            offset: Offset3D::new(1, 2, 0),
            extent: Extent3D::new(2, 1, 1),
        };
        texture.write_region(&region, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

        let whole = texture
            .read_region(&TextureRegion::whole(Extent3D::new(4, 4, 1)))
            .unwrap();
        let row2 = &whole[2 * 16..3 * 16];
        assert_eq!(row2, &[0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 0, 0, 0, 0]);
    }

    #[test]
    fn test_write_region_rejects_wrong_size() {
        let mut texture = rgba_texture(2, 2, 1);
        let region = TextureRegion::whole(Extent3D::new(2, 2, 1));
        assert!(matches!(
            texture.write_region(&region, &[0; 15]),
            Err(ResourceError::InvalidAccess(_))
        ));
    }

    #[test]
    fn test_box_filter_averages_quads() {
        let mut texture = rgba_texture(2, 2, 1);
        let texels = [
            0, 0, 0, 255, 100, 0, 0, 255, //
            0, 200, 0, 255, 100, 200, 40, 255,
        ];
        texture
            .write_region(&TextureRegion::whole(Extent3D::new(2, 2, 1)), &texels)
            .unwrap();
        texture.generate_mips(0..2, 0..1).unwrap();

        let mip1 = TextureRegion {
            subresource: TextureSubresource {
                base_mip_level: 1,
                ..Default::default()
            },
            offset: Offset3D::default(),
            extent: Extent3D::new(1, 1, 1),
        };
        assert_eq!(texture.read_region(&mip1).unwrap(), vec![50, 100, 10, 255]);
    }

    #[test]
    fn test_mips_of_float_textures_are_unsupported() {
        let mut texture = NullTexture::new(TextureDescriptor {
            format: Format::RGBA32Float,
            extent: Extent3D::new(4, 4, 1),
            mip_levels: 0,
            ..Default::default()
        });
        assert_eq!(
            texture.generate_mips(0..3, 0..1),
            Err(ResourceError::UnsupportedFormat(Format::RGBA32Float))
        );
    }

    #[test]
    fn test_depth_stencil_clear_preserves_other_aspect() {
        let mut texel = [0u8; 4];
        let value = ClearValue {
            depth: 1.0,
            stencil: 0x7f,
            ..Default::default()
        };
        write_depth_stencil(Format::D24UNormS8UInt, &mut texel, ClearFlags::STENCIL, &value)
            .unwrap();
        assert_eq!(u32::from_le_bytes(texel), 0x7f00_0000);
        write_depth_stencil(Format::D24UNormS8UInt, &mut texel, ClearFlags::DEPTH, &value)
            .unwrap();
        assert_eq!(u32::from_le_bytes(texel), 0x7fff_ffff);
    }

    #[test]
    fn test_primitive_counts() {
        assert_eq!(num_primitives(PrimitiveTopology::TriangleList, 7), 2);
        assert_eq!(num_primitives(PrimitiveTopology::TriangleStrip, 5), 3);
        assert_eq!(num_primitives(PrimitiveTopology::LineStrip, 0), 0);
        assert_eq!(num_primitives(PrimitiveTopology::Patches(4), 16), 4);
    }

    #[test]
    fn test_bgra_clear_swaps_channels() {
        let encoded = encode_color(Format::BGRA8UNorm, ColorRgba::new(1.0, 0.0, 0.0, 1.0)).unwrap();
        assert_eq!(encoded, vec![0, 0, 255, 255]);
        assert!(encode_color(Format::R16Float, ColorRgba::WHITE).is_err());
    }

    #[test]
    fn test_float_clear_colors_are_stored_exactly() {
        let color = ColorRgba::new(0.1, 0.2, 0.3, 0.4);
        let texel = encode_color(Format::RGBA32Float, color).unwrap();
        assert_eq!(texel.len(), 16);
        for (bytes, expected) in texel.chunks_exact(4).zip(color.to_array()) {
            let stored = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            assert_relative_eq!(stored, expected);
        }
        let red = encode_color(Format::R32Float, color).unwrap();
        assert_relative_eq!(f32::from_le_bytes([red[0], red[1], red[2], red[3]]), 0.1);
    }

    #[test]
    fn test_depth_clears_quantize_to_format_precision() {
        let value = ClearValue {
            depth: 0.5,
            stencil: 0x1ff,
            ..Default::default()
        };
        let mut d16 = [0u8; 2];
        write_depth_stencil(Format::D16UNorm, &mut d16, ClearFlags::DEPTH, &value).unwrap();
        let depth = f32::from(u16::from_le_bytes(d16)) / 65535.0;
        assert_relative_eq!(depth, 0.5, epsilon = 1.0 / 65535.0);

        let mut d24s8 = [0u8; 4];
        write_depth_stencil(
            Format::D24UNormS8UInt,
            &mut d24s8,
            ClearFlags::DEPTH | ClearFlags::STENCIL,
            &value,
        )
        .unwrap();
        let packed = u32::from_le_bytes(d24s8);
        assert_eq!(packed >> 24, 0xff);
        let depth = (packed & 0x00ff_ffff) as f32 / 0x00ff_ffff as f32;
        assert_relative_eq!(depth, 0.5, epsilon = 1.0e-6);
    }
}
