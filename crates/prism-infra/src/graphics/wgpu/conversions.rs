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

use prism_core::math::{ColorRgba, Extent3D, Offset3D};
use prism_core::renderer::{
    AttachmentLoadOp, AttachmentStoreOp, BindFlags, BlendFactor, BlendOp, BufferDescriptor,
    CompareOp, CullMode, Format, IndexFormat, PolygonMode, PrimitiveTopology,
    ResourceError, SamplerAddressMode, SamplerFilter, ShaderStageFlags, StencilOp, TextureType,
};

/// A local extension trait to convert Prism types into wgpu types.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_wgpu()` syntax.
pub(crate) trait IntoWgpu<T> {
    /// Consumes self and converts it into a wgpu type.
    fn into_wgpu(self) -> T;
}

// --- Dimensions and Origins ---

impl IntoWgpu<wgpu::Extent3d> for Extent3D {
    fn into_wgpu(self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: self.depth,
        }
    }
}

impl IntoWgpu<wgpu::Origin3d> for Offset3D {
    fn into_wgpu(self) -> wgpu::Origin3d {
        wgpu::Origin3d {
            x: self.x.max(0) as u32,
            y: self.y.max(0) as u32,
            z: self.z.max(0) as u32,
        }
    }
}

impl IntoWgpu<wgpu::Color> for ColorRgba {
    fn into_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: f64::from(self.r),
            g: f64::from(self.g),
            b: f64::from(self.b),
            a: f64::from(self.a),
        }
    }
}

// --- Formats ---

/// Texture format of `format`, if wgpu has one.
pub(crate) fn texture_format(format: Format) -> Result<wgpu::TextureFormat, ResourceError> {
    use wgpu::TextureFormat as T;
    let converted = match format {
        Format::R8UNorm => T::R8Unorm,
        Format::R8UInt => T::R8Uint,
        Format::RG8UNorm => T::Rg8Unorm,
        Format::RGBA8UNorm => T::Rgba8Unorm,
        Format::RGBA8UNormSrgb => T::Rgba8UnormSrgb,
        Format::BGRA8UNorm => T::Bgra8Unorm,
        Format::BGRA8UNormSrgb => T::Bgra8UnormSrgb,
        Format::RGBA8UInt => T::Rgba8Uint,
        Format::R16UInt => T::R16Uint,
        Format::R16Float => T::R16Float,
        Format::RG16Float => T::Rg16Float,
        Format::RGBA16Float => T::Rgba16Float,
        Format::R32UInt => T::R32Uint,
        Format::R32SInt => T::R32Sint,
        Format::R32Float => T::R32Float,
        Format::RG32Float => T::Rg32Float,
        Format::RGBA32Float => T::Rgba32Float,
        Format::RGBA32UInt => T::Rgba32Uint,
        Format::D16UNorm => T::Depth16Unorm,
        Format::D24UNormS8UInt => T::Depth24PlusStencil8,
        Format::D32Float => T::Depth32Float,
        Format::D32FloatS8X24UInt => T::Depth32FloatStencil8,
        Format::Undefined | Format::RGB32Float => {
            return Err(ResourceError::UnsupportedFormat(format))
        }
    };
    Ok(converted)
}

/// Vertex attribute format of `format`.
pub(crate) fn vertex_format(format: Format) -> Result<wgpu::VertexFormat, ResourceError> {
    use wgpu::VertexFormat as V;
    let converted = match format {
        Format::RG8UNorm => V::Unorm8x2,
        Format::RGBA8UNorm | Format::RGBA8UNormSrgb => V::Unorm8x4,
        Format::RGBA8UInt => V::Uint8x4,
        Format::RG16Float => V::Float16x2,
        Format::RGBA16Float => V::Float16x4,
        Format::R32UInt => V::Uint32,
        Format::R32SInt => V::Sint32,
        Format::R32Float => V::Float32,
        Format::RG32Float => V::Float32x2,
        Format::RGB32Float => V::Float32x3,
        Format::RGBA32Float => V::Float32x4,
        Format::RGBA32UInt => V::Uint32x4,
        _ => return Err(ResourceError::UnsupportedFormat(format)),
    };
    Ok(converted)
}

impl IntoWgpu<wgpu::IndexFormat> for IndexFormat {
    fn into_wgpu(self) -> wgpu::IndexFormat {
        match self {
            IndexFormat::UInt16 => wgpu::IndexFormat::Uint16,
            IndexFormat::UInt32 => wgpu::IndexFormat::Uint32,
        }
    }
}

// --- Texture related Enums ---

impl IntoWgpu<wgpu::TextureDimension> for TextureType {
    fn into_wgpu(self) -> wgpu::TextureDimension {
        match self {
            TextureType::Texture1D | TextureType::Texture1DArray => wgpu::TextureDimension::D1,
            TextureType::Texture3D => wgpu::TextureDimension::D3,
            _ => wgpu::TextureDimension::D2,
        }
    }
}

impl IntoWgpu<wgpu::TextureViewDimension> for TextureType {
    fn into_wgpu(self) -> wgpu::TextureViewDimension {
        match self {
            TextureType::Texture1D => wgpu::TextureViewDimension::D1,
            TextureType::Texture2D | TextureType::Texture2DMS => wgpu::TextureViewDimension::D2,
            TextureType::Texture3D => wgpu::TextureViewDimension::D3,
            TextureType::TextureCube => wgpu::TextureViewDimension::Cube,
            TextureType::TextureCubeArray => wgpu::TextureViewDimension::CubeArray,
            TextureType::Texture1DArray
            | TextureType::Texture2DArray
            | TextureType::Texture2DMSArray => wgpu::TextureViewDimension::D2Array,
        }
    }
}

/// Texture usages implied by `bind_flags`. Copies are always allowed.
pub(crate) fn texture_usages(bind_flags: BindFlags) -> wgpu::TextureUsages {
    let mut usages = wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST;
    if bind_flags.intersects(BindFlags::SAMPLED | BindFlags::COMBINED_SAMPLER) {
        usages |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    if bind_flags.contains(BindFlags::STORAGE) {
        usages |= wgpu::TextureUsages::STORAGE_BINDING;
    }
    if bind_flags.intersects(BindFlags::COLOR_ATTACHMENT | BindFlags::DEPTH_STENCIL_ATTACHMENT) {
        usages |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    usages
}

/// Buffer usages implied by a buffer descriptor. Copies are always allowed so
/// the staging pool can reach every buffer; CPU access goes through staging.
pub(crate) fn buffer_usages(descriptor: &BufferDescriptor<'_>) -> wgpu::BufferUsages {
    let flags = descriptor.bind_flags;
    let mut usages = wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST;
    if flags.contains(BindFlags::VERTEX_BUFFER) {
        usages |= wgpu::BufferUsages::VERTEX;
    }
    if flags.contains(BindFlags::INDEX_BUFFER) {
        usages |= wgpu::BufferUsages::INDEX;
    }
    if flags.contains(BindFlags::CONSTANT_BUFFER) {
        usages |= wgpu::BufferUsages::UNIFORM;
    }
    if flags.intersects(BindFlags::STORAGE | BindFlags::SAMPLED | BindFlags::STREAM_OUTPUT_BUFFER) {
        usages |= wgpu::BufferUsages::STORAGE;
    }
    if flags.contains(BindFlags::INDIRECT_BUFFER) {
        usages |= wgpu::BufferUsages::INDIRECT;
    }
    usages
}

impl IntoWgpu<wgpu::AddressMode> for SamplerAddressMode {
    fn into_wgpu(self) -> wgpu::AddressMode {
        match self {
            SamplerAddressMode::Repeat => wgpu::AddressMode::Repeat,
            SamplerAddressMode::Mirror => wgpu::AddressMode::MirrorRepeat,
            SamplerAddressMode::Clamp => wgpu::AddressMode::ClampToEdge,
            // Border colors need ADDRESS_MODE_CLAMP_TO_BORDER, which is not requested.
            SamplerAddressMode::Border => wgpu::AddressMode::ClampToEdge,
        }
    }
}

impl IntoWgpu<wgpu::FilterMode> for SamplerFilter {
    fn into_wgpu(self) -> wgpu::FilterMode {
        match self {
            SamplerFilter::Nearest => wgpu::FilterMode::Nearest,
            SamplerFilter::Linear => wgpu::FilterMode::Linear,
        }
    }
}

impl IntoWgpu<wgpu::MipmapFilterMode> for SamplerFilter {
    fn into_wgpu(self) -> wgpu::MipmapFilterMode {
        match self {
            SamplerFilter::Nearest => wgpu::MipmapFilterMode::Nearest,
            SamplerFilter::Linear => wgpu::MipmapFilterMode::Linear,
        }
    }
}

// --- Common Types ---

impl IntoWgpu<wgpu::CompareFunction> for CompareOp {
    fn into_wgpu(self) -> wgpu::CompareFunction {
        match self {
            CompareOp::NeverPass => wgpu::CompareFunction::Never,
            CompareOp::Less => wgpu::CompareFunction::Less,
            CompareOp::Equal => wgpu::CompareFunction::Equal,
            CompareOp::LessEqual => wgpu::CompareFunction::LessEqual,
            CompareOp::Greater => wgpu::CompareFunction::Greater,
            CompareOp::NotEqual => wgpu::CompareFunction::NotEqual,
            CompareOp::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            CompareOp::AlwaysPass => wgpu::CompareFunction::Always,
        }
    }
}

impl IntoWgpu<wgpu::ShaderStages> for ShaderStageFlags {
    fn into_wgpu(self) -> wgpu::ShaderStages {
        let mut stages = wgpu::ShaderStages::NONE;
        if self.contains(ShaderStageFlags::VERTEX) {
            stages |= wgpu::ShaderStages::VERTEX;
        }
        if self.contains(ShaderStageFlags::FRAGMENT) {
            stages |= wgpu::ShaderStages::FRAGMENT;
        }
        if self.contains(ShaderStageFlags::COMPUTE) {
            stages |= wgpu::ShaderStages::COMPUTE;
        }
        stages
    }
}

// --- Pipeline Enums ---

impl IntoWgpu<wgpu::PrimitiveTopology> for PrimitiveTopology {
    fn into_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            PrimitiveTopology::PointList => wgpu::PrimitiveTopology::PointList,
            PrimitiveTopology::LineList => wgpu::PrimitiveTopology::LineList,
            PrimitiveTopology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
            PrimitiveTopology::TriangleList | PrimitiveTopology::Patches(_) => {
                wgpu::PrimitiveTopology::TriangleList
            }
            PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        }
    }
}

impl IntoWgpu<Option<wgpu::Face>> for CullMode {
    fn into_wgpu(self) -> Option<wgpu::Face> {
        match self {
            CullMode::Disabled => None,
            CullMode::Front => Some(wgpu::Face::Front),
            CullMode::Back => Some(wgpu::Face::Back),
        }
    }
}

impl IntoWgpu<wgpu::PolygonMode> for PolygonMode {
    fn into_wgpu(self) -> wgpu::PolygonMode {
        match self {
            PolygonMode::Fill => wgpu::PolygonMode::Fill,
            PolygonMode::Wireframe => wgpu::PolygonMode::Line,
            PolygonMode::Points => wgpu::PolygonMode::Point,
        }
    }
}

impl IntoWgpu<wgpu::StencilOperation> for StencilOp {
    fn into_wgpu(self) -> wgpu::StencilOperation {
        match self {
            StencilOp::Keep => wgpu::StencilOperation::Keep,
            StencilOp::Zero => wgpu::StencilOperation::Zero,
            StencilOp::Replace => wgpu::StencilOperation::Replace,
            StencilOp::IncClamp => wgpu::StencilOperation::IncrementClamp,
            StencilOp::DecClamp => wgpu::StencilOperation::DecrementClamp,
            StencilOp::Invert => wgpu::StencilOperation::Invert,
            StencilOp::IncWrap => wgpu::StencilOperation::IncrementWrap,
            StencilOp::DecWrap => wgpu::StencilOperation::DecrementWrap,
        }
    }
}

impl IntoWgpu<wgpu::BlendFactor> for BlendFactor {
    fn into_wgpu(self) -> wgpu::BlendFactor {
        match self {
            BlendFactor::Zero => wgpu::BlendFactor::Zero,
            BlendFactor::One => wgpu::BlendFactor::One,
            BlendFactor::SrcColor => wgpu::BlendFactor::Src,
            BlendFactor::InvSrcColor => wgpu::BlendFactor::OneMinusSrc,
            BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
            BlendFactor::InvSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
            BlendFactor::DstColor => wgpu::BlendFactor::Dst,
            BlendFactor::InvDstColor => wgpu::BlendFactor::OneMinusDst,
            BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
            BlendFactor::InvDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
            BlendFactor::BlendFactor => wgpu::BlendFactor::Constant,
            BlendFactor::InvBlendFactor => wgpu::BlendFactor::OneMinusConstant,
        }
    }
}

impl IntoWgpu<wgpu::BlendOperation> for BlendOp {
    fn into_wgpu(self) -> wgpu::BlendOperation {
        match self {
            BlendOp::Add => wgpu::BlendOperation::Add,
            BlendOp::Subtract => wgpu::BlendOperation::Subtract,
            BlendOp::RevSubtract => wgpu::BlendOperation::ReverseSubtract,
            BlendOp::Min => wgpu::BlendOperation::Min,
            BlendOp::Max => wgpu::BlendOperation::Max,
        }
    }
}

/// Color write mask from one bit per RGBA channel.
pub(crate) fn color_writes(mask: u8) -> wgpu::ColorWrites {
    wgpu::ColorWrites::from_bits_truncate(u32::from(mask & 0xf))
}

// --- Pass Operations ---

impl IntoWgpu<wgpu::StoreOp> for AttachmentStoreOp {
    fn into_wgpu(self) -> wgpu::StoreOp {
        match self {
            AttachmentStoreOp::Store => wgpu::StoreOp::Store,
            AttachmentStoreOp::Undefined => wgpu::StoreOp::Discard,
        }
    }
}

/// Load operation of an attachment, clearing to `clear` when asked to.
pub(crate) fn load_op<V>(op: AttachmentLoadOp, clear: V) -> wgpu::LoadOp<V> {
    match op {
        AttachmentLoadOp::Load => wgpu::LoadOp::Load,
        // Undefined contents are cleared to the given value.
        AttachmentLoadOp::Clear | AttachmentLoadOp::Undefined => wgpu::LoadOp::Clear(clear),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent3d_conversion() {
        let extent: wgpu::Extent3d = Extent3D::new(64, 32, 4).into_wgpu();
        assert_eq!(extent.width, 64);
        assert_eq!(extent.height, 32);
        assert_eq!(extent.depth_or_array_layers, 4);
    }

    #[test]
    fn test_negative_offsets_clamp_to_zero() {
        let origin: wgpu::Origin3d = Offset3D::new(-3, 5, 0).into_wgpu();
        assert_eq!(origin, wgpu::Origin3d { x: 0, y: 5, z: 0 });
    }

    #[test]
    fn test_texture_format_conversion() {
        assert_eq!(
            texture_format(Format::BGRA8UNormSrgb).ok(),
            Some(wgpu::TextureFormat::Bgra8UnormSrgb)
        );
        assert_eq!(
            texture_format(Format::D24UNormS8UInt).ok(),
            Some(wgpu::TextureFormat::Depth24PlusStencil8)
        );
        assert!(matches!(
            texture_format(Format::RGB32Float),
            Err(ResourceError::UnsupportedFormat(Format::RGB32Float))
        ));
    }

    #[test]
    fn test_vertex_format_conversion() {
        assert_eq!(
            vertex_format(Format::RGB32Float).ok(),
            Some(wgpu::VertexFormat::Float32x3)
        );
        assert!(vertex_format(Format::D16UNorm).is_err());
    }

    #[test]
    fn test_texture_view_dimension_conversion() {
        let cube: wgpu::TextureViewDimension = TextureType::TextureCube.into_wgpu();
        assert_eq!(cube, wgpu::TextureViewDimension::Cube);
        let array: wgpu::TextureViewDimension = TextureType::Texture2DArray.into_wgpu();
        assert_eq!(array, wgpu::TextureViewDimension::D2Array);
        let dim: wgpu::TextureDimension = TextureType::Texture1DArray.into_wgpu();
        assert_eq!(dim, wgpu::TextureDimension::D1);
    }

    #[test]
    fn test_usages_always_allow_copies() {
        let usages = texture_usages(BindFlags::COLOR_ATTACHMENT);
        assert!(usages.contains(wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST));
        assert!(usages.contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
        assert!(!usages.contains(wgpu::TextureUsages::TEXTURE_BINDING));

        let descriptor = BufferDescriptor {
            size: 16,
            bind_flags: BindFlags::VERTEX_BUFFER,
            ..Default::default()
        };
        let usages = buffer_usages(&descriptor);
        assert!(usages.contains(wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST));
        assert!(!usages.contains(wgpu::BufferUsages::INDEX));
    }

    #[test]
    fn test_cull_mode_conversion() {
        let none: Option<wgpu::Face> = CullMode::Disabled.into_wgpu();
        assert_eq!(none, None);
        let back: Option<wgpu::Face> = CullMode::Back.into_wgpu();
        assert_eq!(back, Some(wgpu::Face::Back));
    }

    #[test]
    fn test_blend_conversion() {
        assert_eq!(
            wgpu::BlendFactor::OneMinusSrcAlpha,
            BlendFactor::InvSrcAlpha.into_wgpu()
        );
        assert_eq!(
            wgpu::BlendOperation::ReverseSubtract,
            BlendOp::RevSubtract.into_wgpu()
        );
        assert_eq!(color_writes(0b0101), wgpu::ColorWrites::RED | wgpu::ColorWrites::BLUE);
    }

    #[test]
    fn test_load_op() {
        assert_eq!(load_op(AttachmentLoadOp::Load, 1.0f32), wgpu::LoadOp::Load);
        assert_eq!(
            load_op(AttachmentLoadOp::Clear, 0.5f32),
            wgpu::LoadOp::Clear(0.5)
        );
    }
}
