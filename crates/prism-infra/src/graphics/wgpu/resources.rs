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

//! GPU objects owned by a wgpu render system.

use super::conversions::{buffer_usages, texture_format, texture_usages, IntoWgpu};
use super::staging::COPY_ALIGNMENT;
use prism_core::math::{ColorRgba, Extent2D};
use prism_core::renderer::staging::{align_up, ResourceState, TrackedResource};
use prism_core::renderer::{
    AttachmentFormatDescriptor, BindFlags, BindingDescriptor, BufferDescriptor, Format,
    PipelineLayoutId, QueryType, RenderPassId, ResourceError, ResourceType, Scissor,
    ShaderReflection, ShaderType, TextureDescriptor, TextureId, TextureRegion, TextureType,
    Viewport,
};

#[derive(Debug)]
pub(crate) struct WgpuBuffer {
    pub(crate) buffer: wgpu::Buffer,
    pub(crate) descriptor: BufferDescriptor<'static>,
    state: ResourceState,
}

impl WgpuBuffer {
    /// Creates the GPU buffer, padded to the copy alignment, and uploads `initial_data`.
    pub(crate) fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        descriptor: BufferDescriptor<'static>,
        initial_data: Option<&[u8]>,
    ) -> Self {
        let size = align_up(descriptor.internal_size().max(1), COPY_ALIGNMENT);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size,
            usage: buffer_usages(&descriptor),
            mapped_at_creation: false,
        });
        if let Some(data) = initial_data.filter(|data| !data.is_empty()) {
            let mut padded = data.to_vec();
            padded.resize(align_up(data.len() as u64, COPY_ALIGNMENT) as usize, 0);
            queue.write_buffer(&buffer, 0, &padded);
        }
        Self {
            buffer,
            descriptor,
            state: ResourceState::Common,
        }
    }

    /// Size visible to the application, without the stream-output counter.
    pub(crate) fn size(&self) -> u64 {
        self.descriptor.size
    }
}

impl TrackedResource for WgpuBuffer {
    fn resource_state(&self) -> ResourceState {
        self.state
    }

    fn set_resource_state(&mut self, state: ResourceState) {
        self.state = state;
    }
}

#[derive(Debug)]
pub(crate) struct WgpuTexture {
    pub(crate) texture: wgpu::Texture,
    /// View over every level and layer, used for bindings.
    pub(crate) view: wgpu::TextureView,
    pub(crate) descriptor: TextureDescriptor<'static>,
    pub(crate) format: wgpu::TextureFormat,
    /// Allocated by a render target for an attachment without a texture.
    pub(crate) internal: bool,
}

impl WgpuTexture {
    pub(crate) fn new(
        device: &wgpu::Device,
        descriptor: TextureDescriptor<'static>,
    ) -> Result<Self, ResourceError> {
        let format = texture_format(descriptor.format)?;
        if matches!(
            descriptor.ty,
            TextureType::Texture1D | TextureType::Texture1DArray
        ) && descriptor.extent.height > 1
        {
            return Err(ResourceError::InvalidDescriptor(format!(
                "{:?} must have a height of 1",
                descriptor.ty
            )));
        }
        let mut usage = texture_usages(descriptor.bind_flags);
        if descriptor.num_mip_levels() > 1 && !format.is_depth_stencil_format() {
            // Mip generation samples each level and renders into the next.
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        }
        let depth_or_array_layers = if descriptor.ty == TextureType::Texture3D {
            descriptor.extent.depth
        } else {
            descriptor.layers()
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: descriptor.label.as_deref(),
            size: wgpu::Extent3d {
                width: descriptor.extent.width,
                height: descriptor.extent.height,
                depth_or_array_layers,
            },
            mip_level_count: descriptor.num_mip_levels(),
            sample_count: descriptor.samples.max(1),
            dimension: descriptor.ty.into_wgpu(),
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: descriptor.label.as_deref(),
            dimension: Some(descriptor.ty.into_wgpu()),
            ..Default::default()
        });
        Ok(Self {
            texture,
            view,
            descriptor,
            format,
            internal: false,
        })
    }

    /// A 2D view of one level and layer, used as a render attachment.
    pub(crate) fn attachment_view(&self, mip_level: u32, array_layer: u32) -> wgpu::TextureView {
        let is_3d = self.descriptor.ty == TextureType::Texture3D;
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Prism Attachment View"),
            dimension: Some(if is_3d {
                wgpu::TextureViewDimension::D3
            } else {
                wgpu::TextureViewDimension::D2
            }),
            base_mip_level: mip_level,
            mip_level_count: Some(1),
            base_array_layer: if is_3d { 0 } else { array_layer },
            array_layer_count: Some(1),
            ..Default::default()
        })
    }

    /// The aspect copies of this texture address.
    ///
    /// ## Errors
    /// * `ResourceError::UnsupportedFormat` - For formats that combine depth and stencil.
    pub(crate) fn copy_aspect(&self) -> Result<wgpu::TextureAspect, ResourceError> {
        match self.descriptor.format {
            Format::D24UNormS8UInt | Format::D32FloatS8X24UInt => {
                Err(ResourceError::UnsupportedFormat(self.descriptor.format))
            }
            Format::D16UNorm | Format::D32Float => Ok(wgpu::TextureAspect::DepthOnly),
            _ => Ok(wgpu::TextureAspect::All),
        }
    }

    /// Copy location of the first texel of `region`.
    pub(crate) fn copy_info(
        &self,
        region: &TextureRegion,
    ) -> Result<wgpu::TexelCopyTextureInfo<'_>, ResourceError> {
        self.descriptor.validate_region(region)?;
        let mut origin: wgpu::Origin3d = region.offset.into_wgpu();
        if self.descriptor.ty != TextureType::Texture3D {
            origin.z = region.subresource.base_array_layer;
        }
        Ok(wgpu::TexelCopyTextureInfo {
            texture: &self.texture,
            mip_level: region.subresource.base_mip_level,
            origin,
            aspect: self.copy_aspect()?,
        })
    }

    /// Copy extent of `region`, array layers folded into the depth.
    pub(crate) fn copy_extent(&self, region: &TextureRegion) -> wgpu::Extent3d {
        let depth_or_array_layers = if self.descriptor.ty == TextureType::Texture3D {
            region.extent.depth
        } else {
            region.subresource.num_array_layers.max(1)
        };
        wgpu::Extent3d {
            width: region.extent.width,
            height: region.extent.height,
            depth_or_array_layers,
        }
    }

    /// Number of bytes a tightly packed copy of `region` occupies.
    pub(crate) fn region_size(&self, region: &TextureRegion) -> u64 {
        region.extent.volume()
            * u64::from(region.subresource.num_array_layers.max(1))
            * u64::from(self.descriptor.format.bytes_per_pixel())
    }
}

#[derive(Debug)]
pub(crate) struct WgpuSampler {
    pub(crate) sampler: wgpu::Sampler,
}

#[derive(Debug)]
pub(crate) struct WgpuShader {
    pub(crate) module: Option<wgpu::ShaderModule>,
    pub(crate) ty: ShaderType,
    pub(crate) entry_point: String,
    pub(crate) valid: bool,
    pub(crate) reflection: ShaderReflection,
}

#[derive(Debug)]
pub(crate) struct WgpuPipelineLayout {
    pub(crate) layout: wgpu::PipelineLayout,
    pub(crate) bind_group_layout: Option<wgpu::BindGroupLayout>,
    pub(crate) bindings: Vec<BindingDescriptor>,
}

/// Bind group layout entry of one binding.
///
/// ## Errors
/// * `ResourceError::InvalidDescriptor` - For binding arrays and storage textures.
pub(crate) fn layout_entry(
    binding: &BindingDescriptor,
) -> Result<wgpu::BindGroupLayoutEntry, ResourceError> {
    if binding.array_size > 1 {
        return Err(ResourceError::InvalidDescriptor(format!(
            "binding '{}' is an array, which wgpu layouts do not support",
            binding.name
        )));
    }
    let ty = match binding.ty {
        ResourceType::Buffer => wgpu::BindingType::Buffer {
            ty: if binding.bind_flags.contains(BindFlags::STORAGE) {
                wgpu::BufferBindingType::Storage { read_only: false }
            } else if binding.bind_flags.contains(BindFlags::SAMPLED) {
                wgpu::BufferBindingType::Storage { read_only: true }
            } else {
                wgpu::BufferBindingType::Uniform
            },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        ResourceType::Texture => {
            if binding.bind_flags.contains(BindFlags::STORAGE) {
                return Err(ResourceError::InvalidDescriptor(format!(
                    "binding '{}' is a storage texture, which needs a known format",
                    binding.name
                )));
            }
            wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            }
        }
        ResourceType::Sampler => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
    };
    Ok(wgpu::BindGroupLayoutEntry {
        binding: binding.slot,
        visibility: binding.stages.into_wgpu(),
        ty,
        count: None,
    })
}

#[derive(Debug)]
pub(crate) enum WgpuPipelineHandle {
    Render(wgpu::RenderPipeline),
    Compute(wgpu::ComputePipeline),
}

#[derive(Debug)]
pub(crate) struct WgpuPipeline {
    pub(crate) handle: WgpuPipelineHandle,
    pub(crate) layout: Option<PipelineLayoutId>,
    /// Blend constant baked into the pipeline, `None` when set by commands.
    pub(crate) blend_factor: Option<ColorRgba>,
    /// Stencil reference baked into the pipeline, `None` when set by commands.
    pub(crate) stencil_reference: Option<u32>,
    /// Static viewport and scissor, used until commands set their own.
    pub(crate) viewport: Option<Viewport>,
    pub(crate) scissor: Option<Scissor>,
}

impl WgpuPipeline {
    /// Layout of bind group 0.
    pub(crate) fn bind_group_layout(&self) -> wgpu::BindGroupLayout {
        match &self.handle {
            WgpuPipelineHandle::Render(pipeline) => pipeline.get_bind_group_layout(0),
            WgpuPipelineHandle::Compute(pipeline) => pipeline.get_bind_group_layout(0),
        }
    }
}

#[derive(Debug)]
pub(crate) struct WgpuRenderPass {
    pub(crate) colors: Vec<AttachmentFormatDescriptor>,
    pub(crate) depth_stencil: Option<AttachmentFormatDescriptor>,
    pub(crate) samples: u32,
}

/// A texture subresource used as a render-target attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AttachmentRef {
    pub(crate) texture: TextureId,
    pub(crate) mip_level: u32,
    pub(crate) array_layer: u32,
}

#[derive(Debug)]
pub(crate) struct WgpuRenderTarget {
    pub(crate) colors: Vec<(AttachmentRef, wgpu::TextureView)>,
    pub(crate) depth_stencil: Option<(AttachmentRef, wgpu::TextureView)>,
    /// Whether the depth-stencil attachment has a stencil aspect.
    pub(crate) has_stencil: bool,
    pub(crate) resolution: Extent2D,
    pub(crate) render_pass: Option<RenderPassId>,
}

impl WgpuRenderTarget {
    pub(crate) fn attachments(&self) -> impl Iterator<Item = &AttachmentRef> {
        self.colors
            .iter()
            .chain(self.depth_stencil.iter())
            .map(|(attachment, _)| attachment)
    }
}

#[derive(Debug)]
pub(crate) struct WgpuResourceHeap {
    pub(crate) bind_groups: Vec<wgpu::BindGroup>,
    pub(crate) num_resources: usize,
}

/// Query results computed on the CPU while a stream replays.
#[derive(Debug)]
pub(crate) struct WgpuQueryHeap {
    pub(crate) ty: QueryType,
    pub(crate) results: Vec<u64>,
    pub(crate) begun: Vec<Option<u64>>,
}

impl WgpuQueryHeap {
    pub(crate) fn new(ty: QueryType, num_queries: u32) -> Self {
        Self {
            ty,
            results: vec![0; num_queries as usize],
            begun: vec![None; num_queries as usize],
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct WgpuFence {
    /// Submission the fence waits for, `None` until it is submitted.
    pub(crate) submission: Option<wgpu::SubmissionIndex>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::renderer::ShaderStageFlags;

    fn binding(ty: ResourceType, bind_flags: BindFlags) -> BindingDescriptor {
        BindingDescriptor {
            name: "binding".to_string(),
            ty,
            bind_flags,
            stages: ShaderStageFlags::FRAGMENT,
            slot: 3,
            array_size: 1,
        }
    }

    #[test]
    fn test_buffer_layout_entries() {
        let entry = layout_entry(&binding(ResourceType::Buffer, BindFlags::CONSTANT_BUFFER)).unwrap();
        assert_eq!(entry.binding, 3);
        assert_eq!(entry.visibility, wgpu::ShaderStages::FRAGMENT);
        assert!(matches!(
            entry.ty,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                ..
            }
        ));

        let entry = layout_entry(&binding(ResourceType::Buffer, BindFlags::STORAGE)).unwrap();
        assert!(matches!(
            entry.ty,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                ..
            }
        ));
    }

    #[test]
    fn test_unsupported_layout_entries() {
        let mut array = binding(ResourceType::Sampler, BindFlags::EMPTY);
        array.array_size = 4;
        assert!(layout_entry(&array).is_err());
        assert!(layout_entry(&binding(ResourceType::Texture, BindFlags::STORAGE)).is_err());
        assert!(layout_entry(&binding(ResourceType::Texture, BindFlags::SAMPLED)).is_ok());
    }
}
