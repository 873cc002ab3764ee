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

use super::command::NullCommandQueue;
use super::device::{next_id, NullDeviceInternal};
use super::executor::NullStatistics;
use super::resources::{
    AttachmentRef, NullBuffer, NullFence, NullPipeline, NullPipelineLayout, NullQueryHeap,
    NullRenderPass, NullRenderTarget, NullResourceHeap, NullSampler, NullShader, NullTexture,
};
use super::transfer::NullStaging;
use crate::graphics::{
    check_pipeline_program, check_render_pass, check_sampler, check_texture_limits, label_of,
    lock, OffscreenSwapChain,
};
use prism_core::math::{Extent2D, Extent3D};
use prism_core::renderer::command::DeferredCommandBuffer;
use prism_core::renderer::staging::STAGING_ALIGNMENT;
use prism_core::renderer::*;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

const TEXTURE_FORMATS: [Format; 23] = [
    Format::R8UNorm,
    Format::R8UInt,
    Format::RG8UNorm,
    Format::RGBA8UNorm,
    Format::RGBA8UNormSrgb,
    Format::BGRA8UNorm,
    Format::BGRA8UNormSrgb,
    Format::RGBA8UInt,
    Format::R16UInt,
    Format::R16Float,
    Format::RG16Float,
    Format::RGBA16Float,
    Format::R32UInt,
    Format::R32SInt,
    Format::R32Float,
    Format::RG32Float,
    Format::RGB32Float,
    Format::RGBA32Float,
    Format::RGBA32UInt,
    Format::D16UNorm,
    Format::D24UNormS8UInt,
    Format::D32Float,
    Format::D32FloatS8X24UInt,
];

/// A render system that emulates a device on the CPU.
///
/// Buffers and textures keep their contents in system memory and command
/// buffers are replayed by a CPU executor, so transfers, clears and mip
/// generation produce real results. Draws and dispatches are validated and
/// counted but do not rasterize or run shaders.
#[derive(Debug, Clone)]
pub struct NullRenderSystem {
    internal: Arc<NullDeviceInternal>,
    queue: NullCommandQueue,
}

impl NullRenderSystem {
    /// Creates a null device configured by `descriptor`.
    pub fn new(descriptor: &RenderSystemDescriptor) -> Self {
        let info = RendererInfo {
            renderer_name: RendererModule::Null.name().to_string(),
            device_name: "CPU Emulation".to_string(),
            vendor_name: descriptor
                .preferred_vendor
                .map_or("Prism", |vendor| vendor.name())
                .to_string(),
            shading_language_name: "Any".to_string(),
            extension_names: Vec::new(),
        };
        let internal = Arc::new(NullDeviceInternal::new(
            info,
            Self::capabilities(),
            descriptor.staging_chunk_size,
        ));
        if descriptor.debug {
            log::debug!(
                "NullRenderSystem: debug mode requested, the null device validates every command"
            );
        }
        log::info!(
            "NullRenderSystem: created instance {} (staging chunks of {} bytes)",
            internal.instance_id,
            descriptor.staging_chunk_size
        );
        Self {
            queue: NullCommandQueue::new(internal.clone()),
            internal,
        }
    }

    fn capabilities() -> RenderingCapabilities {
        RenderingCapabilities {
            screen_origin: ScreenOrigin::UpperLeft,
            clipping_range: ClippingRange::ZeroToOne,
            shading_languages: vec![
                ShadingLanguage::Glsl(450),
                ShadingLanguage::Essl(320),
                ShadingLanguage::Hlsl(60),
                ShadingLanguage::Msl(23),
                ShadingLanguage::SpirV,
                ShadingLanguage::Wgsl,
            ],
            texture_formats: TEXTURE_FORMATS.to_vec(),
            features: RenderingFeatures {
                has_render_targets: true,
                has_3d_textures: true,
                has_cube_textures: true,
                has_array_textures: true,
                has_cube_array_textures: true,
                has_multi_sample_textures: true,
                has_samplers: true,
                has_constant_buffers: true,
                has_storage_buffers: true,
                has_uniforms: true,
                has_geometry_shaders: true,
                has_tessellation_shaders: true,
                has_compute_shaders: true,
                has_instancing: true,
                has_offset_instancing: true,
                has_indirect_drawing: true,
                has_viewport_arrays: true,
                has_conditional_rendering: true,
                has_stream_outputs: true,
                has_logic_op: true,
                has_pipeline_statistics: true,
            },
            limits: RenderingLimits::default(),
        }
    }

    /// Counters accumulated since the device was created.
    pub fn statistics(&self) -> Result<NullStatistics, ResourceError> {
        let staging = lock(&self.internal.staging, "staging")?;
        let mut statistics = *lock(&self.internal.statistics, "statistics")?;
        statistics.staging_copies = staging.transfer.num_copies();
        statistics.transfer_submits = staging.transfer.num_submits();
        Ok(statistics)
    }

    /// Number of chunks the staging pool has allocated.
    pub fn num_staging_chunks(&self) -> Result<usize, ResourceError> {
        Ok(lock(&self.internal.staging, "staging")?.pool.num_chunks())
    }

    fn limits(&self) -> &RenderingLimits {
        &self.internal.caps.limits
    }

    /// Resolves one render-target attachment, allocating an internal texture
    /// when the attachment names none.
    fn resolve_attachment(
        textures: &mut HashMap<TextureId, NullTexture>,
        next_texture_id: &AtomicU64,
        descriptor: &RenderTargetDescriptor<'_>,
        attachment: &AttachmentDescriptor,
        depth_stencil: bool,
    ) -> Result<AttachmentRef, ResourceError> {
        let required = if depth_stencil {
            BindFlags::DEPTH_STENCIL_ATTACHMENT
        } else {
            BindFlags::COLOR_ATTACHMENT
        };
        let resolution = descriptor.resolution;

        let Some(id) = attachment.texture else {
            if attachment.format == Format::Undefined
                || attachment.format.is_depth_or_stencil() != depth_stencil
            {
                return Err(ResourceError::UnsupportedFormat(attachment.format));
            }
            let samples = descriptor.samples.max(1);
            let mut texture = NullTexture::new(TextureDescriptor {
                label: descriptor.label.clone().map(|l| std::borrow::Cow::Owned(l.into_owned())),
                ty: if samples > 1 {
                    TextureType::Texture2DMS
                } else {
                    TextureType::Texture2D
                },
                bind_flags: required,
                format: attachment.format,
                extent: Extent3D::new(resolution.width, resolution.height, 1),
                samples,
                ..Default::default()
            });
            texture.internal = true;
            let id = TextureId(next_id(next_texture_id));
            textures.insert(id, texture);
            return Ok(AttachmentRef {
                texture: id,
                mip_level: 0,
                array_layer: 0,
            });
        };

        let texture = textures.get(&id).ok_or(ResourceError::NotFound)?;
        if !texture.descriptor.bind_flags.contains(required) {
            return Err(ResourceError::InvalidDescriptor(format!(
                "texture {id:?} cannot be used as a {} attachment",
                if depth_stencil { "depth-stencil" } else { "color" }
            )));
        }
        if attachment.array_layer >= texture.descriptor.layers() {
            return Err(ResourceError::OutOfBounds {
                offset: u64::from(attachment.array_layer),
                size: 1,
                limit: u64::from(texture.descriptor.layers()),
            });
        }
        let extent = texture
            .descriptor
            .mip_extent(attachment.mip_level)
            .ok_or(ResourceError::OutOfBounds {
                offset: u64::from(attachment.mip_level),
                size: 1,
                limit: u64::from(texture.num_levels()),
            })?;
        if extent.width < resolution.width || extent.height < resolution.height {
            return Err(ResourceError::InvalidDescriptor(format!(
                "attachment of {}x{} is smaller than the render target",
                extent.width, extent.height
            )));
        }
        Ok(AttachmentRef {
            texture: id,
            mip_level: attachment.mip_level,
            array_layer: attachment.array_layer,
        })
    }

    fn remove_internal_textures(
        textures: &mut HashMap<TextureId, NullTexture>,
        attachments: &[AttachmentRef],
    ) {
        for attachment in attachments {
            if textures
                .get(&attachment.texture)
                .is_some_and(|texture| texture.internal)
            {
                textures.remove(&attachment.texture);
            }
        }
    }
}

impl RenderSystem for NullRenderSystem {
    fn module(&self) -> RendererModule {
        RendererModule::Null
    }

    fn renderer_info(&self) -> &RendererInfo {
        &self.internal.info
    }

    fn rendering_caps(&self) -> &RenderingCapabilities {
        &self.internal.caps
    }

    fn create_swap_chain(
        &self,
        descriptor: &SwapChainDescriptor,
    ) -> Result<Box<dyn SwapChain>, RenderError> {
        let id = SwapChainId(next_id(&self.internal.next_swap_chain_id));
        let swap_chain = OffscreenSwapChain::new(self.clone(), id, descriptor)?;
        Ok(Box::new(swap_chain))
    }

    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor<'_>,
        initial_data: Option<&[u8]>,
    ) -> Result<BufferId, ResourceError> {
        descriptor.validate()?;
        let limit = self.limits().max_buffer_size;
        if descriptor.size > limit {
            return Err(ResourceError::OutOfBounds {
                offset: 0,
                size: descriptor.size,
                limit,
            });
        }
        let mut buffer = NullBuffer::new(descriptor.clone().into_owned());
        if let Some(data) = initial_data {
            check_range(0, data.len() as u64, descriptor.size)?;
            buffer.data[..data.len()].copy_from_slice(data);
        }

        let id = BufferId(next_id(&self.internal.next_buffer_id));
        lock(&self.internal.buffers, "buffers")?.insert(id, buffer);
        log::debug!(
            "NullRenderSystem: created buffer {:?} '{}' ({} bytes)",
            id,
            label_of(&descriptor.label),
            descriptor.size
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        lock(&self.internal.buffers, "buffers")?
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut buffers = lock(&self.internal.buffers, "buffers")?;
        let buffer = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        check_range(offset, data.len() as u64, buffer.size())?;
        let mut staging = lock(&self.internal.staging, "staging")?;
        let NullStaging { pool, transfer } = &mut *staging;
        pool.write_immediate(transfer, buffer, offset, data, STAGING_ALIGNMENT)
    }

    fn read_buffer(&self, id: BufferId, offset: u64, out: &mut [u8]) -> Result<(), ResourceError> {
        let mut buffers = lock(&self.internal.buffers, "buffers")?;
        let buffer = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        check_range(offset, out.len() as u64, buffer.size())?;
        let mut staging = lock(&self.internal.staging, "staging")?;
        let NullStaging { pool, transfer } = &mut *staging;
        pool.read_subresource_region(transfer, buffer, offset, out)
    }

    fn map_buffer(
        &self,
        id: BufferId,
        access: CpuAccess,
        offset: u64,
        size: u64,
        f: &mut dyn FnMut(&mut BufferMapping<'_>),
    ) -> Result<(), ResourceError> {
        let mut buffers = lock(&self.internal.buffers, "buffers")?;
        let buffer = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        if !buffer
            .descriptor
            .cpu_access_flags
            .contains(access.required_flags())
        {
            return Err(ResourceError::InvalidAccess(format!(
                "buffer {id:?} was not created for {access:?} CPU access"
            )));
        }
        let size = resolve_size(offset, size, buffer.size());
        check_range(offset, size, buffer.size())?;

        let mut staging = lock(&self.internal.staging, "staging")?;
        let NullStaging { pool, transfer } = &mut *staging;
        if access == CpuAccess::ReadOnly {
            let mut data = pool.map_feedback_buffer(transfer, buffer, offset, size)?.to_vec();
            f(&mut BufferMapping::new(&mut data, access));
            return pool.unmap_feedback_buffer();
        }

        let written = {
            let data = pool.map_upload_buffer(
                transfer,
                buffer,
                offset,
                size,
                access.has_read_access(),
            )?;
            let mut mapping = BufferMapping::new(data, access);
            f(&mut mapping);
            mapping.written_range()
        };
        log::trace!(
            "NullRenderSystem: unmapping {:?}, {} bytes written",
            id,
            written.len()
        );
        pool.unmap_upload_buffer(transfer, buffer, offset, written)
    }

    fn buffer_descriptor(&self, id: BufferId) -> Result<BufferDescriptor<'static>, ResourceError> {
        lock(&self.internal.buffers, "buffers")?
            .get(&id)
            .map(|buffer| buffer.descriptor.clone())
            .ok_or(ResourceError::NotFound)
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor<'_>,
        initial_data: Option<&[u8]>,
    ) -> Result<TextureId, ResourceError> {
        descriptor.validate()?;
        check_texture_limits(self.limits(), descriptor)?;
        let mut texture = NullTexture::new(descriptor.clone().into_owned());
        if let Some(data) = initial_data {
            let layers = descriptor.layers();
            let region = TextureRegion {
                subresource: TextureSubresource {
                    num_array_layers: layers,
                    ..Default::default()
                },
                offset: Default::default(),
                extent: descriptor.extent,
            };
            texture.write_region(&region, data)?;
            if descriptor.misc_flags.contains(MiscFlags::GENERATE_MIPS) {
                if let Err(err) = texture.generate_mips(0..texture.num_levels(), 0..layers) {
                    log::warn!(
                        "NullRenderSystem: cannot generate mips for '{}': {err}",
                        label_of(&descriptor.label)
                    );
                }
            }
        }

        let id = TextureId(next_id(&self.internal.next_texture_id));
        lock(&self.internal.textures, "textures")?.insert(id, texture);
        log::debug!(
            "NullRenderSystem: created texture {:?} '{}' ({:?} {:?}, {}x{}x{})",
            id,
            label_of(&descriptor.label),
            descriptor.ty,
            descriptor.format,
            descriptor.extent.width,
            descriptor.extent.height,
            descriptor.extent.depth
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        lock(&self.internal.textures, "textures")?
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn write_texture(
        &self,
        id: TextureId,
        region: &TextureRegion,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        lock(&self.internal.textures, "textures")?
            .get_mut(&id)
            .ok_or(ResourceError::NotFound)?
            .write_region(region, data)
    }

    fn read_texture(
        &self,
        id: TextureId,
        region: &TextureRegion,
        out: &mut [u8],
    ) -> Result<(), ResourceError> {
        let textures = lock(&self.internal.textures, "textures")?;
        let texture = textures.get(&id).ok_or(ResourceError::NotFound)?;
        let expected = texture.region_size(region);
        if out.len() as u64 != expected {
            return Err(ResourceError::InvalidAccess(format!(
                "texture region holds {expected} bytes, output has {}",
                out.len()
            )));
        }
        out.copy_from_slice(&texture.read_region(region)?);
        Ok(())
    }

    fn texture_descriptor(&self, id: TextureId) -> Result<TextureDescriptor<'static>, ResourceError> {
        lock(&self.internal.textures, "textures")?
            .get(&id)
            .map(|texture| texture.descriptor.clone())
            .ok_or(ResourceError::NotFound)
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor<'_>) -> Result<SamplerId, ResourceError> {
        check_sampler(descriptor)?;
        let id = SamplerId(next_id(&self.internal.next_sampler_id));
        lock(&self.internal.samplers, "samplers")?.insert(
            id,
            NullSampler {
                label: descriptor.label.as_ref().map(|l| l.to_string()),
            },
        );
        Ok(id)
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        let sampler = lock(&self.internal.samplers, "samplers")?
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        log::trace!(
            "NullRenderSystem: destroyed sampler {:?} '{}'",
            id,
            sampler.label.as_deref().unwrap_or("unnamed")
        );
        Ok(())
    }

    fn create_shader(&self, descriptor: &ShaderDescriptor<'_>) -> Result<ShaderId, ResourceError> {
        let valid = !descriptor.source.is_empty() && !descriptor.entry_point.is_empty();
        if !valid {
            log::warn!(
                "NullRenderSystem: {:?} shader '{}' holds no usable code",
                descriptor.ty,
                label_of(&descriptor.label)
            );
        }
        let id = ShaderId(next_id(&self.internal.next_shader_id));
        lock(&self.internal.shaders, "shaders")?.insert(
            id,
            NullShader {
                ty: descriptor.ty,
                valid,
                reflection: descriptor.reflection.clone(),
            },
        );
        Ok(id)
    }

    fn destroy_shader(&self, id: ShaderId) -> Result<(), ResourceError> {
        lock(&self.internal.shaders, "shaders")?
            .remove(&id)
            .map(|_| ())
            .ok_or(ShaderError::NotFound { id }.into())
    }

    fn create_shader_program(
        &self,
        descriptor: &ShaderProgramDescriptor<'_>,
    ) -> Result<ShaderProgramId, ResourceError> {
        let id = ShaderProgramId(next_id(&self.internal.next_program_id));
        let mut program = ShaderProgram::new(id, self.internal.caps.features.has_uniforms);
        {
            let shaders = lock(&self.internal.shaders, "shaders")?;
            for (ty, shader_id) in descriptor.stages() {
                let shader = shaders
                    .get(&shader_id)
                    .ok_or(ShaderError::NotFound { id: shader_id })?;
                if shader.ty != ty {
                    return Err(ShaderError::UnexpectedStage {
                        id: shader_id,
                        stage: shader.ty,
                    }
                    .into());
                }
                program.attach_shader(ShaderStage {
                    id: shader_id,
                    ty,
                    valid: shader.valid,
                    reflection: shader.reflection.clone(),
                });
            }
        }
        program.build_input_layout(&descriptor.vertex_formats)?;
        if let Err(err) = program.link() {
            log::warn!(
                "NullRenderSystem: program '{}' failed to link: {err}",
                label_of(&descriptor.label)
            );
        }
        lock(&self.internal.programs, "programs")?.insert(id, program);
        Ok(id)
    }

    fn destroy_shader_program(&self, id: ShaderProgramId) -> Result<(), ResourceError> {
        lock(&self.internal.programs, "programs")?
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn shader_program(&self, id: ShaderProgramId) -> Result<ShaderProgram, ResourceError> {
        lock(&self.internal.programs, "programs")?
            .get(&id)
            .cloned()
            .ok_or(ResourceError::NotFound)
    }

    fn update_shader_program(
        &self,
        id: ShaderProgramId,
        f: &mut dyn FnMut(&mut ShaderProgram) -> Result<(), ShaderError>,
    ) -> Result<(), ResourceError> {
        let mut programs = lock(&self.internal.programs, "programs")?;
        let program = programs.get_mut(&id).ok_or(ResourceError::NotFound)?;
        f(program)?;
        Ok(())
    }

    fn create_pipeline_layout(
        &self,
        descriptor: &PipelineLayoutDescriptor<'_>,
    ) -> Result<PipelineLayoutId, ResourceError> {
        if descriptor.has_slot_conflicts() {
            return Err(ResourceError::InvalidDescriptor(format!(
                "pipeline layout '{}' binds two resources to the same slot",
                label_of(&descriptor.label)
            )));
        }
        let id = PipelineLayoutId(next_id(&self.internal.next_layout_id));
        lock(&self.internal.layouts, "layouts")?.insert(
            id,
            NullPipelineLayout {
                num_bindings: descriptor.bindings.len(),
            },
        );
        Ok(id)
    }

    fn destroy_pipeline_layout(&self, id: PipelineLayoutId) -> Result<(), ResourceError> {
        lock(&self.internal.layouts, "layouts")?
            .remove(&id)
            .map(|_| ())
            .ok_or(PipelineError::LayoutNotFound(id).into())
    }

    fn create_graphics_pipeline(
        &self,
        descriptor: &GraphicsPipelineDescriptor<'_>,
    ) -> Result<PipelineStateId, ResourceError> {
        {
            let programs = lock(&self.internal.programs, "programs")?;
            let program = programs
                .get(&descriptor.program)
                .ok_or(ResourceError::NotFound)?;
            check_pipeline_program(program, PipelineKind::Graphics)?;
            if let Some(layout) = descriptor.layout {
                if !lock(&self.internal.layouts, "layouts")?.contains_key(&layout) {
                    return Err(PipelineError::LayoutNotFound(layout).into());
                }
            }
            if let Some(pass) = descriptor.render_pass {
                if !lock(&self.internal.render_passes, "render passes")?.contains_key(&pass) {
                    return Err(PipelineError::RenderPassNotFound(pass).into());
                }
            }
        }
        check_range(
            0,
            descriptor.viewports.len().max(descriptor.scissors.len()) as u64,
            u64::from(self.limits().max_viewports),
        )?;

        let id = PipelineStateId(next_id(&self.internal.next_pipeline_id));
        lock(&self.internal.pipelines, "pipelines")?.insert(
            id,
            NullPipeline {
                kind: PipelineKind::Graphics,
                program: descriptor.program,
                topology: descriptor.primitive_topology,
            },
        );
        log::debug!(
            "NullRenderSystem: created graphics pipeline {:?} '{}'",
            id,
            label_of(&descriptor.label)
        );
        Ok(id)
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor<'_>,
    ) -> Result<PipelineStateId, ResourceError> {
        {
            let programs = lock(&self.internal.programs, "programs")?;
            let program = programs
                .get(&descriptor.program)
                .ok_or(ResourceError::NotFound)?;
            check_pipeline_program(program, PipelineKind::Compute)?;
            if let Some(layout) = descriptor.layout {
                if !lock(&self.internal.layouts, "layouts")?.contains_key(&layout) {
                    return Err(PipelineError::LayoutNotFound(layout).into());
                }
            }
        }

        let id = PipelineStateId(next_id(&self.internal.next_pipeline_id));
        lock(&self.internal.pipelines, "pipelines")?.insert(
            id,
            NullPipeline {
                kind: PipelineKind::Compute,
                program: descriptor.program,
                topology: PrimitiveTopology::PointList,
            },
        );
        log::debug!(
            "NullRenderSystem: created compute pipeline {:?} '{}'",
            id,
            label_of(&descriptor.label)
        );
        Ok(id)
    }

    fn destroy_pipeline_state(&self, id: PipelineStateId) -> Result<(), ResourceError> {
        lock(&self.internal.pipelines, "pipelines")?
            .remove(&id)
            .map(|_| ())
            .ok_or(PipelineError::NotFound(id).into())
    }

    fn create_render_pass(
        &self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Result<RenderPassId, ResourceError> {
        check_render_pass(self.limits(), descriptor)?;
        let id = RenderPassId(next_id(&self.internal.next_render_pass_id));
        lock(&self.internal.render_passes, "render passes")?.insert(
            id,
            NullRenderPass {
                colors: descriptor.color_attachments.clone(),
                depth_stencil: descriptor.depth_attachment.or(descriptor.stencil_attachment),
            },
        );
        Ok(id)
    }

    fn destroy_render_pass(&self, id: RenderPassId) -> Result<(), ResourceError> {
        lock(&self.internal.render_passes, "render passes")?
            .remove(&id)
            .map(|_| ())
            .ok_or(PipelineError::RenderPassNotFound(id).into())
    }

    fn create_render_target(
        &self,
        descriptor: &RenderTargetDescriptor<'_>,
    ) -> Result<RenderTargetId, ResourceError> {
        let resolution: Extent2D = descriptor.resolution;
        if resolution.is_empty() {
            return Err(ResourceError::InvalidDescriptor(
                "render target resolution must be non-zero".to_string(),
            ));
        }
        let max_colors = self.limits().max_color_attachments as usize;
        if descriptor.color_attachments.len() > max_colors {
            return Err(ResourceError::InvalidDescriptor(format!(
                "{} color attachments exceed the limit of {max_colors}",
                descriptor.color_attachments.len()
            )));
        }

        let mut textures = lock(&self.internal.textures, "textures")?;
        if let Some(pass_id) = descriptor.render_pass {
            let passes = lock(&self.internal.render_passes, "render passes")?;
            let pass = passes
                .get(&pass_id)
                .ok_or(PipelineError::RenderPassNotFound(pass_id))?;
            if pass.colors.len() != descriptor.color_attachments.len() {
                return Err(ResourceError::InvalidDescriptor(format!(
                    "render pass has {} color attachments, render target has {}",
                    pass.colors.len(),
                    descriptor.color_attachments.len()
                )));
            }
        }

        let mut resolved = Vec::with_capacity(descriptor.color_attachments.len() + 1);
        let attachments = descriptor
            .color_attachments
            .iter()
            .map(|a| (a, false))
            .chain(descriptor.depth_stencil_attachment.iter().map(|a| (a, true)));
        for (attachment, depth_stencil) in attachments {
            match Self::resolve_attachment(
                &mut textures,
                &self.internal.next_texture_id,
                descriptor,
                attachment,
                depth_stencil,
            ) {
                Ok(reference) => resolved.push(reference),
                Err(err) => {
                    Self::remove_internal_textures(&mut textures, &resolved);
                    return Err(err);
                }
            }
        }
        let depth_stencil = descriptor
            .depth_stencil_attachment
            .is_some()
            .then(|| resolved.pop())
            .flatten();

        let id = RenderTargetId(next_id(&self.internal.next_render_target_id));
        lock(&self.internal.render_targets, "render targets")?.insert(
            id,
            NullRenderTarget {
                colors: resolved,
                depth_stencil,
                render_pass: descriptor.render_pass,
            },
        );
        log::debug!(
            "NullRenderSystem: created render target {:?} '{}' ({}x{})",
            id,
            label_of(&descriptor.label),
            resolution.width,
            resolution.height
        );
        Ok(id)
    }

    fn destroy_render_target(&self, id: RenderTargetId) -> Result<(), ResourceError> {
        let mut textures = lock(&self.internal.textures, "textures")?;
        let target = lock(&self.internal.render_targets, "render targets")?
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        let attachments: Vec<AttachmentRef> = target.attachments().copied().collect();
        Self::remove_internal_textures(&mut textures, &attachments);
        Ok(())
    }

    fn create_resource_heap(
        &self,
        descriptor: &ResourceHeapDescriptor<'_>,
    ) -> Result<ResourceHeapId, ResourceError> {
        if descriptor.resources.is_empty() {
            return Err(ResourceError::InvalidDescriptor(
                "resource heap needs at least one resource".to_string(),
            ));
        }
        {
            let buffers = lock(&self.internal.buffers, "buffers")?;
            let textures = lock(&self.internal.textures, "textures")?;
            let samplers = lock(&self.internal.samplers, "samplers")?;
            let missing = descriptor.resources.iter().any(|resource| match resource {
                ResourceBinding::Buffer(id) => !buffers.contains_key(id),
                ResourceBinding::Texture(id) => !textures.contains_key(id),
                ResourceBinding::Sampler(id) => !samplers.contains_key(id),
            });
            if missing {
                return Err(ResourceError::NotFound);
            }
        }
        let bindings_per_set = match descriptor.pipeline_layout {
            Some(layout) => {
                lock(&self.internal.layouts, "layouts")?
                    .get(&layout)
                    .ok_or(PipelineError::LayoutNotFound(layout))?
                    .num_bindings
            }
            None => 0,
        };
        if bindings_per_set > 0 && descriptor.resources.len() % bindings_per_set != 0 {
            return Err(ResourceError::InvalidDescriptor(format!(
                "{} resources do not fill descriptor sets of {bindings_per_set} bindings",
                descriptor.resources.len()
            )));
        }

        let id = ResourceHeapId(next_id(&self.internal.next_heap_id));
        lock(&self.internal.resource_heaps, "resource heaps")?.insert(
            id,
            NullResourceHeap {
                resources: descriptor.resources.clone(),
                bindings_per_set,
            },
        );
        Ok(id)
    }

    fn destroy_resource_heap(&self, id: ResourceHeapId) -> Result<(), ResourceError> {
        let heap = lock(&self.internal.resource_heaps, "resource heaps")?
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        log::trace!(
            "NullRenderSystem: destroyed resource heap {:?} ({} resources)",
            id,
            heap.resources.len()
        );
        Ok(())
    }

    fn create_query_heap(
        &self,
        descriptor: &QueryHeapDescriptor<'_>,
    ) -> Result<QueryHeapId, ResourceError> {
        if descriptor.num_queries == 0 {
            return Err(ResourceError::InvalidDescriptor(
                "query heap needs at least one query".to_string(),
            ));
        }
        let id = QueryHeapId(next_id(&self.internal.next_query_heap_id));
        lock(&self.internal.query_heaps, "query heaps")?
            .insert(id, NullQueryHeap::new(descriptor.ty, descriptor.num_queries));
        Ok(id)
    }

    fn destroy_query_heap(&self, id: QueryHeapId) -> Result<(), ResourceError> {
        lock(&self.internal.query_heaps, "query heaps")?
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_fence(&self) -> Result<FenceId, ResourceError> {
        let id = FenceId(next_id(&self.internal.next_fence_id));
        lock(&self.internal.fences, "fences")?.insert(id, NullFence::default());
        Ok(id)
    }

    fn destroy_fence(&self, id: FenceId) -> Result<(), ResourceError> {
        lock(&self.internal.fences, "fences")?
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_command_buffer(
        &self,
        descriptor: &CommandBufferDescriptor,
    ) -> Result<Box<dyn CommandBuffer>, ResourceError> {
        let id = CommandBufferId(next_id(&self.internal.next_command_buffer_id));
        let buffer = DeferredCommandBuffer::new(id, descriptor, self.internal.instance_id)
            .with_host(self.internal.clone());
        Ok(Box::new(buffer))
    }

    fn command_queue(&self) -> &dyn CommandQueue {
        &self.queue
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
