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

use super::command::WgpuCommandQueue;
use super::context::{vendor_name, WgpuContext};
use super::conversions::{color_writes, texture_format, vertex_format, IntoWgpu};
use super::device::{next_id, WgpuDeviceInternal};
use super::executor::{WgpuStatistics, COPY_ROW_ALIGNMENT};
use super::resources::{
    layout_entry, AttachmentRef, WgpuBuffer, WgpuFence, WgpuPipeline, WgpuPipelineHandle,
    WgpuPipelineLayout, WgpuQueryHeap, WgpuRenderPass, WgpuRenderTarget, WgpuResourceHeap,
    WgpuSampler, WgpuShader, WgpuTexture,
};
use super::staging::{aligned_span, read_mapped, WgpuStaging};
use super::backend_for;
use crate::graphics::{
    check_pipeline_program, check_render_pass, check_sampler, check_texture_limits, label_of,
    lock, OffscreenSwapChain,
};
use prism_core::math::{Extent2D, Extent3D};
use prism_core::renderer::command::DeferredCommandBuffer;
use prism_core::renderer::staging::{align_up, TransferQueue, STAGING_ALIGNMENT};
use prism_core::renderer::*;
use std::any::Any;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

const CANDIDATE_FORMATS: [Format; 23] = [
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

/// Device features reported as extension names.
const EXTENSIONS: [(wgpu::Features, &str); 5] = [
    (wgpu::Features::INDIRECT_FIRST_INSTANCE, "INDIRECT_FIRST_INSTANCE"),
    (wgpu::Features::POLYGON_MODE_LINE, "POLYGON_MODE_LINE"),
    (wgpu::Features::POLYGON_MODE_POINT, "POLYGON_MODE_POINT"),
    (wgpu::Features::DEPTH32FLOAT_STENCIL8, "DEPTH32FLOAT_STENCIL8"),
    (
        wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES,
        "TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES",
    ),
];

/// Color format of pipelines created without a render pass.
const DEFAULT_COLOR_FORMAT: Format = Format::BGRA8UNorm;
/// Depth-stencil format of pipelines created without a render pass.
const DEFAULT_DEPTH_STENCIL_FORMAT: Format = Format::D24UNormS8UInt;

/// A render system backed by a wgpu device.
///
/// Every hardware module maps to one wgpu backend. The device is headless:
/// swap chains present into off-screen textures.
#[derive(Debug, Clone)]
pub struct WgpuRenderSystem {
    module: RendererModule,
    internal: Arc<WgpuDeviceInternal>,
    queue: WgpuCommandQueue,
}

impl WgpuRenderSystem {
    /// Opens a wgpu device on the backend of `request.module`.
    ///
    /// ## Arguments
    /// * `request` - The hardware module to load.
    /// * `descriptor` - Debug mode, adapter preferences and staging chunk size.
    ///
    /// ## Errors
    /// * `RenderError::ModuleUnavailable` - If wgpu has no backend for the module.
    /// * `RenderError::InitializationFailed` - If no adapter or device could be opened.
    pub fn new(
        request: &ModuleRequest,
        descriptor: &RenderSystemDescriptor,
    ) -> Result<Self, RenderError> {
        let module = request.module;
        let backends = backend_for(module)
            .ok_or_else(|| RenderError::ModuleUnavailable(module.name().to_string()))?;
        if let Some(version) = request.version {
            log::debug!("WgpuRenderSystem: profile version {version} is chosen by the driver");
        }
        let context = WgpuContext::new(backends, descriptor)
            .map_err(|e| RenderError::InitializationFailed(format!("{e:#}")))?;

        let info = RendererInfo {
            renderer_name: format!("{} ({:?})", module.name(), context.adapter_info.backend),
            device_name: context.adapter_info.name.clone(),
            vendor_name: vendor_name(context.adapter_info.vendor),
            shading_language_name: "WGSL".to_string(),
            extension_names: EXTENSIONS
                .iter()
                .filter(|(feature, _)| context.features.contains(*feature))
                .map(|(_, name)| name.to_string())
                .collect(),
        };
        let caps = Self::capabilities(&context);
        let internal = Arc::new(WgpuDeviceInternal::new(
            context,
            info,
            caps,
            descriptor.staging_chunk_size,
        ));
        log::info!(
            "WgpuRenderSystem: created {} instance {} on \"{}\"",
            module.name(),
            internal.instance_id,
            internal.info.device_name
        );
        Ok(Self {
            module,
            queue: WgpuCommandQueue::new(internal.clone()),
            internal,
        })
    }

    fn capabilities(context: &WgpuContext) -> RenderingCapabilities {
        let limits = &context.limits;
        let texture_formats = CANDIDATE_FORMATS
            .into_iter()
            .filter(|format| {
                texture_format(*format).is_ok_and(|wgpu_format| {
                    context.supports_format(wgpu_format, wgpu::TextureUsages::TEXTURE_BINDING)
                })
            })
            .collect();
        RenderingCapabilities {
            screen_origin: ScreenOrigin::UpperLeft,
            clipping_range: ClippingRange::ZeroToOne,
            shading_languages: vec![ShadingLanguage::Wgsl],
            texture_formats,
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
                has_uniforms: false,
                has_geometry_shaders: false,
                has_tessellation_shaders: false,
                has_compute_shaders: true,
                has_instancing: true,
                has_offset_instancing: true,
                has_indirect_drawing: true,
                has_viewport_arrays: false,
                has_conditional_rendering: true,
                has_stream_outputs: false,
                has_logic_op: false,
                has_pipeline_statistics: true,
            },
            limits: RenderingLimits {
                max_1d_texture_size: limits.max_texture_dimension_1d,
                max_2d_texture_size: limits.max_texture_dimension_2d,
                max_3d_texture_size: limits.max_texture_dimension_3d,
                max_cube_texture_size: limits.max_texture_dimension_2d,
                max_texture_array_layers: limits.max_texture_array_layers,
                max_color_attachments: limits.max_color_attachments,
                max_samples: 4,
                max_viewports: 1,
                max_viewport_size: [limits.max_texture_dimension_2d; 2],
                max_buffer_size: limits.max_buffer_size,
                max_constant_buffer_size: u64::from(limits.max_uniform_buffer_binding_size),
                max_compute_work_groups: [limits.max_compute_workgroups_per_dimension; 3],
                min_constant_buffer_alignment: u64::from(
                    limits.min_uniform_buffer_offset_alignment,
                ),
                min_storage_buffer_alignment: u64::from(
                    limits.min_storage_buffer_offset_alignment,
                ),
                texture_row_alignment: COPY_ROW_ALIGNMENT,
            },
        }
    }

    /// Counters accumulated since the device was created.
    pub fn statistics(&self) -> Result<WgpuStatistics, ResourceError> {
        let staging = lock(&self.internal.staging, "staging")?;
        let mut statistics = *lock(&self.internal.counters, "counters")?;
        statistics.staging_copies = staging.transfer.num_copies();
        statistics.transfer_submits = staging.transfer.num_submits();
        Ok(statistics)
    }

    /// Information about the adapter the device runs on.
    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.internal.context.adapter_info
    }

    fn device(&self) -> &wgpu::Device {
        &self.internal.context.device
    }

    fn limits(&self) -> &RenderingLimits {
        &self.internal.caps.limits
    }

    /// Uploads tightly packed texels into `region` through the queue.
    fn upload_region(
        &self,
        texture: &WgpuTexture,
        region: &TextureRegion,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let expected = texture.region_size(region);
        if data.len() as u64 != expected {
            return Err(ResourceError::InvalidAccess(format!(
                "texture region holds {expected} bytes, input has {}",
                data.len()
            )));
        }
        if expected == 0 {
            return Ok(());
        }
        let bpp = texture.descriptor.format.bytes_per_pixel();
        self.internal.context.queue.write_texture(
            texture.copy_info(region)?,
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(region.extent.width * bpp),
                rows_per_image: Some(region.extent.height),
            },
            texture.copy_extent(region),
        );
        Ok(())
    }

    /// Resolves one render-target attachment, allocating an internal texture
    /// when the attachment names none.
    fn resolve_attachment(
        device: &wgpu::Device,
        textures: &mut HashMap<TextureId, WgpuTexture>,
        next_texture_id: &AtomicU64,
        descriptor: &RenderTargetDescriptor<'_>,
        attachment: &AttachmentDescriptor,
        depth_stencil: bool,
    ) -> Result<(AttachmentRef, wgpu::TextureView), ResourceError> {
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
            let mut texture = WgpuTexture::new(
                device,
                TextureDescriptor {
                    label: descriptor.label.clone().map(|l| Cow::Owned(l.into_owned())),
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
                },
            )?;
            texture.internal = true;
            let view = texture.attachment_view(0, 0);
            let id = TextureId(next_id(next_texture_id));
            textures.insert(id, texture);
            let reference = AttachmentRef {
                texture: id,
                mip_level: 0,
                array_layer: 0,
            };
            return Ok((reference, view));
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
                limit: u64::from(texture.descriptor.num_mip_levels()),
            })?;
        if extent.width < resolution.width || extent.height < resolution.height {
            return Err(ResourceError::InvalidDescriptor(format!(
                "attachment of {}x{} is smaller than the render target",
                extent.width, extent.height
            )));
        }
        let reference = AttachmentRef {
            texture: id,
            mip_level: attachment.mip_level,
            array_layer: attachment.array_layer,
        };
        Ok((
            reference,
            texture.attachment_view(attachment.mip_level, attachment.array_layer),
        ))
    }

    fn remove_internal_textures<'r>(
        textures: &mut HashMap<TextureId, WgpuTexture>,
        attachments: impl IntoIterator<Item = &'r AttachmentRef>,
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

    /// Vertex buffer layouts of `attributes`, one per slot in slot order.
    fn vertex_buffers(
        attributes: &[VertexAttribute],
    ) -> Result<Vec<(u64, wgpu::VertexStepMode, Vec<wgpu::VertexAttribute>)>, ResourceError> {
        let mut slots: BTreeMap<u32, (u64, wgpu::VertexStepMode, Vec<wgpu::VertexAttribute>)> =
            BTreeMap::new();
        for attribute in attributes {
            let step_mode = if attribute.is_per_instance() {
                wgpu::VertexStepMode::Instance
            } else {
                wgpu::VertexStepMode::Vertex
            };
            let entry = slots.entry(attribute.slot).or_insert_with(|| {
                (u64::from(attribute.stride), step_mode, Vec::new())
            });
            entry.2.push(wgpu::VertexAttribute {
                format: vertex_format(attribute.format)?,
                offset: u64::from(attribute.offset),
                shader_location: attribute.location,
            });
        }
        Ok(slots.into_values().collect())
    }

    fn stencil_face(face: &StencilFaceDescriptor) -> wgpu::StencilFaceState {
        wgpu::StencilFaceState {
            compare: face.compare_op.into_wgpu(),
            fail_op: face.stencil_fail_op.into_wgpu(),
            depth_fail_op: face.depth_fail_op.into_wgpu(),
            pass_op: face.depth_pass_op.into_wgpu(),
        }
    }

    fn blend_state(target: &BlendTargetDescriptor) -> Option<wgpu::BlendState> {
        target.blend_enabled.then(|| wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: target.src_color.into_wgpu(),
                dst_factor: target.dst_color.into_wgpu(),
                operation: target.color_op.into_wgpu(),
            },
            alpha: wgpu::BlendComponent {
                src_factor: target.src_alpha.into_wgpu(),
                dst_factor: target.dst_alpha.into_wgpu(),
                operation: target.alpha_op.into_wgpu(),
            },
        })
    }

    fn polygon_mode(&self, mode: PolygonMode) -> wgpu::PolygonMode {
        let wanted = mode.into_wgpu();
        let feature = match wanted {
            wgpu::PolygonMode::Line => wgpu::Features::POLYGON_MODE_LINE,
            wgpu::PolygonMode::Point => wgpu::Features::POLYGON_MODE_POINT,
            wgpu::PolygonMode::Fill => return wanted,
        };
        if self.internal.context.features.contains(feature) {
            wanted
        } else {
            log::warn!("WgpuRenderSystem: {mode:?} polygon mode is unavailable, filling instead");
            wgpu::PolygonMode::Fill
        }
    }
}

impl RenderSystem for WgpuRenderSystem {
    fn module(&self) -> RendererModule {
        self.module
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
        if let Some(data) = initial_data {
            check_range(0, data.len() as u64, descriptor.size)?;
        }
        let buffer = WgpuBuffer::new(
            self.device(),
            &self.internal.context.queue,
            descriptor.clone().into_owned(),
            initial_data,
        );

        let id = BufferId(next_id(&self.internal.next_buffer_id));
        lock(&self.internal.buffers, "buffers")?.insert(id, buffer);
        log::debug!(
            "WgpuRenderSystem: created buffer {:?} '{}' ({} bytes)",
            id,
            label_of(&descriptor.label),
            descriptor.size
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let buffer = lock(&self.internal.buffers, "buffers")?
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        buffer.buffer.destroy();
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut buffers = lock(&self.internal.buffers, "buffers")?;
        let buffer = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        check_range(offset, data.len() as u64, buffer.size())?;
        if data.is_empty() {
            return Ok(());
        }
        let mut staging = lock(&self.internal.staging, "staging")?;
        let WgpuStaging { pool, transfer } = &mut *staging;

        let span = aligned_span(offset, data.len() as u64);
        if span.start == offset && span.end - span.start == data.len() as u64 {
            return pool.write_immediate(transfer, buffer, offset, data, STAGING_ALIGNMENT);
        }
        // Unaligned edges are merged with the current contents.
        let mut merged = vec![0; (span.end - span.start) as usize];
        pool.read_subresource_region(transfer, buffer, span.start, &mut merged)?;
        let head = (offset - span.start) as usize;
        merged[head..head + data.len()].copy_from_slice(data);
        pool.write_immediate(transfer, buffer, span.start, &merged, STAGING_ALIGNMENT)
    }

    fn read_buffer(&self, id: BufferId, offset: u64, out: &mut [u8]) -> Result<(), ResourceError> {
        let mut buffers = lock(&self.internal.buffers, "buffers")?;
        let buffer = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        check_range(offset, out.len() as u64, buffer.size())?;
        if out.is_empty() {
            return Ok(());
        }
        let mut staging = lock(&self.internal.staging, "staging")?;
        let WgpuStaging { pool, transfer } = &mut *staging;

        let span = aligned_span(offset, out.len() as u64);
        let mut padded = vec![0; (span.end - span.start) as usize];
        pool.read_subresource_region(transfer, buffer, span.start, &mut padded)?;
        let head = (offset - span.start) as usize;
        out.copy_from_slice(&padded[head..head + out.len()]);
        Ok(())
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
        let WgpuStaging { pool, transfer } = &mut *staging;
        let span = aligned_span(offset, size);
        let mut data = if size == 0 {
            Vec::new()
        } else {
            let bytes = pool
                .map_feedback_buffer(transfer, buffer, span.start, span.end - span.start)?
                .to_vec();
            pool.unmap_feedback_buffer()?;
            bytes
        };

        let head = (offset - span.start) as usize;
        let written = {
            let mut mapping = BufferMapping::new(&mut data[head..head + size as usize], access);
            f(&mut mapping);
            mapping.written_range()
        };
        if access == CpuAccess::ReadOnly || written.is_empty() {
            return Ok(());
        }

        let dirty = aligned_span(offset + written.begin, written.end - written.begin);
        log::trace!(
            "WgpuRenderSystem: unmapping {:?}, writing back bytes {}..{}",
            id,
            dirty.start,
            dirty.end
        );
        let start = (dirty.start - span.start) as usize;
        let end = (dirty.end - span.start) as usize;
        pool.write_immediate(transfer, buffer, dirty.start, &data[start..end], STAGING_ALIGNMENT)
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
        if !self.internal.caps.texture_formats.contains(&descriptor.format) {
            return Err(ResourceError::UnsupportedFormat(descriptor.format));
        }
        let texture = WgpuTexture::new(self.device(), descriptor.clone().into_owned())?;
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
            self.upload_region(&texture, &region, data)?;
            if descriptor.misc_flags.contains(MiscFlags::GENERATE_MIPS) {
                let mut staging = lock(&self.internal.staging, "staging")?;
                let mut mips = lock(&self.internal.mips, "mips")?;
                let levels = descriptor.num_mip_levels();
                let encoder = staging.transfer.encoder();
                match mips.generate(self.device(), encoder, &texture, 0..levels, 0..layers) {
                    Ok(()) => {
                        staging.transfer.submit();
                    }
                    Err(err) => {
                        staging.transfer.discard();
                        log::warn!(
                            "WgpuRenderSystem: cannot generate mips for '{}': {err}",
                            label_of(&descriptor.label)
                        );
                    }
                }
            }
        }

        let id = TextureId(next_id(&self.internal.next_texture_id));
        lock(&self.internal.textures, "textures")?.insert(id, texture);
        log::debug!(
            "WgpuRenderSystem: created texture {:?} '{}' ({:?} {:?}, {}x{}x{})",
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
        let texture = lock(&self.internal.textures, "textures")?
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        texture.texture.destroy();
        Ok(())
    }

    fn write_texture(
        &self,
        id: TextureId,
        region: &TextureRegion,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let textures = lock(&self.internal.textures, "textures")?;
        let texture = textures.get(&id).ok_or(ResourceError::NotFound)?;
        self.upload_region(texture, region, data)
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
        if expected == 0 {
            return Ok(());
        }
        let source = texture.copy_info(region)?;
        let extent = texture.copy_extent(region);

        // Rows are copied at the row alignment and packed afterwards.
        let row = (region.extent.width * texture.descriptor.format.bytes_per_pixel()) as usize;
        let padded_row = align_up(row as u64, u64::from(COPY_ROW_ALIGNMENT)) as usize;
        let rows = (region.extent.height * extent.depth_or_array_layers) as usize;
        let readback = self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("Prism Texture Readback"),
            size: (padded_row * rows) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut staging = lock(&self.internal.staging, "staging")?;
        staging.transfer.encoder().copy_texture_to_buffer(
            source,
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row as u32),
                    rows_per_image: Some(region.extent.height),
                },
            },
            extent,
        );
        staging.transfer.finish_and_submit(true)?;

        let mut padded = vec![0; padded_row * rows];
        read_mapped(self.device(), &readback, 0, &mut padded)?;
        for (dst, src) in out.chunks_exact_mut(row).zip(padded.chunks_exact(padded_row)) {
            dst.copy_from_slice(&src[..row]);
        }
        readback.destroy();
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
        let all_linear = [descriptor.min_filter, descriptor.mag_filter, descriptor.mip_filter]
            .iter()
            .all(|filter| *filter == SamplerFilter::Linear);
        let [u, v, w] = descriptor.address_mode;
        let sampler = self.device().create_sampler(&wgpu::SamplerDescriptor {
            label: descriptor.label.as_deref(),
            address_mode_u: u.into_wgpu(),
            address_mode_v: v.into_wgpu(),
            address_mode_w: w.into_wgpu(),
            mag_filter: descriptor.mag_filter.into_wgpu(),
            min_filter: descriptor.min_filter.into_wgpu(),
            mipmap_filter: descriptor.mip_filter.into_wgpu(),
            lod_min_clamp: descriptor.min_lod,
            lod_max_clamp: descriptor.max_lod,
            compare: descriptor.compare.map(IntoWgpu::into_wgpu),
            anisotropy_clamp: if all_linear {
                descriptor.max_anisotropy
            } else {
                1
            },
            border_color: None,
        });
        let id = SamplerId(next_id(&self.internal.next_sampler_id));
        lock(&self.internal.samplers, "samplers")?.insert(id, WgpuSampler { sampler });
        Ok(id)
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        lock(&self.internal.samplers, "samplers")?
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_shader(&self, descriptor: &ShaderDescriptor<'_>) -> Result<ShaderId, ResourceError> {
        let label = label_of(&descriptor.label);
        let code = match &descriptor.source {
            ShaderSource::Code(code) => code,
            ShaderSource::Binary(_) => {
                return Err(ShaderError::CompilationError {
                    label: label.to_string(),
                    details: "wgpu devices only accept WGSL source code".to_string(),
                }
                .into());
            }
        };

        let mut module = None;
        let mut valid = !code.trim().is_empty() && !descriptor.entry_point.is_empty();
        if valid {
            let shader = self
                .device()
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: descriptor.label.as_deref(),
                    source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(&**code)),
                });
            let info = pollster::block_on(shader.get_compilation_info());
            let errors: Vec<String> = info
                .messages
                .iter()
                .filter(|message| message.message_type == wgpu::CompilationMessageType::Error)
                .map(|message| message.message.clone())
                .collect();
            if errors.is_empty() {
                module = Some(shader);
            } else {
                log::warn!(
                    "WgpuRenderSystem: {:?} shader '{}' failed to compile:\n{}",
                    descriptor.ty,
                    label,
                    errors.join("\n")
                );
                valid = false;
            }
        } else {
            log::warn!(
                "WgpuRenderSystem: {:?} shader '{}' holds no usable code",
                descriptor.ty,
                label
            );
        }

        let id = ShaderId(next_id(&self.internal.next_shader_id));
        lock(&self.internal.shaders, "shaders")?.insert(
            id,
            WgpuShader {
                module,
                ty: descriptor.ty,
                entry_point: descriptor.entry_point.to_string(),
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
                "WgpuRenderSystem: program '{}' failed to link: {err}",
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
        let entries = descriptor
            .bindings
            .iter()
            .map(layout_entry)
            .collect::<Result<Vec<_>, _>>()?;
        let bind_group_layout = (!entries.is_empty()).then(|| {
            self.device()
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: descriptor.label.as_deref(),
                    entries: &entries,
                })
        });
        let layouts: Vec<&wgpu::BindGroupLayout> = bind_group_layout.iter().collect();
        let layout = self
            .device()
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: descriptor.label.as_deref(),
                bind_group_layouts: &layouts,
                immediate_size: 0,
            });

        let id = PipelineLayoutId(next_id(&self.internal.next_layout_id));
        lock(&self.internal.layouts, "layouts")?.insert(
            id,
            WgpuPipelineLayout {
                layout,
                bind_group_layout,
                bindings: descriptor.bindings.clone(),
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
        let label = label_of(&descriptor.label);
        check_range(
            0,
            descriptor.viewports.len().max(descriptor.scissors.len()) as u64,
            u64::from(self.limits().max_viewports),
        )?;

        let shaders = lock(&self.internal.shaders, "shaders")?;
        let programs = lock(&self.internal.programs, "programs")?;
        let layouts = lock(&self.internal.layouts, "layouts")?;
        let render_passes = lock(&self.internal.render_passes, "render passes")?;

        let program = programs
            .get(&descriptor.program)
            .ok_or(ResourceError::NotFound)?;
        check_pipeline_program(program, PipelineKind::Graphics)?;
        let creation_failed = |details: &str| PipelineError::CreationFailed {
            label: label.to_string(),
            details: details.to_string(),
        };
        if program.stages().iter().any(|stage| {
            matches!(
                stage.ty,
                ShaderType::TessControl | ShaderType::TessEvaluation | ShaderType::Geometry
            )
        }) {
            return Err(creation_failed("wgpu has no tessellation or geometry stages").into());
        }
        let stage_shader = |ty: ShaderType| {
            program
                .stages()
                .iter()
                .find(|stage| stage.ty == ty)
                .and_then(|stage| shaders.get(&stage.id))
                .filter(|shader| shader.module.is_some())
        };
        let vertex = stage_shader(ShaderType::Vertex)
            .ok_or_else(|| creation_failed("the vertex shader has no module"))?;
        let fragment = stage_shader(ShaderType::Fragment)
            .filter(|_| !descriptor.rasterizer.discard_enabled);

        let layout = match descriptor.layout {
            Some(id) => Some(
                &layouts
                    .get(&id)
                    .ok_or(PipelineError::LayoutNotFound(id))?
                    .layout,
            ),
            None => None,
        };
        let (color_formats, depth_format, samples) = match descriptor.render_pass {
            Some(id) => {
                let pass = render_passes
                    .get(&id)
                    .ok_or(PipelineError::RenderPassNotFound(id))?;
                (
                    pass.colors.iter().map(|color| color.format).collect(),
                    pass.depth_stencil.map(|attachment| attachment.format),
                    pass.samples.max(1),
                )
            }
            None => {
                let depth = (descriptor.depth.test_enabled || descriptor.stencil.test_enabled)
                    .then_some(DEFAULT_DEPTH_STENCIL_FORMAT);
                (vec![DEFAULT_COLOR_FORMAT], depth, 1)
            }
        };

        let blend = &descriptor.blend;
        let targets = color_formats
            .iter()
            .enumerate()
            .map(|(index, format)| {
                let target = blend
                    .targets
                    .get(index)
                    .or(blend.targets.first())
                    .copied()
                    .unwrap_or_default();
                Ok(Some(wgpu::ColorTargetState {
                    format: texture_format(*format)?,
                    blend: Self::blend_state(&target),
                    write_mask: color_writes(target.color_mask),
                }))
            })
            .collect::<Result<Vec<_>, ResourceError>>()?;

        let depth_stencil = match depth_format {
            Some(format) => {
                let depth = &descriptor.depth;
                let stencil = &descriptor.stencil;
                Some(wgpu::DepthStencilState {
                    format: texture_format(format)?,
                    depth_write_enabled: depth.test_enabled && depth.write_enabled,
                    depth_compare: if depth.test_enabled {
                        depth.compare_op.into_wgpu()
                    } else {
                        wgpu::CompareFunction::Always
                    },
                    stencil: if stencil.test_enabled && format.is_stencil() {
                        wgpu::StencilState {
                            front: Self::stencil_face(&stencil.front),
                            back: Self::stencil_face(&stencil.back),
                            read_mask: stencil.front.read_mask,
                            write_mask: stencil.front.write_mask,
                        }
                    } else {
                        wgpu::StencilState::default()
                    },
                    bias: wgpu::DepthBiasState {
                        constant: descriptor.rasterizer.depth_bias_constant as i32,
                        slope_scale: descriptor.rasterizer.depth_bias_slope,
                        clamp: 0.0,
                    },
                })
            }
            None => None,
        };

        let attributes = program.query_vertex_attributes().unwrap_or(&[]);
        let buffers = Self::vertex_buffers(attributes)?;
        let buffer_layouts: Vec<wgpu::VertexBufferLayout<'_>> = buffers
            .iter()
            .map(|(stride, step_mode, attributes)| wgpu::VertexBufferLayout {
                array_stride: *stride,
                step_mode: *step_mode,
                attributes,
            })
            .collect();

        let rasterizer = &descriptor.rasterizer;
        let vertex_module = vertex.module.as_ref().ok_or_else(|| {
            creation_failed("the vertex shader has no module")
        })?;
        let pipeline = self
            .device()
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: descriptor.label.as_deref(),
                layout,
                vertex: wgpu::VertexState {
                    module: vertex_module,
                    entry_point: Some(&vertex.entry_point),
                    compilation_options: Default::default(),
                    buffers: &buffer_layouts,
                },
                fragment: fragment.and_then(|shader| {
                    shader.module.as_ref().map(|module| wgpu::FragmentState {
                        module,
                        entry_point: Some(&shader.entry_point),
                        compilation_options: Default::default(),
                        targets: &targets,
                    })
                }),
                primitive: wgpu::PrimitiveState {
                    topology: descriptor.primitive_topology.into_wgpu(),
                    strip_index_format: None,
                    front_face: if rasterizer.front_ccw {
                        wgpu::FrontFace::Ccw
                    } else {
                        wgpu::FrontFace::Cw
                    },
                    cull_mode: rasterizer.cull_mode.into_wgpu(),
                    unclipped_depth: false,
                    polygon_mode: self.polygon_mode(rasterizer.polygon_mode),
                    conservative: false,
                },
                depth_stencil,
                multisample: wgpu::MultisampleState {
                    count: samples,
                    mask: !0,
                    alpha_to_coverage_enabled: blend.alpha_to_coverage_enabled,
                },
                multiview_mask: None,
                cache: None,
            });

        let stencil = &descriptor.stencil;
        let state = WgpuPipeline {
            handle: WgpuPipelineHandle::Render(pipeline),
            layout: descriptor.layout,
            blend_factor: (blend.uses_blend_factor() && !blend.blend_factor_dynamic)
                .then_some(blend.blend_factor),
            stencil_reference: (stencil.test_enabled && !stencil.reference_dynamic)
                .then_some(stencil.front.reference),
            viewport: descriptor.viewports.first().copied(),
            scissor: descriptor.scissors.first().copied(),
        };
        drop((shaders, programs, layouts, render_passes));

        let id = PipelineStateId(next_id(&self.internal.next_pipeline_id));
        lock(&self.internal.pipelines, "pipelines")?.insert(id, state);
        log::debug!("WgpuRenderSystem: created graphics pipeline {:?} '{}'", id, label);
        Ok(id)
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor<'_>,
    ) -> Result<PipelineStateId, ResourceError> {
        let label = label_of(&descriptor.label);
        let shaders = lock(&self.internal.shaders, "shaders")?;
        let programs = lock(&self.internal.programs, "programs")?;
        let layouts = lock(&self.internal.layouts, "layouts")?;

        let program = programs
            .get(&descriptor.program)
            .ok_or(ResourceError::NotFound)?;
        check_pipeline_program(program, PipelineKind::Compute)?;
        let layout = match descriptor.layout {
            Some(id) => Some(
                &layouts
                    .get(&id)
                    .ok_or(PipelineError::LayoutNotFound(id))?
                    .layout,
            ),
            None => None,
        };
        let shader = program
            .stages()
            .iter()
            .find(|stage| stage.ty == ShaderType::Compute)
            .and_then(|stage| shaders.get(&stage.id))
            .ok_or(ResourceError::NotFound)?;
        let module = shader
            .module
            .as_ref()
            .ok_or_else(|| PipelineError::CreationFailed {
                label: label.to_string(),
                details: "the compute shader has no module".to_string(),
            })?;
        let pipeline = self
            .device()
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: descriptor.label.as_deref(),
                layout,
                module,
                entry_point: Some(&shader.entry_point),
                compilation_options: Default::default(),
                cache: None,
            });
        drop((shaders, programs, layouts));

        let id = PipelineStateId(next_id(&self.internal.next_pipeline_id));
        lock(&self.internal.pipelines, "pipelines")?.insert(
            id,
            WgpuPipeline {
                handle: WgpuPipelineHandle::Compute(pipeline),
                layout: descriptor.layout,
                blend_factor: None,
                stencil_reference: None,
                viewport: None,
                scissor: None,
            },
        );
        log::debug!("WgpuRenderSystem: created compute pipeline {:?} '{}'", id, label);
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
        for attachment in descriptor
            .color_attachments
            .iter()
            .chain(descriptor.depth_attachment.iter())
            .chain(descriptor.stencil_attachment.iter())
        {
            texture_format(attachment.format)?;
        }
        let id = RenderPassId(next_id(&self.internal.next_render_pass_id));
        lock(&self.internal.render_passes, "render passes")?.insert(
            id,
            WgpuRenderPass {
                colors: descriptor.color_attachments.clone(),
                depth_stencil: descriptor.depth_attachment.or(descriptor.stencil_attachment),
                samples: descriptor.samples,
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
                self.device(),
                &mut textures,
                &self.internal.next_texture_id,
                descriptor,
                attachment,
                depth_stencil,
            ) {
                Ok(reference) => resolved.push(reference),
                Err(err) => {
                    Self::remove_internal_textures(
                        &mut textures,
                        resolved.iter().map(|(reference, _)| reference),
                    );
                    return Err(err);
                }
            }
        }
        let depth_stencil = descriptor
            .depth_stencil_attachment
            .is_some()
            .then(|| resolved.pop())
            .flatten();
        let has_stencil = depth_stencil.as_ref().is_some_and(|(reference, _)| {
            textures
                .get(&reference.texture)
                .is_some_and(|texture| texture.descriptor.format.is_stencil())
        });

        let id = RenderTargetId(next_id(&self.internal.next_render_target_id));
        lock(&self.internal.render_targets, "render targets")?.insert(
            id,
            WgpuRenderTarget {
                colors: resolved,
                depth_stencil,
                has_stencil,
                resolution,
                render_pass: descriptor.render_pass,
            },
        );
        log::debug!(
            "WgpuRenderSystem: created render target {:?} '{}' ({}x{})",
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
        Self::remove_internal_textures(&mut textures, target.attachments());
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
        let layout_id = descriptor.pipeline_layout.ok_or_else(|| {
            ResourceError::InvalidDescriptor(
                "resource heaps of wgpu devices need a pipeline layout".to_string(),
            )
        })?;

        let buffers = lock(&self.internal.buffers, "buffers")?;
        let textures = lock(&self.internal.textures, "textures")?;
        let samplers = lock(&self.internal.samplers, "samplers")?;
        let layouts = lock(&self.internal.layouts, "layouts")?;
        let layout = layouts
            .get(&layout_id)
            .ok_or(PipelineError::LayoutNotFound(layout_id))?;
        let (Some(bind_group_layout), bindings_per_set) =
            (&layout.bind_group_layout, layout.bindings.len())
        else {
            return Err(ResourceError::InvalidDescriptor(
                "pipeline layout of the resource heap has no bindings".to_string(),
            ));
        };
        if descriptor.resources.len() % bindings_per_set != 0 {
            return Err(ResourceError::InvalidDescriptor(format!(
                "{} resources do not fill descriptor sets of {bindings_per_set} bindings",
                descriptor.resources.len()
            )));
        }

        let mut bind_groups = Vec::with_capacity(descriptor.resources.len() / bindings_per_set);
        for set in descriptor.resources.chunks(bindings_per_set) {
            let entries = set
                .iter()
                .zip(&layout.bindings)
                .map(|(resource, binding)| {
                    let resource = match resource {
                        ResourceBinding::Buffer(id) => buffers
                            .get(id)
                            .ok_or(ResourceError::NotFound)?
                            .buffer
                            .as_entire_binding(),
                        ResourceBinding::Texture(id) => wgpu::BindingResource::TextureView(
                            &textures.get(id).ok_or(ResourceError::NotFound)?.view,
                        ),
                        ResourceBinding::Sampler(id) => wgpu::BindingResource::Sampler(
                            &samplers.get(id).ok_or(ResourceError::NotFound)?.sampler,
                        ),
                    };
                    Ok(wgpu::BindGroupEntry {
                        binding: binding.slot,
                        resource,
                    })
                })
                .collect::<Result<Vec<_>, ResourceError>>()?;
            bind_groups.push(self.device().create_bind_group(&wgpu::BindGroupDescriptor {
                label: descriptor.label.as_deref(),
                layout: bind_group_layout,
                entries: &entries,
            }));
        }
        drop((buffers, textures, samplers, layouts));

        let id = ResourceHeapId(next_id(&self.internal.next_heap_id));
        lock(&self.internal.resource_heaps, "resource heaps")?.insert(
            id,
            WgpuResourceHeap {
                bind_groups,
                num_resources: descriptor.resources.len(),
            },
        );
        Ok(id)
    }

    fn destroy_resource_heap(&self, id: ResourceHeapId) -> Result<(), ResourceError> {
        let heap = lock(&self.internal.resource_heaps, "resource heaps")?
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        log::trace!(
            "WgpuRenderSystem: destroyed resource heap {:?} ({} resources)",
            id,
            heap.num_resources
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
            .insert(id, WgpuQueryHeap::new(descriptor.ty, descriptor.num_queries));
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
        lock(&self.internal.fences, "fences")?.insert(id, WgpuFence::default());
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_buffers_group_attributes_by_slot() {
        let mut positions = VertexFormat::new();
        positions.append_attribute(VertexAttribute::new("position", Format::RG32Float, 0));
        positions.append_attribute(VertexAttribute::new("color", Format::RGBA8UNorm, 1));
        let mut instances = VertexFormat::new();
        instances.append_attribute(VertexAttribute {
            instance_divisor: 1,
            ..VertexAttribute::new("offset", Format::RG32Float, 2)
        });
        instances.set_slot(1);

        let attributes: Vec<VertexAttribute> = positions
            .attributes
            .into_iter()
            .chain(instances.attributes)
            .collect();
        let buffers = WgpuRenderSystem::vertex_buffers(&attributes).unwrap();

        assert_eq!(buffers.len(), 2);
        assert_eq!(buffers[0].0, 12);
        assert_eq!(buffers[0].1, wgpu::VertexStepMode::Vertex);
        assert_eq!(buffers[0].2.len(), 2);
        assert_eq!(buffers[0].2[1].offset, 8);
        assert_eq!(buffers[1].0, 8);
        assert_eq!(buffers[1].1, wgpu::VertexStepMode::Instance);
        assert_eq!(buffers[1].2[0].shader_location, 2);
    }

    #[test]
    fn test_blend_state_only_when_enabled() {
        let mut target = BlendTargetDescriptor::default();
        assert!(WgpuRenderSystem::blend_state(&target).is_none());
        target.blend_enabled = true;
        let state = WgpuRenderSystem::blend_state(&target).unwrap();
        assert_eq!(state.color.src_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(state.color.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
    }
}
