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

//! Replays command streams into a wgpu command encoder.

use super::conversions::{load_op, IntoWgpu};
use super::mips::MipGenerator;
use super::resources::{
    WgpuBuffer, WgpuPipeline, WgpuPipelineHandle, WgpuPipelineLayout, WgpuQueryHeap,
    WgpuRenderPass, WgpuRenderTarget, WgpuResourceHeap, WgpuSampler, WgpuTexture,
};
use super::staging::{check_aligned, WgpuStaging};
use prism_core::math::{ColorRgba, Extent3D};
use prism_core::renderer::command::CommandStream;
use prism_core::renderer::{
    check_range, resolve_size, AttachmentClear, AttachmentLoadOp, BindFlags, BufferId,
    ClearFlags, ClearValue, CommandBufferId, CommandError, CommandRecorder, CommandResult,
    DispatchIndirectArguments, DrawIndexedIndirectArguments,
    DrawIndirectArguments, IndexFormat, PipelineError, PipelineLayoutId, PipelineStateId,
    QueryHeapId, QueryType, RenderConditionMode, RenderPassId, RenderTargetId,
    RenderingLimits, ResourceBinding, ResourceError, ResourceHeapId, ResourceSlotRange,
    SamplerId, Scissor, ShaderError, StencilFace, TextureId, TextureLocation, TextureRegion,
    TextureSubresource, Viewport,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Secondary command buffers may execute each other up to this depth.
const MAX_EXECUTE_DEPTH: u32 = 8;

/// Row pitch required by buffer-texture copies.
pub(crate) const COPY_ROW_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

/// Counters of a wgpu device. Queries are computed from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WgpuStatistics {
    /// Command buffers replayed by the queue.
    pub submits: u64,
    /// Draw commands that were not skipped by a render condition.
    pub draw_calls: u64,
    /// Vertices of direct draws, instances included.
    pub vertices: u64,
    /// Draw commands skipped by a render condition.
    pub skipped_draws: u64,
    /// Compute dispatches.
    pub dispatches: u64,
    /// Render passes begun.
    pub render_passes: u64,
    /// Clear commands, including load-op clears.
    pub clears: u64,
    /// Copies between staging memory and buffers.
    pub staging_copies: u64,
    /// Transfer submissions of the staging pool.
    pub transfer_submits: u64,
}

struct ActivePass {
    target: RenderTargetId,
    render_pass: Option<RenderPassId>,
    pass: wgpu::RenderPass<'static>,
}

/// Load operations of every attachment of a render target.
struct PassLoads {
    colors: Vec<wgpu::LoadOp<wgpu::Color>>,
    depth: wgpu::LoadOp<f32>,
    stencil: wgpu::LoadOp<u32>,
}

impl PassLoads {
    fn load_all(num_colors: usize) -> Self {
        Self {
            colors: vec![wgpu::LoadOp::Load; num_colors],
            depth: wgpu::LoadOp::Load,
            stencil: wgpu::LoadOp::Load,
        }
    }
}

#[derive(Default)]
struct ExecutorState {
    pass: Option<ActivePass>,
    pipeline: Option<PipelineStateId>,
    viewport: Option<Viewport>,
    scissor: Option<Scissor>,
    vertex_buffers: Vec<BufferId>,
    index_buffer: Option<(BufferId, IndexFormat, u64)>,
    resource_heap: Option<(ResourceHeapId, u32)>,
    resources: HashMap<u32, ResourceBinding>,
    blend_factor: Option<ColorRgba>,
    stencil_reference: [u32; 2],
    stencil_reference_set: bool,
    skip_draws: bool,
    debug_groups: Vec<String>,
}

/// Borrowed resource tables of a wgpu device, locked for one replay.
pub(crate) struct WgpuTables<'a> {
    pub(crate) buffers: &'a mut HashMap<BufferId, WgpuBuffer>,
    pub(crate) textures: &'a HashMap<TextureId, WgpuTexture>,
    pub(crate) samplers: &'a HashMap<SamplerId, WgpuSampler>,
    pub(crate) layouts: &'a HashMap<PipelineLayoutId, WgpuPipelineLayout>,
    pub(crate) pipelines: &'a HashMap<PipelineStateId, WgpuPipeline>,
    pub(crate) render_passes: &'a HashMap<RenderPassId, WgpuRenderPass>,
    pub(crate) render_targets: &'a HashMap<RenderTargetId, WgpuRenderTarget>,
    pub(crate) resource_heaps: &'a HashMap<ResourceHeapId, WgpuResourceHeap>,
    pub(crate) query_heaps: &'a mut HashMap<QueryHeapId, WgpuQueryHeap>,
    pub(crate) staging: &'a mut WgpuStaging,
    pub(crate) mips: &'a mut MipGenerator,
    pub(crate) secondaries: &'a HashMap<CommandBufferId, Arc<CommandStream>>,
    pub(crate) counters: &'a mut WgpuStatistics,
}

/// Translates decoded commands into wgpu passes and copies.
pub(crate) struct WgpuExecutor<'a> {
    device: &'a wgpu::Device,
    tables: WgpuTables<'a>,
    limits: &'a RenderingLimits,
    epoch: Instant,
    state: ExecutorState,
    depth: u32,
}

/// Buffer layout of a buffer-texture copy and the number of bytes it spans.
fn texel_layout(
    texture: &WgpuTexture,
    region: &TextureRegion,
    offset: u64,
    row_stride: u32,
    layer_stride: u32,
) -> Result<(wgpu::TexelCopyBufferLayout, u64), ResourceError> {
    let bpp = texture.descriptor.format.bytes_per_pixel();
    let tight_row = region.extent.width * bpp;
    let row_stride = if row_stride == 0 { tight_row } else { row_stride };
    if row_stride < tight_row {
        return Err(ResourceError::InvalidAccess(format!(
            "row stride {row_stride} is smaller than a row of {tight_row} bytes"
        )));
    }
    let slices = texture.copy_extent(region).depth_or_array_layers;
    let rows = region.extent.height * slices;
    if rows > 1 && row_stride % COPY_ROW_ALIGNMENT != 0 {
        return Err(ResourceError::InvalidAccess(format!(
            "row stride {row_stride} is not a multiple of {COPY_ROW_ALIGNMENT}"
        )));
    }
    let slice_size = row_stride * region.extent.height;
    let layer_stride = if layer_stride == 0 { slice_size } else { layer_stride };
    if layer_stride < slice_size || layer_stride % row_stride != 0 {
        return Err(ResourceError::InvalidAccess(format!(
            "layer stride {layer_stride} is not a whole number of {row_stride}-byte rows \
             covering the region"
        )));
    }
    if bpp > 0 && offset % u64::from(bpp) != 0 {
        return Err(ResourceError::InvalidAccess(format!(
            "buffer offset {offset} is not a multiple of the {bpp}-byte texel size"
        )));
    }
    let span = u64::from(layer_stride) * u64::from(slices.saturating_sub(1))
        + u64::from(row_stride) * u64::from(region.extent.height.saturating_sub(1))
        + u64::from(tight_row);
    Ok((
        wgpu::TexelCopyBufferLayout {
            offset,
            bytes_per_row: Some(row_stride),
            rows_per_image: Some(layer_stride / row_stride),
        },
        span,
    ))
}

impl<'a> WgpuExecutor<'a> {
    pub(crate) fn new(
        device: &'a wgpu::Device,
        tables: WgpuTables<'a>,
        limits: &'a RenderingLimits,
        epoch: Instant,
    ) -> Self {
        Self {
            device,
            tables,
            limits,
            epoch,
            state: ExecutorState::default(),
            depth: 0,
        }
    }

    /// Replays a primary stream and checks the state it leaves behind.
    pub(crate) fn run(&mut self, stream: &CommandStream) -> CommandResult {
        self.tables.counters.submits += 1;
        stream.replay(self)?;
        if self.state.pass.take().is_some() {
            return Err(CommandError::InsideRenderPass);
        }
        if !self.state.debug_groups.is_empty() {
            return Err(CommandError::UnbalancedDebugGroup {
                open: self.state.debug_groups.len() as u32,
            });
        }
        Ok(())
    }

    fn buffer(&self, id: BufferId) -> Result<&WgpuBuffer, ResourceError> {
        self.tables.buffers.get(&id).ok_or(ResourceError::NotFound)
    }

    fn texture(&self, id: TextureId) -> Result<&'a WgpuTexture, ResourceError> {
        let textures = self.tables.textures;
        textures.get(&id).ok_or(ResourceError::NotFound)
    }

    fn bound_buffer(
        &self,
        id: BufferId,
        flag: BindFlags,
        expected: &'static str,
    ) -> Result<&WgpuBuffer, CommandError> {
        let buffer = self.buffer(id)?;
        if buffer.descriptor.bind_flags.contains(flag) {
            Ok(buffer)
        } else {
            Err(CommandError::InvalidBinding {
                buffer: id,
                expected,
            })
        }
    }

    fn pipeline(&self) -> Result<&'a WgpuPipeline, CommandError> {
        let pipelines = self.tables.pipelines;
        let id = self.state.pipeline.ok_or(CommandError::MissingPipelineState)?;
        pipelines
            .get(&id)
            .ok_or(ResourceError::Pipeline(PipelineError::NotFound(id)).into())
    }

    /// The transfer encoder, which is unavailable while a render pass is open.
    fn encoder(&mut self) -> Result<&mut wgpu::CommandEncoder, CommandError> {
        if self.state.pass.is_some() {
            return Err(CommandError::InsideRenderPass);
        }
        Ok(self.tables.staging.transfer.encoder())
    }

    fn open_pass(
        &mut self,
        target_id: RenderTargetId,
        render_pass: Option<RenderPassId>,
        loads: PassLoads,
    ) -> CommandResult {
        let targets = self.tables.render_targets;
        let passes = self.tables.render_passes;
        let target = targets
            .get(&target_id)
            .ok_or(CommandError::UnknownRenderTarget(target_id))?;
        let pass = match render_pass {
            Some(id) => Some(passes.get(&id).ok_or(ResourceError::Pipeline(
                PipelineError::RenderPassNotFound(id),
            ))?),
            None => None,
        };

        let color_attachments: Vec<_> = target
            .colors
            .iter()
            .enumerate()
            .map(|(index, (_, view))| {
                let store = pass
                    .and_then(|pass| pass.colors.get(index))
                    .map_or(wgpu::StoreOp::Store, |format| format.store_op.into_wgpu());
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: loads.colors.get(index).copied().unwrap_or(wgpu::LoadOp::Load),
                        store,
                    },
                })
            })
            .collect();
        let depth_store = pass
            .and_then(|pass| pass.depth_stencil)
            .map_or(wgpu::StoreOp::Store, |format| format.store_op.into_wgpu());
        let depth_stencil_attachment =
            target
                .depth_stencil
                .as_ref()
                .map(|(_, view)| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: loads.depth,
                        store: depth_store,
                    }),
                    stencil_ops: target.has_stencil.then_some(wgpu::Operations {
                        load: loads.stencil,
                        store: depth_store,
                    }),
                });

        let encoder = self.tables.staging.transfer.encoder();
        let pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Prism Render Pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            })
            .forget_lifetime();
        self.state.pass = Some(ActivePass {
            target: target_id,
            render_pass,
            pass,
        });
        Ok(())
    }

    /// Ends the open pass and begins it again with `loads`.
    fn restart_pass(&mut self, loads: PassLoads) -> CommandResult {
        let active = self.state.pass.take().ok_or(CommandError::OutsideRenderPass)?;
        let (target, render_pass) = (active.target, active.render_pass);
        drop(active);
        self.open_pass(target, render_pass, loads)
    }

    fn active_target(&self) -> Result<&'a WgpuRenderTarget, CommandError> {
        let targets = self.tables.render_targets;
        let id = self
            .state
            .pass
            .as_ref()
            .map(|active| active.target)
            .ok_or(CommandError::OutsideRenderPass)?;
        targets.get(&id).ok_or(CommandError::UnknownRenderTarget(id))
    }

    /// Bind group 0 for the next draw or dispatch.
    fn bind_group(&self, pipeline: &WgpuPipeline) -> Result<Option<wgpu::BindGroup>, CommandError> {
        if self.state.resources.is_empty() {
            let Some((heap, set)) = self.state.resource_heap else {
                return Ok(None);
            };
            let heap = self
                .tables
                .resource_heaps
                .get(&heap)
                .ok_or(ResourceError::NotFound)?;
            return Ok(heap.bind_groups.get(set as usize).cloned());
        }

        let explicit = pipeline.layout.and_then(|id| self.tables.layouts.get(&id));
        let (layout, bindings) = match explicit {
            Some(layout) => (
                layout.bind_group_layout.clone().ok_or_else(|| {
                    ResourceError::InvalidAccess(
                        "resources bound for a pipeline layout without bindings".to_string(),
                    )
                })?,
                Some(&layout.bindings),
            ),
            None => (pipeline.bind_group_layout(), None),
        };

        let mut slots: Vec<_> = self.state.resources.iter().collect();
        slots.sort_by_key(|(descriptor, _)| **descriptor);
        let mut entries = Vec::with_capacity(slots.len());
        for (descriptor, resource) in slots {
            let binding = match bindings {
                Some(bindings) => {
                    bindings
                        .get(*descriptor as usize)
                        .ok_or(ResourceError::OutOfBounds {
                            offset: u64::from(*descriptor),
                            size: 1,
                            limit: bindings.len() as u64,
                        })?
                        .slot
                }
                None => *descriptor,
            };
            let resource = match resource {
                ResourceBinding::Buffer(id) => self.buffer(*id)?.buffer.as_entire_binding(),
                ResourceBinding::Texture(id) => {
                    wgpu::BindingResource::TextureView(&self.texture(*id)?.view)
                }
                ResourceBinding::Sampler(id) => wgpu::BindingResource::Sampler(
                    &self
                        .tables
                        .samplers
                        .get(id)
                        .ok_or(ResourceError::NotFound)?
                        .sampler,
                ),
            };
            entries.push(wgpu::BindGroupEntry { binding, resource });
        }
        Ok(Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Prism Dynamic Bind Group"),
            layout: &layout,
            entries: &entries,
        })))
    }

    /// Validates a draw, applies the bound state to the pass, and returns
    /// `false` if a render condition skips it.
    fn begin_draw(&mut self) -> Result<bool, CommandError> {
        let target = self.active_target()?;
        let pipeline = self.pipeline()?;
        let WgpuPipelineHandle::Render(handle) = &pipeline.handle else {
            return Err(CommandError::MissingPipelineState);
        };
        if self.state.skip_draws {
            self.tables.counters.skipped_draws += 1;
            return Ok(false);
        }
        let bind_group = self.bind_group(pipeline)?;

        let state = &mut self.state;
        let buffers = &*self.tables.buffers;
        let pass = &mut state
            .pass
            .as_mut()
            .ok_or(CommandError::OutsideRenderPass)?
            .pass;
        pass.set_pipeline(handle);
        if let Some(bind_group) = &bind_group {
            pass.set_bind_group(0, bind_group, &[]);
        }
        for (slot, id) in state.vertex_buffers.iter().enumerate() {
            let buffer = buffers.get(id).ok_or(ResourceError::NotFound)?;
            pass.set_vertex_buffer(slot as u32, buffer.buffer.slice(..));
        }
        if let Some((id, format, offset)) = state.index_buffer {
            let buffer = buffers.get(&id).ok_or(ResourceError::NotFound)?;
            pass.set_index_buffer(buffer.buffer.slice(offset..), format.into_wgpu());
        }

        let resolution = target.resolution;
        if let Some(viewport) = state.viewport.or(pipeline.viewport) {
            let x = viewport.x.clamp(0.0, resolution.width as f32);
            let y = viewport.y.clamp(0.0, resolution.height as f32);
            let width = viewport.width.min(resolution.width as f32 - x);
            let height = viewport.height.min(resolution.height as f32 - y);
            if width > 0.0 && height > 0.0 {
                pass.set_viewport(
                    x,
                    y,
                    width,
                    height,
                    viewport.min_depth.clamp(0.0, 1.0),
                    viewport.max_depth.clamp(0.0, 1.0),
                );
            }
        }
        if let Some(scissor) = state.scissor.or(pipeline.scissor) {
            let x = (scissor.x.max(0) as u32).min(resolution.width);
            let y = (scissor.y.max(0) as u32).min(resolution.height);
            pass.set_scissor_rect(
                x,
                y,
                scissor.width.min(resolution.width - x),
                scissor.height.min(resolution.height - y),
            );
        }
        if let Some(color) = pipeline.blend_factor.or(state.blend_factor) {
            pass.set_blend_constant(color.into_wgpu());
        }
        let reference = pipeline
            .stencil_reference
            .or(state.stencil_reference_set.then_some(state.stencil_reference[0]));
        if let Some(reference) = reference {
            pass.set_stencil_reference(reference);
        }
        Ok(true)
    }

    fn pass_mut(&mut self) -> Result<&mut wgpu::RenderPass<'static>, CommandError> {
        self.state
            .pass
            .as_mut()
            .map(|active| &mut active.pass)
            .ok_or(CommandError::OutsideRenderPass)
    }

    fn count_draw(&mut self, vertices: u64, instances: u64) {
        let total = vertices * instances;
        log::trace!(
            "WgpuExecutor: draw {total} vertices ({} vertex buffers, heap {:?}, {} resources)",
            self.state.vertex_buffers.len(),
            self.state.resource_heap,
            self.state.resources.len()
        );
        self.tables.counters.draw_calls += 1;
        self.tables.counters.vertices += total;
    }

    fn check_indices(&self, first_index: u32, num_indices: u32) -> CommandResult {
        let (buffer, format, offset) = self.state.index_buffer.ok_or_else(|| {
            ResourceError::InvalidAccess("indexed draw without an index buffer".to_string())
        })?;
        let size = self.buffer(buffer)?.size();
        let start = offset + u64::from(first_index) * format.size();
        check_range(start, u64::from(num_indices) * format.size(), size)?;
        Ok(())
    }

    fn query_counter(&self, ty: QueryType) -> u64 {
        let counters = &*self.tables.counters;
        match ty {
            QueryType::SamplesPassed
            | QueryType::AnySamplesPassed
            | QueryType::PipelineStatistics => counters.vertices,
            QueryType::StreamOutPrimitivesWritten => 0,
            QueryType::TimeElapsed => self.epoch.elapsed().as_nanos() as u64,
        }
    }

    fn query_heap(
        &mut self,
        heap: QueryHeapId,
        query: u32,
    ) -> Result<&mut WgpuQueryHeap, ResourceError> {
        let heap = self
            .tables
            .query_heaps
            .get_mut(&heap)
            .ok_or(ResourceError::NotFound)?;
        check_range(u64::from(query), 1, heap.results.len() as u64)?;
        Ok(heap)
    }

    fn indirect_stride(stride: u32, size: usize) -> u64 {
        if stride == 0 {
            size as u64
        } else {
            u64::from(stride)
        }
    }
}

impl CommandRecorder for WgpuExecutor<'_> {
    fn execute(&mut self, command_buffer: CommandBufferId) -> CommandResult {
        let stream = self
            .tables
            .secondaries
            .get(&command_buffer)
            .cloned()
            .ok_or(CommandError::UnknownCommandBuffer(command_buffer))?;
        if self.depth >= MAX_EXECUTE_DEPTH {
            return Err(ResourceError::InvalidAccess(format!(
                "secondary command buffers nest deeper than {MAX_EXECUTE_DEPTH}"
            ))
            .into());
        }
        self.depth += 1;
        let result = stream.replay(self);
        self.depth -= 1;
        result
    }

    fn update_buffer(&mut self, dst: BufferId, dst_offset: u64, data: &[u8]) -> CommandResult {
        if self.state.pass.is_some() {
            return Err(CommandError::InsideRenderPass);
        }
        check_aligned(dst_offset, data.len() as u64)?;
        let WgpuStaging { pool, transfer } = &mut *self.tables.staging;
        let buffer = self
            .tables
            .buffers
            .get_mut(&dst)
            .ok_or(ResourceError::NotFound)?;
        check_range(dst_offset, data.len() as u64, buffer.size())?;
        pool.write_staged(transfer, buffer, dst_offset, data)?;
        Ok(())
    }

    fn copy_buffer(
        &mut self,
        dst: BufferId,
        dst_offset: u64,
        src: BufferId,
        src_offset: u64,
        size: u64,
    ) -> CommandResult {
        check_aligned(src_offset, size)?;
        check_aligned(dst_offset, size)?;
        let src_buffer = self.buffer(src)?.buffer.clone();
        check_range(src_offset, size, self.buffer(src)?.size())?;
        let dst_buffer = self.buffer(dst)?.buffer.clone();
        check_range(dst_offset, size, self.buffer(dst)?.size())?;
        if size == 0 {
            return Ok(());
        }

        if src == dst {
            // Copies within one buffer go through a scratch buffer.
            let scratch = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Prism Copy Scratch Buffer"),
                size,
                usage: wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let encoder = self.encoder()?;
            encoder.copy_buffer_to_buffer(&src_buffer, src_offset, &scratch, 0, size);
            encoder.copy_buffer_to_buffer(&scratch, 0, &dst_buffer, dst_offset, size);
            return Ok(());
        }
        self.encoder()?
            .copy_buffer_to_buffer(&src_buffer, src_offset, &dst_buffer, dst_offset, size);
        Ok(())
    }

    fn fill_buffer(
        &mut self,
        dst: BufferId,
        dst_offset: u64,
        value: u32,
        size: u64,
    ) -> CommandResult {
        let buffer = self.buffer(dst)?;
        let size = resolve_size(dst_offset, size, buffer.size());
        check_aligned(dst_offset, size)?;
        check_range(dst_offset, size, buffer.size())?;
        if value == 0 {
            let handle = buffer.buffer.clone();
            self.encoder()?.clear_buffer(&handle, dst_offset, Some(size));
            return Ok(());
        }
        let pattern: Vec<u8> = value
            .to_le_bytes()
            .iter()
            .copied()
            .cycle()
            .take(size as usize)
            .collect();
        self.update_buffer(dst, dst_offset, &pattern)
    }

    fn copy_texture(
        &mut self,
        dst: TextureId,
        dst_location: &TextureLocation,
        src: TextureId,
        src_location: &TextureLocation,
        extent: Extent3D,
    ) -> CommandResult {
        let region = |location: &TextureLocation| TextureRegion {
            subresource: TextureSubresource {
                base_array_layer: location.array_layer,
                num_array_layers: 1,
                base_mip_level: location.mip_level,
                num_mip_levels: 1,
            },
            offset: location.offset,
            extent,
        };
        let src_texture = self.texture(src)?;
        let dst_texture = self.texture(dst)?;
        if dst_texture.descriptor.format.bytes_per_pixel()
            != src_texture.descriptor.format.bytes_per_pixel()
        {
            return Err(ResourceError::UnsupportedFormat(dst_texture.descriptor.format).into());
        }
        let src_region = region(src_location);
        let source = src_texture.copy_info(&src_region)?;
        let destination = dst_texture.copy_info(&region(dst_location))?;
        let size = src_texture.copy_extent(&src_region);
        self.encoder()?
            .copy_texture_to_texture(source, destination, size);
        Ok(())
    }

    fn copy_texture_from_buffer(
        &mut self,
        dst: TextureId,
        dst_region: &TextureRegion,
        src: BufferId,
        src_offset: u64,
        row_stride: u32,
        layer_stride: u32,
    ) -> CommandResult {
        let texture = self.texture(dst)?;
        let (layout, span) = texel_layout(texture, dst_region, src_offset, row_stride, layer_stride)?;
        let buffer = self.buffer(src)?;
        check_range(src_offset, span, buffer.size())?;
        let buffer = buffer.buffer.clone();
        let destination = texture.copy_info(dst_region)?;
        let size = texture.copy_extent(dst_region);
        self.encoder()?.copy_buffer_to_texture(
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout,
            },
            destination,
            size,
        );
        Ok(())
    }

    fn copy_buffer_from_texture(
        &mut self,
        dst: BufferId,
        dst_offset: u64,
        src: TextureId,
        src_region: &TextureRegion,
        row_stride: u32,
        layer_stride: u32,
    ) -> CommandResult {
        let texture = self.texture(src)?;
        let (layout, span) = texel_layout(texture, src_region, dst_offset, row_stride, layer_stride)?;
        let buffer = self.buffer(dst)?;
        check_range(dst_offset, span, buffer.size())?;
        let buffer = buffer.buffer.clone();
        let source = texture.copy_info(src_region)?;
        let size = texture.copy_extent(src_region);
        self.encoder()?.copy_texture_to_buffer(
            source,
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout,
            },
            size,
        );
        Ok(())
    }

    fn generate_mips(
        &mut self,
        texture: TextureId,
        subresource: Option<TextureSubresource>,
    ) -> CommandResult {
        if self.state.pass.is_some() {
            return Err(CommandError::InsideRenderPass);
        }
        let texture = self.texture(texture)?;
        let layer_count = texture.descriptor.layers();
        let (levels, layers) = match subresource {
            Some(sub) => (
                sub.base_mip_level..sub.base_mip_level + sub.num_mip_levels,
                sub.base_array_layer..sub.base_array_layer + sub.num_array_layers.max(1),
            ),
            None => (0..texture.descriptor.num_mip_levels(), 0..layer_count),
        };
        if layers.end > layer_count {
            return Err(ResourceError::OutOfBounds {
                offset: u64::from(layers.start),
                size: u64::from(layers.end - layers.start),
                limit: u64::from(layer_count),
            }
            .into());
        }
        let encoder = self.tables.staging.transfer.encoder();
        self.tables
            .mips
            .generate(self.device, encoder, texture, levels, layers)?;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: &Viewport) -> CommandResult {
        self.set_viewports(std::slice::from_ref(viewport))
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) -> CommandResult {
        check_range(0, viewports.len() as u64, u64::from(self.limits.max_viewports))?;
        self.state.viewport = viewports.first().copied();
        Ok(())
    }

    fn set_scissor(&mut self, scissor: &Scissor) -> CommandResult {
        self.set_scissors(std::slice::from_ref(scissor))
    }

    fn set_scissors(&mut self, scissors: &[Scissor]) -> CommandResult {
        check_range(0, scissors.len() as u64, u64::from(self.limits.max_viewports))?;
        self.state.scissor = scissors.first().copied();
        Ok(())
    }

    fn set_vertex_buffer(&mut self, buffer: BufferId) -> CommandResult {
        self.set_vertex_buffers(std::slice::from_ref(&buffer))
    }

    fn set_vertex_buffers(&mut self, buffers: &[BufferId]) -> CommandResult {
        for buffer in buffers {
            self.bound_buffer(*buffer, BindFlags::VERTEX_BUFFER, "vertex buffer")?;
        }
        self.state.vertex_buffers = buffers.to_vec();
        Ok(())
    }

    fn set_index_buffer(
        &mut self,
        buffer: BufferId,
        format: IndexFormat,
        offset: u64,
    ) -> CommandResult {
        let size = self
            .bound_buffer(buffer, BindFlags::INDEX_BUFFER, "index buffer")?
            .size();
        check_range(offset, 0, size)?;
        self.state.index_buffer = Some((buffer, format, offset));
        Ok(())
    }

    fn set_resource_heap(&mut self, heap: ResourceHeapId, descriptor_set: u32) -> CommandResult {
        let sets = self
            .tables
            .resource_heaps
            .get(&heap)
            .ok_or(ResourceError::NotFound)?
            .bind_groups
            .len();
        check_range(u64::from(descriptor_set), 1, sets as u64)?;
        self.state.resource_heap = Some((heap, descriptor_set));
        Ok(())
    }

    fn set_resource(&mut self, descriptor: u32, resource: ResourceBinding) -> CommandResult {
        let exists = match resource {
            ResourceBinding::Buffer(id) => self.tables.buffers.contains_key(&id),
            ResourceBinding::Texture(id) => self.tables.textures.contains_key(&id),
            ResourceBinding::Sampler(id) => self.tables.samplers.contains_key(&id),
        };
        if !exists {
            return Err(ResourceError::NotFound.into());
        }
        self.state.resources.insert(descriptor, resource);
        Ok(())
    }

    fn reset_resource_slots(&mut self, range: &ResourceSlotRange) -> CommandResult {
        let slots = range.first_slot..range.first_slot.saturating_add(range.num_slots);
        self.state.resources.retain(|slot, _| !slots.contains(slot));
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_target: RenderTargetId,
        render_pass: Option<RenderPassId>,
        clear_values: &[ClearValue],
    ) -> CommandResult {
        if self.state.pass.is_some() {
            return Err(CommandError::InsideRenderPass);
        }
        let targets = self.tables.render_targets;
        let target = targets
            .get(&render_target)
            .ok_or(CommandError::UnknownRenderTarget(render_target))?;
        let render_pass = render_pass.or(target.render_pass);
        let mut loads = PassLoads::load_all(target.colors.len());

        if let Some(pass_id) = render_pass {
            let passes = self.tables.render_passes;
            let pass = passes.get(&pass_id).ok_or(ResourceError::Pipeline(
                PipelineError::RenderPassNotFound(pass_id),
            ))?;
            let mut values = clear_values.iter();
            let mut next_value = |op: AttachmentLoadOp| {
                if op == AttachmentLoadOp::Clear {
                    values.next().copied().unwrap_or_default()
                } else {
                    ClearValue::default()
                }
            };
            for (load, format) in loads.colors.iter_mut().zip(&pass.colors) {
                let value = next_value(format.load_op);
                *load = load_op(format.load_op, value.color.into_wgpu());
            }
            if let Some(format) = pass.depth_stencil {
                let value = next_value(format.load_op);
                loads.depth = load_op(format.load_op, value.depth);
                loads.stencil = load_op(format.load_op, value.stencil);
            }
            let clears = pass
                .colors
                .iter()
                .chain(pass.depth_stencil.iter())
                .filter(|format| format.load_op == AttachmentLoadOp::Clear)
                .count();
            self.tables.counters.clears += clears as u64;
        }

        self.tables.counters.render_passes += 1;
        self.open_pass(render_target, render_pass, loads)
    }

    fn end_render_pass(&mut self) -> CommandResult {
        self.state
            .pass
            .take()
            .map(drop)
            .ok_or(CommandError::OutsideRenderPass)
    }

    fn clear(&mut self, flags: ClearFlags, value: &ClearValue) -> CommandResult {
        let target = self.active_target()?;
        let mut loads = PassLoads::load_all(target.colors.len());
        if flags.contains(ClearFlags::COLOR) {
            loads.colors.fill(wgpu::LoadOp::Clear(value.color.into_wgpu()));
        }
        if flags.contains(ClearFlags::DEPTH) {
            loads.depth = wgpu::LoadOp::Clear(value.depth);
        }
        if flags.contains(ClearFlags::STENCIL) {
            loads.stencil = wgpu::LoadOp::Clear(value.stencil);
        }
        self.tables.counters.clears += 1;
        self.restart_pass(loads)
    }

    fn clear_attachments(&mut self, attachments: &[AttachmentClear]) -> CommandResult {
        let target = self.active_target()?;
        let mut loads = PassLoads::load_all(target.colors.len());
        for clear in attachments {
            if clear.flags.contains(ClearFlags::COLOR) {
                let limit = loads.colors.len() as u64;
                let load = loads
                    .colors
                    .get_mut(clear.color_attachment as usize)
                    .ok_or(ResourceError::OutOfBounds {
                        offset: u64::from(clear.color_attachment),
                        size: 1,
                        limit,
                    })?;
                *load = wgpu::LoadOp::Clear(clear.value.color.into_wgpu());
                continue;
            }
            if clear.flags.contains(ClearFlags::DEPTH) {
                loads.depth = wgpu::LoadOp::Clear(clear.value.depth);
            }
            if clear.flags.contains(ClearFlags::STENCIL) {
                loads.stencil = wgpu::LoadOp::Clear(clear.value.stencil);
            }
        }
        self.tables.counters.clears += 1;
        self.restart_pass(loads)
    }

    fn set_pipeline_state(&mut self, pipeline: PipelineStateId) -> CommandResult {
        if !self.tables.pipelines.contains_key(&pipeline) {
            return Err(ResourceError::Pipeline(PipelineError::NotFound(pipeline)).into());
        }
        self.state.pipeline = Some(pipeline);
        Ok(())
    }

    fn set_blend_factor(&mut self, color: &ColorRgba) -> CommandResult {
        self.state.blend_factor = Some(*color);
        Ok(())
    }

    fn set_stencil_reference(&mut self, reference: u32, face: StencilFace) -> CommandResult {
        match face {
            StencilFace::FrontAndBack => self.state.stencil_reference = [reference; 2],
            StencilFace::Front => self.state.stencil_reference[0] = reference,
            StencilFace::Back => self.state.stencil_reference[1] = reference,
        }
        if self.state.stencil_reference[0] != self.state.stencil_reference[1] {
            log::warn!("WgpuExecutor: separate back-face stencil references are not supported");
        }
        self.state.stencil_reference_set = true;
        Ok(())
    }

    fn set_uniforms(&mut self, _first: u32, _data: &[u8]) -> CommandResult {
        Err(ResourceError::from(ShaderError::UniformsUnavailable).into())
    }

    fn begin_query(&mut self, heap: QueryHeapId, query: u32) -> CommandResult {
        let ty = self.query_heap(heap, query)?.ty;
        let counter = self.query_counter(ty);
        self.query_heap(heap, query)?.begun[query as usize] = Some(counter);
        Ok(())
    }

    fn end_query(&mut self, heap: QueryHeapId, query: u32) -> CommandResult {
        let ty = self.query_heap(heap, query)?.ty;
        let counter = self.query_counter(ty);
        let heap = self.query_heap(heap, query)?;
        let begun = heap.begun[query as usize].take().ok_or_else(|| {
            ResourceError::InvalidAccess(format!("query {query} ended without being begun"))
        })?;
        let value = counter.saturating_sub(begun);
        heap.results[query as usize] = match ty {
            QueryType::AnySamplesPassed => u64::from(value > 0),
            _ => value,
        };
        Ok(())
    }

    fn begin_render_condition(
        &mut self,
        heap: QueryHeapId,
        query: u32,
        mode: RenderConditionMode,
    ) -> CommandResult {
        let result = self.query_heap(heap, query)?.results[query as usize];
        self.state.skip_draws = (result != 0) == mode.is_inverted();
        Ok(())
    }

    fn end_render_condition(&mut self) -> CommandResult {
        self.state.skip_draws = false;
        Ok(())
    }

    fn begin_stream_output(&mut self, _buffers: &[BufferId]) -> CommandResult {
        Err(ResourceError::InvalidAccess(
            "stream output is not available on wgpu devices".to_string(),
        )
        .into())
    }

    fn end_stream_output(&mut self) -> CommandResult {
        Err(ResourceError::InvalidAccess(
            "stream output is not available on wgpu devices".to_string(),
        )
        .into())
    }

    fn draw(&mut self, num_vertices: u32, first_vertex: u32) -> CommandResult {
        self.draw_instanced(num_vertices, first_vertex, 1, 0)
    }

    fn draw_instanced(
        &mut self,
        num_vertices: u32,
        first_vertex: u32,
        num_instances: u32,
        first_instance: u32,
    ) -> CommandResult {
        if self.begin_draw()? {
            self.pass_mut()?.draw(
                first_vertex..first_vertex + num_vertices,
                first_instance..first_instance + num_instances,
            );
            self.count_draw(u64::from(num_vertices), u64::from(num_instances));
        }
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        num_indices: u32,
        first_index: u32,
        vertex_offset: i32,
    ) -> CommandResult {
        self.draw_indexed_instanced(num_indices, 1, first_index, vertex_offset, 0)
    }

    fn draw_indexed_instanced(
        &mut self,
        num_indices: u32,
        num_instances: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> CommandResult {
        self.check_indices(first_index, num_indices)?;
        if self.begin_draw()? {
            self.pass_mut()?.draw_indexed(
                first_index..first_index + num_indices,
                vertex_offset,
                first_instance..first_instance + num_instances,
            );
            self.count_draw(u64::from(num_indices), u64::from(num_instances));
        }
        Ok(())
    }

    fn draw_indirect(
        &mut self,
        buffer: BufferId,
        offset: u64,
        num_commands: u32,
        stride: u32,
    ) -> CommandResult {
        let size = std::mem::size_of::<DrawIndirectArguments>();
        let stride = Self::indirect_stride(stride, size);
        let args = self.bound_buffer(buffer, BindFlags::INDIRECT_BUFFER, "indirect buffer")?;
        for i in 0..u64::from(num_commands) {
            check_range(offset + i * stride, size as u64, args.size())?;
        }
        let args = args.buffer.clone();
        if self.begin_draw()? {
            let pass = self.pass_mut()?;
            for i in 0..u64::from(num_commands) {
                pass.draw_indirect(&args, offset + i * stride);
            }
            self.tables.counters.draw_calls += u64::from(num_commands);
        }
        Ok(())
    }

    fn draw_indexed_indirect(
        &mut self,
        buffer: BufferId,
        offset: u64,
        num_commands: u32,
        stride: u32,
    ) -> CommandResult {
        let size = std::mem::size_of::<DrawIndexedIndirectArguments>();
        let stride = Self::indirect_stride(stride, size);
        let args = self.bound_buffer(buffer, BindFlags::INDIRECT_BUFFER, "indirect buffer")?;
        for i in 0..u64::from(num_commands) {
            check_range(offset + i * stride, size as u64, args.size())?;
        }
        let args = args.buffer.clone();
        if self.state.index_buffer.is_none() {
            return Err(ResourceError::InvalidAccess(
                "indexed draw without an index buffer".to_string(),
            )
            .into());
        }
        if self.begin_draw()? {
            let pass = self.pass_mut()?;
            for i in 0..u64::from(num_commands) {
                pass.draw_indexed_indirect(&args, offset + i * stride);
            }
            self.tables.counters.draw_calls += u64::from(num_commands);
        }
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> CommandResult {
        let pipeline = self.pipeline()?;
        let WgpuPipelineHandle::Compute(handle) = &pipeline.handle else {
            return Err(CommandError::MissingPipelineState);
        };
        for (count, limit) in [x, y, z].into_iter().zip(self.limits.max_compute_work_groups) {
            check_range(0, u64::from(count), u64::from(limit))?;
        }
        let bind_group = self.bind_group(pipeline)?;
        {
            let mut pass = self
                .encoder()?
                .begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Prism Compute Pass"),
                    timestamp_writes: None,
                });
            pass.set_pipeline(handle);
            if let Some(bind_group) = &bind_group {
                pass.set_bind_group(0, bind_group, &[]);
            }
            pass.dispatch_workgroups(x, y, z);
        }
        self.tables.counters.dispatches += 1;
        Ok(())
    }

    fn dispatch_indirect(&mut self, buffer: BufferId, offset: u64) -> CommandResult {
        let size = std::mem::size_of::<DispatchIndirectArguments>() as u64;
        let args = self.bound_buffer(buffer, BindFlags::INDIRECT_BUFFER, "indirect buffer")?;
        check_range(offset, size, args.size())?;
        let args = args.buffer.clone();
        let pipeline = self.pipeline()?;
        let WgpuPipelineHandle::Compute(handle) = &pipeline.handle else {
            return Err(CommandError::MissingPipelineState);
        };
        let bind_group = self.bind_group(pipeline)?;
        {
            let mut pass = self
                .encoder()?
                .begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Prism Compute Pass"),
                    timestamp_writes: None,
                });
            pass.set_pipeline(handle);
            if let Some(bind_group) = &bind_group {
                pass.set_bind_group(0, bind_group, &[]);
            }
            pass.dispatch_workgroups_indirect(&args, offset);
        }
        self.tables.counters.dispatches += 1;
        Ok(())
    }

    fn push_debug_group(&mut self, name: &str) -> CommandResult {
        log::trace!("WgpuExecutor: push debug group '{name}'");
        match self.state.pass.as_mut() {
            Some(active) => active.pass.insert_debug_marker(name),
            None => self.tables.staging.transfer.encoder().insert_debug_marker(name),
        }
        self.state.debug_groups.push(name.to_string());
        Ok(())
    }

    fn pop_debug_group(&mut self) -> CommandResult {
        match self.state.debug_groups.pop() {
            Some(name) => {
                log::trace!("WgpuExecutor: pop debug group '{name}'");
                Ok(())
            }
            None => Err(CommandError::UnbalancedDebugGroup { open: 0 }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unaligned_transfers_are_rejected() {
        assert!(check_aligned(0, 16).is_ok());
        assert!(check_aligned(4, 8).is_ok());
        assert!(matches!(
            check_aligned(2, 8),
            Err(ResourceError::InvalidAccess(_))
        ));
        assert!(check_aligned(0, 6).is_err());
    }

    #[test]
    fn test_indirect_stride_defaults_to_argument_size() {
        let size = std::mem::size_of::<DrawIndirectArguments>();
        assert_eq!(WgpuExecutor::indirect_stride(0, size), size as u64);
        assert_eq!(WgpuExecutor::indirect_stride(32, size), 32);
    }
}
