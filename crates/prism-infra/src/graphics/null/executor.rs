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

//! Replays command streams on the CPU.

use super::resources::{
    num_primitives, AttachmentRef, NullBuffer, NullPipeline, NullQueryHeap, NullRenderPass,
    NullRenderTarget, NullResourceHeap, NullSampler, NullTexture,
};
use super::transfer::NullStaging;
use prism_core::math::{ColorRgba, Extent3D};
use prism_core::renderer::command::CommandStream;
use prism_core::renderer::{
    check_range, resolve_size, AttachmentClear, AttachmentLoadOp, BindFlags, BufferId,
    ClearFlags, ClearValue, CommandBufferId, CommandError, CommandRecorder, CommandResult,
    DispatchIndirectArguments, DrawIndexedIndirectArguments,
    DrawIndirectArguments, IndexFormat, PipelineError, PipelineKind, PipelineStateId,
    QueryHeapId, QueryType, RenderConditionMode, RenderPassId, RenderTargetId,
    RenderingLimits, ResourceBinding, ResourceError, ResourceHeapId, ResourceSlotRange,
    SamplerId, Scissor, StencilFace, TextureId, TextureLocation, TextureRegion,
    TextureSubresource, Viewport,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Secondary command buffers may execute each other up to this depth.
const MAX_EXECUTE_DEPTH: u32 = 8;

/// Counters accumulated by a null device across submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NullStatistics {
    /// Command buffers replayed by the queue.
    pub submits: u64,
    /// Draw commands that were not skipped by a render condition.
    pub draw_calls: u64,
    /// Vertices processed by those draws, instances included.
    pub vertices: u64,
    /// Draw commands skipped by a render condition.
    pub skipped_draws: u64,
    /// Compute dispatches.
    pub dispatches: u64,
    /// Work groups launched by those dispatches.
    pub work_groups: u64,
    /// Render passes begun.
    pub render_passes: u64,
    /// Clear commands, including load-op clears.
    pub clears: u64,
    /// Copies between staging memory and buffers.
    pub staging_copies: u64,
    /// Transfer submissions of the staging pool.
    pub transfer_submits: u64,
}

#[derive(Debug, Clone, Copy)]
struct BoundPipeline {
    id: PipelineStateId,
    kind: PipelineKind,
}

#[derive(Debug, Default)]
struct ExecutorState {
    render_target: Option<RenderTargetId>,
    pipeline: Option<BoundPipeline>,
    viewports: Vec<Viewport>,
    scissors: Vec<Scissor>,
    vertex_buffers: Vec<BufferId>,
    index_buffer: Option<(BufferId, IndexFormat, u64)>,
    resource_heap: Option<(ResourceHeapId, u32)>,
    resources: HashMap<u32, ResourceBinding>,
    blend_factor: ColorRgba,
    stencil_reference: [u32; 2],
    uniforms: HashMap<u32, Vec<u8>>,
    skip_draws: bool,
    stream_output: Vec<BufferId>,
    stream_output_vertices: u64,
    debug_groups: Vec<String>,
}

/// Borrowed resource tables of a null device, locked for one replay.
pub(crate) struct NullTables<'a> {
    pub(crate) buffers: &'a mut HashMap<BufferId, NullBuffer>,
    pub(crate) textures: &'a mut HashMap<TextureId, NullTexture>,
    pub(crate) samplers: &'a HashMap<SamplerId, NullSampler>,
    pub(crate) pipelines: &'a HashMap<PipelineStateId, NullPipeline>,
    pub(crate) render_passes: &'a HashMap<RenderPassId, NullRenderPass>,
    pub(crate) render_targets: &'a HashMap<RenderTargetId, NullRenderTarget>,
    pub(crate) resource_heaps: &'a HashMap<ResourceHeapId, NullResourceHeap>,
    pub(crate) query_heaps: &'a mut HashMap<QueryHeapId, NullQueryHeap>,
    pub(crate) staging: &'a mut NullStaging,
    pub(crate) secondaries: &'a HashMap<CommandBufferId, Arc<CommandStream>>,
    pub(crate) statistics: &'a mut NullStatistics,
}

/// Applies decoded commands to the tables of a null device.
pub(crate) struct NullExecutor<'a> {
    tables: NullTables<'a>,
    limits: &'a RenderingLimits,
    state: ExecutorState,
    started: Instant,
    depth: u32,
}

fn buffer_mut<'b>(
    buffers: &'b mut HashMap<BufferId, NullBuffer>,
    id: BufferId,
) -> Result<&'b mut NullBuffer, ResourceError> {
    buffers.get_mut(&id).ok_or(ResourceError::NotFound)
}

fn texture_mut<'b>(
    textures: &'b mut HashMap<TextureId, NullTexture>,
    id: TextureId,
) -> Result<&'b mut NullTexture, ResourceError> {
    textures.get_mut(&id).ok_or(ResourceError::NotFound)
}

/// Byte range of `size` bytes at `offset`, within `limit`.
fn byte_range(
    offset: u64,
    size: u64,
    limit: u64,
) -> Result<std::ops::Range<usize>, ResourceError> {
    let range = check_range(offset, size, limit)?;
    Ok(range.start as usize..range.end as usize)
}

impl<'a> NullExecutor<'a> {
    pub(crate) fn new(tables: NullTables<'a>, limits: &'a RenderingLimits) -> Self {
        Self {
            tables,
            limits,
            state: ExecutorState::default(),
            started: Instant::now(),
            depth: 0,
        }
    }

    /// Replays a primary stream and checks the state it leaves behind.
    pub(crate) fn run(&mut self, stream: &CommandStream) -> CommandResult {
        self.tables.statistics.submits += 1;
        stream.replay(self)?;
        if self.state.render_target.is_some() {
            return Err(CommandError::InsideRenderPass);
        }
        if !self.state.debug_groups.is_empty() {
            return Err(CommandError::UnbalancedDebugGroup {
                open: self.state.debug_groups.len() as u32,
            });
        }
        Ok(())
    }

    fn buffer(&self, id: BufferId) -> Result<&NullBuffer, ResourceError> {
        self.tables.buffers.get(&id).ok_or(ResourceError::NotFound)
    }

    fn bound_buffer(
        &self,
        id: BufferId,
        flag: BindFlags,
        expected: &'static str,
    ) -> Result<&NullBuffer, CommandError> {
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

    fn require_pipeline(&self, kind: PipelineKind) -> Result<BoundPipeline, CommandError> {
        match self.state.pipeline {
            Some(bound) if bound.kind == kind => Ok(bound),
            _ => Err(CommandError::MissingPipelineState),
        }
    }

    fn render_target(&self) -> Result<&'a NullRenderTarget, CommandError> {
        let targets = self.tables.render_targets;
        let id = self
            .state
            .render_target
            .ok_or(CommandError::OutsideRenderPass)?;
        targets.get(&id).ok_or(CommandError::UnknownRenderTarget(id))
    }

    /// Validates a draw and returns `false` if a render condition skips it.
    fn begin_draw(&mut self) -> Result<bool, CommandError> {
        self.render_target()?;
        self.require_pipeline(PipelineKind::Graphics)?;
        if self.state.skip_draws {
            self.tables.statistics.skipped_draws += 1;
            return Ok(false);
        }
        Ok(true)
    }

    fn count_draw(&mut self, vertices: u64, instances: u64) {
        let total = vertices * instances;
        let state = &self.state;
        log::trace!(
            "NullExecutor: draw {total} vertices ({} vertex buffers, {} viewports, {} scissors, \
             heap {:?}, {} resources, {} uniform blocks, blend {:?}, stencil {:?})",
            state.vertex_buffers.len(),
            state.viewports.len(),
            state.scissors.len(),
            state.resource_heap,
            state.resources.len(),
            state.uniforms.len(),
            state.blend_factor.to_array(),
            state.stencil_reference
        );
        let stats = &mut *self.tables.statistics;
        stats.draw_calls += 1;
        stats.vertices += total;
        if !self.state.stream_output.is_empty() {
            self.state.stream_output_vertices += total;
        }
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

    fn clear_attachment(
        &mut self,
        attachment: AttachmentRef,
        flags: ClearFlags,
        value: &ClearValue,
    ) -> CommandResult {
        texture_mut(self.tables.textures, attachment.texture)?.clear_layer(
            attachment.mip_level,
            attachment.array_layer,
            flags,
            value,
        )?;
        Ok(())
    }

    fn query_counter(&self, ty: QueryType) -> u64 {
        let stats = &*self.tables.statistics;
        match ty {
            QueryType::SamplesPassed | QueryType::AnySamplesPassed => stats.vertices,
            QueryType::PipelineStatistics => stats.vertices,
            QueryType::StreamOutPrimitivesWritten => {
                let topology = self
                    .state
                    .pipeline
                    .and_then(|bound| self.tables.pipelines.get(&bound.id))
                    .map(|pipeline| pipeline.topology)
                    .unwrap_or_default();
                num_primitives(topology, self.state.stream_output_vertices)
            }
            QueryType::TimeElapsed => self.started.elapsed().as_nanos() as u64,
        }
    }

    fn query_heap(&mut self, heap: QueryHeapId, query: u32) -> Result<&mut NullQueryHeap, ResourceError> {
        let heap = self
            .tables
            .query_heaps
            .get_mut(&heap)
            .ok_or(ResourceError::NotFound)?;
        check_range(u64::from(query), 1, heap.results.len() as u64)?;
        Ok(heap)
    }

    /// Packs the texels a buffer-texture copy touches, honoring row and layer strides.
    fn texel_layout(
        texture: &NullTexture,
        region: &TextureRegion,
        row_stride: u32,
        layer_stride: u32,
    ) -> Result<(u64, u64, u64, u64), ResourceError> {
        let bpp = u64::from(texture.format().bytes_per_pixel());
        let tight_row = u64::from(region.extent.width) * bpp;
        let row_stride = if row_stride == 0 {
            tight_row
        } else {
            u64::from(row_stride)
        };
        if row_stride < tight_row {
            return Err(ResourceError::InvalidAccess(format!(
                "row stride {row_stride} is smaller than a row of {tight_row} bytes"
            )));
        }
        let slice_size = row_stride * u64::from(region.extent.height);
        let layer_stride = if layer_stride == 0 {
            slice_size
        } else {
            u64::from(layer_stride)
        };
        if layer_stride < slice_size {
            return Err(ResourceError::InvalidAccess(format!(
                "layer stride {layer_stride} is smaller than a slice of {slice_size} bytes"
            )));
        }
        let slices = u64::from(region.extent.depth)
            * u64::from(region.subresource.num_array_layers.max(1));
        Ok((tight_row, row_stride, layer_stride, slices))
    }
}

impl CommandRecorder for NullExecutor<'_> {
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
        let NullStaging { pool, transfer } = &mut *self.tables.staging;
        let buffer = buffer_mut(self.tables.buffers, dst)?;
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
        let src_buffer = self.buffer(src)?;
        let src_range = byte_range(src_offset, size, src_buffer.size())?;
        if dst == src {
            let dst_range = byte_range(dst_offset, size, src_buffer.size())?;
            let buffer = buffer_mut(self.tables.buffers, dst)?;
            buffer.data.copy_within(src_range, dst_range.start);
            return Ok(());
        }
        let bytes = src_buffer.data[src_range].to_vec();
        let dst_buffer = buffer_mut(self.tables.buffers, dst)?;
        let dst_range = byte_range(dst_offset, size, dst_buffer.size())?;
        dst_buffer.data[dst_range].copy_from_slice(&bytes);
        Ok(())
    }

    fn fill_buffer(
        &mut self,
        dst: BufferId,
        dst_offset: u64,
        value: u32,
        size: u64,
    ) -> CommandResult {
        let buffer = buffer_mut(self.tables.buffers, dst)?;
        let size = resolve_size(dst_offset, size, buffer.size());
        if dst_offset % 4 != 0 || size % 4 != 0 {
            return Err(ResourceError::InvalidAccess(format!(
                "fill of {size} bytes at offset {dst_offset} is not 4-byte aligned"
            ))
            .into());
        }
        let range = byte_range(dst_offset, size, buffer.size())?;
        let pattern = value.to_le_bytes();
        for word in buffer.data[range].chunks_exact_mut(4) {
            word.copy_from_slice(&pattern);
        }
        Ok(())
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
        let src_texture = texture_mut(self.tables.textures, src)?;
        let src_format = src_texture.format();
        let texels = src_texture.read_region(&region(src_location))?;
        let dst_texture = texture_mut(self.tables.textures, dst)?;
        if dst_texture.format().bytes_per_pixel() != src_format.bytes_per_pixel() {
            return Err(ResourceError::UnsupportedFormat(dst_texture.format()).into());
        }
        dst_texture.write_region(&region(dst_location), &texels)?;
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
        let texture = texture_mut(self.tables.textures, dst)?;
        let (tight_row, row_stride, layer_stride, slices) =
            Self::texel_layout(texture, dst_region, row_stride, layer_stride)?;
        let buffer = self
            .tables
            .buffers
            .get(&src)
            .ok_or(ResourceError::NotFound)?;

        let mut texels = Vec::with_capacity(texture.region_size(dst_region) as usize);
        for slice in 0..slices {
            for row in 0..u64::from(dst_region.extent.height) {
                let offset = src_offset + slice * layer_stride + row * row_stride;
                let range = byte_range(offset, tight_row, buffer.size())?;
                texels.extend_from_slice(&buffer.data[range]);
            }
        }
        texture.write_region(dst_region, &texels)?;
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
        let texture = texture_mut(self.tables.textures, src)?;
        let (tight_row, row_stride, layer_stride, slices) =
            Self::texel_layout(texture, src_region, row_stride, layer_stride)?;
        let texels = texture.read_region(src_region)?;
        let buffer = buffer_mut(self.tables.buffers, dst)?;

        let mut rows = texels.chunks_exact(tight_row.max(1) as usize);
        for slice in 0..slices {
            for row in 0..u64::from(src_region.extent.height) {
                let offset = dst_offset + slice * layer_stride + row * row_stride;
                let range = byte_range(offset, tight_row, buffer.size())?;
                if let Some(bytes) = rows.next() {
                    buffer.data[range].copy_from_slice(bytes);
                }
            }
        }
        Ok(())
    }

    fn generate_mips(
        &mut self,
        texture: TextureId,
        subresource: Option<TextureSubresource>,
    ) -> CommandResult {
        let texture = texture_mut(self.tables.textures, texture)?;
        let (levels, layers) = match subresource {
            Some(sub) => (
                sub.base_mip_level..sub.base_mip_level + sub.num_mip_levels,
                sub.base_array_layer..sub.base_array_layer + sub.num_array_layers.max(1),
            ),
            None => (0..texture.num_levels(), 0..texture.descriptor.layers()),
        };
        if layers.end > texture.descriptor.layers() {
            return Err(ResourceError::OutOfBounds {
                offset: u64::from(layers.start),
                size: u64::from(layers.end - layers.start),
                limit: u64::from(texture.descriptor.layers()),
            }
            .into());
        }
        texture.generate_mips(levels, layers)?;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: &Viewport) -> CommandResult {
        self.set_viewports(std::slice::from_ref(viewport))
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) -> CommandResult {
        check_range(0, viewports.len() as u64, u64::from(self.limits.max_viewports))?;
        self.state.viewports = viewports.to_vec();
        Ok(())
    }

    fn set_scissor(&mut self, scissor: &Scissor) -> CommandResult {
        self.set_scissors(std::slice::from_ref(scissor))
    }

    fn set_scissors(&mut self, scissors: &[Scissor]) -> CommandResult {
        check_range(0, scissors.len() as u64, u64::from(self.limits.max_viewports))?;
        self.state.scissors = scissors.to_vec();
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
            .num_descriptor_sets();
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
        let targets = self.tables.render_targets;
        let target = targets
            .get(&render_target)
            .ok_or(CommandError::UnknownRenderTarget(render_target))?;
        self.state.render_target = Some(render_target);
        self.tables.statistics.render_passes += 1;

        let Some(pass_id) = render_pass.or(target.render_pass) else {
            return Ok(());
        };
        let passes = self.tables.render_passes;
        let pass = passes.get(&pass_id).ok_or(ResourceError::Pipeline(
            PipelineError::RenderPassNotFound(pass_id),
        ))?;

        let mut values = clear_values.iter();
        for (attachment, format) in target.colors.iter().zip(&pass.colors) {
            if format.load_op == AttachmentLoadOp::Clear {
                let value = values.next().copied().unwrap_or_default();
                self.clear_attachment(*attachment, ClearFlags::COLOR, &value)?;
                self.tables.statistics.clears += 1;
            }
        }
        if let (Some(attachment), Some(format)) = (target.depth_stencil, pass.depth_stencil) {
            if format.load_op == AttachmentLoadOp::Clear {
                let value = values.next().copied().unwrap_or_default();
                self.clear_attachment(attachment, ClearFlags::DEPTH_STENCIL, &value)?;
                self.tables.statistics.clears += 1;
            }
        }
        Ok(())
    }

    fn end_render_pass(&mut self) -> CommandResult {
        self.render_target()?;
        self.state.render_target = None;
        Ok(())
    }

    fn clear(&mut self, flags: ClearFlags, value: &ClearValue) -> CommandResult {
        let target = self.render_target()?;
        if flags.contains(ClearFlags::COLOR) {
            for attachment in &target.colors {
                self.clear_attachment(*attachment, ClearFlags::COLOR, value)?;
            }
        }
        if flags.intersects(ClearFlags::DEPTH_STENCIL) {
            if let Some(attachment) = target.depth_stencil {
                self.clear_attachment(attachment, flags.without(ClearFlags::COLOR), value)?;
            }
        }
        self.tables.statistics.clears += 1;
        Ok(())
    }

    fn clear_attachments(&mut self, attachments: &[AttachmentClear]) -> CommandResult {
        let target = self.render_target()?;
        for clear in attachments {
            if clear.flags.contains(ClearFlags::COLOR) {
                let attachment = target
                    .colors
                    .get(clear.color_attachment as usize)
                    .ok_or(ResourceError::OutOfBounds {
                        offset: u64::from(clear.color_attachment),
                        size: 1,
                        limit: target.colors.len() as u64,
                    })?;
                self.clear_attachment(*attachment, ClearFlags::COLOR, &clear.value)?;
            } else if let Some(attachment) = target.depth_stencil {
                self.clear_attachment(attachment, clear.flags, &clear.value)?;
            }
        }
        self.tables.statistics.clears += 1;
        Ok(())
    }

    fn set_pipeline_state(&mut self, pipeline: PipelineStateId) -> CommandResult {
        let state = self
            .tables
            .pipelines
            .get(&pipeline)
            .ok_or(ResourceError::Pipeline(PipelineError::NotFound(pipeline)))?;
        self.state.pipeline = Some(BoundPipeline {
            id: pipeline,
            kind: state.kind,
        });
        Ok(())
    }

    fn set_blend_factor(&mut self, color: &ColorRgba) -> CommandResult {
        self.state.blend_factor = *color;
        Ok(())
    }

    fn set_stencil_reference(&mut self, reference: u32, face: StencilFace) -> CommandResult {
        match face {
            StencilFace::FrontAndBack => self.state.stencil_reference = [reference; 2],
            StencilFace::Front => self.state.stencil_reference[0] = reference,
            StencilFace::Back => self.state.stencil_reference[1] = reference,
        }
        Ok(())
    }

    fn set_uniforms(&mut self, first: u32, data: &[u8]) -> CommandResult {
        let bound = self
            .state
            .pipeline
            .ok_or(CommandError::MissingPipelineState)?;
        if let Some(pipeline) = self.tables.pipelines.get(&bound.id) {
            log::trace!(
                "NullExecutor: {} uniform bytes at location {first} for {:?}",
                data.len(),
                pipeline.program
            );
        }
        self.state.uniforms.insert(first, data.to_vec());
        Ok(())
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
        let passed = (result != 0) != mode.is_inverted();
        self.state.skip_draws = !passed;
        Ok(())
    }

    fn end_render_condition(&mut self) -> CommandResult {
        self.state.skip_draws = false;
        Ok(())
    }

    fn begin_stream_output(&mut self, buffers: &[BufferId]) -> CommandResult {
        for buffer in buffers {
            self.bound_buffer(*buffer, BindFlags::STREAM_OUTPUT_BUFFER, "stream-output buffer")?;
        }
        self.state.stream_output = buffers.to_vec();
        self.state.stream_output_vertices = 0;
        Ok(())
    }

    fn end_stream_output(&mut self) -> CommandResult {
        let vertices = self.state.stream_output_vertices;
        for id in std::mem::take(&mut self.state.stream_output) {
            let buffer = buffer_mut(self.tables.buffers, id)?;
            let written = (vertices * u64::from(buffer.descriptor.vertex_stride()))
                .min(buffer.size()) as u32;
            let counter = byte_range(
                buffer.descriptor.xfb_counter_offset(),
                4,
                buffer.data.len() as u64,
            )?;
            buffer.data[counter].copy_from_slice(&written.to_le_bytes());
        }
        Ok(())
    }

    fn draw(&mut self, num_vertices: u32, first_vertex: u32) -> CommandResult {
        self.draw_instanced(num_vertices, first_vertex, 1, 0)
    }

    fn draw_instanced(
        &mut self,
        num_vertices: u32,
        _first_vertex: u32,
        num_instances: u32,
        _first_instance: u32,
    ) -> CommandResult {
        if self.begin_draw()? {
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
        _vertex_offset: i32,
        _first_instance: u32,
    ) -> CommandResult {
        self.check_indices(first_index, num_indices)?;
        if self.begin_draw()? {
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
        let size = std::mem::size_of::<DrawIndirectArguments>() as u64;
        let mut draws = Vec::with_capacity(num_commands as usize);
        {
            let args = self.bound_buffer(buffer, BindFlags::INDIRECT_BUFFER, "indirect buffer")?;
            for i in 0..u64::from(num_commands) {
                let range = byte_range(offset + i * u64::from(stride), size, args.size())?;
                draws.push(bytemuck::pod_read_unaligned::<DrawIndirectArguments>(
                    &args.data[range],
                ));
            }
        }
        for draw in draws {
            self.draw_instanced(
                draw.num_vertices,
                draw.first_vertex,
                draw.num_instances,
                draw.first_instance,
            )?;
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
        let size = std::mem::size_of::<DrawIndexedIndirectArguments>() as u64;
        let mut draws = Vec::with_capacity(num_commands as usize);
        {
            let args = self.bound_buffer(buffer, BindFlags::INDIRECT_BUFFER, "indirect buffer")?;
            for i in 0..u64::from(num_commands) {
                let range = byte_range(offset + i * u64::from(stride), size, args.size())?;
                draws.push(bytemuck::pod_read_unaligned::<DrawIndexedIndirectArguments>(
                    &args.data[range],
                ));
            }
        }
        for draw in draws {
            self.draw_indexed_instanced(
                draw.num_indices,
                draw.num_instances,
                draw.first_index,
                draw.vertex_offset,
                draw.first_instance,
            )?;
        }
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> CommandResult {
        self.require_pipeline(PipelineKind::Compute)?;
        for (count, limit) in [x, y, z].into_iter().zip(self.limits.max_compute_work_groups) {
            check_range(0, u64::from(count), u64::from(limit))?;
        }
        let stats = &mut *self.tables.statistics;
        stats.dispatches += 1;
        stats.work_groups += u64::from(x) * u64::from(y) * u64::from(z);
        Ok(())
    }

    fn dispatch_indirect(&mut self, buffer: BufferId, offset: u64) -> CommandResult {
        let size = std::mem::size_of::<DispatchIndirectArguments>() as u64;
        let args = {
            let args = self.bound_buffer(buffer, BindFlags::INDIRECT_BUFFER, "indirect buffer")?;
            let range = byte_range(offset, size, args.size())?;
            bytemuck::pod_read_unaligned::<DispatchIndirectArguments>(&args.data[range])
        };
        self.dispatch(args.x, args.y, args.z)
    }

    fn push_debug_group(&mut self, name: &str) -> CommandResult {
        log::trace!("NullExecutor: push debug group '{name}'");
        self.state.debug_groups.push(name.to_string());
        Ok(())
    }

    fn pop_debug_group(&mut self) -> CommandResult {
        match self.state.debug_groups.pop() {
            Some(name) => {
                log::trace!("NullExecutor: pop debug group '{name}'");
                Ok(())
            }
            None => Err(CommandError::UnbalancedDebugGroup { open: 0 }),
        }
    }
}
