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

//! The command-recording interface shared by every command buffer.

use crate::math::{ColorRgba, Extent3D};
use crate::renderer::api::{
    AttachmentClear, BufferId, ClearFlags, ClearValue, CommandBufferId, IndexFormat,
    PipelineStateId, QueryHeapId, RenderConditionMode, RenderPassId, RenderTargetId,
    ResourceBinding, ResourceHeapId, ResourceSlotRange, Scissor, StencilFace, TextureId,
    TextureLocation, TextureRegion, TextureSubresource, Viewport,
};
use crate::renderer::error::CommandError;

/// Result of recording or executing a single command.
pub type CommandResult = Result<(), CommandError>;

/// Records GPU commands.
///
/// Command buffers implement this trait to encode commands into a stream;
/// backends implement it a second time to execute a decoded stream. Both sides
/// therefore agree on a single vocabulary, and
/// [`CommandStream::replay`](crate::renderer::command::CommandStream::replay)
/// connects them.
pub trait CommandRecorder {
    /* --- Secondary buffers --- */

    /// Executes a finished secondary command buffer.
    fn execute(&mut self, command_buffer: CommandBufferId) -> CommandResult;

    /* --- Buffers --- */

    /// Writes `data` into `dst` at `dst_offset`. The data is copied into the stream.
    fn update_buffer(&mut self, dst: BufferId, dst_offset: u64, data: &[u8]) -> CommandResult;

    /// Copies `size` bytes between two buffers.
    fn copy_buffer(
        &mut self,
        dst: BufferId,
        dst_offset: u64,
        src: BufferId,
        src_offset: u64,
        size: u64,
    ) -> CommandResult;

    /// Fills `size` bytes of `dst` with a repeated 32-bit value.
    /// [`WHOLE_SIZE`](crate::renderer::api::WHOLE_SIZE) fills up to the end of the buffer.
    fn fill_buffer(&mut self, dst: BufferId, dst_offset: u64, value: u32, size: u64)
        -> CommandResult;

    /* --- Textures --- */

    /// Copies a box of texels between two textures.
    fn copy_texture(
        &mut self,
        dst: TextureId,
        dst_location: &TextureLocation,
        src: TextureId,
        src_location: &TextureLocation,
        extent: Extent3D,
    ) -> CommandResult;

    /// Copies buffer data into a texture region.
    ///
    /// A stride of zero means tightly packed rows or layers.
    fn copy_texture_from_buffer(
        &mut self,
        dst: TextureId,
        dst_region: &TextureRegion,
        src: BufferId,
        src_offset: u64,
        row_stride: u32,
        layer_stride: u32,
    ) -> CommandResult;

    /// Copies a texture region into a buffer.
    fn copy_buffer_from_texture(
        &mut self,
        dst: BufferId,
        dst_offset: u64,
        src: TextureId,
        src_region: &TextureRegion,
        row_stride: u32,
        layer_stride: u32,
    ) -> CommandResult;

    /// Generates mip levels, either for the whole texture or for a subresource range.
    fn generate_mips(
        &mut self,
        texture: TextureId,
        subresource: Option<TextureSubresource>,
    ) -> CommandResult;

    /* --- Viewports and scissors --- */

    /// Sets viewport 0.
    fn set_viewport(&mut self, viewport: &Viewport) -> CommandResult;

    /// Sets consecutive viewports starting at 0.
    fn set_viewports(&mut self, viewports: &[Viewport]) -> CommandResult;

    /// Sets scissor 0.
    fn set_scissor(&mut self, scissor: &Scissor) -> CommandResult;

    /// Sets consecutive scissors starting at 0.
    fn set_scissors(&mut self, scissors: &[Scissor]) -> CommandResult;

    /* --- Input assembly --- */

    /// Binds a vertex buffer to slot 0.
    fn set_vertex_buffer(&mut self, buffer: BufferId) -> CommandResult;

    /// Binds vertex buffers to consecutive slots.
    fn set_vertex_buffers(&mut self, buffers: &[BufferId]) -> CommandResult;

    /// Binds the index buffer.
    fn set_index_buffer(&mut self, buffer: BufferId, format: IndexFormat, offset: u64)
        -> CommandResult;

    /* --- Resources --- */

    /// Binds one descriptor set of a resource heap.
    fn set_resource_heap(&mut self, heap: ResourceHeapId, descriptor_set: u32) -> CommandResult;

    /// Binds a single resource to a descriptor of the current pipeline layout.
    fn set_resource(&mut self, descriptor: u32, resource: ResourceBinding) -> CommandResult;

    /// Unbinds a range of resource slots.
    fn reset_resource_slots(&mut self, range: &ResourceSlotRange) -> CommandResult;

    /* --- Render passes --- */

    /// Begins rendering into `render_target`.
    fn begin_render_pass(
        &mut self,
        render_target: RenderTargetId,
        render_pass: Option<RenderPassId>,
        clear_values: &[ClearValue],
    ) -> CommandResult;

    /// Ends the current render pass.
    fn end_render_pass(&mut self) -> CommandResult;

    /// Clears the attachments of the current render target.
    fn clear(&mut self, flags: ClearFlags, value: &ClearValue) -> CommandResult;

    /// Clears individual attachments of the current render target.
    fn clear_attachments(&mut self, attachments: &[AttachmentClear]) -> CommandResult;

    /* --- Pipeline states --- */

    /// Binds a graphics or compute pipeline state.
    fn set_pipeline_state(&mut self, pipeline: PipelineStateId) -> CommandResult;

    /// Sets the dynamic blend factor.
    fn set_blend_factor(&mut self, color: &ColorRgba) -> CommandResult;

    /// Sets the dynamic stencil reference value.
    fn set_stencil_reference(&mut self, reference: u32, face: StencilFace) -> CommandResult;

    /// Writes uniform data starting at uniform location `first`.
    fn set_uniforms(&mut self, first: u32, data: &[u8]) -> CommandResult;

    /* --- Queries --- */

    /// Begins query `query` of `heap`.
    fn begin_query(&mut self, heap: QueryHeapId, query: u32) -> CommandResult;

    /// Ends query `query` of `heap`.
    fn end_query(&mut self, heap: QueryHeapId, query: u32) -> CommandResult;

    /// Makes following draws conditional on an occlusion query result.
    fn begin_render_condition(
        &mut self,
        heap: QueryHeapId,
        query: u32,
        mode: RenderConditionMode,
    ) -> CommandResult;

    /// Ends conditional rendering.
    fn end_render_condition(&mut self) -> CommandResult;

    /* --- Stream output --- */

    /// Begins capturing vertex output into `buffers`.
    fn begin_stream_output(&mut self, buffers: &[BufferId]) -> CommandResult;

    /// Ends stream output.
    fn end_stream_output(&mut self) -> CommandResult;

    /* --- Drawing --- */

    /// Draws `num_vertices` starting at `first_vertex`.
    fn draw(&mut self, num_vertices: u32, first_vertex: u32) -> CommandResult;

    /// Draws several instances.
    fn draw_instanced(
        &mut self,
        num_vertices: u32,
        first_vertex: u32,
        num_instances: u32,
        first_instance: u32,
    ) -> CommandResult;

    /// Draws indexed primitives.
    fn draw_indexed(&mut self, num_indices: u32, first_index: u32, vertex_offset: i32)
        -> CommandResult;

    /// Draws several instances of indexed primitives.
    fn draw_indexed_instanced(
        &mut self,
        num_indices: u32,
        num_instances: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> CommandResult;

    /// Draws with arguments read from `buffer`
    /// ([`DrawIndirectArguments`](crate::renderer::api::DrawIndirectArguments)).
    fn draw_indirect(
        &mut self,
        buffer: BufferId,
        offset: u64,
        num_commands: u32,
        stride: u32,
    ) -> CommandResult;

    /// Draws indexed primitives with arguments read from `buffer`.
    fn draw_indexed_indirect(
        &mut self,
        buffer: BufferId,
        offset: u64,
        num_commands: u32,
        stride: u32,
    ) -> CommandResult;

    /* --- Compute --- */

    /// Dispatches compute work groups.
    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> CommandResult;

    /// Dispatches compute work with arguments read from `buffer`.
    fn dispatch_indirect(&mut self, buffer: BufferId, offset: u64) -> CommandResult;

    /* --- Debugging --- */

    /// Opens a named debug group.
    fn push_debug_group(&mut self, name: &str) -> CommandResult;

    /// Closes the innermost debug group.
    fn pop_debug_group(&mut self) -> CommandResult;
}
