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

//! A command buffer that records into a [`CommandStream`] for later replay.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::opcode::Opcode;
use super::record::*;
use super::stream::CommandStream;
use crate::math::{ColorRgba, Extent3D};
use crate::renderer::api::handle::encode_optional;
use crate::renderer::api::{
    AttachmentClear, BufferId, ClearFlags, ClearValue, CommandBufferDescriptor, CommandBufferFlags,
    CommandBufferId, IndexFormat, PipelineStateId, QueryHeapId, RenderConditionMode, RenderPassId,
    RenderTargetId, ResourceBinding, ResourceHeapId, ResourceSlotRange, Scissor, StencilFace,
    TextureId, TextureLocation, TextureRegion, TextureSubresource, Viewport,
};
use crate::renderer::error::CommandError;
use crate::renderer::traits::{CommandBuffer, CommandRecorder, CommandResult};

/// Receives command buffers when their recording ends.
///
/// Backends use this to publish secondary buffers for `execute` lookups and to
/// submit buffers created with [`CommandBufferFlags::IMMEDIATE_SUBMIT`].
pub trait CommandBufferHost: Send + Sync {
    /// Called by [`DeferredCommandBuffer::end`] once the buffer left the recording state.
    fn finish_recording(&self, buffer: &mut DeferredCommandBuffer) -> CommandResult;

    /// Called when a secondary buffer is dropped; its published stream must be forgotten.
    fn release(&self, id: CommandBufferId);
}

/// Records commands into a byte stream and validates the recording state machine.
///
/// The stream is only interpreted when a [`CommandQueue`](crate::renderer::traits::CommandQueue)
/// replays it, so the same buffer type serves every backend.
pub struct DeferredCommandBuffer {
    id: CommandBufferId,
    flags: CommandBufferFlags,
    owner: u64,
    stream: CommandStream,
    recording: bool,
    in_render_pass: bool,
    debug_depth: u32,
    host: Option<Arc<dyn CommandBufferHost>>,
}

impl DeferredCommandBuffer {
    /// Creates an idle command buffer owned by the render system instance `owner`.
    pub fn new(id: CommandBufferId, descriptor: &CommandBufferDescriptor, owner: u64) -> Self {
        Self {
            id,
            flags: descriptor.flags,
            owner,
            stream: CommandStream::with_capacity(descriptor.min_staging_pool_size as usize),
            recording: false,
            in_render_pass: false,
            debug_depth: 0,
            host: None,
        }
    }

    /// Attaches the backend that is notified when recording ends.
    pub fn with_host(mut self, host: Arc<dyn CommandBufferHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Identifier of the render system instance that created the buffer.
    pub fn owner(&self) -> u64 {
        self.owner
    }

    /// The recorded commands.
    pub fn stream(&self) -> &CommandStream {
        &self.stream
    }

    /// Drops the recorded commands.
    pub fn clear_stream(&mut self) {
        self.stream.clear();
    }

    /// Returns `true` for buffers created with [`CommandBufferFlags::SECONDARY`].
    pub fn is_secondary(&self) -> bool {
        self.flags.contains(CommandBufferFlags::SECONDARY)
    }

    /// Returns `true` while a render pass is open.
    pub fn is_inside_render_pass(&self) -> bool {
        self.in_render_pass
    }

    fn recording(&self) -> CommandResult {
        if self.recording {
            Ok(())
        } else {
            Err(CommandError::NotRecording)
        }
    }

    fn outside_pass(&self) -> CommandResult {
        self.recording()?;
        if self.in_render_pass {
            Err(CommandError::InsideRenderPass)
        } else {
            Ok(())
        }
    }

    fn inside_pass(&self) -> CommandResult {
        self.recording()?;
        if self.in_render_pass {
            Ok(())
        } else {
            Err(CommandError::OutsideRenderPass)
        }
    }
}

impl fmt::Debug for DeferredCommandBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredCommandBuffer")
            .field("id", &self.id)
            .field("flags", &self.flags)
            .field("stream", &self.stream)
            .field("recording", &self.recording)
            .finish()
    }
}

impl Drop for DeferredCommandBuffer {
    fn drop(&mut self) {
        if !self.is_secondary() {
            return;
        }
        if let Some(host) = self.host.take() {
            host.release(self.id);
        }
    }
}

impl CommandBuffer for DeferredCommandBuffer {
    fn id(&self) -> CommandBufferId {
        self.id
    }

    fn flags(&self) -> CommandBufferFlags {
        self.flags
    }

    fn begin(&mut self) -> CommandResult {
        if self.recording {
            return Err(CommandError::AlreadyRecording);
        }
        self.stream.clear();
        self.in_render_pass = false;
        self.debug_depth = 0;
        self.recording = true;
        Ok(())
    }

    fn end(&mut self) -> CommandResult {
        self.recording()?;
        if self.in_render_pass {
            return Err(CommandError::InsideRenderPass);
        }
        if self.debug_depth > 0 {
            return Err(CommandError::UnbalancedDebugGroup {
                open: self.debug_depth,
            });
        }
        self.recording = false;
        log::trace!(
            "Command buffer {:?} recorded {} commands ({} bytes)",
            self.id,
            self.stream.num_commands(),
            self.stream.len()
        );
        if let Some(host) = self.host.clone() {
            host.finish_recording(self)?;
        }
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl CommandRecorder for DeferredCommandBuffer {
    fn execute(&mut self, command_buffer: CommandBufferId) -> CommandResult {
        self.recording()?;
        if command_buffer == self.id {
            return Err(CommandError::UnknownCommandBuffer(command_buffer));
        }
        self.stream.push(
            Opcode::Execute,
            &ExecuteRecord {
                command_buffer: command_buffer.raw(),
            },
        );
        Ok(())
    }

    fn update_buffer(&mut self, dst: BufferId, dst_offset: u64, data: &[u8]) -> CommandResult {
        self.outside_pass()?;
        self.stream.push_with_trailing(
            Opcode::UpdateBuffer,
            &UpdateBufferRecord {
                buffer: dst.raw(),
                offset: dst_offset,
                size: data.len() as u64,
            },
            data,
        );
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
        self.outside_pass()?;
        self.stream.push(
            Opcode::CopyBuffer,
            &CopyBufferRecord {
                dst: dst.raw(),
                dst_offset,
                src: src.raw(),
                src_offset,
                size,
            },
        );
        Ok(())
    }

    fn fill_buffer(
        &mut self,
        dst: BufferId,
        dst_offset: u64,
        value: u32,
        size: u64,
    ) -> CommandResult {
        self.outside_pass()?;
        self.stream.push(
            Opcode::FillBuffer,
            &FillBufferRecord {
                buffer: dst.raw(),
                offset: dst_offset,
                size,
                value,
                _pad: 0,
            },
        );
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
        self.outside_pass()?;
        self.stream.push(
            Opcode::CopyTexture,
            &CopyTextureRecord {
                dst: dst.raw(),
                src: src.raw(),
                dst_location: dst_location.into(),
                src_location: src_location.into(),
                extent: extent_to_array(extent),
                _pad: 0,
            },
        );
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
        self.outside_pass()?;
        self.stream.push(
            Opcode::CopyTextureFromBuffer,
            &TextureBufferCopyRecord {
                texture: dst.raw(),
                buffer: src.raw(),
                buffer_offset: src_offset,
                row_stride,
                layer_stride,
                region: dst_region.into(),
            },
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
        self.outside_pass()?;
        self.stream.push(
            Opcode::CopyBufferFromTexture,
            &TextureBufferCopyRecord {
                texture: src.raw(),
                buffer: dst.raw(),
                buffer_offset: dst_offset,
                row_stride,
                layer_stride,
                region: src_region.into(),
            },
        );
        Ok(())
    }

    fn generate_mips(
        &mut self,
        texture: TextureId,
        subresource: Option<TextureSubresource>,
    ) -> CommandResult {
        self.outside_pass()?;
        match subresource {
            None => self.stream.push(
                Opcode::GenerateMips,
                &TextureRecord {
                    texture: texture.raw(),
                },
            ),
            Some(range) => self.stream.push(
                Opcode::GenerateMipsRange,
                &GenerateMipsRangeRecord {
                    texture: texture.raw(),
                    base_mip_level: range.base_mip_level,
                    num_mip_levels: range.num_mip_levels,
                    base_array_layer: range.base_array_layer,
                    num_array_layers: range.num_array_layers,
                },
            ),
        }
        Ok(())
    }

    fn set_viewport(&mut self, viewport: &Viewport) -> CommandResult {
        self.recording()?;
        self.stream.push(Opcode::SetViewport, viewport);
        Ok(())
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) -> CommandResult {
        self.recording()?;
        self.stream.push_with_trailing(
            Opcode::SetViewportArray,
            &ArrayRecord {
                count: viewports.len() as u32,
            },
            bytemuck::cast_slice(viewports),
        );
        Ok(())
    }

    fn set_scissor(&mut self, scissor: &Scissor) -> CommandResult {
        self.recording()?;
        self.stream.push(Opcode::SetScissor, scissor);
        Ok(())
    }

    fn set_scissors(&mut self, scissors: &[Scissor]) -> CommandResult {
        self.recording()?;
        self.stream.push_with_trailing(
            Opcode::SetScissorArray,
            &ArrayRecord {
                count: scissors.len() as u32,
            },
            bytemuck::cast_slice(scissors),
        );
        Ok(())
    }

    fn set_vertex_buffer(&mut self, buffer: BufferId) -> CommandResult {
        self.recording()?;
        self.stream.push(
            Opcode::SetVertexBuffer,
            &BufferBindRecord {
                buffer: buffer.raw(),
            },
        );
        Ok(())
    }

    fn set_vertex_buffers(&mut self, buffers: &[BufferId]) -> CommandResult {
        self.recording()?;
        let raw: Vec<u64> = buffers.iter().map(|id| id.raw()).collect();
        self.stream.push_with_trailing(
            Opcode::SetVertexBufferArray,
            &ArrayRecord {
                count: raw.len() as u32,
            },
            bytemuck::cast_slice(&raw),
        );
        Ok(())
    }

    fn set_index_buffer(
        &mut self,
        buffer: BufferId,
        format: IndexFormat,
        offset: u64,
    ) -> CommandResult {
        self.recording()?;
        self.stream.push(
            Opcode::SetIndexBuffer,
            &IndexBufferRecord {
                buffer: buffer.raw(),
                offset,
                format: format as u32,
                _pad: 0,
            },
        );
        Ok(())
    }

    fn set_resource_heap(&mut self, heap: ResourceHeapId, descriptor_set: u32) -> CommandResult {
        self.recording()?;
        self.stream.push(
            Opcode::SetResourceHeap,
            &ResourceHeapRecord {
                heap: heap.raw(),
                descriptor_set,
                _pad: 0,
            },
        );
        Ok(())
    }

    fn set_resource(&mut self, descriptor: u32, resource: ResourceBinding) -> CommandResult {
        self.recording()?;
        self.stream.push(
            Opcode::SetResource,
            &ResourceRecord {
                resource: resource.raw(),
                descriptor,
                kind: resource.kind(),
            },
        );
        Ok(())
    }

    fn reset_resource_slots(&mut self, range: &ResourceSlotRange) -> CommandResult {
        self.recording()?;
        if range.num_slots == 0 {
            return Ok(());
        }
        self.stream.push(
            Opcode::ResetResourceSlots,
            &ResetSlotsRecord {
                kind: range.kind as u32,
                first_slot: range.first_slot,
                num_slots: range.num_slots,
                bind_flags: range.bind_flags.bits(),
                stages: range.stages.bits(),
            },
        );
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_target: RenderTargetId,
        render_pass: Option<RenderPassId>,
        clear_values: &[ClearValue],
    ) -> CommandResult {
        self.outside_pass()?;
        self.stream.push_with_trailing(
            Opcode::BeginRenderPass,
            &BeginRenderPassRecord {
                render_target: render_target.raw(),
                render_pass: encode_optional(render_pass.map(RenderPassId::raw)),
                num_clear_values: clear_values.len() as u32,
                _pad: 0,
            },
            bytemuck::cast_slice(clear_values),
        );
        self.in_render_pass = true;
        Ok(())
    }

    fn end_render_pass(&mut self) -> CommandResult {
        self.inside_pass()?;
        self.stream.push_opcode(Opcode::EndRenderPass);
        self.in_render_pass = false;
        Ok(())
    }

    fn clear(&mut self, flags: ClearFlags, value: &ClearValue) -> CommandResult {
        self.inside_pass()?;
        self.stream.push(
            Opcode::Clear,
            &ClearRecord {
                flags: flags.bits(),
                value: *value,
            },
        );
        Ok(())
    }

    fn clear_attachments(&mut self, attachments: &[AttachmentClear]) -> CommandResult {
        self.inside_pass()?;
        let records: Vec<AttachmentClearRecord> = attachments
            .iter()
            .map(|a| AttachmentClearRecord {
                flags: a.flags.bits(),
                color_attachment: a.color_attachment,
                value: a.value,
            })
            .collect();
        self.stream.push_with_trailing(
            Opcode::ClearAttachments,
            &ArrayRecord {
                count: records.len() as u32,
            },
            bytemuck::cast_slice(&records),
        );
        Ok(())
    }

    fn set_pipeline_state(&mut self, pipeline: PipelineStateId) -> CommandResult {
        self.recording()?;
        self.stream.push(
            Opcode::SetPipelineState,
            &PipelineRecord {
                pipeline: pipeline.raw(),
            },
        );
        Ok(())
    }

    fn set_blend_factor(&mut self, color: &ColorRgba) -> CommandResult {
        self.recording()?;
        self.stream.push(Opcode::SetBlendFactor, color);
        Ok(())
    }

    fn set_stencil_reference(&mut self, reference: u32, face: StencilFace) -> CommandResult {
        self.recording()?;
        self.stream.push(
            Opcode::SetStencilReference,
            &StencilReferenceRecord {
                reference,
                face: face as u32,
            },
        );
        Ok(())
    }

    fn set_uniforms(&mut self, first: u32, data: &[u8]) -> CommandResult {
        self.recording()?;
        self.stream.push_with_trailing(
            Opcode::SetUniforms,
            &UniformsRecord {
                first,
                size: data.len() as u32,
            },
            data,
        );
        Ok(())
    }

    fn begin_query(&mut self, heap: QueryHeapId, query: u32) -> CommandResult {
        self.recording()?;
        self.stream.push(
            Opcode::BeginQuery,
            &QueryRecord {
                heap: heap.raw(),
                query,
                _pad: 0,
            },
        );
        Ok(())
    }

    fn end_query(&mut self, heap: QueryHeapId, query: u32) -> CommandResult {
        self.recording()?;
        self.stream.push(
            Opcode::EndQuery,
            &QueryRecord {
                heap: heap.raw(),
                query,
                _pad: 0,
            },
        );
        Ok(())
    }

    fn begin_render_condition(
        &mut self,
        heap: QueryHeapId,
        query: u32,
        mode: RenderConditionMode,
    ) -> CommandResult {
        self.recording()?;
        self.stream.push(
            Opcode::BeginRenderCondition,
            &RenderConditionRecord {
                heap: heap.raw(),
                query,
                mode: mode as u32,
            },
        );
        Ok(())
    }

    fn end_render_condition(&mut self) -> CommandResult {
        self.recording()?;
        self.stream.push_opcode(Opcode::EndRenderCondition);
        Ok(())
    }

    fn begin_stream_output(&mut self, buffers: &[BufferId]) -> CommandResult {
        self.recording()?;
        let raw: Vec<u64> = buffers.iter().map(|id| id.raw()).collect();
        self.stream.push_with_trailing(
            Opcode::BeginStreamOutput,
            &ArrayRecord {
                count: raw.len() as u32,
            },
            bytemuck::cast_slice(&raw),
        );
        Ok(())
    }

    fn end_stream_output(&mut self) -> CommandResult {
        self.recording()?;
        self.stream.push_opcode(Opcode::EndStreamOutput);
        Ok(())
    }

    fn draw(&mut self, num_vertices: u32, first_vertex: u32) -> CommandResult {
        self.inside_pass()?;
        self.stream.push(
            Opcode::Draw,
            &DrawRecord {
                num_vertices,
                first_vertex,
            },
        );
        Ok(())
    }

    fn draw_instanced(
        &mut self,
        num_vertices: u32,
        first_vertex: u32,
        num_instances: u32,
        first_instance: u32,
    ) -> CommandResult {
        self.inside_pass()?;
        self.stream.push(
            Opcode::DrawInstanced,
            &DrawInstancedRecord {
                num_vertices,
                first_vertex,
                num_instances,
                first_instance,
            },
        );
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        num_indices: u32,
        first_index: u32,
        vertex_offset: i32,
    ) -> CommandResult {
        self.inside_pass()?;
        self.stream.push(
            Opcode::DrawIndexed,
            &DrawIndexedRecord {
                num_indices,
                first_index,
                vertex_offset,
            },
        );
        Ok(())
    }

    fn draw_indexed_instanced(
        &mut self,
        num_indices: u32,
        num_instances: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> CommandResult {
        self.inside_pass()?;
        self.stream.push(
            Opcode::DrawIndexedInstanced,
            &DrawIndexedInstancedRecord {
                num_indices,
                num_instances,
                first_index,
                vertex_offset,
                first_instance,
            },
        );
        Ok(())
    }

    fn draw_indirect(
        &mut self,
        buffer: BufferId,
        offset: u64,
        num_commands: u32,
        stride: u32,
    ) -> CommandResult {
        self.inside_pass()?;
        self.stream.push(
            Opcode::DrawIndirect,
            &IndirectRecord {
                buffer: buffer.raw(),
                offset,
                num_commands,
                stride,
            },
        );
        Ok(())
    }

    fn draw_indexed_indirect(
        &mut self,
        buffer: BufferId,
        offset: u64,
        num_commands: u32,
        stride: u32,
    ) -> CommandResult {
        self.inside_pass()?;
        self.stream.push(
            Opcode::DrawIndexedIndirect,
            &IndirectRecord {
                buffer: buffer.raw(),
                offset,
                num_commands,
                stride,
            },
        );
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> CommandResult {
        self.outside_pass()?;
        self.stream.push(Opcode::Dispatch, &DispatchRecord { x, y, z });
        Ok(())
    }

    fn dispatch_indirect(&mut self, buffer: BufferId, offset: u64) -> CommandResult {
        self.outside_pass()?;
        self.stream.push(
            Opcode::DispatchIndirect,
            &DispatchIndirectRecord {
                buffer: buffer.raw(),
                offset,
            },
        );
        Ok(())
    }

    fn push_debug_group(&mut self, name: &str) -> CommandResult {
        self.recording()?;
        self.stream.push_with_trailing(
            Opcode::PushDebugGroup,
            &DebugGroupRecord {
                len: name.len() as u32,
            },
            name.as_bytes(),
        );
        self.debug_depth += 1;
        Ok(())
    }

    fn pop_debug_group(&mut self) -> CommandResult {
        self.recording()?;
        if self.debug_depth == 0 {
            return Err(CommandError::UnbalancedDebugGroup { open: 0 });
        }
        self.stream.push_opcode(Opcode::PopDebugGroup);
        self.debug_depth -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::command::DecodedCommand;
    use std::sync::Mutex;

    fn recording_buffer(flags: CommandBufferFlags) -> DeferredCommandBuffer {
        let descriptor = CommandBufferDescriptor {
            flags,
            ..Default::default()
        };
        let mut buffer = DeferredCommandBuffer::new(CommandBufferId(1), &descriptor, 7);
        buffer.begin().unwrap();
        buffer
    }

    #[test]
    fn test_commands_require_recording() {
        let mut buffer =
            DeferredCommandBuffer::new(CommandBufferId(1), &CommandBufferDescriptor::default(), 0);
        assert_eq!(buffer.dispatch(1, 1, 1), Err(CommandError::NotRecording));
        assert_eq!(buffer.end(), Err(CommandError::NotRecording));
        buffer.begin().unwrap();
        assert_eq!(buffer.begin(), Err(CommandError::AlreadyRecording));
    }

    #[test]
    fn test_render_pass_nesting_rules() {
        let mut buffer = recording_buffer(CommandBufferFlags::EMPTY);
        assert_eq!(buffer.draw(3, 0), Err(CommandError::OutsideRenderPass));
        assert_eq!(buffer.end_render_pass(), Err(CommandError::OutsideRenderPass));

        buffer.begin_render_pass(RenderTargetId(4), None, &[]).unwrap();
        assert_eq!(
            buffer.begin_render_pass(RenderTargetId(4), None, &[]),
            Err(CommandError::InsideRenderPass)
        );
        assert_eq!(buffer.dispatch(1, 1, 1), Err(CommandError::InsideRenderPass));
        assert_eq!(
            buffer.update_buffer(BufferId(2), 0, &[1, 2, 3, 4]),
            Err(CommandError::InsideRenderPass)
        );
        assert_eq!(buffer.end(), Err(CommandError::InsideRenderPass));
        assert!(buffer.is_recording());

        buffer.draw(3, 0).unwrap();
        buffer.end_render_pass().unwrap();
        buffer.end().unwrap();
        assert_eq!(buffer.stream().num_commands(), 3);
    }

    #[test]
    fn test_debug_groups_must_balance() {
        let mut buffer = recording_buffer(CommandBufferFlags::EMPTY);
        assert_eq!(
            buffer.pop_debug_group(),
            Err(CommandError::UnbalancedDebugGroup { open: 0 })
        );
        buffer.push_debug_group("outer").unwrap();
        buffer.push_debug_group("inner").unwrap();
        buffer.pop_debug_group().unwrap();
        assert_eq!(
            buffer.end(),
            Err(CommandError::UnbalancedDebugGroup { open: 1 })
        );
        buffer.pop_debug_group().unwrap();
        buffer.end().unwrap();
    }

    #[test]
    fn test_recorded_stream_decodes_in_order() {
        let mut buffer = recording_buffer(CommandBufferFlags::EMPTY);
        buffer.update_buffer(BufferId(9), 16, &[0xAA; 8]).unwrap();
        buffer
            .set_viewports(&[Viewport::new(0.0, 0.0, 64.0, 32.0), Viewport::new(64.0, 0.0, 64.0, 32.0)])
            .unwrap();
        buffer
            .begin_render_pass(
                RenderTargetId(3),
                Some(RenderPassId(5)),
                &[ClearValue::color(ColorRgba::BLACK)],
            )
            .unwrap();
        buffer
            .clear_attachments(&[AttachmentClear::depth(0.5)])
            .unwrap();
        buffer.draw_indexed(6, 0, -2).unwrap();
        buffer.end_render_pass().unwrap();
        buffer.set_vertex_buffers(&[BufferId(1), BufferId(2)]).unwrap();
        buffer.end().unwrap();

        let commands: Vec<_> = buffer.stream().reader().collect::<Result<_, _>>().unwrap();
        assert_eq!(commands.len(), 7);
        assert_eq!(
            commands[0],
            DecodedCommand::UpdateBuffer {
                dst: BufferId(9),
                dst_offset: 16,
                data: &[0xAA; 8],
            }
        );
        assert!(matches!(&commands[1], DecodedCommand::SetViewports(v) if v.len() == 2 && v[1].x == 64.0));
        assert_eq!(
            commands[2],
            DecodedCommand::BeginRenderPass {
                render_target: RenderTargetId(3),
                render_pass: Some(RenderPassId(5)),
                clear_values: vec![ClearValue::color(ColorRgba::BLACK)],
            }
        );
        assert_eq!(
            commands[3],
            DecodedCommand::ClearAttachments(vec![AttachmentClear::depth(0.5)])
        );
        assert_eq!(
            commands[4],
            DecodedCommand::DrawIndexed {
                num_indices: 6,
                first_index: 0,
                vertex_offset: -2
            }
        );
        assert_eq!(
            commands[6],
            DecodedCommand::SetVertexBuffers(vec![BufferId(1), BufferId(2)])
        );
    }

    #[test]
    fn test_begin_discards_previous_recording() {
        let mut buffer = recording_buffer(CommandBufferFlags::MULTI_SUBMIT);
        buffer.dispatch(4, 4, 1).unwrap();
        buffer.end().unwrap();
        assert_eq!(buffer.stream().num_commands(), 1);
        buffer.begin().unwrap();
        assert!(buffer.stream().is_empty());
    }

    struct CountingHost {
        finished: Mutex<Vec<CommandBufferId>>,
        released: Mutex<Vec<CommandBufferId>>,
    }

    impl CountingHost {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                finished: Mutex::new(Vec::new()),
                released: Mutex::new(Vec::new()),
            })
        }
    }

    impl CommandBufferHost for CountingHost {
        fn finish_recording(&self, buffer: &mut DeferredCommandBuffer) -> CommandResult {
            assert!(!buffer.is_recording());
            self.finished.lock().unwrap().push(buffer.id());
            buffer.clear_stream();
            Ok(())
        }

        fn release(&self, id: CommandBufferId) {
            self.released.lock().unwrap().push(id);
        }
    }

    #[test]
    fn test_host_is_notified_on_end() {
        let host = CountingHost::new();
        let mut buffer = DeferredCommandBuffer::new(
            CommandBufferId(12),
            &CommandBufferDescriptor {
                flags: CommandBufferFlags::IMMEDIATE_SUBMIT,
                ..Default::default()
            },
            0,
        )
        .with_host(host.clone());
        buffer.begin().unwrap();
        buffer.dispatch(1, 1, 1).unwrap();
        buffer.end().unwrap();
        assert_eq!(*host.finished.lock().unwrap(), vec![CommandBufferId(12)]);
        assert!(buffer.stream().is_empty());
    }

    #[test]
    fn test_dropping_secondary_releases_it() {
        let host = CountingHost::new();
        let descriptor = |flags| CommandBufferDescriptor {
            flags,
            ..Default::default()
        };
        let secondary = DeferredCommandBuffer::new(
            CommandBufferId(3),
            &descriptor(CommandBufferFlags::SECONDARY),
            0,
        )
        .with_host(host.clone());
        let primary = DeferredCommandBuffer::new(
            CommandBufferId(4),
            &descriptor(CommandBufferFlags::EMPTY),
            0,
        )
        .with_host(host.clone());
        drop(secondary);
        drop(primary);
        assert_eq!(*host.released.lock().unwrap(), vec![CommandBufferId(3)]);
    }
}
