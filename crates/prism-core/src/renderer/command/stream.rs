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

//! The serialized command stream and its decoder.

use std::fmt;
use std::mem::size_of;

use bytemuck::Pod;

use super::opcode::Opcode;
use super::record::*;
use crate::math::{ColorRgba, Extent3D};
use crate::renderer::api::handle::decode_optional;
use crate::renderer::api::{
    AttachmentClear, BindFlags, BufferId, ClearFlags, ClearValue, CommandBufferId, IndexFormat,
    PipelineStateId, QueryHeapId, RenderConditionMode, RenderPassId, RenderTargetId,
    ResourceBinding, ResourceHeapId, ResourceSlotKind, ResourceSlotRange, Scissor,
    ShaderStageFlags, StencilFace, TextureId, TextureLocation, TextureRegion, TextureSubresource,
    Viewport,
};
use crate::renderer::error::CommandError;
use crate::renderer::traits::{CommandRecorder, CommandResult};

/// A contiguous byte stream of encoded commands.
///
/// Each command is a one-byte [`Opcode`] followed by its fixed-size payload
/// record and, for some commands, trailing variable-length data.
#[derive(Clone, Default)]
pub struct CommandStream {
    data: Vec<u8>,
    num_commands: usize,
}

impl CommandStream {
    /// Creates an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty stream with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            num_commands: 0,
        }
    }

    pub(crate) fn push_opcode(&mut self, opcode: Opcode) {
        self.data.push(opcode as u8);
        self.num_commands += 1;
    }

    pub(crate) fn push<T: Pod>(&mut self, opcode: Opcode, record: &T) {
        self.push_opcode(opcode);
        self.data.extend_from_slice(bytemuck::bytes_of(record));
    }

    pub(crate) fn push_with_trailing<T: Pod>(&mut self, opcode: Opcode, record: &T, trailing: &[u8]) {
        self.push(opcode, record);
        self.data.extend_from_slice(trailing);
    }

    /// Removes every command, keeping the allocation.
    pub fn clear(&mut self) {
        self.data.clear();
        self.num_commands = 0;
    }

    /// Size of the encoded stream in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if no command has been recorded.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of recorded commands.
    pub fn num_commands(&self) -> usize {
        self.num_commands
    }

    /// The raw encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns a decoder over the stream.
    pub fn reader(&self) -> CommandReader<'_> {
        CommandReader::new(&self.data)
    }

    /// Decodes every command and feeds it to `recorder`, stopping at the first error.
    pub fn replay(&self, recorder: &mut dyn CommandRecorder) -> CommandResult {
        for command in self.reader() {
            command?.apply(recorder)?;
        }
        Ok(())
    }
}

impl fmt::Debug for CommandStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandStream")
            .field("len", &self.data.len())
            .field("num_commands", &self.num_commands)
            .finish()
    }
}

/// A single command decoded from a [`CommandStream`].
///
/// Variable-length payloads borrow from the stream where they can.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum DecodedCommand<'a> {
    Execute(CommandBufferId),
    UpdateBuffer {
        dst: BufferId,
        dst_offset: u64,
        data: &'a [u8],
    },
    CopyBuffer {
        dst: BufferId,
        dst_offset: u64,
        src: BufferId,
        src_offset: u64,
        size: u64,
    },
    FillBuffer {
        dst: BufferId,
        dst_offset: u64,
        value: u32,
        size: u64,
    },
    CopyTexture {
        dst: TextureId,
        dst_location: TextureLocation,
        src: TextureId,
        src_location: TextureLocation,
        extent: Extent3D,
    },
    CopyTextureFromBuffer {
        dst: TextureId,
        dst_region: TextureRegion,
        src: BufferId,
        src_offset: u64,
        row_stride: u32,
        layer_stride: u32,
    },
    CopyBufferFromTexture {
        dst: BufferId,
        dst_offset: u64,
        src: TextureId,
        src_region: TextureRegion,
        row_stride: u32,
        layer_stride: u32,
    },
    GenerateMips {
        texture: TextureId,
        subresource: Option<TextureSubresource>,
    },
    SetViewport(Viewport),
    SetViewports(Vec<Viewport>),
    SetScissor(Scissor),
    SetScissors(Vec<Scissor>),
    SetVertexBuffer(BufferId),
    SetVertexBuffers(Vec<BufferId>),
    SetIndexBuffer {
        buffer: BufferId,
        format: IndexFormat,
        offset: u64,
    },
    SetResourceHeap {
        heap: ResourceHeapId,
        descriptor_set: u32,
    },
    SetResource {
        descriptor: u32,
        resource: ResourceBinding,
    },
    ResetResourceSlots(ResourceSlotRange),
    BeginRenderPass {
        render_target: RenderTargetId,
        render_pass: Option<RenderPassId>,
        clear_values: Vec<ClearValue>,
    },
    EndRenderPass,
    Clear {
        flags: ClearFlags,
        value: ClearValue,
    },
    ClearAttachments(Vec<AttachmentClear>),
    SetPipelineState(PipelineStateId),
    SetBlendFactor(ColorRgba),
    SetStencilReference {
        reference: u32,
        face: StencilFace,
    },
    SetUniforms {
        first: u32,
        data: &'a [u8],
    },
    BeginQuery {
        heap: QueryHeapId,
        query: u32,
    },
    EndQuery {
        heap: QueryHeapId,
        query: u32,
    },
    BeginRenderCondition {
        heap: QueryHeapId,
        query: u32,
        mode: RenderConditionMode,
    },
    EndRenderCondition,
    BeginStreamOutput(Vec<BufferId>),
    EndStreamOutput,
    Draw {
        num_vertices: u32,
        first_vertex: u32,
    },
    DrawInstanced {
        num_vertices: u32,
        first_vertex: u32,
        num_instances: u32,
        first_instance: u32,
    },
    DrawIndexed {
        num_indices: u32,
        first_index: u32,
        vertex_offset: i32,
    },
    DrawIndexedInstanced {
        num_indices: u32,
        num_instances: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    DrawIndirect {
        buffer: BufferId,
        offset: u64,
        num_commands: u32,
        stride: u32,
    },
    DrawIndexedIndirect {
        buffer: BufferId,
        offset: u64,
        num_commands: u32,
        stride: u32,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    DispatchIndirect {
        buffer: BufferId,
        offset: u64,
    },
    PushDebugGroup(&'a str),
    PopDebugGroup,
}

impl DecodedCommand<'_> {
    /// Forwards the command to `recorder`.
    pub fn apply(&self, recorder: &mut dyn CommandRecorder) -> CommandResult {
        use DecodedCommand as C;
        match self {
            C::Execute(id) => recorder.execute(*id),
            C::UpdateBuffer {
                dst,
                dst_offset,
                data,
            } => recorder.update_buffer(*dst, *dst_offset, data),
            C::CopyBuffer {
                dst,
                dst_offset,
                src,
                src_offset,
                size,
            } => recorder.copy_buffer(*dst, *dst_offset, *src, *src_offset, *size),
            C::FillBuffer {
                dst,
                dst_offset,
                value,
                size,
            } => recorder.fill_buffer(*dst, *dst_offset, *value, *size),
            C::CopyTexture {
                dst,
                dst_location,
                src,
                src_location,
                extent,
            } => recorder.copy_texture(*dst, dst_location, *src, src_location, *extent),
            C::CopyTextureFromBuffer {
                dst,
                dst_region,
                src,
                src_offset,
                row_stride,
                layer_stride,
            } => recorder.copy_texture_from_buffer(
                *dst,
                dst_region,
                *src,
                *src_offset,
                *row_stride,
                *layer_stride,
            ),
            C::CopyBufferFromTexture {
                dst,
                dst_offset,
                src,
                src_region,
                row_stride,
                layer_stride,
            } => recorder.copy_buffer_from_texture(
                *dst,
                *dst_offset,
                *src,
                src_region,
                *row_stride,
                *layer_stride,
            ),
            C::GenerateMips {
                texture,
                subresource,
            } => recorder.generate_mips(*texture, *subresource),
            C::SetViewport(viewport) => recorder.set_viewport(viewport),
            C::SetViewports(viewports) => recorder.set_viewports(viewports),
            C::SetScissor(scissor) => recorder.set_scissor(scissor),
            C::SetScissors(scissors) => recorder.set_scissors(scissors),
            C::SetVertexBuffer(buffer) => recorder.set_vertex_buffer(*buffer),
            C::SetVertexBuffers(buffers) => recorder.set_vertex_buffers(buffers),
            C::SetIndexBuffer {
                buffer,
                format,
                offset,
            } => recorder.set_index_buffer(*buffer, *format, *offset),
            C::SetResourceHeap {
                heap,
                descriptor_set,
            } => recorder.set_resource_heap(*heap, *descriptor_set),
            C::SetResource {
                descriptor,
                resource,
            } => recorder.set_resource(*descriptor, *resource),
            C::ResetResourceSlots(range) => recorder.reset_resource_slots(range),
            C::BeginRenderPass {
                render_target,
                render_pass,
                clear_values,
            } => recorder.begin_render_pass(*render_target, *render_pass, clear_values),
            C::EndRenderPass => recorder.end_render_pass(),
            C::Clear { flags, value } => recorder.clear(*flags, value),
            C::ClearAttachments(attachments) => recorder.clear_attachments(attachments),
            C::SetPipelineState(pipeline) => recorder.set_pipeline_state(*pipeline),
            C::SetBlendFactor(color) => recorder.set_blend_factor(color),
            C::SetStencilReference { reference, face } => {
                recorder.set_stencil_reference(*reference, *face)
            }
            C::SetUniforms { first, data } => recorder.set_uniforms(*first, data),
            C::BeginQuery { heap, query } => recorder.begin_query(*heap, *query),
            C::EndQuery { heap, query } => recorder.end_query(*heap, *query),
            C::BeginRenderCondition { heap, query, mode } => {
                recorder.begin_render_condition(*heap, *query, *mode)
            }
            C::EndRenderCondition => recorder.end_render_condition(),
            C::BeginStreamOutput(buffers) => recorder.begin_stream_output(buffers),
            C::EndStreamOutput => recorder.end_stream_output(),
            C::Draw {
                num_vertices,
                first_vertex,
            } => recorder.draw(*num_vertices, *first_vertex),
            C::DrawInstanced {
                num_vertices,
                first_vertex,
                num_instances,
                first_instance,
            } => recorder.draw_instanced(*num_vertices, *first_vertex, *num_instances, *first_instance),
            C::DrawIndexed {
                num_indices,
                first_index,
                vertex_offset,
            } => recorder.draw_indexed(*num_indices, *first_index, *vertex_offset),
            C::DrawIndexedInstanced {
                num_indices,
                num_instances,
                first_index,
                vertex_offset,
                first_instance,
            } => recorder.draw_indexed_instanced(
                *num_indices,
                *num_instances,
                *first_index,
                *vertex_offset,
                *first_instance,
            ),
            C::DrawIndirect {
                buffer,
                offset,
                num_commands,
                stride,
            } => recorder.draw_indirect(*buffer, *offset, *num_commands, *stride),
            C::DrawIndexedIndirect {
                buffer,
                offset,
                num_commands,
                stride,
            } => recorder.draw_indexed_indirect(*buffer, *offset, *num_commands, *stride),
            C::Dispatch { x, y, z } => recorder.dispatch(*x, *y, *z),
            C::DispatchIndirect { buffer, offset } => recorder.dispatch_indirect(*buffer, *offset),
            C::PushDebugGroup(name) => recorder.push_debug_group(name),
            C::PopDebugGroup => recorder.pop_debug_group(),
        }
    }
}

/// Iterates over the commands of a stream.
///
/// Yields an error for the first malformed command and then stops.
pub struct CommandReader<'a> {
    data: &'a [u8],
    pos: usize,
    start: usize,
    failed: bool,
}

impl<'a> CommandReader<'a> {
    /// Creates a reader over raw stream bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            start: 0,
            failed: false,
        }
    }

    fn truncated(&self) -> CommandError {
        CommandError::Truncated { offset: self.start }
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CommandError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| self.truncated())?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read<T: Pod>(&mut self) -> Result<T, CommandError> {
        let bytes = self.read_bytes(size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    fn read_array<T: Pod>(&mut self, count: u32) -> Result<Vec<T>, CommandError> {
        let len = (count as usize)
            .checked_mul(size_of::<T>())
            .ok_or_else(|| self.truncated())?;
        let bytes = self.read_bytes(len)?;
        Ok(bytes
            .chunks_exact(size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    fn read_counted<T: Pod>(&mut self) -> Result<Vec<T>, CommandError> {
        let header: ArrayRecord = self.read()?;
        self.read_array(header.count)
    }

    fn read_buffer_ids(&mut self) -> Result<Vec<BufferId>, CommandError> {
        Ok(self
            .read_counted::<u64>()?
            .into_iter()
            .map(BufferId)
            .collect())
    }

    fn decode(&mut self, opcode: Opcode) -> Result<DecodedCommand<'a>, CommandError> {
        use DecodedCommand as C;
        let malformed = CommandError::MalformedPayload {
            opcode: opcode as u8,
            offset: self.start,
        };
        let command = match opcode {
            Opcode::Execute => {
                let r: ExecuteRecord = self.read()?;
                C::Execute(CommandBufferId(r.command_buffer))
            }
            Opcode::UpdateBuffer => {
                let r: UpdateBufferRecord = self.read()?;
                let len = usize::try_from(r.size).map_err(|_| self.truncated())?;
                C::UpdateBuffer {
                    dst: BufferId(r.buffer),
                    dst_offset: r.offset,
                    data: self.read_bytes(len)?,
                }
            }
            Opcode::CopyBuffer => {
                let r: CopyBufferRecord = self.read()?;
                C::CopyBuffer {
                    dst: BufferId(r.dst),
                    dst_offset: r.dst_offset,
                    src: BufferId(r.src),
                    src_offset: r.src_offset,
                    size: r.size,
                }
            }
            Opcode::FillBuffer => {
                let r: FillBufferRecord = self.read()?;
                C::FillBuffer {
                    dst: BufferId(r.buffer),
                    dst_offset: r.offset,
                    value: r.value,
                    size: r.size,
                }
            }
            Opcode::CopyTexture => {
                let r: CopyTextureRecord = self.read()?;
                C::CopyTexture {
                    dst: TextureId(r.dst),
                    dst_location: r.dst_location.into(),
                    src: TextureId(r.src),
                    src_location: r.src_location.into(),
                    extent: extent_from_array(r.extent),
                }
            }
            Opcode::CopyTextureFromBuffer => {
                let r: TextureBufferCopyRecord = self.read()?;
                C::CopyTextureFromBuffer {
                    dst: TextureId(r.texture),
                    dst_region: r.region.into(),
                    src: BufferId(r.buffer),
                    src_offset: r.buffer_offset,
                    row_stride: r.row_stride,
                    layer_stride: r.layer_stride,
                }
            }
            Opcode::CopyBufferFromTexture => {
                let r: TextureBufferCopyRecord = self.read()?;
                C::CopyBufferFromTexture {
                    dst: BufferId(r.buffer),
                    dst_offset: r.buffer_offset,
                    src: TextureId(r.texture),
                    src_region: r.region.into(),
                    row_stride: r.row_stride,
                    layer_stride: r.layer_stride,
                }
            }
            Opcode::GenerateMips => {
                let r: TextureRecord = self.read()?;
                C::GenerateMips {
                    texture: TextureId(r.texture),
                    subresource: None,
                }
            }
            Opcode::GenerateMipsRange => {
                let r: GenerateMipsRangeRecord = self.read()?;
                C::GenerateMips {
                    texture: TextureId(r.texture),
                    subresource: Some(TextureSubresource {
                        base_array_layer: r.base_array_layer,
                        num_array_layers: r.num_array_layers,
                        base_mip_level: r.base_mip_level,
                        num_mip_levels: r.num_mip_levels,
                    }),
                }
            }
            Opcode::SetViewport => C::SetViewport(self.read()?),
            Opcode::SetViewportArray => C::SetViewports(self.read_counted()?),
            Opcode::SetScissor => C::SetScissor(self.read()?),
            Opcode::SetScissorArray => C::SetScissors(self.read_counted()?),
            Opcode::SetVertexBuffer => {
                let r: BufferBindRecord = self.read()?;
                C::SetVertexBuffer(BufferId(r.buffer))
            }
            Opcode::SetVertexBufferArray => C::SetVertexBuffers(self.read_buffer_ids()?),
            Opcode::SetIndexBuffer => {
                let r: IndexBufferRecord = self.read()?;
                C::SetIndexBuffer {
                    buffer: BufferId(r.buffer),
                    format: IndexFormat::from_raw(r.format).ok_or(malformed)?,
                    offset: r.offset,
                }
            }
            Opcode::SetResourceHeap => {
                let r: ResourceHeapRecord = self.read()?;
                C::SetResourceHeap {
                    heap: ResourceHeapId(r.heap),
                    descriptor_set: r.descriptor_set,
                }
            }
            Opcode::SetResource => {
                let r: ResourceRecord = self.read()?;
                C::SetResource {
                    descriptor: r.descriptor,
                    resource: ResourceBinding::from_raw(r.kind, r.resource).ok_or(malformed)?,
                }
            }
            Opcode::ResetResourceSlots => {
                let r: ResetSlotsRecord = self.read()?;
                C::ResetResourceSlots(ResourceSlotRange {
                    kind: ResourceSlotKind::from_raw(r.kind).ok_or(malformed)?,
                    first_slot: r.first_slot,
                    num_slots: r.num_slots,
                    bind_flags: BindFlags::from_bits_retain(r.bind_flags),
                    stages: ShaderStageFlags::from_bits_retain(r.stages),
                })
            }
            Opcode::BeginRenderPass => {
                let r: BeginRenderPassRecord = self.read()?;
                C::BeginRenderPass {
                    render_target: RenderTargetId(r.render_target),
                    render_pass: decode_optional(r.render_pass).map(RenderPassId),
                    clear_values: self.read_array(r.num_clear_values)?,
                }
            }
            Opcode::EndRenderPass => C::EndRenderPass,
            Opcode::Clear => {
                let r: ClearRecord = self.read()?;
                C::Clear {
                    flags: ClearFlags::from_bits_retain(r.flags),
                    value: r.value,
                }
            }
            Opcode::ClearAttachments => {
                let records: Vec<AttachmentClearRecord> = self.read_counted()?;
                C::ClearAttachments(
                    records
                        .into_iter()
                        .map(|r| AttachmentClear {
                            flags: ClearFlags::from_bits_retain(r.flags),
                            color_attachment: r.color_attachment,
                            value: r.value,
                        })
                        .collect(),
                )
            }
            Opcode::SetPipelineState => {
                let r: PipelineRecord = self.read()?;
                C::SetPipelineState(PipelineStateId(r.pipeline))
            }
            Opcode::SetBlendFactor => C::SetBlendFactor(self.read()?),
            Opcode::SetStencilReference => {
                let r: StencilReferenceRecord = self.read()?;
                C::SetStencilReference {
                    reference: r.reference,
                    face: StencilFace::from_raw(r.face).ok_or(malformed)?,
                }
            }
            Opcode::SetUniforms => {
                let r: UniformsRecord = self.read()?;
                C::SetUniforms {
                    first: r.first,
                    data: self.read_bytes(r.size as usize)?,
                }
            }
            Opcode::BeginQuery => {
                let r: QueryRecord = self.read()?;
                C::BeginQuery {
                    heap: QueryHeapId(r.heap),
                    query: r.query,
                }
            }
            Opcode::EndQuery => {
                let r: QueryRecord = self.read()?;
                C::EndQuery {
                    heap: QueryHeapId(r.heap),
                    query: r.query,
                }
            }
            Opcode::BeginRenderCondition => {
                let r: RenderConditionRecord = self.read()?;
                C::BeginRenderCondition {
                    heap: QueryHeapId(r.heap),
                    query: r.query,
                    mode: RenderConditionMode::from_raw(r.mode).ok_or(malformed)?,
                }
            }
            Opcode::EndRenderCondition => C::EndRenderCondition,
            Opcode::BeginStreamOutput => C::BeginStreamOutput(self.read_buffer_ids()?),
            Opcode::EndStreamOutput => C::EndStreamOutput,
            Opcode::Draw => {
                let r: DrawRecord = self.read()?;
                C::Draw {
                    num_vertices: r.num_vertices,
                    first_vertex: r.first_vertex,
                }
            }
            Opcode::DrawInstanced => {
                let r: DrawInstancedRecord = self.read()?;
                C::DrawInstanced {
                    num_vertices: r.num_vertices,
                    first_vertex: r.first_vertex,
                    num_instances: r.num_instances,
                    first_instance: r.first_instance,
                }
            }
            Opcode::DrawIndexed => {
                let r: DrawIndexedRecord = self.read()?;
                C::DrawIndexed {
                    num_indices: r.num_indices,
                    first_index: r.first_index,
                    vertex_offset: r.vertex_offset,
                }
            }
            Opcode::DrawIndexedInstanced => {
                let r: DrawIndexedInstancedRecord = self.read()?;
                C::DrawIndexedInstanced {
                    num_indices: r.num_indices,
                    num_instances: r.num_instances,
                    first_index: r.first_index,
                    vertex_offset: r.vertex_offset,
                    first_instance: r.first_instance,
                }
            }
            Opcode::DrawIndirect => {
                let r: IndirectRecord = self.read()?;
                C::DrawIndirect {
                    buffer: BufferId(r.buffer),
                    offset: r.offset,
                    num_commands: r.num_commands,
                    stride: r.stride,
                }
            }
            Opcode::DrawIndexedIndirect => {
                let r: IndirectRecord = self.read()?;
                C::DrawIndexedIndirect {
                    buffer: BufferId(r.buffer),
                    offset: r.offset,
                    num_commands: r.num_commands,
                    stride: r.stride,
                }
            }
            Opcode::Dispatch => {
                let r: DispatchRecord = self.read()?;
                C::Dispatch {
                    x: r.x,
                    y: r.y,
                    z: r.z,
                }
            }
            Opcode::DispatchIndirect => {
                let r: DispatchIndirectRecord = self.read()?;
                C::DispatchIndirect {
                    buffer: BufferId(r.buffer),
                    offset: r.offset,
                }
            }
            Opcode::PushDebugGroup => {
                let r: DebugGroupRecord = self.read()?;
                let bytes = self.read_bytes(r.len as usize)?;
                C::PushDebugGroup(std::str::from_utf8(bytes).map_err(|_| malformed)?)
            }
            Opcode::PopDebugGroup => C::PopDebugGroup,
        };
        Ok(command)
    }
}

impl<'a> Iterator for CommandReader<'a> {
    type Item = Result<DecodedCommand<'a>, CommandError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() {
            return None;
        }
        self.start = self.pos;
        let byte = self.data[self.pos];
        self.pos += 1;
        let result = Opcode::decode(byte, self.start).and_then(|opcode| self.decode(opcode));
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_decodes_pushed_records() {
        let mut stream = CommandStream::new();
        stream.push(
            Opcode::Draw,
            &DrawRecord {
                num_vertices: 3,
                first_vertex: 1,
            },
        );
        stream.push_with_trailing(
            Opcode::PushDebugGroup,
            &DebugGroupRecord { len: 5 },
            b"frame",
        );
        stream.push_opcode(Opcode::PopDebugGroup);

        let commands: Vec<_> = stream.reader().collect::<Result<_, _>>().unwrap();
        assert_eq!(stream.num_commands(), 3);
        assert_eq!(
            commands,
            vec![
                DecodedCommand::Draw {
                    num_vertices: 3,
                    first_vertex: 1
                },
                DecodedCommand::PushDebugGroup("frame"),
                DecodedCommand::PopDebugGroup,
            ]
        );
    }

    #[test]
    fn test_truncated_payload_reports_command_offset() {
        let mut stream = CommandStream::new();
        stream.push_opcode(Opcode::EndRenderPass);
        stream.push(Opcode::Dispatch, &DispatchRecord { x: 1, y: 1, z: 1 });
        let bytes = &stream.as_bytes()[..stream.len() - 2];

        let mut reader = CommandReader::new(bytes);
        assert_eq!(reader.next(), Some(Ok(DecodedCommand::EndRenderPass)));
        assert_eq!(
            reader.next(),
            Some(Err(CommandError::Truncated { offset: 1 }))
        );
        assert_eq!(reader.next(), None);
    }

    #[test]
    fn test_unknown_opcode_stops_reader() {
        let bytes = [Opcode::EndStreamOutput as u8, 0xEE, Opcode::PopDebugGroup as u8];
        let results: Vec<_> = CommandReader::new(&bytes).collect();
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[1],
            Err(CommandError::UnknownOpcode {
                opcode: 0xEE,
                offset: 1
            })
        );
    }

    #[test]
    fn test_invalid_enum_value_is_malformed() {
        let mut stream = CommandStream::new();
        stream.push(
            Opcode::SetStencilReference,
            &StencilReferenceRecord {
                reference: 1,
                face: 7,
            },
        );
        assert_eq!(
            stream.reader().next(),
            Some(Err(CommandError::MalformedPayload {
                opcode: Opcode::SetStencilReference as u8,
                offset: 0
            }))
        );
    }

    #[test]
    fn test_clear_keeps_stream_reusable() {
        let mut stream = CommandStream::with_capacity(64);
        stream.push_opcode(Opcode::EndRenderCondition);
        stream.clear();
        assert!(stream.is_empty());
        assert_eq!(stream.num_commands(), 0);
        assert_eq!(stream.reader().count(), 0);
    }
}
