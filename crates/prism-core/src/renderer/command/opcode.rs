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

//! The opcode table of the command stream.

use crate::renderer::error::CommandError;

macro_rules! opcodes {
    ($($(#[$attr:meta])* $name:ident = $value:literal,)*) => {
        /// Identifies a command in the stream. Each opcode is a single byte
        /// followed by its payload record.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($(#[$attr])* $name = $value,)*
        }

        impl Opcode {
            /// Decodes an opcode byte found at `offset` in a stream.
            pub fn decode(byte: u8, offset: usize) -> Result<Self, CommandError> {
                match byte {
                    $($value => Ok(Opcode::$name),)*
                    opcode => Err(CommandError::UnknownOpcode { opcode, offset }),
                }
            }

            /// Name of the opcode, for stream dumps.
            pub fn name(self) -> &'static str {
                match self {
                    $(Opcode::$name => stringify!($name),)*
                }
            }
        }
    };
}

opcodes! {
    /// Executes a secondary command buffer.
    Execute = 0x01,
    /// Writes inline data into a buffer.
    UpdateBuffer = 0x02,
    /// Copies a region between buffers.
    CopyBuffer = 0x03,
    /// Fills a buffer region with a repeated 32-bit value.
    FillBuffer = 0x04,
    /// Copies a region between textures.
    CopyTexture = 0x05,
    /// Copies buffer data into a texture region.
    CopyTextureFromBuffer = 0x06,
    /// Copies a texture region into a buffer.
    CopyBufferFromTexture = 0x07,
    /// Generates the full mip chain.
    GenerateMips = 0x08,
    /// Generates mips for a subresource range.
    GenerateMipsRange = 0x09,
    /// Sets a single viewport.
    SetViewport = 0x10,
    /// Sets an array of viewports (trailing records).
    SetViewportArray = 0x11,
    /// Sets a single scissor.
    SetScissor = 0x12,
    /// Sets an array of scissors (trailing records).
    SetScissorArray = 0x13,
    /// Binds a vertex buffer to slot 0.
    SetVertexBuffer = 0x14,
    /// Binds vertex buffers to consecutive slots (trailing IDs).
    SetVertexBufferArray = 0x15,
    /// Binds the index buffer.
    SetIndexBuffer = 0x16,
    /// Binds a resource heap.
    SetResourceHeap = 0x17,
    /// Binds an individual resource.
    SetResource = 0x18,
    /// Unbinds a range of resource slots.
    ResetResourceSlots = 0x19,
    /// Begins a render pass (trailing clear values).
    BeginRenderPass = 0x20,
    /// Ends the current render pass.
    EndRenderPass = 0x21,
    /// Clears attachments of the bound render target.
    Clear = 0x22,
    /// Clears selected attachments (trailing records).
    ClearAttachments = 0x23,
    /// Binds a pipeline state.
    SetPipelineState = 0x30,
    /// Sets the dynamic blend factor.
    SetBlendFactor = 0x31,
    /// Sets the dynamic stencil reference.
    SetStencilReference = 0x32,
    /// Writes individual uniforms (trailing data).
    SetUniforms = 0x33,
    /// Begins a query.
    BeginQuery = 0x40,
    /// Ends a query.
    EndQuery = 0x41,
    /// Begins conditional rendering.
    BeginRenderCondition = 0x42,
    /// Ends conditional rendering.
    EndRenderCondition = 0x43,
    /// Begins stream output (trailing IDs).
    BeginStreamOutput = 0x44,
    /// Ends stream output.
    EndStreamOutput = 0x45,
    /// Non-indexed draw.
    Draw = 0x50,
    /// Non-indexed instanced draw.
    DrawInstanced = 0x51,
    /// Indexed draw.
    DrawIndexed = 0x52,
    /// Indexed instanced draw.
    DrawIndexedInstanced = 0x53,
    /// Non-indexed indirect draw.
    DrawIndirect = 0x54,
    /// Indexed indirect draw.
    DrawIndexedIndirect = 0x55,
    /// Compute dispatch.
    Dispatch = 0x56,
    /// Indirect compute dispatch.
    DispatchIndirect = 0x57,
    /// Opens a debug group (trailing UTF-8 name).
    PushDebugGroup = 0x60,
    /// Closes the innermost debug group.
    PopDebugGroup = 0x61,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_and_unknown_bytes() {
        assert_eq!(Opcode::decode(0x52, 0), Ok(Opcode::DrawIndexed));
        assert_eq!(Opcode::DrawIndexed as u8, 0x52);
        assert_eq!(
            Opcode::decode(0x00, 9),
            Err(CommandError::UnknownOpcode {
                opcode: 0,
                offset: 9
            })
        );
        assert_eq!(Opcode::PushDebugGroup.name(), "PushDebugGroup");
    }
}
