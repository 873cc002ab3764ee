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

use crate::renderer::api::*;
use crate::renderer::error::{RenderError, ResourceError, ShaderError};
use crate::renderer::traits::{CommandBuffer, CommandQueue, SwapChain};

/// A loaded renderer module: the factory for every GPU object and the owner of
/// the command queue.
///
/// Objects are referred to by typed IDs. IDs are only meaningful for the render
/// system that created them.
pub trait RenderSystem: std::fmt::Debug + Send + Sync {
    /// The module this render system was loaded from.
    fn module(&self) -> RendererModule;

    /// Names of the renderer, device and vendor.
    fn renderer_info(&self) -> &RendererInfo;

    /// Features, limits and formats supported by the renderer.
    fn rendering_caps(&self) -> &RenderingCapabilities;

    /* --- Swap chains --- */

    /// Creates an off-screen swap chain.
    /// ## Errors
    /// * `RenderError::SwapChain` - If the resolution is zero or the buffers cannot be allocated.
    fn create_swap_chain(
        &self,
        descriptor: &SwapChainDescriptor,
    ) -> Result<Box<dyn SwapChain>, RenderError>;

    /* --- Buffers --- */

    /// Creates a new buffer.
    /// ## Arguments
    /// * `descriptor` - The size, bindings and CPU access of the buffer.
    /// * `initial_data` - Optional contents, at most `descriptor.size` bytes.
    /// ## Errors
    /// * `ResourceError::InvalidDescriptor` - If the descriptor fails validation.
    /// * `ResourceError::OutOfBounds` - If `initial_data` is larger than the buffer.
    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor<'_>,
        initial_data: Option<&[u8]>,
    ) -> Result<BufferId, ResourceError>;

    /// Destroys a buffer.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Writes `data` at `offset` from the CPU.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Reads `out.len()` bytes at `offset` back to the CPU. Blocks until the GPU is done.
    fn read_buffer(&self, id: BufferId, offset: u64, out: &mut [u8]) -> Result<(), ResourceError>;

    /// Maps a buffer range and hands it to `f`.
    ///
    /// The buffer is unmapped when `f` returns; written bytes reach the buffer at
    /// that point. `size` may be [`WHOLE_SIZE`].
    /// ## Errors
    /// * `ResourceError::InvalidAccess` - If the buffer lacks the CPU access flags of `access`.
    /// * `ResourceError::OutOfBounds` - If the range exceeds the buffer.
    fn map_buffer(
        &self,
        id: BufferId,
        access: CpuAccess,
        offset: u64,
        size: u64,
        f: &mut dyn FnMut(&mut BufferMapping<'_>),
    ) -> Result<(), ResourceError>;

    /// The descriptor the buffer was created with.
    fn buffer_descriptor(&self, id: BufferId) -> Result<BufferDescriptor<'static>, ResourceError>;

    /* --- Textures and samplers --- */

    /// Creates a new texture, optionally filled with tightly packed data for the first mip level.
    fn create_texture(
        &self,
        descriptor: &TextureDescriptor<'_>,
        initial_data: Option<&[u8]>,
    ) -> Result<TextureId, ResourceError>;

    /// Destroys a texture.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Writes tightly packed texel data into a texture region.
    fn write_texture(
        &self,
        id: TextureId,
        region: &TextureRegion,
        data: &[u8],
    ) -> Result<(), ResourceError>;

    /// Reads a texture region into `out` as tightly packed texels.
    fn read_texture(
        &self,
        id: TextureId,
        region: &TextureRegion,
        out: &mut [u8],
    ) -> Result<(), ResourceError>;

    /// The descriptor the texture was created with.
    fn texture_descriptor(&self, id: TextureId) -> Result<TextureDescriptor<'static>, ResourceError>;

    /// Creates a sampler state.
    fn create_sampler(&self, descriptor: &SamplerDescriptor<'_>) -> Result<SamplerId, ResourceError>;

    /// Destroys a sampler state.
    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError>;

    /* --- Shaders --- */

    /// Compiles a shader stage.
    /// ## Errors
    /// * `ResourceError::Shader` - If the source is empty or fails to compile.
    fn create_shader(&self, descriptor: &ShaderDescriptor<'_>) -> Result<ShaderId, ResourceError>;

    /// Destroys a shader stage.
    fn destroy_shader(&self, id: ShaderId) -> Result<(), ResourceError>;

    /// Attaches shader stages into a program and links it.
    ///
    /// Programs are created even when linking fails; the link error and info log
    /// are available through [`shader_program`](Self::shader_program).
    fn create_shader_program(
        &self,
        descriptor: &ShaderProgramDescriptor<'_>,
    ) -> Result<ShaderProgramId, ResourceError>;

    /// Destroys a shader program.
    fn destroy_shader_program(&self, id: ShaderProgramId) -> Result<(), ResourceError>;

    /// A snapshot of a shader program's link state and reflection.
    fn shader_program(&self, id: ShaderProgramId) -> Result<ShaderProgram, ResourceError>;

    /// Runs `f` on the program in place (binding remaps, uniforms, input layouts).
    fn update_shader_program(
        &self,
        id: ShaderProgramId,
        f: &mut dyn FnMut(&mut ShaderProgram) -> Result<(), ShaderError>,
    ) -> Result<(), ResourceError>;

    /* --- Pipelines --- */

    /// Creates a pipeline layout.
    fn create_pipeline_layout(
        &self,
        descriptor: &PipelineLayoutDescriptor<'_>,
    ) -> Result<PipelineLayoutId, ResourceError>;

    /// Destroys a pipeline layout.
    fn destroy_pipeline_layout(&self, id: PipelineLayoutId) -> Result<(), ResourceError>;

    /// Creates a graphics pipeline. The program must be linked and contain graphics stages.
    fn create_graphics_pipeline(
        &self,
        descriptor: &GraphicsPipelineDescriptor<'_>,
    ) -> Result<PipelineStateId, ResourceError>;

    /// Creates a compute pipeline. The program must be a linked compute program.
    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor<'_>,
    ) -> Result<PipelineStateId, ResourceError>;

    /// Destroys a graphics or compute pipeline.
    fn destroy_pipeline_state(&self, id: PipelineStateId) -> Result<(), ResourceError>;

    /* --- Render passes and targets --- */

    /// Creates a render pass.
    fn create_render_pass(
        &self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Result<RenderPassId, ResourceError>;

    /// Destroys a render pass.
    fn destroy_render_pass(&self, id: RenderPassId) -> Result<(), ResourceError>;

    /// Creates a render target from existing textures.
    fn create_render_target(
        &self,
        descriptor: &RenderTargetDescriptor<'_>,
    ) -> Result<RenderTargetId, ResourceError>;

    /// Destroys a render target. Its attachments are left untouched.
    fn destroy_render_target(&self, id: RenderTargetId) -> Result<(), ResourceError>;

    /* --- Resource heaps and queries --- */

    /// Creates a resource heap.
    fn create_resource_heap(
        &self,
        descriptor: &ResourceHeapDescriptor<'_>,
    ) -> Result<ResourceHeapId, ResourceError>;

    /// Destroys a resource heap.
    fn destroy_resource_heap(&self, id: ResourceHeapId) -> Result<(), ResourceError>;

    /// Creates a query heap.
    fn create_query_heap(
        &self,
        descriptor: &QueryHeapDescriptor<'_>,
    ) -> Result<QueryHeapId, ResourceError>;

    /// Destroys a query heap.
    fn destroy_query_heap(&self, id: QueryHeapId) -> Result<(), ResourceError>;

    /// Creates an unsignaled fence.
    fn create_fence(&self) -> Result<FenceId, ResourceError>;

    /// Destroys a fence.
    fn destroy_fence(&self, id: FenceId) -> Result<(), ResourceError>;

    /* --- Commands --- */

    /// Creates a command buffer.
    fn create_command_buffer(
        &self,
        descriptor: &CommandBufferDescriptor,
    ) -> Result<Box<dyn CommandBuffer>, ResourceError>;

    /// The command queue.
    fn command_queue(&self) -> &dyn CommandQueue;

    /// Downcast to Any for type-specific access
    fn as_any(&self) -> &dyn std::any::Any;
}
