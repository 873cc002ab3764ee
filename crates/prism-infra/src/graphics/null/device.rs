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

use super::executor::{NullExecutor, NullStatistics, NullTables};
use super::resources::{
    NullBuffer, NullFence, NullPipeline, NullPipelineLayout, NullQueryHeap, NullRenderPass,
    NullRenderTarget, NullResourceHeap, NullSampler, NullShader, NullTexture,
};
use super::transfer::NullStaging;
use crate::graphics::lock;
use prism_core::renderer::command::{CommandBufferHost, CommandStream, DeferredCommandBuffer};
use prism_core::renderer::{
    BufferId, CommandBuffer, CommandBufferFlags, CommandBufferId, CommandError, CommandResult,
    FenceId, PipelineLayoutId, PipelineStateId, QueryHeapId, RenderPassId, RenderTargetId,
    RendererInfo, RenderingCapabilities, ResourceHeapId, SamplerId, ShaderId, ShaderProgram,
    ShaderProgramId, TextureId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// The internal, shared state of a null device.
///
/// Tables are always locked in declaration order, from `buffers` down to
/// `statistics`, so a replay can hold all of them at once.
#[derive(Debug)]
pub(crate) struct NullDeviceInternal {
    pub(crate) instance_id: u64,
    pub(crate) info: RendererInfo,
    pub(crate) caps: RenderingCapabilities,

    pub(crate) buffers: Mutex<HashMap<BufferId, NullBuffer>>,
    pub(crate) textures: Mutex<HashMap<TextureId, NullTexture>>,
    pub(crate) samplers: Mutex<HashMap<SamplerId, NullSampler>>,
    pub(crate) shaders: Mutex<HashMap<ShaderId, NullShader>>,
    pub(crate) programs: Mutex<HashMap<ShaderProgramId, ShaderProgram>>,
    pub(crate) layouts: Mutex<HashMap<PipelineLayoutId, NullPipelineLayout>>,
    pub(crate) pipelines: Mutex<HashMap<PipelineStateId, NullPipeline>>,
    pub(crate) render_passes: Mutex<HashMap<RenderPassId, NullRenderPass>>,
    pub(crate) render_targets: Mutex<HashMap<RenderTargetId, NullRenderTarget>>,
    pub(crate) resource_heaps: Mutex<HashMap<ResourceHeapId, NullResourceHeap>>,
    pub(crate) query_heaps: Mutex<HashMap<QueryHeapId, NullQueryHeap>>,
    pub(crate) fences: Mutex<HashMap<FenceId, NullFence>>,
    pub(crate) staging: Mutex<NullStaging>,
    /// Streams of finished secondary command buffers.
    pub(crate) secondaries: Mutex<HashMap<CommandBufferId, Arc<CommandStream>>>,
    pub(crate) statistics: Mutex<NullStatistics>,

    pub(crate) next_buffer_id: AtomicU64,
    pub(crate) next_texture_id: AtomicU64,
    pub(crate) next_sampler_id: AtomicU64,
    pub(crate) next_shader_id: AtomicU64,
    pub(crate) next_program_id: AtomicU64,
    pub(crate) next_layout_id: AtomicU64,
    pub(crate) next_pipeline_id: AtomicU64,
    pub(crate) next_render_pass_id: AtomicU64,
    pub(crate) next_render_target_id: AtomicU64,
    pub(crate) next_heap_id: AtomicU64,
    pub(crate) next_query_heap_id: AtomicU64,
    pub(crate) next_fence_id: AtomicU64,
    pub(crate) next_command_buffer_id: AtomicU64,
    pub(crate) next_swap_chain_id: AtomicU64,
}

/// Hands out the next ID of a counter. IDs start at 1.
pub(crate) fn next_id(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed)
}

impl NullDeviceInternal {
    pub(crate) fn new(
        info: RendererInfo,
        caps: RenderingCapabilities,
        staging_chunk_size: u64,
    ) -> Self {
        Self {
            instance_id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            info,
            caps,
            buffers: Mutex::new(HashMap::new()),
            textures: Mutex::new(HashMap::new()),
            samplers: Mutex::new(HashMap::new()),
            shaders: Mutex::new(HashMap::new()),
            programs: Mutex::new(HashMap::new()),
            layouts: Mutex::new(HashMap::new()),
            pipelines: Mutex::new(HashMap::new()),
            render_passes: Mutex::new(HashMap::new()),
            render_targets: Mutex::new(HashMap::new()),
            resource_heaps: Mutex::new(HashMap::new()),
            query_heaps: Mutex::new(HashMap::new()),
            fences: Mutex::new(HashMap::new()),
            staging: Mutex::new(NullStaging::new(staging_chunk_size)),
            secondaries: Mutex::new(HashMap::new()),
            statistics: Mutex::new(NullStatistics::default()),
            next_buffer_id: AtomicU64::new(1),
            next_texture_id: AtomicU64::new(1),
            next_sampler_id: AtomicU64::new(1),
            next_shader_id: AtomicU64::new(1),
            next_program_id: AtomicU64::new(1),
            next_layout_id: AtomicU64::new(1),
            next_pipeline_id: AtomicU64::new(1),
            next_render_pass_id: AtomicU64::new(1),
            next_render_target_id: AtomicU64::new(1),
            next_heap_id: AtomicU64::new(1),
            next_query_heap_id: AtomicU64::new(1),
            next_fence_id: AtomicU64::new(1),
            next_command_buffer_id: AtomicU64::new(1),
            next_swap_chain_id: AtomicU64::new(1),
        }
    }

    /// Locks every table a replay touches and runs `stream` on the CPU.
    pub(crate) fn execute_stream(&self, stream: &CommandStream) -> CommandResult {
        let mut buffers = lock(&self.buffers, "buffers")?;
        let mut textures = lock(&self.textures, "textures")?;
        let samplers = lock(&self.samplers, "samplers")?;
        let pipelines = lock(&self.pipelines, "pipelines")?;
        let render_passes = lock(&self.render_passes, "render passes")?;
        let render_targets = lock(&self.render_targets, "render targets")?;
        let resource_heaps = lock(&self.resource_heaps, "resource heaps")?;
        let mut query_heaps = lock(&self.query_heaps, "query heaps")?;
        let mut staging = lock(&self.staging, "staging")?;
        let secondaries = lock(&self.secondaries, "secondaries")?;
        let mut statistics = lock(&self.statistics, "statistics")?;

        let result = NullExecutor::new(
            NullTables {
                buffers: &mut buffers,
                textures: &mut textures,
                samplers: &samplers,
                pipelines: &pipelines,
                render_passes: &render_passes,
                render_targets: &render_targets,
                resource_heaps: &resource_heaps,
                query_heaps: &mut query_heaps,
                staging: &mut staging,
                secondaries: &secondaries,
                statistics: &mut statistics,
            },
            &self.caps.limits,
        )
        .run(stream);
        staging.pool.reset();
        result
    }

    /// Replays a finished primary command buffer.
    pub(crate) fn submit(&self, buffer: &mut DeferredCommandBuffer) -> CommandResult {
        if buffer.owner() != self.instance_id {
            return Err(CommandError::ForeignCommandBuffer);
        }
        if buffer.is_recording() {
            return Err(CommandError::AlreadyRecording);
        }
        if buffer.is_secondary() {
            return Err(CommandError::SecondarySubmit(buffer.id()));
        }
        if buffer.stream().is_empty() {
            log::debug!("NullDeviceInternal: {:?} has no commands to submit", buffer.id());
            return Ok(());
        }
        log::trace!(
            "NullDeviceInternal: submitting {:?} ({} commands)",
            buffer.id(),
            buffer.stream().num_commands()
        );
        self.execute_stream(buffer.stream())?;
        if !buffer.flags().contains(CommandBufferFlags::MULTI_SUBMIT) {
            buffer.clear_stream();
        }
        Ok(())
    }
}

impl CommandBufferHost for NullDeviceInternal {
    fn finish_recording(&self, buffer: &mut DeferredCommandBuffer) -> CommandResult {
        if buffer.is_secondary() {
            let stream = Arc::new(buffer.stream().clone());
            lock(&self.secondaries, "secondaries")?.insert(buffer.id(), stream);
            log::debug!(
                "NullDeviceInternal: secondary command buffer {:?} is ready",
                buffer.id()
            );
            return Ok(());
        }
        if buffer.flags().contains(CommandBufferFlags::IMMEDIATE_SUBMIT) {
            self.submit(buffer)?;
        }
        Ok(())
    }
    fn release(&self, id: CommandBufferId) {
        match lock(&self.secondaries, "secondaries") {
            Ok(mut secondaries) => {
                if secondaries.remove(&id).is_some() {
                    log::trace!("NullDeviceInternal: released secondary command buffer {:?}", id);
                }
            }
            Err(e) => log::warn!("NullDeviceInternal: failed to release {:?}: {}", id, e),
        }
    }
}
