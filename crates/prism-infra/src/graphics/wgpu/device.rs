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

use super::context::WgpuContext;
use super::executor::{WgpuStatistics, WgpuExecutor, WgpuTables};
use super::mips::MipGenerator;
use super::resources::{
    WgpuBuffer, WgpuFence, WgpuPipeline, WgpuPipelineLayout, WgpuQueryHeap, WgpuRenderPass,
    WgpuRenderTarget, WgpuResourceHeap, WgpuSampler, WgpuShader, WgpuTexture,
};
use super::staging::WgpuStaging;
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
use std::time::Instant;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub(crate) struct WgpuDeviceInternal {
    pub(crate) instance_id: u64,
    pub(crate) info: RendererInfo,
    pub(crate) caps: RenderingCapabilities,
    pub(crate) context: WgpuContext,
    /// Reference point of elapsed-time queries.
    pub(crate) epoch: Instant,

    pub(crate) buffers: Mutex<HashMap<BufferId, WgpuBuffer>>,
    pub(crate) textures: Mutex<HashMap<TextureId, WgpuTexture>>,
    pub(crate) samplers: Mutex<HashMap<SamplerId, WgpuSampler>>,
    pub(crate) shaders: Mutex<HashMap<ShaderId, WgpuShader>>,
    pub(crate) programs: Mutex<HashMap<ShaderProgramId, ShaderProgram>>,
    pub(crate) layouts: Mutex<HashMap<PipelineLayoutId, WgpuPipelineLayout>>,
    pub(crate) pipelines: Mutex<HashMap<PipelineStateId, WgpuPipeline>>,
    pub(crate) render_passes: Mutex<HashMap<RenderPassId, WgpuRenderPass>>,
    pub(crate) render_targets: Mutex<HashMap<RenderTargetId, WgpuRenderTarget>>,
    pub(crate) resource_heaps: Mutex<HashMap<ResourceHeapId, WgpuResourceHeap>>,
    pub(crate) query_heaps: Mutex<HashMap<QueryHeapId, WgpuQueryHeap>>,
    pub(crate) fences: Mutex<HashMap<FenceId, WgpuFence>>,
    pub(crate) staging: Mutex<WgpuStaging>,
    pub(crate) mips: Mutex<MipGenerator>,
    pub(crate) secondaries: Mutex<HashMap<CommandBufferId, Arc<CommandStream>>>,
    pub(crate) counters: Mutex<WgpuStatistics>,

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

pub(crate) fn next_id(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed)
}

impl WgpuDeviceInternal {
    pub(crate) fn new(
        context: WgpuContext,
        info: RendererInfo,
        caps: RenderingCapabilities,
        staging_chunk_size: u64,
    ) -> Self {
        let staging = WgpuStaging::new(&context.device, &context.queue, staging_chunk_size);
        let mips = MipGenerator::new(&context.device);
        Self {
            instance_id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            info,
            caps,
            context,
            epoch: Instant::now(),
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
            staging: Mutex::new(staging),
            mips: Mutex::new(mips),
            secondaries: Mutex::new(HashMap::new()),
            counters: Mutex::new(WgpuStatistics::default()),
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

    /// Locks every table a replay touches, records `stream` and submits it.
    ///
    /// A failed replay discards everything it recorded.
    pub(crate) fn execute_stream(&self, stream: &CommandStream) -> CommandResult {
        let mut buffers = lock(&self.buffers, "buffers")?;
        let textures = lock(&self.textures, "textures")?;
        let samplers = lock(&self.samplers, "samplers")?;
        let layouts = lock(&self.layouts, "layouts")?;
        let pipelines = lock(&self.pipelines, "pipelines")?;
        let render_passes = lock(&self.render_passes, "render passes")?;
        let render_targets = lock(&self.render_targets, "render targets")?;
        let resource_heaps = lock(&self.resource_heaps, "resource heaps")?;
        let mut query_heaps = lock(&self.query_heaps, "query heaps")?;
        let mut staging = lock(&self.staging, "staging")?;
        let mut mips = lock(&self.mips, "mips")?;
        let secondaries = lock(&self.secondaries, "secondaries")?;
        let mut counters = lock(&self.counters, "counters")?;

        let result = WgpuExecutor::new(
            &self.context.device,
            WgpuTables {
                buffers: &mut buffers,
                textures: &textures,
                samplers: &samplers,
                layouts: &layouts,
                pipelines: &pipelines,
                render_passes: &render_passes,
                render_targets: &render_targets,
                resource_heaps: &resource_heaps,
                query_heaps: &mut query_heaps,
                staging: &mut staging,
                mips: &mut mips,
                secondaries: &secondaries,
                counters: &mut counters,
            },
            &self.caps.limits,
            self.epoch,
        )
        .run(stream);

        match result {
            Ok(()) => {
                staging.transfer.submit();
            }
            Err(ref err) => {
                log::warn!("WgpuDeviceInternal: replay failed, discarding commands: {err}");
                staging.transfer.discard();
            }
        }
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
            log::debug!("WgpuDeviceInternal: {:?} has no commands to submit", buffer.id());
            return Ok(());
        }
        log::trace!(
            "WgpuDeviceInternal: submitting {:?} ({} commands)",
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

impl CommandBufferHost for WgpuDeviceInternal {
    fn finish_recording(&self, buffer: &mut DeferredCommandBuffer) -> CommandResult {
        if buffer.is_secondary() {
            let stream = Arc::new(buffer.stream().clone());
            lock(&self.secondaries, "secondaries")?.insert(buffer.id(), stream);
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
                    log::trace!("WgpuDeviceInternal: released secondary command buffer {:?}", id);
                }
            }
            Err(e) => log::warn!("WgpuDeviceInternal: failed to release {:?}: {}", id, e),
        }
    }
}
