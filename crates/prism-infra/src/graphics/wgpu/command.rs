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

use super::device::WgpuDeviceInternal;
use super::staging::wait_idle;
use crate::graphics::lock;
use prism_core::renderer::command::DeferredCommandBuffer;
use prism_core::renderer::{
    check_range, CommandBuffer, CommandError, CommandQueue, CommandResult, FenceId,
    QueryHeapId, ResourceError,
};
use std::sync::Arc;
use std::time::Duration;

/// The queue of a wgpu device.
///
/// Submitting replays the command buffer into a fresh encoder and hands the
/// result to the `wgpu::Queue`.
#[derive(Debug, Clone)]
pub struct WgpuCommandQueue {
    internal: Arc<WgpuDeviceInternal>,
}

impl WgpuCommandQueue {
    pub(crate) fn new(internal: Arc<WgpuDeviceInternal>) -> Self {
        Self { internal }
    }
}

impl CommandQueue for WgpuCommandQueue {
    fn submit(&self, command_buffer: &mut dyn CommandBuffer) -> CommandResult {
        let buffer = command_buffer
            .as_any_mut()
            .downcast_mut::<DeferredCommandBuffer>()
            .ok_or(CommandError::ForeignCommandBuffer)?;
        self.internal.submit(buffer)
    }

    fn submit_fence(&self, fence: FenceId) -> Result<(), ResourceError> {
        let mut fences = lock(&self.internal.fences, "fences")?;
        let fence = fences.get_mut(&fence).ok_or(ResourceError::NotFound)?;
        fence.submission = Some(self.internal.context.queue.submit([]));
        Ok(())
    }

    fn wait_fence(&self, fence: FenceId, timeout: Duration) -> Result<bool, ResourceError> {
        let submission = {
            let fences = lock(&self.internal.fences, "fences")?;
            let fence = fences.get(&fence).ok_or(ResourceError::NotFound)?;
            match &fence.submission {
                Some(submission) => submission.clone(),
                None => return Ok(false),
            }
        };
        match self.internal.context.device.poll(wgpu::PollType::Wait {
            submission_index: Some(submission),
            timeout: Some(timeout),
        }) {
            Ok(_) => Ok(true),
            Err(wgpu::PollError::Timeout) => Ok(false),
            Err(e) => Err(ResourceError::BackendError(format!(
                "Waiting for fence failed: {e}"
            ))),
        }
    }

    fn wait_idle(&self) -> Result<(), ResourceError> {
        wait_idle(&self.internal.context.device)
    }

    fn query_result(
        &self,
        heap: QueryHeapId,
        first_query: u32,
        num_queries: u32,
    ) -> Result<Option<Vec<u64>>, ResourceError> {
        let heaps = lock(&self.internal.query_heaps, "query heaps")?;
        let heap = heaps.get(&heap).ok_or(ResourceError::NotFound)?;
        let range = check_range(
            u64::from(first_query),
            u64::from(num_queries),
            heap.results.len() as u64,
        )?;
        let range = range.start as usize..range.end as usize;
        if heap.begun[range.clone()].iter().any(Option::is_some) {
            return Ok(None);
        }
        Ok(Some(heap.results[range].to_vec()))
    }
}
