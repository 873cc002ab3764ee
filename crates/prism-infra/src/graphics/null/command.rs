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

use super::device::NullDeviceInternal;
use crate::graphics::lock;
use prism_core::renderer::command::DeferredCommandBuffer;
use prism_core::renderer::{
    check_range, CommandBuffer, CommandError, CommandQueue, CommandResult, FenceId,
    QueryHeapId, ResourceError,
};
use std::sync::Arc;
use std::time::Duration;

/// The queue of a null device. Work completes during `submit`.
#[derive(Debug, Clone)]
pub struct NullCommandQueue {
    internal: Arc<NullDeviceInternal>,
}

impl NullCommandQueue {
    pub(crate) fn new(internal: Arc<NullDeviceInternal>) -> Self {
        Self { internal }
    }
}

impl CommandQueue for NullCommandQueue {
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
        fence.signaled = true;
        Ok(())
    }

    fn wait_fence(&self, fence: FenceId, _timeout: Duration) -> Result<bool, ResourceError> {
        let fences = lock(&self.internal.fences, "fences")?;
        let fence = fences.get(&fence).ok_or(ResourceError::NotFound)?;
        Ok(fence.signaled)
    }

    fn wait_idle(&self) -> Result<(), ResourceError> {
        Ok(())
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
