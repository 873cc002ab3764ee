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

use std::time::Duration;

use crate::renderer::api::{FenceId, QueryHeapId};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::{CommandBuffer, CommandResult};

/// The queue that executes recorded command buffers.
pub trait CommandQueue: Send + Sync {
    /// Executes a finished command buffer.
    ///
    /// The buffer's commands are dropped afterwards unless it was created with
    /// [`MULTI_SUBMIT`](crate::renderer::api::CommandBufferFlags::MULTI_SUBMIT).
    /// Submitting a buffer that is still recording or a secondary buffer is an error.
    /// An empty buffer is accepted and does nothing.
    fn submit(&self, command_buffer: &mut dyn CommandBuffer) -> CommandResult;

    /// Signals `fence` once all previously submitted work has completed.
    fn submit_fence(&self, fence: FenceId) -> Result<(), ResourceError>;

    /// Waits for `fence` up to `timeout`. Returns `false` on timeout.
    fn wait_fence(&self, fence: FenceId, timeout: Duration) -> Result<bool, ResourceError>;

    /// Blocks until the queue is idle.
    fn wait_idle(&self) -> Result<(), ResourceError>;

    /// Reads `num_queries` results starting at `first_query`.
    ///
    /// Returns `Ok(None)` when the results are not available yet.
    fn query_result(
        &self,
        heap: QueryHeapId,
        first_query: u32,
        num_queries: u32,
    ) -> Result<Option<Vec<u64>>, ResourceError>;
}
