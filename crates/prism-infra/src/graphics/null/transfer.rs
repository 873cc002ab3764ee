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

//! Transfers between host staging memory and null buffers.

use super::resources::NullBuffer;
use prism_core::renderer::check_range;
use prism_core::renderer::staging::{
    HostMemory, HostStagingDevice, StagingBufferPool, StagingMemory, TransferContext,
    TransferQueue,
};
use prism_core::renderer::ResourceError;

/// Copies bytes on the CPU as soon as a transfer is recorded.
#[derive(Debug, Default)]
pub(crate) struct NullTransferContext {
    num_copies: u64,
    num_submits: u64,
}

impl NullTransferContext {
    pub(crate) fn num_copies(&self) -> u64 {
        self.num_copies
    }

    pub(crate) fn num_submits(&self) -> u64 {
        self.num_submits
    }
}

impl TransferQueue for NullTransferContext {
    fn finish_and_submit(&mut self, wait: bool) -> Result<(), ResourceError> {
        self.num_submits += 1;
        log::trace!(
            "NullTransferContext: submit #{} (wait: {wait})",
            self.num_submits
        );
        Ok(())
    }
}

impl TransferContext<HostMemory> for NullTransferContext {
    type Resource = NullBuffer;

    fn copy_memory_to_resource(
        &mut self,
        dst: &mut NullBuffer,
        dst_offset: u64,
        src: &HostMemory,
        src_offset: u64,
        size: u64,
    ) -> Result<(), ResourceError> {
        let dst_range = check_range(dst_offset, size, dst.data.len() as u64)?;
        let src_range = check_range(src_offset, size, src.size())?;
        dst.data[dst_range.start as usize..dst_range.end as usize]
            .copy_from_slice(&src.as_slice()[src_range.start as usize..src_range.end as usize]);
        self.num_copies += 1;
        Ok(())
    }

    fn copy_resource_to_memory(
        &mut self,
        dst: &mut HostMemory,
        dst_offset: u64,
        src: &NullBuffer,
        src_offset: u64,
        size: u64,
    ) -> Result<(), ResourceError> {
        let src_range = check_range(src_offset, size, src.data.len() as u64)?;
        dst.write(
            dst_offset,
            &src.data[src_range.start as usize..src_range.end as usize],
        )?;
        self.num_copies += 1;
        Ok(())
    }
}

/// The staging pool of a null device together with its transfer context.
#[derive(Debug)]
pub(crate) struct NullStaging {
    pub(crate) pool: StagingBufferPool<HostStagingDevice>,
    pub(crate) transfer: NullTransferContext,
}

impl NullStaging {
    pub(crate) fn new(chunk_size: u64) -> Self {
        Self {
            pool: StagingBufferPool::new(HostStagingDevice, chunk_size),
            transfer: NullTransferContext::default(),
        }
    }
}
