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

//! Staging memory for CPU-to-GPU and GPU-to-CPU transfers.
//!
//! A [`StagingBufferPool`] owns upload chunks for deferred writes, a growable
//! upload buffer for immediate writes and a readback buffer. Backends plug in
//! through three traits: [`StagingDevice`] allocates memory, [`StagingMemory`]
//! moves bytes in and out of it, and [`TransferContext`] records copies between
//! staging memory and tracked resources.

mod buffer;
mod host;
mod pool;
mod state;

pub use self::buffer::StagingBuffer;
pub use self::host::{HostMemory, HostStagingDevice};
pub use self::pool::{StagingBufferPool, STAGING_ALIGNMENT, UPLOAD_BUFFER_ALIGNMENT};
pub use self::state::{ResourceState, TrackedResource};

use crate::renderer::error::ResourceError;

/// Which heap staging memory is allocated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StagingHeap {
    /// CPU-writable memory used as a copy source.
    Upload,
    /// CPU-readable memory used as a copy destination.
    Readback,
}

/// Rounds `value` up to the next multiple of `alignment`.
pub fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        value
    } else {
        value.div_ceil(alignment) * alignment
    }
}

/// CPU-accessible staging memory.
pub trait StagingMemory {
    /// Size of the allocation in bytes.
    fn size(&self) -> u64;

    /// Copies `data` into the memory at `offset`.
    fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Copies `out.len()` bytes at `offset` out of the memory.
    fn read(&mut self, offset: u64, out: &mut [u8]) -> Result<(), ResourceError>;
}

/// Allocates staging memory.
pub trait StagingDevice {
    /// The memory type handed out.
    type Memory: StagingMemory;

    /// Allocates `size` bytes from `heap`.
    fn allocate(&self, heap: StagingHeap, size: u64) -> Result<Self::Memory, ResourceError>;
}

/// Submits recorded transfers to the device.
pub trait TransferQueue {
    /// Submits pending transfers, blocking until they complete when `wait` is set.
    fn finish_and_submit(&mut self, wait: bool) -> Result<(), ResourceError>;
}

/// Records transfers between staging memory `M` and tracked resources.
pub trait TransferContext<M>: TransferQueue {
    /// The resource type transfers target.
    type Resource: TrackedResource + ?Sized;

    /// Moves `resource` into `state`.
    fn transition_resource(&mut self, resource: &mut Self::Resource, state: ResourceState) {
        let old = resource.resource_state();
        if old != state {
            log::trace!("Resource transition {:?} -> {:?}", old, state);
            resource.set_resource_state(state);
        }
    }

    /// Copies `size` bytes from staging memory into `dst`.
    fn copy_memory_to_resource(
        &mut self,
        dst: &mut Self::Resource,
        dst_offset: u64,
        src: &M,
        src_offset: u64,
        size: u64,
    ) -> Result<(), ResourceError>;

    /// Copies `size` bytes from `src` into staging memory.
    fn copy_resource_to_memory(
        &mut self,
        dst: &mut M,
        dst_offset: u64,
        src: &Self::Resource,
        src_offset: u64,
        size: u64,
    ) -> Result<(), ResourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(4097, 4096), 8192);
        assert_eq!(align_up(13, 1), 13);
    }
}
