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

use super::{StagingDevice, StagingHeap, StagingMemory};
use crate::renderer::api::check_range;
use crate::renderer::error::ResourceError;

/// Staging memory in system RAM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMemory {
    heap: StagingHeap,
    data: Vec<u8>,
}

impl HostMemory {
    /// Allocates zeroed memory.
    pub fn new(heap: StagingHeap, size: u64) -> Self {
        Self {
            heap,
            data: vec![0; size as usize],
        }
    }

    /// The heap the memory belongs to.
    pub fn heap(&self) -> StagingHeap {
        self.heap
    }

    /// The bytes of the allocation.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl StagingMemory for HostMemory {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let range = check_range(offset, data.len() as u64, self.size())?;
        self.data[range.start as usize..range.end as usize].copy_from_slice(data);
        Ok(())
    }

    fn read(&mut self, offset: u64, out: &mut [u8]) -> Result<(), ResourceError> {
        let range = check_range(offset, out.len() as u64, self.size())?;
        out.copy_from_slice(&self.data[range.start as usize..range.end as usize]);
        Ok(())
    }
}

/// Allocates [`HostMemory`] for CPU-emulated devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostStagingDevice;

impl StagingDevice for HostStagingDevice {
    type Memory = HostMemory;

    fn allocate(&self, heap: StagingHeap, size: u64) -> Result<HostMemory, ResourceError> {
        log::trace!("HostStagingDevice: allocating {} bytes ({:?})", size, heap);
        Ok(HostMemory::new(heap, size))
    }
}
