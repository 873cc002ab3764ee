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

use super::{align_up, StagingMemory, TransferContext};
use crate::renderer::error::ResourceError;

/// One staging allocation with a linear write cursor.
#[derive(Debug)]
pub struct StagingBuffer<M> {
    memory: M,
    size: u64,
    offset: u64,
    alignment: u64,
}

impl<M: StagingMemory> StagingBuffer<M> {
    /// Wraps `memory`. Every write advances the cursor by a multiple of `alignment`.
    pub fn new(memory: M, alignment: u64) -> Self {
        let size = memory.size();
        Self {
            memory,
            size,
            offset: 0,
            alignment: alignment.max(1),
        }
    }

    /// Size of the allocation.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Current write cursor.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns `true` if `data_size` more bytes fit behind the cursor.
    pub fn capacity(&self, data_size: u64) -> bool {
        self.offset
            .checked_add(data_size)
            .is_some_and(|end| end <= self.size)
    }

    /// Rewinds the cursor.
    pub fn reset(&mut self) {
        self.offset = 0;
    }

    /// The underlying memory.
    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// The underlying memory, mutably.
    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    /// Writes `data` at `offset` without touching the cursor.
    pub fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        self.memory.write(offset, data)
    }

    /// Writes `data` at the cursor, records a copy into `dst` and advances the cursor.
    pub fn write_and_increment_offset<C>(
        &mut self,
        context: &mut C,
        dst: &mut C::Resource,
        dst_offset: u64,
        data: &[u8],
    ) -> Result<(), ResourceError>
    where
        C: TransferContext<M> + ?Sized,
    {
        let size = data.len() as u64;
        if !self.capacity(size) {
            return Err(ResourceError::OutOfBounds {
                offset: self.offset,
                size,
                limit: self.size,
            });
        }
        self.memory.write(self.offset, data)?;
        context.copy_memory_to_resource(dst, dst_offset, &self.memory, self.offset, size)?;
        self.offset = align_up(self.offset + size, self.alignment).min(self.size);
        Ok(())
    }
}
