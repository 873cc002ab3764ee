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

use super::{
    align_up, ResourceState, StagingBuffer, StagingDevice, StagingHeap, StagingMemory,
    TrackedResource, TransferContext,
};
use crate::renderer::api::MappedWriteRange;
use crate::renderer::error::ResourceError;

/// Alignment of writes within a staging chunk.
pub const STAGING_ALIGNMENT: u64 = 256;

/// Minimum alignment used when the global upload or readback buffer grows.
pub const UPLOAD_BUFFER_ALIGNMENT: u64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MapState {
    Unmapped,
    Feedback,
    Upload,
}

/// A pool of staging memory for buffer transfers.
///
/// Deferred writes (`write_staged`) are packed into chunks that are recycled by
/// [`reset`](Self::reset) once the transfers using them have been submitted.
/// Immediate writes and readbacks use one growable buffer each and submit right
/// away.
#[derive(Debug)]
pub struct StagingBufferPool<D: StagingDevice> {
    device: D,
    chunk_size: u64,
    chunks: Vec<StagingBuffer<D::Memory>>,
    chunk_idx: usize,
    global_upload: Option<StagingBuffer<D::Memory>>,
    global_readback: Option<StagingBuffer<D::Memory>>,
    mapped: Vec<u8>,
    map_state: MapState,
}

impl<D: StagingDevice> StagingBufferPool<D> {
    /// Creates an empty pool. Chunks are allocated on demand with at least `chunk_size` bytes.
    pub fn new(device: D, chunk_size: u64) -> Self {
        Self {
            device,
            chunk_size: chunk_size.max(STAGING_ALIGNMENT),
            chunks: Vec::new(),
            chunk_idx: 0,
            global_upload: None,
            global_readback: None,
            mapped: Vec::new(),
            map_state: MapState::Unmapped,
        }
    }

    /// The allocating device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Minimum chunk size.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Number of allocated chunks.
    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Index of the chunk used by the next deferred write.
    pub fn chunk_index(&self) -> usize {
        self.chunk_idx
    }

    /// Size of the global upload buffer, `0` before the first immediate write.
    pub fn upload_buffer_size(&self) -> u64 {
        self.global_upload.as_ref().map_or(0, StagingBuffer::size)
    }

    /// Rewinds every chunk. Call once all deferred writes have been submitted.
    pub fn reset(&mut self) {
        for chunk in &mut self.chunks {
            chunk.reset();
        }
        self.chunk_idx = 0;
    }

    /// Stages `data` and records a copy into `dst` without submitting it.
    ///
    /// The first chunk at or after the current index with enough room is used;
    /// otherwise a new chunk of `max(chunk_size, data.len())` bytes is allocated.
    pub fn write_staged<C>(
        &mut self,
        context: &mut C,
        dst: &mut C::Resource,
        dst_offset: u64,
        data: &[u8],
    ) -> Result<(), ResourceError>
    where
        C: TransferContext<D::Memory> + ?Sized,
    {
        let size = data.len() as u64;
        while self.chunk_idx < self.chunks.len() && !self.chunks[self.chunk_idx].capacity(size) {
            self.chunk_idx += 1;
        }
        if self.chunk_idx == self.chunks.len() {
            self.alloc_chunk(size)?;
        }

        let old_state = dst.resource_state();
        context.transition_resource(dst, ResourceState::CopyDest);
        let result =
            self.chunks[self.chunk_idx].write_and_increment_offset(context, dst, dst_offset, data);
        context.transition_resource(dst, old_state);
        result
    }

    /// Uploads `data` into `dst` through the global upload buffer and waits for
    /// the copy to complete.
    pub fn write_immediate<C>(
        &mut self,
        context: &mut C,
        dst: &mut C::Resource,
        dst_offset: u64,
        data: &[u8],
        alignment: u64,
    ) -> Result<(), ResourceError>
    where
        C: TransferContext<D::Memory> + ?Sized,
    {
        let size = data.len() as u64;
        let needed = align_up(size, alignment.max(1));
        let upload = Self::ensure_global(
            &self.device,
            &mut self.global_upload,
            StagingHeap::Upload,
            needed,
        )?;
        upload.reset();

        let old_state = dst.resource_state();
        context.transition_resource(dst, ResourceState::CopyDest);
        let result = upload.write_and_increment_offset(context, dst, dst_offset, data);
        context.transition_resource(dst, old_state);
        result?;
        context.finish_and_submit(true)
    }

    /// Copies `out.len()` bytes at `src_offset` from `src` to the CPU.
    ///
    /// Pending transfers are submitted and waited for.
    pub fn read_subresource_region<C>(
        &mut self,
        context: &mut C,
        src: &mut C::Resource,
        src_offset: u64,
        out: &mut [u8],
    ) -> Result<(), ResourceError>
    where
        C: TransferContext<D::Memory> + ?Sized,
    {
        let size = out.len() as u64;
        if size == 0 {
            return Ok(());
        }
        let readback = Self::ensure_global(
            &self.device,
            &mut self.global_readback,
            StagingHeap::Readback,
            size,
        )?;

        let old_state = src.resource_state();
        context.transition_resource(src, ResourceState::CopySource);
        let result =
            context.copy_resource_to_memory(readback.memory_mut(), 0, src, src_offset, size);
        context.transition_resource(src, old_state);
        result?;
        context.finish_and_submit(true)?;
        readback.memory_mut().read(0, out)
    }

    /// Reads a range of `src` into CPU memory owned by the pool.
    ///
    /// The returned bytes stay valid until [`unmap_feedback_buffer`](Self::unmap_feedback_buffer).
    pub fn map_feedback_buffer<C>(
        &mut self,
        context: &mut C,
        src: &mut C::Resource,
        offset: u64,
        size: u64,
    ) -> Result<&[u8], ResourceError>
    where
        C: TransferContext<D::Memory> + ?Sized,
    {
        self.begin_map(MapState::Feedback)?;
        let mut scratch = std::mem::take(&mut self.mapped);
        scratch.clear();
        scratch.resize(size as usize, 0);
        let result = self.read_subresource_region(context, src, offset, &mut scratch);
        self.mapped = scratch;
        if let Err(err) = result {
            self.map_state = MapState::Unmapped;
            return Err(err);
        }
        Ok(&self.mapped)
    }

    /// Releases a feedback mapping.
    pub fn unmap_feedback_buffer(&mut self) -> Result<(), ResourceError> {
        self.end_map(MapState::Feedback)
    }

    /// Opens `size` bytes of CPU memory that are copied into a resource on unmap.
    ///
    /// With `preserve`, the memory starts with the current contents of `dst`;
    /// otherwise it is zeroed.
    pub fn map_upload_buffer<C>(
        &mut self,
        context: &mut C,
        dst: &mut C::Resource,
        offset: u64,
        size: u64,
        preserve: bool,
    ) -> Result<&mut [u8], ResourceError>
    where
        C: TransferContext<D::Memory> + ?Sized,
    {
        self.begin_map(MapState::Upload)?;
        let mut scratch = std::mem::take(&mut self.mapped);
        scratch.clear();
        scratch.resize(size as usize, 0);
        let result = if preserve {
            self.read_subresource_region(context, dst, offset, &mut scratch)
        } else {
            Ok(())
        };
        self.mapped = scratch;
        if let Err(err) = result {
            self.map_state = MapState::Unmapped;
            return Err(err);
        }
        Ok(&mut self.mapped)
    }

    /// Copies the `written` part of the upload mapping into `dst` at `offset`
    /// and submits the copy.
    pub fn unmap_upload_buffer<C>(
        &mut self,
        context: &mut C,
        dst: &mut C::Resource,
        offset: u64,
        written: MappedWriteRange,
    ) -> Result<(), ResourceError>
    where
        C: TransferContext<D::Memory> + ?Sized,
    {
        self.end_map(MapState::Upload)?;
        if written.is_empty() {
            return Ok(());
        }
        let range = written.as_range();
        if range.end > self.mapped.len() {
            return Err(ResourceError::OutOfBounds {
                offset: written.begin,
                size: written.len(),
                limit: self.mapped.len() as u64,
            });
        }
        let data = std::mem::take(&mut self.mapped);
        let result = self.write_immediate(
            context,
            dst,
            offset + written.begin,
            &data[range],
            STAGING_ALIGNMENT,
        );
        self.mapped = data;
        result
    }

    fn begin_map(&mut self, state: MapState) -> Result<(), ResourceError> {
        if self.map_state != MapState::Unmapped {
            return Err(ResourceError::InvalidAccess(
                "staging pool is already mapped".to_string(),
            ));
        }
        self.map_state = state;
        Ok(())
    }

    fn end_map(&mut self, state: MapState) -> Result<(), ResourceError> {
        if self.map_state != state {
            return Err(ResourceError::InvalidAccess(format!(
                "unmap without matching map ({:?})",
                self.map_state
            )));
        }
        self.map_state = MapState::Unmapped;
        Ok(())
    }

    fn alloc_chunk(&mut self, min_size: u64) -> Result<(), ResourceError> {
        let size = self.chunk_size.max(align_up(min_size, STAGING_ALIGNMENT));
        let memory = self.device.allocate(StagingHeap::Upload, size)?;
        log::debug!(
            "StagingBufferPool: allocated chunk #{} ({} bytes)",
            self.chunks.len(),
            size
        );
        self.chunks.push(StagingBuffer::new(memory, STAGING_ALIGNMENT));
        self.chunk_idx = self.chunks.len() - 1;
        Ok(())
    }

    fn ensure_global<'b>(
        device: &D,
        slot: &'b mut Option<StagingBuffer<D::Memory>>,
        heap: StagingHeap,
        size: u64,
    ) -> Result<&'b mut StagingBuffer<D::Memory>, ResourceError> {
        let too_small = slot.as_ref().is_none_or(|buffer| buffer.size() < size);
        if too_small {
            let alloc_size = align_up(size, UPLOAD_BUFFER_ALIGNMENT);
            log::debug!(
                "StagingBufferPool: growing {:?} buffer to {} bytes",
                heap,
                alloc_size
            );
            *slot = Some(StagingBuffer::new(
                device.allocate(heap, alloc_size)?,
                STAGING_ALIGNMENT,
            ));
        }
        slot.as_mut().ok_or_else(|| {
            ResourceError::BackendError("staging buffer allocation vanished".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::staging::{HostMemory, HostStagingDevice, TransferQueue};

    #[derive(Debug)]
    struct FakeResource {
        data: Vec<u8>,
        state: ResourceState,
    }

    impl FakeResource {
        fn new(size: usize, state: ResourceState) -> Self {
            Self {
                data: vec![0; size],
                state,
            }
        }
    }

    impl TrackedResource for FakeResource {
        fn resource_state(&self) -> ResourceState {
            self.state
        }

        fn set_resource_state(&mut self, state: ResourceState) {
            self.state = state;
        }
    }

    #[derive(Default)]
    struct FakeContext {
        submits: usize,
        pending_copies: usize,
        states_seen: Vec<ResourceState>,
    }

    impl TransferQueue for FakeContext {
        fn finish_and_submit(&mut self, _wait: bool) -> Result<(), ResourceError> {
            self.submits += 1;
            self.pending_copies = 0;
            Ok(())
        }
    }

    impl TransferContext<HostMemory> for FakeContext {
        type Resource = FakeResource;

        fn copy_memory_to_resource(
            &mut self,
            dst: &mut FakeResource,
            dst_offset: u64,
            src: &HostMemory,
            src_offset: u64,
            size: u64,
        ) -> Result<(), ResourceError> {
            self.states_seen.push(dst.state);
            let (d, s, n) = (dst_offset as usize, src_offset as usize, size as usize);
            dst.data[d..d + n].copy_from_slice(&src.as_slice()[s..s + n]);
            self.pending_copies += 1;
            Ok(())
        }

        fn copy_resource_to_memory(
            &mut self,
            dst: &mut HostMemory,
            dst_offset: u64,
            src: &FakeResource,
            src_offset: u64,
            size: u64,
        ) -> Result<(), ResourceError> {
            self.states_seen.push(src.state);
            let s = src_offset as usize;
            dst.write(dst_offset, &src.data[s..s + size as usize])
        }
    }

    #[test]
    fn test_staged_writes_share_chunks_until_full() {
        let mut pool = StagingBufferPool::new(HostStagingDevice, 1024);
        let mut ctx = FakeContext::default();
        let mut dst = FakeResource::new(4096, ResourceState::VertexAndConstantBuffer);

        pool.write_staged(&mut ctx, &mut dst, 0, &[1; 100]).unwrap();
        pool.write_staged(&mut ctx, &mut dst, 100, &[2; 100]).unwrap();
        assert_eq!(pool.num_chunks(), 1);
        assert_eq!(ctx.pending_copies, 2);
        assert_eq!(ctx.submits, 0);

        // Two aligned writes use 512 bytes: one more 512-byte write fits, the next does not.
        pool.write_staged(&mut ctx, &mut dst, 200, &[3; 512]).unwrap();
        assert_eq!(pool.num_chunks(), 1);
        pool.write_staged(&mut ctx, &mut dst, 712, &[4; 512]).unwrap();
        assert_eq!(pool.num_chunks(), 2);
        assert_eq!(pool.chunk_index(), 1);

        assert_eq!(&dst.data[95..105], &[1, 1, 1, 1, 1, 2, 2, 2, 2, 2]);
        assert_eq!(dst.data[712], 4);
        assert_eq!(dst.state, ResourceState::VertexAndConstantBuffer);
        assert!(ctx
            .states_seen
            .iter()
            .all(|state| *state == ResourceState::CopyDest));
    }

    #[test]
    fn test_oversized_write_gets_dedicated_chunk() {
        let mut pool = StagingBufferPool::new(HostStagingDevice, 1024);
        let mut ctx = FakeContext::default();
        let mut dst = FakeResource::new(8192, ResourceState::Common);

        pool.write_staged(&mut ctx, &mut dst, 0, &[7; 3000]).unwrap();
        assert_eq!(pool.num_chunks(), 1);
        assert_eq!(pool.chunks[0].size(), 3072);
        assert_eq!(dst.data[2999], 7);
    }

    #[test]
    fn test_reset_rewinds_all_chunks() {
        let mut pool = StagingBufferPool::new(HostStagingDevice, 256);
        let mut ctx = FakeContext::default();
        let mut dst = FakeResource::new(1024, ResourceState::Common);

        pool.write_staged(&mut ctx, &mut dst, 0, &[1; 256]).unwrap();
        pool.write_staged(&mut ctx, &mut dst, 256, &[2; 256]).unwrap();
        assert_eq!(pool.num_chunks(), 2);

        pool.reset();
        assert_eq!(pool.chunk_index(), 0);
        pool.write_staged(&mut ctx, &mut dst, 512, &[3; 256]).unwrap();
        pool.write_staged(&mut ctx, &mut dst, 768, &[4; 256]).unwrap();
        assert_eq!(pool.num_chunks(), 2);
    }

    #[test]
    fn test_write_immediate_grows_upload_buffer_and_submits() {
        let mut pool = StagingBufferPool::new(HostStagingDevice, 1024);
        let mut ctx = FakeContext::default();
        let mut dst = FakeResource::new(10_000, ResourceState::IndexBuffer);

        pool.write_immediate(&mut ctx, &mut dst, 0, &[5; 10], 4).unwrap();
        assert_eq!(pool.upload_buffer_size(), 4096);
        pool.write_immediate(&mut ctx, &mut dst, 16, &[6; 5000], 4).unwrap();
        assert_eq!(pool.upload_buffer_size(), 8192);
        assert_eq!(ctx.submits, 2);
        assert_eq!(dst.state, ResourceState::IndexBuffer);
        assert_eq!(dst.data[9], 5);
        assert_eq!(dst.data[5015], 6);
    }

    #[test]
    fn test_readback_restores_source_state() {
        let mut pool = StagingBufferPool::new(HostStagingDevice, 1024);
        let mut ctx = FakeContext::default();
        let mut src = FakeResource::new(64, ResourceState::UnorderedAccess);
        src.data[10..14].copy_from_slice(&[9, 8, 7, 6]);

        let mut out = [0u8; 4];
        pool.read_subresource_region(&mut ctx, &mut src, 10, &mut out)
            .unwrap();
        assert_eq!(out, [9, 8, 7, 6]);
        assert_eq!(ctx.states_seen, vec![ResourceState::CopySource]);
        assert_eq!(src.state, ResourceState::UnorderedAccess);
        assert_eq!(ctx.submits, 1);
    }

    #[test]
    fn test_upload_mapping_copies_only_written_range() {
        let mut pool = StagingBufferPool::new(HostStagingDevice, 1024);
        let mut ctx = FakeContext::default();
        let mut dst = FakeResource::new(32, ResourceState::Common);
        dst.data.fill(0xFF);

        let mapped = pool
            .map_upload_buffer(&mut ctx, &mut dst, 8, 16, false)
            .unwrap();
        assert_eq!(mapped.len(), 16);
        mapped[4..6].copy_from_slice(&[1, 2]);
        assert!(pool.map_upload_buffer(&mut ctx, &mut dst, 0, 4, false).is_err());

        pool.unmap_upload_buffer(&mut ctx, &mut dst, 8, MappedWriteRange { begin: 4, end: 6 })
            .unwrap();
        assert_eq!(&dst.data[11..15], &[0xFF, 1, 2, 0xFF]);
    }

    #[test]
    fn test_feedback_mapping_requires_matching_unmap() {
        let mut pool = StagingBufferPool::new(HostStagingDevice, 1024);
        let mut ctx = FakeContext::default();
        let mut src = FakeResource::new(16, ResourceState::Common);
        src.data[0] = 42;

        assert!(pool.unmap_feedback_buffer().is_err());
        let bytes = pool.map_feedback_buffer(&mut ctx, &mut src, 0, 4).unwrap();
        assert_eq!(bytes, &[42, 0, 0, 0]);
        assert!(matches!(
            pool.unmap_upload_buffer(&mut ctx, &mut src, 0, MappedWriteRange::EMPTY),
            Err(ResourceError::InvalidAccess(_))
        ));
        pool.unmap_feedback_buffer().unwrap();
    }
}
