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

//! Staging memory backed by wgpu buffers.

use super::resources::WgpuBuffer;
use prism_core::renderer::check_range;
use prism_core::renderer::staging::{
    align_up, StagingBufferPool, StagingDevice, StagingHeap, StagingMemory, TransferContext,
    TransferQueue,
};
use prism_core::renderer::ResourceError;
use std::ops::Range;

/// Buffer copies must start and end on this boundary.
pub(crate) const COPY_ALIGNMENT: u64 = wgpu::COPY_BUFFER_ALIGNMENT;

/// Smallest aligned range that covers `size` bytes at `offset`.
pub(crate) fn aligned_span(offset: u64, size: u64) -> Range<u64> {
    let start = offset - offset % COPY_ALIGNMENT;
    start..align_up(offset + size, COPY_ALIGNMENT)
}

fn backend_error(what: &str, e: impl std::fmt::Display) -> ResourceError {
    ResourceError::BackendError(format!("{what}: {e}"))
}

/// Rejects transfers whose offset or size is not a multiple of [`COPY_ALIGNMENT`].
pub(crate) fn check_aligned(offset: u64, size: u64) -> Result<(), ResourceError> {
    if offset % COPY_ALIGNMENT != 0 || size % COPY_ALIGNMENT != 0 {
        return Err(ResourceError::InvalidAccess(format!(
            "transfer of {size} bytes at offset {offset} is not {COPY_ALIGNMENT}-byte aligned"
        )));
    }
    Ok(())
}

/// Blocks until the device is idle.
pub(crate) fn wait_idle(device: &wgpu::Device) -> Result<(), ResourceError> {
    device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        })
        .map(|_| ())
        .map_err(|e| backend_error("Device poll failed", e))
}

/// Maps `buffer` for reading and copies `out.len()` bytes at `offset` out of it.
pub(crate) fn read_mapped(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
    offset: u64,
    out: &mut [u8],
) -> Result<(), ResourceError> {
    let range = check_range(offset, out.len() as u64, buffer.size())?;
    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    wait_idle(device)?;
    rx.recv()
        .map_err(|e| backend_error("Mapping callback dropped", e))?
        .map_err(|e| backend_error("Buffer mapping failed", e))?;
    {
        let data = slice.get_mapped_range();
        out.copy_from_slice(&data[range.start as usize..range.end as usize]);
    }
    buffer.unmap();
    Ok(())
}

/// A wgpu buffer used as upload or readback memory.
#[derive(Debug)]
pub(crate) struct WgpuStagingMemory {
    heap: StagingHeap,
    buffer: wgpu::Buffer,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl StagingMemory for WgpuStagingMemory {
    fn size(&self) -> u64 {
        self.buffer.size()
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        if self.heap != StagingHeap::Upload {
            return Err(ResourceError::InvalidAccess(
                "readback memory is not CPU-writable".to_string(),
            ));
        }
        let len = data.len() as u64;
        let padded = align_up(len, COPY_ALIGNMENT);
        check_range(offset, padded, self.size())?;
        if padded == len {
            self.queue.write_buffer(&self.buffer, offset, data);
        } else {
            let mut bytes = data.to_vec();
            bytes.resize(padded as usize, 0);
            self.queue.write_buffer(&self.buffer, offset, &bytes);
        }
        Ok(())
    }

    fn read(&mut self, offset: u64, out: &mut [u8]) -> Result<(), ResourceError> {
        if self.heap != StagingHeap::Readback {
            return Err(ResourceError::InvalidAccess(
                "upload memory is not CPU-readable".to_string(),
            ));
        }
        read_mapped(&self.device, &self.buffer, offset, out)
    }
}

/// Allocates staging buffers on a wgpu device.
#[derive(Debug, Clone)]
pub(crate) struct WgpuStagingDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl StagingDevice for WgpuStagingDevice {
    type Memory = WgpuStagingMemory;

    fn allocate(&self, heap: StagingHeap, size: u64) -> Result<WgpuStagingMemory, ResourceError> {
        let (label, usage) = match heap {
            StagingHeap::Upload => (
                "Prism Upload Buffer",
                wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
            ),
            StagingHeap::Readback => (
                "Prism Readback Buffer",
                wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            ),
        };
        let size = align_up(size.max(COPY_ALIGNMENT), COPY_ALIGNMENT);
        log::trace!("WgpuStagingDevice: allocating {size} bytes ({heap:?})");
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        });
        Ok(WgpuStagingMemory {
            heap,
            buffer,
            device: self.device.clone(),
            queue: self.queue.clone(),
        })
    }
}

/// Records buffer copies into a lazily created encoder.
#[derive(Debug)]
pub(crate) struct WgpuTransferContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    encoder: Option<wgpu::CommandEncoder>,
    num_copies: u64,
    num_submits: u64,
}

impl WgpuTransferContext {
    pub(crate) fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            encoder: None,
            num_copies: 0,
            num_submits: 0,
        }
    }

    /// The open encoder, created on first use.
    pub(crate) fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Prism Transfer Encoder"),
            })
        })
    }

    /// Drops recorded commands that were not submitted.
    pub(crate) fn discard(&mut self) {
        if self.encoder.take().is_some() {
            log::debug!("WgpuTransferContext: discarding unsubmitted commands");
        }
    }

    /// Submits recorded commands and returns the submission's index.
    pub(crate) fn submit(&mut self) -> wgpu::SubmissionIndex {
        let commands = self.encoder.take().map(|encoder| encoder.finish());
        self.num_submits += 1;
        self.queue.submit(commands)
    }

    pub(crate) fn num_copies(&self) -> u64 {
        self.num_copies
    }

    pub(crate) fn num_submits(&self) -> u64 {
        self.num_submits
    }
}

impl TransferQueue for WgpuTransferContext {
    fn finish_and_submit(&mut self, wait: bool) -> Result<(), ResourceError> {
        // Submitting without an encoder still flushes pending queue writes.
        self.submit();
        if wait {
            wait_idle(&self.device)?;
        }
        Ok(())
    }
}

impl TransferContext<WgpuStagingMemory> for WgpuTransferContext {
    type Resource = WgpuBuffer;

    fn copy_memory_to_resource(
        &mut self,
        dst: &mut WgpuBuffer,
        dst_offset: u64,
        src: &WgpuStagingMemory,
        src_offset: u64,
        size: u64,
    ) -> Result<(), ResourceError> {
        let size = align_up(size, COPY_ALIGNMENT);
        check_aligned(dst_offset, size)?;
        check_range(dst_offset, size, dst.buffer.size())?;
        check_range(src_offset, size, src.size())?;
        self.encoder()
            .copy_buffer_to_buffer(&src.buffer, src_offset, &dst.buffer, dst_offset, size);
        self.num_copies += 1;
        Ok(())
    }

    fn copy_resource_to_memory(
        &mut self,
        dst: &mut WgpuStagingMemory,
        dst_offset: u64,
        src: &WgpuBuffer,
        src_offset: u64,
        size: u64,
    ) -> Result<(), ResourceError> {
        check_aligned(src_offset, size)?;
        check_range(src_offset, size, src.buffer.size())?;
        check_range(dst_offset, size, dst.size())?;
        self.encoder()
            .copy_buffer_to_buffer(&src.buffer, src_offset, &dst.buffer, dst_offset, size);
        self.num_copies += 1;
        Ok(())
    }
}

/// The staging pool of a wgpu device together with its transfer context.
#[derive(Debug)]
pub(crate) struct WgpuStaging {
    pub(crate) pool: StagingBufferPool<WgpuStagingDevice>,
    pub(crate) transfer: WgpuTransferContext,
}

impl WgpuStaging {
    pub(crate) fn new(device: &wgpu::Device, queue: &wgpu::Queue, chunk_size: u64) -> Self {
        let staging_device = WgpuStagingDevice {
            device: device.clone(),
            queue: queue.clone(),
        };
        Self {
            pool: StagingBufferPool::new(staging_device, chunk_size),
            transfer: WgpuTransferContext::new(device.clone(), queue.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_span() {
        assert_eq!(aligned_span(0, 16), 0..16);
        assert_eq!(aligned_span(3, 2), 0..8);
        assert_eq!(aligned_span(6, 7), 4..16);
        assert_eq!(aligned_span(8, 0), 8..8);
    }
}
