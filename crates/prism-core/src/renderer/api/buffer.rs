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

//! Buffer descriptors, binding flags and CPU mapping.

use super::{Format, VertexAttribute};
use crate::renderer::error::ResourceError;
use std::borrow::Cow;
use std::ops::Range;

/// Size in bytes of the transform-feedback counter that trails the user data of
/// stream-output buffers.
pub const STREAM_OUTPUT_COUNTER_SIZE: u64 = 4;

/// Sentinel size meaning "until the end of the buffer".
pub const WHOLE_SIZE: u64 = u64::MAX;

prism_bitflags! {
    /// Describes how a resource will be bound to the pipeline.
    pub struct BindFlags: u32 {
        /// Usable as a vertex buffer.
        const VERTEX_BUFFER = 1 << 0;
        /// Usable as an index buffer.
        const INDEX_BUFFER = 1 << 1;
        /// Usable as a constant (uniform) buffer.
        const CONSTANT_BUFFER = 1 << 2;
        /// Usable as a stream-output (transform feedback) target.
        const STREAM_OUTPUT_BUFFER = 1 << 3;
        /// Usable as a source of indirect draw or dispatch arguments.
        const INDIRECT_BUFFER = 1 << 4;
        /// Readable from shaders (sampled texture or read-only buffer).
        const SAMPLED = 1 << 5;
        /// Readable and writable from shaders.
        const STORAGE = 1 << 6;
        /// Usable as a color attachment.
        const COLOR_ATTACHMENT = 1 << 7;
        /// Usable as a depth-stencil attachment.
        const DEPTH_STENCIL_ATTACHMENT = 1 << 8;
        /// Texture combined with a sampler in a single binding.
        const COMBINED_SAMPLER = 1 << 9;
        /// Usable as the source of copy commands.
        const COPY_SRC = 1 << 10;
        /// Usable as the destination of copy commands.
        const COPY_DST = 1 << 11;
    }
}

prism_bitflags! {
    /// CPU access rights requested for a resource.
    pub struct CpuAccessFlags: u32 {
        /// The CPU may read the resource.
        const READ = 1 << 0;
        /// The CPU may write the resource.
        const WRITE = 1 << 1;
    }
}

prism_bitflags! {
    /// Miscellaneous resource creation flags.
    pub struct MiscFlags: u32 {
        /// The resource is updated frequently by the CPU.
        const DYNAMIC_USAGE = 1 << 0;
        /// Initial contents are not zero-filled when no data is supplied.
        const NO_INITIAL_DATA = 1 << 1;
        /// Textures: allocate and generate the full mip chain.
        const GENERATE_MIPS = 1 << 2;
        /// Buffers: append/consume counter for storage buffers.
        const APPEND = 1 << 3;
    }
}

/// Access mode of a CPU mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CpuAccess {
    /// Read the current contents.
    ReadOnly,
    /// Write without reading. Untouched bytes keep their contents.
    WriteOnly,
    /// Write and discard the previous contents of the whole range.
    WriteDiscard,
    /// Read and write.
    ReadWrite,
}

impl CpuAccess {
    /// Returns `true` if the mapping exposes the current contents.
    pub fn has_read_access(self) -> bool {
        matches!(self, CpuAccess::ReadOnly | CpuAccess::ReadWrite)
    }

    /// Returns `true` if the mapping may modify the resource.
    pub fn has_write_access(self) -> bool {
        !matches!(self, CpuAccess::ReadOnly)
    }

    /// The access flags a resource must have been created with.
    pub fn required_flags(self) -> CpuAccessFlags {
        match self {
            CpuAccess::ReadOnly => CpuAccessFlags::READ,
            CpuAccess::WriteOnly | CpuAccess::WriteDiscard => CpuAccessFlags::WRITE,
            CpuAccess::ReadWrite => CpuAccessFlags::READ | CpuAccessFlags::WRITE,
        }
    }
}

/// Describes a buffer to create.
#[derive(Debug, Clone, Default)]
pub struct BufferDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Size of the user data in bytes.
    pub size: u64,
    /// Element stride for structured buffers, `0` for raw buffers.
    pub stride: u32,
    /// Element format for typed buffers and index buffers.
    pub format: Format,
    /// How the buffer will be bound.
    pub bind_flags: BindFlags,
    /// CPU access rights.
    pub cpu_access_flags: CpuAccessFlags,
    /// Miscellaneous flags.
    pub misc_flags: MiscFlags,
    /// Vertex layout for vertex buffers.
    pub vertex_attribs: Vec<VertexAttribute>,
}

impl BufferDescriptor<'_> {
    /// Detaches the descriptor from borrowed data so a backend can keep it.
    pub fn into_owned(self) -> BufferDescriptor<'static> {
        BufferDescriptor {
            label: self.label.map(|label| Cow::Owned(label.into_owned())),
            size: self.size,
            stride: self.stride,
            format: self.format,
            bind_flags: self.bind_flags,
            cpu_access_flags: self.cpu_access_flags,
            misc_flags: self.misc_flags,
            vertex_attribs: self.vertex_attribs,
        }
    }

    /// Returns `true` if this buffer is a stream-output target.
    pub fn is_stream_output(&self) -> bool {
        self.bind_flags.contains(BindFlags::STREAM_OUTPUT_BUFFER)
    }

    /// The size of the backing allocation. Stream-output buffers carry a
    /// transform-feedback counter after the user data.
    pub fn internal_size(&self) -> u64 {
        if self.is_stream_output() {
            self.size + STREAM_OUTPUT_COUNTER_SIZE
        } else {
            self.size
        }
    }

    /// Offset of the transform-feedback counter, `0` for other buffers.
    pub fn xfb_counter_offset(&self) -> u64 {
        if self.is_stream_output() {
            self.size
        } else {
            0
        }
    }

    /// Vertex stride taken from the first vertex attribute, never less than one.
    pub fn vertex_stride(&self) -> u32 {
        self.vertex_attribs
            .first()
            .map_or(1, |attrib| attrib.stride.max(1))
    }

    /// Checks the descriptor for inconsistencies before it reaches a backend.
    pub fn validate(&self) -> Result<(), ResourceError> {
        if self.size == 0 {
            return Err(ResourceError::InvalidDescriptor(
                "buffer size must be greater than zero".to_string(),
            ));
        }
        if self.bind_flags.contains(BindFlags::INDEX_BUFFER)
            && self.format != Format::Undefined
            && !self.format.is_index_format()
        {
            return Err(ResourceError::UnsupportedFormat(self.format));
        }
        Ok(())
    }
}

/// Checks that `offset..offset + size` lies within `limit` bytes.
pub fn check_range(offset: u64, size: u64, limit: u64) -> Result<Range<u64>, ResourceError> {
    match offset.checked_add(size) {
        Some(end) if end <= limit => Ok(offset..end),
        _ => Err(ResourceError::OutOfBounds {
            offset,
            size,
            limit,
        }),
    }
}

/// Resolves [`WHOLE_SIZE`] against the remaining bytes after `offset`.
pub fn resolve_size(offset: u64, size: u64, limit: u64) -> u64 {
    if size == WHOLE_SIZE {
        limit.saturating_sub(offset)
    } else {
        size
    }
}

/// The byte interval written through a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MappedWriteRange {
    /// First written byte.
    pub begin: u64,
    /// One past the last written byte.
    pub end: u64,
}

impl MappedWriteRange {
    /// No byte written.
    pub const EMPTY: Self = Self { begin: 0, end: 0 };

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.end <= self.begin
    }

    /// Number of written bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.begin)
    }

    /// Grows the range to include `offset..offset + size`.
    pub fn include(&mut self, offset: u64, size: u64) {
        if size == 0 {
            return;
        }
        if self.is_empty() {
            self.begin = offset;
            self.end = offset + size;
        } else {
            self.begin = self.begin.min(offset);
            self.end = self.end.max(offset + size);
        }
    }

    /// The smallest range covering every byte that differs between the two
    /// snapshots.
    pub fn from_diff(before: &[u8], after: &[u8]) -> Self {
        let len = before.len().min(after.len());
        let first = (0..len).find(|&i| before[i] != after[i]);
        match first {
            None => Self::EMPTY,
            Some(begin) => {
                let last = (begin..len)
                    .rev()
                    .find(|&i| before[i] != after[i])
                    .unwrap_or(begin);
                Self {
                    begin: begin as u64,
                    end: last as u64 + 1,
                }
            }
        }
    }

    /// The range as a `usize` slice range.
    pub fn as_range(&self) -> Range<usize> {
        self.begin as usize..self.end as usize
    }
}

/// A CPU view of mapped buffer memory.
///
/// Writes go through [`BufferMapping::write`] or [`BufferMapping::data_mut`] so that
/// the written interval is known when the mapping is released.
#[derive(Debug)]
pub struct BufferMapping<'a> {
    data: &'a mut [u8],
    access: CpuAccess,
    written: MappedWriteRange,
}

impl<'a> BufferMapping<'a> {
    /// Wraps mapped memory. For discarding writes the memory is zeroed first.
    pub fn new(data: &'a mut [u8], access: CpuAccess) -> Self {
        if access == CpuAccess::WriteDiscard {
            data.fill(0);
        }
        let written = if access == CpuAccess::WriteDiscard {
            MappedWriteRange {
                begin: 0,
                end: data.len() as u64,
            }
        } else {
            MappedWriteRange::EMPTY
        };
        Self {
            data,
            access,
            written,
        }
    }

    /// The access mode of this mapping.
    pub fn access(&self) -> CpuAccess {
        self.access
    }

    /// Number of mapped bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the mapping covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Mapped contents. For write-only mappings the contents are unspecified.
    pub fn data(&self) -> &[u8] {
        &*self.data
    }

    /// Mutable view of the whole mapping; marks every byte as written.
    pub fn data_mut(&mut self) -> Result<&mut [u8], ResourceError> {
        self.require_write()?;
        self.written.include(0, self.data.len() as u64);
        Ok(&mut *self.data)
    }

    /// Copies `bytes` to `offset` within the mapping.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), ResourceError> {
        self.require_write()?;
        let range = check_range(offset as u64, bytes.len() as u64, self.data.len() as u64)?;
        self.data[range.start as usize..range.end as usize].copy_from_slice(bytes);
        self.written.include(offset as u64, bytes.len() as u64);
        Ok(())
    }

    /// The interval written so far.
    pub fn written_range(&self) -> MappedWriteRange {
        self.written
    }

    fn require_write(&self) -> Result<(), ResourceError> {
        if self.access.has_write_access() {
            Ok(())
        } else {
            Err(ResourceError::InvalidAccess(
                "mapping was opened read-only".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_output_desc(size: u64) -> BufferDescriptor<'static> {
        BufferDescriptor {
            size,
            bind_flags: BindFlags::STREAM_OUTPUT_BUFFER,
            ..Default::default()
        }
    }

    #[test]
    fn test_stream_output_buffer_reserves_counter() {
        let desc = stream_output_desc(256);
        assert_eq!(desc.internal_size(), 256 + STREAM_OUTPUT_COUNTER_SIZE);
        assert_eq!(desc.xfb_counter_offset(), 256);

        let plain = BufferDescriptor {
            size: 256,
            bind_flags: BindFlags::VERTEX_BUFFER,
            ..Default::default()
        };
        assert_eq!(plain.internal_size(), 256);
        assert_eq!(plain.xfb_counter_offset(), 0);
    }

    #[test]
    fn test_vertex_stride_is_at_least_one() {
        let desc = BufferDescriptor {
            size: 16,
            ..Default::default()
        };
        assert_eq!(desc.vertex_stride(), 1);
    }

    #[test]
    fn test_validate_rejects_empty_and_non_index_formats() {
        let empty = BufferDescriptor::default();
        assert!(matches!(
            empty.validate(),
            Err(ResourceError::InvalidDescriptor(_))
        ));

        let bad_index = BufferDescriptor {
            size: 6,
            format: Format::RGBA8UNorm,
            bind_flags: BindFlags::INDEX_BUFFER,
            ..Default::default()
        };
        assert_eq!(
            bad_index.validate(),
            Err(ResourceError::UnsupportedFormat(Format::RGBA8UNorm))
        );
    }

    #[test]
    fn test_check_range_detects_overflow() {
        assert_eq!(check_range(4, 4, 8), Ok(4..8));
        assert!(check_range(6, 4, 8).is_err());
        assert!(check_range(u64::MAX, 2, 8).is_err());
        assert_eq!(resolve_size(3, WHOLE_SIZE, 8), 5);
    }

    #[test]
    fn test_cpu_access_rights() {
        assert!(CpuAccess::ReadWrite.has_read_access());
        assert!(!CpuAccess::WriteDiscard.has_read_access());
        assert!(!CpuAccess::ReadOnly.has_write_access());
        assert_eq!(
            CpuAccess::ReadWrite.required_flags(),
            CpuAccessFlags::READ | CpuAccessFlags::WRITE
        );
    }

    #[test]
    fn test_write_range_covers_changed_bytes() {
        let before = [0u8; 8];
        let mut after = before;
        after[2] = 1;
        after[5] = 9;
        let range = MappedWriteRange::from_diff(&before, &after);
        assert_eq!(range, MappedWriteRange { begin: 2, end: 6 });
        assert!(MappedWriteRange::from_diff(&before, &before).is_empty());
    }

    #[test]
    fn test_mapping_tracks_written_interval() {
        let mut memory = [7u8; 16];
        let mut mapping = BufferMapping::new(&mut memory, CpuAccess::WriteOnly);
        mapping.write(4, &[1, 2]).unwrap();
        mapping.write(10, &[3]).unwrap();
        assert_eq!(
            mapping.written_range(),
            MappedWriteRange { begin: 4, end: 11 }
        );
        assert!(mapping.write(15, &[0, 0]).is_err());
        drop(mapping);
        assert_eq!(memory[4..6], [1, 2]);
        assert_eq!(memory[0], 7);
    }

    #[test]
    fn test_read_only_mapping_rejects_writes() {
        let mut memory = [0u8; 4];
        let mut mapping = BufferMapping::new(&mut memory, CpuAccess::ReadOnly);
        assert!(mapping.write(0, &[1]).is_err());
        assert!(mapping.data_mut().is_err());
        assert!(mapping.written_range().is_empty());
    }

    #[test]
    fn test_discard_mapping_zeroes_and_marks_everything_written() {
        let mut memory = [9u8; 4];
        let mapping = BufferMapping::new(&mut memory, CpuAccess::WriteDiscard);
        assert_eq!(mapping.data(), &[0, 0, 0, 0]);
        assert_eq!(mapping.written_range().len(), 4);
    }
}
