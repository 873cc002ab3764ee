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

//! Fixed-size payload records that follow each opcode in a command stream.
//!
//! All records are `#[repr(C)]` plain data without implicit padding, so they can
//! be written with [`bytemuck::bytes_of`] and read back with
//! [`bytemuck::pod_read_unaligned`] regardless of their position in the stream.

use bytemuck::{Pod, Zeroable};

use crate::math::{Extent3D, Offset3D};
use crate::renderer::api::{ClearValue, TextureLocation, TextureRegion, TextureSubresource};

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct ExecuteRecord {
    pub command_buffer: u64,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct UpdateBufferRecord {
    pub buffer: u64,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct CopyBufferRecord {
    pub dst: u64,
    pub dst_offset: u64,
    pub src: u64,
    pub src_offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct FillBufferRecord {
    pub buffer: u64,
    pub offset: u64,
    pub size: u64,
    pub value: u32,
    pub _pad: u32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct LocationRecord {
    pub offset: [i32; 3],
    pub array_layer: u32,
    pub mip_level: u32,
}

impl From<&TextureLocation> for LocationRecord {
    fn from(location: &TextureLocation) -> Self {
        Self {
            offset: offset_to_array(location.offset),
            array_layer: location.array_layer,
            mip_level: location.mip_level,
        }
    }
}

impl From<LocationRecord> for TextureLocation {
    fn from(record: LocationRecord) -> Self {
        Self {
            offset: offset_from_array(record.offset),
            array_layer: record.array_layer,
            mip_level: record.mip_level,
        }
    }
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct CopyTextureRecord {
    pub dst: u64,
    pub src: u64,
    pub dst_location: LocationRecord,
    pub src_location: LocationRecord,
    pub extent: [u32; 3],
    pub _pad: u32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct RegionRecord {
    pub base_array_layer: u32,
    pub num_array_layers: u32,
    pub base_mip_level: u32,
    pub num_mip_levels: u32,
    pub offset: [i32; 3],
    pub extent: [u32; 3],
}

impl From<&TextureRegion> for RegionRecord {
    fn from(region: &TextureRegion) -> Self {
        Self {
            base_array_layer: region.subresource.base_array_layer,
            num_array_layers: region.subresource.num_array_layers,
            base_mip_level: region.subresource.base_mip_level,
            num_mip_levels: region.subresource.num_mip_levels,
            offset: offset_to_array(region.offset),
            extent: extent_to_array(region.extent),
        }
    }
}

impl From<RegionRecord> for TextureRegion {
    fn from(record: RegionRecord) -> Self {
        Self {
            subresource: TextureSubresource {
                base_array_layer: record.base_array_layer,
                num_array_layers: record.num_array_layers,
                base_mip_level: record.base_mip_level,
                num_mip_levels: record.num_mip_levels,
            },
            offset: offset_from_array(record.offset),
            extent: extent_from_array(record.extent),
        }
    }
}

/// Shared by both directions of texture/buffer copies.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct TextureBufferCopyRecord {
    pub texture: u64,
    pub buffer: u64,
    pub buffer_offset: u64,
    pub row_stride: u32,
    pub layer_stride: u32,
    pub region: RegionRecord,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct TextureRecord {
    pub texture: u64,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct GenerateMipsRangeRecord {
    pub texture: u64,
    pub base_mip_level: u32,
    pub num_mip_levels: u32,
    pub base_array_layer: u32,
    pub num_array_layers: u32,
}

/// Header of every variable-length array payload.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct ArrayRecord {
    pub count: u32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct BufferBindRecord {
    pub buffer: u64,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct IndexBufferRecord {
    pub buffer: u64,
    pub offset: u64,
    pub format: u32,
    pub _pad: u32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct ResourceHeapRecord {
    pub heap: u64,
    pub descriptor_set: u32,
    pub _pad: u32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct ResourceRecord {
    pub resource: u64,
    pub descriptor: u32,
    pub kind: u32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct ResetSlotsRecord {
    pub kind: u32,
    pub first_slot: u32,
    pub num_slots: u32,
    pub bind_flags: u32,
    pub stages: u32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct BeginRenderPassRecord {
    pub render_target: u64,
    pub render_pass: u64,
    pub num_clear_values: u32,
    pub _pad: u32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct ClearRecord {
    pub flags: u32,
    pub value: ClearValue,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct AttachmentClearRecord {
    pub flags: u32,
    pub color_attachment: u32,
    pub value: ClearValue,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct PipelineRecord {
    pub pipeline: u64,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct StencilReferenceRecord {
    pub reference: u32,
    pub face: u32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct UniformsRecord {
    pub first: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct QueryRecord {
    pub heap: u64,
    pub query: u32,
    pub _pad: u32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct RenderConditionRecord {
    pub heap: u64,
    pub query: u32,
    pub mode: u32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct DrawRecord {
    pub num_vertices: u32,
    pub first_vertex: u32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct DrawInstancedRecord {
    pub num_vertices: u32,
    pub first_vertex: u32,
    pub num_instances: u32,
    pub first_instance: u32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct DrawIndexedRecord {
    pub num_indices: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct DrawIndexedInstancedRecord {
    pub num_indices: u32,
    pub num_instances: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct IndirectRecord {
    pub buffer: u64,
    pub offset: u64,
    pub num_commands: u32,
    pub stride: u32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct DispatchRecord {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct DispatchIndirectRecord {
    pub buffer: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct DebugGroupRecord {
    pub len: u32,
}

pub(crate) fn offset_to_array(offset: Offset3D) -> [i32; 3] {
    [offset.x, offset.y, offset.z]
}

pub(crate) fn offset_from_array([x, y, z]: [i32; 3]) -> Offset3D {
    Offset3D { x, y, z }
}

pub(crate) fn extent_to_array(extent: Extent3D) -> [u32; 3] {
    [extent.width, extent.height, extent.depth]
}

pub(crate) fn extent_from_array([width, height, depth]: [u32; 3]) -> Extent3D {
    Extent3D {
        width,
        height,
        depth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_record_sizes_have_no_hidden_padding() {
        assert_eq!(size_of::<FillBufferRecord>(), 32);
        assert_eq!(size_of::<LocationRecord>(), 20);
        assert_eq!(size_of::<CopyTextureRecord>(), 72);
        assert_eq!(size_of::<RegionRecord>(), 40);
        assert_eq!(size_of::<TextureBufferCopyRecord>(), 72);
        assert_eq!(size_of::<ClearRecord>(), 28);
        assert_eq!(size_of::<AttachmentClearRecord>(), 32);
        assert_eq!(size_of::<BeginRenderPassRecord>(), 24);
    }

    #[test]
    fn test_region_record_preserves_subresource() {
        let region = TextureRegion {
            subresource: TextureSubresource {
                base_array_layer: 2,
                num_array_layers: 3,
                base_mip_level: 1,
                num_mip_levels: 1,
            },
            offset: Offset3D { x: -4, y: 5, z: 0 },
            extent: Extent3D::new(8, 4, 1),
        };
        let record = RegionRecord::from(&region);
        assert_eq!(TextureRegion::from(record), region);
    }
}
