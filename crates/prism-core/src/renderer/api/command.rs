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

//! Types shared by the command-recording interface.

use super::{BindFlags, BufferId, SamplerId, ShaderStageFlags, TextureId};
use bytemuck::{Pod, Zeroable};

/// A viewport rectangle with its depth range.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Viewport {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
    /// Near depth.
    pub min_depth: f32,
    /// Far depth.
    pub max_depth: f32,
}

impl Viewport {
    /// A viewport with the full `[0, 1]` depth range.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// A scissor rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
#[repr(C)]
pub struct Scissor {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl Scissor {
    /// Creates a scissor rectangle.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Format of index buffer elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum IndexFormat {
    /// 16-bit indices.
    UInt16 = 0,
    /// 32-bit indices.
    #[default]
    UInt32 = 1,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub fn size(self) -> u64 {
        match self {
            IndexFormat::UInt16 => 2,
            IndexFormat::UInt32 => 4,
        }
    }

    /// Decodes a format from its stream value.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(IndexFormat::UInt16),
            1 => Some(IndexFormat::UInt32),
            _ => None,
        }
    }
}

prism_bitflags! {
    /// Command buffer creation flags.
    pub struct CommandBufferFlags: u32 {
        /// The buffer is executed from a primary buffer via `execute`.
        const SECONDARY = 1 << 0;
        /// The recorded commands survive submission and can be submitted again.
        const MULTI_SUBMIT = 1 << 1;
        /// The buffer is submitted automatically when recording ends.
        const IMMEDIATE_SUBMIT = 1 << 2;
    }
}

prism_bitflags! {
    /// Storage resources that need a barrier between consecutive draws or dispatches.
    pub struct BarrierFlags: u32 {
        /// Writes to storage buffers become visible to later commands.
        const STORAGE_BUFFER = 1 << 0;
        /// Writes to storage textures become visible to later commands.
        const STORAGE_TEXTURE = 1 << 1;
        /// Both storage buffers and storage textures.
        const STORAGE = (1 << 0) | (1 << 1);
    }
}

/// Describes a command buffer to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandBufferDescriptor {
    /// Creation flags.
    pub flags: CommandBufferFlags,
    /// Number of native buffers to cycle through, at least one.
    pub num_native_buffers: u32,
    /// Initial capacity of the command stream in bytes.
    pub min_staging_pool_size: u64,
}

/// The kind of resource bound by `set_resource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceBinding {
    /// A buffer.
    Buffer(BufferId),
    /// A texture.
    Texture(TextureId),
    /// A sampler state.
    Sampler(SamplerId),
}

impl ResourceBinding {
    pub(crate) fn kind(&self) -> u32 {
        match self {
            ResourceBinding::Buffer(_) => 0,
            ResourceBinding::Texture(_) => 1,
            ResourceBinding::Sampler(_) => 2,
        }
    }

    pub(crate) fn raw(&self) -> u64 {
        match self {
            ResourceBinding::Buffer(id) => id.0,
            ResourceBinding::Texture(id) => id.0,
            ResourceBinding::Sampler(id) => id.0,
        }
    }

    pub(crate) fn from_raw(kind: u32, raw: u64) -> Option<Self> {
        match kind {
            0 => Some(ResourceBinding::Buffer(BufferId(raw))),
            1 => Some(ResourceBinding::Texture(TextureId(raw))),
            2 => Some(ResourceBinding::Sampler(SamplerId(raw))),
            _ => None,
        }
    }
}

/// Kind of slots cleared by `reset_resource_slots`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
#[allow(missing_docs)]
pub enum ResourceSlotKind {
    Buffer = 0,
    Texture = 1,
    Sampler = 2,
}

impl ResourceSlotKind {
    /// Decodes a slot kind from its stream value.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(ResourceSlotKind::Buffer),
            1 => Some(ResourceSlotKind::Texture),
            2 => Some(ResourceSlotKind::Sampler),
            _ => None,
        }
    }
}

/// A range of binding slots to reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceSlotRange {
    /// Kind of resource slots.
    pub kind: ResourceSlotKind,
    /// First slot.
    pub first_slot: u32,
    /// Number of slots.
    pub num_slots: u32,
    /// Binding points to reset (constant buffers, storage, stream output...).
    pub bind_flags: BindFlags,
    /// Stages whose slots are reset.
    pub stages: ShaderStageFlags,
}

/// How a conditional render interprets its occlusion query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
#[allow(missing_docs)]
pub enum RenderConditionMode {
    #[default]
    Wait = 0,
    NoWait = 1,
    ByRegionWait = 2,
    ByRegionNoWait = 3,
    WaitInverted = 4,
    NoWaitInverted = 5,
}

impl RenderConditionMode {
    /// Decodes a mode from its stream value.
    pub fn from_raw(raw: u32) -> Option<Self> {
        use RenderConditionMode::*;
        [Wait, NoWait, ByRegionWait, ByRegionNoWait, WaitInverted, NoWaitInverted]
            .into_iter()
            .find(|m| *m as u32 == raw)
    }

    /// Returns `true` if rendering happens when the query result is zero.
    pub fn is_inverted(self) -> bool {
        matches!(
            self,
            RenderConditionMode::WaitInverted | RenderConditionMode::NoWaitInverted
        )
    }
}

/// Layout of the arguments of `draw_indirect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct DrawIndirectArguments {
    /// Vertices per instance.
    pub num_vertices: u32,
    /// Number of instances.
    pub num_instances: u32,
    /// First vertex.
    pub first_vertex: u32,
    /// First instance.
    pub first_instance: u32,
}

/// Layout of the arguments of `draw_indexed_indirect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct DrawIndexedIndirectArguments {
    /// Indices per instance.
    pub num_indices: u32,
    /// Number of instances.
    pub num_instances: u32,
    /// First index.
    pub first_index: u32,
    /// Value added to each index.
    pub vertex_offset: i32,
    /// First instance.
    pub first_instance: u32,
}

/// Layout of the arguments of `dispatch_indirect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct DispatchIndirectArguments {
    /// Work groups along X.
    pub x: u32,
    /// Work groups along Y.
    pub y: u32,
    /// Work groups along Z.
    pub z: u32,
}
