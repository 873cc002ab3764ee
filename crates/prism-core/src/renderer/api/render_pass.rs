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

//! Render passes, render targets and clear values.

use super::{Format, RenderPassId, TextureId};
use crate::math::{ColorRgba, Extent2D};
use bytemuck::{Pod, Zeroable};
use std::borrow::Cow;

/// What happens to an attachment when a render pass begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttachmentLoadOp {
    /// Contents are undefined.
    Undefined,
    /// Previous contents are kept.
    #[default]
    Load,
    /// Contents are cleared with the pass's clear value.
    Clear,
}

/// What happens to an attachment when a render pass ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttachmentStoreOp {
    /// Contents may be discarded.
    Undefined,
    /// Contents are written back.
    #[default]
    Store,
}

/// Format and load/store behavior of one render-pass attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AttachmentFormatDescriptor {
    /// Attachment format.
    pub format: Format,
    /// Load operation.
    pub load_op: AttachmentLoadOp,
    /// Store operation.
    pub store_op: AttachmentStoreOp,
}

/// Describes a render pass.
#[derive(Debug, Clone, Default)]
pub struct RenderPassDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Color attachments.
    pub color_attachments: Vec<AttachmentFormatDescriptor>,
    /// Depth attachment.
    pub depth_attachment: Option<AttachmentFormatDescriptor>,
    /// Stencil attachment.
    pub stencil_attachment: Option<AttachmentFormatDescriptor>,
    /// Samples per pixel.
    pub samples: u32,
}

impl RenderPassDescriptor<'_> {
    /// Number of clear values the pass consumes: one per cleared color
    /// attachment plus one for a cleared depth or stencil attachment.
    pub fn num_clear_values(&self) -> usize {
        let colors = self
            .color_attachments
            .iter()
            .filter(|a| a.load_op == AttachmentLoadOp::Clear)
            .count();
        let depth_stencil = [self.depth_attachment, self.stencil_attachment]
            .iter()
            .flatten()
            .any(|a| a.load_op == AttachmentLoadOp::Clear);
        colors + usize::from(depth_stencil)
    }
}

/// One attachment of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AttachmentDescriptor {
    /// Texture to render into; `None` lets the backend allocate an internal one.
    pub texture: Option<TextureId>,
    /// Format of an internal attachment, ignored when `texture` is set.
    pub format: Format,
    /// Mip level of the texture.
    pub mip_level: u32,
    /// Array layer of the texture.
    pub array_layer: u32,
}

/// Describes an off-screen render target.
#[derive(Debug, Clone, Default)]
pub struct RenderTargetDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Render pass the target is compatible with.
    pub render_pass: Option<RenderPassId>,
    /// Size in pixels.
    pub resolution: Extent2D,
    /// Samples per pixel.
    pub samples: u32,
    /// Color attachments.
    pub color_attachments: Vec<AttachmentDescriptor>,
    /// Depth-stencil attachment.
    pub depth_stencil_attachment: Option<AttachmentDescriptor>,
}

prism_bitflags! {
    /// Which attachments a clear command affects.
    pub struct ClearFlags: u32 {
        /// Clear color attachments.
        const COLOR = 1 << 0;
        /// Clear the depth attachment.
        const DEPTH = 1 << 1;
        /// Clear the stencil attachment.
        const STENCIL = 1 << 2;
        /// Clear color and depth.
        const COLOR_DEPTH = (1 << 0) | (1 << 1);
        /// Clear depth and stencil.
        const DEPTH_STENCIL = (1 << 1) | (1 << 2);
        /// Clear everything.
        const ALL = (1 << 0) | (1 << 1) | (1 << 2);
    }
}

/// Values used to clear attachments.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ClearValue {
    /// Clear color.
    pub color: ColorRgba,
    /// Clear depth.
    pub depth: f32,
    /// Clear stencil.
    pub stencil: u32,
}

impl Default for ClearValue {
    fn default() -> Self {
        Self {
            color: ColorRgba::TRANSPARENT,
            depth: 1.0,
            stencil: 0,
        }
    }
}

impl ClearValue {
    /// A clear value for the given color with default depth and stencil.
    pub fn color(color: ColorRgba) -> Self {
        Self {
            color,
            ..Default::default()
        }
    }
}

/// A clear of individual attachments inside a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachmentClear {
    /// Which aspects to clear.
    pub flags: ClearFlags,
    /// Color attachment index when `flags` contains `COLOR`.
    pub color_attachment: u32,
    /// Values to clear with.
    pub value: ClearValue,
}

impl AttachmentClear {
    /// Clears one color attachment.
    pub fn color(index: u32, color: ColorRgba) -> Self {
        Self {
            flags: ClearFlags::COLOR,
            color_attachment: index,
            value: ClearValue::color(color),
        }
    }

    /// Clears the depth attachment.
    pub fn depth(depth: f32) -> Self {
        Self {
            flags: ClearFlags::DEPTH,
            color_attachment: 0,
            value: ClearValue {
                depth,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_value_count() {
        let desc = RenderPassDescriptor {
            color_attachments: vec![
                AttachmentFormatDescriptor {
                    format: Format::RGBA8UNorm,
                    load_op: AttachmentLoadOp::Clear,
                    store_op: AttachmentStoreOp::Store,
                },
                AttachmentFormatDescriptor::default(),
            ],
            depth_attachment: Some(AttachmentFormatDescriptor {
                format: Format::D24UNormS8UInt,
                load_op: AttachmentLoadOp::Clear,
                store_op: AttachmentStoreOp::Undefined,
            }),
            stencil_attachment: Some(AttachmentFormatDescriptor {
                format: Format::D24UNormS8UInt,
                load_op: AttachmentLoadOp::Clear,
                store_op: AttachmentStoreOp::Undefined,
            }),
            ..Default::default()
        };
        assert_eq!(desc.num_clear_values(), 2);
    }

    #[test]
    fn test_clear_value_is_plain_data() {
        assert_eq!(std::mem::size_of::<ClearValue>(), 24);
        let value = ClearValue::color(ColorRgba::WHITE);
        let bytes = bytemuck::bytes_of(&value);
        let back: ClearValue = bytemuck::pod_read_unaligned(bytes);
        assert_eq!(back, value);
    }
}
