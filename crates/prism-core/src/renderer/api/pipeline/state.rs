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

//! Graphics and compute pipeline state descriptors.

use crate::math::ColorRgba;
use crate::renderer::api::{
    CompareOp, PipelineLayoutId, RenderPassId, Scissor, ShaderProgramId, Viewport,
};
use std::borrow::Cow;

/// How vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
    /// Patches with the given number of control points.
    Patches(u32),
}

/// Operation applied to the stencil buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    IncClamp,
    DecClamp,
    Invert,
    IncWrap,
    DecWrap,
}

/// Which faces a stencil setting applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
#[allow(missing_docs)]
pub enum StencilFace {
    #[default]
    FrontAndBack = 0,
    Front = 1,
    Back = 2,
}

impl StencilFace {
    /// Decodes a face from its stream value.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(StencilFace::FrontAndBack),
            1 => Some(StencilFace::Front),
            2 => Some(StencilFace::Back),
            _ => None,
        }
    }
}

/// Depth test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DepthDescriptor {
    /// Enables the depth test.
    pub test_enabled: bool,
    /// Enables depth writes.
    pub write_enabled: bool,
    /// Depth comparison.
    pub compare_op: CompareOp,
}

/// Stencil state for one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFaceDescriptor {
    /// Operation when the stencil test fails.
    pub stencil_fail_op: StencilOp,
    /// Operation when the stencil test passes but the depth test fails.
    pub depth_fail_op: StencilOp,
    /// Operation when both tests pass.
    pub depth_pass_op: StencilOp,
    /// Stencil comparison.
    pub compare_op: CompareOp,
    /// Bits read by the comparison.
    pub read_mask: u32,
    /// Bits written by the operations.
    pub write_mask: u32,
    /// Reference value.
    pub reference: u32,
}

impl Default for StencilFaceDescriptor {
    fn default() -> Self {
        Self {
            stencil_fail_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            depth_pass_op: StencilOp::Keep,
            compare_op: CompareOp::AlwaysPass,
            read_mask: !0,
            write_mask: !0,
            reference: 0,
        }
    }
}

/// Stencil test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StencilDescriptor {
    /// Enables the stencil test.
    pub test_enabled: bool,
    /// The reference is set dynamically with `set_stencil_reference`.
    pub reference_dynamic: bool,
    /// Front face state.
    pub front: StencilFaceDescriptor,
    /// Back face state.
    pub back: StencilFaceDescriptor,
}

/// Polygon fill mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum PolygonMode {
    #[default]
    Fill,
    Wireframe,
    Points,
}

/// Face culling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum CullMode {
    #[default]
    Disabled,
    Front,
    Back,
}

/// Rasterizer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RasterizerDescriptor {
    /// Polygon fill mode.
    pub polygon_mode: PolygonMode,
    /// Face culling.
    pub cull_mode: CullMode,
    /// Counter-clockwise polygons are front facing.
    pub front_ccw: bool,
    /// Constant depth bias.
    pub depth_bias_constant: f32,
    /// Slope-scaled depth bias.
    pub depth_bias_slope: f32,
    /// Discards primitives before rasterization.
    pub discard_enabled: bool,
    /// Enables the scissor test.
    pub scissor_test_enabled: bool,
    /// Enables multisampled rasterization.
    pub multi_sample_enabled: bool,
}

/// Blend factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DstColor,
    InvDstColor,
    DstAlpha,
    InvDstAlpha,
    /// The dynamic factor set with `set_blend_factor`.
    BlendFactor,
    InvBlendFactor,
}

/// Blend equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum BlendOp {
    #[default]
    Add,
    Subtract,
    RevSubtract,
    Min,
    Max,
}

/// Blending for a single color attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendTargetDescriptor {
    /// Enables blending.
    pub blend_enabled: bool,
    /// Source color factor.
    pub src_color: BlendFactor,
    /// Destination color factor.
    pub dst_color: BlendFactor,
    /// Color equation.
    pub color_op: BlendOp,
    /// Source alpha factor.
    pub src_alpha: BlendFactor,
    /// Destination alpha factor.
    pub dst_alpha: BlendFactor,
    /// Alpha equation.
    pub alpha_op: BlendOp,
    /// RGBA write mask, one bit per channel.
    pub color_mask: u8,
}

impl Default for BlendTargetDescriptor {
    fn default() -> Self {
        Self {
            blend_enabled: false,
            src_color: BlendFactor::SrcAlpha,
            dst_color: BlendFactor::InvSrcAlpha,
            color_op: BlendOp::Add,
            src_alpha: BlendFactor::SrcAlpha,
            dst_alpha: BlendFactor::InvSrcAlpha,
            alpha_op: BlendOp::Add,
            color_mask: 0b1111,
        }
    }
}

/// Blend state of all color attachments.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendDescriptor {
    /// Enables alpha-to-coverage.
    pub alpha_to_coverage_enabled: bool,
    /// Static blend factor (`BlendFactor::BlendFactor`).
    pub blend_factor: ColorRgba,
    /// The blend factor is set dynamically with `set_blend_factor`.
    pub blend_factor_dynamic: bool,
    /// Per-attachment state. A single entry applies to all attachments.
    pub targets: Vec<BlendTargetDescriptor>,
}

impl Default for BlendDescriptor {
    fn default() -> Self {
        Self {
            alpha_to_coverage_enabled: false,
            blend_factor: ColorRgba::TRANSPARENT,
            blend_factor_dynamic: false,
            targets: vec![BlendTargetDescriptor::default()],
        }
    }
}

impl BlendDescriptor {
    /// Returns `true` if any target reads the dynamic blend factor.
    pub fn uses_blend_factor(&self) -> bool {
        self.targets.iter().any(|t| {
            t.blend_enabled
                && [t.src_color, t.dst_color, t.src_alpha, t.dst_alpha]
                    .iter()
                    .any(|f| matches!(f, BlendFactor::BlendFactor | BlendFactor::InvBlendFactor))
        })
    }
}

/// Describes a graphics pipeline state.
#[derive(Debug, Clone)]
pub struct GraphicsPipelineDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Resource layout, `None` for pipelines without bindings.
    pub layout: Option<PipelineLayoutId>,
    /// Linked graphics shader program.
    pub program: ShaderProgramId,
    /// Render pass the pipeline is compatible with.
    pub render_pass: Option<RenderPassId>,
    /// Primitive topology.
    pub primitive_topology: PrimitiveTopology,
    /// Depth state.
    pub depth: DepthDescriptor,
    /// Stencil state.
    pub stencil: StencilDescriptor,
    /// Rasterizer state.
    pub rasterizer: RasterizerDescriptor,
    /// Blend state.
    pub blend: BlendDescriptor,
    /// Static viewports. Empty for dynamic viewports.
    pub viewports: Vec<Viewport>,
    /// Static scissors. Empty for dynamic scissors.
    pub scissors: Vec<Scissor>,
}

impl GraphicsPipelineDescriptor<'_> {
    /// A descriptor with default state for the given program.
    pub fn new(program: ShaderProgramId) -> Self {
        Self {
            label: None,
            layout: None,
            program,
            render_pass: None,
            primitive_topology: PrimitiveTopology::default(),
            depth: DepthDescriptor::default(),
            stencil: StencilDescriptor::default(),
            rasterizer: RasterizerDescriptor::default(),
            blend: BlendDescriptor::default(),
            viewports: Vec::new(),
            scissors: Vec::new(),
        }
    }
}

/// Describes a compute pipeline state.
#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Resource layout.
    pub layout: Option<PipelineLayoutId>,
    /// Linked compute shader program.
    pub program: ShaderProgramId,
}

/// Either kind of pipeline, as stored by backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Rasterization pipeline.
    Graphics,
    /// Compute pipeline.
    Compute,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_factor_usage_detection() {
        let mut blend = BlendDescriptor::default();
        assert!(!blend.uses_blend_factor());
        blend.targets[0].blend_enabled = true;
        blend.targets[0].src_color = BlendFactor::BlendFactor;
        assert!(blend.uses_blend_factor());
    }

    #[test]
    fn test_stencil_face_decoding() {
        assert_eq!(StencilFace::from_raw(2), Some(StencilFace::Back));
        assert_eq!(StencilFace::from_raw(3), None);
    }
}
