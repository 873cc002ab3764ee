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

//! Shader stages, sources and the reflection data declared alongside them.
//!
//! Shaders are consumed in the backend's native language. Reflection is not
//! extracted from the source: it is declared by the application and travels with
//! the shader into the program linker.

use super::{StreamOutputAttribute, VertexAttribute};
use std::borrow::Cow;

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderType {
    /// Vertex shader.
    Vertex,
    /// Tessellation control (hull) shader.
    TessControl,
    /// Tessellation evaluation (domain) shader.
    TessEvaluation,
    /// Geometry shader.
    Geometry,
    /// Fragment (pixel) shader.
    Fragment,
    /// Compute shader.
    Compute,
}

impl ShaderType {
    /// Every stage in pipeline order.
    pub const ALL: [ShaderType; 6] = [
        ShaderType::Vertex,
        ShaderType::TessControl,
        ShaderType::TessEvaluation,
        ShaderType::Geometry,
        ShaderType::Fragment,
        ShaderType::Compute,
    ];

    /// The stage flag corresponding to this stage.
    pub fn stage_flag(self) -> ShaderStageFlags {
        match self {
            ShaderType::Vertex => ShaderStageFlags::VERTEX,
            ShaderType::TessControl => ShaderStageFlags::TESS_CONTROL,
            ShaderType::TessEvaluation => ShaderStageFlags::TESS_EVALUATION,
            ShaderType::Geometry => ShaderStageFlags::GEOMETRY,
            ShaderType::Fragment => ShaderStageFlags::FRAGMENT,
            ShaderType::Compute => ShaderStageFlags::COMPUTE,
        }
    }

    /// Short name used by pipeline-layout signatures (`vert`, `frag`, ...).
    pub fn short_name(self) -> &'static str {
        match self {
            ShaderType::Vertex => "vert",
            ShaderType::TessControl => "tesc",
            ShaderType::TessEvaluation => "tese",
            ShaderType::Geometry => "geom",
            ShaderType::Fragment => "frag",
            ShaderType::Compute => "comp",
        }
    }
}

prism_bitflags! {
    /// A set of shader stages.
    pub struct ShaderStageFlags: u32 {
        /// Vertex stage.
        const VERTEX = 1 << 0;
        /// Tessellation control stage.
        const TESS_CONTROL = 1 << 1;
        /// Tessellation evaluation stage.
        const TESS_EVALUATION = 1 << 2;
        /// Geometry stage.
        const GEOMETRY = 1 << 3;
        /// Fragment stage.
        const FRAGMENT = 1 << 4;
        /// Compute stage.
        const COMPUTE = 1 << 5;
        /// Every graphics stage.
        const ALL_GRAPHICS = 0b1_1111;
        /// Every stage.
        const ALL = 0b11_1111;
    }
}

/// The source of a shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderSource<'a> {
    /// High-level source code in the backend's shading language.
    Code(Cow<'a, str>),
    /// Precompiled byte code.
    Binary(Cow<'a, [u8]>),
}

impl ShaderSource<'_> {
    /// Returns `true` if the source holds no code at all.
    pub fn is_empty(&self) -> bool {
        match self {
            ShaderSource::Code(code) => code.trim().is_empty(),
            ShaderSource::Binary(bytes) => bytes.is_empty(),
        }
    }
}

/// Data type of an individual uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum UniformType {
    Float1,
    Float2,
    Float3,
    Float4,
    Int1,
    Int2,
    Int3,
    Int4,
    UInt1,
    Float3x3,
    Float4x4,
    /// Texture or sampler slot set through an integer uniform.
    Sampler,
}

impl UniformType {
    /// Size in bytes of one element.
    pub fn size(self) -> usize {
        match self {
            UniformType::Float1 | UniformType::Int1 | UniformType::UInt1 | UniformType::Sampler => 4,
            UniformType::Float2 | UniformType::Int2 => 8,
            UniformType::Float3 | UniformType::Int3 => 12,
            UniformType::Float4 | UniformType::Int4 => 16,
            UniformType::Float3x3 => 36,
            UniformType::Float4x4 => 64,
        }
    }
}

/// A constant buffer declared by a shader.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstantBufferInfo {
    /// Block name.
    pub name: String,
    /// Binding slot.
    pub slot: u32,
    /// Size of the block in bytes.
    pub size: u32,
    /// Stages that reference the block.
    pub stages: ShaderStageFlags,
}

/// A storage buffer declared by a shader.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageBufferInfo {
    /// Block name.
    pub name: String,
    /// Binding slot.
    pub slot: u32,
    /// Whether shaders write to the buffer.
    pub read_write: bool,
    /// Stages that reference the block.
    pub stages: ShaderStageFlags,
}

/// An individual uniform declared by a shader.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniformInfo {
    /// Uniform name.
    pub name: String,
    /// Element type.
    pub ty: UniformType,
    /// Uniform location.
    pub location: u32,
    /// Number of array elements, `1` for scalars.
    pub array_size: u32,
}

impl UniformInfo {
    /// Size in bytes of the whole uniform.
    pub fn byte_size(&self) -> usize {
        self.ty.size() * self.array_size.max(1) as usize
    }
}

/// Reflection data of a shader or a linked shader program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderReflection {
    /// Vertex inputs (vertex shaders only).
    pub vertex_attributes: Vec<VertexAttribute>,
    /// Captured stream-output varyings.
    pub stream_outputs: Vec<StreamOutputAttribute>,
    /// Constant buffers.
    pub constant_buffers: Vec<ConstantBufferInfo>,
    /// Storage buffers.
    pub storage_buffers: Vec<StorageBufferInfo>,
    /// Individual uniforms.
    pub uniforms: Vec<UniformInfo>,
}

impl ShaderReflection {
    /// Merges another stage's reflection into this one. Resources with the same
    /// name are merged and their stage flags combined.
    pub fn merge(&mut self, other: &ShaderReflection) {
        for attrib in &other.vertex_attributes {
            if !self.vertex_attributes.iter().any(|a| a.name == attrib.name) {
                self.vertex_attributes.push(attrib.clone());
            }
        }
        for output in &other.stream_outputs {
            if !self.stream_outputs.iter().any(|o| o.name == output.name) {
                self.stream_outputs.push(output.clone());
            }
        }
        for cbuffer in &other.constant_buffers {
            match self
                .constant_buffers
                .iter_mut()
                .find(|c| c.name == cbuffer.name)
            {
                Some(existing) => existing.stages |= cbuffer.stages,
                None => self.constant_buffers.push(cbuffer.clone()),
            }
        }
        for sbuffer in &other.storage_buffers {
            match self
                .storage_buffers
                .iter_mut()
                .find(|s| s.name == sbuffer.name)
            {
                Some(existing) => {
                    existing.stages |= sbuffer.stages;
                    existing.read_write |= sbuffer.read_write;
                }
                None => self.storage_buffers.push(sbuffer.clone()),
            }
        }
        for uniform in &other.uniforms {
            if !self.uniforms.iter().any(|u| u.name == uniform.name) {
                self.uniforms.push(uniform.clone());
            }
        }
    }

    /// Applies `stages` to every resource that was declared without stage flags.
    pub fn with_default_stages(mut self, stages: ShaderStageFlags) -> Self {
        for cbuffer in &mut self.constant_buffers {
            if cbuffer.stages.is_empty() {
                cbuffer.stages = stages;
            }
        }
        for sbuffer in &mut self.storage_buffers {
            if sbuffer.stages.is_empty() {
                sbuffer.stages = stages;
            }
        }
        self
    }
}

/// Describes a shader to create.
#[derive(Debug, Clone)]
pub struct ShaderDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Pipeline stage.
    pub ty: ShaderType,
    /// Source code or byte code.
    pub source: ShaderSource<'a>,
    /// Entry point function.
    pub entry_point: Cow<'a, str>,
    /// Target profile (`vs_5_0`, `330`), if the backend needs one.
    pub profile: Option<Cow<'a, str>>,
    /// Declared reflection data.
    pub reflection: ShaderReflection,
}

impl<'a> ShaderDescriptor<'a> {
    /// A descriptor for source code with the default `main` entry point.
    pub fn from_code(ty: ShaderType, code: impl Into<Cow<'a, str>>) -> Self {
        Self {
            label: None,
            ty,
            source: ShaderSource::Code(code.into()),
            entry_point: Cow::Borrowed("main"),
            profile: None,
            reflection: ShaderReflection::default(),
        }
    }

    /// Replaces the reflection data.
    pub fn with_reflection(mut self, reflection: ShaderReflection) -> Self {
        self.reflection = reflection;
        self
    }
}

/// The stages composing a shader program.
#[derive(Debug, Clone, Default)]
pub struct ShaderProgramDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Vertex shader.
    pub vertex: Option<super::ShaderId>,
    /// Tessellation control shader.
    pub tess_control: Option<super::ShaderId>,
    /// Tessellation evaluation shader.
    pub tess_evaluation: Option<super::ShaderId>,
    /// Geometry shader.
    pub geometry: Option<super::ShaderId>,
    /// Fragment shader.
    pub fragment: Option<super::ShaderId>,
    /// Compute shader.
    pub compute: Option<super::ShaderId>,
    /// Input layout for the vertex stage.
    pub vertex_formats: Vec<super::VertexFormat>,
}

impl ShaderProgramDescriptor<'_> {
    /// The attached shaders with the stage each one is expected to be.
    pub fn stages(&self) -> Vec<(ShaderType, super::ShaderId)> {
        [
            (ShaderType::Vertex, self.vertex),
            (ShaderType::TessControl, self.tess_control),
            (ShaderType::TessEvaluation, self.tess_evaluation),
            (ShaderType::Geometry, self.geometry),
            (ShaderType::Fragment, self.fragment),
            (ShaderType::Compute, self.compute),
        ]
        .into_iter()
        .filter_map(|(ty, id)| id.map(|id| (ty, id)))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_combines_stage_flags() {
        let mut vertex = ShaderReflection {
            constant_buffers: vec![ConstantBufferInfo {
                name: "Scene".into(),
                slot: 0,
                size: 64,
                stages: ShaderStageFlags::VERTEX,
            }],
            ..Default::default()
        };
        let fragment = ShaderReflection {
            constant_buffers: vec![
                ConstantBufferInfo {
                    name: "Scene".into(),
                    slot: 0,
                    size: 64,
                    stages: ShaderStageFlags::FRAGMENT,
                },
                ConstantBufferInfo {
                    name: "Material".into(),
                    slot: 1,
                    size: 16,
                    stages: ShaderStageFlags::FRAGMENT,
                },
            ],
            ..Default::default()
        };
        vertex.merge(&fragment);
        assert_eq!(vertex.constant_buffers.len(), 2);
        assert_eq!(
            vertex.constant_buffers[0].stages,
            ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn test_empty_source_detection() {
        assert!(ShaderSource::Code("  \n".into()).is_empty());
        assert!(ShaderSource::Binary(Cow::Borrowed(&[])).is_empty());
        assert!(!ShaderSource::Code("void main() {}".into()).is_empty());
    }

    #[test]
    fn test_uniform_sizes() {
        let uniform = UniformInfo {
            name: "bones".into(),
            ty: UniformType::Float4x4,
            location: 0,
            array_size: 4,
        };
        assert_eq!(uniform.byte_size(), 256);
    }
}
