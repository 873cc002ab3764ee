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

//! Backend-agnostic shader program linker.
//!
//! A [`ShaderProgram`] collects shader stages, validates their composition when it
//! is linked and merges their declared reflection. Backends wrap it with their
//! native program object; the rules here are the same for all of them.

use super::{
    ConstantBufferInfo, ShaderId, ShaderProgramId, ShaderReflection, ShaderType,
    StorageBufferInfo, StreamOutputAttribute, UniformInfo, VertexAttribute, VertexFormat,
};
use crate::renderer::error::ShaderError;
use std::collections::HashMap;

/// Maximum number of vertex attributes a program accepts.
pub const MAX_VERTEX_ATTRIBUTES: usize = 16;

/// Categorized reason for a link failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkError {
    /// The program linked successfully.
    NoError,
    /// The attached stages cannot be combined (e.g. compute with fragment).
    InvalidComposition,
    /// A stage holds no usable code.
    InvalidByteCode,
    /// More than one shader of the same stage was attached.
    TooManyAttachments,
    /// A required stage is missing.
    IncompleteAttachments,
}

/// Returns a description of a link error, or `None` for [`LinkError::NoError`].
pub fn link_error_to_string(error: LinkError) -> Option<&'static str> {
    match error {
        LinkError::NoError => None,
        LinkError::InvalidComposition => Some("invalid composition of attached shaders"),
        LinkError::InvalidByteCode => Some("invalid shader byte code"),
        LinkError::TooManyAttachments => Some("too many attachments in shader program"),
        LinkError::IncompleteAttachments => Some("incomplete attachments in shader program"),
    }
}

/// A shader stage attached to a program.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderStage {
    /// The shader object.
    pub id: ShaderId,
    /// Its stage.
    pub ty: ShaderType,
    /// Whether the shader compiled into usable code.
    pub valid: bool,
    /// The shader's declared reflection.
    pub reflection: ShaderReflection,
}

/// A program composed of shader stages.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    id: ShaderProgramId,
    stages: Vec<ShaderStage>,
    linked: bool,
    link_error: LinkError,
    info_log: String,
    reflection: ShaderReflection,
    input_layout: Vec<VertexAttribute>,
    supports_uniforms: bool,
    uniforms_locked: bool,
    uniform_values: HashMap<String, Vec<u8>>,
}

impl ShaderProgram {
    /// Creates an empty program. `supports_uniforms` enables the individual
    /// uniform interface.
    pub fn new(id: ShaderProgramId, supports_uniforms: bool) -> Self {
        Self {
            id,
            stages: Vec::new(),
            linked: false,
            link_error: LinkError::NoError,
            info_log: String::new(),
            reflection: ShaderReflection::default(),
            input_layout: Vec::new(),
            supports_uniforms,
            uniforms_locked: false,
            uniform_values: HashMap::new(),
        }
    }

    /// The program handle.
    pub fn id(&self) -> ShaderProgramId {
        self.id
    }

    /// Attaches a stage. Attaching invalidates a previous link.
    pub fn attach_shader(&mut self, stage: ShaderStage) {
        self.stages.push(stage);
        self.linked = false;
    }

    /// Detaches every stage and invalidates the link status.
    pub fn detach_all(&mut self) {
        self.stages.clear();
        self.input_layout.clear();
        self.reflection = ShaderReflection::default();
        self.linked = false;
        self.link_error = LinkError::NoError;
        self.info_log.clear();
        self.uniform_values.clear();
    }

    /// The attached stages.
    pub fn stages(&self) -> &[ShaderStage] {
        &self.stages
    }

    /// Returns `true` if a stage of the given type is attached.
    pub fn has_stage(&self, ty: ShaderType) -> bool {
        self.stages.iter().any(|s| s.ty == ty)
    }

    /// Returns `true` for a linked program consisting of a compute stage.
    pub fn is_compute(&self) -> bool {
        self.has_stage(ShaderType::Compute)
    }

    /// Returns `true` once the program has linked successfully.
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// The categorized error of the last link attempt.
    pub fn link_error(&self) -> LinkError {
        self.link_error
    }

    /// The info log of the last link attempt.
    pub fn info_log(&self) -> &str {
        &self.info_log
    }

    /// Validates the attached stages and merges their reflection.
    pub fn link(&mut self) -> Result<(), ShaderError> {
        self.linked = false;
        let error = self.validate_composition();
        self.link_error = error;
        self.info_log.clear();

        if let Some(message) = link_error_to_string(error) {
            self.info_log = format!("{message}: {}", self.describe_stages());
            return Err(ShaderError::LinkFailed {
                program: self.id,
                error,
                log: self.info_log.clone(),
            });
        }

        let mut reflection = ShaderReflection::default();
        for stage in &self.stages {
            reflection.merge(
                &stage
                    .reflection
                    .clone()
                    .with_default_stages(stage.ty.stage_flag()),
            );
        }
        if !self.input_layout.is_empty() {
            reflection.vertex_attributes = self.input_layout.clone();
        }
        self.reflection = reflection;
        self.linked = true;
        log::debug!(
            "ShaderProgram: linked {:?} with stages [{}]",
            self.id,
            self.describe_stages()
        );
        Ok(())
    }

    /// Checks the attached stages against the composition rules.
    pub fn validate_composition(&self) -> LinkError {
        if self.stages.is_empty() {
            return LinkError::IncompleteAttachments;
        }
        if self.stages.iter().any(|s| !s.valid) {
            return LinkError::InvalidByteCode;
        }
        let mut seen: Vec<ShaderType> = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            if seen.contains(&stage.ty) {
                return LinkError::TooManyAttachments;
            }
            seen.push(stage.ty);
        }

        let has = |ty| seen.contains(&ty);
        if has(ShaderType::Compute) {
            return if seen.len() == 1 {
                LinkError::NoError
            } else {
                LinkError::InvalidComposition
            };
        }
        if !has(ShaderType::Vertex) {
            return LinkError::InvalidComposition;
        }
        if has(ShaderType::TessControl) != has(ShaderType::TessEvaluation) {
            return LinkError::IncompleteAttachments;
        }
        LinkError::NoError
    }

    /// Declares the input layout from vertex formats.
    ///
    /// An empty slice leaves the program untouched. Attribute names must exist in
    /// the vertex stage's reflection when it declares any. A linked program is
    /// relinked with the new layout.
    pub fn build_input_layout(&mut self, formats: &[VertexFormat]) -> Result<(), ShaderError> {
        if formats.is_empty() {
            return Ok(());
        }
        let attributes: Vec<VertexAttribute> = formats
            .iter()
            .flat_map(|f| f.attributes.iter().cloned())
            .collect();
        if attributes.len() > MAX_VERTEX_ATTRIBUTES {
            return Err(ShaderError::TooManyVertexAttributes {
                count: attributes.len(),
                max: MAX_VERTEX_ATTRIBUTES,
            });
        }

        let declared: Vec<&VertexAttribute> = self
            .stages
            .iter()
            .filter(|s| s.ty == ShaderType::Vertex)
            .flat_map(|s| s.reflection.vertex_attributes.iter())
            .collect();
        if !declared.is_empty() {
            if let Some(unknown) = attributes
                .iter()
                .find(|a| !declared.iter().any(|d| d.name == a.name))
            {
                return Err(ShaderError::UnknownResource {
                    name: unknown.name.clone(),
                });
            }
        }

        self.input_layout = attributes;
        if self.linked {
            self.link()?;
        }
        Ok(())
    }

    /// The merged reflection of a linked program.
    pub fn reflection(&self) -> Result<&ShaderReflection, ShaderError> {
        self.require_linked()?;
        Ok(&self.reflection)
    }

    /// Vertex attributes consumed by the program.
    pub fn query_vertex_attributes(&self) -> Result<&[VertexAttribute], ShaderError> {
        Ok(&self.reflection()?.vertex_attributes)
    }

    /// Stream-output attributes captured by the program.
    pub fn query_stream_output_attributes(
        &self,
    ) -> Result<&[StreamOutputAttribute], ShaderError> {
        Ok(&self.reflection()?.stream_outputs)
    }

    /// Constant buffers referenced by the program.
    pub fn query_constant_buffers(&self) -> Result<&[ConstantBufferInfo], ShaderError> {
        Ok(&self.reflection()?.constant_buffers)
    }

    /// Storage buffers referenced by the program.
    pub fn query_storage_buffers(&self) -> Result<&[StorageBufferInfo], ShaderError> {
        Ok(&self.reflection()?.storage_buffers)
    }

    /// Individual uniforms of the program.
    pub fn query_uniforms(&self) -> Result<&[UniformInfo], ShaderError> {
        Ok(&self.reflection()?.uniforms)
    }

    /// Assigns the binding slot of the named constant buffer.
    pub fn bind_constant_buffer(&mut self, name: &str, index: u32) -> Result<(), ShaderError> {
        self.require_linked()?;
        let cbuffer = self
            .reflection
            .constant_buffers
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| ShaderError::UnknownResource {
                name: name.to_string(),
            })?;
        cbuffer.slot = index;
        Ok(())
    }

    /// Assigns the binding slot of the named storage buffer.
    pub fn bind_storage_buffer(&mut self, name: &str, index: u32) -> Result<(), ShaderError> {
        self.require_linked()?;
        let sbuffer = self
            .reflection
            .storage_buffers
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| ShaderError::UnknownResource {
                name: name.to_string(),
            })?;
        sbuffer.slot = index;
        Ok(())
    }

    /// Locks the uniform interface. The returned guard unlocks on drop.
    pub fn lock_uniforms(&mut self) -> Result<ShaderUniforms<'_>, ShaderError> {
        if !self.supports_uniforms || self.uniforms_locked {
            return Err(ShaderError::UniformsUnavailable);
        }
        self.require_linked()?;
        self.uniforms_locked = true;
        Ok(ShaderUniforms { program: self })
    }

    /// The last value written to a uniform.
    pub fn uniform_value(&self, name: &str) -> Option<&[u8]> {
        self.uniform_values.get(name).map(Vec::as_slice)
    }

    fn require_linked(&self) -> Result<(), ShaderError> {
        if self.linked {
            Ok(())
        } else {
            Err(ShaderError::NotLinked { program: self.id })
        }
    }

    fn describe_stages(&self) -> String {
        self.stages
            .iter()
            .map(|s| s.ty.short_name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Scoped access to the individual uniforms of a locked program.
#[derive(Debug)]
pub struct ShaderUniforms<'a> {
    program: &'a mut ShaderProgram,
}

impl ShaderUniforms<'_> {
    /// Writes the value of a uniform. The data size must match the uniform.
    pub fn set_uniform(&mut self, name: &str, data: &[u8]) -> Result<(), ShaderError> {
        let uniform = self
            .program
            .reflection
            .uniforms
            .iter()
            .find(|u| u.name == name)
            .ok_or_else(|| ShaderError::UnknownResource {
                name: name.to_string(),
            })?;
        if uniform.byte_size() != data.len() {
            return Err(ShaderError::UniformSizeMismatch {
                name: name.to_string(),
                expected: uniform.byte_size(),
                actual: data.len(),
            });
        }
        self.program
            .uniform_values
            .insert(name.to_string(), data.to_vec());
        Ok(())
    }

    /// Unlocks the uniform interface.
    pub fn unlock(self) {}
}

impl Drop for ShaderUniforms<'_> {
    fn drop(&mut self) {
        self.program.uniforms_locked = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::{Format, UniformType};

    fn stage(id: u64, ty: ShaderType) -> ShaderStage {
        ShaderStage {
            id: ShaderId(id),
            ty,
            valid: true,
            reflection: ShaderReflection::default(),
        }
    }

    fn vertex_with_inputs(names: &[&str]) -> ShaderStage {
        let mut s = stage(1, ShaderType::Vertex);
        s.reflection.vertex_attributes = names
            .iter()
            .enumerate()
            .map(|(i, n)| VertexAttribute::new(*n, Format::RGBA32Float, i as u32))
            .collect();
        s
    }

    #[test]
    fn test_vertex_fragment_links() {
        let mut program = ShaderProgram::new(ShaderProgramId(1), false);
        program.attach_shader(stage(1, ShaderType::Vertex));
        program.attach_shader(stage(2, ShaderType::Fragment));
        program.link().unwrap();
        assert!(program.is_linked());
        assert_eq!(program.link_error(), LinkError::NoError);
        assert!(program.info_log().is_empty());
    }

    #[test]
    fn test_compute_mixed_with_fragment_is_invalid() {
        let mut program = ShaderProgram::new(ShaderProgramId(2), false);
        program.attach_shader(stage(1, ShaderType::Compute));
        program.attach_shader(stage(2, ShaderType::Fragment));
        let err = program.link().unwrap_err();
        assert!(matches!(
            err,
            ShaderError::LinkFailed {
                error: LinkError::InvalidComposition,
                ..
            }
        ));
        assert!(!program.is_linked());
        assert!(program.info_log().contains("comp, frag"));
    }

    #[test]
    fn test_composition_rules() {
        let compose = |types: &[ShaderType]| {
            let mut program = ShaderProgram::new(ShaderProgramId(3), false);
            for (i, ty) in types.iter().enumerate() {
                program.attach_shader(stage(i as u64 + 1, *ty));
            }
            program.validate_composition()
        };
        assert_eq!(compose(&[]), LinkError::IncompleteAttachments);
        assert_eq!(compose(&[ShaderType::Compute]), LinkError::NoError);
        assert_eq!(compose(&[ShaderType::Fragment]), LinkError::InvalidComposition);
        assert_eq!(
            compose(&[ShaderType::Vertex, ShaderType::TessControl]),
            LinkError::IncompleteAttachments
        );
        assert_eq!(
            compose(&[
                ShaderType::Vertex,
                ShaderType::TessControl,
                ShaderType::TessEvaluation,
                ShaderType::Geometry,
                ShaderType::Fragment
            ]),
            LinkError::NoError
        );
        assert_eq!(
            compose(&[ShaderType::Vertex, ShaderType::Vertex]),
            LinkError::TooManyAttachments
        );
    }

    #[test]
    fn test_invalid_byte_code() {
        let mut program = ShaderProgram::new(ShaderProgramId(4), false);
        let mut broken = stage(1, ShaderType::Vertex);
        broken.valid = false;
        program.attach_shader(broken);
        assert_eq!(program.validate_composition(), LinkError::InvalidByteCode);
    }

    #[test]
    fn test_link_error_strings() {
        assert_eq!(link_error_to_string(LinkError::NoError), None);
        assert!(link_error_to_string(LinkError::TooManyAttachments).is_some());
    }

    #[test]
    fn test_detach_all_invalidates_link() {
        let mut program = ShaderProgram::new(ShaderProgramId(5), false);
        program.attach_shader(stage(1, ShaderType::Compute));
        program.link().unwrap();
        program.detach_all();
        assert!(!program.is_linked());
        assert!(program.stages().is_empty());
        assert!(matches!(
            program.query_constant_buffers(),
            Err(ShaderError::NotLinked { .. })
        ));
    }

    #[test]
    fn test_build_input_layout_validates_names_and_relinks() {
        let mut program = ShaderProgram::new(ShaderProgramId(6), false);
        program.attach_shader(vertex_with_inputs(&["position", "color"]));
        program.link().unwrap();

        assert!(program.build_input_layout(&[]).is_ok());

        let mut format = VertexFormat::new();
        format.append_attribute(VertexAttribute::new("position", Format::RG32Float, 0));
        format.append_attribute(VertexAttribute::new("color", Format::RGBA8UNorm, 1));
        program.build_input_layout(&[format]).unwrap();
        assert!(program.is_linked());
        let attribs = program.query_vertex_attributes().unwrap();
        assert_eq!(attribs.len(), 2);
        assert_eq!(attribs[1].offset, 8);

        let mut unknown = VertexFormat::new();
        unknown.append_attribute(VertexAttribute::new("normal", Format::RGB32Float, 0));
        assert_eq!(
            program.build_input_layout(&[unknown]),
            Err(ShaderError::UnknownResource {
                name: "normal".to_string()
            })
        );
    }

    #[test]
    fn test_build_input_layout_rejects_too_many_attributes() {
        let mut program = ShaderProgram::new(ShaderProgramId(7), false);
        program.attach_shader(stage(1, ShaderType::Vertex));
        let mut format = VertexFormat::new();
        for i in 0..17 {
            format.append_attribute(VertexAttribute::new(format!("a{i}"), Format::R32Float, i));
        }
        assert!(matches!(
            program.build_input_layout(&[format]),
            Err(ShaderError::TooManyVertexAttributes { count: 17, .. })
        ));
    }

    #[test]
    fn test_bind_constant_buffer_by_name() {
        let mut program = ShaderProgram::new(ShaderProgramId(8), false);
        let mut vs = stage(1, ShaderType::Vertex);
        vs.reflection.constant_buffers.push(ConstantBufferInfo {
            name: "Scene".into(),
            slot: 0,
            size: 64,
            stages: Default::default(),
        });
        program.attach_shader(vs);
        program.link().unwrap();
        program.bind_constant_buffer("Scene", 3).unwrap();
        let cbuffers = program.query_constant_buffers().unwrap();
        assert_eq!(cbuffers[0].slot, 3);
        assert_eq!(cbuffers[0].stages, ShaderType::Vertex.stage_flag());
        assert!(program.bind_storage_buffer("Missing", 0).is_err());
    }

    #[test]
    fn test_uniform_lock_requires_support() {
        let mut program = ShaderProgram::new(ShaderProgramId(9), false);
        program.attach_shader(stage(1, ShaderType::Compute));
        program.link().unwrap();
        assert!(matches!(
            program.lock_uniforms(),
            Err(ShaderError::UniformsUnavailable)
        ));
    }

    #[test]
    fn test_uniform_lock_scope() {
        let mut program = ShaderProgram::new(ShaderProgramId(10), true);
        let mut vs = stage(1, ShaderType::Vertex);
        vs.reflection.uniforms.push(UniformInfo {
            name: "tint".into(),
            ty: UniformType::Float4,
            location: 0,
            array_size: 1,
        });
        program.attach_shader(vs);
        program.link().unwrap();

        let mut uniforms = program.lock_uniforms().unwrap();
        uniforms
            .set_uniform("tint", bytemuck::cast_slice(&[1.0f32, 0.5, 0.25, 1.0]))
            .unwrap();
        assert!(uniforms.set_uniform("tint", &[0u8; 4]).is_err());
        uniforms.unlock();

        assert_eq!(program.uniform_value("tint").map(<[u8]>::len), Some(16));
        // Unlocked again after the guard is gone.
        assert!(program.lock_uniforms().is_ok());
    }
}
