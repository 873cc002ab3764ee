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

use prism_core::renderer::{
    PipelineError, PipelineKind, RenderPassDescriptor, RenderingLimits, ResourceError,
    SamplerDescriptor, ShaderProgram, TextureDescriptor, TextureType,
};
use std::borrow::Cow;

/// Debug label of a descriptor, `"unnamed"` when it has none.
pub(crate) fn label_of<'a>(label: &'a Option<Cow<'_, str>>) -> &'a str {
    label.as_deref().unwrap_or("unnamed")
}

/// Checks that `program` can back a pipeline of the given kind.
///
/// ## Errors
/// * `PipelineError::IncompatibleProgram` - If the program is not linked, or if it
///   is a compute program used for a graphics pipeline (or the other way round).
pub fn check_pipeline_program(
    program: &ShaderProgram,
    kind: PipelineKind,
) -> Result<(), PipelineError> {
    let incompatible = |details: &str| PipelineError::IncompatibleProgram {
        program: program.id(),
        details: details.to_string(),
    };
    if !program.is_linked() {
        return Err(incompatible("program is not linked"));
    }
    match (kind, program.is_compute()) {
        (PipelineKind::Graphics, true) => {
            Err(incompatible("compute program used for a graphics pipeline"))
        }
        (PipelineKind::Compute, false) => {
            Err(incompatible("graphics program used for a compute pipeline"))
        }
        _ => Ok(()),
    }
}

/// Checks a texture descriptor against the device limits.
pub(crate) fn check_texture_limits(
    limits: &RenderingLimits,
    descriptor: &TextureDescriptor<'_>,
) -> Result<(), ResourceError> {
    let extent = descriptor.extent;
    let max_dim = extent.width.max(extent.height);
    let limit = match descriptor.ty {
        TextureType::Texture1D | TextureType::Texture1DArray => limits.max_1d_texture_size,
        TextureType::Texture3D => limits.max_3d_texture_size,
        TextureType::TextureCube | TextureType::TextureCubeArray => limits.max_cube_texture_size,
        _ => limits.max_2d_texture_size,
    };
    if max_dim > limit || extent.depth > limits.max_3d_texture_size {
        return Err(ResourceError::InvalidDescriptor(format!(
            "texture extent {}x{}x{} exceeds the limit of {limit}",
            extent.width, extent.height, extent.depth
        )));
    }
    if descriptor.layers() > limits.max_texture_array_layers {
        return Err(ResourceError::InvalidDescriptor(format!(
            "{} array layers exceed the limit of {}",
            descriptor.layers(),
            limits.max_texture_array_layers
        )));
    }
    if descriptor.samples > limits.max_samples {
        return Err(ResourceError::InvalidDescriptor(format!(
            "{} samples exceed the limit of {}",
            descriptor.samples, limits.max_samples
        )));
    }
    Ok(())
}

/// Rejects empty LOD ranges and anisotropy outside `1..=16`.
pub(crate) fn check_sampler(descriptor: &SamplerDescriptor<'_>) -> Result<(), ResourceError> {
    if descriptor.min_lod > descriptor.max_lod {
        return Err(ResourceError::InvalidDescriptor(format!(
            "sampler LOD range {}..{} is empty",
            descriptor.min_lod, descriptor.max_lod
        )));
    }
    if !(1..=16).contains(&descriptor.max_anisotropy) {
        return Err(ResourceError::InvalidDescriptor(format!(
            "anisotropy {} is outside 1..=16",
            descriptor.max_anisotropy
        )));
    }
    Ok(())
}

/// Checks attachment and sample counts of a render pass against the device limits.
pub(crate) fn check_render_pass(
    limits: &RenderingLimits,
    descriptor: &RenderPassDescriptor<'_>,
) -> Result<(), ResourceError> {
    if descriptor.color_attachments.len() as u32 > limits.max_color_attachments {
        return Err(ResourceError::InvalidDescriptor(format!(
            "{} color attachments exceed the limit of {}",
            descriptor.color_attachments.len(),
            limits.max_color_attachments
        )));
    }
    if descriptor.samples > limits.max_samples {
        return Err(ResourceError::InvalidDescriptor(format!(
            "{} samples exceed the limit of {}",
            descriptor.samples, limits.max_samples
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::renderer::{
        ShaderId, ShaderProgramId, ShaderReflection, ShaderStage, ShaderType,
    };

    fn program(stages: &[ShaderType]) -> ShaderProgram {
        let mut program = ShaderProgram::new(ShaderProgramId(1), false);
        for (i, ty) in stages.iter().enumerate() {
            program.attach_shader(ShaderStage {
                id: ShaderId(i as u64 + 1),
                ty: *ty,
                valid: true,
                reflection: ShaderReflection::default(),
            });
        }
        program
    }

    #[test]
    fn test_unlinked_program_is_rejected() {
        let program = program(&[ShaderType::Vertex]);
        assert!(check_pipeline_program(&program, PipelineKind::Graphics).is_err());
    }

    #[test]
    fn test_program_kind_must_match_pipeline() {
        let mut graphics = program(&[ShaderType::Vertex, ShaderType::Fragment]);
        graphics.link().unwrap();
        let mut compute = program(&[ShaderType::Compute]);
        compute.link().unwrap();

        assert!(check_pipeline_program(&graphics, PipelineKind::Graphics).is_ok());
        assert!(check_pipeline_program(&compute, PipelineKind::Compute).is_ok());
        assert!(matches!(
            check_pipeline_program(&compute, PipelineKind::Graphics),
            Err(PipelineError::IncompatibleProgram { .. })
        ));
        assert!(check_pipeline_program(&graphics, PipelineKind::Compute).is_err());
    }

    #[test]
    fn test_texture_limits() {
        let limits = RenderingLimits::default();
        let mut descriptor = TextureDescriptor {
            extent: prism_core::math::Extent3D::new(64, 64, 1),
            ..Default::default()
        };
        assert!(check_texture_limits(&limits, &descriptor).is_ok());
        descriptor.extent.width = limits.max_2d_texture_size + 1;
        assert!(matches!(
            check_texture_limits(&limits, &descriptor),
            Err(ResourceError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_sampler_checks() {
        assert!(check_sampler(&SamplerDescriptor::default()).is_ok());
        let empty_lod = SamplerDescriptor {
            min_lod: 4.0,
            max_lod: 1.0,
            ..Default::default()
        };
        assert!(check_sampler(&empty_lod).is_err());
        let anisotropy = SamplerDescriptor {
            max_anisotropy: 32,
            ..Default::default()
        };
        assert!(check_sampler(&anisotropy).is_err());
    }
}
