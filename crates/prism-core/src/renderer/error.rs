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

//! Defines the hierarchy of error types for the rendering layer.

use crate::renderer::api::{
    BufferId, CommandBufferId, Format, LinkError, PipelineLayoutId, PipelineStateId,
    RenderPassId, RenderTargetId, ShaderId, ShaderProgramId, ShaderType,
};
use std::fmt;

/// An error related to the creation of shaders or the linking of shader programs.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderError {
    /// The shader source was rejected by the backend.
    CompilationError {
        /// A descriptive label for the shader.
        label: String,
        /// Detailed messages reported by the backend compiler.
        details: String,
    },
    /// The requested shader could not be found.
    NotFound {
        /// The ID of the missing shader.
        id: ShaderId,
    },
    /// An input layout declares more vertex attributes than a program accepts.
    TooManyVertexAttributes {
        /// The number of declared attributes.
        count: usize,
        /// The maximum number of attributes.
        max: usize,
    },
    /// A shader of this type cannot be used where it was supplied.
    UnexpectedStage {
        /// The supplied shader.
        id: ShaderId,
        /// Its actual stage.
        stage: ShaderType,
    },
    /// The program failed to link.
    LinkFailed {
        /// The program that failed to link.
        program: ShaderProgramId,
        /// The categorized link error.
        error: LinkError,
        /// The link info log.
        log: String,
    },
    /// The program has not been linked successfully yet.
    NotLinked {
        /// The program that is not linked.
        program: ShaderProgramId,
    },
    /// A named resource does not exist in the program's reflection data.
    UnknownResource {
        /// The requested resource name.
        name: String,
    },
    /// Individual uniforms are not available with the current backend or lock state.
    UniformsUnavailable,
    /// The data written to a uniform does not match its declared size.
    UniformSizeMismatch {
        /// The uniform name.
        name: String,
        /// Declared size in bytes.
        expected: usize,
        /// Supplied size in bytes.
        actual: usize,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::CompilationError { label, details } => {
                write!(f, "Shader compilation failed for '{label}': {details}")
            }
            ShaderError::NotFound { id } => write!(f, "Shader not found for ID: {id:?}"),
            ShaderError::TooManyVertexAttributes { count, max } => {
                write!(f, "Input layout declares {count} vertex attributes (max {max})")
            }
            ShaderError::UnexpectedStage { id, stage } => {
                write!(f, "Shader {id:?} has unexpected stage {stage:?}")
            }
            ShaderError::LinkFailed {
                program,
                error,
                log,
            } => {
                write!(f, "Shader program {program:?} failed to link ({error:?})")?;
                if !log.is_empty() {
                    write!(f, ": {log}")?;
                }
                Ok(())
            }
            ShaderError::NotLinked { program } => {
                write!(f, "Shader program {program:?} is not linked")
            }
            ShaderError::UnknownResource { name } => {
                write!(f, "No shader resource named '{name}'")
            }
            ShaderError::UniformsUnavailable => {
                write!(f, "Individual uniforms are not available")
            }
            ShaderError::UniformSizeMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "Uniform '{name}' expects {expected} bytes but {actual} were supplied"
            ),
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the creation of pipeline layouts and pipeline states.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The textual pipeline-layout signature could not be parsed.
    InvalidLayoutSignature {
        /// The position in the signature where parsing failed.
        position: usize,
        /// What went wrong.
        details: String,
    },
    /// The referenced pipeline layout does not exist.
    LayoutNotFound(PipelineLayoutId),
    /// The referenced render pass does not exist.
    RenderPassNotFound(RenderPassId),
    /// The shader program's stages do not match the kind of pipeline.
    IncompatibleProgram {
        /// The offending program.
        program: ShaderProgramId,
        /// A human-readable explanation.
        details: String,
    },
    /// The referenced pipeline state does not exist.
    NotFound(PipelineStateId),
    /// The backend rejected the pipeline.
    CreationFailed {
        /// The pipeline label.
        label: String,
        /// Backend details.
        details: String,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InvalidLayoutSignature { position, details } => {
                write!(
                    f,
                    "Invalid pipeline layout signature at position {position}: {details}"
                )
            }
            PipelineError::LayoutNotFound(id) => write!(f, "Pipeline layout not found: {id:?}"),
            PipelineError::RenderPassNotFound(id) => write!(f, "Render pass not found: {id:?}"),
            PipelineError::IncompatibleProgram { program, details } => {
                write!(f, "Shader program {program:?} is incompatible: {details}")
            }
            PipelineError::NotFound(id) => write!(f, "Pipeline state not found: {id:?}"),
            PipelineError::CreationFailed { label, details } => {
                write!(f, "Failed to create pipeline '{label}': {details}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// A general error related to the management of GPU resources.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// A shader-related error.
    Shader(ShaderError),
    /// A pipeline-related error.
    Pipeline(PipelineError),
    /// A resource handle did not resolve to a live resource.
    NotFound,
    /// The descriptor was rejected before reaching the backend.
    InvalidDescriptor(String),
    /// An access went past the end of a resource.
    OutOfBounds {
        /// The first byte or texel of the access.
        offset: u64,
        /// The size of the access.
        size: u64,
        /// The size of the accessed resource.
        limit: u64,
    },
    /// The resource does not allow the requested CPU access.
    InvalidAccess(String),
    /// The format is not supported for the requested operation.
    UnsupportedFormat(Format),
    /// A backend-specific failure.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
            ResourceError::NotFound => write!(f, "The requested resource was not found"),
            ResourceError::InvalidDescriptor(msg) => write!(f, "Invalid descriptor: {msg}"),
            ResourceError::OutOfBounds {
                offset,
                size,
                limit,
            } => write!(
                f,
                "Access of {size} bytes at offset {offset} exceeds resource size {limit}"
            ),
            ResourceError::InvalidAccess(msg) => write!(f, "Invalid resource access: {msg}"),
            ResourceError::UnsupportedFormat(format) => {
                write!(f, "Unsupported format: {format:?}")
            }
            ResourceError::BackendError(msg) => write!(f, "Backend error: {msg}"),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            ResourceError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

/// An error raised while recording, decoding or executing a command stream.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    /// `begin` was called on a command buffer that is already recording.
    AlreadyRecording,
    /// A command was recorded outside of `begin`/`end`.
    NotRecording,
    /// The command is not allowed inside a render pass.
    InsideRenderPass,
    /// The command requires an active render pass.
    OutsideRenderPass,
    /// `pop_debug_group` without a matching push, or `end` with open groups.
    UnbalancedDebugGroup {
        /// The number of groups still open.
        open: u32,
    },
    /// A draw or dispatch was issued without a compatible pipeline state.
    MissingPipelineState,
    /// The stream contained a byte that names no opcode.
    UnknownOpcode {
        /// The unknown byte.
        opcode: u8,
        /// Its position in the stream.
        offset: usize,
    },
    /// The stream ended in the middle of a command.
    Truncated {
        /// Position of the incomplete command.
        offset: usize,
    },
    /// A payload field holds a value outside its domain.
    MalformedPayload {
        /// Opcode of the command.
        opcode: u8,
        /// Position of the command.
        offset: usize,
    },
    /// A secondary command buffer referenced by `execute` is unknown.
    UnknownCommandBuffer(CommandBufferId),
    /// A secondary command buffer cannot be submitted directly.
    SecondarySubmit(CommandBufferId),
    /// The buffer is not usable for the requested binding.
    InvalidBinding {
        /// The offending buffer.
        buffer: BufferId,
        /// What binding was expected.
        expected: &'static str,
    },
    /// The render target referenced by a render pass is unknown.
    UnknownRenderTarget(RenderTargetId),
    /// The command buffer cannot be used with this backend.
    ForeignCommandBuffer,
    /// A resource referenced by the command failed.
    Resource(ResourceError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::AlreadyRecording => write!(f, "Command buffer is already recording"),
            CommandError::NotRecording => write!(f, "Command buffer is not recording"),
            CommandError::InsideRenderPass => {
                write!(f, "Command is not allowed inside a render pass")
            }
            CommandError::OutsideRenderPass => write!(f, "Command requires an active render pass"),
            CommandError::UnbalancedDebugGroup { open } => {
                write!(f, "Unbalanced debug groups ({open} open)")
            }
            CommandError::MissingPipelineState => {
                write!(f, "No compatible pipeline state is bound")
            }
            CommandError::UnknownOpcode { opcode, offset } => {
                write!(f, "Unknown opcode {opcode:#04x} at stream offset {offset}")
            }
            CommandError::Truncated { offset } => {
                write!(f, "Command stream truncated at offset {offset}")
            }
            CommandError::MalformedPayload { opcode, offset } => {
                write!(
                    f,
                    "Malformed payload for opcode {opcode:#04x} at stream offset {offset}"
                )
            }
            CommandError::UnknownCommandBuffer(id) => {
                write!(f, "Unknown secondary command buffer: {id:?}")
            }
            CommandError::SecondarySubmit(id) => {
                write!(f, "Secondary command buffer {id:?} cannot be submitted directly")
            }
            CommandError::InvalidBinding { buffer, expected } => {
                write!(f, "Buffer {buffer:?} cannot be bound as {expected}")
            }
            CommandError::UnknownRenderTarget(id) => write!(f, "Unknown render target: {id:?}"),
            CommandError::ForeignCommandBuffer => {
                write!(f, "Command buffer was created by a different backend")
            }
            CommandError::Resource(err) => write!(f, "Command resource error: {err}"),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Resource(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for CommandError {
    fn from(err: ResourceError) -> Self {
        CommandError::Resource(err)
    }
}

/// A high-level error raised by the render system or module loader.
#[derive(Debug)]
pub enum RenderError {
    /// The module name does not name any known rendering backend.
    UnknownModule(String),
    /// The module is known but not available in this build or on this platform.
    ModuleUnavailable(String),
    /// The backend failed to initialize.
    InitializationFailed(String),
    /// A resource operation failed.
    Resource(ResourceError),
    /// A command recording or submission failed.
    Command(CommandError),
    /// A swap-chain operation failed.
    SwapChain(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::UnknownModule(name) => write!(f, "Unknown renderer module: '{name}'"),
            RenderError::ModuleUnavailable(name) => {
                write!(f, "Renderer module '{name}' is not available")
            }
            RenderError::InitializationFailed(msg) => {
                write!(f, "Render system initialization failed: {msg}")
            }
            RenderError::Resource(err) => write!(f, "Resource error: {err}"),
            RenderError::Command(err) => write!(f, "Command error: {err}"),
            RenderError::SwapChain(msg) => write!(f, "Swap chain error: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Resource(err) => Some(err),
            RenderError::Command(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::Resource(err)
    }
}

impl From<CommandError> for RenderError {
    fn from(err: CommandError) -> Self {
        RenderError::Command(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_link_failure_display_includes_log() {
        let err = ShaderError::LinkFailed {
            program: ShaderProgramId(3),
            error: LinkError::InvalidComposition,
            log: "compute shader mixed with fragment shader".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Shader program ShaderProgramId(3) failed to link (InvalidComposition): compute shader mixed with fragment shader"
        );
    }

    #[test]
    fn test_resource_error_wraps_pipeline_error_as_source() {
        let err: ResourceError = PipelineError::NotFound(PipelineStateId(7)).into();
        assert!(err.source().is_some());
        assert_eq!(
            err.to_string(),
            "Pipeline resource error: Pipeline state not found: PipelineStateId(7)"
        );
    }

    #[test]
    fn test_command_error_display() {
        let err = CommandError::UnknownOpcode {
            opcode: 0xff,
            offset: 12,
        };
        assert_eq!(err.to_string(), "Unknown opcode 0xff at stream offset 12");
        let err: RenderError = CommandError::OutsideRenderPass.into();
        assert_eq!(
            err.to_string(),
            "Command error: Command requires an active render pass"
        );
    }

    #[test]
    fn test_out_of_bounds_display() {
        let err = ResourceError::OutOfBounds {
            offset: 60,
            size: 8,
            limit: 64,
        };
        assert_eq!(
            err.to_string(),
            "Access of 8 bytes at offset 60 exceeds resource size 64"
        );
    }
}
