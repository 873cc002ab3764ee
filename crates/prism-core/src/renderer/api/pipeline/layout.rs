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

//! Pipeline layouts describe which resources a pipeline binds and where.
//!
//! Besides the structured form, layouts can be written as a compact signature:
//!
//! ```text
//! cbuffer(Scene@1):vert:frag, texture(albedo@2):frag, sampler(4):frag, rwbuffer(particles@0[2]):comp
//! ```
//!
//! Each entry is `kind(name@slot[array_size])` followed by the stages that see it.

use crate::renderer::api::{BarrierFlags, BindFlags, ShaderStageFlags, ShaderType};
use crate::renderer::error::PipelineError;
use std::borrow::Cow;

/// The kind of resource bound at a layout slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// A buffer (constant, sampled or storage).
    Buffer,
    /// A texture (sampled or storage).
    Texture,
    /// A sampler state.
    Sampler,
}

/// One binding of a pipeline layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingDescriptor {
    /// Optional resource name, used to match shader reflection.
    pub name: String,
    /// Kind of resource.
    pub ty: ResourceType,
    /// How the resource is bound.
    pub bind_flags: BindFlags,
    /// Stages that access the resource.
    pub stages: ShaderStageFlags,
    /// Binding slot.
    pub slot: u32,
    /// Number of array elements, `1` for single resources.
    pub array_size: u32,
}

/// Describes a pipeline layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineLayoutDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The bindings of the layout.
    pub bindings: Vec<BindingDescriptor>,
    /// Barriers inserted between commands that use the layout.
    pub barrier_flags: BarrierFlags,
}

impl PipelineLayoutDescriptor<'_> {
    /// Returns the binding at the given index in declaration order.
    pub fn binding(&self, index: u32) -> Option<&BindingDescriptor> {
        self.bindings.get(index as usize)
    }

    /// Returns `true` if two bindings of the same kind share a slot.
    pub fn has_slot_conflicts(&self) -> bool {
        self.bindings.iter().enumerate().any(|(i, a)| {
            self.bindings[i + 1..]
                .iter()
                .any(|b| a.slot == b.slot && a.ty == b.ty && a.stages.intersects(b.stages))
        })
    }
}

/// Parses a textual pipeline-layout signature.
pub fn parse(signature: &str) -> Result<PipelineLayoutDescriptor<'static>, PipelineError> {
    let mut parser = Parser {
        input: signature,
        pos: 0,
    };
    let mut bindings = Vec::new();

    parser.skip_whitespace();
    while !parser.at_end() {
        bindings.push(parser.parse_binding()?);
        parser.skip_whitespace();
        if parser.at_end() {
            break;
        }
        parser.expect(',')?;
        parser.skip_whitespace();
    }

    let barrier_flags = storage_barriers(&bindings);
    Ok(PipelineLayoutDescriptor {
        label: None,
        bindings,
        barrier_flags,
    })
}

fn storage_barriers(bindings: &[BindingDescriptor]) -> BarrierFlags {
    bindings
        .iter()
        .filter(|binding| binding.bind_flags.contains(BindFlags::STORAGE))
        .fold(BarrierFlags::EMPTY, |flags, binding| match binding.ty {
            ResourceType::Buffer => flags | BarrierFlags::STORAGE_BUFFER,
            ResourceType::Texture => flags | BarrierFlags::STORAGE_TEXTURE,
            ResourceType::Sampler => flags,
        })
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn error(&self, details: impl Into<String>) -> PipelineError {
        PipelineError::InvalidLayoutSignature {
            position: self.pos,
            details: details.into(),
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), PipelineError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{expected}' but found '{c}'"))),
            None => Err(self.error(format!("expected '{expected}' but reached the end"))),
        }
    }

    fn identifier(&mut self) -> &str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !(c.is_ascii_alphanumeric() || c == '_') {
                break;
            }
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    fn number(&mut self) -> Result<u32, PipelineError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        self.input[start..self.pos]
            .parse()
            .map_err(|_| PipelineError::InvalidLayoutSignature {
                position: start,
                details: "expected a number".to_string(),
            })
    }

    fn parse_binding(&mut self) -> Result<BindingDescriptor, PipelineError> {
        let kind_pos = self.pos;
        let kind = self.identifier().to_string();
        let (ty, bind_flags) = match kind.as_str() {
            "cbuffer" => (ResourceType::Buffer, BindFlags::CONSTANT_BUFFER),
            "buffer" => (ResourceType::Buffer, BindFlags::SAMPLED),
            "rwbuffer" => (ResourceType::Buffer, BindFlags::STORAGE),
            "texture" => (ResourceType::Texture, BindFlags::SAMPLED),
            "rwtexture" => (ResourceType::Texture, BindFlags::STORAGE),
            "sampler" => (ResourceType::Sampler, BindFlags::EMPTY),
            other => {
                return Err(PipelineError::InvalidLayoutSignature {
                    position: kind_pos,
                    details: format!("unknown resource kind '{other}'"),
                })
            }
        };

        self.expect('(')?;
        self.skip_whitespace();
        let name = if matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            String::new()
        } else {
            let name = self.identifier().to_string();
            self.expect('@')?;
            name
        };
        let slot = self.number()?;
        let array_size = if self.peek() == Some('[') {
            self.expect('[')?;
            let size = self.number()?;
            self.expect(']')?;
            size
        } else {
            1
        };
        self.skip_whitespace();
        self.expect(')')?;

        let mut stages = ShaderStageFlags::EMPTY;
        while self.peek() == Some(':') {
            self.expect(':')?;
            let stage_pos = self.pos;
            let stage = self.identifier();
            let flag = ShaderType::ALL
                .iter()
                .find(|ty| ty.short_name() == stage)
                .map(|ty| ty.stage_flag())
                .ok_or_else(|| PipelineError::InvalidLayoutSignature {
                    position: stage_pos,
                    details: format!("unknown shader stage '{stage}'"),
                })?;
            stages |= flag;
        }
        if stages.is_empty() {
            stages = ShaderStageFlags::ALL;
        }

        Ok(BindingDescriptor {
            name,
            ty,
            bind_flags,
            stages,
            slot,
            array_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_signature() {
        let layout = parse(
            "cbuffer(Scene@1):vert:frag, texture(albedo@2):frag, sampler(4):frag, rwbuffer(particles@0[2]):comp",
        )
        .unwrap();
        assert_eq!(layout.bindings.len(), 4);

        let scene = &layout.bindings[0];
        assert_eq!(scene.name, "Scene");
        assert_eq!(scene.slot, 1);
        assert_eq!(scene.bind_flags, BindFlags::CONSTANT_BUFFER);
        assert_eq!(
            scene.stages,
            ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT
        );

        let sampler = &layout.bindings[2];
        assert!(sampler.name.is_empty());
        assert_eq!(sampler.ty, ResourceType::Sampler);

        let particles = &layout.bindings[3];
        assert_eq!(particles.array_size, 2);
        assert_eq!(particles.stages, ShaderStageFlags::COMPUTE);
        assert_eq!(layout.barrier_flags, BarrierFlags::STORAGE_BUFFER);
    }

    #[test]
    fn test_layout_without_storage_needs_no_barrier() {
        let layout = parse("cbuffer(Frame@0), texture(albedo@1):frag").unwrap();
        assert!(layout.barrier_flags.is_empty());
        assert!(BarrierFlags::STORAGE.contains(BarrierFlags::STORAGE_TEXTURE));
    }

    #[test]
    fn test_bindings_without_stages_are_visible_everywhere() {
        let layout = parse("cbuffer(Frame@0)").unwrap();
        assert_eq!(layout.bindings[0].stages, ShaderStageFlags::ALL);
    }

    #[test]
    fn test_empty_signature() {
        assert!(parse("  ").unwrap().bindings.is_empty());
    }

    #[test]
    fn test_parse_errors_report_position() {
        assert_eq!(
            parse("image(tex@0)"),
            Err(PipelineError::InvalidLayoutSignature {
                position: 0,
                details: "unknown resource kind 'image'".to_string(),
            })
        );
        assert!(matches!(
            parse("texture(tex@0):pixel"),
            Err(PipelineError::InvalidLayoutSignature { position: 15, .. })
        ));
        assert!(parse("texture(tex@)").is_err());
        assert!(parse("cbuffer(a@0) cbuffer(b@1)").is_err());
    }

    #[test]
    fn test_slot_conflicts() {
        let layout = parse("texture(a@0):frag, texture(b@0):frag").unwrap();
        assert!(layout.has_slot_conflicts());
        let layout = parse("texture(a@0):frag, sampler(0):frag").unwrap();
        assert!(!layout.has_slot_conflicts());
    }
}
