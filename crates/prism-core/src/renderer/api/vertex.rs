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

//! Vertex attribute layouts and stream-output declarations.

use super::Format;

/// One vertex attribute as seen by the vertex shader.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexAttribute {
    /// Attribute name, matched against the shader's reflected inputs.
    pub name: String,
    /// Element format.
    pub format: Format,
    /// Shader input location.
    pub location: u32,
    /// Semantic index for HLSL-style semantics (`TEXCOORD1`).
    pub semantic_index: u32,
    /// Vertex buffer slot.
    pub slot: u32,
    /// Byte offset within one vertex.
    pub offset: u32,
    /// Byte stride between two vertices.
    pub stride: u32,
    /// Instance step rate, `0` for per-vertex data.
    pub instance_divisor: u32,
}

impl VertexAttribute {
    /// Creates an attribute at the given location. Offset and stride are filled in
    /// by [`VertexFormat::append_attribute`].
    pub fn new(name: impl Into<String>, format: Format, location: u32) -> Self {
        Self {
            name: name.into(),
            format,
            location,
            ..Default::default()
        }
    }

    /// Size of the attribute in bytes.
    pub fn size(&self) -> u32 {
        self.format.bytes_per_pixel()
    }

    /// Returns `true` for per-instance attributes.
    pub fn is_per_instance(&self) -> bool {
        self.instance_divisor > 0
    }
}

/// An interleaved vertex layout for one vertex buffer slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VertexFormat {
    /// The attributes, in the order they were appended.
    pub attributes: Vec<VertexAttribute>,
}

impl VertexFormat {
    /// Creates an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an attribute right after the previous one and rewrites the stride
    /// of every attribute to the new vertex size.
    pub fn append_attribute(&mut self, mut attribute: VertexAttribute) {
        attribute.offset = self.stride();
        attribute.slot = self.attributes.first().map_or(attribute.slot, |a| a.slot);
        self.attributes.push(attribute);
        let stride = self
            .attributes
            .iter()
            .map(|a| a.offset + a.size())
            .max()
            .unwrap_or(0);
        for attribute in &mut self.attributes {
            attribute.stride = stride;
        }
    }

    /// Byte stride of one vertex.
    pub fn stride(&self) -> u32 {
        self.attributes.first().map_or(0, |a| a.stride)
    }

    /// Assigns every attribute to the given vertex buffer slot.
    pub fn set_slot(&mut self, slot: u32) {
        for attribute in &mut self.attributes {
            attribute.slot = slot;
        }
    }
}

/// One varying captured by stream output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StreamOutputAttribute {
    /// Name of the captured shader output.
    pub name: String,
    /// Output stream index.
    pub stream: u32,
    /// First component to capture.
    pub start_component: u8,
    /// Number of components to capture.
    pub component_count: u8,
    /// Stream-output buffer slot.
    pub output_slot: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_attribute_packs_and_rewrites_stride() {
        let mut format = VertexFormat::new();
        format.append_attribute(VertexAttribute::new("position", Format::RG32Float, 0));
        assert_eq!(format.stride(), 8);
        format.append_attribute(VertexAttribute::new("color", Format::RGBA8UNorm, 1));

        assert_eq!(format.attributes[1].offset, 8);
        assert!(format.attributes.iter().all(|a| a.stride == 12));
        assert_eq!(format.stride(), 12);
    }

    #[test]
    fn test_set_slot_applies_to_all_attributes() {
        let mut format = VertexFormat::new();
        format.append_attribute(VertexAttribute::new("position", Format::RGB32Float, 0));
        format.append_attribute(VertexAttribute::new("uv", Format::RG32Float, 1));
        format.set_slot(2);
        assert!(format.attributes.iter().all(|a| a.slot == 2));
    }
}
