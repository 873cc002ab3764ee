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

//! Pixel and vertex formats with their bit layouts.

use serde::{Deserialize, Serialize};

/// The base data type of a format's components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Unsigned normalized or unsigned integer data.
    UInt8,
    /// 16-bit unsigned data.
    UInt16,
    /// 32-bit unsigned data.
    UInt32,
    /// 8-bit signed data.
    Int8,
    /// 16-bit signed data.
    Int16,
    /// 32-bit signed data.
    Int32,
    /// 16-bit floating point data.
    Float16,
    /// 32-bit floating point data.
    Float32,
}

prism_bitflags! {
    /// Properties of a [`Format`].
    pub struct FormatFlags: u32 {
        /// Components are normalized to `[0, 1]` or `[-1, 1]`.
        const NORMALIZED = 1 << 0;
        /// Components are integers without normalization.
        const INTEGER = 1 << 1;
        /// Color components are stored in sRGB space.
        const SRGB = 1 << 2;
        /// The format has a depth component.
        const DEPTH = 1 << 3;
        /// The format has a stencil component.
        const STENCIL = 1 << 4;
        /// Components are stored in reverse (BGRA) order.
        const BGRA = 1 << 5;
        /// The format can be used for vertex attributes.
        const VERTEX = 1 << 6;
        /// The format can be used for index buffers.
        const INDEX = 1 << 7;
    }
}

/// Static description of a [`Format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatAttributes {
    /// Number of bits per texel or element.
    pub bit_size: u32,
    /// Number of components.
    pub components: u32,
    /// Data type of each component.
    pub data_type: DataType,
    /// Additional properties.
    pub flags: FormatFlags,
}

/// The pixel and vertex formats understood by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Format {
    #[default]
    Undefined,
    R8UNorm,
    R8UInt,
    RG8UNorm,
    RGBA8UNorm,
    RGBA8UNormSrgb,
    BGRA8UNorm,
    BGRA8UNormSrgb,
    RGBA8UInt,
    R16UInt,
    R16Float,
    RG16Float,
    RGBA16Float,
    R32UInt,
    R32SInt,
    R32Float,
    RG32Float,
    RGB32Float,
    RGBA32Float,
    RGBA32UInt,
    D16UNorm,
    D24UNormS8UInt,
    D32Float,
    D32FloatS8X24UInt,
}

impl Format {
    /// Returns the static attributes of this format.
    pub fn attributes(self) -> FormatAttributes {
        use DataType::*;
        const NORM: FormatFlags = FormatFlags::NORMALIZED;
        const INT: FormatFlags = FormatFlags::INTEGER;
        const VTX: FormatFlags = FormatFlags::VERTEX;

        let (bit_size, components, data_type, flags) = match self {
            Format::Undefined => (0, 0, UInt8, FormatFlags::EMPTY),
            Format::R8UNorm => (8, 1, UInt8, NORM.with(VTX)),
            Format::R8UInt => (8, 1, UInt8, INT.with(VTX)),
            Format::RG8UNorm => (16, 2, UInt8, NORM.with(VTX)),
            Format::RGBA8UNorm => (32, 4, UInt8, NORM.with(VTX)),
            Format::RGBA8UNormSrgb => (32, 4, UInt8, NORM.with(FormatFlags::SRGB)),
            Format::BGRA8UNorm => (32, 4, UInt8, NORM.with(FormatFlags::BGRA)),
            Format::BGRA8UNormSrgb => (
                32,
                4,
                UInt8,
                NORM | FormatFlags::BGRA | FormatFlags::SRGB,
            ),
            Format::RGBA8UInt => (32, 4, UInt8, INT.with(VTX)),
            Format::R16UInt => (16, 1, UInt16, INT | VTX | FormatFlags::INDEX),
            Format::R16Float => (16, 1, Float16, VTX),
            Format::RG16Float => (32, 2, Float16, VTX),
            Format::RGBA16Float => (64, 4, Float16, VTX),
            Format::R32UInt => (32, 1, UInt32, INT | VTX | FormatFlags::INDEX),
            Format::R32SInt => (32, 1, Int32, INT.with(VTX)),
            Format::R32Float => (32, 1, Float32, VTX),
            Format::RG32Float => (64, 2, Float32, VTX),
            Format::RGB32Float => (96, 3, Float32, VTX),
            Format::RGBA32Float => (128, 4, Float32, VTX),
            Format::RGBA32UInt => (128, 4, UInt32, INT.with(VTX)),
            Format::D16UNorm => (16, 1, UInt16, NORM.with(FormatFlags::DEPTH)),
            Format::D24UNormS8UInt => (
                32,
                2,
                UInt32,
                NORM | FormatFlags::DEPTH | FormatFlags::STENCIL,
            ),
            Format::D32Float => (32, 1, Float32, FormatFlags::DEPTH),
            Format::D32FloatS8X24UInt => (
                64,
                2,
                Float32,
                FormatFlags::DEPTH.with(FormatFlags::STENCIL),
            ),
        };

        FormatAttributes {
            bit_size,
            components,
            data_type,
            flags,
        }
    }

    /// Size of one texel or element in bytes.
    pub fn bytes_per_pixel(self) -> u32 {
        self.attributes().bit_size / 8
    }

    /// Returns `true` if the format has a depth component.
    pub fn is_depth(self) -> bool {
        self.attributes().flags.contains(FormatFlags::DEPTH)
    }

    /// Returns `true` if the format has a stencil component.
    pub fn is_stencil(self) -> bool {
        self.attributes().flags.contains(FormatFlags::STENCIL)
    }

    /// Returns `true` if the format has a depth or a stencil component.
    pub fn is_depth_or_stencil(self) -> bool {
        self.attributes()
            .flags
            .intersects(FormatFlags::DEPTH | FormatFlags::STENCIL)
    }

    /// Returns `true` for color formats stored in sRGB space.
    pub fn is_srgb(self) -> bool {
        self.attributes().flags.contains(FormatFlags::SRGB)
    }

    /// Returns `true` for non-normalized integer formats.
    pub fn is_integer(self) -> bool {
        self.attributes().flags.contains(FormatFlags::INTEGER)
    }

    /// Returns `true` for normalized formats.
    pub fn is_normalized(self) -> bool {
        self.attributes().flags.contains(FormatFlags::NORMALIZED)
    }

    /// Returns `true` if the format can be used for index buffers.
    pub fn is_index_format(self) -> bool {
        self.attributes().flags.contains(FormatFlags::INDEX)
    }

    /// Picks the depth-stencil format for the requested bit depths, as swap
    /// chains do when they are configured by bit counts.
    pub fn from_depth_stencil_bits(depth_bits: u32, stencil_bits: u32) -> Format {
        match (depth_bits, stencil_bits) {
            (0, 0) => Format::Undefined,
            (_, s) if s > 0 && depth_bits > 24 => Format::D32FloatS8X24UInt,
            (_, s) if s > 0 => Format::D24UNormS8UInt,
            (d, _) if d <= 16 => Format::D16UNorm,
            _ => Format::D32Float,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_depth_stencil_counts_full_texel() {
        assert_eq!(Format::D32FloatS8X24UInt.bytes_per_pixel(), 8);
        assert_eq!(Format::D24UNormS8UInt.bytes_per_pixel(), 4);
        assert!(Format::D24UNormS8UInt.is_depth());
        assert!(Format::D24UNormS8UInt.is_stencil());
        assert!(!Format::D32Float.is_stencil());
    }

    #[test]
    fn test_color_format_properties() {
        assert!(Format::BGRA8UNormSrgb.is_srgb());
        assert!(Format::RGBA8UNorm.is_normalized());
        assert!(!Format::RGBA8UNorm.is_depth_or_stencil());
        assert_eq!(Format::RGBA32Float.bytes_per_pixel(), 16);
        assert_eq!(Format::RGB32Float.attributes().components, 3);
    }

    #[test]
    fn test_index_formats() {
        assert!(Format::R16UInt.is_index_format());
        assert!(Format::R32UInt.is_index_format());
        assert!(!Format::R32Float.is_index_format());
    }

    #[test]
    fn test_depth_stencil_selection_from_bits() {
        assert_eq!(Format::from_depth_stencil_bits(24, 8), Format::D24UNormS8UInt);
        assert_eq!(Format::from_depth_stencil_bits(32, 8), Format::D32FloatS8X24UInt);
        assert_eq!(Format::from_depth_stencil_bits(16, 0), Format::D16UNorm);
        assert_eq!(Format::from_depth_stencil_bits(32, 0), Format::D32Float);
        assert_eq!(Format::from_depth_stencil_bits(0, 0), Format::Undefined);
    }
}
