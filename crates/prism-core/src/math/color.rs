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

//! Floating-point RGBA colors used for clear values and blend factors.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// A linear RGBA color with `f32` channels.
///
/// The layout is `#[repr(C)]` so the color can be embedded directly in command
/// stream payloads.
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub struct ColorRgba {
    /// Red channel.
    pub r: f32,
    /// Green channel.
    pub g: f32,
    /// Blue channel.
    pub b: f32,
    /// Alpha channel.
    pub a: f32,
}

impl ColorRgba {
    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Creates a color from its four channels.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Returns the channels as an array.
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Quantizes the color to 8-bit unsigned normalized channels.
    pub fn to_unorm8(self) -> [u8; 4] {
        let quantize = |c: f32| (c.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        [
            quantize(self.r),
            quantize(self.g),
            quantize(self.b),
            quantize(self.a),
        ]
    }
}

impl From<[f32; 4]> for ColorRgba {
    fn from(c: [f32; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_unorm8_quantization_clamps() {
        let color = ColorRgba::new(1.5, 0.5, -1.0, 1.0);
        assert_eq!(color.to_unorm8(), [255, 128, 0, 255]);
    }

    #[test]
    fn test_unorm8_quantization_stays_within_one_step() {
        let color = ColorRgba::from([0.25, 0.5, 0.75, 0.1]);
        for (channel, byte) in color.to_array().into_iter().zip(color.to_unorm8()) {
            assert_abs_diff_eq!(f32::from(byte) / 255.0, channel, epsilon = 1.0 / 255.0);
        }
    }
}
