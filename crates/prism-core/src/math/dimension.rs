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

//! Extents (sizes) and offsets in 2D and 3D.
//!
//! Extents use unsigned components since they describe pixel counts. Offsets are
//! signed so that viewports and scissors may start outside the render target.

use serde::{Deserialize, Serialize};

/// A two-dimensional extent, used for swap-chain resolutions and render targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent2D {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Extent2D {
    /// Creates a new extent.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either dimension is zero.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered by this extent.
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A three-dimensional extent, used for texture sizes and copy regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent3D {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth in texels (1 for non-volume textures).
    pub depth: u32,
}

impl Extent3D {
    /// Creates a new extent.
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Number of texels covered by this extent.
    pub const fn volume(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth as u64
    }

    /// Returns `true` if any dimension is zero.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.depth == 0
    }
}

impl From<Extent2D> for Extent3D {
    fn from(extent: Extent2D) -> Self {
        Self::new(extent.width, extent.height, 1)
    }
}

/// A two-dimensional signed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Offset2D {
    /// Horizontal offset.
    pub x: i32,
    /// Vertical offset.
    pub y: i32,
}

impl Offset2D {
    /// Creates a new offset.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A three-dimensional signed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Offset3D {
    /// Horizontal offset.
    pub x: i32,
    /// Vertical offset.
    pub y: i32,
    /// Depth offset or array layer.
    pub z: i32,
}

impl Offset3D {
    /// Creates a new offset.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_area_and_volume() {
        assert_eq!(Extent2D::new(640, 480).area(), 307_200);
        assert_eq!(Extent3D::new(4, 4, 2).volume(), 32);
        assert!(Extent2D::new(0, 10).is_empty());
    }

    #[test]
    fn test_extent2d_promotes_to_single_slice() {
        let extent: Extent3D = Extent2D::new(8, 2).into();
        assert_eq!(extent, Extent3D::new(8, 2, 1));
    }
}
