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

use crate::math::Extent2D;
use crate::renderer::api::{Format, RenderTargetId, SwapChainId, TextureId};
use crate::renderer::error::RenderError;

/// A set of presentable color buffers with an optional depth-stencil buffer.
///
/// Swap chains are off-screen: presenting rotates the back buffer and the
/// surface title is kept as metadata.
pub trait SwapChain: Send {
    /// The swap chain's ID.
    fn id(&self) -> SwapChainId;

    /// Presents the current back buffer and advances to the next one.
    fn present(&mut self) -> Result<(), RenderError>;

    /// Index of the buffer rendered to next.
    fn current_swap_index(&self) -> u32;

    /// Number of color buffers.
    fn num_swap_buffers(&self) -> u32;

    /// Samples per pixel after clamping.
    fn samples(&self) -> u32;

    /// Format of the color buffers.
    fn color_format(&self) -> Format;

    /// Format of the depth-stencil buffer, [`Format::Undefined`] when there is none.
    fn depth_stencil_format(&self) -> Format;

    /// Current resolution.
    fn resolution(&self) -> Extent2D;

    /// Recreates the buffers with a new resolution.
    ///
    /// A zero extent is rejected and leaves the swap chain unchanged.
    fn resize_buffers(&mut self, resolution: Extent2D) -> Result<(), RenderError>;

    /// Sets the vertical synchronization interval (0 disables vsync).
    fn set_vsync_interval(&mut self, interval: u32) -> Result<(), RenderError>;

    /// The current vertical synchronization interval.
    fn vsync_interval(&self) -> u32;

    /// Render target that draws into the current back buffer.
    fn render_target(&self) -> RenderTargetId;

    /// Texture backing color buffer `index`.
    fn color_buffer(&self, index: u32) -> Option<TextureId>;

    /// Title of the presentation surface.
    fn title(&self) -> &str;
}
