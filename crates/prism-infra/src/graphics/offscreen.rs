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

//! Swap chains that present into off-screen textures.

use prism_core::math::{Extent2D, Extent3D};
use prism_core::renderer::{
    clamp_samples, default_surface_title, AttachmentDescriptor, BindFlags, Format,
    RenderError, RenderSystem, RenderTargetDescriptor, RenderTargetId, SwapChain,
    SwapChainDescriptor, SwapChainId, TextureDescriptor, TextureId, TextureType,
};
use std::borrow::Cow;

const MAX_SWAP_BUFFERS: u32 = 3;

#[derive(Debug, Default)]
struct SwapBuffers {
    colors: Vec<TextureId>,
    targets: Vec<RenderTargetId>,
    depth_stencil: Option<TextureId>,
}

/// A swap chain whose back buffers are ordinary textures of a render system.
///
/// Presenting rotates to the next back buffer. Every back buffer has its own
/// render target; the depth-stencil buffer is shared.
#[derive(Debug)]
pub struct OffscreenSwapChain<S: RenderSystem + Clone> {
    system: S,
    id: SwapChainId,
    label: String,
    resolution: Extent2D,
    samples: u32,
    color_format: Format,
    depth_stencil_format: Format,
    num_buffers: u32,
    current: u32,
    vsync_interval: u32,
    title: String,
    buffers: SwapBuffers,
}

impl<S: RenderSystem + Clone> OffscreenSwapChain<S> {
    /// Creates the back buffers described by `descriptor` with `system`.
    ///
    /// ## Errors
    /// * `RenderError::SwapChain` - If the descriptor has a zero resolution or no color bits.
    /// * `RenderError::Resource` - If a back buffer cannot be created.
    pub fn new(
        system: S,
        id: SwapChainId,
        descriptor: &SwapChainDescriptor,
    ) -> Result<Self, RenderError> {
        if descriptor.resolution.is_empty() {
            return Err(RenderError::SwapChain(
                "swap chain resolution must be non-zero".to_string(),
            ));
        }
        let color_format = descriptor.color_format();
        if color_format == Format::Undefined {
            return Err(RenderError::SwapChain(
                "swap chain needs a color buffer".to_string(),
            ));
        }

        let max_samples = system.rendering_caps().limits.max_samples;
        let title = default_surface_title(system.renderer_info());
        let mut swap_chain = Self {
            id,
            label: descriptor
                .label
                .clone()
                .unwrap_or_else(|| format!("SwapChain{}", id.raw())),
            resolution: descriptor.resolution,
            samples: clamp_samples(descriptor.samples, max_samples),
            color_format,
            depth_stencil_format: descriptor.depth_stencil_format(),
            num_buffers: descriptor.swap_buffers.clamp(1, MAX_SWAP_BUFFERS),
            current: 0,
            vsync_interval: 1,
            title,
            buffers: SwapBuffers::default(),
            system,
        };
        if swap_chain.samples != descriptor.samples.max(1) {
            log::warn!(
                "OffscreenSwapChain: '{}' requested {} samples, using {}",
                swap_chain.label,
                descriptor.samples,
                swap_chain.samples
            );
        }
        if descriptor.fullscreen {
            log::debug!(
                "OffscreenSwapChain: '{}' ignores fullscreen mode",
                swap_chain.label
            );
        }
        swap_chain.buffers = swap_chain.create_buffers(swap_chain.resolution)?;
        log::info!(
            "OffscreenSwapChain: created '{}' ({}x{}, {} buffers, {} samples, {:?}/{:?})",
            swap_chain.label,
            swap_chain.resolution.width,
            swap_chain.resolution.height,
            swap_chain.num_buffers,
            swap_chain.samples,
            swap_chain.color_format,
            swap_chain.depth_stencil_format
        );
        Ok(swap_chain)
    }

    /// The render system owning the back buffers.
    pub fn system(&self) -> &S {
        &self.system
    }

    /// The shared depth-stencil texture, if any.
    pub fn depth_stencil_buffer(&self) -> Option<TextureId> {
        self.buffers.depth_stencil
    }

    fn texture_descriptor(&self, resolution: Extent2D, format: Format) -> TextureDescriptor<'static> {
        let bind_flags = if format.is_depth_or_stencil() {
            BindFlags::DEPTH_STENCIL_ATTACHMENT
        } else {
            BindFlags::COLOR_ATTACHMENT | BindFlags::SAMPLED | BindFlags::COPY_SRC
        };
        TextureDescriptor {
            label: Some(Cow::Owned(self.label.clone())),
            ty: if self.samples > 1 {
                TextureType::Texture2DMS
            } else {
                TextureType::Texture2D
            },
            bind_flags,
            format,
            extent: Extent3D::new(resolution.width, resolution.height, 1),
            samples: self.samples,
            ..Default::default()
        }
    }

    fn create_buffers(&self, resolution: Extent2D) -> Result<SwapBuffers, RenderError> {
        let mut buffers = SwapBuffers::default();
        let result = self.fill_buffers(resolution, &mut buffers);
        if let Err(err) = result {
            destroy_buffers(&self.system, &buffers);
            return Err(err);
        }
        Ok(buffers)
    }

    fn fill_buffers(
        &self,
        resolution: Extent2D,
        buffers: &mut SwapBuffers,
    ) -> Result<(), RenderError> {
        if self.depth_stencil_format != Format::Undefined {
            let desc = self.texture_descriptor(resolution, self.depth_stencil_format);
            buffers.depth_stencil = Some(self.system.create_texture(&desc, None)?);
        }
        for _ in 0..self.num_buffers {
            let desc = self.texture_descriptor(resolution, self.color_format);
            let color = self.system.create_texture(&desc, None)?;
            buffers.colors.push(color);

            let target = self.system.create_render_target(&RenderTargetDescriptor {
                label: Some(Cow::Owned(self.label.clone())),
                render_pass: None,
                resolution,
                samples: self.samples,
                color_attachments: vec![AttachmentDescriptor {
                    texture: Some(color),
                    format: self.color_format,
                    ..Default::default()
                }],
                depth_stencil_attachment: buffers.depth_stencil.map(|texture| {
                    AttachmentDescriptor {
                        texture: Some(texture),
                        format: self.depth_stencil_format,
                        ..Default::default()
                    }
                }),
            })?;
            buffers.targets.push(target);
        }
        Ok(())
    }
}

fn destroy_buffers<S: RenderSystem>(system: &S, buffers: &SwapBuffers) {
    for target in &buffers.targets {
        if let Err(err) = system.destroy_render_target(*target) {
            log::warn!("OffscreenSwapChain: failed to destroy render target: {err}");
        }
    }
    for texture in buffers.colors.iter().chain(buffers.depth_stencil.iter()) {
        if let Err(err) = system.destroy_texture(*texture) {
            log::warn!("OffscreenSwapChain: failed to destroy back buffer: {err}");
        }
    }
}

impl<S: RenderSystem + Clone> SwapChain for OffscreenSwapChain<S> {
    fn id(&self) -> SwapChainId {
        self.id
    }

    fn present(&mut self) -> Result<(), RenderError> {
        log::trace!(
            "OffscreenSwapChain: '{}' presents buffer {}",
            self.label,
            self.current
        );
        self.current = (self.current + 1) % self.num_buffers;
        Ok(())
    }

    fn current_swap_index(&self) -> u32 {
        self.current
    }

    fn num_swap_buffers(&self) -> u32 {
        self.num_buffers
    }

    fn samples(&self) -> u32 {
        self.samples
    }

    fn color_format(&self) -> Format {
        self.color_format
    }

    fn depth_stencil_format(&self) -> Format {
        self.depth_stencil_format
    }

    fn resolution(&self) -> Extent2D {
        self.resolution
    }

    fn resize_buffers(&mut self, resolution: Extent2D) -> Result<(), RenderError> {
        if resolution.is_empty() {
            return Err(RenderError::SwapChain(format!(
                "cannot resize '{}' to {}x{}",
                self.label, resolution.width, resolution.height
            )));
        }
        if resolution == self.resolution {
            return Ok(());
        }
        let buffers = self.create_buffers(resolution)?;
        let old = std::mem::replace(&mut self.buffers, buffers);
        destroy_buffers(&self.system, &old);
        self.resolution = resolution;
        self.current = 0;
        log::debug!(
            "OffscreenSwapChain: resized '{}' to {}x{}",
            self.label,
            resolution.width,
            resolution.height
        );
        Ok(())
    }

    fn set_vsync_interval(&mut self, interval: u32) -> Result<(), RenderError> {
        self.vsync_interval = interval;
        Ok(())
    }

    fn vsync_interval(&self) -> u32 {
        self.vsync_interval
    }

    fn render_target(&self) -> RenderTargetId {
        self.buffers.targets[self.current as usize]
    }

    fn color_buffer(&self, index: u32) -> Option<TextureId> {
        self.buffers.colors.get(index as usize).copied()
    }

    fn title(&self) -> &str {
        &self.title
    }
}

impl<S: RenderSystem + Clone> Drop for OffscreenSwapChain<S> {
    fn drop(&mut self) {
        destroy_buffers(&self.system, &self.buffers);
    }
}
