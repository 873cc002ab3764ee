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

//! Opaque handles to render-system objects.
//!
//! Every object created by a [`RenderSystem`](crate::renderer::RenderSystem) is
//! referred to by a typed 64-bit ID. The value `0` is never handed out, which lets
//! command streams encode "no object" without an extra flag.

macro_rules! define_handle {
    ($($(#[$attr:meta])* $name:ident;)*) => {
        $(
            $(#[$attr])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u64);

            impl $name {
                /// Returns the raw value used in command streams.
                pub const fn raw(self) -> u64 {
                    self.0
                }
            }
        )*
    };
}

define_handle! {
    /// Handle to a GPU buffer.
    BufferId;
    /// Handle to a texture.
    TextureId;
    /// Handle to a sampler state.
    SamplerId;
    /// Handle to a single compiled shader stage.
    ShaderId;
    /// Handle to a shader program composed of several stages.
    ShaderProgramId;
    /// Handle to a pipeline layout.
    PipelineLayoutId;
    /// Handle to a graphics or compute pipeline state.
    PipelineStateId;
    /// Handle to a render pass.
    RenderPassId;
    /// Handle to a render target (off-screen or swap-chain backed).
    RenderTargetId;
    /// Handle to a resource heap (a set of bound resources).
    ResourceHeapId;
    /// Handle to a query heap.
    QueryHeapId;
    /// Handle to a fence.
    FenceId;
    /// Handle to a command buffer.
    CommandBufferId;
    /// Handle to a swap chain.
    SwapChainId;
}

/// Converts an optional handle into its stream encoding (`0` for `None`).
pub(crate) fn encode_optional(raw: Option<u64>) -> u64 {
    raw.unwrap_or(0)
}

/// Converts a stream-encoded handle back into an optional raw value.
pub(crate) fn decode_optional(raw: u64) -> Option<u64> {
    (raw != 0).then_some(raw)
}
