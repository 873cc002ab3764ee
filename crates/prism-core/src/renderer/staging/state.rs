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

/// The usage state a GPU resource is in.
///
/// Transfers move their destination into [`ResourceState::CopyDest`] and their
/// source into [`ResourceState::CopySource`], then restore the previous state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum ResourceState {
    #[default]
    Common,
    VertexAndConstantBuffer,
    IndexBuffer,
    CopyDest,
    CopySource,
    UnorderedAccess,
    ShaderResource,
    IndirectArgument,
    StreamOut,
    RenderTarget,
    DepthWrite,
    Present,
}

impl ResourceState {
    /// Returns `true` for states that only allow reading.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            ResourceState::VertexAndConstantBuffer
                | ResourceState::IndexBuffer
                | ResourceState::CopySource
                | ResourceState::ShaderResource
                | ResourceState::IndirectArgument
        )
    }
}

/// A resource whose usage state is tracked across transfers.
pub trait TrackedResource {
    /// The current state.
    fn resource_state(&self) -> ResourceState;

    /// Records a new state.
    fn set_resource_state(&mut self, state: ResourceState);
}
