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

use std::any::Any;

use crate::renderer::api::{CommandBufferFlags, CommandBufferId};
use crate::renderer::traits::{CommandRecorder, CommandResult};

/// A command buffer owned by the application.
///
/// Commands are recorded between [`begin`](Self::begin) and [`end`](Self::end),
/// then handed to a [`CommandQueue`](crate::renderer::traits::CommandQueue).
pub trait CommandBuffer: CommandRecorder + Send {
    /// The buffer's ID.
    fn id(&self) -> CommandBufferId;

    /// Creation flags.
    fn flags(&self) -> CommandBufferFlags;

    /// Starts recording, discarding previously recorded commands.
    fn begin(&mut self) -> CommandResult;

    /// Finishes recording. Fails inside a render pass or with open debug groups.
    fn end(&mut self) -> CommandResult;

    /// Returns `true` between `begin` and `end`.
    fn is_recording(&self) -> bool;

    /// Downcast to Any for backend-specific access.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast to Any for backend-specific access.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
