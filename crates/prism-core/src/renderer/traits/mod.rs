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

//! This module contains the contracts between applications and renderer modules.
//!
//! - [`RenderSystem`]: creates and destroys every GPU object.
//! - [`CommandRecorder`]: the command vocabulary, shared by recording and execution.
//! - [`CommandBuffer`]: a recorder with a `begin`/`end` lifecycle.
//! - [`CommandQueue`]: executes command buffers and synchronizes with the GPU.
//! - [`SwapChain`]: presentable color buffers.

mod command_buffer;
mod command_queue;
mod command_recorder;
mod render_system;
mod swap_chain;

pub use self::command_buffer::CommandBuffer;
pub use self::command_queue::CommandQueue;
pub use self::command_recorder::{CommandRecorder, CommandResult};
pub use self::render_system::RenderSystem;
pub use self::swap_chain::SwapChain;
