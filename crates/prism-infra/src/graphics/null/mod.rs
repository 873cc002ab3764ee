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

//! CPU emulation of a rendering device.
//!
//! Objects live in per-kind tables behind mutexes. Command buffers record the
//! shared opcode stream; the queue replays it with [`NullExecutor`](executor),
//! moving buffer data through a host-memory staging pool.

mod command;
mod device;
mod executor;
mod resources;
mod system;
mod transfer;

pub use self::command::NullCommandQueue;
pub use self::executor::NullStatistics;
pub use self::system::NullRenderSystem;
