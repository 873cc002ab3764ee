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

//! Public data types of the rendering layer: handles, descriptors, formats and
//! configuration.

pub mod buffer;
pub mod command;
pub mod format;
pub mod handle;
pub mod module;
pub mod pipeline;
pub mod query;
pub mod render_pass;
pub mod shader;
pub mod shader_program;
pub mod swap_chain;
pub mod system;
pub mod texture;
pub mod vertex;

pub use self::buffer::*;
pub use self::command::*;
pub use self::format::*;
pub use self::handle::*;
pub use self::module::*;
pub use self::pipeline::*;
pub use self::query::*;
pub use self::render_pass::*;
pub use self::shader::*;
pub use self::shader_program::*;
pub use self::swap_chain::*;
pub use self::system::*;
pub use self::texture::*;
pub use self::vertex::*;
