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

//! Rendering backends and the helpers they share.

pub mod null;
mod offscreen;
mod validation;
#[cfg(feature = "wgpu")]
pub mod wgpu;

pub use self::offscreen::OffscreenSwapChain;
pub use self::validation::check_pipeline_program;
pub(crate) use self::validation::{check_render_pass, check_sampler, check_texture_limits, label_of};

use prism_core::renderer::ResourceError;
use std::sync::{Mutex, MutexGuard};

/// Locks a resource table, mapping poisoning to a backend error.
pub(crate) fn lock<'a, T>(
    mutex: &'a Mutex<T>,
    what: &str,
) -> Result<MutexGuard<'a, T>, ResourceError> {
    mutex
        .lock()
        .map_err(|e| ResourceError::BackendError(format!("Mutex poisoned ({what}): {e}")))
}
