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

//! Test suites of the testbed.

mod buffers;
mod independent;
mod rendering;
mod textures;

use std::time::Duration;

use prism_core::renderer::{
    CommandBuffer, CommandBufferDescriptor, CommandResult, RenderSystem,
};

use crate::cli::Options;
use crate::runner::{compare_texels, TestCase};

pub use self::independent::INDEPENDENT_TESTS;

const FENCE_TIMEOUT: Duration = Duration::from_secs(5);

/// A loaded module and the options of the run.
pub struct ModuleContext {
    pub system: Box<dyn RenderSystem>,
    pub options: Options,
}

impl ModuleContext {
    pub fn new(system: Box<dyn RenderSystem>, options: Options) -> Self {
        Self { system, options }
    }

    /// Side length of test textures.
    pub fn texture_size(&self) -> u32 {
        if self.options.fast {
            16
        } else {
            64
        }
    }

    /// Compares 8-bit texels with the tolerance of the run.
    pub fn compare(&self, expected: &[u8], actual: &[u8]) -> anyhow::Result<()> {
        let threshold = if self.options.pedantic { 0 } else { 1 };
        compare_texels(expected, actual, threshold, self.options.sanity_check)
    }

    /// Records a primary command buffer with `record`, submits it and waits for
    /// the queue to drain.
    pub fn submit<F>(&self, record: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut dyn CommandBuffer) -> CommandResult,
    {
        let mut commands = self
            .system
            .create_command_buffer(&CommandBufferDescriptor::default())?;
        commands.begin()?;
        record(commands.as_mut())?;
        commands.end()?;

        let queue = self.system.command_queue();
        queue.submit(commands.as_mut())?;
        let fence = self.system.create_fence()?;
        queue.submit_fence(fence)?;
        let signaled = queue.wait_fence(fence, FENCE_TIMEOUT)?;
        self.system.destroy_fence(fence)?;
        anyhow::ensure!(signaled, "fence timed out after {:?}", FENCE_TIMEOUT);
        Ok(())
    }
}

/// Tests run against every module.
pub fn module_tests() -> Vec<TestCase<ModuleContext>> {
    let mut tests = Vec::new();
    tests.extend(buffers::TESTS);
    tests.extend(textures::TESTS);
    tests.extend(rendering::TESTS);
    tests
}
