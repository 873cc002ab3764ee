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

//! Prism testbed: smoke tests for every renderer module.

mod cli;
mod runner;
mod suite;

use anyhow::Result;
use clap::Parser;
use prism_core::renderer::{ModuleRegistry, RenderError, RenderSystem, RenderSystemDescriptor};

use crate::cli::{Cli, ModuleSelection, Options, RENDERER_ENV};
use crate::runner::{summary, TestRunner};
use crate::suite::{module_tests, ModuleContext, INDEPENDENT_TESTS};

const SEPARATOR: &str = "=============================================";

/// Outcome of the tests of one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModuleOutcome {
    Passed,
    Failed,
    /// The module is registered but cannot run on this machine.
    Unavailable,
}

fn init_logging(verbose: bool) {
    use env_logger::{Builder, Env};

    let default_filter = if verbose { "debug" } else { "warn" };
    Builder::from_env(Env::default().default_filter_or(default_filter))
        .filter_module("wgpu_hal", log::LevelFilter::Error)
        .filter_module("naga", log::LevelFilter::Warn)
        .init();
}

fn print_renderer(system: &dyn RenderSystem) {
    let info = system.renderer_info();
    let caps = system.rendering_caps();
    println!("Renderer:         {}", info.renderer_name);
    println!("Device:           {}", info.device_name);
    println!("Vendor:           {}", info.vendor_name);
    println!("Shading language: {}", info.shading_language_name);
    println!("Texture formats:  {}", caps.texture_formats.len());
    println!("Features:         {:?}", caps.features);
    println!("Limits:           {:?}", caps.limits);
}

fn descriptor_for(name: &str, options: &Options) -> RenderSystemDescriptor {
    RenderSystemDescriptor {
        debug: options.debug,
        preferred_vendor: options.vendor,
        ..RenderSystemDescriptor::for_module(name)
    }
}

fn run_module(
    registry: &ModuleRegistry,
    selection: &ModuleSelection,
    options: &Options,
) -> ModuleOutcome {
    println!("{SEPARATOR}");
    println!("Run Testbed: {}", selection.name);
    println!("{SEPARATOR}");

    let system = match registry.load(&descriptor_for(&selection.name, options)) {
        Ok(system) => system,
        Err(err @ (RenderError::ModuleUnavailable(_) | RenderError::InitializationFailed(_)))
            if !selection.explicit =>
        {
            println!("Module '{}' is unavailable: {err}", selection.name);
            return ModuleOutcome::Unavailable;
        }
        Err(err) => {
            println!("Failed to load module '{}': {err}", selection.name);
            return ModuleOutcome::Failed;
        }
    };
    if options.verbose {
        print_renderer(system.as_ref());
    }

    let context = ModuleContext::new(system, options.clone());
    let tally = TestRunner::new(options).run(&module_tests(), &context);
    println!(
        "{} passed, {} skipped, {} failed",
        tally.passed, tally.skipped, tally.failed
    );
    if tally.is_success() {
        ModuleOutcome::Passed
    } else {
        ModuleOutcome::Failed
    }
}

fn run(cli: &Cli) -> Result<usize> {
    let options = cli.options();
    let registry = prism_infra::default_registry();
    log::debug!("Testbed: {:?}", registry);

    let mut failed = 0;
    println!("{SEPARATOR}");
    println!("Run renderer independent tests");
    println!("{SEPARATOR}");
    if !TestRunner::new(&options)
        .run(&INDEPENDENT_TESTS, &options)
        .is_success()
    {
        failed += 1;
    }

    let selection = cli.selection(&registry, std::env::var(RENDERER_ENV).ok());
    anyhow::ensure!(!selection.is_empty(), "no renderer modules are registered");
    for module in &selection {
        if run_module(&registry, module, &options) == ModuleOutcome::Failed {
            failed += 1;
        }
    }
    Ok(failed)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let failed = match run(&cli) {
        Ok(failed) => failed,
        Err(err) => {
            eprintln!("Testbed aborted: {err:#}");
            1
        }
    };
    println!("{}", summary(failed));
    std::process::exit(i32::try_from(failed).unwrap_or(i32::MAX));
}
