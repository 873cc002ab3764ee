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

// Build automation for the Prism workspace
// Run with: cargo xtask <command>

mod commands;
mod helpers;

use clap::{Parser, Subcommand};
use helpers::{print_custom_help, print_error};

#[derive(Parser)]
#[command(name = "xtask", disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Task>,
}

#[derive(Subcommand)]
enum Task {
    /// Build all crates in the workspace.
    Build,
    /// Run all tests in the workspace.
    Test,
    /// Run `cargo check` on all crates.
    Check,
    /// Format all code in the workspace.
    Format,
    /// Run clippy on all crates with warnings as errors.
    Clippy,
    /// Run the renderer testbed.
    Testbed {
        /// Arguments forwarded to `prism-testbed` (modules and options).
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run all CI tasks.
    All,
}

fn main() {
    let Some(task) = Cli::parse().command else {
        print_custom_help();
        return;
    };

    let result = match task {
        Task::Build => commands::ci::build(),
        Task::Test => commands::ci::test(),
        Task::Check => commands::ci::check(),
        Task::Format => commands::ci::format(),
        Task::Clippy => commands::ci::clippy(),
        Task::Testbed { args } => commands::testbed::run(&args),
        Task::All => commands::ci::all(),
    };

    if let Err(e) = result {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}
