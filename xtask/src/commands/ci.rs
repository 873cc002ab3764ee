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

use crate::helpers::*;
use anyhow::Result;
use std::time::Instant;

/// A cargo invocation run as one CI step.
pub struct CiTask {
    pub name: &'static str,
    pub title: &'static str,
    pub emoji: &'static str,
    pub color: &'static str,
    pub info: &'static str,
    pub args: &'static [&'static str],
}

pub const BUILD: CiTask = CiTask {
    name: "build",
    title: "Building All Crates",
    emoji: HAMMER,
    color: BLUE,
    info: "Compiling prism-core, prism-infra and the testbed in debug mode",
    args: &["build", "--workspace", "--exclude", "xtask"],
};

pub const TEST: CiTask = CiTask {
    name: "test",
    title: "Running All Tests",
    emoji: TEST_TUBE,
    color: GREEN,
    info: "Running unit tests, null-device integration tests and doc tests",
    args: &["test", "--workspace"],
};

pub const CHECK: CiTask = CiTask {
    name: "check",
    title: "Checking All Crates",
    emoji: MAGNIFIER,
    color: CYAN,
    info: "Checking every crate with and without the wgpu backend",
    args: &["check", "--workspace", "--all-targets"],
};

pub const FORMAT: CiTask = CiTask {
    name: "format",
    title: "Formatting Code",
    emoji: BRUSH,
    color: MAGENTA,
    info: "Formatting code using rustfmt with default settings",
    // `fmt` takes `--all`, not `--workspace`.
    args: &["fmt", "--all"],
};

pub const CLIPPY: CiTask = CiTask {
    name: "clippy",
    title: "Running Clippy",
    emoji: CLIPPY_ICON,
    color: YELLOW,
    info: "Running Clippy linter with warnings as errors",
    args: &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
};

/// Steps of `cargo xtask all`, in order.
pub const PIPELINE: [&CiTask; 5] = [&BUILD, &TEST, &CHECK, &FORMAT, &CLIPPY];

fn run_task(task: &CiTask) -> Result<()> {
    print_task_start(task.title, task.emoji, task.color);
    println!("{}💡 Info:{} {}", BOLD, RESET, task.info);
    execute_command("cargo", task.args, task.title)
}

pub fn build() -> Result<()> {
    run_task(&BUILD)
}

pub fn test() -> Result<()> {
    run_task(&TEST)
}

/// Checks the workspace, then `prism-infra` without its default wgpu feature.
pub fn check() -> Result<()> {
    run_task(&CHECK)?;
    execute_command(
        "cargo",
        &["check", "--package", "prism-infra", "--no-default-features"],
        "Null-only Check",
    )
}

pub fn format() -> Result<()> {
    run_task(&FORMAT)
}

pub fn clippy() -> Result<()> {
    run_task(&CLIPPY)
}

pub fn all() -> Result<()> {
    println!("{}", BANNER);
    println!("{}{}Starting full build pipeline...{}", BOLD, CYAN, RESET);
    let names: Vec<&str> = PIPELINE.iter().map(|task| task.name).collect();
    println!(
        "{}💡 Pipeline:{} This will run {} → testbed",
        BOLD,
        RESET,
        names.join(" → ")
    );

    let start_time = Instant::now();
    let total_tasks = PIPELINE.len() + 1;
    let mut failed: Vec<&str> = Vec::new();

    for (i, task) in PIPELINE.iter().enumerate() {
        println!(
            "\n{}{}[{}/{}] {}{}",
            BOLD,
            task.color,
            i + 1,
            total_tasks,
            task.title,
            RESET
        );
        let result = if task.name == CHECK.name {
            check()
        } else {
            run_task(task)
        };
        if result.is_err() {
            failed.push(task.name);
        }
    }

    println!(
        "\n{}{}[{}/{}] Null Testbed{}",
        BOLD, CYAN, total_tasks, total_tasks, RESET
    );
    if crate::commands::testbed::run(&[]).is_err() {
        failed.push("testbed");
    }

    let total_duration = start_time.elapsed();
    println!(
        "\n{}{}╔═══════════════════════════════════════╗{}",
        BOLD, CYAN, RESET
    );
    println!(
        "{}{}║            PIPELINE SUMMARY           ║{}",
        BOLD, CYAN, RESET
    );
    println!(
        "{}{}╚═══════════════════════════════════════╝{}",
        BOLD, CYAN, RESET
    );

    if failed.is_empty() {
        println!(
            "{}{} {} All {} tasks completed successfully! {}{}",
            BOLD, GREEN, CHECK_MARK, total_tasks, ROCKET, RESET
        );
    } else {
        println!(
            "{}{} ⚠ {}/{} tasks completed, failed: {}{}",
            BOLD,
            YELLOW,
            total_tasks - failed.len(),
            total_tasks,
            failed.join(", "),
            RESET
        );
    }
    println!(
        "{}{}Total time: {:.2}s{}",
        BOLD,
        BLUE,
        total_duration.as_secs_f64(),
        RESET
    );

    if !failed.is_empty() {
        anyhow::bail!("Pipeline failed: {}", failed.join(", "));
    }
    Ok(())
}
