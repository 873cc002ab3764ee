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

use anyhow::Result;
use std::process::Command;
use std::time::Instant;

use crate::commands::ci;

// ANSI color codes
pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const GREEN: &str = "\x1b[32m";
pub const RED: &str = "\x1b[31m";
pub const BLUE: &str = "\x1b[34m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";
pub const MAGENTA: &str = "\x1b[35m";

// Visual symbols
pub const CHECK_MARK: &str = "✓";
pub const CROSS: &str = "✗";
pub const ROCKET: &str = "🚀";
pub const HAMMER: &str = "🔨";
pub const TEST_TUBE: &str = "🧪";
pub const MAGNIFIER: &str = "🔍";
pub const BRUSH: &str = "🎨";
pub const CLIPPY_ICON: &str = "📎";
pub const PRISM: &str = "🔺";

pub const BANNER: &str = concat!(
    "\x1b[1m",
    "\x1b[36m", // BOLD, CYAN
    "╔═══════════════════════════════════════════════════════════╗\n",
    "║                   ",
    "🔺",
    " PRISM RENDERER ",
    "⚙",
    "                    ║\n",
    "║                   Build Automation Tool                   ║\n",
    "╚═══════════════════════════════════════════════════════════╝",
    "\x1b[0m" // RESET
);

fn print_help_line(emoji: &str, color: &str, name: &str, description: &str) {
    println!(
        "  {} {} {}{:<8}{} - {}",
        emoji, color, BOLD, name, RESET, description
    );
}

pub fn print_custom_help() {
    println!("{}", BANNER);
    println!(
        "\n{}{}Usage:{} cargo xtask <command>\n",
        BOLD, YELLOW, RESET
    );
    println!("{}Available commands:{}", BOLD, RESET);
    for task in ci::PIPELINE {
        print_help_line(task.emoji, task.color, task.name, task.info);
    }
    print_help_line(
        PRISM,
        CYAN,
        "testbed",
        "Run prism-testbed; arguments are forwarded (`testbed vk -t`, defaults to `null`)",
    );
    print_help_line(
        ROCKET,
        RED,
        "all",
        "Run every CI task, then the null testbed",
    );
}

pub fn print_task_start(task_name: &str, emoji: &str, color: &str) {
    println!(
        "\n{}{}━━━ {} {} {}━━━{}",
        BOLD, color, emoji, task_name, emoji, RESET
    );
}

pub fn print_success(message: &str) {
    println!("{}{} {} {}{}", BOLD, GREEN, CHECK_MARK, message, RESET);
}

pub fn print_error(message: &str) {
    println!("{}{} {} {}{}", BOLD, RED, CROSS, message, RESET);
}

pub fn print_command_info(cmd: &str, args: &[&str]) {
    println!(
        "{}{}📋 Command:{} {} {}",
        BOLD,
        CYAN,
        RESET,
        cmd,
        args.join(" ")
    );
}

/// Runs `cmd` with inherited stdio and reports its duration.
pub fn execute_command(cmd: &str, args: &[&str], task_name: &str) -> Result<()> {
    let start_time = Instant::now();
    print_command_info(cmd, args);

    let status = Command::new(cmd).args(args).status()?;
    let seconds = start_time.elapsed().as_secs_f64();

    if !status.success() {
        print_error(&format!("{} failed after {:.2}s", task_name, seconds));
        anyhow::bail!("{} failed with status: {}", task_name, status);
    }
    print_success(&format!("{} completed in {:.2}s", task_name, seconds));
    Ok(())
}
