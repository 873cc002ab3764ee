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

/// Runs `prism-testbed` with `args`, defaulting to the null module.
pub fn run(args: &[String]) -> Result<()> {
    print_task_start("Running Testbed", PRISM, CYAN);
    println!(
        "{}💡 Info:{} Smoke-testing renderer modules (exit code = failed modules)",
        BOLD, RESET
    );
    let mut command_args = vec!["run", "--package", "prism-testbed", "--"];
    if args.is_empty() {
        command_args.push("null");
    } else {
        command_args.extend(args.iter().map(String::as_str));
    }
    execute_command("cargo", &command_args, "Testbed")
}
