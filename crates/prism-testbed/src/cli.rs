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

//! Command-line options of the testbed.

use clap::Parser;
use prism_core::renderer::{ModuleRegistry, Vendor};

/// Environment variable that replaces the module list.
pub const RENDERER_ENV: &str = "PRISM_RENDERER";

/// Runs renderer-independent tests, then the smoke tests of each renderer module.
#[derive(Debug, Parser)]
#[command(name = "prism-testbed", version, about)]
pub struct Cli {
    /// Modules to test (`null`, `vk`, `mt`, `d3d12`, `gl`, `gl330`, ...).
    /// Every registered module is tested when none is given.
    #[arg(value_name = "MODULES")]
    pub modules: Vec<String>,

    /// Enable backend validation.
    #[arg(short, long)]
    pub debug: bool,

    /// Use small resources and skip slow tests.
    #[arg(short, long)]
    pub fast: bool,

    /// Keep running the tests of a module after one failed.
    #[arg(short, long)]
    pub greedy: bool,

    /// Compare texels without tolerance.
    #[arg(short, long)]
    pub pedantic: bool,

    /// Report every mismatch of a failed comparison.
    #[arg(short, long = "sanity-check")]
    pub sanity_check: bool,

    /// Print the duration of each test.
    #[arg(short, long)]
    pub timing: bool,

    /// Print renderer details and enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Prefer an AMD adapter.
    #[arg(long, conflicts_with_all = ["intel", "nvidia"])]
    pub amd: bool,

    /// Prefer an Intel adapter.
    #[arg(long, conflicts_with = "nvidia")]
    pub intel: bool,

    /// Prefer an NVIDIA adapter.
    #[arg(long)]
    pub nvidia: bool,
}

/// Settings shared by every test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    pub debug: bool,
    pub fast: bool,
    pub greedy: bool,
    pub pedantic: bool,
    pub sanity_check: bool,
    pub timing: bool,
    pub verbose: bool,
    pub vendor: Option<Vendor>,
}

impl Cli {
    /// Test settings derived from the flags.
    pub fn options(&self) -> Options {
        let vendor = if self.amd {
            Some(Vendor::Amd)
        } else if self.intel {
            Some(Vendor::Intel)
        } else if self.nvidia {
            Some(Vendor::Nvidia)
        } else {
            None
        };
        Options {
            debug: self.debug,
            fast: self.fast,
            greedy: self.greedy,
            pedantic: self.pedantic,
            sanity_check: self.sanity_check,
            timing: self.timing,
            verbose: self.verbose,
            vendor,
        }
    }

    /// The modules to test.
    ///
    /// `override_module` (the value of [`RENDERER_ENV`]) wins over the command
    /// line. Modules found in the registry rather than named explicitly are
    /// marked as implicit.
    pub fn selection(
        &self,
        registry: &ModuleRegistry,
        override_module: Option<String>,
    ) -> Vec<ModuleSelection> {
        if let Some(name) = override_module.filter(|name| !name.trim().is_empty()) {
            return vec![ModuleSelection::explicit(name)];
        }
        if !self.modules.is_empty() {
            return self
                .modules
                .iter()
                .cloned()
                .map(ModuleSelection::explicit)
                .collect();
        }
        registry
            .find_modules()
            .into_iter()
            .map(|module| ModuleSelection {
                name: module.name().to_string(),
                explicit: false,
            })
            .collect()
    }
}

/// A module to test and how it was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSelection {
    pub name: String,
    /// Named by the user; a load failure then counts as a failed module.
    pub explicit: bool,
}

impl ModuleSelection {
    fn explicit(name: String) -> Self {
        Self {
            name,
            explicit: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::renderer::RendererModule;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("prism-testbed").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_short_and_long_flags() {
        let cli = parse(&["vk", "gl330", "-f", "-g", "--pedantic", "-s", "-t"]);
        assert_eq!(cli.modules, vec!["vk", "gl330"]);
        let options = cli.options();
        assert!(options.fast && options.greedy && options.pedantic);
        assert!(options.sanity_check && options.timing);
        assert!(!options.debug && !options.verbose);
        assert_eq!(options.vendor, None);
    }

    #[test]
    fn test_vendor_flags_are_exclusive() {
        assert_eq!(parse(&["--nvidia"]).options().vendor, Some(Vendor::Nvidia));
        assert_eq!(parse(&["--amd"]).options().vendor, Some(Vendor::Amd));
        assert!(Cli::try_parse_from(["prism-testbed", "--amd", "--intel"]).is_err());
    }

    #[test]
    fn test_selection_prefers_environment_then_arguments() {
        let mut registry = ModuleRegistry::new();
        prism_infra::register_modules(&mut registry);

        let cli = parse(&["null"]);
        assert_eq!(
            cli.selection(&registry, Some("gl".to_string())),
            vec![ModuleSelection::explicit("gl".to_string())]
        );
        assert_eq!(
            cli.selection(&registry, None),
            vec![ModuleSelection::explicit("null".to_string())]
        );

        let all = parse(&[]).selection(&registry, Some("  ".to_string()));
        assert!(all.iter().all(|selection| !selection.explicit));
        assert!(all
            .iter()
            .any(|selection| selection.name == RendererModule::Null.name()));
    }
}
