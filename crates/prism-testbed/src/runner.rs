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

//! Test execution and result reporting.

use std::time::Instant;

use crate::cli::Options;

/// Result of a test that ran to completion. Failures are reported as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestResult {
    Passed,
    /// The module lacks a feature the test needs.
    Skipped(&'static str),
}

/// Signature of a test against a context `C`.
pub type TestFn<C> = fn(&C) -> anyhow::Result<TestResult>;

/// A named test.
pub struct TestCase<C> {
    pub name: &'static str,
    pub run: TestFn<C>,
}

/// Counts of a test run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestTally {
    pub passed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl TestTally {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Runs test cases and prints one line per test.
pub struct TestRunner<'a> {
    options: &'a Options,
}

impl<'a> TestRunner<'a> {
    pub fn new(options: &'a Options) -> Self {
        Self { options }
    }

    /// Runs `cases` against `context`.
    ///
    /// Stops at the first failure unless the run is greedy.
    pub fn run<C>(&self, cases: &[TestCase<C>], context: &C) -> TestTally {
        let mut tally = TestTally::default();
        for case in cases {
            let start = Instant::now();
            let result = (case.run)(context);
            let elapsed = start.elapsed();
            let timing = if self.options.timing {
                format!(" ({:.3} ms)", elapsed.as_secs_f64() * 1000.0)
            } else {
                String::new()
            };

            match result {
                Ok(TestResult::Passed) => {
                    tally.passed += 1;
                    println!("Test {}: Ok{}", case.name, timing);
                }
                Ok(TestResult::Skipped(reason)) => {
                    tally.skipped += 1;
                    println!("Test {}: Skipped ({}){}", case.name, reason, timing);
                }
                Err(e) => {
                    tally.failed += 1;
                    println!("Test {}: FAILED{}", case.name, timing);
                    println!("  {e:#}");
                    log::debug!("TestRunner: '{}' failed: {:?}", case.name, e);
                    if !self.options.greedy {
                        break;
                    }
                }
            }
        }
        tally
    }
}

/// The closing line of a run.
pub fn summary(failed_modules: usize) -> String {
    match failed_modules {
        0 => " ==> ALL MODULES PASSED".to_string(),
        1 => " ==> 1 MODULE FAILED".to_string(),
        n => format!(" ==> {n} MODULES FAILED"),
    }
}

/// Compares 8-bit texels, allowing `threshold` difference per channel.
///
/// The error names the first mismatch, or every mismatch when `report_all` is set.
pub fn compare_texels(
    expected: &[u8],
    actual: &[u8],
    threshold: u8,
    report_all: bool,
) -> anyhow::Result<()> {
    anyhow::ensure!(
        expected.len() == actual.len(),
        "expected {} bytes but got {}",
        expected.len(),
        actual.len()
    );
    let mismatches: Vec<String> = expected
        .iter()
        .zip(actual)
        .enumerate()
        .filter(|(_, (e, a))| e.abs_diff(**a) > threshold)
        .map(|(i, (e, a))| format!("byte {i}: expected {e}, got {a}"))
        .collect();
    match mismatches.as_slice() {
        [] => Ok(()),
        [first, ..] if !report_all => anyhow::bail!(
            "{} mismatching bytes, first at {}",
            mismatches.len(),
            first
        ),
        all => anyhow::bail!("{} mismatching bytes: {}", all.len(), all.join("; ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(_: &()) -> anyhow::Result<TestResult> {
        Ok(TestResult::Passed)
    }

    fn skip(_: &()) -> anyhow::Result<TestResult> {
        Ok(TestResult::Skipped("no feature"))
    }

    fn fail(_: &()) -> anyhow::Result<TestResult> {
        anyhow::bail!("broken")
    }

    const CASES: [TestCase<()>; 4] = [
        TestCase { name: "A", run: pass },
        TestCase { name: "B", run: fail },
        TestCase { name: "C", run: skip },
        TestCase { name: "D", run: fail },
    ];

    #[test]
    fn test_summary_lines() {
        assert_eq!(summary(0), " ==> ALL MODULES PASSED");
        assert_eq!(summary(1), " ==> 1 MODULE FAILED");
        assert_eq!(summary(3), " ==> 3 MODULES FAILED");
    }

    #[test]
    fn test_runner_stops_at_first_failure_unless_greedy() {
        let options = Options::default();
        let tally = TestRunner::new(&options).run(&CASES, &());
        assert_eq!(
            tally,
            TestTally {
                passed: 1,
                skipped: 0,
                failed: 1
            }
        );

        let greedy = Options {
            greedy: true,
            ..Default::default()
        };
        let tally = TestRunner::new(&greedy).run(&CASES, &());
        assert_eq!(
            tally,
            TestTally {
                passed: 1,
                skipped: 1,
                failed: 2
            }
        );
        assert!(!tally.is_success());
    }

    #[test]
    fn test_compare_texels_threshold() {
        assert!(compare_texels(&[10, 20], &[11, 19], 1, false).is_ok());
        let error = compare_texels(&[10, 20], &[12, 20], 1, false).unwrap_err();
        assert!(error.to_string().contains("byte 0"));
        let error = compare_texels(&[0, 0], &[5, 5], 0, true).unwrap_err();
        assert!(error.to_string().contains("byte 1"));
        assert!(compare_texels(&[0], &[0, 0], 0, false).is_err());
    }
}
