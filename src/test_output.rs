//! Test runner console summaries
//!
//! `dotnet test` prints a summary line such as
//! `Passed!  - Failed: 0, Passed: 8, Skipped: 0, Total: 8`. We scan for it
//! rather than parsing TRX output.

use serde::Serialize;

/// Phrases that mark a summary line.
const SUMMARY_MARKERS: &[&str] = &[
    "Passed!",
    "Failed!",
    "Test Run Successful",
    "Test Run Failed",
];

/// Pass/fail counts scraped from a test run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestRunResult {
    pub passed: u32,
    pub failed: u32,
    /// Whether any summary marker was seen. When false the counts are
    /// placeholders and `raw_output` is what the operator should look at.
    pub recognized: bool,
    #[serde(skip)]
    pub raw_output: String,
}

impl TestRunResult {
    pub fn parse(output: &str) -> Self {
        let mut result = TestRunResult {
            raw_output: output.to_string(),
            ..Default::default()
        };

        for line in output.lines() {
            if !SUMMARY_MARKERS.iter().any(|m| line.contains(m)) {
                continue;
            }
            result.recognized = true;

            let tokens: Vec<&str> = line.split_whitespace().collect();
            for (i, token) in tokens.iter().enumerate() {
                let Some(next) = tokens.get(i + 1) else {
                    continue;
                };
                match keyword(token).as_str() {
                    "passed" => {
                        if let Some(n) = parse_count(next) {
                            result.passed = n;
                        }
                    }
                    "failed" => {
                        if let Some(n) = parse_count(next) {
                            result.failed = n;
                        }
                    }
                    _ => {}
                }
            }
        }

        result
    }

    pub fn total(&self) -> u32 {
        self.passed.saturating_add(self.failed)
    }
}

/// `Passed:` / `FAILED,` / `passed` all normalise to the bare lowercase word.
fn keyword(token: &str) -> String {
    token
        .trim_end_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

fn parse_count(token: &str) -> Option<u32> {
    token.trim_end_matches(',').parse().ok()
}
