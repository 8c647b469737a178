//! Jest `--json` test results to review annotations.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;
use vigil_core::{Annotation, TaskOutcome};

use crate::{read_json, relative_to};

/// Top level of the `jest --json` output file.
///
/// # Examples
///
/// ```
/// use vigil_reports::jest::JestReport;
///
/// let report: JestReport = serde_json::from_str(r#"{"success": false, "numFailedTests": 1}"#).unwrap();
/// assert!(!report.success);
/// assert!(report.test_results.is_empty());
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JestReport {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub num_failed_tests: u64,
    #[serde(default)]
    pub num_total_tests: u64,
    #[serde(default)]
    pub test_results: Vec<JestSuite>,
}

/// Results for one test file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JestSuite {
    /// Test file path, usually absolute.
    pub name: PathBuf,
    #[serde(default)]
    pub status: String,
    /// Suite-level failure output (e.g. a syntax error before any test ran).
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub assertion_results: Vec<JestAssertion>,
}

/// One test case within a suite.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JestAssertion {
    #[serde(default)]
    pub ancestor_titles: Vec<String>,
    pub title: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub status: String,
    #[serde(default)]
    pub failure_messages: Vec<String>,
    #[serde(default)]
    pub location: Option<JestLocation>,
}

/// Where a test case is declared, present when Jest runs with `--testLocationInResults`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct JestLocation {
    pub line: u32,
    #[serde(default)]
    pub column: Option<u32>,
}

impl JestAssertion {
    fn display_name(&self) -> String {
        match &self.full_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => {
                let mut parts = self.ancestor_titles.clone();
                parts.push(self.title.clone());
                parts.join(" > ")
            }
        }
    }
}

fn ansi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("static ANSI pattern is valid")
    })
}

/// Remove terminal color codes from Jest output.
///
/// # Examples
///
/// ```
/// use vigil_reports::jest::strip_ansi;
///
/// assert_eq!(strip_ansi("\u{1b}[31mExpected\u{1b}[39m"), "Expected");
/// ```
pub fn strip_ansi(text: &str) -> String {
    ansi_pattern().replace_all(text, "").into_owned()
}

fn failure_body(title: &str, messages: &[String]) -> String {
    let details: Vec<String> = messages.iter().map(|m| strip_ansi(m)).collect();
    let details = details.join("\n\n");
    if details.trim().is_empty() {
        format!("**{title}**")
    } else {
        format!("**{title}**\n\n```\n{}\n```", details.trim_end())
    }
}

/// Map a Jest report to annotations.
///
/// A passing run yields one message. Otherwise every failed assertion becomes
/// a fail anchored to its test file, and a failed suite without failed
/// assertions becomes one fail carrying the suite message.
pub fn annotate(report: &JestReport, root: &Path) -> Vec<Annotation> {
    if report.success {
        return vec![Annotation::message(":+1: Jest tests passed")];
    }

    let mut annotations = Vec::new();
    for suite in &report.test_results {
        let file = relative_to(root, &suite.name);
        let failed: Vec<&JestAssertion> = suite
            .assertion_results
            .iter()
            .filter(|a| a.status == "failed")
            .collect();

        if failed.is_empty() {
            if suite.status == "failed" {
                let body = failure_body(
                    &format!("Test suite `{file}` failed to run"),
                    std::slice::from_ref(&suite.message),
                );
                annotations.push(Annotation::fail(body).at(file.clone(), None));
            }
            continue;
        }

        for assertion in failed {
            let body = failure_body(&assertion.display_name(), &assertion.failure_messages);
            let line = assertion.location.map(|l| l.line);
            annotations.push(Annotation::fail(body).at(file.clone(), line));
        }
    }

    if annotations.is_empty() {
        // `success: false` can also come from coverage thresholds or open handles.
        annotations.push(Annotation::fail(format!(
            "Jest reported a failed run ({} of {} tests failed)",
            report.num_failed_tests, report.num_total_tests
        )));
    }
    annotations
}

/// Read the Jest report at `report_path` and annotate it.
pub async fn run(root: &Path, report_path: &Path) -> TaskOutcome {
    let mut outcome = TaskOutcome::new("tests");
    match read_json::<JestReport>(report_path).await {
        Ok(report) => {
            debug!(
                suites = report.test_results.len(),
                failed = report.num_failed_tests,
                "test results loaded"
            );
            outcome.annotations = annotate(&report, root);
        }
        Err(e) => outcome.push(Annotation::fail(format!("Could not read test results: {e}"))),
    }
    outcome
}
