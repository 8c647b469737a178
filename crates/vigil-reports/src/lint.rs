//! ESLint JSON report to review annotations.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;
use vigil_core::{Annotation, TaskOutcome};

use crate::{read_json, relative_to};

/// ESLint severity that fails the check.
pub const SEVERITY_ERROR: u8 = 2;
/// ESLint severity that only warns.
pub const SEVERITY_WARNING: u8 = 1;

/// Findings for one linted file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintFileReport {
    /// Path as written by the linter, usually absolute.
    pub file_path: PathBuf,
    #[serde(default)]
    pub messages: Vec<LintMessage>,
}

/// A single lint finding.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintMessage {
    pub message: String,
    /// `null` for parser errors.
    #[serde(default)]
    pub rule_id: Option<String>,
    #[serde(default)]
    pub severity: u8,
    #[serde(default)]
    pub line: Option<u32>,
}

impl LintMessage {
    fn text(&self) -> String {
        match &self.rule_id {
            Some(rule) => format!("{} `{rule}`", self.message),
            None => self.message.clone(),
        }
    }
}

/// Map lint findings to annotations.
///
/// Severity 2 becomes a fail, severity 1 a warn; anything else is dropped.
///
/// # Examples
///
/// ```
/// use std::path::{Path, PathBuf};
/// use vigil_core::AnnotationKind;
/// use vigil_reports::lint::{annotate, LintFileReport, LintMessage};
///
/// let report = vec![LintFileReport {
///     file_path: PathBuf::from("/repo/src/a.ts"),
///     messages: vec![LintMessage {
///         message: "Missing semicolon.".into(),
///         rule_id: Some("semi".into()),
///         severity: 2,
///         line: Some(4),
///     }],
/// }];
/// let annotations = annotate(&report, Path::new("/repo"));
/// assert_eq!(annotations.len(), 1);
/// assert_eq!(annotations[0].kind, AnnotationKind::Fail);
/// assert_eq!(annotations[0].body, "Missing semicolon. `semi`");
/// assert_eq!(annotations[0].file.as_deref(), Some("src/a.ts"));
/// ```
pub fn annotate(report: &[LintFileReport], root: &Path) -> Vec<Annotation> {
    let mut annotations = Vec::new();
    for file in report {
        let rel_path = relative_to(root, &file.file_path);
        for message in &file.messages {
            let annotation = match message.severity {
                SEVERITY_ERROR => Annotation::fail(message.text()),
                SEVERITY_WARNING => Annotation::warn(message.text()),
                _ => continue,
            };
            annotations.push(annotation.at(rel_path.clone(), message.line));
        }
    }
    annotations
}

/// Read the lint report at `report_path` and annotate it.
///
/// A missing or unparsable report is itself a failure: absent lint data means
/// the lint step did not run.
pub async fn run(root: &Path, report_path: &Path) -> TaskOutcome {
    let mut outcome = TaskOutcome::new("lint");
    match read_json::<Vec<LintFileReport>>(report_path).await {
        Ok(report) => {
            debug!(files = report.len(), "lint report loaded");
            outcome.annotations = annotate(&report, root);
        }
        Err(e) => outcome.push(Annotation::fail(format!("Could not read lint results: {e}"))),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{AnnotationKind, TaskStatus};

    const REPORT: &str = r#"[
      {
        "filePath": "/repo/src/Button.tsx",
        "messages": [
          { "message": "Unexpected any.", "ruleId": "@typescript-eslint/no-explicit-any", "severity": 2, "line": 10 },
          { "message": "Unused variable 'x'.", "ruleId": "no-unused-vars", "severity": 1, "line": 3 },
          { "message": "Off rule.", "ruleId": "quotes", "severity": 0, "line": 1 }
        ]
      },
      {
        "filePath": "/repo/src/clean.ts",
        "messages": []
      },
      {
        "filePath": "/repo/src/broken.ts",
        "messages": [
          { "message": "Parsing error: Unexpected token", "ruleId": null, "severity": 2, "line": 7 }
        ]
      }
    ]"#;

    fn parse() -> Vec<LintFileReport> {
        serde_json::from_str(REPORT).unwrap()
    }

    #[test]
    fn one_annotation_per_error_and_warning() {
        let annotations = annotate(&parse(), Path::new("/repo"));
        assert_eq!(annotations.len(), 3);

        let fails: Vec<_> = annotations
            .iter()
            .filter(|a| a.kind == AnnotationKind::Fail)
            .collect();
        assert_eq!(fails.len(), 2);
        assert_eq!(fails[0].file.as_deref(), Some("src/Button.tsx"));
        assert_eq!(fails[0].line, Some(10));
        assert_eq!(
            fails[0].body,
            "Unexpected any. `@typescript-eslint/no-explicit-any`"
        );

        let warns: Vec<_> = annotations
            .iter()
            .filter(|a| a.kind == AnnotationKind::Warn)
            .collect();
        assert_eq!(warns.len(), 1);
        assert_eq!(warns[0].line, Some(3));
        assert_eq!(warns[0].body, "Unused variable 'x'. `no-unused-vars`");
    }

    #[test]
    fn other_severities_are_ignored() {
        let annotations = annotate(&parse(), Path::new("/repo"));
        assert!(annotations.iter().all(|a| !a.body.contains("Off rule")));
    }

    #[test]
    fn null_rule_id_omits_suffix() {
        let annotations = annotate(&parse(), Path::new("/repo"));
        let parse_error = annotations
            .iter()
            .find(|a| a.file.as_deref() == Some("src/broken.ts"))
            .unwrap();
        assert_eq!(parse_error.body, "Parsing error: Unexpected token");
    }

    #[tokio::test]
    async fn run_reads_report_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let report = format!(
            r#"[{{"filePath": "{}", "messages": [{{"message": "m", "ruleId": "r", "severity": 1, "line": 2}}]}}]"#,
            dir.path().join("lib").join("x.js").display()
        );
        let path = dir.path().join("lint-results.json");
        std::fs::write(&path, report).unwrap();

        let outcome = run(dir.path(), &path).await;
        assert_eq!(outcome.task, "lint");
        assert_eq!(outcome.status(), TaskStatus::Advisory);
        assert_eq!(outcome.annotations[0].file.as_deref(), Some("lib/x.js"));
    }

    #[tokio::test]
    async fn missing_report_is_a_single_failure() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run(dir.path(), &dir.path().join("lint-results.json")).await;
        assert_eq!(outcome.annotations.len(), 1);
        assert_eq!(outcome.status(), TaskStatus::Blocking);
        assert!(outcome.annotations[0]
            .body
            .starts_with("Could not read lint results: "));
        assert!(outcome.annotations[0].file.is_none());
    }

    #[tokio::test]
    async fn corrupt_report_is_a_single_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lint-results.json");
        std::fs::write(&path, r#"{"not": "an array"}"#).unwrap();
        let outcome = run(dir.path(), &path).await;
        assert_eq!(outcome.annotations.len(), 1);
        assert_eq!(outcome.annotations[0].kind, AnnotationKind::Fail);
    }
}
