//! Istanbul `coverage-summary.json` to a single informational message.

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use vigil_core::{Annotation, TaskOutcome, VigilError};

use crate::read_json;

/// Covered/total counts for one coverage kind.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoverageMetric {
    pub covered: u64,
    pub total: u64,
    pub pct: Percent,
}

/// Percentage as written by the coverage tool.
///
/// Istanbul writes the string `"Unknown"` when `total` is zero, so both shapes
/// are accepted and rendered verbatim.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Percent {
    Number(f64),
    Text(String),
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Percent::Number(n) => write!(f, "{n}"),
            Percent::Text(s) => f.write_str(s),
        }
    }
}

/// Totals per coverage kind, in the order the artifact lists them.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageSummary {
    pub total: Vec<(String, CoverageMetric)>,
}

#[derive(Deserialize)]
struct RawSummary {
    total: serde_json::Map<String, serde_json::Value>,
}

impl CoverageSummary {
    /// Parse the JSON text of a coverage summary.
    ///
    /// Only the `total` entry is read; per-file entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Serialization`] if `total` is missing or one of
    /// its entries lacks `covered`, `total` or `pct`.
    pub fn from_json(content: &str) -> Result<Self, VigilError> {
        let raw: RawSummary = serde_json::from_str(content)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSummary) -> Result<Self, VigilError> {
        let total = raw
            .total
            .into_iter()
            .map(|(kind, value)| -> Result<_, VigilError> {
                let metric: CoverageMetric = serde_json::from_value(value)?;
                Ok((kind, metric))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { total })
    }

    /// One-line summary: `Code coverage: 80 / 100 lines (80%), ...`.
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_reports::coverage::CoverageSummary;
    ///
    /// let summary = CoverageSummary::from_json(
    ///     r#"{"total": {"lines": {"covered": 80, "total": 100, "pct": 80}}}"#,
    /// ).unwrap();
    /// assert_eq!(summary.message(), "Code coverage: 80 / 100 lines (80%)");
    /// ```
    pub fn message(&self) -> String {
        let parts: Vec<String> = self
            .total
            .iter()
            .map(|(kind, m)| format!("{} / {} {kind} ({}%)", m.covered, m.total, m.pct))
            .collect();
        format!("Code coverage: {}", parts.join(", "))
    }
}

/// Read the coverage summary and emit one message.
///
/// Coverage is informational, so a read or parse failure is only a warning.
pub async fn run(summary_path: &Path) -> TaskOutcome {
    let outcome = TaskOutcome::new("coverage");
    let summary = read_json::<RawSummary>(summary_path)
        .await
        .and_then(CoverageSummary::from_raw);
    match summary {
        Ok(summary) => outcome.with(Annotation::message(summary.message())),
        Err(e) => outcome.with(Annotation::warn(format!(
            "Could not read coverage file: \"{e}\""
        ))),
    }
}
