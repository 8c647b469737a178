use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use vigil_archive::{ArchiveSettings, ScreenshotArchiver, StoreConnector};
use vigil_core::{Annotation, AnnotationKind, TaskOutcome, TaskStatus, VigilConfig};
use vigil_reports::{coverage, jest, lint, snapshots};

use crate::context::ReviewContext;

/// Result of one review run: every task's outcome, in a fixed order.
///
/// # Examples
///
/// ```
/// use vigil_core::{Annotation, TaskOutcome, TaskStatus};
/// use vigil_review::pipeline::ReviewReport;
///
/// let report = ReviewReport::new(
///     None,
///     vec![TaskOutcome::new("lint").with(Annotation::warn("unused import"))],
/// );
/// assert_eq!(report.status(), TaskStatus::Advisory);
/// assert!(!report.has_blocking());
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReport {
    /// `owner/repo#N` when the run reviewed a pull request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub outcomes: Vec<TaskOutcome>,
}

impl ReviewReport {
    pub fn new(pull_request: Option<String>, outcomes: Vec<TaskOutcome>) -> Self {
        Self {
            pull_request,
            generated_at: Utc::now(),
            outcomes,
        }
    }

    /// Every annotation, task by task.
    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.outcomes.iter().flat_map(|o| o.annotations.iter())
    }

    pub fn of_kind(&self, kind: AnnotationKind) -> impl Iterator<Item = &Annotation> {
        self.annotations().filter(move |a| a.kind == kind)
    }

    /// Worst status across all tasks.
    pub fn status(&self) -> TaskStatus {
        self.outcomes
            .iter()
            .map(TaskOutcome::status)
            .max()
            .unwrap_or(TaskStatus::Ok)
    }

    pub fn has_blocking(&self) -> bool {
        self.status() == TaskStatus::Blocking
    }
}

/// Runs every review task against a project checkout.
///
/// Tasks are independent and run concurrently; none of them can fail the
/// pipeline, they only contribute annotations.
pub struct ReviewPipeline<C> {
    root: PathBuf,
    config: VigilConfig,
    archiver: ScreenshotArchiver<C>,
}

impl<C: StoreConnector> ReviewPipeline<C> {
    /// Create a pipeline rooted at `root`.
    ///
    /// Artifact paths from `config` are resolved against `root`. The root is
    /// canonicalized when possible so that absolute paths inside reports can
    /// be made relative.
    pub fn new(root: &Path, config: VigilConfig, connector: C) -> Self {
        let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        let settings = ArchiveSettings {
            diff_dir: root.join(&config.screenshots.diff_dir),
            remediation_url: config.screenshots.remediation_url.clone(),
            credentials: config.credentials.clone(),
        };
        Self {
            archiver: ScreenshotArchiver::new(settings, connector),
            root,
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run all tasks for `context` and collect their outcomes.
    pub async fn run(&self, context: &ReviewContext) -> ReviewReport {
        let reports = &self.config.reports;
        let scope = context.scope(&self.config.screenshots.fallback_scope);
        debug!(
            root = %self.root.display(),
            scope = %scope,
            modified = context.modified_files.len(),
            "starting review"
        );

        let lint_path = self.root.join(&reports.lint);
        let coverage_path = self.root.join(&reports.coverage);
        let tests_path = self.root.join(&reports.tests);

        let (lint, coverage, tests, screenshots, snapshots) = tokio::join!(
            lint::run(&self.root, &lint_path),
            coverage::run(&coverage_path),
            jest::run(&self.root, &tests_path),
            self.archiver.run(&scope),
            async {
                snapshots::scan(
                    &context.modified_files,
                    &self.config.screenshots.snapshot_marker,
                )
            },
        );

        ReviewReport::new(
            context.pr.as_ref().map(ToString::to_string),
            vec![lint, coverage, tests, screenshots, snapshots],
        )
    }
}
