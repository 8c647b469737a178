//! Human, markdown and GitHub Actions renderings of a [`ReviewReport`].

use std::fmt;

use vigil_core::{Annotation, AnnotationKind};

use crate::pipeline::ReviewReport;

fn location(annotation: &Annotation) -> Option<String> {
    let file = annotation.file.as_deref()?;
    Some(match annotation.line {
        Some(line) => format!("{file}:{line}"),
        None => file.to_string(),
    })
}

fn label(kind: AnnotationKind) -> &'static str {
    match kind {
        AnnotationKind::Fail => "FAIL",
        AnnotationKind::Warn => "WARN",
        AnnotationKind::Message => "INFO",
        AnnotationKind::Markdown => "NOTE",
    }
}

fn counts(report: &ReviewReport) -> String {
    format!(
        "{} fail(s), {} warning(s), {} message(s)",
        report.of_kind(AnnotationKind::Fail).count(),
        report.of_kind(AnnotationKind::Warn).count(),
        report.of_kind(AnnotationKind::Message).count(),
    )
}

impl fmt::Display for ReviewReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CI Report")?;
        writeln!(f, "=========")?;
        if let Some(pr) = &self.pull_request {
            writeln!(f, "Pull request: {pr}")?;
        }
        writeln!(f, "Status: {} | {}\n", self.status(), counts(self))?;

        for outcome in &self.outcomes {
            writeln!(f, "{} ({})", outcome.task, outcome.status())?;
            if outcome.annotations.is_empty() {
                writeln!(f, "  nothing to report")?;
            }
            for a in &outcome.annotations {
                match location(a) {
                    Some(loc) => writeln!(f, "  [{}] {loc}", label(a.kind))?,
                    None => writeln!(f, "  [{}]", label(a.kind))?,
                }
                for line in a.body.lines() {
                    writeln!(f, "    {line}")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Escape a single line for a markdown table cell.
fn cell(text: &str) -> String {
    text.trim().replace('|', "\\|")
}

/// Tables only hold one line, so longer bodies keep their first line in the
/// row and are written out in full beneath the table.
fn push_table(out: &mut String, icon: &str, heading: &str, items: &[&Annotation]) {
    if items.is_empty() {
        return;
    }
    let mut details = Vec::new();
    out.push_str(&format!("| | {heading} |\n|---|---|\n"));
    for a in items {
        let body = a.body.trim();
        let headline = body.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        let mut text = cell(headline);
        if headline.len() < body.len() {
            text.push_str(" (details below)");
            details.push(*a);
        }
        if let Some(loc) = location(a) {
            text.push_str(&format!(" (`{}`)", cell(&loc)));
        }
        out.push_str(&format!("| {icon} | {text} |\n"));
    }
    out.push('\n');

    for a in details {
        let summary = match location(a) {
            Some(loc) => format!("{icon} <code>{loc}</code>"),
            None => icon.to_string(),
        };
        out.push_str(&format!(
            "<details><summary>{summary}</summary>\n\n{}\n\n</details>\n\n",
            a.body.trim()
        ));
    }
}

impl ReviewReport {
    /// Render the report as the body of a sticky PR comment.
    ///
    /// `marker` is emitted first, as-is, so the comment can be found again.
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_core::{Annotation, TaskOutcome};
    /// use vigil_review::pipeline::ReviewReport;
    ///
    /// let report = ReviewReport::new(
    ///     None,
    ///     vec![TaskOutcome::new("lint").with(Annotation::fail("Missing semicolon."))],
    /// );
    /// let md = report.to_markdown("CI Report", "<!-- vigil-report -->");
    /// assert!(md.starts_with("<!-- vigil-report -->"));
    /// assert!(md.contains("| | Fails |"));
    /// ```
    pub fn to_markdown(&self, title: &str, marker: &str) -> String {
        let mut out = String::new();
        if !marker.is_empty() {
            out.push_str(marker);
            out.push('\n');
        }
        out.push_str(&format!("## {title}\n\n"));

        let fails: Vec<_> = self.of_kind(AnnotationKind::Fail).collect();
        let warnings: Vec<_> = self.of_kind(AnnotationKind::Warn).collect();
        let messages: Vec<_> = self.of_kind(AnnotationKind::Message).collect();
        let blocks: Vec<_> = self.of_kind(AnnotationKind::Markdown).collect();

        if fails.is_empty() && warnings.is_empty() && messages.is_empty() && blocks.is_empty() {
            out.push_str(":white_check_mark: All checks passed.\n\n");
        }

        push_table(&mut out, ":no_entry_sign:", "Fails", &fails);
        push_table(&mut out, ":warning:", "Warnings", &warnings);
        push_table(&mut out, ":book:", "Messages", &messages);

        for block in blocks {
            out.push_str(block.body.trim());
            out.push_str("\n\n");
        }

        out.push_str(&format!(
            "<sub>{} | generated {}</sub>\n",
            counts(self),
            self.generated_at.format("%Y-%m-%d %H:%M UTC")
        ));
        out
    }

    /// Render the report as GitHub Actions workflow commands, one per line.
    ///
    /// Markdown blocks have no workflow-command equivalent and are skipped.
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_core::{Annotation, TaskOutcome};
    /// use vigil_review::pipeline::ReviewReport;
    ///
    /// let report = ReviewReport::new(
    ///     None,
    ///     vec![TaskOutcome::new("lint").with(Annotation::fail("bad").at("src/a.js", Some(3)))],
    /// );
    /// assert_eq!(report.to_github_commands(), vec!["::error file=src/a.js,line=3::bad"]);
    /// ```
    pub fn to_github_commands(&self) -> Vec<String> {
        self.annotations()
            .filter_map(|a| {
                let level = match a.kind {
                    AnnotationKind::Fail => "error",
                    AnnotationKind::Warn => "warning",
                    AnnotationKind::Message => "notice",
                    AnnotationKind::Markdown => return None,
                };

                let mut meta = String::new();
                if let Some(file) = &a.file {
                    meta.push_str(&format!("file={}", escape_property(file)));
                    if let Some(line) = a.line {
                        meta.push_str(&format!(",line={line}"));
                    }
                }

                let message = escape_data(&a.body);
                Some(if meta.is_empty() {
                    format!("::{level}::{message}")
                } else {
                    format!("::{level} {meta}::{message}")
                })
            })
            .collect()
    }
}

fn escape_data(text: &str) -> String {
    text.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn escape_property(text: &str) -> String {
    escape_data(text).replace(':', "%3A").replace(',', "%2C")
}

#[cfg(test)]
mod tests {
    use vigil_core::TaskOutcome;

    use super::*;

    fn sample() -> ReviewReport {
        ReviewReport::new(
            Some("acme/web#4".into()),
            vec![
                TaskOutcome::new("lint")
                    .with(Annotation::fail("Missing semicolon. `semi`").at("src/app.js", Some(3)))
                    .with(Annotation::warn("a | b").at("src/util.js", None)),
                TaskOutcome::new("coverage")
                    .with(Annotation::message("Code coverage: 80 / 100 lines (80%)")),
                TaskOutcome::new("screenshots").with(Annotation::markdown(
                    "<details><summary>Screenshot <code>a</code> failed</summary></details>",
                )),
                TaskOutcome::new("snapshots"),
            ],
        )
    }

    #[test]
    fn text_lists_tasks_and_locations() {
        let text = sample().to_string();
        assert!(text.contains("Pull request: acme/web#4"));
        assert!(text.contains("lint (blocking)"));
        assert!(text.contains("[FAIL] src/app.js:3"));
        assert!(text.contains("[WARN] src/util.js"));
        assert!(text.contains("snapshots (ok)\n  nothing to report"));
    }

    #[test]
    fn markdown_sections_in_order() {
        let md = sample().to_markdown("CI Report", "<!-- vigil-report -->");
        let fails = md.find("| | Fails |").unwrap();
        let warnings = md.find("| | Warnings |").unwrap();
        let messages = md.find("| | Messages |").unwrap();
        let block = md.find("<details>").unwrap();
        assert!(fails < warnings && warnings < messages && messages < block);

        assert!(md.contains("| :no_entry_sign: | Missing semicolon. `semi` (`src/app.js:3`) |"));
        assert!(md.contains("a \\| b"));
        assert!(md.contains("1 fail(s), 1 warning(s), 1 message(s)"));
    }

    #[test]
    fn markdown_for_clean_run() {
        let report = ReviewReport::new(None, vec![TaskOutcome::new("lint")]);
        let md = report.to_markdown("CI Report", "");
        assert!(md.starts_with("## CI Report"));
        assert!(md.contains("All checks passed."));
        assert!(!md.contains("| |"));
    }

    #[test]
    fn jest_failure_keeps_its_code_fence() {
        let body = "**math > adds**\n\n```\nExpected: 2\nReceived: 3\n```";
        let report = ReviewReport::new(
            None,
            vec![TaskOutcome::new("tests")
                .with(Annotation::fail(body).at("src/math.test.ts", Some(12)))],
        );
        let md = report.to_markdown("CI Report", "");

        assert!(md.contains(
            "| :no_entry_sign: | **math > adds** (details below) (`src/math.test.ts:12`) |\n"
        ));
        assert!(md.contains(&format!(
            "<details><summary>:no_entry_sign: <code>src/math.test.ts:12</code></summary>\n\n{body}\n\n</details>"
        )));
        assert!(!md.contains("<br>"));

        let table_end = md.find("|\n\n").unwrap();
        assert!(md.find("```").unwrap() > table_end);
    }

    #[test]
    fn single_line_bodies_stay_in_the_table() {
        let md = sample().to_markdown("CI Report", "");
        assert!(!md.contains("details below"));
        assert_eq!(md.matches("<details>").count(), 1);
    }

    #[test]
    fn github_commands_skip_markdown() {
        let commands = sample().to_github_commands();
        assert_eq!(
            commands,
            vec![
                "::error file=src/app.js,line=3::Missing semicolon. `semi`",
                "::warning file=src/util.js::a | b",
                "::notice::Code coverage: 80 / 100 lines (80%)",
            ]
        );
    }

    #[test]
    fn github_commands_escape_messages_and_properties() {
        let report = ReviewReport::new(
            None,
            vec![TaskOutcome::new("tests")
                .with(Annotation::fail("100% broken\nsee log").at("a,b:c.js", Some(1)))],
        );
        assert_eq!(
            report.to_github_commands(),
            vec!["::error file=a%2Cb%3Ac.js,line=1::100%25 broken%0Asee log"]
        );
    }
}
