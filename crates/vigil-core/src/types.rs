use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What an annotation does to the review.
///
/// # Examples
///
/// ```
/// use vigil_core::AnnotationKind;
///
/// let k: AnnotationKind = serde_json::from_str("\"fail\"").unwrap();
/// assert_eq!(k, AnnotationKind::Fail);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    /// Blocking: marks the check as failed.
    Fail,
    /// Advisory: surfaces a problem without failing the check.
    Warn,
    /// Informational message.
    Message,
    /// Raw markdown rendered as-is.
    Markdown,
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationKind::Fail => write!(f, "fail"),
            AnnotationKind::Warn => write!(f, "warn"),
            AnnotationKind::Message => write!(f, "message"),
            AnnotationKind::Markdown => write!(f, "markdown"),
        }
    }
}

/// A single annotation on the review, optionally anchored to a file and line.
///
/// # Examples
///
/// ```
/// use vigil_core::{Annotation, AnnotationKind};
///
/// let a = Annotation::fail("Unexpected console statement `no-console`")
///     .at("src/app.ts", Some(12));
/// assert_eq!(a.kind, AnnotationKind::Fail);
/// assert_eq!(a.file.as_deref(), Some("src/app.ts"));
/// assert_eq!(a.line, Some(12));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Effect on the review.
    pub kind: AnnotationKind,
    /// Text or markdown body.
    pub body: String,
    /// Path relative to the project root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// 1-based line in `file`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Annotation {
    fn new(kind: AnnotationKind, body: impl Into<String>) -> Self {
        Self {
            kind,
            body: body.into(),
            file: None,
            line: None,
        }
    }

    /// A blocking annotation.
    pub fn fail(body: impl Into<String>) -> Self {
        Self::new(AnnotationKind::Fail, body)
    }

    /// An advisory annotation.
    pub fn warn(body: impl Into<String>) -> Self {
        Self::new(AnnotationKind::Warn, body)
    }

    /// An informational message.
    pub fn message(body: impl Into<String>) -> Self {
        Self::new(AnnotationKind::Message, body)
    }

    /// A raw markdown block.
    pub fn markdown(body: impl Into<String>) -> Self {
        Self::new(AnnotationKind::Markdown, body)
    }

    /// Anchor the annotation to a file and optional line.
    pub fn at(mut self, file: impl Into<String>, line: Option<u32>) -> Self {
        self.file = Some(file.into());
        self.line = line;
        self
    }
}

/// Aggregate status of one subtask, derived from its annotations.
///
/// Ordered from least to most severe, so `max()` picks the worst.
///
/// # Examples
///
/// ```
/// use vigil_core::TaskStatus;
///
/// assert!(TaskStatus::Blocking > TaskStatus::Advisory);
/// assert_eq!(TaskStatus::Ok.max(TaskStatus::Advisory), TaskStatus::Advisory);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Nothing worse than informational output.
    Ok,
    /// At least one warning.
    Advisory,
    /// At least one failure.
    Blocking,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Ok => write!(f, "ok"),
            TaskStatus::Advisory => write!(f, "advisory"),
            TaskStatus::Blocking => write!(f, "blocking"),
        }
    }
}

impl From<AnnotationKind> for TaskStatus {
    fn from(kind: AnnotationKind) -> Self {
        match kind {
            AnnotationKind::Fail => TaskStatus::Blocking,
            AnnotationKind::Warn => TaskStatus::Advisory,
            AnnotationKind::Message | AnnotationKind::Markdown => TaskStatus::Ok,
        }
    }
}

/// The annotations produced by one subtask of a review run.
///
/// # Examples
///
/// ```
/// use vigil_core::{Annotation, TaskOutcome, TaskStatus};
///
/// let mut outcome = TaskOutcome::new("coverage");
/// assert_eq!(outcome.status(), TaskStatus::Ok);
///
/// outcome.push(Annotation::warn("Could not read coverage file"));
/// assert_eq!(outcome.status(), TaskStatus::Advisory);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcome {
    /// Short task name, e.g. `lint` or `screenshots`.
    pub task: String,
    /// Annotations in emission order.
    pub annotations: Vec<Annotation>,
}

impl TaskOutcome {
    /// An outcome with no annotations yet.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            annotations: Vec::new(),
        }
    }

    /// Append an annotation.
    pub fn push(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    /// Builder-style [`TaskOutcome::push`].
    pub fn with(mut self, annotation: Annotation) -> Self {
        self.push(annotation);
        self
    }

    /// Worst status among the annotations.
    pub fn status(&self) -> TaskStatus {
        self.annotations
            .iter()
            .map(|a| TaskStatus::from(a.kind))
            .max()
            .unwrap_or(TaskStatus::Ok)
    }

    /// Annotations of a given kind.
    pub fn of_kind(&self, kind: AnnotationKind) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter().filter(move |a| a.kind == kind)
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use vigil_core::OutputFormat;
///
/// let fmt: OutputFormat = "gha".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Github);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown, as posted in the PR comment.
    Markdown,
    /// SARIF v2.1.0.
    Sarif,
    /// GitHub Actions workflow commands.
    Github,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Sarif => write!(f, "sarif"),
            OutputFormat::Github => write!(f, "github"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "sarif" => Ok(OutputFormat::Sarif),
            "github" | "gha" => Ok(OutputFormat::Github),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "markdown".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert_eq!("sarif".parse::<OutputFormat>().unwrap(), OutputFormat::Sarif);
        assert_eq!(
            "github".parse::<OutputFormat>().unwrap(),
            OutputFormat::Github
        );
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn output_format_display() {
        assert_eq!(OutputFormat::Text.to_string(), "text");
        assert_eq!(OutputFormat::Github.to_string(), "github");
    }

    #[test]
    fn status_follows_worst_annotation() {
        let outcome = TaskOutcome::new("lint")
            .with(Annotation::message("fine"))
            .with(Annotation::warn("hmm"))
            .with(Annotation::fail("broken"))
            .with(Annotation::warn("hmm again"));
        assert_eq!(outcome.status(), TaskStatus::Blocking);
        assert_eq!(outcome.of_kind(AnnotationKind::Warn).count(), 2);
    }

    #[test]
    fn markdown_only_outcome_is_ok() {
        let outcome = TaskOutcome::new("screenshots").with(Annotation::markdown("<img>"));
        assert_eq!(outcome.status(), TaskStatus::Ok);
    }

    #[test]
    fn empty_outcome_is_ok() {
        assert_eq!(TaskOutcome::new("snapshots").status(), TaskStatus::Ok);
    }

    #[test]
    fn annotation_serializes_camel_case_and_skips_empty_location() {
        let a = Annotation::warn("careful");
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["kind"], "warn");
        assert!(json.get("file").is_none());

        let anchored = Annotation::fail("bad").at("src/a.ts", Some(3));
        let json = serde_json::to_value(&anchored).unwrap();
        assert_eq!(json["file"], "src/a.ts");
        assert_eq!(json["line"], 3);
    }
}
