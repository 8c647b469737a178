use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::debug;
use vigil_archive::diffs::run_scope;
use vigil_core::VigilError;

/// A pull request on GitHub.
///
/// # Examples
///
/// ```
/// use vigil_review::context::PrRef;
///
/// let pr: PrRef = "octocat/hello-world#42".parse().unwrap();
/// assert_eq!(pr.owner, "octocat");
/// assert_eq!(pr.repo, "hello-world");
/// assert_eq!(pr.number, 42);
/// assert_eq!(pr.to_string(), "octocat/hello-world#42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PrRef {
    /// Build a reference from an `owner/repo` slug and a PR number.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Config`] if the slug has no `/` or an empty side.
    pub fn from_slug(slug: &str, number: u64) -> Result<Self, VigilError> {
        match slug.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => Ok(Self {
                owner: owner.to_string(),
                repo: repo.to_string(),
                number,
            }),
            _ => Err(VigilError::Config(format!(
                "invalid repository '{slug}', expected owner/repo"
            ))),
        }
    }
}

impl FromStr for PrRef {
    type Err = VigilError;

    fn from_str(pr_ref: &str) -> Result<Self, Self::Err> {
        let Some((slug, number_str)) = pr_ref.split_once('#') else {
            return Err(VigilError::Config(format!(
                "invalid PR reference '{pr_ref}', expected owner/repo#number"
            )));
        };
        let number: u64 = number_str
            .parse()
            .map_err(|_| VigilError::Config(format!("invalid PR number: {number_str}")))?;
        Self::from_slug(slug, number)
    }
}

impl fmt::Display for PrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// What the current run is reviewing.
#[derive(Debug, Clone, Default)]
pub struct ReviewContext {
    /// `None` for local and non-PR runs.
    pub pr: Option<PrRef>,
    /// Paths changed by the PR, relative to the repository root.
    pub modified_files: Vec<String>,
}

impl ReviewContext {
    /// Remote storage scope: the PR number, or `fallback` outside of PRs.
    pub fn scope(&self, fallback: &str) -> String {
        run_scope(self.pr.as_ref().map(|pr| pr.number), fallback)
    }
}

/// Detect the pull request of a GitHub Actions run.
///
/// Reads `GITHUB_REPOSITORY` plus the PR number from the event payload at
/// `GITHUB_EVENT_PATH`, falling back to a `refs/pull/N/merge` `GITHUB_REF`.
/// Returns `None` outside of pull-request workflows.
pub fn detect_pull_request(lookup: impl Fn(&str) -> Option<String>) -> Option<PrRef> {
    let slug = lookup("GITHUB_REPOSITORY")?;
    let number = lookup("GITHUB_EVENT_PATH")
        .and_then(|path| event_pr_number(Path::new(&path)))
        .or_else(|| lookup("GITHUB_REF").and_then(|r| ref_pr_number(&r)))?;
    let pr = PrRef::from_slug(&slug, number).ok()?;
    debug!(pr = %pr, "detected pull request from environment");
    Some(pr)
}

fn event_pr_number(path: &Path) -> Option<u64> {
    let content = std::fs::read_to_string(path).ok()?;
    let event: serde_json::Value = serde_json::from_str(&content).ok()?;
    event
        .pointer("/pull_request/number")
        .or_else(|| event.get("number"))
        .and_then(serde_json::Value::as_u64)
}

fn ref_pr_number(git_ref: &str) -> Option<u64> {
    git_ref
        .strip_prefix("refs/pull/")?
        .split('/')
        .next()?
        .parse()
        .ok()
}

/// Split a newline-separated path list, dropping blank lines.
pub fn parse_path_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Read a changed-files list, one path per line.
///
/// # Errors
///
/// Returns [`VigilError::FileNotFound`] or [`VigilError::Io`] if the file
/// cannot be read.
pub async fn read_changed_files(path: &Path) -> Result<Vec<String>, VigilError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            VigilError::FileNotFound(path.to_path_buf())
        } else {
            VigilError::Io(e)
        }
    })?;
    Ok(parse_path_list(&content))
}

/// Files changed between `base` and `HEAD`, per `git diff --name-only base...HEAD`.
///
/// # Errors
///
/// Returns [`VigilError::Git`] if git cannot be spawned or exits with an error.
pub async fn git_changed_files(root: &Path, base: &str) -> Result<Vec<String>, VigilError> {
    let output = tokio::process::Command::new("git")
        .arg("diff")
        .arg("--name-only")
        .arg(format!("{base}...HEAD"))
        .current_dir(root)
        .output()
        .await
        .map_err(|e| VigilError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(VigilError::Git(format!(
            "git diff against '{base}' failed: {}",
            stderr.trim()
        )));
    }
    Ok(parse_path_list(&String::from_utf8_lossy(&output.stdout)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parse_valid_pr_reference() {
        let pr: PrRef = "rust-lang/rust#12345".parse().unwrap();
        assert_eq!(pr.owner, "rust-lang");
        assert_eq!(pr.repo, "rust");
        assert_eq!(pr.number, 12345);
    }

    #[test]
    fn parse_pr_reference_missing_hash() {
        assert!("owner/repo".parse::<PrRef>().is_err());
    }

    #[test]
    fn parse_pr_reference_missing_slash() {
        assert!("repo#123".parse::<PrRef>().is_err());
    }

    #[test]
    fn parse_pr_reference_invalid_number() {
        assert!("owner/repo#abc".parse::<PrRef>().is_err());
    }

    #[test]
    fn detects_pr_from_event_payload() {
        let dir = tempfile::tempdir().unwrap();
        let event = dir.path().join("event.json");
        std::fs::write(&event, r#"{"action":"synchronize","pull_request":{"number":87}}"#)
            .unwrap();

        let pr = detect_pull_request(env(&[
            ("GITHUB_REPOSITORY", "acme/web"),
            ("GITHUB_EVENT_PATH", event.to_str().unwrap()),
        ]))
        .unwrap();
        assert_eq!(pr.to_string(), "acme/web#87");
    }

    #[test]
    fn falls_back_to_pull_ref() {
        let pr = detect_pull_request(env(&[
            ("GITHUB_REPOSITORY", "acme/web"),
            ("GITHUB_EVENT_PATH", "/nonexistent/event.json"),
            ("GITHUB_REF", "refs/pull/15/merge"),
        ]))
        .unwrap();
        assert_eq!(pr.number, 15);
    }

    #[test]
    fn push_workflows_have_no_pr() {
        assert!(detect_pull_request(env(&[
            ("GITHUB_REPOSITORY", "acme/web"),
            ("GITHUB_REF", "refs/heads/main"),
        ]))
        .is_none());
        assert!(detect_pull_request(env(&[])).is_none());
    }

    #[test]
    fn scope_uses_pr_number_or_fallback() {
        let mut ctx = ReviewContext::default();
        assert_eq!(ctx.scope("local"), "local");
        ctx.pr = Some("a/b#9".parse().unwrap());
        assert_eq!(ctx.scope("local"), "9");
    }

    #[test]
    fn path_list_skips_blank_lines() {
        let files = parse_path_list("src/a.ts\n\n  src/b.ts  \r\n");
        assert_eq!(files, vec!["src/a.ts", "src/b.ts"]);
    }

    #[tokio::test]
    async fn missing_changed_files_list_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_changed_files(&dir.path().join("changed.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, VigilError::FileNotFound(_)));
    }
}
