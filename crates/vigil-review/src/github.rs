use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vigil_core::VigilError;

use crate::context::PrRef;

/// Largest page size the REST API accepts.
const PER_PAGE: usize = 100;

/// GitHub client for reading PR files and maintaining the report comment.
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
}

#[derive(Serialize)]
struct Page {
    per_page: usize,
    page: u32,
}

#[derive(Deserialize)]
struct PullFile {
    filename: String,
}

/// The subset of an issue comment needed to find the sticky comment.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
}

/// What [`GitHubClient::upsert_comment`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentAction {
    Created(u64),
    Updated(u64),
}

impl GitHubClient {
    /// Create a client from an explicit token or the `GITHUB_TOKEN` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Config`] if no token is available, or
    /// [`VigilError::GitHub`] if the client cannot be built.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vigil_review::github::GitHubClient;
    ///
    /// let client = GitHubClient::new(Some("ghp_xxxx")).unwrap();
    /// ```
    pub fn new(token: Option<&str>) -> Result<Self, VigilError> {
        let token = match token {
            Some(t) => t.to_string(),
            None => std::env::var("GITHUB_TOKEN").map_err(|_| {
                VigilError::Config(
                    "GITHUB_TOKEN not set. Pass --github-token or set GITHUB_TOKEN env var".into(),
                )
            })?,
        };

        let octocrab = octocrab::Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(|e| VigilError::GitHub(format!("failed to create GitHub client: {e}")))?;

        Ok(Self { octocrab })
    }

    /// Paths of every file changed by the pull request.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::GitHub`] on network or API errors.
    pub async fn list_changed_files(&self, pr: &PrRef) -> Result<Vec<String>, VigilError> {
        let route = format!("/repos/{}/{}/pulls/{}/files", pr.owner, pr.repo, pr.number);
        let mut files = Vec::new();
        for page in 1.. {
            let batch: Vec<PullFile> = self
                .octocrab
                .get(&route, Some(&Page { per_page: PER_PAGE, page }))
                .await
                .map_err(|e| VigilError::GitHub(format!("failed to list PR files: {e}")))?;
            let done = batch.len() < PER_PAGE;
            files.extend(batch.into_iter().map(|f| f.filename));
            if done {
                break;
            }
        }
        debug!(pr = %pr, count = files.len(), "fetched changed files");
        Ok(files)
    }

    async fn list_comments(&self, pr: &PrRef) -> Result<Vec<IssueComment>, VigilError> {
        let route = format!("/repos/{}/{}/issues/{}/comments", pr.owner, pr.repo, pr.number);
        let mut comments = Vec::new();
        for page in 1.. {
            let batch: Vec<IssueComment> = self
                .octocrab
                .get(&route, Some(&Page { per_page: PER_PAGE, page }))
                .await
                .map_err(|e| VigilError::GitHub(format!("failed to list PR comments: {e}")))?;
            let done = batch.len() < PER_PAGE;
            comments.extend(batch);
            if done {
                break;
            }
        }
        Ok(comments)
    }

    /// Create or update the single report comment carrying `marker`.
    ///
    /// `body` must contain `marker` so the next run finds the comment again.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::GitHub`] on API errors.
    pub async fn upsert_comment(
        &self,
        pr: &PrRef,
        marker: &str,
        body: &str,
    ) -> Result<CommentAction, VigilError> {
        let existing = self.list_comments(pr).await?;
        let payload = serde_json::json!({ "body": body });

        match find_marked_comment(&existing, marker) {
            Some(id) => {
                let route = format!("/repos/{}/{}/issues/comments/{id}", pr.owner, pr.repo);
                let _updated: IssueComment = self
                    .octocrab
                    .patch(route, Some(&payload))
                    .await
                    .map_err(|e| VigilError::GitHub(format!("failed to update comment: {e}")))?;
                info!(pr = %pr, id, "updated report comment");
                Ok(CommentAction::Updated(id))
            }
            None => {
                let route = format!("/repos/{}/{}/issues/{}/comments", pr.owner, pr.repo, pr.number);
                let created: IssueComment = self
                    .octocrab
                    .post(route, Some(&payload))
                    .await
                    .map_err(|e| VigilError::GitHub(format!("failed to create comment: {e}")))?;
                info!(pr = %pr, id = created.id, "created report comment");
                Ok(CommentAction::Created(created.id))
            }
        }
    }
}

/// First comment whose body contains `marker`.
pub fn find_marked_comment(comments: &[IssueComment], marker: &str) -> Option<u64> {
    comments
        .iter()
        .find(|c| c.body.as_deref().is_some_and(|b| b.contains(marker)))
        .map(|c| c.id)
}
