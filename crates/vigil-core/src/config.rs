use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::VigilError;

/// Environment variable holding the object-storage endpoint.
pub const ENV_ENDPOINT: &str = "AWS_ENDPOINT";
/// Environment variable holding the object-storage access key id.
pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
/// Environment variable holding the object-storage secret key.
pub const ENV_SECRET_KEY: &str = "AWS_SECRET_KEY";

/// Top-level configuration loaded from `.vigil.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
/// Storage credentials are never read from the file; see
/// [`VigilConfig::with_env_credentials`].
///
/// # Examples
///
/// ```
/// use vigil_core::VigilConfig;
///
/// let config = VigilConfig::default();
/// assert_eq!(config.screenshots.fallback_scope, "local");
/// assert!(config.credentials.is_none());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VigilConfig {
    /// Locations of the CI artifacts, relative to the project root.
    #[serde(default)]
    pub reports: ReportsConfig,
    /// Screenshot-diff and snapshot conventions.
    #[serde(default)]
    pub screenshots: ScreenshotsConfig,
    /// Object-storage target for archived diffs.
    #[serde(default)]
    pub storage: StorageConfig,
    /// GitHub comment settings.
    #[serde(default)]
    pub github: GithubConfig,
    /// Storage credentials; `None` disables archiving.
    #[serde(skip)]
    pub credentials: Option<StorageCredentials>,
}

impl VigilConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Io`] if the file cannot be read, or
    /// [`VigilError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vigil_core::VigilConfig;
    /// use std::path::Path;
    ///
    /// let config = VigilConfig::from_file(Path::new(".vigil.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, VigilError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_core::VigilConfig;
    ///
    /// let toml = r#"
    /// [storage]
    /// bucket = "ui-screenshots"
    /// "#;
    /// let config = VigilConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.storage.bucket, "ui-screenshots");
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, VigilError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Attach storage credentials read from the process environment.
    pub fn with_env_credentials(self) -> Self {
        self.with_credentials(StorageCredentials::from_env())
    }

    /// Attach (or clear) storage credentials explicitly.
    pub fn with_credentials(mut self, credentials: Option<StorageCredentials>) -> Self {
        self.credentials = credentials;
        self
    }
}

/// Artifact locations, each relative to the project root.
///
/// # Examples
///
/// ```
/// use vigil_core::ReportsConfig;
///
/// let config = ReportsConfig::default();
/// assert_eq!(config.lint.to_str(), Some("lint-results.json"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    /// ESLint-format JSON report (default: `lint-results.json`).
    #[serde(default = "default_lint_path")]
    pub lint: PathBuf,
    /// Istanbul `coverage-summary.json` (default: `coverage/coverage-summary.json`).
    #[serde(default = "default_coverage_path")]
    pub coverage: PathBuf,
    /// Jest JSON test results (default: `test-results.json`).
    #[serde(default = "default_tests_path")]
    pub tests: PathBuf,
}

fn default_lint_path() -> PathBuf {
    PathBuf::from("lint-results.json")
}

fn default_coverage_path() -> PathBuf {
    PathBuf::from("coverage").join("coverage-summary.json")
}

fn default_tests_path() -> PathBuf {
    PathBuf::from("test-results.json")
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            lint: default_lint_path(),
            coverage: default_coverage_path(),
            tests: default_tests_path(),
        }
    }
}

/// Visual-regression conventions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotsConfig {
    /// Directory holding the diff images of the last visual test run.
    #[serde(default = "default_diff_dir")]
    pub diff_dir: PathBuf,
    /// Path fragment that identifies stored baseline snapshots.
    #[serde(default = "default_snapshot_marker")]
    pub snapshot_marker: String,
    /// Scope used for remote keys when the run is not tied to a pull request.
    #[serde(default = "default_fallback_scope")]
    pub fallback_scope: String,
    /// Link to the workflow that re-approves screenshots.
    pub remediation_url: Option<String>,
}

fn default_diff_dir() -> PathBuf {
    PathBuf::from("__diff_output__")
}

fn default_snapshot_marker() -> String {
    "__image_snapshots__".into()
}

fn default_fallback_scope() -> String {
    "local".into()
}

impl Default for ScreenshotsConfig {
    fn default() -> Self {
        Self {
            diff_dir: default_diff_dir(),
            snapshot_marker: default_snapshot_marker(),
            fallback_scope: default_fallback_scope(),
            remediation_url: None,
        }
    }
}

/// Object-storage target.
///
/// # Examples
///
/// ```
/// use vigil_core::StorageConfig;
///
/// let config = StorageConfig::default();
/// assert_eq!(config.region, "us-east-1");
/// assert!(!config.path_style);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket receiving the diff images.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Signing region; S3-compatible services mostly ignore it.
    #[serde(default = "default_region")]
    pub region: String,
    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`.
    #[serde(default)]
    pub path_style: bool,
    /// Base URL for embedded images, overriding the derived bucket URL.
    pub public_url: Option<String>,
}

fn default_bucket() -> String {
    "vigil-screenshots".into()
}

fn default_region() -> String {
    "us-east-1".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            region: default_region(),
            path_style: false,
            public_url: None,
        }
    }
}

/// GitHub comment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Hidden marker used to find the bot's own comment on re-runs.
    #[serde(default = "default_comment_marker")]
    pub comment_marker: String,
    /// Heading shown at the top of the sticky comment.
    #[serde(default = "default_comment_title")]
    pub comment_title: String,
}

fn default_comment_marker() -> String {
    "<!-- vigil-report -->".into()
}

fn default_comment_title() -> String {
    "CI Report".into()
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            comment_marker: default_comment_marker(),
            comment_title: default_comment_title(),
        }
    }
}

/// Credentials for the object-storage endpoint.
///
/// All three values must be present; a partial set counts as none.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    /// Endpoint host or URL, e.g. `storage.example.com` or `https://minio:9000`.
    pub endpoint: String,
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_key: String,
}

impl StorageCredentials {
    /// Read credentials from [`ENV_ENDPOINT`], [`ENV_ACCESS_KEY_ID`] and
    /// [`ENV_SECRET_KEY`].
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build credentials from an arbitrary variable lookup.
    ///
    /// Empty values are treated as missing.
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_core::StorageCredentials;
    ///
    /// let creds = StorageCredentials::from_lookup(|key| match key {
    ///     "AWS_ENDPOINT" => Some("s3.example.com".into()),
    ///     "AWS_ACCESS_KEY_ID" => Some("id".into()),
    ///     _ => None,
    /// });
    /// assert!(creds.is_none());
    /// ```
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Some(Self {
            endpoint: get(ENV_ENDPOINT)?,
            access_key_id: get(ENV_ACCESS_KEY_ID)?,
            secret_key: get(ENV_SECRET_KEY)?,
        })
    }
}

impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}
