use std::path::PathBuf;

/// Errors that can occur across Vigil.
///
/// Library crates use this type directly. Inside the review pipeline most
/// failures are turned into annotations instead of being propagated; the
/// binary only sees the ones that happen outside of it (config, GitHub).
///
/// # Examples
///
/// ```
/// use vigil_core::VigilError;
///
/// let err = VigilError::Storage("access denied".into());
/// assert!(err.to_string().contains("access denied"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum VigilError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(vigil::config))]
    Config(String),

    /// GitHub API failure.
    #[error("GitHub error: {0}")]
    #[diagnostic(code(vigil::github))]
    GitHub(String),

    /// Object storage failure.
    #[error("storage error: {0}")]
    #[diagnostic(code(vigil::storage))]
    Storage(String),

    /// Git command failure.
    #[error("git error: {0}")]
    Git(String),

    /// Malformed input data.
    #[error("parse error: {0}")]
    Parse(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}
