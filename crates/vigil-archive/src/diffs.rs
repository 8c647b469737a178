//! Local diff images and their remote keys.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use vigil_core::VigilError;

/// Files in `dir`, sorted by name, or `None` if `dir` does not exist.
///
/// A missing directory means the visual tests never ran a comparison. An
/// existing but empty one means they ran and every screenshot matched. Symlinks
/// are followed, so a linked image counts like a regular file.
///
/// # Errors
///
/// Returns [`VigilError::Io`] if the directory exists but cannot be read.
pub async fn list_diff_images(dir: &Path) -> Result<Option<Vec<PathBuf>>, VigilError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut images = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => images.push(path),
            Ok(_) => {}
            // Dangling symlink.
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    images.sort();
    Ok(Some(images))
}

/// File name without its extension, used to label the screenshot.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use vigil_archive::diffs::image_name;
///
/// assert_eq!(image_name(Path::new("out/button-primary-diff.png")), "button-primary-diff");
/// ```
pub fn image_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// MD5 of `bytes` as 32 lowercase hex characters.
///
/// # Examples
///
/// ```
/// use vigil_archive::diffs::content_hash;
///
/// assert_eq!(content_hash(b""), "d41d8cd98f00b204e9800998ecf8427e");
/// ```
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Md5::digest(bytes))
}

/// Remote key prefix for a run: the PR number, or `fallback` outside of PRs.
///
/// # Examples
///
/// ```
/// use vigil_archive::diffs::run_scope;
///
/// assert_eq!(run_scope(Some(1234), "local"), "1234");
/// assert_eq!(run_scope(None, "local"), "local");
/// ```
pub fn run_scope(pr_number: Option<u64>, fallback: &str) -> String {
    match pr_number {
        Some(number) => number.to_string(),
        None => fallback.to_string(),
    }
}

/// Listing prefix covering every object of `scope`.
pub fn scope_prefix(scope: &str) -> String {
    format!("{scope}/")
}

/// Remote key for one diff image: `{scope}/{name}-{hash}.png`.
///
/// # Examples
///
/// ```
/// use vigil_archive::diffs::object_key;
///
/// assert_eq!(object_key("42", "header", "abc"), "42/header-abc.png");
/// ```
pub fn object_key(scope: &str, name: &str, hash: &str) -> String {
    format!("{scope}/{name}-{hash}.png")
}
