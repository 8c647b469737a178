//! CI report readers and the annotations derived from them.
//!
//! Each module reads one artifact produced by an earlier CI step and turns it
//! into a [`TaskOutcome`](vigil_core::TaskOutcome). Nothing here returns an
//! error to the caller: read and parse failures become annotations.

pub mod coverage;
pub mod jest;
pub mod lint;
pub mod snapshots;

use std::io::ErrorKind;
use std::path::{Component, Path};

use serde::de::DeserializeOwned;
use vigil_core::VigilError;

/// Read and deserialize a JSON artifact.
///
/// A missing file maps to [`VigilError::FileNotFound`] so the annotation names
/// the path that was expected.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, VigilError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            VigilError::FileNotFound(path.to_path_buf())
        } else {
            VigilError::Io(e)
        }
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Express `path` relative to `root`, with `/` separators.
///
/// Absolute paths outside of `root` climb out of it with `..` segments.
/// Relative paths are taken as already relative to `root`.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use vigil_reports::relative_to;
///
/// let rel = relative_to(Path::new("/work/app"), Path::new("/work/app/src/index.ts"));
/// assert_eq!(rel, "src/index.ts");
///
/// let outside = relative_to(Path::new("/work/app"), Path::new("/work/lib/x.ts"));
/// assert_eq!(outside, "../lib/x.ts");
/// ```
pub fn relative_to(root: &Path, path: &Path) -> String {
    if !path.has_root() {
        return join_parts(path.components().filter_map(part));
    }
    if !root.has_root() {
        return path.to_string_lossy().replace('\\', "/");
    }

    let root_parts: Vec<Component> = root.components().filter(|c| *c != Component::CurDir).collect();
    let path_parts: Vec<Component> = path.components().filter(|c| *c != Component::CurDir).collect();
    let common = root_parts
        .iter()
        .zip(&path_parts)
        .take_while(|(a, b)| a == b)
        .count();

    // Different drive prefixes have no relative form.
    if common == 0 {
        return path.to_string_lossy().replace('\\', "/");
    }

    let up = root_parts[common..].iter().map(|_| "..".to_string());
    let down = path_parts[common..].iter().copied().filter_map(part);
    join_parts(up.chain(down))
}

fn part(component: Component) -> Option<String> {
    match component {
        Component::Normal(p) => Some(p.to_string_lossy().into_owned()),
        Component::ParentDir => Some("..".to_string()),
        Component::CurDir | Component::RootDir | Component::Prefix(_) => None,
    }
}

fn join_parts(parts: impl Iterator<Item = String>) -> String {
    parts.collect::<Vec<_>>().join("/")
}
