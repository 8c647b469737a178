//! Flags pull requests that touch stored visual baselines.

use vigil_core::{Annotation, TaskOutcome};

/// Warning emitted when a baseline snapshot was changed.
pub const MODIFIED_SNAPSHOTS: &str = "Some screenshots were modified in this PR";

/// Emit one warning if any modified path contains `marker`.
///
/// # Examples
///
/// ```
/// use vigil_reports::snapshots::scan;
///
/// let files = vec!["src/Button/__image_snapshots__/button-1-snap.png".to_string()];
/// assert_eq!(scan(&files, "__image_snapshots__").annotations.len(), 1);
///
/// let files = vec!["src/Button/Button.tsx".to_string()];
/// assert!(scan(&files, "__image_snapshots__").annotations.is_empty());
/// ```
pub fn scan(modified_files: &[String], marker: &str) -> TaskOutcome {
    let outcome = TaskOutcome::new("snapshots");
    if !marker.is_empty() && modified_files.iter().any(|f| f.contains(marker)) {
        outcome.with(Annotation::warn(MODIFIED_SNAPSHOTS))
    } else {
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::AnnotationKind;

    const MARKER: &str = "__image_snapshots__";

    #[test]
    fn many_matches_give_one_warning() {
        let files = vec![
            "a/__image_snapshots__/one.png".to_string(),
            "README.md".to_string(),
            "b/__image_snapshots__/two.png".to_string(),
        ];
        let outcome = scan(&files, MARKER);
        assert_eq!(outcome.annotations.len(), 1);
        assert_eq!(outcome.annotations[0].kind, AnnotationKind::Warn);
        assert_eq!(outcome.annotations[0].body, MODIFIED_SNAPSHOTS);
    }

    #[test]
    fn no_match_gives_nothing() {
        let files = vec!["src/image_snapshots.ts".to_string()];
        assert!(scan(&files, MARKER).annotations.is_empty());
    }

    #[test]
    fn empty_change_list_gives_nothing() {
        assert!(scan(&[], MARKER).annotations.is_empty());
    }

    #[test]
    fn empty_marker_never_matches() {
        let files = vec!["anything".to_string()];
        assert!(scan(&files, "").annotations.is_empty());
    }
}
