use std::path::{Path, PathBuf};

use futures::future::join_all;
use tracing::{debug, info, warn};
use vigil_core::{Annotation, StorageCredentials, TaskOutcome, VigilError};

use crate::diffs::{content_hash, image_name, list_diff_images, object_key, scope_prefix};
use crate::store::{ObjectStore, PutRequest, StoreConnector};

/// Inputs of one archiving run.
#[derive(Debug, Clone)]
pub struct ArchiveSettings {
    /// Directory with the diff images of the current visual test run.
    pub diff_dir: PathBuf,
    /// Workflow where reviewers re-approve screenshots.
    pub remediation_url: Option<String>,
    /// `None` skips remote archiving entirely.
    pub credentials: Option<StorageCredentials>,
}

/// Reports changed screenshots and mirrors their diffs to object storage.
///
/// For a given scope the remote state always reflects the latest run only:
/// every object under the scope prefix is purged before the current diffs are
/// uploaded.
pub struct ScreenshotArchiver<C> {
    settings: ArchiveSettings,
    connector: C,
}

impl<C: StoreConnector> ScreenshotArchiver<C> {
    pub fn new(settings: ArchiveSettings, connector: C) -> Self {
        Self {
            settings,
            connector,
        }
    }

    /// Run the whole archiving task for `scope` (PR number or fallback).
    ///
    /// Never fails: problems are reported as warnings in the outcome.
    pub async fn run(&self, scope: &str) -> TaskOutcome {
        let mut outcome = TaskOutcome::new("screenshots");

        let images = match list_diff_images(&self.settings.diff_dir).await {
            Ok(Some(images)) => images,
            Ok(None) => {
                debug!(dir = %self.settings.diff_dir.display(), "no screenshot diff directory");
                return outcome;
            }
            Err(e) => {
                outcome.push(Annotation::warn(format!(
                    "Could not list screenshot diffs in {}: {e}",
                    self.settings.diff_dir.display()
                )));
                return outcome;
            }
        };

        // An empty directory still purges, so the remote scope drops last run's diffs.
        if !images.is_empty() {
            outcome.push(Annotation::warn(changed_screenshots_message(
                images.len(),
                self.settings.remediation_url.as_deref(),
            )));
        }

        let Some(credentials) = &self.settings.credentials else {
            info!("storage credentials missing, skipping screenshot archiving");
            return outcome;
        };

        let store = match self.connector.connect(credentials) {
            Ok(store) => store,
            Err(e) => {
                warn!(error = %e, "could not create storage client");
                outcome.push(Annotation::warn(
                    "Could not create storage client - aborting screenshot archiving.",
                ));
                return outcome;
            }
        };

        // Purge must settle before the first upload, or it could delete this run's objects.
        if let Err(e) = purge(store.as_ref(), scope).await {
            warn!(error = %e, scope, "purge failed");
            outcome.push(Annotation::warn(format!(
                "Could not purge old screenshots from storage: \"{e}\""
            )));
        }

        let uploads = images
            .iter()
            .map(|path| upload_annotation(store.as_ref(), scope, path));
        outcome.annotations.extend(join_all(uploads).await);
        outcome
    }
}

/// Delete every object under the scope prefix. Returns how many were removed.
///
/// # Errors
///
/// Propagates listing and deletion failures from the store.
pub async fn purge(store: &dyn ObjectStore, scope: &str) -> Result<usize, VigilError> {
    let keys = store.list_keys(&scope_prefix(scope)).await?;
    if keys.is_empty() {
        return Ok(0);
    }
    store.delete_keys(&keys).await?;
    debug!(scope, count = keys.len(), "purged stale screenshots");
    Ok(keys.len())
}

/// Upload one diff image and return its public URL.
///
/// # Errors
///
/// Returns [`VigilError::Io`] if the file cannot be read, or the store's error
/// if the upload fails.
pub async fn upload_image(
    store: &dyn ObjectStore,
    scope: &str,
    path: &Path,
) -> Result<String, VigilError> {
    let bytes = tokio::fs::read(path).await?;
    let key = object_key(scope, &image_name(path), &content_hash(&bytes));
    store.put_object(PutRequest::public_png(key.clone(), bytes)).await?;
    Ok(store.public_url(&key))
}

async fn upload_annotation(store: &dyn ObjectStore, scope: &str, path: &Path) -> Annotation {
    let name = image_name(path);
    match upload_image(store, scope, path).await {
        Ok(url) => Annotation::markdown(screenshot_markup(&name, &url)),
        Err(e) => {
            warn!(screenshot = %name, error = %e, "upload failed");
            Annotation::warn(format!("Could not upload screenshot diff {name}: {e}"))
        }
    }
}

/// Collapsible block embedding one archived diff image.
///
/// # Examples
///
/// ```
/// use vigil_archive::archiver::screenshot_markup;
///
/// let md = screenshot_markup("header", "https://cdn.example.com/1/header-ab.png");
/// assert!(md.starts_with("<details><summary>Screenshot <code>header</code> failed</summary>"));
/// assert!(md.contains(r#"<img src="https://cdn.example.com/1/header-ab.png">"#));
/// ```
pub fn screenshot_markup(name: &str, url: &str) -> String {
    format!(
        "<details><summary>Screenshot <code>{name}</code> failed</summary><img src=\"{url}\"></details>"
    )
}

fn changed_screenshots_message(count: usize, remediation_url: Option<&str>) -> String {
    match remediation_url {
        Some(url) => format!(
            "{count} changed screenshots found, review & update them via \
             [\"Update Screenshots\" action]({url}) before merging."
        ),
        None => format!("{count} changed screenshots found, review & update them before merging."),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashSet};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use vigil_core::{AnnotationKind, TaskStatus};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        List(String),
        Delete(Vec<String>),
        Put(String),
    }

    #[derive(Default)]
    struct State {
        calls: Vec<Call>,
        objects: BTreeSet<String>,
        failing_keys: HashSet<String>,
        fail_listing: bool,
    }

    #[derive(Clone, Default)]
    struct MemoryStore {
        state: Arc<Mutex<State>>,
    }

    impl MemoryStore {
        fn with_objects(keys: &[&str]) -> Self {
            let store = Self::default();
            store.state.lock().unwrap().objects = keys.iter().map(|k| k.to_string()).collect();
            store
        }

        fn calls(&self) -> Vec<Call> {
            self.state.lock().unwrap().calls.clone()
        }

        fn objects(&self) -> Vec<String> {
            self.state.lock().unwrap().objects.iter().cloned().collect()
        }

        fn fail_puts_matching(&self, fragment: &str) {
            self.state.lock().unwrap().failing_keys.insert(fragment.to_string());
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, VigilError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::List(prefix.to_string()));
            if state.fail_listing {
                return Err(VigilError::Storage("access denied".into()));
            }
            Ok(state
                .objects
                .iter()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect())
        }

        async fn delete_keys(&self, keys: &[String]) -> Result<(), VigilError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Delete(keys.to_vec()));
            for key in keys {
                state.objects.remove(key);
            }
            Ok(())
        }

        async fn put_object(&self, request: PutRequest) -> Result<(), VigilError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Put(request.key.clone()));
            assert_eq!(request.content_type, "image/png");
            assert!(request.public_read);
            if state.failing_keys.iter().any(|f| request.key.contains(f)) {
                return Err(VigilError::Storage("connection reset".into()));
            }
            state.objects.insert(request.key);
            Ok(())
        }

        fn public_url(&self, key: &str) -> String {
            format!("https://bucket.storage.test/{key}")
        }
    }

    struct MemoryConnector {
        store: MemoryStore,
        fail: bool,
    }

    impl StoreConnector for MemoryConnector {
        fn connect(
            &self,
            _credentials: &StorageCredentials,
        ) -> Result<Box<dyn ObjectStore>, VigilError> {
            if self.fail {
                return Err(VigilError::Config("bad endpoint".into()));
            }
            Ok(Box::new(self.store.clone()))
        }
    }

    fn credentials() -> StorageCredentials {
        StorageCredentials {
            endpoint: "storage.test".into(),
            access_key_id: "id".into(),
            secret_key: "secret".into(),
        }
    }

    fn diff_dir_with(files: &[(&str, &[u8])]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, bytes) in files {
            std::fs::write(dir.path().join(name), bytes).unwrap();
        }
        dir
    }

    fn archiver(
        diff_dir: &Path,
        credentials: Option<StorageCredentials>,
        store: &MemoryStore,
        fail_connect: bool,
    ) -> ScreenshotArchiver<MemoryConnector> {
        ScreenshotArchiver::new(
            ArchiveSettings {
                diff_dir: diff_dir.to_path_buf(),
                remediation_url: Some("https://ci.example.com/update-screenshots".into()),
                credentials,
            },
            MemoryConnector {
                store: store.clone(),
                fail: fail_connect,
            },
        )
    }

    fn is_expected_key(key: &str, scope: &str, name: &str) -> bool {
        let Some(rest) = key.strip_prefix(&format!("{scope}/{name}-")) else {
            return false;
        };
        let Some(hash) = rest.strip_suffix(".png") else {
            return false;
        };
        hash.len() == 32 && hash.chars().all(|c| c.is_ascii_hexdigit())
    }

    #[tokio::test]
    async fn missing_directory_produces_nothing_and_no_storage_calls() {
        let root = tempfile::tempdir().unwrap();
        let store = MemoryStore::default();
        let outcome = archiver(&root.path().join("absent"), Some(credentials()), &store, false)
            .run("12")
            .await;

        assert!(outcome.annotations.is_empty());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_directory_purges_stale_objects() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::with_objects(&["7/old-0123.png", "8/keep.png"]);
        let outcome = archiver(dir.path(), Some(credentials()), &store, false)
            .run("7")
            .await;

        assert!(outcome.annotations.is_empty());
        assert_eq!(store.objects(), vec!["8/keep.png".to_string()]);
        assert!(!store.calls().iter().any(|c| matches!(c, Call::Put(_))));
    }

    #[tokio::test]
    async fn empty_directory_without_credentials_makes_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::with_objects(&["7/old-0123.png"]);
        let outcome = archiver(dir.path(), None, &store, false).run("7").await;

        assert!(outcome.annotations.is_empty());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn without_credentials_only_the_count_warning_is_emitted() {
        let dir = diff_dir_with(&[("a.png", b"a")]);
        let store = MemoryStore::default();
        let outcome = archiver(dir.path(), None, &store, false).run("12").await;

        assert_eq!(outcome.annotations.len(), 1);
        assert_eq!(outcome.annotations[0].kind, AnnotationKind::Warn);
        assert!(outcome.annotations[0].body.starts_with("1 changed screenshots found"));
        assert!(outcome.annotations[0]
            .body
            .contains("(https://ci.example.com/update-screenshots)"));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn purge_precedes_uploads() {
        let dir = diff_dir_with(&[("a.png", b"image a"), ("b.png", b"image b")]);
        let store = MemoryStore::with_objects(&["7/old-0123.png", "7/older-4567.png", "8/keep.png"]);
        let outcome = archiver(dir.path(), Some(credentials()), &store, false)
            .run("7")
            .await;

        let calls = store.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0], Call::List("7/".into()));
        assert_eq!(
            calls[1],
            Call::Delete(vec!["7/old-0123.png".into(), "7/older-4567.png".into()])
        );

        let puts: Vec<&String> = calls[2..]
            .iter()
            .map(|c| match c {
                Call::Put(key) => key,
                other => panic!("expected put, got {other:?}"),
            })
            .collect();
        assert_eq!(puts.len(), 2);
        assert!(puts.iter().any(|k| is_expected_key(k, "7", "a")));
        assert!(puts.iter().any(|k| is_expected_key(k, "7", "b")));

        assert_eq!(outcome.status(), TaskStatus::Advisory);
        let markup: Vec<_> = outcome.of_kind(AnnotationKind::Markdown).collect();
        assert_eq!(markup.len(), 2);
        assert!(markup[0].body.contains("<code>a</code>"));
        assert!(markup[0].body.contains("https://bucket.storage.test/7/a-"));
        assert!(markup[1].body.contains("<code>b</code>"));

        let remaining = store.objects();
        assert!(remaining.contains(&"8/keep.png".to_string()));
        assert!(!remaining.iter().any(|k| k.contains("old")));
    }

    #[tokio::test]
    async fn empty_scope_skips_delete() {
        let dir = diff_dir_with(&[("a.png", b"a")]);
        let store = MemoryStore::default();
        archiver(dir.path(), Some(credentials()), &store, false)
            .run("local")
            .await;

        let calls = store.calls();
        assert!(!calls.iter().any(|c| matches!(c, Call::Delete(_))));
        assert_eq!(calls[0], Call::List("local/".into()));
    }

    #[tokio::test]
    async fn one_failed_upload_does_not_stop_the_other() {
        let dir = diff_dir_with(&[("a.png", b"image a"), ("b.png", b"image b")]);
        let store = MemoryStore::default();
        store.fail_puts_matching("/a-");
        let outcome = archiver(dir.path(), Some(credentials()), &store, false)
            .run("3")
            .await;

        let puts = store
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Put(_)))
            .count();
        assert_eq!(puts, 2);

        let warnings: Vec<_> = outcome.of_kind(AnnotationKind::Warn).collect();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[1]
            .body
            .starts_with("Could not upload screenshot diff a: "));
        assert!(warnings[1].body.contains("connection reset"));

        let markup: Vec<_> = outcome.of_kind(AnnotationKind::Markdown).collect();
        assert_eq!(markup.len(), 1);
        assert!(markup[0].body.contains("<code>b</code>"));
    }

    #[tokio::test]
    async fn purge_failure_is_advisory_and_uploads_continue() {
        let dir = diff_dir_with(&[("a.png", b"a")]);
        let store = MemoryStore::default();
        store.state.lock().unwrap().fail_listing = true;
        let outcome = archiver(dir.path(), Some(credentials()), &store, false)
            .run("5")
            .await;

        assert!(outcome
            .annotations
            .iter()
            .any(|a| a.body == "Could not purge old screenshots from storage: \"storage error: access denied\""));
        assert_eq!(outcome.of_kind(AnnotationKind::Markdown).count(), 1);
    }

    #[tokio::test]
    async fn client_failure_aborts_archiving() {
        let dir = diff_dir_with(&[("a.png", b"a")]);
        let store = MemoryStore::default();
        let outcome = archiver(dir.path(), Some(credentials()), &store, true)
            .run("5")
            .await;

        assert_eq!(outcome.annotations.len(), 2);
        assert_eq!(
            outcome.annotations[1].body,
            "Could not create storage client - aborting screenshot archiving."
        );
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn rerun_leaves_the_same_objects() {
        let dir = diff_dir_with(&[("a.png", b"image a"), ("b.png", b"image b")]);
        let store = MemoryStore::default();
        let archiver = archiver(dir.path(), Some(credentials()), &store, false);

        archiver.run("9").await;
        let first = store.objects();
        archiver.run("9").await;
        let second = store.objects();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn count_message_without_link() {
        assert_eq!(
            changed_screenshots_message(3, None),
            "3 changed screenshots found, review & update them before merging."
        );
    }
}
