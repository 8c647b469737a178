//! S3-compatible [`ObjectStore`] backed by `aws-sdk-s3`.

use std::future::Future;

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectCannedAcl, ObjectIdentifier};
use tracing::{debug, info};
use url::Url;
use vigil_core::{StorageConfig, StorageCredentials, VigilError};

use crate::store::{ObjectStore, PutRequest, StoreConnector};

/// Maximum number of keys a single `DeleteObjects` request accepts.
const DELETE_BATCH_LIMIT: usize = 1000;

/// Parse an endpoint given either as a bare host (`storage.example.com`) or as a URL.
///
/// Bare hosts are assumed to speak HTTPS.
///
/// # Errors
///
/// Returns [`VigilError::Config`] if the endpoint is not a valid URL with a host.
///
/// # Examples
///
/// ```
/// use vigil_archive::s3::parse_endpoint;
///
/// let url = parse_endpoint("storage.example.com").unwrap();
/// assert_eq!(url.as_str(), "https://storage.example.com/");
///
/// let url = parse_endpoint("http://localhost:9000").unwrap();
/// assert_eq!(url.port(), Some(9000));
///
/// assert!(parse_endpoint("https://").is_err());
/// ```
pub fn parse_endpoint(endpoint: &str) -> Result<Url, VigilError> {
    let endpoint = endpoint.trim();
    let candidate = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    };
    let url = Url::parse(&candidate)
        .map_err(|e| VigilError::Config(format!("invalid storage endpoint '{endpoint}': {e}")))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(VigilError::Config(format!(
            "invalid storage endpoint '{endpoint}': missing host"
        )));
    }
    Ok(url)
}

/// Base URL for anonymous object access.
///
/// Uses `public_url` when configured; otherwise virtual-hosted
/// (`https://bucket.host`) or path-style (`https://host/bucket`) addressing
/// to match how the client talks to the endpoint.
fn public_base(storage: &StorageConfig, endpoint: &Url) -> String {
    if let Some(base) = &storage.public_url {
        return base.trim_end_matches('/').to_string();
    }
    let host = endpoint.host_str().unwrap_or_default();
    let authority = match endpoint.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    if storage.path_style {
        format!("{}://{authority}/{}", endpoint.scheme(), storage.bucket)
    } else {
        format!("{}://{}.{authority}", endpoint.scheme(), storage.bucket)
    }
}

fn storage_error<E>(action: &str, err: E) -> VigilError
where
    E: std::error::Error,
{
    VigilError::Storage(format!("{action}: {}", DisplayErrorContext(err)))
}

/// Object store talking to an S3-compatible endpoint.
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base: String,
}

impl S3Store {
    /// Build a client for `storage.bucket` at the credentials' endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Config`] if the endpoint cannot be parsed.
    pub fn connect(
        storage: &StorageConfig,
        credentials: &StorageCredentials,
    ) -> Result<Self, VigilError> {
        let endpoint = parse_endpoint(&credentials.endpoint)?;
        let creds = Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_key.clone(),
            None,
            None,
            "vigil-env",
        );
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(storage.region.clone()))
            .endpoint_url(endpoint.as_str().trim_end_matches('/'))
            .credentials_provider(creds)
            .force_path_style(storage.path_style)
            .build();

        info!(endpoint = %endpoint, bucket = %storage.bucket, "created storage client");

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(config),
            bucket: storage.bucket.clone(),
            public_base: public_base(storage, &endpoint),
        })
    }

    /// Bucket this store writes to.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .field("public_base", &self.public_base)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, VigilError> {
        let keys = collect_pages(|token| async move {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(token)
                .send()
                .await
                .map_err(|e| storage_error("failed to list objects", e))?;

            let keys = page
                .contents()
                .iter()
                .filter_map(|object| object.key().map(str::to_owned))
                .collect();
            Ok((keys, page.next_continuation_token().map(str::to_owned)))
        })
        .await?;
        debug!(prefix, count = keys.len(), "listed objects");
        Ok(keys)
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<(), VigilError> {
        for chunk in delete_batches(keys) {
            let objects = chunk
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| storage_error("invalid object key", e))?;
            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| storage_error("invalid delete request", e))?;

            let output = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| storage_error("failed to delete objects", e))?;

            if let Some(failed) = output.errors().first() {
                return Err(VigilError::Storage(format!(
                    "failed to delete {}: {}",
                    failed.key().unwrap_or("<unknown key>"),
                    failed.message().unwrap_or("unknown error"),
                )));
            }
        }
        debug!(count = keys.len(), "deleted objects");
        Ok(())
    }

    async fn put_object(&self, request: PutRequest) -> Result<(), VigilError> {
        let acl = request.public_read.then_some(ObjectCannedAcl::PublicRead);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&request.key)
            .body(ByteStream::from(request.body))
            .content_type(request.content_type)
            .set_acl(acl)
            .send()
            .await
            .map_err(|e| storage_error("failed to upload object", e))?;
        debug!(key = %request.key, "uploaded object");
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base)
    }
}

/// Drain a paginated listing. `fetch` gets the continuation token of the
/// previous page (`None` for the first) and returns the page's keys plus the
/// next token. A missing or empty token ends the listing.
async fn collect_pages<F, Fut>(mut fetch: F) -> Result<Vec<String>, VigilError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<(Vec<String>, Option<String>), VigilError>>,
{
    let mut keys = Vec::new();
    let mut token = None;
    loop {
        let (page, next) = fetch(token.take()).await?;
        keys.extend(page);
        match next {
            Some(next) if !next.is_empty() => token = Some(next),
            _ => return Ok(keys),
        }
    }
}

fn delete_batches(keys: &[String]) -> std::slice::Chunks<'_, String> {
    keys.chunks(DELETE_BATCH_LIMIT)
}

/// [`StoreConnector`] producing [`S3Store`]s for a fixed storage config.
#[derive(Debug, Clone)]
pub struct S3Connector {
    storage: StorageConfig,
}

impl S3Connector {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }
}

impl StoreConnector for S3Connector {
    fn connect(&self, credentials: &StorageCredentials) -> Result<Box<dyn ObjectStore>, VigilError> {
        Ok(Box::new(S3Store::connect(&self.storage, credentials)?))
    }
}
