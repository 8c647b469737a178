use async_trait::async_trait;
use vigil_core::{StorageCredentials, VigilError};

/// Content type of every archived diff image.
pub const PNG_CONTENT_TYPE: &str = "image/png";

/// One object to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRequest {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    /// Grant anonymous read access so the image renders in review comments.
    pub public_read: bool,
}

impl PutRequest {
    /// A publicly readable PNG upload.
    pub fn public_png(key: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            body,
            content_type: PNG_CONTENT_TYPE.into(),
            public_read: true,
        }
    }
}

/// The object-storage operations the archiver needs.
///
/// Implemented by [`S3Store`](crate::s3::S3Store) and by in-memory fakes in
/// tests.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every key under `prefix`, across all result pages.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, VigilError>;

    /// Delete `keys` as one batch.
    async fn delete_keys(&self, keys: &[String]) -> Result<(), VigilError>;

    /// Upload a single object.
    async fn put_object(&self, request: PutRequest) -> Result<(), VigilError>;

    /// URL under which `key` can be fetched anonymously.
    fn public_url(&self, key: &str) -> String;
}

/// Builds an [`ObjectStore`] once credentials are known.
pub trait StoreConnector: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the client cannot be constructed, e.g. for a
    /// malformed endpoint.
    fn connect(&self, credentials: &StorageCredentials) -> Result<Box<dyn ObjectStore>, VigilError>;
}
