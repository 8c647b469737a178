//! Screenshot-diff archiving for Vigil.
//!
//! Changed screenshots from a visual test run are mirrored to S3-compatible
//! object storage under a per-PR prefix so reviewers can see them inline in
//! the review comment.

pub mod archiver;
pub mod diffs;
pub mod s3;
pub mod store;

pub use archiver::{ArchiveSettings, ScreenshotArchiver};
pub use s3::{S3Connector, S3Store};
pub use store::{ObjectStore, PutRequest, StoreConnector};
