//! Core types, configuration, and error handling for Vigil.
//!
//! This crate provides the shared foundation used by all other Vigil crates:
//! - [`VigilError`]: unified error type using `thiserror`
//! - [`VigilConfig`]: configuration loaded from `.vigil.toml` plus storage
//!   credentials from the environment
//! - Shared types: [`Annotation`], [`AnnotationKind`], [`TaskOutcome`],
//!   [`TaskStatus`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    GithubConfig, ReportsConfig, ScreenshotsConfig, StorageConfig, StorageCredentials, VigilConfig,
    ENV_ACCESS_KEY_ID, ENV_ENDPOINT, ENV_SECRET_KEY,
};
pub use error::VigilError;
pub use types::{Annotation, AnnotationKind, OutputFormat, TaskOutcome, TaskStatus};

/// A convenience `Result` type for Vigil operations.
pub type Result<T> = std::result::Result<T, VigilError>;
