//! Review orchestration for Vigil.
//!
//! Resolves what is being reviewed, runs every report task concurrently, and
//! renders the combined report for terminals, PR comments, SARIF consumers
//! and GitHub Actions.

pub mod context;
pub mod github;
pub mod pipeline;
pub mod render;
pub mod sarif;
