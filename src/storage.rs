//! Storage subsystem
//!
//! Filesystem roots used by the pipeline:
//! - the staging root, holding uploads until the engine has processed them;
//! - the output root, holding colorized results served under `/results`.
//!
//! Components:
//! - `artifact_store`: path allocation, atomic writes and retrieval for both roots.
//! - `types`: artifacts exchanged between the store, the engine and the service.

pub mod artifact_store;
pub mod types;

pub use artifact_store::ArtifactStore;
pub use types::{ResultArtifact, StagedFile, UploadedImage};
