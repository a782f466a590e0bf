use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Route prefix under which result artifacts are served.
pub const RESULTS_ROUTE: &str = "/results";

/// An image received from a client, before any validation.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// An upload persisted under the staging root.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub original_filename: String,
    pub size: u64,
}

/// A colorized image under the output root.
#[derive(Debug, Clone)]
pub struct ResultArtifact {
    pub path: PathBuf,
    pub file_name: String,
    pub render_factor: u32,
    pub engine: String,
    pub created_at: DateTime<Utc>,
}

impl ResultArtifact {
    /// External reference clients concatenate onto the service base URL.
    pub fn url(&self) -> String {
        format!("{}/{}", RESULTS_ROUTE, self.file_name)
    }
}
