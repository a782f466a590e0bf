use serde::{Deserialize, Serialize};

/// Body returned by the colorization endpoints on success.
#[derive(Debug, Serialize, Deserialize)]
pub struct ColorizationResponse {
    /// Retrieval URL of the colorized image, `/results/<file>`.
    pub output_path: String,
    pub message: String,
}

/// API error payload
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub kind: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}
