//! Request-to-artifact pipeline.
//!
//! [`ColorizationService`] validates an image, stages it, runs the shared
//! engine once with a clamped render factor and hands back the produced
//! [`ResultArtifact`](crate::storage::ResultArtifact).

pub mod samples;
pub mod service;
pub mod validation;

pub use service::ColorizationService;
pub use validation::{clamp_render_factor, ACCEPTED_EXTENSIONS, SAFE_MAX_RENDER_FACTOR};
