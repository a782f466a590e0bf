//! Error types shared across the colorization pipeline.
//!
//! Each subsystem owns one enum; the web layer is the only place where
//! [`types::ServiceError`] is turned into an HTTP status.

pub mod types;

pub use types::*;
