use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("Argument error: {0}")]
    ArgumentError(#[from] clap::Error),
    #[error("Value out of range: {0}")]
    NotInRange(String),
    #[error("Engine configuration error: {0}")]
    MissingEngineCommand(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Storage write failed for {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Storage read failed for {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Artifact not found: {0}")]
    NotFound(String),
    #[error("Invalid artifact name: {0}")]
    InvalidName(String),
    #[error("Path {0} is outside the output root")]
    OutsideRoot(PathBuf),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to initialize colorizer: {0}")]
    Initialization(String),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Engine IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Engine command failed: {0}")]
    CommandFailed(String),
    #[error("Engine produced no output at {0}")]
    MissingOutput(PathBuf),
    #[error("Engine is unavailable after a previous panic")]
    Poisoned,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure taxonomy of the colorization service.
///
/// Only the message and the [`ServiceError::kind`] tag leave the process.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Processing(String),
}

impl ServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Storage(_) => "storage",
            ServiceError::Processing(_) => "processing",
        }
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Configuration error: {0}")]
    ConfigurationError(#[from] ConfigError),
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
    #[error("Engine error: {0}")]
    EngineError(#[from] EngineError),
    #[error("Server error: {0}")]
    ServerError(String),
}
