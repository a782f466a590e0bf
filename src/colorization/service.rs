use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, warn};

use super::samples::select_sample;
use super::validation::{clamp_render_factor, validate_filename};
use crate::configuration::{SampleOrder, Settings, StagingRetention};
use crate::engine::SharedEngine;
use crate::error_handling::types::{EngineError, ServiceError, StorageError};
use crate::storage::{ArtifactStore, ResultArtifact, StagedFile, UploadedImage};

/// Pieces of [`Settings`] the service depends on.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub default_render_factor: u32,
    pub staging_retention: StagingRetention,
    pub sample_dir: PathBuf,
    pub sample_order: SampleOrder,
}

impl ServiceOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            default_render_factor: settings.default_render_factor(),
            staging_retention: settings.staging_retention,
            sample_dir: settings.sample_dir.clone(),
            sample_order: settings.sample_order,
        }
    }
}

/// Orchestrates one colorization per call: validate, stage, run the engine,
/// apply the staging retention policy.
///
/// Every call ends with exactly one outcome. Engine failures are wrapped into
/// [`ServiceError::Processing`] and never retried.
pub struct ColorizationService {
    store: ArtifactStore,
    engine: SharedEngine,
    options: ServiceOptions,
}

impl ColorizationService {
    pub fn new(store: ArtifactStore, engine: SharedEngine, options: ServiceOptions) -> Self {
        info!(
            "ColorizationService ready (render_factor={}, effective={}, retention={:?})",
            options.default_render_factor,
            clamp_render_factor(options.default_render_factor),
            options.staging_retention
        );
        Self {
            store,
            engine,
            options,
        }
    }

    /// Render factor handed to the engine on every call.
    pub fn effective_render_factor(&self) -> u32 {
        clamp_render_factor(self.options.default_render_factor)
    }

    pub async fn colorize_upload(&self, upload: UploadedImage) -> Result<ResultArtifact, ServiceError> {
        let filename = validate_filename(upload.filename.as_deref())?.to_string();
        if upload.bytes.is_empty() {
            return Err(ServiceError::Validation(format!("Uploaded file {} is empty", filename)));
        }

        info!(
            "Processing uploaded file: {} ({} byte(s), {})",
            filename,
            upload.bytes.len(),
            upload.content_type.as_deref().unwrap_or("unknown type")
        );
        let staged = self.store.stage(&upload.bytes, &filename)?;

        let outcome = self.run_engine(&staged.path).await;
        self.apply_retention(&staged);
        outcome
    }

    /// Colorizes the configured sample image in place, without staging a copy.
    pub async fn colorize_sample(&self) -> Result<ResultArtifact, ServiceError> {
        let sample = select_sample(&self.options.sample_dir, self.options.sample_order)?;
        info!("Using test image: {}", sample.display());
        self.run_engine(&sample).await
    }

    /// Reads a previously produced artifact by its file name.
    pub fn result_bytes(&self, file_name: &str) -> Result<(PathBuf, Vec<u8>), ServiceError> {
        let path = self.store.resolve_output(file_name).map_err(not_found)?;
        let bytes = self.store.read_output(file_name).map_err(not_found)?;
        Ok((path, bytes))
    }

    async fn run_engine(&self, input: &Path) -> Result<ResultArtifact, ServiceError> {
        let render_factor = self.effective_render_factor();
        info!(
            "Colorizing {} with render_factor={} (capped for GPU safety)",
            input.display(),
            render_factor
        );

        let engine = Arc::clone(&self.engine);
        let job_input = input.to_path_buf();
        let joined = tokio::task::spawn_blocking(move || {
            let mut engine = engine.lock().map_err(|_| EngineError::Poisoned)?;
            let name = engine.name();
            engine
                .transform(&job_input, render_factor)
                .map(|path| (path, name))
        })
        .await;

        let (path, engine_name) = match joined {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => {
                error!("Error during colorization of {}: {}", input.display(), e);
                return Err(ServiceError::Processing(format!("Image colorization failed: {}", e)));
            }
            Err(e) => {
                error!("Colorization task for {} aborted: {}", input.display(), e);
                return Err(ServiceError::Processing(format!("Image colorization failed: {}", e)));
            }
        };

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .filter(|_| path.is_file())
            .ok_or_else(|| {
                error!("Engine reported {} but no such file exists", path.display());
                ServiceError::Processing(format!(
                    "Image colorization failed: no result at {}",
                    path.display()
                ))
            })?;

        info!("Colorization successful: {}", path.display());
        Ok(ResultArtifact {
            path,
            file_name,
            render_factor,
            engine: engine_name.to_string(),
            created_at: Utc::now(),
        })
    }

    fn apply_retention(&self, staged: &StagedFile) {
        match self.options.staging_retention {
            StagingRetention::Keep => debug!("Keeping staged file {}", staged.path.display()),
            StagingRetention::Delete => {
                if let Err(e) = self.store.discard_staged(staged) {
                    warn!("Failed to remove staged file {}: {}", staged.path.display(), e);
                }
            }
        }
    }
}

fn not_found(err: StorageError) -> ServiceError {
    match err {
        StorageError::InvalidName(_) | StorageError::NotFound(_) => {
            ServiceError::NotFound("Result not found".to_string())
        }
        other => ServiceError::Storage(other),
    }
}
