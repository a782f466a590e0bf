use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::validation::has_accepted_extension;
use crate::configuration::SampleOrder;
use crate::error_handling::types::{ServiceError, StorageError};
use crate::storage::ArtifactStore;

/// Picks the sample image used by the self-test endpoint.
///
/// A missing sample directory is created so operators know where to drop
/// images, and the call still fails with `NotFound`.
pub fn select_sample(dir: &Path, order: SampleOrder) -> Result<PathBuf, ServiceError> {
    if !dir.is_dir() {
        warn!("Sample directory {} is missing, creating it", dir.display());
        ArtifactStore::ensure_directory(dir)?;
        return Err(ServiceError::NotFound(format!(
            "{} directory not found or empty. Please add test images first.",
            dir.display()
        )));
    }

    let entries = fs::read_dir(dir).map_err(|source| StorageError::ReadFailed {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(has_accepted_extension)
        })
        .collect();

    if order == SampleOrder::Lexicographic {
        candidates.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    }
    debug!("Found {} sample image(s) in {}", candidates.len(), dir.display());

    candidates.into_iter().next().ok_or_else(|| {
        ServiceError::NotFound(format!(
            "No test images found. Please add images to {}.",
            dir.display()
        ))
    })
}
