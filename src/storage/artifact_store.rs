use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::{debug, error, info};
use regex::Regex;
use uuid::Uuid;

use crate::error_handling::types::StorageError;
use crate::storage::types::StagedFile;

/// Names accepted by the retrieval endpoint: one path segment, no leading dot.
static ARTIFACT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-][A-Za-z0-9._-]*$").expect("valid artifact name pattern"));

/// Owns the staging and output roots.
///
/// Every file the store creates gets a fresh UUID v4 name and is written
/// through a temporary sibling that is renamed into place without clobbering,
/// so a returned path never existed before and is never seen half-written.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    staging_root: PathBuf,
    output_root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        staging_root: P,
        output_root: Q,
    ) -> Result<Self, StorageError> {
        let staging_root = staging_root.as_ref().to_path_buf();
        let output_root = output_root.as_ref().to_path_buf();

        Self::ensure_directory(&staging_root)?;
        Self::ensure_directory(&output_root)?;
        info!(
            "ArtifactStore initialized (staging: {}, outputs: {})",
            staging_root.display(),
            output_root.display()
        );

        Ok(Self {
            staging_root,
            output_root,
        })
    }

    /// Creates `root` and its parents if missing. Idempotent.
    pub fn ensure_directory(root: &Path) -> Result<(), StorageError> {
        fs::create_dir_all(root).map_err(|source| {
            error!("Failed to create directory {}: {}", root.display(), source);
            StorageError::CreateDirFailed {
                path: root.to_path_buf(),
                source,
            }
        })
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Persists an upload under the staging root as `<uuid><ext>`, keeping the
    /// extension of `original_filename`.
    pub fn stage(&self, bytes: &[u8], original_filename: &str) -> Result<StagedFile, StorageError> {
        Self::ensure_directory(&self.staging_root)?;
        let path = self
            .staging_root
            .join(unique_name(&extension_of(original_filename)));

        write_atomic(&self.staging_root, &path, bytes)?;
        info!("Saved uploaded file {} to {}", original_filename, path.display());

        Ok(StagedFile {
            path,
            original_filename: original_filename.to_string(),
            size: bytes.len() as u64,
        })
    }

    /// Returns a fresh path under the output root. The file is not created.
    pub fn allocate_output_path(&self, suffix: &str) -> PathBuf {
        let suffix = match suffix {
            "" => String::new(),
            s if s.starts_with('.') => s.to_string(),
            s => format!(".{}", s),
        };
        let path = self.output_root.join(unique_name(&suffix));
        debug!("Generated output path: {}", path.display());
        path
    }

    /// Writes an engine result at `path`, which must sit directly under the
    /// output root and must not exist yet.
    pub fn write_output(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        if path.parent() != Some(self.output_root.as_path()) {
            error!("Refusing to write {} outside the output root", path.display());
            return Err(StorageError::OutsideRoot(path.to_path_buf()));
        }
        Self::ensure_directory(&self.output_root)?;
        write_atomic(&self.output_root, path, bytes)?;
        debug!("Wrote {} byte(s) to {}", bytes.len(), path.display());
        Ok(())
    }

    /// Maps a retrieval name onto a file of the output root.
    ///
    /// Anything other than a single plain path segment is rejected before the
    /// name is joined to the root.
    pub fn resolve_output(&self, name: &str) -> Result<PathBuf, StorageError> {
        if !ARTIFACT_NAME.is_match(name) {
            debug!("Rejected artifact name {:?}", name);
            return Err(StorageError::InvalidName(name.to_string()));
        }
        let path = self.output_root.join(name);
        if !path.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }
        Ok(path)
    }

    pub fn read_output(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve_output(name)?;
        let bytes = fs::read(&path).map_err(|source| {
            error!("Read failed {}: {}", path.display(), source);
            StorageError::ReadFailed {
                path: path.clone(),
                source,
            }
        })?;
        debug!("Read {} byte(s) from {}", bytes.len(), path.display());
        Ok(bytes)
    }

    /// Removes a staged upload once it is no longer needed.
    pub fn discard_staged(&self, staged: &StagedFile) -> Result<(), StorageError> {
        fs::remove_file(&staged.path).map_err(|source| StorageError::WriteFailed {
            path: staged.path.clone(),
            source,
        })?;
        debug!("Removed staged file {}", staged.path.display());
        Ok(())
    }
}

fn unique_name(suffix: &str) -> String {
    format!("{}{}", Uuid::new_v4(), suffix)
}

/// Extension of the last path component, dot included, or an empty string.
fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}

fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let write_failed = |source: std::io::Error| {
        error!("Write failed {}: {}", target.display(), source);
        StorageError::WriteFailed {
            path: target.to_path_buf(),
            source,
        }
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".incoming-")
        .tempfile_in(dir)
        .map_err(write_failed)?;
    tmp.write_all(bytes).map_err(write_failed)?;
    tmp.as_file().sync_all().map_err(write_failed)?;
    tmp.persist_noclobber(target)
        .map_err(|e| write_failed(e.error))?;
    Ok(())
}
