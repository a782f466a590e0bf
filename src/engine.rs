//! Colorization engines.
//!
//! The service only knows the [`ColorizationEngine`] trait. Two
//! implementations are available:
//! - [`BuiltinEngine`]: in-process chroma transfer built on the `image` crate.
//! - [`ExternalEngine`]: delegates to an operator-supplied program, typically a
//!   wrapper around a pretrained neural colorizer.
//!
//! Engines are constructed once at startup. A construction failure is fatal:
//! the server never starts with a partially initialized engine.

pub mod builtin;
pub mod external;

pub use builtin::BuiltinEngine;
pub use external::ExternalEngine;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{error, info};

use crate::configuration::{EngineKind, Settings};
use crate::error_handling::types::EngineError;
use crate::storage::ArtifactStore;

/// A loaded colorization model.
///
/// Implementations are stateful and not required to be reentrant; callers
/// serialize access through [`SharedEngine`].
pub trait ColorizationEngine: Send {
    /// Short identifier reported alongside results.
    fn name(&self) -> &'static str;

    /// Colorizes the image at `input` and returns the path of the result,
    /// which lives in the output root.
    fn transform(&mut self, input: &Path, render_factor: u32) -> Result<PathBuf, EngineError>;
}

/// The single engine instance shared by all requests.
pub type SharedEngine = Arc<Mutex<Box<dyn ColorizationEngine>>>;

pub fn shared(engine: Box<dyn ColorizationEngine>) -> SharedEngine {
    Arc::new(Mutex::new(engine))
}

/// Builds the engine selected by `settings`.
pub fn build_engine(
    settings: &Settings,
    store: ArtifactStore,
) -> Result<Box<dyn ColorizationEngine>, EngineError> {
    let weights = settings.weights_path();
    info!(
        "Initializing {:?} engine with model_type={}",
        settings.engine,
        settings.model_type.as_str()
    );

    let engine: Box<dyn ColorizationEngine> = match settings.engine {
        EngineKind::Builtin => Box::new(BuiltinEngine::new(settings.model_type, &weights, store)?),
        EngineKind::External => {
            let command = settings.engine_command.clone().ok_or_else(|| {
                EngineError::Initialization("no engine command configured".to_string())
            })?;
            Box::new(ExternalEngine::new(
                command,
                settings.model_type,
                &weights,
                store,
            )?)
        }
    };

    info!("Colorizer initialized successfully");
    Ok(engine)
}

/// Checks that the weights file exists and returns its size in bytes.
pub(crate) fn verify_weights(path: &Path) -> Result<u64, EngineError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(meta.len()),
        Ok(_) => {
            error!("Model weights path {} is not a file", path.display());
            Err(EngineError::Initialization(format!(
                "model weights path {} is not a file",
                path.display()
            )))
        }
        Err(e) => {
            error!("Model weights not found at {}: {}", path.display(), e);
            Err(EngineError::Initialization(format!(
                "model weights not found at {}: {}",
                path.display(),
                e
            )))
        }
    }
}
