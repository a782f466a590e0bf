use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, error, info};

use super::{verify_weights, ColorizationEngine};
use crate::configuration::ModelVariant;
use crate::error_handling::types::EngineError;
use crate::storage::ArtifactStore;

/// Runs an operator-supplied colorizer program once per image.
///
/// The program is called as
/// `<command> --input <in> --output <out> --render-factor <n> --model <variant> --weights <path>`
/// and must write a PNG at `<out>`, which this engine allocates in the
/// output root.
pub struct ExternalEngine {
    command: PathBuf,
    variant: ModelVariant,
    weights: PathBuf,
    store: ArtifactStore,
}

impl ExternalEngine {
    pub fn new(
        command: PathBuf,
        variant: ModelVariant,
        weights: &Path,
        store: ArtifactStore,
    ) -> Result<Self, EngineError> {
        verify_weights(weights)?;
        info!(
            "External colorizer {} configured for {} model",
            command.display(),
            variant.as_str()
        );

        Ok(Self {
            command,
            variant,
            weights: weights.to_path_buf(),
            store,
        })
    }
}

impl ColorizationEngine for ExternalEngine {
    fn name(&self) -> &'static str {
        "external"
    }

    fn transform(&mut self, input: &Path, render_factor: u32) -> Result<PathBuf, EngineError> {
        let output = self.store.allocate_output_path(".png");
        debug!(
            "Running {} on {} -> {}",
            self.command.display(),
            input.display(),
            output.display()
        );

        let result = Command::new(&self.command)
            .arg("--input")
            .arg(input)
            .arg("--output")
            .arg(&output)
            .arg("--render-factor")
            .arg(render_factor.to_string())
            .arg("--model")
            .arg(self.variant.as_str())
            .arg("--weights")
            .arg(&self.weights)
            .output()
            .map_err(|source| EngineError::Io {
                path: self.command.clone(),
                source,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            error!(
                "{} exited with {}: {}",
                self.command.display(),
                result.status,
                stderr.trim()
            );
            return Err(EngineError::CommandFailed(format!(
                "{} exited with {}: {}",
                self.command.display(),
                result.status,
                stderr.trim()
            )));
        }

        if !output.is_file() {
            return Err(EngineError::MissingOutput(output));
        }
        Ok(output)
    }
}
