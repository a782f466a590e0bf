use super::types::*;
use crate::error_handling::types::ConfigError;
use clap::parser::ValueSource;
use clap::{CommandFactory, FromArgMatches, Parser};
use log::{debug, info};
use serde::Deserialize;
use std::ffi::OsString;
use std::net::{IpAddr, SocketAddr};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Range accepted for the configured render factor.
pub const RENDER_FACTOR_RANGE: RangeInclusive<u32> = 10..=45;

/// Process-wide settings, resolved once at startup.
///
/// Every field can be given as a command-line flag or through the matching
/// environment variable. When `--config-file` points to a TOML file, its
/// values are used for every option that was neither passed on the command
/// line nor set in the environment.
///
/// The resolved value is never mutated afterwards; components receive it (or
/// the pieces they need) at construction time.
///
/// # Examples
///
/// ```no_run
/// use colorizer::configuration::Settings;
///
/// let settings = Settings::load()?;
/// println!("Serving results from {}", settings.results_dir.display());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Parser, Debug, Clone)]
#[command(name = "colorizer")]
#[command(version)]
#[command(about = "HTTP service colorizing black and white images")]
pub struct Settings {
    /// Weight set loaded by the colorization engine
    #[arg(long, env = "MODEL_TYPE", value_enum, default_value_t = ModelVariant::Artistic)]
    pub model_type: ModelVariant,

    /// Path to the model weights file
    ///
    /// Defaults to the variant's weight file inside `models_dir`. The file
    /// must exist when the engine is initialized.
    #[arg(long, env = "MODEL_WEIGHTS_PATH")]
    pub model_weights_path: Option<PathBuf>,

    /// Directory searched for the default weight files
    #[arg(long, env = "MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    /// Render factor for colorization, higher is better quality but costs more memory
    ///
    /// The service never passes more than the safe ceiling to the engine,
    /// whatever is configured here.
    #[arg(long, env = "RENDER_FACTOR", value_parser = clap::value_parser!(u32).range(
        i64::from(*RENDER_FACTOR_RANGE.start())..=i64::from(*RENDER_FACTOR_RANGE.end())
    ))]
    pub render_factor: Option<u32>,

    /// Directory holding colorized results, served under /results
    #[arg(long, env = "RESULTS_DIR", default_value = "outputs")]
    pub results_dir: PathBuf,

    /// Directory holding uploads until they are processed
    #[arg(long, env = "STAGING_DIR", default_value = "temp")]
    pub staging_dir: PathBuf,

    /// Operator-populated directory used by GET /test
    #[arg(long, env = "SAMPLE_DIR", default_value = "test_images")]
    pub sample_dir: PathBuf,

    /// Whether staged uploads are kept or removed after processing
    #[arg(long, env = "STAGING_RETENTION", value_enum, default_value_t = StagingRetention::Keep)]
    pub staging_retention: StagingRetention,

    /// Rule used to pick the sample image
    #[arg(long, env = "SAMPLE_ORDER", value_enum, default_value_t = SampleOrder::Lexicographic)]
    pub sample_order: SampleOrder,

    /// Colorization engine implementation
    #[arg(long, env = "COLORIZER_ENGINE", value_enum, default_value_t = EngineKind::Builtin)]
    pub engine: EngineKind,

    /// Program invoked by the external engine
    #[arg(long, env = "ENGINE_COMMAND")]
    pub engine_command: Option<PathBuf>,

    /// Address the HTTP server binds to
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: IpAddr,

    /// Port the HTTP server listens on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Largest accepted upload, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 20 * 1024 * 1024)]
    pub max_upload_bytes: u64,

    /// Optional TOML file providing defaults for the options above
    #[arg(long, env = "COLORIZER_CONFIG")]
    pub config_file: Option<PathBuf>,
}

/// Shape of the optional TOML configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    model_type: Option<ModelVariant>,
    model_weights_path: Option<PathBuf>,
    models_dir: Option<PathBuf>,
    render_factor: Option<u32>,
    results_dir: Option<PathBuf>,
    staging_dir: Option<PathBuf>,
    sample_dir: Option<PathBuf>,
    staging_retention: Option<StagingRetention>,
    sample_order: Option<SampleOrder>,
    engine: Option<EngineKind>,
    engine_command: Option<PathBuf>,
    bind_address: Option<IpAddr>,
    port: Option<u16>,
    max_upload_bytes: Option<u64>,
}

impl FileSettings {
    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }
}

impl Settings {
    /// Resolves the settings from the process arguments and environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(std::env::args_os())
    }

    /// Resolves the settings from the given arguments and the process environment.
    pub fn load_from<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Settings::command().try_get_matches_from(args)?;
        let mut settings = Settings::from_arg_matches(&matches)?;

        if let Some(path) = settings.config_file.clone() {
            info!("Importing configuration file {}", path.display());
            let file = FileSettings::from_file(&path)?;
            settings.merge_file(file, |id| {
                !matches!(
                    matches.value_source(id),
                    Some(ValueSource::CommandLine) | Some(ValueSource::EnvVariable)
                )
            });
        }

        settings.validate()?;
        debug!("Resolved settings: {:?}", settings);
        Ok(settings)
    }

    fn merge_file(&mut self, file: FileSettings, overridable: impl Fn(&str) -> bool) {
        macro_rules! fill {
            ($field:ident) => {
                if let Some(value) = file.$field {
                    if overridable(stringify!($field)) {
                        self.$field = value;
                    }
                }
            };
            (optional $field:ident) => {
                if let Some(value) = file.$field {
                    if overridable(stringify!($field)) {
                        self.$field = Some(value);
                    }
                }
            };
        }

        fill!(model_type);
        fill!(optional model_weights_path);
        fill!(models_dir);
        fill!(optional render_factor);
        fill!(results_dir);
        fill!(staging_dir);
        fill!(sample_dir);
        fill!(staging_retention);
        fill!(sample_order);
        fill!(engine);
        fill!(optional engine_command);
        fill!(bind_address);
        fill!(port);
        fill!(max_upload_bytes);
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(factor) = self.render_factor {
            if !RENDER_FACTOR_RANGE.contains(&factor) {
                return Err(ConfigError::NotInRange(format!(
                    "render_factor {} is outside {}..={}",
                    factor,
                    RENDER_FACTOR_RANGE.start(),
                    RENDER_FACTOR_RANGE.end()
                )));
            }
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::NotInRange(
                "max_upload_bytes must be greater than zero".to_string(),
            ));
        }
        if self.engine == EngineKind::External && self.engine_command.is_none() {
            return Err(ConfigError::MissingEngineCommand(
                "the external engine requires --engine-command".to_string(),
            ));
        }
        Ok(())
    }

    /// Weights file loaded by the engine.
    pub fn weights_path(&self) -> PathBuf {
        self.model_weights_path
            .clone()
            .unwrap_or_else(|| self.models_dir.join(self.model_type.model_file()))
    }

    /// Render factor requested by configuration, before the safety clamp.
    pub fn default_render_factor(&self) -> u32 {
        self.render_factor
            .unwrap_or_else(|| self.model_type.default_render_factor())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn log_summary(&self) {
        info!("Model type: {}", self.model_type.as_str());
        info!("Model weights path: {}", self.weights_path().display());
        info!("Render factor: {}", self.default_render_factor());
        info!("Results directory: {}", self.results_dir.display());
        info!("Staging directory: {}", self.staging_dir.display());
        info!("Staging retention: {:?}", self.staging_retention);
        info!("Engine: {:?}", self.engine);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    #[serial]
    fn test_defaults() {
        let settings = Settings::load_from(["colorizer"]).unwrap_or_else(|e| panic!("{}", e));

        assert_eq!(settings.model_type, ModelVariant::Artistic);
        assert_eq!(settings.results_dir, PathBuf::from("outputs"));
        assert_eq!(settings.staging_dir, PathBuf::from("temp"));
        assert_eq!(settings.sample_dir, PathBuf::from("test_images"));
        assert_eq!(settings.staging_retention, StagingRetention::Keep);
        assert_eq!(settings.sample_order, SampleOrder::Lexicographic);
        assert_eq!(
            settings.weights_path(),
            PathBuf::from("models").join("ColorizeArtistic_gen.pth")
        );
    }

    #[test]
    #[serial]
    fn test_variant_drives_weights_and_render_factor() {
        let settings = Settings::load_from(["colorizer", "--model-type", "stable"]).unwrap();

        assert_eq!(settings.default_render_factor(), 21);
        assert_eq!(
            settings.weights_path(),
            PathBuf::from("models").join("ColorizeStable_gen.pth")
        );
    }

    #[test]
    #[serial]
    fn test_render_factor_from_env() {
        std::env::set_var("RENDER_FACTOR", "35");
        let settings = Settings::load_from(["colorizer"]);
        std::env::remove_var("RENDER_FACTOR");

        assert_eq!(settings.unwrap().default_render_factor(), 35);
    }

    #[test]
    #[serial]
    fn test_render_factor_out_of_range_rejected() {
        let err = Settings::load_from(["colorizer", "--render-factor", "46"]).unwrap_err();
        assert!(matches!(err, ConfigError::ArgumentError(_)));

        let err = Settings::load_from(["colorizer", "--render-factor", "9"]).unwrap_err();
        assert!(matches!(err, ConfigError::ArgumentError(_)));
    }

    #[test]
    #[serial]
    fn test_render_factor_bounds_accepted() {
        for bound in [*RENDER_FACTOR_RANGE.start(), *RENDER_FACTOR_RANGE.end()] {
            let value = bound.to_string();
            let settings =
                Settings::load_from(["colorizer", "--render-factor", value.as_str()]).unwrap();
            assert_eq!(settings.default_render_factor(), bound);
        }
        for outside in [*RENDER_FACTOR_RANGE.start() - 1, *RENDER_FACTOR_RANGE.end() + 1] {
            let value = outside.to_string();
            assert!(Settings::load_from(["colorizer", "--render-factor", value.as_str()]).is_err());
        }
    }

    #[test]
    #[serial]
    fn test_file_fills_unset_options() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "render_factor = 30").unwrap();
        writeln!(file, "results_dir = \"from_file\"").unwrap();
        writeln!(file, "staging_retention = \"delete\"").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let settings = Settings::load_from([
            "colorizer",
            "--config-file",
            path.as_str(),
            "--results-dir",
            "from_cli",
        ])
        .unwrap();

        assert_eq!(settings.render_factor, Some(30));
        assert_eq!(settings.results_dir, PathBuf::from("from_cli"));
        assert_eq!(settings.staging_retention, StagingRetention::Delete);
    }

    #[test]
    #[serial]
    fn test_file_render_factor_is_validated() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "render_factor = 80").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let err = Settings::load_from(["colorizer", "--config-file", path.as_str()]).unwrap_err();

        assert!(matches!(err, ConfigError::NotInRange(_)));
    }

    #[test]
    #[serial]
    fn test_external_engine_requires_command() {
        let err = Settings::load_from(["colorizer", "--engine", "external"]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEngineCommand(_)));

        let settings = Settings::load_from([
            "colorizer",
            "--engine",
            "external",
            "--engine-command",
            "/usr/local/bin/deoldify",
        ])
        .unwrap();
        assert_eq!(settings.engine, EngineKind::External);
    }
}
